/*!
 * Process Table
 * Bounded, arrival-ordered table of tracked processes plus the append-only
 * terminated log, behind one exclusive lock
 */

mod record;

pub use record::{ProcessRecord, ProcessState, TerminationRecord};

use crate::core::errors::TableError;
use crate::core::types::{Pid, Priority};
use log::warn;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// Table interior. Obtain through [`ProcessTable::lock`]; every
/// scan-then-mutate sequence must run under a single guard, since a scan
/// result is stale the instant the lock is released.
#[derive(Debug)]
pub struct TableInner {
    records: Vec<ProcessRecord>,
    terminated: Vec<ProcessRecord>,
    capacity: usize,
}

impl TableInner {
    fn new(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            terminated: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append at the logical end, preserving arrival order.
    pub fn insert(&mut self, record: ProcessRecord) -> Result<(), TableError> {
        if self.records.len() >= self.capacity {
            return Err(TableError::QueueFull(self.capacity));
        }
        if self.contains(record.pid) {
            return Err(TableError::DuplicatePid(record.pid));
        }
        self.records.push(record);
        Ok(())
    }

    /// Excise the record for `pid`, closing the gap it leaves. Later
    /// records keep their relative order, so FIFO-by-arrival survives
    /// compaction.
    pub fn remove(&mut self, pid: Pid) -> Option<ProcessRecord> {
        let index = self.records.iter().position(|r| r.pid == pid)?;
        Some(self.records.remove(index))
    }

    pub fn get(&self, pid: Pid) -> Option<&ProcessRecord> {
        self.records.iter().find(|r| r.pid == pid)
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut ProcessRecord> {
        self.records.iter_mut().find(|r| r.pid == pid)
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.records.iter().any(|r| r.pid == pid)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Waiting pids of one priority class, in arrival order.
    pub fn waiting_pids(&self, class: Priority) -> impl Iterator<Item = Pid> + '_ {
        self.records
            .iter()
            .filter(move |r| r.state == ProcessState::Waiting && r.priority == class)
            .map(|r| r.pid)
    }

    /// Running pids, in arrival order.
    pub fn running_pids(&self) -> impl Iterator<Item = Pid> + '_ {
        self.records
            .iter()
            .filter(|r| r.state == ProcessState::Running)
            .map(|r| r.pid)
    }

    pub fn records(&self) -> &[ProcessRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> std::slice::IterMut<'_, ProcessRecord> {
        self.records.iter_mut()
    }

    /// Append to the terminated log. Entries are never mutated afterwards;
    /// at capacity the oldest entry is dropped to keep the log bounded.
    pub fn push_terminated(&mut self, record: ProcessRecord) {
        if self.terminated.len() >= self.capacity {
            warn!(
                "Terminated log at capacity ({}); dropping oldest entry",
                self.capacity
            );
            self.terminated.remove(0);
        }
        self.terminated.push(record);
    }

    pub fn terminated(&self) -> &[ProcessRecord] {
        &self.terminated
    }

    pub fn drain_terminated(&mut self) -> Vec<ProcessRecord> {
        std::mem::take(&mut self.terminated)
    }
}

/// Shared handle to the table.
///
/// The single exclusive lock is the synchronization layer: admission, the
/// scheduler loop, and the reconciler all read and mutate through it, and
/// none of them gets a read-only fast path.
#[derive(Debug, Clone)]
pub struct ProcessTable {
    inner: Arc<Mutex<TableInner>>,
}

impl ProcessTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TableInner::new(capacity))),
        }
    }

    /// Enter the table's critical section.
    pub fn lock(&self) -> MutexGuard<'_, TableInner> {
        self.inner.lock()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
