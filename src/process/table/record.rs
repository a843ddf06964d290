/*!
 * Process Records
 * Per-process tracking state and the termination snapshot
 */

use crate::core::types::{Pid, Priority};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Process state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// Suspended, eligible for dispatch
    Waiting,
    /// Resumed for the current tick
    Running,
    /// Exited; lives only in the terminated log
    Finished,
}

/// One tracked process.
///
/// Created by admission, mutated by the dispatch/preempt phases and by the
/// reconciler; immutable once it reaches the terminated log.
#[derive(Debug, Clone)]
pub struct ProcessRecord {
    pub pid: Pid,
    pub command: String,
    /// Fixed at admission; never rewritten afterwards.
    pub priority: Priority,
    pub state: ProcessState,
    /// Start of the most recent run interval.
    pub started_at: Option<Instant>,
    /// End of the most recent run interval.
    pub ended_at: Option<Instant>,
    /// Cumulative time actually granted CPU.
    pub total_execution: Duration,
    /// Cumulative time spent tracked but not running.
    pub waiting: Duration,
}

impl ProcessRecord {
    /// `initial_wait` seeds the waiting time with the delay already imposed
    /// before the first scan can consider the record.
    pub fn new(pid: Pid, command: String, priority: Priority, initial_wait: Duration) -> Self {
        Self {
            pid,
            command,
            priority,
            state: ProcessState::Waiting,
            started_at: None,
            ended_at: None,
            total_execution: Duration::ZERO,
            waiting: initial_wait,
        }
    }
}

/// Snapshot published when a process is reconciled into the terminated log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TerminationRecord {
    pub pid: Pid,
    pub command: String,
    pub priority: Priority,
    pub execution_ms: u64,
    pub waiting_ms: u64,
}

impl From<&ProcessRecord> for TerminationRecord {
    fn from(record: &ProcessRecord) -> Self {
        Self {
            pid: record.pid,
            command: record.command.clone(),
            priority: record.priority,
            execution_ms: record.total_execution.as_millis() as u64,
            waiting_ms: record.waiting.as_millis() as u64,
        }
    }
}
