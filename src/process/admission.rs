/*!
 * Admission
 * Validates a submission, creates the OS process suspended, inserts the
 * table record, and nudges the scheduler
 */

use crate::core::config::{Policy, SchedulerConfig};
use crate::core::errors::{AdmissionError, AdmissionResult, TableError};
use crate::core::types::{Pid, Priority, DEFAULT_PRIORITY, PRIORITY_MAX, PRIORITY_MIN};
use crate::process::executor::ProcessExecutor;
use crate::process::table::{ProcessRecord, ProcessTable};
use crate::scheduler::stats::AtomicEngineStats;
use crate::scheduler::SchedulerHandle;
use log::{info, warn};
use std::sync::Arc;

/// The admission path shared with the interactive shell.
pub struct Admission {
    table: ProcessTable,
    executor: Arc<ProcessExecutor>,
    config: SchedulerConfig,
    scheduler: SchedulerHandle,
    stats: Arc<AtomicEngineStats>,
}

impl Admission {
    pub fn new(
        table: ProcessTable,
        executor: Arc<ProcessExecutor>,
        config: SchedulerConfig,
        scheduler: SchedulerHandle,
        stats: Arc<AtomicEngineStats>,
    ) -> Self {
        Self {
            table,
            executor,
            config,
            scheduler,
            stats,
        }
    }

    /// Admit `program` for scheduling.
    ///
    /// A priority outside [1,4] refuses the submission outright; it is
    /// never silently replaced with a default. `None` defaults to 1.
    /// Returns the OS pid of the newly created, still-suspended process.
    pub fn submit(
        &self,
        program: &str,
        args: &[String],
        priority: Option<i64>,
    ) -> AdmissionResult<Pid> {
        let requested = match priority {
            None => DEFAULT_PRIORITY,
            Some(p) if (i64::from(PRIORITY_MIN)..=i64::from(PRIORITY_MAX)).contains(&p) => {
                p as Priority
            }
            Some(p) => {
                self.stats.inc_rejected();
                return Err(AdmissionError::InvalidPriority(p));
            }
        };
        // Round-robin is the single-class degenerate case of the engine.
        let effective = match self.config.policy {
            Policy::RoundRobin => PRIORITY_MIN,
            Policy::Priority => requested,
        };

        // Refuse before spawning when the table is already full.
        if self.table.lock().is_full() {
            self.stats.inc_rejected();
            return Err(AdmissionError::QueueFull(self.config.capacity));
        }

        let pid = match self.executor.spawn_suspended(program, args) {
            Ok(pid) => pid,
            Err(e) => {
                self.stats.inc_rejected();
                return Err(e);
            }
        };

        // Waiting time is pre-seeded with the one quantum that passes
        // before the first scan can consider this record.
        let record = ProcessRecord::new(pid, program.to_string(), effective, self.config.quantum);
        let inserted = self.table.lock().insert(record);
        if let Err(e) = inserted {
            // The table filled (or collided) between the pre-check and the
            // insert; the spawned process must be discarded, not leaked.
            warn!("Discarding pid {} after failed insert: {}", pid, e);
            self.executor.kill(pid);
            self.executor.forget(pid);
            self.stats.inc_rejected();
            return Err(match e {
                TableError::QueueFull(capacity) => AdmissionError::QueueFull(capacity),
                TableError::DuplicatePid(p) => AdmissionError::SpawnFailed {
                    command: program.to_string(),
                    reason: format!("pid {p} is already tracked"),
                },
            });
        }

        self.stats.inc_admitted();
        info!(
            "Admitted '{}' (pid {}, priority {})",
            program, pid, effective
        );
        // Best-effort wake so a fresh submission is considered on the next
        // tick even from idle.
        self.scheduler.trigger();
        Ok(pid)
    }
}
