/*!
 * Dispatch Phases
 * One tick = select, sleep one quantum, preempt; every tick starts from a
 * fresh scan of the table
 */

use super::Scheduler;
use crate::core::types::{Pid, Priority, PRIORITY_MAX, PRIORITY_MIN};
use crate::process::table::ProcessState;
use log::debug;
use std::time::{Duration, Instant};

/// Outcome of one select phase, fed back into the preempt phase.
#[derive(Debug, Clone)]
pub struct Tick {
    /// Pids resumed this tick, in dispatch order.
    pub dispatched: Vec<Pid>,
    /// Class served this tick; `None` when nothing was waiting.
    pub class: Option<Priority>,
    /// How long the tick sleeps before preempting.
    pub quantum: Duration,
}

impl Scheduler {
    /// Select phase.
    ///
    /// Scans classes 1 through 4 and resumes up to NCPU waiting processes
    /// from the first nonempty class, FIFO by arrival. Once that class has
    /// used the slots (or run out of members), no other class is considered:
    /// dispatch is priority-exclusive, not priority-weighted.
    ///
    /// The scan and the resumes form one critical section; the directives
    /// are issued while the table lock is held so the reconciler cannot
    /// observe a half-dispatched tick.
    pub fn dispatch(&self) -> Tick {
        let mut table = self.table.lock();
        for class in PRIORITY_MIN..=PRIORITY_MAX {
            let picked: Vec<Pid> = table.waiting_pids(class).take(self.config.ncpu).collect();
            if picked.is_empty() {
                continue;
            }
            let now = Instant::now();
            for &pid in &picked {
                self.executor.resume(pid);
                if let Some(record) = table.get_mut(pid) {
                    record.state = ProcessState::Running;
                    record.started_at = Some(now);
                }
            }
            self.stats.add_dispatches(picked.len() as u64);
            debug!("Dispatched {:?} at priority {}", picked, class);
            // Lower classes run in proportionally shorter bursts.
            return Tick {
                quantum: self.config.quantum / u32::from(class),
                class: Some(class),
                dispatched: picked,
            };
        }
        Tick {
            dispatched: Vec::new(),
            class: None,
            quantum: self.config.quantum,
        }
    }

    /// Preempt phase.
    ///
    /// Suspends everything still running, folds the run interval into its
    /// execution time, and ages every record that sat the tick out. A
    /// record that exited mid-quantum was already reconciled away and is
    /// simply not seen here.
    pub fn preempt(&self, tick: &Tick) {
        let now = Instant::now();
        let mut table = self.table.lock();
        let mut preempted = 0u64;
        for record in table.records_mut() {
            match record.state {
                ProcessState::Running => {
                    self.executor.suspend(record.pid);
                    let ran = record
                        .started_at
                        .map(|t| now.saturating_duration_since(t))
                        .unwrap_or_default();
                    record.total_execution += ran;
                    record.ended_at = Some(now);
                    record.state = ProcessState::Waiting;
                    preempted += 1;
                }
                ProcessState::Waiting => {
                    // Everyone who sat out this tick waited for its quantum.
                    record.waiting += tick.quantum;
                }
                ProcessState::Finished => {}
            }
        }
        if preempted > 0 {
            self.stats.add_preemptions(preempted);
            debug!("Preempted {} process(es)", preempted);
        }
    }
}
