/*!
 * shellsched
 * User-space process scheduling: a shared process table, strict
 * priority-exclusive dispatch, SIGSTOP/SIGCONT preemption, and
 * asynchronous termination reconciliation
 */

pub mod core;
pub mod process;
pub mod scheduler;
pub mod shell;

// Re-exports
pub use crate::core::config::{Policy, SchedulerConfig};
pub use crate::core::errors::{AdmissionError, SchedulerError, TableError};
pub use crate::core::types::{Pid, Priority};
pub use crate::process::admission::Admission;
pub use crate::process::executor::ProcessExecutor;
pub use crate::process::table::{ProcessRecord, ProcessState, ProcessTable, TerminationRecord};
pub use crate::scheduler::{
    EngineStats, ReaperTask, Scheduler, SchedulerCommand, SchedulerHandle, SchedulerTask, Tick,
};
