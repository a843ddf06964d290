/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use crate::core::types::Pid;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Process-table errors with serialization support
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum TableError {
    #[error("Process table full: capacity {0} reached")]
    #[diagnostic(
        code(table::queue_full),
        help("Wait for tracked processes to terminate before submitting more.")
    )]
    QueueFull(usize),

    #[error("Process {0} is already tracked")]
    #[diagnostic(
        code(table::duplicate_pid),
        help("A pid may appear at most once in the table.")
    )]
    DuplicatePid(Pid),
}

/// Admission errors with serialization support
///
/// All three variants are recoverable: the submission is refused, the table
/// is left unchanged, and the caller may retry.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum AdmissionError {
    #[error("Process table full: capacity {0} reached")]
    #[diagnostic(
        code(admission::queue_full),
        help("Wait for tracked processes to terminate before submitting more.")
    )]
    QueueFull(usize),

    #[error("Invalid priority {0}: must be between 1 and 4")]
    #[diagnostic(
        code(admission::invalid_priority),
        help("Priority 1 is the highest class, 4 the lowest. Omit it to default to 1.")
    )]
    InvalidPriority(i64),

    #[error("Failed to spawn '{command}': {reason}")]
    #[diagnostic(
        code(admission::spawn_failed),
        help("Check that the program exists and is executable.")
    )]
    SpawnFailed { command: String, reason: String },
}

/// Engine-level errors. Unlike admission failures these are not tied to a
/// single submission; a configuration or signal-plumbing fault means the
/// scheduling session cannot start (or continue) safely.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum SchedulerError {
    #[error("Invalid configuration: {0}")]
    #[diagnostic(
        code(scheduler::configuration),
        help("NCPU and the base quantum must both be positive.")
    )]
    Configuration(String),

    #[error("Child-exit listener setup failed: {0}")]
    #[diagnostic(
        code(scheduler::signal_setup),
        help("Without exit notifications the table cannot stay consistent; aborting is the only safe option.")
    )]
    SignalSetup(String),
}

/// Result type for admission operations
pub type AdmissionResult<T> = std::result::Result<T, AdmissionError>;

/// Result type for engine operations
pub type SchedResult<T> = std::result::Result<T, SchedulerError>;
