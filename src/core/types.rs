/*!
 * Core Types
 * Identifiers and bounds shared across the engine
 */

/// OS process id; the table key. Submitted programs are tracked by the pid
/// the OS hands back at spawn time.
pub type Pid = u32;

/// Priority class, 1 (highest) through 4 (lowest). Fixed at admission.
pub type Priority = u8;

pub const PRIORITY_MIN: Priority = 1;
pub const PRIORITY_MAX: Priority = 4;

/// Priority assigned when a submission names none.
pub const DEFAULT_PRIORITY: Priority = PRIORITY_MIN;

/// Default bound on concurrently tracked processes.
pub const DEFAULT_CAPACITY: usize = 100;
