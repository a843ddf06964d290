/*!
 * Engine Configuration
 * Explicit construction-time configuration; no ambient globals
 */

use crate::core::errors::{SchedResult, SchedulerError};
use crate::core::types::DEFAULT_CAPACITY;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Scheduling policy
///
/// Round-robin is the degenerate single-class case of the same engine:
/// every admitted record is coerced to priority 1, so the priority scan
/// reduces to FIFO over one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    RoundRobin,
    Priority,
}

/// Engine configuration, validated at construction.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of processes resumable per tick.
    pub ncpu: usize,
    /// Base quantum; class `p` runs for `quantum / p` per tick.
    pub quantum: Duration,
    /// Bound on concurrently tracked processes.
    pub capacity: usize,
    pub policy: Policy,
}

impl SchedulerConfig {
    pub fn new(ncpu: usize, quantum: Duration) -> SchedResult<Self> {
        if ncpu == 0 {
            return Err(SchedulerError::Configuration(
                "NCPU must be positive".to_string(),
            ));
        }
        if quantum.is_zero() {
            return Err(SchedulerError::Configuration(
                "base quantum must be positive".to_string(),
            ));
        }
        Ok(Self {
            ncpu,
            quantum,
            capacity: DEFAULT_CAPACITY,
            policy: Policy::Priority,
        })
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            ncpu: 1,
            quantum: Duration::from_millis(100),
            capacity: DEFAULT_CAPACITY,
            policy: Policy::Priority,
        }
    }
}
