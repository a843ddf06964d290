/*!
 * Scheduling Engine
 * Priority-exclusive dispatch over the shared process table with
 * OS-level suspend/resume preemption
 */

mod dispatch;
mod reaper;
pub mod stats;
mod task;

pub use dispatch::Tick;
pub use reaper::ReaperTask;
pub use stats::{AtomicEngineStats, EngineStats};
pub use task::{SchedulerCommand, SchedulerHandle, SchedulerTask};

use crate::core::config::SchedulerConfig;
use crate::process::executor::ProcessExecutor;
use crate::process::table::{ProcessRecord, ProcessTable};
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

/// The dispatch engine.
///
/// Holds no scheduling state of its own between ticks; the table is the
/// single source of truth and every tick starts from a fresh scan.
#[derive(Clone)]
pub struct Scheduler {
    config: SchedulerConfig,
    table: ProcessTable,
    executor: Arc<ProcessExecutor>,
    stats: Arc<AtomicEngineStats>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, table: ProcessTable, executor: Arc<ProcessExecutor>) -> Self {
        info!(
            "Scheduler initialized: ncpu={}, base quantum={:?}, capacity={}, policy={:?}",
            config.ncpu, config.quantum, config.capacity, config.policy
        );
        Self {
            config,
            table,
            executor,
            stats: Arc::new(AtomicEngineStats::new()),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn table(&self) -> &ProcessTable {
        &self.table
    }

    pub fn executor(&self) -> &Arc<ProcessExecutor> {
        &self.executor
    }

    /// Snapshot of the engine counters.
    pub fn stats(&self) -> EngineStats {
        self.stats.snapshot()
    }

    /// Shared handle to the live counters, for the admission path and the
    /// reconciler.
    pub fn stats_handle(&self) -> Arc<AtomicEngineStats> {
        Arc::clone(&self.stats)
    }

    /// Teardown: kill every still-tracked OS process, then wait up to
    /// `grace` for the reconciler to drain them from the table. Nothing is
    /// silently abandoned.
    pub async fn terminate_all(&self, grace: Duration) {
        let pids = self.executor.tracked_pids();
        if !pids.is_empty() {
            info!("Terminating {} tracked process(es)", pids.len());
        }
        for pid in pids {
            self.executor.kill(pid);
        }
        let deadline = tokio::time::Instant::now() + grace;
        while !self.table.is_empty() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let left = self.table.len();
        if left > 0 {
            warn!("{} process(es) left unreconciled at shutdown", left);
        }
    }

    /// Drain the terminated log for final reporting.
    pub fn drain_terminated(&self) -> Vec<ProcessRecord> {
        self.table.lock().drain_terminated()
    }
}
