/*!
 * Scheduler Task
 * Background tick loop with a command channel
 *
 * Shutdown follows a graceful-with-fallback pattern: `shutdown().await`
 * stops the loop cleanly and consumes the handle; if the task is dropped
 * without it, Drop aborts the loop and logs a warning.
 */

use super::Scheduler;
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Control messages for the scheduler task
#[derive(Debug, Clone)]
pub enum SchedulerCommand {
    /// Best-effort wake; cuts an idle sleep short
    Trigger,
    /// Stop ticking until resumed
    Pause,
    /// Resume ticking
    Resume,
    /// Stop the loop
    Shutdown,
}

/// Cloneable sender used by the admission path to nudge the loop.
///
/// Wake notifications are hints: the loop free-runs on its own cadence and
/// the hint only matters when it is idle-sleeping, so a send that fails
/// (loop already gone) is silently dropped.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    command_tx: mpsc::UnboundedSender<SchedulerCommand>,
}

impl SchedulerHandle {
    pub fn trigger(&self) {
        let _ = self.command_tx.send(SchedulerCommand::Trigger);
    }

    /// Handle wired to nothing; sends vanish. Legal because wakes are
    /// best-effort, and convenient for driving the engine manually.
    pub fn disconnected() -> Self {
        let (command_tx, _command_rx) = mpsc::unbounded_channel();
        Self { command_tx }
    }
}

/// Handle to the scheduler background task
pub struct SchedulerTask {
    command_tx: mpsc::UnboundedSender<SchedulerCommand>,
    handle: Option<tokio::task::JoinHandle<()>>,
    shutdown_initiated: AtomicBool,
}

impl SchedulerTask {
    /// Spawn the tick loop over `scheduler`.
    pub fn spawn(scheduler: Scheduler) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_scheduler_loop(scheduler, command_rx));
        info!("Scheduler task spawned");
        Self {
            command_tx,
            handle: Some(handle),
            shutdown_initiated: AtomicBool::new(false),
        }
    }

    /// Sender half for the admission path.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            command_tx: self.command_tx.clone(),
        }
    }

    /// Trigger an immediate rescan if the loop is idle.
    pub fn trigger(&self) {
        let _ = self.command_tx.send(SchedulerCommand::Trigger);
    }

    /// Pause ticking (already-running processes are preempted first on the
    /// next wakeup; nothing new is dispatched while paused).
    pub fn pause(&self) {
        let _ = self.command_tx.send(SchedulerCommand::Pause);
    }

    /// Resume ticking.
    pub fn resume(&self) {
        let _ = self.command_tx.send(SchedulerCommand::Resume);
    }

    /// Stop the loop and wait for it to finish. Consumes self, so a
    /// stopped task cannot be reused or shut down twice.
    pub async fn shutdown(mut self) {
        self.shutdown_initiated.store(true, Ordering::SeqCst);
        let _ = self.command_tx.send(SchedulerCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Scheduler task shutdown error: {}", e);
            } else {
                info!("Scheduler task shutdown complete");
            }
        }
    }
}

impl Drop for SchedulerTask {
    fn drop(&mut self) {
        if self.shutdown_initiated.load(Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.handle.take() {
            warn!(
                "SchedulerTask dropped without calling shutdown() - aborting loop. \
                 Use `task.shutdown().await` for graceful cleanup."
            );
            handle.abort();
        }
    }
}

/// The tick loop: select, sleep one quantum, preempt, repeat.
async fn run_scheduler_loop(
    scheduler: Scheduler,
    mut command_rx: mpsc::UnboundedReceiver<SchedulerCommand>,
) {
    let mut paused = false;
    info!(
        "Scheduler loop started (ncpu={}, base quantum={:?})",
        scheduler.config.ncpu, scheduler.config.quantum
    );

    loop {
        // Apply everything already queued before the next tick.
        loop {
            match command_rx.try_recv() {
                Ok(SchedulerCommand::Shutdown) => {
                    info!("Scheduler loop stopped");
                    return;
                }
                Ok(SchedulerCommand::Pause) => paused = true,
                Ok(SchedulerCommand::Resume) => paused = false,
                Ok(SchedulerCommand::Trigger) => {}
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    warn!("Scheduler command channel closed; stopping loop");
                    return;
                }
            }
        }

        if paused {
            match command_rx.recv().await {
                Some(SchedulerCommand::Resume) => paused = false,
                Some(SchedulerCommand::Shutdown) | None => {
                    info!("Scheduler loop stopped");
                    return;
                }
                Some(_) => {}
            }
            continue;
        }

        scheduler.stats.inc_ticks();
        let tick = scheduler.dispatch();

        if tick.dispatched.is_empty() {
            // Idle: free-run on the base cadence, but let a wake cut the
            // sleep short so a fresh submission is scanned immediately.
            tokio::select! {
                _ = tokio::time::sleep(tick.quantum) => {}
                command = command_rx.recv() => match command {
                    Some(SchedulerCommand::Shutdown) | None => {
                        info!("Scheduler loop stopped");
                        return;
                    }
                    Some(SchedulerCommand::Pause) => paused = true,
                    Some(_) => {}
                },
            }
            continue;
        }

        // The only engine-initiated blocking point; the table lock is not
        // held across it.
        tokio::time::sleep(tick.quantum).await;
        scheduler.preempt(&tick);
    }
}
