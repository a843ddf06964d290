/*!
 * Termination Reconciler
 * Dedicated task that reaps exited children and retires their records
 *
 * Exit notifications are consumed as events on a task, never inside a
 * signal handler, so the table lock and log calls carry no
 * async-signal-safety constraints. A periodic fallback poll bounds how
 * long a lost child-signal edge can hide a finished process.
 */

use super::stats::AtomicEngineStats;
use crate::core::types::Pid;
use crate::process::executor::ProcessExecutor;
use crate::process::table::{ProcessState, ProcessTable, TerminationRecord};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};

#[cfg(unix)]
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
#[cfg(unix)]
use nix::unistd::Pid as NixPid;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

/// Handle to the reconciler background task
pub struct ReaperTask {
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
    shutdown_initiated: AtomicBool,
}

impl ReaperTask {
    /// Spawn the reconciler. Fails only if the child-exit signal stream
    /// cannot be installed, which is fatal to the session: without exit
    /// notifications the table cannot stay consistent.
    #[cfg(unix)]
    pub fn spawn(
        table: ProcessTable,
        executor: Arc<ProcessExecutor>,
        stats: Arc<AtomicEngineStats>,
        notifications: mpsc::UnboundedSender<TerminationRecord>,
        poll_interval: Duration,
    ) -> std::io::Result<Self> {
        let sigchld = signal(SignalKind::child())?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(run_reaper_loop(
            table,
            executor,
            stats,
            notifications,
            sigchld,
            poll_interval,
            shutdown_rx,
        ));
        info!("Reaper task spawned (fallback poll every {:?})", poll_interval);
        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
            shutdown_initiated: AtomicBool::new(false),
        })
    }

    #[cfg(not(unix))]
    pub fn spawn(
        _table: ProcessTable,
        _executor: Arc<ProcessExecutor>,
        _stats: Arc<AtomicEngineStats>,
        _notifications: mpsc::UnboundedSender<TerminationRecord>,
        _poll_interval: Duration,
    ) -> std::io::Result<Self> {
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "child reaping is not supported on this platform",
        ))
    }

    /// Stop the reconciler after one final sweep. Consumes self.
    pub async fn shutdown(mut self) {
        self.shutdown_initiated.store(true, Ordering::SeqCst);
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Reaper task shutdown error: {}", e);
            } else {
                info!("Reaper task shutdown complete");
            }
        }
    }
}

impl Drop for ReaperTask {
    fn drop(&mut self) {
        if self.shutdown_initiated.load(Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.handle.take() {
            warn!(
                "ReaperTask dropped without calling shutdown() - aborting task. \
                 Use `reaper.shutdown().await` for graceful cleanup."
            );
            handle.abort();
        }
    }
}

#[cfg(unix)]
async fn run_reaper_loop(
    table: ProcessTable,
    executor: Arc<ProcessExecutor>,
    stats: Arc<AtomicEngineStats>,
    notifications: mpsc::UnboundedSender<TerminationRecord>,
    mut sigchld: tokio::signal::unix::Signal,
    poll_interval: Duration,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut poll = tokio::time::interval(poll_interval);
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    info!("Reaper loop started");

    loop {
        tokio::select! {
            _ = sigchld.recv() => {
                reap_exited(&table, &executor, &stats, &notifications, false);
            }
            _ = poll.tick() => {
                reap_exited(&table, &executor, &stats, &notifications, true);
            }
            _ = &mut shutdown_rx => {
                // Final sweep so shutdown-time kills are still accounted.
                reap_exited(&table, &executor, &stats, &notifications, false);
                info!("Reaper loop stopped");
                return;
            }
        }
    }
}

/// Drain every already-exited child without blocking. `via_poll` marks
/// reaps that arrived through the fallback poll rather than a signal edge.
#[cfg(unix)]
fn reap_exited(
    table: &ProcessTable,
    executor: &ProcessExecutor,
    stats: &AtomicEngineStats,
    notifications: &mpsc::UnboundedSender<TerminationRecord>,
    via_poll: bool,
) {
    loop {
        match waitpid(None::<NixPid>, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::Exited(pid, code)) => {
                debug!("Child {} exited with code {}", pid, code);
                reconcile(table, executor, stats, notifications, pid.as_raw() as Pid, via_poll);
            }
            Ok(WaitStatus::Signaled(pid, sig, _)) => {
                debug!("Child {} terminated by {:?}", pid, sig);
                reconcile(table, executor, stats, notifications, pid.as_raw() as Pid, via_poll);
            }
            Ok(WaitStatus::StillAlive) => break,
            // Stop/continue reports are not exits.
            Ok(_) => break,
            Err(nix::errno::Errno::ECHILD) => break,
            Err(e) => {
                warn!("waitpid failed: {}", e);
                break;
            }
        }
    }
}

/// Retire one exited pid: finalize accounting, move the record to the
/// terminated log, publish a termination notification. A pid that is no
/// longer tracked (already reconciled, or never admitted) is ignored, so
/// reconciling twice is a no-op.
///
/// The table mutation is one critical section, indistinguishable from a
/// scheduler-loop mutation from the table's point of view.
fn reconcile(
    table: &ProcessTable,
    executor: &ProcessExecutor,
    stats: &AtomicEngineStats,
    notifications: &mpsc::UnboundedSender<TerminationRecord>,
    pid: Pid,
    via_poll: bool,
) {
    executor.forget(pid);
    let retired = {
        let mut table = table.lock();
        match table.remove(pid) {
            None => None,
            Some(mut record) => {
                let now = Instant::now();
                if record.state == ProcessState::Running {
                    // The final partial interval counts toward both totals.
                    let tail = record
                        .started_at
                        .map(|t| now.saturating_duration_since(t))
                        .unwrap_or_default();
                    record.total_execution += tail;
                    record.waiting += tail;
                }
                record.ended_at = Some(now);
                record.state = ProcessState::Finished;
                table.push_terminated(record.clone());
                Some(record)
            }
        }
    };

    if let Some(record) = retired {
        stats.inc_reaped();
        if via_poll {
            warn!(
                "Reconciled pid {} via fallback poll; its exit notification was late or lost",
                record.pid
            );
        }
        info!(
            "Reconciled pid {} ({:?} executed, {:?} waited)",
            record.pid, record.total_execution, record.waiting
        );
        let _ = notifications.send(TerminationRecord::from(&record));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::table::ProcessRecord;

    const FAKE_PID: Pid = 10_000_123;

    fn fixture() -> (
        ProcessTable,
        ProcessExecutor,
        AtomicEngineStats,
        mpsc::UnboundedSender<TerminationRecord>,
        mpsc::UnboundedReceiver<TerminationRecord>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            ProcessTable::new(10),
            ProcessExecutor::new(),
            AtomicEngineStats::new(),
            tx,
            rx,
        )
    }

    #[test]
    fn test_reconcile_retires_running_record() {
        let (table, executor, stats, tx, mut rx) = fixture();
        {
            let mut inner = table.lock();
            let mut record =
                ProcessRecord::new(FAKE_PID, "fake".into(), 1, Duration::from_millis(20));
            record.state = ProcessState::Running;
            record.started_at = Some(Instant::now());
            inner.insert(record).unwrap();
        }

        // Let the pretend run interval accumulate some wall time.
        std::thread::sleep(Duration::from_millis(30));
        reconcile(&table, &executor, &stats, &tx, FAKE_PID, false);

        assert!(table.is_empty());
        let inner = table.lock();
        assert_eq!(inner.terminated().len(), 1);
        let finished = &inner.terminated()[0];
        assert_eq!(finished.state, ProcessState::Finished);
        // The final interval since started_at landed in both totals.
        assert!(finished.total_execution >= Duration::from_millis(30));
        assert!(finished.waiting >= Duration::from_millis(50));
        drop(inner);

        let notification = rx.try_recv().unwrap();
        assert_eq!(notification.pid, FAKE_PID);
        assert_eq!(stats.snapshot().reaped, 1);
    }

    #[test]
    fn test_reconcile_waiting_record_adds_no_tail() {
        let (table, executor, stats, tx, _rx) = fixture();
        {
            let mut inner = table.lock();
            let mut record = ProcessRecord::new(FAKE_PID, "fake".into(), 2, Duration::ZERO);
            // Stale start stamp from an earlier run interval; the record is
            // back in Waiting, so it must not count toward execution.
            record.started_at = Some(Instant::now());
            inner.insert(record).unwrap();
        }

        std::thread::sleep(Duration::from_millis(20));
        reconcile(&table, &executor, &stats, &tx, FAKE_PID, false);

        let inner = table.lock();
        assert_eq!(inner.terminated()[0].total_execution, Duration::ZERO);
    }

    #[test]
    fn test_reconcile_twice_is_noop() {
        let (table, executor, stats, tx, mut rx) = fixture();
        table
            .lock()
            .insert(ProcessRecord::new(FAKE_PID, "fake".into(), 1, Duration::ZERO))
            .unwrap();

        reconcile(&table, &executor, &stats, &tx, FAKE_PID, false);
        reconcile(&table, &executor, &stats, &tx, FAKE_PID, false);

        assert_eq!(table.lock().terminated().len(), 1);
        assert_eq!(stats.snapshot().reaped, 1);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_reconcile_unknown_pid_is_ignored() {
        let (table, executor, stats, tx, mut rx) = fixture();
        reconcile(&table, &executor, &stats, &tx, 4_999_999, false);
        assert!(table.lock().terminated().is_empty());
        assert_eq!(stats.snapshot().reaped, 0);
        assert!(rx.try_recv().is_err());
    }
}
