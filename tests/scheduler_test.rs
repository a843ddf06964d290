/*!
 * Scheduler Integration Tests
 * End-to-end dispatch, preemption, and reconciliation against real OS
 * processes
 *
 * Everything here runs serially: the reconciler reaps with waitpid(-1),
 * which is process-global state.
 */

use pretty_assertions::assert_eq;
use serial_test::serial;
use shellsched::{
    Admission, AdmissionError, Policy, ProcessExecutor, ProcessState, ProcessTable, ReaperTask,
    Scheduler, SchedulerConfig, SchedulerHandle, TerminationRecord,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

struct Harness {
    scheduler: Scheduler,
    admission: Admission,
    reaper: Option<ReaperTask>,
    term_rx: mpsc::UnboundedReceiver<TerminationRecord>,
}

async fn harness(config: SchedulerConfig, with_reaper: bool) -> Harness {
    let table = ProcessTable::new(config.capacity);
    let executor = Arc::new(ProcessExecutor::new());
    let scheduler = Scheduler::new(config.clone(), table.clone(), executor.clone());
    let (term_tx, term_rx) = mpsc::unbounded_channel();
    let reaper = if with_reaper {
        Some(
            ReaperTask::spawn(
                table.clone(),
                executor.clone(),
                scheduler.stats_handle(),
                term_tx,
                Duration::from_millis(200),
            )
            .expect("reaper spawn"),
        )
    } else {
        None
    };
    let admission = Admission::new(
        table,
        executor,
        config,
        SchedulerHandle::disconnected(),
        scheduler.stats_handle(),
    );
    Harness {
        scheduler,
        admission,
        reaper,
        term_rx,
    }
}

async fn teardown(h: Harness) {
    let grace = if h.reaper.is_some() {
        Duration::from_secs(2)
    } else {
        Duration::from_millis(50)
    };
    h.scheduler.terminate_all(grace).await;
    if let Some(reaper) = h.reaper {
        reaper.shutdown().await;
    }
}

fn submit_sleep(h: &Harness, seconds: &str, priority: Option<i64>) -> u32 {
    h.admission
        .submit("sleep", &[seconds.to_string()], priority)
        .expect("submit")
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn test_priority_one_dispatched_before_lower_classes() {
    let config = SchedulerConfig::new(1, Duration::from_millis(50)).unwrap();
    let h = harness(config, false).await;

    // Arrival order deliberately inverts priority order.
    let p3 = submit_sleep(&h, "5", Some(3));
    let p2 = submit_sleep(&h, "5", Some(2));
    let p1 = submit_sleep(&h, "5", Some(1));

    let tick = h.scheduler.dispatch();
    assert_eq!(tick.class, Some(1));
    assert_eq!(tick.dispatched, vec![p1]);

    {
        let table = h.scheduler.table().lock();
        let running: Vec<u32> = table.running_pids().collect();
        assert_eq!(running, vec![p1]);
        assert_eq!(table.get(p2).unwrap().state, ProcessState::Waiting);
        assert_eq!(table.get(p3).unwrap().state, ProcessState::Waiting);
    }

    teardown(h).await;
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn test_fifo_by_arrival_within_one_class() {
    let config = SchedulerConfig::new(1, Duration::from_millis(20)).unwrap();
    let h = harness(config, false).await;

    let a = submit_sleep(&h, "5", Some(1));
    let _b = submit_sleep(&h, "5", Some(1));

    // The head of the class is re-dispatched every tick until it leaves
    // the table; B never overtakes A.
    for _ in 0..3 {
        let tick = h.scheduler.dispatch();
        assert_eq!(tick.dispatched, vec![a]);
        tokio::time::sleep(tick.quantum).await;
        h.scheduler.preempt(&tick);
    }

    teardown(h).await;
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn test_submission_at_capacity_is_refused_and_discarded() {
    let config = SchedulerConfig::new(1, Duration::from_millis(50))
        .unwrap()
        .with_capacity(3);
    let h = harness(config, false).await;

    for _ in 0..3 {
        submit_sleep(&h, "5", Some(1));
    }
    let refused = h
        .admission
        .submit("sleep", &["5".to_string()], Some(1));
    assert_eq!(refused, Err(AdmissionError::QueueFull(3)));

    // Exactly the admitted three remain live and tracked.
    assert_eq!(h.scheduler.table().len(), 3);
    assert_eq!(h.scheduler.executor().count(), 3);

    teardown(h).await;
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn test_out_of_range_priority_counts_as_rejection() {
    let config = SchedulerConfig::new(1, Duration::from_millis(50)).unwrap();
    let h = harness(config, false).await;

    let refused = h.admission.submit("sleep", &["1".to_string()], Some(5));
    assert_eq!(refused, Err(AdmissionError::InvalidPriority(5)));
    assert_eq!(h.scheduler.table().len(), 0);
    assert_eq!(h.scheduler.stats().rejected, 1);

    teardown(h).await;
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn test_round_robin_collapses_to_one_class() {
    let config = SchedulerConfig::new(1, Duration::from_millis(50))
        .unwrap()
        .with_policy(Policy::RoundRobin);
    let h = harness(config, false).await;

    let a = submit_sleep(&h, "5", Some(2));
    let b = submit_sleep(&h, "5", Some(4));

    {
        let table = h.scheduler.table().lock();
        assert_eq!(table.get(a).unwrap().priority, 1);
        assert_eq!(table.get(b).unwrap().priority, 1);
    }
    let tick = h.scheduler.dispatch();
    assert_eq!(tick.class, Some(1));
    // Full base quantum: no inverse scaling in the degenerate case.
    assert_eq!(tick.quantum, Duration::from_millis(50));

    teardown(h).await;
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn test_lower_class_waits_until_priority_one_finishes() {
    let config = SchedulerConfig::new(1, Duration::from_millis(50)).unwrap();
    let h = harness(config, true).await;

    let p1 = submit_sleep(&h, "0.12", Some(1));
    let p2 = submit_sleep(&h, "0.05", Some(2));

    let mut h = h;
    let mut saw_p2_tick = false;
    for _ in 0..100 {
        if h.scheduler.table().is_empty() {
            break;
        }
        let tick = h.scheduler.dispatch();
        if let Some(class) = tick.class {
            if class == 2 {
                // P2 may only run once P1 has left priority-1 contention.
                assert!(!h.scheduler.table().lock().contains(p1));
                saw_p2_tick = true;
            } else {
                assert_eq!(class, 1);
            }
        }
        tokio::time::sleep(tick.quantum).await;
        h.scheduler.preempt(&tick);
    }

    assert!(h.scheduler.table().is_empty(), "processes did not drain");
    assert!(saw_p2_tick, "priority-2 process never ran");

    // Reconciliation order follows completion order.
    let first = h.term_rx.recv().await.unwrap();
    let second = h.term_rx.recv().await.unwrap();
    assert_eq!(first.pid, p1);
    assert_eq!(second.pid, p2);

    teardown(h).await;
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn test_execution_time_tracks_wall_clock_within_tolerance() {
    let config = SchedulerConfig::new(1, Duration::from_millis(50)).unwrap();
    let h = harness(config, true).await;

    let pid = submit_sleep(&h, "0.2", Some(1));

    let mut h = h;
    for _ in 0..100 {
        if h.scheduler.table().is_empty() {
            break;
        }
        let tick = h.scheduler.dispatch();
        tokio::time::sleep(tick.quantum).await;
        h.scheduler.preempt(&tick);
    }

    let record = h.term_rx.recv().await.unwrap();
    assert_eq!(record.pid, pid);
    // Ran essentially uninterrupted, so recorded execution approximates
    // the 200ms the program actually slept, within quantum rounding.
    assert!(
        record.execution_ms >= 120 && record.execution_ms <= 1000,
        "execution_ms out of tolerance: {}",
        record.execution_ms
    );
    // Waiting was pre-seeded with one base quantum at admission.
    assert!(record.waiting_ms >= 50);

    teardown(h).await;
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn test_exit_mid_quantum_is_reconciled_before_preemption() {
    let config = SchedulerConfig::new(1, Duration::from_millis(400)).unwrap();
    let h = harness(config, true).await;

    let pid = submit_sleep(&h, "0.05", Some(1));

    let tick = h.scheduler.dispatch();
    assert_eq!(tick.dispatched, vec![pid]);

    // The process exits ~50ms in; the reconciler retires it long before
    // the 400ms quantum elapses.
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(h.scheduler.table().is_empty());
    assert_eq!(h.scheduler.table().lock().terminated().len(), 1);

    // The preempt sweep finds nothing left to suspend.
    h.scheduler.preempt(&tick);
    assert_eq!(h.scheduler.stats().preemptions, 0);
    assert_eq!(h.scheduler.stats().reaped, 1);

    let mut h = h;
    let record = h.term_rx.recv().await.unwrap();
    assert_eq!(record.pid, pid);

    teardown(h).await;
}
