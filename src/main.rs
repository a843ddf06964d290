/*!
 * shellsched - Main Entry Point
 *
 * Interactive shell that multiplexes NCPU virtual CPUs across submitted
 * programs:
 * - submit <program> [priority]   admit a program (1 = highest .. 4)
 * - exit                          drain and report
 * - anything else                 passed through to the system shell
 */

use anyhow::Context;
use log::info;
use shellsched::shell::{self, Console, ShellCommand};
use shellsched::{
    Admission, Policy, ProcessExecutor, ProcessTable, ReaperTask, Scheduler, SchedulerConfig,
    SchedulerTask,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

fn parse_config() -> anyhow::Result<SchedulerConfig> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let round_robin = args.iter().any(|a| a == "--round-robin");
    let mut positional = args.iter().filter(|a| !a.starts_with("--"));

    let ncpu = match positional.next() {
        Some(v) => v
            .parse::<usize>()
            .context("NCPU must be a positive integer")?,
        None => std::env::var("SHELLSCHED_NCPU")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1),
    };
    let quantum_ms = match positional.next() {
        Some(v) => v
            .parse::<u64>()
            .context("the time quantum must be in milliseconds")?,
        None => std::env::var("SHELLSCHED_QUANTUM_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(100),
    };

    let policy = if round_robin {
        Policy::RoundRobin
    } else {
        Policy::Priority
    };
    Ok(SchedulerConfig::new(ncpu, Duration::from_millis(quantum_ms))?.with_policy(policy))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = parse_config()?;
    info!(
        "shellsched starting: ncpu={}, quantum={:?}, policy={:?}",
        config.ncpu, config.quantum, config.policy
    );

    let table = ProcessTable::new(config.capacity);
    let executor = Arc::new(ProcessExecutor::new());
    let scheduler = Scheduler::new(config.clone(), table.clone(), executor.clone());

    let (term_tx, mut term_rx) = mpsc::unbounded_channel();
    // The fallback poll bounds how long a lost exit signal can hide a
    // finished process.
    let reaper = ReaperTask::spawn(
        table.clone(),
        executor.clone(),
        scheduler.stats_handle(),
        term_tx,
        config.quantum * 10,
    )
    .context("failed to install the child-exit listener")?;
    let task = SchedulerTask::spawn(scheduler.clone());
    let admission = Admission::new(
        table.clone(),
        executor.clone(),
        config.clone(),
        task.handle(),
        scheduler.stats_handle(),
    );

    let console = Console::new();
    let printer_console = console.clone();
    let printer = tokio::spawn(async move {
        while let Some(record) = term_rx.recv().await {
            printer_console.line(format!(
                "Terminated pid {}: execution {} ms, waiting {} ms",
                record.pid, record.execution_ms, record.waiting_ms
            ));
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        console.prompt("shellsched$ ");
        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break, // EOF
        };
        match shell::parse_line(&line) {
            Ok(None) => {}
            Ok(Some(ShellCommand::Exit)) => break,
            Ok(Some(ShellCommand::Submit { program, priority })) => {
                match admission.submit(&program, &[], priority) {
                    Ok(pid) => console.line(format!("Submitted '{program}' as pid {pid}")),
                    Err(e) => console.line(format!("Submission refused: {e}")),
                }
            }
            Ok(Some(ShellCommand::Passthrough(command))) => {
                if let Some(code) = shell::run_passthrough(&command) {
                    if code != 0 {
                        console.line(format!("exit status {code}"));
                    }
                }
            }
            Err(e) => console.line(format!("Parse error: {e}")),
        }
    }

    info!("Shutting down: draining tracked processes");
    task.shutdown().await;
    scheduler.terminate_all(Duration::from_secs(2)).await;
    reaper.shutdown().await;
    printer.await.ok();

    let terminated = scheduler.drain_terminated();
    console.line(format!(
        "{} process(es) completed this session",
        terminated.len()
    ));
    for record in &terminated {
        console.line(format!(
            "Terminated pid {}: execution {} ms, waiting {} ms",
            record.pid,
            record.total_execution.as_millis(),
            record.waiting.as_millis()
        ));
    }

    let stats = scheduler.stats();
    info!(
        "Engine stats: {}",
        serde_json::to_string(&stats).unwrap_or_default()
    );
    Ok(())
}
