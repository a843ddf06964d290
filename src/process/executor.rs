/*!
 * Process Executor
 * Spawns submitted programs stopped-at-birth and carries the
 * suspend/resume/kill directives the scheduler issues
 */

use crate::core::errors::AdmissionError;
use crate::core::types::Pid;
use dashmap::DashMap;
use log::{info, warn};
use std::sync::Arc;

#[cfg(unix)]
use nix::sys::signal::{kill, raise, Signal as UnixSignal};
#[cfg(unix)]
use nix::unistd::Pid as NixPid;
#[cfg(unix)]
use std::os::unix::process::CommandExt;
#[cfg(unix)]
use std::process::{Command, Stdio};

/// A tracked OS process
#[derive(Debug, Clone)]
pub struct TrackedProcess {
    pub pid: Pid,
    pub command: String,
}

/// Manages OS process execution
pub struct ProcessExecutor {
    processes: Arc<DashMap<Pid, TrackedProcess>>,
}

impl ProcessExecutor {
    pub fn new() -> Self {
        info!("Process executor initialized");
        Self {
            processes: Arc::new(DashMap::new()),
        }
    }

    /// Spawn `command` with SIGSTOP raised in the child before exec: the
    /// process exists but consumes no CPU until the scheduler first
    /// resumes it.
    #[cfg(unix)]
    pub fn spawn_suspended(&self, command: &str, args: &[String]) -> Result<Pid, AdmissionError> {
        self.validate_command(command)?;

        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        // Safety: the hook only raises a signal, which is async-signal-safe.
        unsafe {
            cmd.pre_exec(|| {
                raise(UnixSignal::SIGSTOP).map_err(|e| std::io::Error::from_raw_os_error(e as i32))
            });
        }

        let child = cmd.spawn().map_err(|e| AdmissionError::SpawnFailed {
            command: command.to_string(),
            reason: e.to_string(),
        })?;
        let pid = child.id();
        // The reconciler owns reaping via waitpid; the handle is not kept.
        drop(child);

        self.processes.insert(
            pid,
            TrackedProcess {
                pid,
                command: command.to_string(),
            },
        );
        info!("Spawned '{}' suspended (pid {})", command, pid);
        Ok(pid)
    }

    #[cfg(not(unix))]
    pub fn spawn_suspended(&self, command: &str, _args: &[String]) -> Result<Pid, AdmissionError> {
        Err(AdmissionError::SpawnFailed {
            command: command.to_string(),
            reason: "suspended spawn is not supported on this platform".to_string(),
        })
    }

    /// Resume a suspended process (SIGCONT).
    pub fn resume(&self, pid: Pid) -> bool {
        self.signal(pid, ResumeOrSuspend::Resume)
    }

    /// Suspend a running process (SIGSTOP).
    pub fn suspend(&self, pid: Pid) -> bool {
        self.signal(pid, ResumeOrSuspend::Suspend)
    }

    /// Kill a tracked process outright. SIGKILL terminates even a stopped
    /// process, so no preceding SIGCONT is required.
    #[cfg(unix)]
    pub fn kill(&self, pid: Pid) -> bool {
        match kill(NixPid::from_raw(pid as i32), UnixSignal::SIGKILL) {
            Ok(_) => {
                info!("Killed pid {}", pid);
                true
            }
            Err(e) => {
                warn!("Failed to kill pid {}: {}", pid, e);
                false
            }
        }
    }

    #[cfg(not(unix))]
    pub fn kill(&self, pid: Pid) -> bool {
        warn!("Process kill not supported on this platform (pid {})", pid);
        false
    }

    #[cfg(unix)]
    fn signal(&self, pid: Pid, directive: ResumeOrSuspend) -> bool {
        let signal = match directive {
            ResumeOrSuspend::Resume => UnixSignal::SIGCONT,
            ResumeOrSuspend::Suspend => UnixSignal::SIGSTOP,
        };
        match kill(NixPid::from_raw(pid as i32), signal) {
            Ok(_) => true,
            Err(e) => {
                // The process may have exited between the scan and the
                // directive; the reconciler will retire it.
                warn!("Failed to send {:?} to pid {}: {}", signal, pid, e);
                false
            }
        }
    }

    #[cfg(not(unix))]
    fn signal(&self, pid: Pid, _directive: ResumeOrSuspend) -> bool {
        warn!(
            "Process suspend/resume not supported on this platform (pid {})",
            pid
        );
        false
    }

    /// Stop tracking `pid` (after reconciliation or a discarded spawn).
    pub fn forget(&self, pid: Pid) -> Option<TrackedProcess> {
        self.processes.remove(&pid).map(|(_, p)| p)
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.processes.contains_key(&pid)
    }

    pub fn count(&self) -> usize {
        self.processes.len()
    }

    pub fn tracked_pids(&self) -> Vec<Pid> {
        self.processes.iter().map(|entry| *entry.key()).collect()
    }

    /// Validate command for security
    fn validate_command(&self, command: &str) -> Result<(), AdmissionError> {
        if command.trim().is_empty() {
            return Err(AdmissionError::SpawnFailed {
                command: command.to_string(),
                reason: "empty command".to_string(),
            });
        }

        // Submissions name a program directly; shell metacharacters mean
        // someone expected shell interpretation they will not get.
        let dangerous_chars = [';', '|', '&', '\n', '\r', '\0', '`', '$', '(', ')'];
        if dangerous_chars.iter().any(|&c| command.contains(c)) {
            return Err(AdmissionError::SpawnFailed {
                command: command.to_string(),
                reason: "command contains shell metacharacters".to_string(),
            });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum ResumeOrSuspend {
    Resume,
    Suspend,
}

impl Clone for ProcessExecutor {
    fn clone(&self) -> Self {
        Self {
            processes: Arc::clone(&self.processes),
        }
    }
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new()
    }
}
