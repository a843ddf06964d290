/*!
 * Shell Surface
 * Line tokenizer for the interactive collaborator and the serialized
 * console writer
 */

use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;
use thiserror::Error;

/// One tokenized input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    /// `submit <program> [priority]`
    Submit {
        program: String,
        priority: Option<i64>,
    },
    /// `exit`: drain and shut down
    Exit,
    /// Anything else is handed to the system shell untouched
    Passthrough(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("submit requires a program name")]
    MissingProgram,

    #[error("priority '{0}' is not an integer")]
    PriorityNotNumeric(String),
}

/// Tokenize one input line. Empty lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<ShellCommand>, ParseError> {
    let mut tokens = line.split_whitespace();
    let head = match tokens.next() {
        Some(head) => head,
        None => return Ok(None),
    };

    match head {
        "exit" => Ok(Some(ShellCommand::Exit)),
        "submit" => {
            let program = tokens
                .next()
                .ok_or(ParseError::MissingProgram)?
                .to_string();
            let priority = match tokens.next() {
                None => None,
                Some(token) => Some(
                    token
                        .parse::<i64>()
                        .map_err(|_| ParseError::PriorityNotNumeric(token.to_string()))?,
                ),
            };
            Ok(Some(ShellCommand::Submit { program, priority }))
        }
        _ => Ok(Some(ShellCommand::Passthrough(line.trim().to_string()))),
    }
}

/// Run a non-scheduler command through the system shell.
///
/// The reconciler owns child reaping, so the exit status may already be
/// gone by the time the wait happens; that case reports `None`.
pub fn run_passthrough(command: &str) -> Option<i32> {
    match std::process::Command::new("sh")
        .arg("-c")
        .arg(command)
        .status()
    {
        Ok(status) => status.code(),
        Err(e) => {
            log::debug!("Passthrough wait failed: {}", e);
            None
        }
    }
}

/// Serialized console writer.
///
/// Status lines are strictly ordered with respect to each other; the lock
/// imposes no ordering against table mutations.
#[derive(Debug, Clone)]
pub struct Console {
    lock: Arc<Mutex<()>>,
}

impl Console {
    pub fn new() -> Self {
        Self {
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn line(&self, message: impl AsRef<str>) {
        let _guard = self.lock.lock();
        println!("{}", message.as_ref());
    }

    pub fn prompt(&self, prompt: &str) {
        let _guard = self.lock.lock();
        let mut out = std::io::stdout();
        let _ = write!(out, "{prompt}");
        let _ = out.flush();
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}
