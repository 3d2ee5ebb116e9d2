//! External command execution for pre/post-run hooks.

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

/// Failure reason from a hook command: launch error or non-zero exit.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ExecutionFailure {
    pub message: String,
}

impl ExecutionFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Command-execution collaborator.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn execute(&self, argv: &[String]) -> Result<(), ExecutionFailure>;
}

/// Runs commands as child processes, inheriting the agent's environment.
pub struct ProcessCommandRunner;

#[async_trait]
impl CommandRunner for ProcessCommandRunner {
    async fn execute(&self, argv: &[String]) -> Result<(), ExecutionFailure> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| ExecutionFailure::new("empty argument vector"))?;

        let status = Command::new(program)
            .args(args)
            .status()
            .await
            .map_err(|e| ExecutionFailure::new(format!("could not launch '{program}': {e}")))?;

        if status.success() {
            Ok(())
        } else {
            Err(ExecutionFailure::new(format!(
                "'{}' exited with {}",
                argv.join(" "),
                status
            )))
        }
    }
}

/// Split a configured hook command string into an argument vector.
pub fn split_command_line(command: &str) -> Vec<String> {
    command.split_whitespace().map(str::to_string).collect()
}
