//! Local command execution using `tokio::process`

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, error, instrument};

use crate::command::CommandSpec;
use crate::error::ExecError;
use crate::result::CommandResult;
use crate::traits::CommandExecutor;

/// Local command executor
///
/// Executes commands on the local machine using `tokio::process::Command`.
#[derive(Debug, Clone)]
pub struct LocalExecutor;

impl LocalExecutor {
    /// Create a new local executor
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip(self, cmd), fields(command = %cmd), level = "debug")]
    async fn execute(&self, cmd: &CommandSpec) -> Result<CommandResult, ExecError> {
        let start = Instant::now();
        let (program, args) = cmd.argv();

        debug!("executing local command");

        let mut command = Command::new(&program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if cmd.get_user().is_none() {
            command.envs(cmd.get_envs());
        }
        if let Some(dir) = cmd.get_current_dir() {
            command.current_dir(dir);
        }

        let child = command
            .spawn()
            .map_err(|e| ExecError::SpawnError(format!("{program}: {e}")))?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        let duration = start.elapsed();

        let status = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        debug!(status, duration = ?duration, "command completed");

        if !output.status.success() {
            error!(status, stderr = %stderr.trim(), "command failed");
        }

        Ok(CommandResult {
            status,
            stdout,
            stderr,
            duration,
        })
    }
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandExecutor for LocalExecutor {
    async fn run(&self, cmd: &CommandSpec) -> Result<CommandResult, ExecError> {
        self.execute(cmd).await
    }

    async fn run_with_timeout(
        &self,
        cmd: &CommandSpec,
        timeout_duration: Duration,
    ) -> Result<CommandResult, ExecError> {
        let start = Instant::now();

        match timeout(timeout_duration, self.execute(cmd)).await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    command = %cmd,
                    timeout = ?timeout_duration,
                    elapsed = ?start.elapsed(),
                    "command timed out"
                );
                Err(ExecError::Timeout {
                    timeout: timeout_duration,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_success() {
        let executor = LocalExecutor::new();
        let result = executor
            .run(&CommandSpec::new("echo").arg("hello"))
            .await
            .unwrap();

        assert!(result.success());
        assert_eq!(result.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_run_failure() {
        let executor = LocalExecutor::new();
        let result = executor
            .run(&CommandSpec::new("sh").args(["-c", "exit 42"]))
            .await
            .unwrap();

        assert!(!result.success());
        assert_eq!(result.status, 42);
    }

    #[tokio::test]
    async fn test_run_timeout() {
        let executor = LocalExecutor::new();
        let result = executor
            .run_with_timeout(
                &CommandSpec::new("sleep").arg("5"),
                Duration::from_millis(100),
            )
            .await;

        assert!(matches!(result, Err(ExecError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_env_and_current_dir() {
        let executor = LocalExecutor::new();
        let cmd = CommandSpec::new("sh")
            .args(["-c", "echo $WARREN_TEST_VAR; pwd"])
            .env("WARREN_TEST_VAR", "present")
            .current_dir("/");
        let result = executor.run(&cmd).await.unwrap();

        let lines: Vec<&str> = result.stdout.lines().collect();
        assert_eq!(lines, vec!["present", "/"]);
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let executor = LocalExecutor::new();
        let result = executor
            .run(&CommandSpec::new("warren-definitely-not-a-binary"))
            .await;

        assert!(matches!(result, Err(ExecError::SpawnError(_))));
    }
}
