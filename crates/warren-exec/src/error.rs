//! Error types for warren-exec

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while executing a command
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// Command execution failed
    #[error("command `{command}` failed with status {status}: {stderr}")]
    CommandFailed {
        /// Rendered command line
        command: String,
        /// Exit status code
        status: i32,
        /// Stderr output
        stderr: String,
    },

    /// Command timed out
    #[error("command timed out after {timeout:?}")]
    Timeout {
        /// Timeout duration that was exceeded
        timeout: Duration,
    },

    /// Process spawn error
    #[error("failed to spawn process: {0}")]
    SpawnError(String),

    /// I/O error during execution
    #[error("I/O error: {0}")]
    IoError(String),
}
