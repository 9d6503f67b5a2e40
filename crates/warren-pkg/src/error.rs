//! Error types for warren-pkg

use thiserror::Error;

/// Errors that can occur during package and account operations
#[derive(Error, Debug, Clone)]
pub enum PackageError {
    /// Package not found in repositories
    #[error("package not found: {0}")]
    PackageNotFound(String),

    /// Repository is unavailable
    #[error("repository unavailable: {0}")]
    RepositoryUnavailable(String),

    /// Lock file conflict (another process running)
    #[error("lock file conflict: {0}")]
    LockConflict(String),

    /// Insufficient permissions (need sudo)
    #[error("insufficient permissions: {0}")]
    PermissionDenied(String),

    /// Command execution failed
    #[error("command failed: {status} - {message}")]
    CommandFailed {
        /// Exit status
        status: i32,
        /// Error message
        message: String,
    },

    /// Execution error from the command executor
    #[error("execution error: {0}")]
    ExecutionError(String),

    /// Account or directory provisioning failed
    #[error("provisioning failed: {0}")]
    ProvisioningFailed(String),
}

impl PackageError {
    /// Classify a failed apt invocation from its stderr
    #[must_use]
    pub fn from_apt_failure(status: i32, stderr: &str) -> Self {
        if stderr.contains("Could not get lock") {
            return PackageError::LockConflict(stderr.trim().to_string());
        }
        if stderr.contains("Permission denied") || stderr.contains("are you root?") {
            return PackageError::PermissionDenied(stderr.trim().to_string());
        }
        if let Some(idx) = stderr.find("Unable to locate package ") {
            let rest = &stderr[idx + "Unable to locate package ".len()..];
            let name = rest.split_whitespace().next().unwrap_or_default();
            return PackageError::PackageNotFound(name.to_string());
        }
        PackageError::CommandFailed {
            status,
            message: stderr.trim().to_string(),
        }
    }

    /// Check if error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PackageError::LockConflict(_) | PackageError::RepositoryUnavailable(_)
        )
    }
}
