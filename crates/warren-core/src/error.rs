//! Core error types for warren-core

use thiserror::Error;

/// Errors that abort a reconciliation pass
///
/// A dependency relation that has not formed yet is not an error; it shows up
/// as an absent value in `ResolvedEndpoints`.
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    /// Desired configuration failed validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Event name has no reaction
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// Package or account provisioning failed
    #[error("package install failed: {0}")]
    PackageInstall(String),

    /// Workspace wipe, fetch or checkout failed
    #[error("source fetch failed: {0}")]
    SourceFetch(String),

    /// Dependency resolution, build or install of the binary failed
    #[error("build failed: {0}")]
    Build(String),

    /// Template malformed, placeholder without value, or artifact not written
    #[error("config render failed: {0}")]
    ConfigRender(String),

    /// Process supervisor rejected an intent
    #[error("supervisor failed: {0}")]
    Supervisor(String),

    /// Hook tool invocation failed
    #[error("hook tool failed: {0}")]
    HookTool(String),

    /// Durable state could not be read or written
    #[error("state store error: {0}")]
    State(String),

    /// Actor communication error
    #[error("actor communication error: {0}")]
    ActorError(String),
}

impl CoreError {
    /// Name of the reconciliation step that produced this error
    #[must_use]
    pub fn step(&self) -> &'static str {
        match self {
            CoreError::InvalidConfig(_) => "validate-config",
            CoreError::UnknownEvent(_) => "dispatch",
            CoreError::PackageInstall(_) => "provision",
            CoreError::SourceFetch(_) => "fetch-source",
            CoreError::Build(_) => "build",
            CoreError::ConfigRender(_) => "render-config",
            CoreError::Supervisor(_) => "supervise",
            CoreError::HookTool(_) => "hook-tool",
            CoreError::State(_) => "persist-state",
            CoreError::ActorError(_) => "mailbox",
        }
    }
}

impl From<warren_pkg::PackageError> for CoreError {
    fn from(err: warren_pkg::PackageError) -> Self {
        CoreError::PackageInstall(err.to_string())
    }
}
