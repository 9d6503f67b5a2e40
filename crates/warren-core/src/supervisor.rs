//! Process supervisor
//!
//! The reconciler only expresses intents; the supervisor owns how the
//! service is actually started and stopped.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};
use warren_exec::{CommandExecutor, CommandSpec};

use crate::error::CoreError;
use crate::layout::ServiceLayout;

#[async_trait]
pub trait ServiceSupervisor: Send + Sync {
    /// Install or replace the init descriptor
    async fn install(&self, descriptor: &str) -> Result<(), CoreError>;

    /// Remove the init descriptor; a missing descriptor is not an error
    async fn remove(&self) -> Result<(), CoreError>;

    async fn start(&self) -> Result<(), CoreError>;

    async fn stop(&self) -> Result<(), CoreError>;

    /// Restart the service, starting it if it was not running
    async fn restart(&self) -> Result<(), CoreError>;
}

/// Upstart jobs driven through the `service` command
pub struct UpstartSupervisor {
    executor: Arc<dyn CommandExecutor>,
    service_name: String,
    descriptor_path: PathBuf,
    use_sudo: bool,
}

impl UpstartSupervisor {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        service_name: impl Into<String>,
        descriptor_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            executor,
            service_name: service_name.into(),
            descriptor_path: descriptor_path.into(),
            use_sudo: false,
        }
    }

    pub fn for_layout(executor: Arc<dyn CommandExecutor>, layout: &ServiceLayout) -> Self {
        Self::new(executor, &layout.service_name, &layout.init_descriptor)
    }

    #[must_use]
    pub fn with_sudo(mut self, use_sudo: bool) -> Self {
        self.use_sudo = use_sudo;
        self
    }

    async fn service(&self, action: &str) -> Result<(), CoreError> {
        let mut cmd = CommandSpec::new("service").args([self.service_name.as_str(), action]);
        if self.use_sudo {
            cmd = cmd.as_user("root");
        }

        let result = self
            .executor
            .run(&cmd)
            .await
            .map_err(|e| CoreError::Supervisor(e.to_string()))?;
        result
            .check(&cmd)
            .map(|_| ())
            .map_err(|e| CoreError::Supervisor(e.to_string()))
    }
}

#[async_trait]
impl ServiceSupervisor for UpstartSupervisor {
    #[instrument(skip(self, descriptor), fields(path = %self.descriptor_path.display()))]
    async fn install(&self, descriptor: &str) -> Result<(), CoreError> {
        tokio::fs::write(&self.descriptor_path, descriptor)
            .await
            .map_err(|e| {
                CoreError::Supervisor(format!(
                    "failed to write {}: {e}",
                    self.descriptor_path.display()
                ))
            })
    }

    #[instrument(skip(self), fields(path = %self.descriptor_path.display()))]
    async fn remove(&self) -> Result<(), CoreError> {
        match tokio::fs::remove_file(&self.descriptor_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoreError::Supervisor(format!(
                "failed to remove {}: {e}",
                self.descriptor_path.display()
            ))),
        }
    }

    #[instrument(skip(self), fields(service = %self.service_name))]
    async fn start(&self) -> Result<(), CoreError> {
        self.service("start").await
    }

    #[instrument(skip(self), fields(service = %self.service_name))]
    async fn stop(&self) -> Result<(), CoreError> {
        // Stopping a job that is not running exits non-zero.
        if let Err(e) = self.service("stop").await {
            warn!(error = %e, "stop failed; treating service as stopped");
        }
        Ok(())
    }

    #[instrument(skip(self), fields(service = %self.service_name))]
    async fn restart(&self) -> Result<(), CoreError> {
        match self.service("restart").await {
            Ok(()) => Ok(()),
            Err(restart_err) => {
                info!(error = %restart_err, "restart failed; starting instead");
                self.service("start").await.map_err(|start_err| {
                    CoreError::Supervisor(format!(
                        "restart failed ({restart_err}); start failed ({start_err})"
                    ))
                })
            }
        }
    }
}
