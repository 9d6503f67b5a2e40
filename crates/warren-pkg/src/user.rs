//! Account and directory provisioning through shadow-utils and coreutils

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};
use warren_exec::{CommandExecutor, CommandSpec};

use crate::error::PackageError;
use crate::traits::Provisioner;

/// Provisioner running `useradd`, `install -d` and `chown` on the host
pub struct SystemProvisioner {
    executor: Arc<dyn CommandExecutor>,
    use_sudo: bool,
}

impl SystemProvisioner {
    pub fn new(executor: Arc<dyn CommandExecutor>, use_sudo: bool) -> Self {
        Self { executor, use_sudo }
    }

    fn privileged(&self, cmd: CommandSpec) -> CommandSpec {
        if self.use_sudo { cmd.as_user("root") } else { cmd }
    }

    async fn run_checked(&self, cmd: CommandSpec) -> Result<(), PackageError> {
        let cmd = self.privileged(cmd);
        self.executor
            .run(&cmd)
            .await
            .map_err(|e| PackageError::ExecutionError(e.to_string()))?
            .check(&cmd)
            .map_err(|e| PackageError::ProvisioningFailed(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl Provisioner for SystemProvisioner {
    #[instrument(skip(self))]
    async fn ensure_user(&self, name: &str) -> Result<bool, PackageError> {
        let exists = self
            .executor
            .run(&CommandSpec::new("id").args(["-u", name]))
            .await
            .map_err(|e| PackageError::ExecutionError(e.to_string()))?
            .success();
        if exists {
            return Ok(false);
        }

        self.run_checked(
            CommandSpec::new("useradd").args(["--create-home", "--shell", "/bin/bash", name]),
        )
        .await?;
        info!(user = %name, "created account");
        Ok(true)
    }

    #[instrument(skip(self))]
    async fn ensure_directory(
        &self,
        path: &Path,
        owner: &str,
        mode: u32,
    ) -> Result<(), PackageError> {
        self.run_checked(CommandSpec::new("install").args([
            "-d".to_string(),
            "-o".to_string(),
            owner.to_string(),
            "-g".to_string(),
            owner.to_string(),
            "-m".to_string(),
            format!("{mode:o}"),
            path.display().to_string(),
        ]))
        .await
    }

    #[instrument(skip(self))]
    async fn chown(&self, path: &Path, owner: &str) -> Result<(), PackageError> {
        self.run_checked(
            CommandSpec::new("chown").args([format!("{owner}:{owner}"), path.display().to_string()]),
        )
        .await
    }
}
