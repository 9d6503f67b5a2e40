//! APT package manager (Debian/Ubuntu)

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};
use warren_exec::{CommandExecutor, CommandSpec};

use crate::error::PackageError;
use crate::traits::PackageManager;
use crate::types::InstallReport;

/// APT package manager implementation
pub struct AptManager {
    /// Executor for running commands
    executor: Arc<dyn CommandExecutor>,
    /// Whether to run apt through sudo
    use_sudo: bool,
}

impl AptManager {
    /// Create a new APT manager
    ///
    /// # Arguments
    /// * `executor` - Executor for running apt commands
    /// * `use_sudo` - Whether to run apt as root through sudo
    pub fn new(executor: Arc<dyn CommandExecutor>, use_sudo: bool) -> Self {
        Self { executor, use_sudo }
    }

    /// Build an apt-get command, non-interactive and without recommends
    fn apt_cmd<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cmd = CommandSpec::new("apt-get")
            .args(args)
            .env("DEBIAN_FRONTEND", "noninteractive");
        if self.use_sudo {
            cmd.as_user("root")
        } else {
            cmd
        }
    }

    /// Parse the apt summary line for counts
    fn parse_install_output(output: &str) -> (u32, u32) {
        let mut upgraded = 0u32;
        let mut new_pkgs = 0u32;

        // Parse: "X upgraded, Y newly installed, Z to remove"
        for line in output.lines().filter(|l| l.contains("upgraded,")) {
            for part in line.split(',').map(str::trim) {
                if let Some(n) = part.find(" upgraded")
                    && let Ok(num) = part[..n].trim().parse::<u32>()
                {
                    upgraded = num;
                }
                if let Some(n) = part.find(" newly installed")
                    && let Ok(num) = part[..n].trim().parse::<u32>()
                {
                    new_pkgs = num;
                }
            }
        }

        (upgraded, new_pkgs)
    }
}

#[async_trait]
impl PackageManager for AptManager {
    #[instrument(skip(self))]
    async fn update_index(&self) -> Result<(), PackageError> {
        debug!("updating package index");

        let cmd = self.apt_cmd(["update", "-qq"]);
        let result = self
            .executor
            .run(&cmd)
            .await
            .map_err(|e| PackageError::ExecutionError(e.to_string()))?;

        if !result.success() {
            return Err(PackageError::RepositoryUnavailable(
                result.stderr.trim().to_string(),
            ));
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn ensure_installed(&self, names: &[String]) -> Result<InstallReport, PackageError> {
        if names.is_empty() {
            return Ok(InstallReport::default());
        }

        info!(packages = ?names, "ensuring packages are installed");

        let cmd = self.apt_cmd(
            ["install", "-y", "--no-install-recommends"]
                .into_iter()
                .map(String::from)
                .chain(names.iter().cloned()),
        );
        let result = self
            .executor
            .run(&cmd)
            .await
            .map_err(|e| PackageError::ExecutionError(e.to_string()))?;

        if !result.success() {
            let err = PackageError::from_apt_failure(result.status, &result.stderr);
            warn!(error = %err, "apt install failed");
            return Err(err);
        }

        let (upgraded_count, new_count) = Self::parse_install_output(&result.combined_output());

        info!(
            upgraded = upgraded_count,
            installed = new_count,
            "apt install completed"
        );

        Ok(InstallReport {
            requested: names.to_vec(),
            upgraded_count,
            new_count,
        })
    }
}
