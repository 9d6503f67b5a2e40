//! Go and git build toolchain
//!
//! Fetches the application with `go get` into a dedicated GOPATH, selects the
//! desired ref with git and builds with the project's make targets. Every
//! step runs as the owning account.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};
use warren_exec::{CommandExecutor, CommandSpec};

use crate::config::TRUNK_BRANCH;
use crate::error::CoreError;
use crate::layout::ServiceLayout;
use crate::source::{BuildToolchain, Checkout};

const MAKE_TARGETS: [&str; 3] = ["godeps", "deps", "install"];

pub struct GoToolchain {
    executor: Arc<dyn CommandExecutor>,
    owner: String,
    package: String,
    install_dir: PathBuf,
    package_dir: PathBuf,
    source_root: PathBuf,
    /// PATH of the agent, extended with the GOPATH bin directory
    base_path: String,
    fetch_timeout: Option<Duration>,
    build_timeout: Option<Duration>,
}

impl GoToolchain {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        layout: &ServiceLayout,
        base_path: impl Into<String>,
    ) -> Self {
        Self {
            executor,
            owner: layout.owner.clone(),
            package: layout.package.clone(),
            install_dir: layout.install_dir.clone(),
            package_dir: layout.package_dir.clone(),
            source_root: layout.source_root(),
            base_path: base_path.into(),
            fetch_timeout: None,
            build_timeout: None,
        }
    }

    #[must_use]
    pub fn with_timeouts(mut self, fetch: Option<Duration>, build: Option<Duration>) -> Self {
        self.fetch_timeout = fetch;
        self.build_timeout = build;
        self
    }

    /// Command running as the owner with the GOPATH environment
    fn go_cmd(&self, program: &str) -> CommandSpec {
        let bin = self.install_dir.join("bin");
        let path = if self.base_path.is_empty() {
            bin.display().to_string()
        } else {
            format!("{}:{}", bin.display(), self.base_path)
        };
        CommandSpec::new(program)
            .env("GOPATH", self.install_dir.display().to_string())
            .env("PATH", path)
            .as_user(&self.owner)
    }

    fn git(&self) -> CommandSpec {
        self.go_cmd("git").current_dir(&self.package_dir)
    }

    async fn run(
        &self,
        cmd: CommandSpec,
        timeout: Option<Duration>,
        fail: fn(String) -> CoreError,
    ) -> Result<(), CoreError> {
        debug!(command = %cmd, "running toolchain step");
        let result = match timeout {
            Some(timeout) => self.executor.run_with_timeout(&cmd, timeout).await,
            None => self.executor.run(&cmd).await,
        };
        result
            .and_then(|r| r.check(&cmd))
            .map(|_| ())
            .map_err(|e| fail(e.to_string()))
    }
}

#[async_trait]
impl BuildToolchain for GoToolchain {
    #[instrument(skip(self))]
    async fn wipe_workspace(&self) -> Result<(), CoreError> {
        let cmd = CommandSpec::new("rm")
            .arg("-rf")
            .arg(self.source_root.display().to_string());
        self.run(cmd, None, CoreError::SourceFetch).await
    }

    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<(), CoreError> {
        let get = self
            .go_cmd("go")
            .args(["get".to_string(), format!("{}/...", self.package)]);
        self.run(get, self.fetch_timeout, CoreError::SourceFetch)
            .await?;

        let tags = self.git().args(["fetch", "--tags", "origin"]);
        self.run(tags, self.fetch_timeout, CoreError::SourceFetch)
            .await
    }

    #[instrument(skip(self))]
    async fn checkout(&self, target: &Checkout) -> Result<(), CoreError> {
        let cmd = match target {
            Checkout::Branch(name) => self.git().args(["checkout", name.as_str()]),
            Checkout::Tag(name) => self.git().args([
                "checkout".to_string(),
                "-b".to_string(),
                Checkout::tag_branch(name),
                name.clone(),
            ]),
            Checkout::Commit(name) => self.git().args(["reset", "--hard", name.as_str()]),
            Checkout::Trunk => self.git().args(["checkout", TRUNK_BRANCH]),
        };
        self.run(cmd, self.fetch_timeout, CoreError::SourceFetch)
            .await
    }

    #[instrument(skip(self))]
    async fn build_and_install(&self) -> Result<(), CoreError> {
        for target in MAKE_TARGETS {
            let cmd = self
                .go_cmd("make")
                .arg(target)
                .current_dir(&self.package_dir);
            self.run(cmd, self.build_timeout, CoreError::Build).await?;
        }
        Ok(())
    }
}
