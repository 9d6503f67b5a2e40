//! Source installer
//!
//! Decides whether the checked-out source must be rebuilt and drives the
//! build toolchain through wipe, fetch, checkout and build.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::{SourceDescriptor, SourceKind, TRUNK_BRANCH};
use crate::error::CoreError;
use crate::state::InstallState;

/// Version-control operation selecting the desired ref
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Checkout {
    Branch(String),
    /// Check out a new local branch `tag-<name>` at the tag
    Tag(String),
    /// Hard-reset the current branch to the commit
    Commit(String),
    Trunk,
}

impl Checkout {
    /// Local branch created for a tag checkout
    #[must_use]
    pub fn tag_branch(tag: &str) -> String {
        format!("tag-{tag}")
    }
}

impl From<&SourceDescriptor> for Checkout {
    fn from(source: &SourceDescriptor) -> Self {
        match source.kind {
            SourceKind::Branch => Checkout::Branch(source.name.clone()),
            SourceKind::Tag => Checkout::Tag(source.name.clone()),
            SourceKind::Commit => Checkout::Commit(source.name.clone()),
            SourceKind::Default => Checkout::Trunk,
        }
    }
}

impl fmt::Display for Checkout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Checkout::Branch(name) => write!(f, "branch {name}"),
            Checkout::Tag(name) => write!(f, "tag {name}"),
            Checkout::Commit(name) => write!(f, "commit {name}"),
            Checkout::Trunk => write!(f, "branch {TRUNK_BRANCH}"),
        }
    }
}

/// Fetch and build collaborator
///
/// Fetch-side failures are reported as `CoreError::SourceFetch` and build-side
/// failures as `CoreError::Build`.
#[async_trait]
pub trait BuildToolchain: Send + Sync {
    /// Remove the checked-out workspace entirely
    async fn wipe_workspace(&self) -> Result<(), CoreError>;

    /// Fetch the source and all tags
    async fn fetch(&self) -> Result<(), CoreError>;

    async fn checkout(&self, target: &Checkout) -> Result<(), CoreError>;

    /// Resolve dependencies, build and install the binary
    async fn build_and_install(&self) -> Result<(), CoreError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceOutcome {
    pub rebuilt: bool,
}

pub struct SourceInstaller {
    toolchain: Arc<dyn BuildToolchain>,
}

impl SourceInstaller {
    pub fn new(toolchain: Arc<dyn BuildToolchain>) -> Self {
        Self { toolchain }
    }

    /// A rebuild is needed on first install or when the source changed
    #[must_use]
    pub fn needs_rebuild(desired: &SourceDescriptor, last: &InstallState) -> bool {
        last.last_installed_source.as_ref() != Some(desired)
    }

    /// Rebuild if the desired source differs from the installed one
    ///
    /// `state` is only updated once the whole cycle succeeded, so a failure
    /// leaves the same rebuild decision for the next event.
    ///
    /// # Errors
    /// Propagates the first failing toolchain step
    pub async fn ensure_source(
        &self,
        desired: &SourceDescriptor,
        state: &mut InstallState,
    ) -> Result<SourceOutcome, CoreError> {
        if !Self::needs_rebuild(desired, state) {
            return Ok(SourceOutcome { rebuilt: false });
        }

        info!(
            from = ?state.last_installed_source.as_ref().map(ToString::to_string),
            to = %desired,
            "source changed; rebuilding"
        );
        self.install(desired, state).await?;
        Ok(SourceOutcome { rebuilt: true })
    }

    /// Run the full wipe, fetch, checkout and build cycle unconditionally
    ///
    /// # Errors
    /// Propagates the first failing toolchain step
    #[instrument(skip(self, desired, state), fields(source = %desired))]
    pub async fn install(
        &self,
        desired: &SourceDescriptor,
        state: &mut InstallState,
    ) -> Result<(), CoreError> {
        let target = Checkout::from(desired);

        self.toolchain.wipe_workspace().await?;
        self.toolchain.fetch().await?;
        self.toolchain.checkout(&target).await?;
        self.toolchain.build_and_install().await?;

        state.record(desired.clone());
        info!(checkout = %target, "installed from source");
        Ok(())
    }
}
