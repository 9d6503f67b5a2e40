//! Package manager and provisioner traits

use std::path::Path;

use async_trait::async_trait;

use crate::error::PackageError;
use crate::types::InstallReport;

#[async_trait]
pub trait PackageManager: Send + Sync {
    /// Refresh the package index
    async fn update_index(&self) -> Result<(), PackageError>;

    /// Install the named packages, upgrading any that are already installed
    async fn ensure_installed(&self, names: &[String]) -> Result<InstallReport, PackageError>;
}

/// OS account and filesystem ownership provisioning
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Create the account if it does not exist; returns whether it was created
    async fn ensure_user(&self, name: &str) -> Result<bool, PackageError>;

    /// Create a directory (and parents) owned by `owner` with the given mode
    async fn ensure_directory(&self, path: &Path, owner: &str, mode: u32)
    -> Result<(), PackageError>;

    /// Hand an existing file to `owner`
    async fn chown(&self, path: &Path, owner: &str) -> Result<(), PackageError>;
}
