//! Type definitions for package management

use serde::{Deserialize, Serialize};

/// Outcome of an install run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReport {
    /// Packages requested
    pub requested: Vec<String>,
    /// Number of packages upgraded
    pub upgraded_count: u32,
    /// Number of packages newly installed
    pub new_count: u32,
}

impl InstallReport {
    /// Whether the run changed anything on the host
    #[must_use]
    pub fn changed(&self) -> bool {
        self.upgraded_count > 0 || self.new_count > 0
    }
}
