//! warren-pkg: System package and account provisioning
//!
//! Provides the package manager and provisioner traits used by the install
//! reaction, with apt and shadow-utils implementations.

pub mod apt;
pub mod error;
pub mod traits;
pub mod types;
pub mod user;

pub use apt::AptManager;
pub use error::PackageError;
pub use traits::{PackageManager, Provisioner};
pub use types::InstallReport;
pub use user::SystemProvisioner;
