//! Filesystem layout of the managed service

use std::path::PathBuf;

use crate::config::ServiceSettings;
use crate::error::CoreError;

/// Paths and names derived from the unit name and service settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceLayout {
    pub application: String,
    pub package: String,
    pub owner: String,
    /// System service name, `<application>-<service>`
    pub service_name: String,
    pub init_descriptor: PathBuf,
    pub service_dir: PathBuf,
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    /// GOPATH of the installation
    pub install_dir: PathBuf,
    /// Checked-out package inside the GOPATH
    pub package_dir: PathBuf,
}

impl ServiceLayout {
    /// Derive the layout for a unit such as `warren/0`
    ///
    /// # Errors
    /// Returns `CoreError::InvalidConfig` if the unit name has no `/`
    pub fn for_unit(unit_name: &str, settings: &ServiceSettings) -> Result<Self, CoreError> {
        let service = unit_name
            .split_once('/')
            .map(|(service, _)| service)
            .filter(|service| !service.is_empty())
            .ok_or_else(|| {
                CoreError::InvalidConfig(format!("unit name `{unit_name}` is not <service>/<n>"))
            })?;

        let service_name = format!("{}-{service}", settings.application);
        let service_dir = settings.srv_root.join(&service_name);
        let config_dir = service_dir.join("etc");
        let install_dir = service_dir.join(&settings.application);
        let package_dir = install_dir.join("src").join(&settings.package);

        Ok(Self {
            application: settings.application.clone(),
            package: settings.package.clone(),
            owner: settings.owner.clone(),
            init_descriptor: settings.init_dir.join(format!("{service_name}.conf")),
            config_file: config_dir.join(format!("{}-config.yaml", settings.application)),
            service_name,
            service_dir,
            config_dir,
            install_dir,
            package_dir,
        })
    }

    /// Directory wiped before every rebuild
    #[must_use]
    pub fn source_root(&self) -> PathBuf {
        self.install_dir.join("src")
    }

    #[must_use]
    pub fn template_dir(&self) -> PathBuf {
        self.package_dir.join("templates")
    }

    #[must_use]
    pub fn static_dir(&self) -> PathBuf {
        self.package_dir.join("public")
    }
}
