//! Config renderer
//!
//! Rendering is a pure function of the resolved endpoints, the desired
//! configuration and the service layout: identical inputs produce
//! byte-identical documents.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::DesiredConfig;
use crate::error::CoreError;
use crate::layout::ServiceLayout;
use crate::relation::ResolvedEndpoints;
use crate::template::Template;

pub const INIT_TEMPLATE_NAME: &str = "upstart.conf";
pub const APP_CONFIG_TEMPLATE_NAME: &str = "config.yaml";

const BUILTIN_INIT: &str = include_str!("../templates/upstart.conf");
const BUILTIN_APP_CONFIG: &str = include_str!("../templates/config.yaml");

/// The pair of templates rendered on every steady-state pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Templates {
    pub init: Template,
    pub app_config: Template,
}

impl Templates {
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            init: Template::new(INIT_TEMPLATE_NAME, BUILTIN_INIT),
            app_config: Template::new(APP_CONFIG_TEMPLATE_NAME, BUILTIN_APP_CONFIG),
        }
    }

    /// Load templates, letting files in `dir` override the built-in ones
    ///
    /// # Errors
    /// Returns `CoreError::ConfigRender` if an override exists but cannot be read
    pub async fn load(dir: Option<&Path>) -> Result<Self, CoreError> {
        let mut templates = Self::builtin();
        let Some(dir) = dir else {
            return Ok(templates);
        };

        if let Some(source) = read_override(dir, INIT_TEMPLATE_NAME).await? {
            templates.init = Template::new(INIT_TEMPLATE_NAME, source);
        }
        if let Some(source) = read_override(dir, APP_CONFIG_TEMPLATE_NAME).await? {
            templates.app_config = Template::new(APP_CONFIG_TEMPLATE_NAME, source);
        }
        Ok(templates)
    }
}

impl Default for Templates {
    fn default() -> Self {
        Self::builtin()
    }
}

async fn read_override(dir: &Path, name: &str) -> Result<Option<String>, CoreError> {
    let path = dir.join(name);
    match tokio::fs::read_to_string(&path).await {
        Ok(source) => {
            info!(path = %path.display(), "using template override");
            Ok(Some(source))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CoreError::ConfigRender(format!(
            "failed to read {}: {e}",
            path.display()
        ))),
    }
}

/// Advisory readiness of the dependency services
///
/// The service is started regardless; the application is expected to cope
/// with a dependency that appears later.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependenciesReady {
    pub database: bool,
    pub search: bool,
}

impl DependenciesReady {
    #[must_use]
    pub fn from_endpoints(resolved: &ResolvedEndpoints) -> Self {
        Self {
            database: resolved.database_host.is_some() && resolved.database_port.is_some(),
            search: resolved.search_host.is_some() && resolved.search_port.is_some(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedArtifacts {
    pub init_descriptor: String,
    pub app_config: String,
    pub dependencies_ready: DependenciesReady,
}

pub struct ConfigRenderer {
    templates: Templates,
    layout: ServiceLayout,
}

impl ConfigRenderer {
    #[must_use]
    pub fn new(templates: Templates, layout: ServiceLayout) -> Self {
        Self { templates, layout }
    }

    /// Render the init descriptor and the application config
    ///
    /// # Errors
    /// Returns `CoreError::ConfigRender` if a template references a value
    /// that is not set or contains a malformed placeholder
    pub fn render(
        &self,
        resolved: &ResolvedEndpoints,
        desired: &DesiredConfig,
    ) -> Result<RenderedArtifacts, CoreError> {
        let dependencies_ready = DependenciesReady::from_endpoints(resolved);

        let init_descriptor = self.templates.init.substitute(&self.init_params())?;
        let app_config = self
            .templates
            .app_config
            .substitute(&self.app_config_params(resolved, desired, dependencies_ready))?;

        debug!(
            database_ready = dependencies_ready.database,
            search_ready = dependencies_ready.search,
            "rendered configuration"
        );

        Ok(RenderedArtifacts {
            init_descriptor,
            app_config,
            dependencies_ready,
        })
    }

    fn init_params(&self) -> BTreeMap<&'static str, String> {
        let layout = &self.layout;
        BTreeMap::from([
            ("owner", layout.owner.clone()),
            ("dir", layout.service_dir.display().to_string()),
            ("service", layout.service_name.clone()),
            ("application", layout.application.clone()),
            ("install_dir", layout.install_dir.display().to_string()),
            ("config_file", layout.config_file.display().to_string()),
        ])
    }

    fn app_config_params(
        &self,
        resolved: &ResolvedEndpoints,
        desired: &DesiredConfig,
        ready: DependenciesReady,
    ) -> BTreeMap<&'static str, String> {
        let mut params = BTreeMap::from([
            ("template_dir", self.layout.template_dir().display().to_string()),
            ("static_dir", self.layout.static_dir().display().to_string()),
            ("listen_port", desired.listen_port.to_string()),
        ]);

        let mongo_host = match (&resolved.database_host, resolved.database_port) {
            (Some(host), Some(port)) if ready.database => format!("{host}:{port}"),
            _ => String::new(),
        };
        let quoted = [
            ("mongo_host", mongo_host),
            ("elasticsearch_host", resolved.search_host.clone().unwrap_or_default()),
            (
                "elasticsearch_port",
                resolved.search_port.map(|p| p.to_string()).unwrap_or_default(),
            ),
        ];
        for (key, value) in quoted {
            params.insert(key, yaml_escape(&value));
        }

        // Unset operator values stay out of the map so a template that needs
        // them fails with the placeholder name.
        let optional = [
            ("session_auth_key", &desired.session_auth_key),
            ("session_encryption_key", &desired.session_encryption_key),
            ("mongo_db", &desired.mongo_db),
            ("SMTP_host", &desired.smtp_server),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                params.insert(key, yaml_escape(value));
            }
        }

        params
    }
}

/// Escape a value for the inside of a double-quoted YAML scalar
///
/// JSON string escapes are a subset of YAML's double-quoted escapes.
fn yaml_escape(value: &str) -> String {
    let quoted = serde_json::Value::from(value).to_string();
    quoted[1..quoted.len() - 1].to_string()
}
