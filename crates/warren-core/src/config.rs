//! Desired configuration and service settings
//!
//! `DesiredConfig` is the typed, validated view of the flat key/value
//! configuration delivered with every event. `ServiceSettings` is the static
//! description of the managed service loaded by the agent.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::CoreError;

/// Branch checked out for the `default` source kind
pub const TRUNK_BRANCH: &str = "master";

/// Listen port used when `listen-port` is not set
pub const DEFAULT_LISTEN_PORT: u16 = 8080;

/// Flat key/value configuration as delivered by the platform
pub type FlatConfig = BTreeMap<String, Value>;

pub const KEY_SOURCE: &str = "source";
pub const KEY_LISTEN_PORT: &str = "listen-port";
pub const KEY_SESSION_AUTH_KEY: &str = "session-auth-key";
pub const KEY_SESSION_ENCRYPTION_KEY: &str = "session-encryption-key";
pub const KEY_MONGO_DB: &str = "mongo-db";
pub const KEY_SMTP_SERVER: &str = "smtp-server";

const RECOGNIZED_KEYS: [&str; 6] = [
    KEY_SOURCE,
    KEY_LISTEN_PORT,
    KEY_SESSION_AUTH_KEY,
    KEY_SESSION_ENCRYPTION_KEY,
    KEY_MONGO_DB,
    KEY_SMTP_SERVER,
];

/// Which version-control operation selects the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Branch,
    Tag,
    Commit,
    Default,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Branch => write!(f, "branch"),
            SourceKind::Tag => write!(f, "tag"),
            SourceKind::Commit => write!(f, "commit"),
            SourceKind::Default => write!(f, "default"),
        }
    }
}

/// Desired source revision
///
/// A `Default` descriptor always carries [`TRUNK_BRANCH`] as its name, so two
/// default descriptors compare equal whatever the operator wrote after the
/// colon.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub kind: SourceKind,
    pub name: String,
}

impl SourceDescriptor {
    #[must_use]
    pub fn trunk() -> Self {
        Self {
            kind: SourceKind::Default,
            name: TRUNK_BRANCH.to_string(),
        }
    }

    pub fn branch(name: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Branch,
            name: name.into(),
        }
    }

    pub fn tag(name: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Tag,
            name: name.into(),
        }
    }

    pub fn commit(name: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Commit,
            name: name.into(),
        }
    }

    /// Parse a `<kind>:<name>` descriptor
    ///
    /// Never fails: an empty, unparseable or unrecognized value degrades to
    /// the trunk branch so that stale or hand-edited configuration keeps the
    /// service deployable.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return Self::trunk();
        }

        let Some((kind, name)) = raw.split_once(':') else {
            warn!(source = %raw, "source is not <kind>:<name>, using trunk");
            return Self::trunk();
        };
        let name = name.trim();

        match kind.trim() {
            "default" => Self::trunk(),
            _ if name.is_empty() => {
                warn!(source = %raw, "source has no name, using trunk");
                Self::trunk()
            }
            "branch" => Self::branch(name),
            "tag" => Self::tag(name),
            "commit" => Self::commit(name),
            other => {
                warn!(kind = %other, "unrecognized source kind, using trunk");
                Self::trunk()
            }
        }
    }
}

impl Default for SourceDescriptor {
    fn default() -> Self {
        Self::trunk()
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

/// Validated snapshot of the declared settings for one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredConfig {
    pub source: SourceDescriptor,
    pub listen_port: u16,
    pub session_auth_key: Option<String>,
    pub session_encryption_key: Option<String>,
    pub mongo_db: Option<String>,
    pub smtp_server: Option<String>,
}

impl Default for DesiredConfig {
    fn default() -> Self {
        Self {
            source: SourceDescriptor::trunk(),
            listen_port: DEFAULT_LISTEN_PORT,
            session_auth_key: None,
            session_encryption_key: None,
            mongo_db: None,
            smtp_server: None,
        }
    }
}

impl DesiredConfig {
    /// Validate the flat configuration
    ///
    /// # Errors
    /// Returns `CoreError::InvalidConfig` if `listen-port` is not a port
    /// number or a recognized key holds a list or map
    pub fn from_flat(flat: &FlatConfig) -> Result<Self, CoreError> {
        for key in flat.keys() {
            if !RECOGNIZED_KEYS.contains(&key.as_str()) {
                debug!(key = %key, "ignoring unrecognized configuration key");
            }
        }

        let source = scalar(flat, KEY_SOURCE)?
            .map(|raw| SourceDescriptor::parse(&raw))
            .unwrap_or_default();

        Ok(Self {
            source,
            listen_port: listen_port(flat)?,
            session_auth_key: scalar(flat, KEY_SESSION_AUTH_KEY)?,
            session_encryption_key: scalar(flat, KEY_SESSION_ENCRYPTION_KEY)?,
            mongo_db: scalar(flat, KEY_MONGO_DB)?,
            smtp_server: scalar(flat, KEY_SMTP_SERVER)?,
        })
    }
}

/// Read a scalar value as a string; null and missing are absent
fn scalar(flat: &FlatConfig, key: &str) -> Result<Option<String>, CoreError> {
    match flat.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(CoreError::InvalidConfig(format!(
            "{key} must be a scalar, got {other}"
        ))),
    }
}

fn listen_port(flat: &FlatConfig) -> Result<u16, CoreError> {
    let invalid = |shown: &dyn fmt::Display| {
        CoreError::InvalidConfig(format!("{KEY_LISTEN_PORT} must be 1-65535, got {shown}"))
    };

    let port = match flat.get(KEY_LISTEN_PORT) {
        None | Some(Value::Null) => return Ok(DEFAULT_LISTEN_PORT),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|p| u16::try_from(p).ok())
            .ok_or_else(|| invalid(n))?,
        Some(Value::String(s)) => s.trim().parse::<u16>().map_err(|_| invalid(s))?,
        Some(other) => return Err(invalid(other)),
    };

    if port == 0 {
        return Err(invalid(&port));
    }
    Ok(port)
}

/// Static description of the managed service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Application name, used for the system service and install directory
    #[serde(default = "default_application")]
    pub application: String,
    /// Go import path of the application
    #[serde(default = "default_package")]
    pub package: String,
    /// Account owning the installation and running the service
    #[serde(default = "default_owner")]
    pub owner: String,
    /// Root under which the service directory is created
    #[serde(default = "default_srv_root")]
    pub srv_root: PathBuf,
    /// Directory holding init descriptors
    #[serde(default = "default_init_dir")]
    pub init_dir: PathBuf,
    /// Optional directory overriding the built-in templates
    pub templates_dir: Option<PathBuf>,
    /// System packages required to fetch and build the source
    #[serde(default = "default_dependencies")]
    pub dependencies: Vec<String>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            application: default_application(),
            package: default_package(),
            owner: default_owner(),
            srv_root: default_srv_root(),
            init_dir: default_init_dir(),
            templates_dir: None,
            dependencies: default_dependencies(),
        }
    }
}

fn default_application() -> String {
    "warren".to_string()
}

fn default_package() -> String {
    "github.com/warren-community/warren".to_string()
}

fn default_owner() -> String {
    "warren".to_string()
}

fn default_srv_root() -> PathBuf {
    PathBuf::from("/srv")
}

fn default_init_dir() -> PathBuf {
    PathBuf::from("/etc/init")
}

fn default_dependencies() -> Vec<String> {
    ["git", "golang-go", "make", "bzr"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn flat(value: Value) -> FlatConfig {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_parse_recognized_kinds() {
        assert_eq!(
            SourceDescriptor::parse("branch:main"),
            SourceDescriptor::branch("main")
        );
        assert_eq!(
            SourceDescriptor::parse("tag:v1.0"),
            SourceDescriptor::tag("v1.0")
        );
        assert_eq!(
            SourceDescriptor::parse("commit:4f2a9c1"),
            SourceDescriptor::commit("4f2a9c1")
        );
    }

    #[test]
    fn test_parse_falls_back_to_trunk() {
        for raw in ["", "master", "default:anything", "svn:trunk", "branch:", "  "] {
            assert_eq!(SourceDescriptor::parse(raw), SourceDescriptor::trunk(), "{raw:?}");
        }
    }

    #[test]
    fn test_default_descriptors_ignore_name() {
        assert_eq!(
            SourceDescriptor::parse("default:develop"),
            SourceDescriptor::parse("default:master")
        );
    }

    #[test]
    fn test_from_flat_full() {
        let config = DesiredConfig::from_flat(&flat(json!({
            "source": "tag:v1.0",
            "listen-port": 9090,
            "session-auth-key": "auth",
            "session-encryption-key": "enc",
            "mongo-db": "warren",
            "smtp-server": "mail.example.com:25",
            "unrelated": [1, 2],
        })))
        .unwrap();

        assert_eq!(config.source, SourceDescriptor::tag("v1.0"));
        assert_eq!(config.listen_port, 9090);
        assert_eq!(config.session_auth_key.as_deref(), Some("auth"));
        assert_eq!(config.session_encryption_key.as_deref(), Some("enc"));
        assert_eq!(config.mongo_db.as_deref(), Some("warren"));
        assert_eq!(config.smtp_server.as_deref(), Some("mail.example.com:25"));
    }

    #[test]
    fn test_from_flat_defaults() {
        let config = DesiredConfig::from_flat(&FlatConfig::new()).unwrap();

        assert_eq!(config, DesiredConfig::default());
        assert_eq!(config.listen_port, DEFAULT_LISTEN_PORT);
        assert_eq!(config.source, SourceDescriptor::trunk());
    }

    #[test]
    fn test_listen_port_accepts_numeric_string() {
        let config = DesiredConfig::from_flat(&flat(json!({"listen-port": "8081"}))).unwrap();
        assert_eq!(config.listen_port, 8081);
    }

    #[test]
    fn test_listen_port_rejects_out_of_range() {
        for bad in [json!(70000), json!(0), json!(-1), json!("http"), json!([80])] {
            let result = DesiredConfig::from_flat(&flat(json!({ "listen-port": bad })));
            assert!(matches!(result, Err(CoreError::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_service_settings_defaults() {
        let settings: ServiceSettings = serde_json::from_value(json!({})).unwrap();

        assert_eq!(settings.application, "warren");
        assert_eq!(settings.init_dir, PathBuf::from("/etc/init"));
        assert_eq!(settings.dependencies, vec!["git", "golang-go", "make", "bzr"]);
    }
}
