//! Configuration loading and types

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use warren_core::ServiceSettings;

/// Top-level configuration for warren-agent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    /// Description of the managed service
    #[serde(default)]
    pub service: ServiceSettings,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Agent process settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
    /// Where durable state is kept between hook invocations
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            state_file: default_state_file(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

fn default_state_file() -> PathBuf {
    PathBuf::from("/var/lib/warren-agent/state.json")
}

/// Upper bounds for the long-running toolchain steps; unset means unbounded
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub fetch_secs: Option<u64>,
    pub build_secs: Option<u64>,
}

impl TimeoutConfig {
    #[must_use]
    pub fn fetch(&self) -> Option<Duration> {
        self.fetch_secs.map(Duration::from_secs)
    }

    #[must_use]
    pub fn build(&self) -> Option<Duration> {
        self.build_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("failed to read {}: {e}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| eyre::eyre!("failed to parse {}: {e}", path.display()))?;
        Ok(config)
    }

    /// Load from `explicit`, then the default paths, or use defaults
    ///
    /// # Errors
    /// Returns error if a config file exists but cannot be loaded
    pub fn load_default(explicit: Option<&Path>) -> eyre::Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(path) = std::env::var("WARREN_AGENT_CONFIG") {
            return Self::load(Path::new(&path));
        }

        let mut paths = vec![
            PathBuf::from("warren-agent.toml"),
            PathBuf::from("/etc/warren-agent/warren-agent.toml"),
        ];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("warren-agent/warren-agent.toml"));
        }

        for path in paths {
            if path.exists() {
                return Self::load(&path);
            }
        }

        Ok(Config::default())
    }
}
