//! Durable state carried between events
//!
//! Only what a later event needs to make the same decision survives a pass:
//! the source that was last installed and the port that was last applied.
//! The reconciler commits both together after a pass succeeds.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kameo_macros::Reply;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::SourceDescriptor;
use crate::error::CoreError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallState {
    /// Absent until the first successful install
    pub last_installed_source: Option<SourceDescriptor>,
    pub installed_at: Option<DateTime<Utc>>,
}

impl InstallState {
    /// Record a successful install of `source`
    pub fn record(&mut self, source: SourceDescriptor) {
        self.last_installed_source = Some(source);
        self.installed_at = Some(Utc::now());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Reply)]
pub struct DurableState {
    #[serde(default)]
    pub install: InstallState,
    /// Listen port of the last successfully applied configuration
    #[serde(default)]
    pub applied_port: Option<u16>,
}

#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the state; a store that was never written yields the default
    async fn load(&self) -> Result<DurableState, CoreError>;

    async fn save(&self, state: &DurableState) -> Result<(), CoreError>;
}

/// State kept as a JSON document on disk
///
/// Writes go to a sibling temporary file that is renamed over the document,
/// so a crash mid-write leaves the previous state intact.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StateStore for JsonStateStore {
    async fn load(&self) -> Result<DurableState, CoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                CoreError::State(format!("corrupt state file {}: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no state file yet");
                Ok(DurableState::default())
            }
            Err(e) => Err(CoreError::State(format!(
                "failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn save(&self, state: &DurableState) -> Result<(), CoreError> {
        let io_err = |e: std::io::Error| {
            CoreError::State(format!("failed to write {}: {e}", self.path.display()))
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let bytes = serde_json::to_vec_pretty(state)
            .map_err(|e| CoreError::State(format!("failed to encode state: {e}")))?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, bytes).await.map_err(io_err)?;
        tokio::fs::rename(&temp, &self.path).await.map_err(io_err)?;

        info!(path = %self.path.display(), "saved durable state");
        Ok(())
    }
}

/// In-memory store for dry runs and tests
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: Mutex<DurableState>,
}

impl MemoryStateStore {
    #[must_use]
    pub fn new(state: DurableState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub async fn snapshot(&self) -> DurableState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<DurableState, CoreError> {
        Ok(self.snapshot().await)
    }

    async fn save(&self, state: &DurableState) -> Result<(), CoreError> {
        *self.state.lock().await = state.clone();
        Ok(())
    }
}
