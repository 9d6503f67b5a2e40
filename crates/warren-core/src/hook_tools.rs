//! Hook environment backed by the platform's hook tools
//!
//! Each operation shells out to one of `config-get`, `relation-ids`,
//! `relation-list`, `relation-get`, `relation-set`, `open-port`,
//! `close-port` or `unit-get`, asking for JSON output where the tool
//! supports it.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};
use warren_exec::{CommandExecutor, CommandSpec};

use crate::config::FlatConfig;
use crate::error::CoreError;
use crate::hook::HookEnvironment;
use crate::relation::{RelationEndpoint, RelationGraph};

pub struct HookTools {
    executor: Arc<dyn CommandExecutor>,
}

impl HookTools {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    async fn output(&self, cmd: CommandSpec) -> Result<String, CoreError> {
        let result = self
            .executor
            .run(&cmd)
            .await
            .map_err(|e| CoreError::HookTool(e.to_string()))?
            .check(&cmd)
            .map_err(|e| CoreError::HookTool(e.to_string()))?;
        Ok(result.stdout)
    }

    /// Run a tool with `--format=json`; empty output decodes as the default
    async fn json<T: DeserializeOwned + Default>(&self, cmd: CommandSpec) -> Result<T, CoreError> {
        let label = cmd.to_string();
        let stdout = self.output(cmd.arg("--format=json")).await?;
        let trimmed = stdout.trim();
        if trimmed.is_empty() || trimmed == "null" {
            return Ok(T::default());
        }
        serde_json::from_str(trimmed)
            .map_err(|e| CoreError::HookTool(format!("unexpected output from `{label}`: {e}")))
    }

    async fn port(&self, tool: &str, port: u16) -> Result<(), CoreError> {
        self.output(CommandSpec::new(tool).arg(format!("{port}/tcp")))
            .await
            .map(|_| ())
    }
}

/// Relation settings are strings on the wire but may arrive as other scalars
fn setting_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl HookEnvironment for HookTools {
    #[instrument(skip(self))]
    async fn config(&self) -> Result<FlatConfig, CoreError> {
        self.json(CommandSpec::new("config-get")).await
    }

    #[instrument(skip(self))]
    async fn relations(&self, names: &[&str]) -> Result<RelationGraph, CoreError> {
        let mut graph = RelationGraph::new();

        for name in names {
            let ids: Vec<String> = self.json(CommandSpec::new("relation-ids").arg(*name)).await?;
            for id in ids {
                graph.add_relation(name, &id);

                let units: Vec<String> = self
                    .json(CommandSpec::new("relation-list").args(["-r", id.as_str()]))
                    .await?;
                for unit in units {
                    let settings: BTreeMap<String, Value> = self
                        .json(CommandSpec::new("relation-get").args([
                            "-r",
                            id.as_str(),
                            "-",
                            unit.as_str(),
                        ]))
                        .await?;

                    let mut endpoint = RelationEndpoint::new(*name, &id, &unit);
                    for (key, value) in settings {
                        if let Some(value) = setting_to_string(value) {
                            endpoint = endpoint.with_attribute(key, value);
                        }
                    }
                    graph.insert(endpoint);
                }
            }
            debug!(relation = %name, ids = graph.relation_ids(name).len(), "read relation");
        }

        Ok(graph)
    }

    #[instrument(skip(self))]
    async fn open_port(&self, port: u16) -> Result<(), CoreError> {
        self.port("open-port", port).await
    }

    #[instrument(skip(self))]
    async fn close_port(&self, port: u16) -> Result<(), CoreError> {
        self.port("close-port", port).await
    }

    #[instrument(skip(self, settings))]
    async fn relation_set(
        &self,
        relation_id: &str,
        settings: &BTreeMap<String, String>,
    ) -> Result<(), CoreError> {
        let cmd = CommandSpec::new("relation-set")
            .args(["-r", relation_id])
            .args(settings.iter().map(|(k, v)| format!("{k}={v}")));
        self.output(cmd).await.map(|_| ())
    }

    async fn private_address(&self) -> Result<String, CoreError> {
        let address = self
            .output(CommandSpec::new("unit-get").arg("private-address"))
            .await?;
        let address = address.trim();
        if address.is_empty() {
            return Err(CoreError::HookTool("unit-get returned no private address".to_string()));
        }
        Ok(address.to_string())
    }
}
