//! Hook events and the environment they run in

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::FlatConfig;
use crate::error::CoreError;
use crate::relation::{ELASTICSEARCH, MONGODB, RelationGraph, WEBSITE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    Mongodb,
    Elasticsearch,
    Website,
}

impl RelationKind {
    pub const ALL: [RelationKind; 3] = [
        RelationKind::Mongodb,
        RelationKind::Elasticsearch,
        RelationKind::Website,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RelationKind::Mongodb => MONGODB,
            RelationKind::Elasticsearch => ELASTICSEARCH,
            RelationKind::Website => WEBSITE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationPhase {
    Joined,
    Changed,
    Departed,
    Broken,
}

impl RelationPhase {
    const ALL: [RelationPhase; 4] = [
        RelationPhase::Joined,
        RelationPhase::Changed,
        RelationPhase::Departed,
        RelationPhase::Broken,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RelationPhase::Joined => "joined",
            RelationPhase::Changed => "changed",
            RelationPhase::Departed => "departed",
            RelationPhase::Broken => "broken",
        }
    }
}

/// Lifecycle or relation event delivered by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookEvent {
    Install,
    Start,
    Stop,
    ConfigChanged,
    Relation {
        relation: RelationKind,
        phase: RelationPhase,
    },
}

/// What a pass does in response to an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    Install,
    /// Rebuild if needed, render, write, reconcile ports and restart
    SteadyState {
        /// Re-announce the endpoint to every website relation
        announce: bool,
    },
    Stop,
}

impl HookEvent {
    #[must_use]
    pub fn reaction(&self) -> Reaction {
        match self {
            HookEvent::Install => Reaction::Install,
            HookEvent::Stop => Reaction::Stop,
            HookEvent::Start | HookEvent::ConfigChanged => {
                Reaction::SteadyState { announce: false }
            }
            HookEvent::Relation { relation, .. } => Reaction::SteadyState {
                announce: *relation == RelationKind::Website,
            },
        }
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookEvent::Install => f.write_str("install"),
            HookEvent::Start => f.write_str("start"),
            HookEvent::Stop => f.write_str("stop"),
            HookEvent::ConfigChanged => f.write_str("config-changed"),
            HookEvent::Relation { relation, phase } => {
                write!(f, "{}-relation-{}", relation.as_str(), phase.as_str())
            }
        }
    }
}

impl FromStr for HookEvent {
    type Err = CoreError;

    /// Parse a hook name such as `config-changed` or `mongodb-relation-joined`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let event = match s {
            "install" => HookEvent::Install,
            "start" => HookEvent::Start,
            "stop" => HookEvent::Stop,
            "config-changed" => HookEvent::ConfigChanged,
            _ => {
                let (name, phase) = s
                    .split_once("-relation-")
                    .ok_or_else(|| CoreError::UnknownEvent(s.to_string()))?;
                let relation = RelationKind::ALL
                    .into_iter()
                    .find(|kind| kind.as_str() == name)
                    .ok_or_else(|| CoreError::UnknownEvent(s.to_string()))?;
                let phase = RelationPhase::ALL
                    .into_iter()
                    .find(|p| p.as_str() == phase)
                    .ok_or_else(|| CoreError::UnknownEvent(s.to_string()))?;
                HookEvent::Relation { relation, phase }
            }
        };
        Ok(event)
    }
}

/// Platform facilities available to a hook
///
/// Everything the reconciler reads from or writes to the deployment platform
/// goes through this trait.
#[async_trait]
pub trait HookEnvironment: Send + Sync {
    /// Operator-set configuration as flat key/value pairs
    async fn config(&self) -> Result<FlatConfig, CoreError>;

    /// Snapshot of the named relations and the attributes of their units
    async fn relations(&self, names: &[&str]) -> Result<RelationGraph, CoreError>;

    async fn open_port(&self, port: u16) -> Result<(), CoreError>;

    async fn close_port(&self, port: u16) -> Result<(), CoreError>;

    /// Publish settings on one relation instance
    async fn relation_set(
        &self,
        relation_id: &str,
        settings: &BTreeMap<String, String>,
    ) -> Result<(), CoreError>;

    /// Address other units reach this one on
    async fn private_address(&self) -> Result<String, CoreError>;
}
