//! Message types for actor communication
//!
//! Message handlers are implemented in the actor module.

use kameo_macros::Reply;
use serde::{Deserialize, Serialize};

use crate::hook::HookEvent;
use crate::ports::PortAction;
use crate::render::{DependenciesReady, RenderedArtifacts};

/// Reconcile the instance in response to one hook event
#[derive(Debug, Clone, Copy)]
pub struct HandleHook {
    pub event: HookEvent,
}

/// Read the committed durable state
#[derive(Debug)]
pub struct GetDurableState;

/// Outcome of one successful reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Reply)]
pub struct PassReport {
    pub event: HookEvent,
    /// Whether dependency packages were installed or upgraded
    pub packages_changed: bool,
    /// Whether the source was wiped, fetched and built during this pass
    pub rebuilt: bool,
    /// Port actions applied, in order
    pub port_actions: Vec<PortAction>,
    /// Advisory readiness; absent for reactions that do not render
    pub dependencies: Option<DependenciesReady>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendered: Option<RenderedArtifacts>,
    /// Website relation ids the endpoint was announced to
    pub announced: Vec<String>,
    pub restarted: bool,
    pub stopped: bool,
}

impl PassReport {
    #[must_use]
    pub fn new(event: HookEvent) -> Self {
        Self {
            event,
            packages_changed: false,
            rebuilt: false,
            port_actions: Vec::new(),
            dependencies: None,
            rendered: None,
            announced: Vec::new(),
            restarted: false,
            stopped: false,
        }
    }
}
