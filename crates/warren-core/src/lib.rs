//! warren-core: Lifecycle reconciliation engine
//!
//! Resolves dependency endpoints from the relation graph, decides between a
//! rebuild from source and a reconfigure, renders configuration, diffs port
//! exposure and sequences it all per hook event. The `ReconcilerActor`
//! serializes events for the managed instance.

pub mod actor;
pub mod config;
pub mod error;
pub mod hook;
pub mod hook_tools;
pub mod layout;
pub mod message;
pub mod ports;
pub mod reconcile;
pub mod relation;
pub mod render;
pub mod source;
pub mod state;
pub mod supervisor;
pub mod template;
pub mod toolchain;

pub use actor::{ReconcilerActor, ReconcilerActorArgs};
pub use config::{DesiredConfig, FlatConfig, ServiceSettings, SourceDescriptor, SourceKind};
pub use error::CoreError;
pub use hook::{HookEnvironment, HookEvent, Reaction, RelationKind, RelationPhase};
pub use hook_tools::HookTools;
pub use layout::ServiceLayout;
pub use message::{GetDurableState, HandleHook, PassReport};
pub use ports::{PortAction, PortState};
pub use reconcile::{Collaborators, Reconciler};
pub use relation::{RelationEndpoint, RelationGraph, ResolvedEndpoints};
pub use render::{ConfigRenderer, DependenciesReady, RenderedArtifacts, Templates};
pub use source::{BuildToolchain, Checkout, SourceInstaller, SourceOutcome};
pub use state::{DurableState, InstallState, JsonStateStore, MemoryStateStore, StateStore};
pub use supervisor::{ServiceSupervisor, UpstartSupervisor};
pub use toolchain::GoToolchain;
