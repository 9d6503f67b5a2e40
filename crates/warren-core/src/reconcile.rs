//! Event dispatcher
//!
//! Maps each hook event to its reaction and sequences the collaborators. A
//! pass works on a copy of the durable state and commits it only when every
//! step succeeded, so a failed pass is retried from the same decision by the
//! next event.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{error, info, instrument, warn};
use warren_pkg::{PackageManager, Provisioner};

use crate::config::DesiredConfig;
use crate::error::CoreError;
use crate::hook::{HookEnvironment, HookEvent, Reaction};
use crate::layout::ServiceLayout;
use crate::message::PassReport;
use crate::ports::{PortAction, PortState};
use crate::relation::{ELASTICSEARCH, MONGODB, RelationGraph, WEBSITE};
use crate::render::{ConfigRenderer, Templates};
use crate::source::{BuildToolchain, SourceInstaller};
use crate::state::{DurableState, StateStore};
use crate::supervisor::ServiceSupervisor;

/// Mode of every directory created for the service
const DIRECTORY_MODE: u32 = 0o755;

/// Host-facing collaborators driven by the reconciler
#[derive(Clone)]
pub struct Collaborators {
    pub environment: Arc<dyn HookEnvironment>,
    pub packages: Arc<dyn PackageManager>,
    pub provisioner: Arc<dyn Provisioner>,
    pub toolchain: Arc<dyn BuildToolchain>,
    pub supervisor: Arc<dyn ServiceSupervisor>,
    pub store: Arc<dyn StateStore>,
}

pub struct Reconciler {
    layout: ServiceLayout,
    /// System packages ensured on install
    dependencies: Vec<String>,
    renderer: ConfigRenderer,
    installer: SourceInstaller,
    environment: Arc<dyn HookEnvironment>,
    packages: Arc<dyn PackageManager>,
    provisioner: Arc<dyn Provisioner>,
    supervisor: Arc<dyn ServiceSupervisor>,
    store: Arc<dyn StateStore>,
}

impl Reconciler {
    #[must_use]
    pub fn new(
        layout: ServiceLayout,
        dependencies: Vec<String>,
        templates: Templates,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            renderer: ConfigRenderer::new(templates, layout.clone()),
            installer: SourceInstaller::new(collaborators.toolchain),
            layout,
            dependencies,
            environment: collaborators.environment,
            packages: collaborators.packages,
            provisioner: collaborators.provisioner,
            supervisor: collaborators.supervisor,
            store: collaborators.store,
        }
    }

    #[must_use]
    pub fn layout(&self) -> &ServiceLayout {
        &self.layout
    }

    /// Read the committed durable state
    ///
    /// # Errors
    /// Returns `CoreError::State` if the store cannot be read
    pub async fn durable_state(&self) -> Result<DurableState, CoreError> {
        self.store.load().await
    }

    /// Run one full reconciliation pass for `event`
    ///
    /// # Errors
    /// Returns the error of the first failing step; durable state is left as
    /// it was before the pass
    #[instrument(skip(self), fields(service = %self.layout.service_name))]
    pub async fn handle(&self, event: HookEvent) -> Result<PassReport, CoreError> {
        match self.pass(event).await {
            Ok(report) => {
                info!(
                    rebuilt = report.rebuilt,
                    port_actions = report.port_actions.len(),
                    restarted = report.restarted,
                    stopped = report.stopped,
                    "pass complete"
                );
                Ok(report)
            }
            Err(err) => {
                error!(event = %event, step = err.step(), error = %err, "pass failed");
                Err(err)
            }
        }
    }

    async fn pass(&self, event: HookEvent) -> Result<PassReport, CoreError> {
        let committed = self.store.load().await?;
        let mut state = committed.clone();
        let mut report = PassReport::new(event);

        match event.reaction() {
            Reaction::Install => self.install(&mut state, &mut report).await?,
            Reaction::SteadyState { announce } => {
                self.steady_state(announce, &mut state, &mut report)
                    .await?;
            }
            Reaction::Stop => self.stop(&mut report).await?,
        }

        if state != committed {
            self.store.save(&state).await?;
        }
        Ok(report)
    }

    async fn desired_config(&self) -> Result<DesiredConfig, CoreError> {
        let flat = self.environment.config().await?;
        DesiredConfig::from_flat(&flat)
    }

    async fn install(
        &self,
        state: &mut DurableState,
        report: &mut PassReport,
    ) -> Result<(), CoreError> {
        let desired = self.desired_config().await?;

        if let Err(e) = self.packages.update_index().await {
            warn!(error = %e, "package index refresh failed; continuing");
        }
        let installed = self.packages.ensure_installed(&self.dependencies).await?;
        report.packages_changed = installed.changed();
        info!(
            new = installed.new_count,
            upgraded = installed.upgraded_count,
            "dependency packages ensured"
        );

        let owner = &self.layout.owner;
        if self.provisioner.ensure_user(owner).await? {
            info!(owner = %owner, "created service account");
        }
        for dir in [
            &self.layout.service_dir,
            &self.layout.install_dir,
            &self.layout.config_dir,
        ] {
            self.provisioner
                .ensure_directory(dir, owner, DIRECTORY_MODE)
                .await?;
        }

        self.installer
            .install(&desired.source, &mut state.install)
            .await?;
        report.rebuilt = true;
        Ok(())
    }

    async fn steady_state(
        &self,
        announce: bool,
        state: &mut DurableState,
        report: &mut PassReport,
    ) -> Result<(), CoreError> {
        let desired = self.desired_config().await?;
        let graph = self
            .environment
            .relations(&[MONGODB, ELASTICSEARCH, WEBSITE])
            .await?;
        let resolved = graph.resolve_endpoints();

        let outcome = self
            .installer
            .ensure_source(&desired.source, &mut state.install)
            .await?;
        report.rebuilt = outcome.rebuilt;

        let artifacts = self.renderer.render(&resolved, &desired)?;
        if !artifacts.dependencies_ready.database {
            warn!("database relation not ready; starting anyway");
        }
        if !artifacts.dependencies_ready.search {
            info!("search relation not ready");
        }

        self.supervisor.install(&artifacts.init_descriptor).await?;
        self.write_app_config(&artifacts.app_config).await?;

        let actions = PortState::new(Some(desired.listen_port), state.applied_port).reconcile();
        let mut announced = false;
        for action in &actions {
            match action {
                PortAction::ClosePort(port) => self.environment.close_port(*port).await?,
                PortAction::OpenPort(port) => self.environment.open_port(*port).await?,
                PortAction::AnnounceEndpoint => {
                    report.announced = self.announce(&graph, desired.listen_port).await?;
                    announced = true;
                }
            }
            info!(action = %action, "applied port action");
        }
        state.applied_port = Some(desired.listen_port);
        if announce && !announced {
            report.announced = self.announce(&graph, desired.listen_port).await?;
        }

        self.supervisor.restart().await?;

        report.port_actions = actions;
        report.dependencies = Some(artifacts.dependencies_ready);
        report.rendered = Some(artifacts);
        report.restarted = true;
        Ok(())
    }

    async fn write_app_config(&self, contents: &str) -> Result<(), CoreError> {
        let path = &self.layout.config_file;
        tokio::fs::write(path, contents).await.map_err(|e| {
            CoreError::ConfigRender(format!("failed to write {}: {e}", path.display()))
        })?;
        self.provisioner
            .chown(path, &self.layout.owner)
            .await
            .map_err(|e| CoreError::ConfigRender(format!("failed to chown {}: {e}", path.display())))
    }

    /// Publish this unit's address and port on every website relation
    async fn announce(&self, graph: &RelationGraph, port: u16) -> Result<Vec<String>, CoreError> {
        let ids = graph.relation_ids(WEBSITE);
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let settings = BTreeMap::from([
            (
                "hostname".to_string(),
                self.environment.private_address().await?,
            ),
            ("port".to_string(), port.to_string()),
        ]);
        for id in &ids {
            self.environment.relation_set(id, &settings).await?;
        }
        info!(relations = ids.len(), port, "announced website endpoint");
        Ok(ids.into_iter().map(str::to_string).collect())
    }

    async fn stop(&self, report: &mut PassReport) -> Result<(), CoreError> {
        self.supervisor.stop().await?;
        self.supervisor.remove().await?;
        report.stopped = true;
        Ok(())
    }
}
