//! Wiring of the reconciler with the host collaborators

use std::sync::Arc;

use eyre::{Result, WrapErr};
use tracing::info;
use warren_core::{
    Collaborators, GoToolchain, HookTools, JsonStateStore, Reconciler, ServiceLayout, Templates,
    UpstartSupervisor,
};
use warren_exec::{CommandExecutor, CommandSpec, LocalExecutor};
use warren_pkg::{AptManager, SystemProvisioner};

use crate::config::Config;

/// Environment variable naming the unit a hook runs for
pub const UNIT_NAME_VAR: &str = "JUJU_UNIT_NAME";

/// Whether privileged commands must be wrapped in sudo
async fn needs_sudo(executor: &Arc<dyn CommandExecutor>) -> bool {
    executor
        .run(&CommandSpec::new("id").arg("-u"))
        .await
        .map(|r| r.stdout.trim() != "0")
        .unwrap_or(true)
}

/// Build the reconciler for `unit_name` on the local host
///
/// # Errors
/// Returns error if the unit name is malformed or a template override
/// cannot be read
pub async fn build_reconciler(config: &Config, unit_name: &str) -> Result<Reconciler> {
    let layout = ServiceLayout::for_unit(unit_name, &config.service)?;
    let executor: Arc<dyn CommandExecutor> = Arc::new(LocalExecutor::new());
    let use_sudo = needs_sudo(&executor).await;
    info!(unit = %unit_name, service = %layout.service_name, use_sudo, "wiring reconciler");

    let templates = Templates::load(config.service.templates_dir.as_deref())
        .await
        .wrap_err("failed to load templates")?;

    let toolchain = GoToolchain::new(
        executor.clone(),
        &layout,
        std::env::var("PATH").unwrap_or_default(),
    )
    .with_timeouts(config.timeouts.fetch(), config.timeouts.build());

    let collaborators = Collaborators {
        environment: Arc::new(HookTools::new(executor.clone())),
        packages: Arc::new(AptManager::new(executor.clone(), use_sudo)),
        provisioner: Arc::new(SystemProvisioner::new(executor.clone(), use_sudo)),
        toolchain: Arc::new(toolchain),
        supervisor: Arc::new(UpstartSupervisor::for_layout(executor, &layout).with_sudo(use_sudo)),
        store: Arc::new(JsonStateStore::new(&config.agent.state_file)),
    };

    Ok(Reconciler::new(
        layout,
        config.service.dependencies.clone(),
        templates,
        collaborators,
    ))
}
