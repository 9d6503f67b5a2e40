//! warren-agent
//!
//! Reconciles a Warren instance on each lifecycle or relation hook. Runs
//! either as `warren-agent hook <event>` or through a symlink named after
//! the hook, e.g. `hooks/config-changed`.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::Result;
use eyre::{WrapErr, eyre};
use kameo::actor::Spawn;
use kameo::error::SendError;
use tracing::info;
use tracing_subscriber::EnvFilter;
use warren_core::{
    CoreError, GetDurableState, HandleHook, HookEvent, ReconcilerActor, ReconcilerActorArgs,
};

mod config;
mod factory;

use config::{AgentConfig, Config, LogFormat};
use factory::{UNIT_NAME_VAR, build_reconciler};

const BINARY_NAME: &str = "warren-agent";

#[derive(Debug, Parser)]
#[command(name = BINARY_NAME)]
#[command(about = "Lifecycle reconciler for the Warren application", long_about = None)]
struct Cli {
    /// Agent configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Unit to reconcile, e.g. `warren/0` (defaults to $JUJU_UNIT_NAME)
    #[arg(long, global = true)]
    unit: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Reconcile the instance for one hook event
    Hook {
        /// Hook name, e.g. `config-changed` or `mongodb-relation-joined`
        event: String,
    },
    /// Print the committed durable state as JSON
    State,
}

/// Hook named by the invocation path when run through a hook symlink
///
/// Returns `None` when invoked as the binary itself. Any other name must be
/// a known hook.
fn hook_from_argv0(argv0: &str) -> Result<Option<HookEvent>, CoreError> {
    let Some(name) = Path::new(argv0).file_name().and_then(|n| n.to_str()) else {
        return Ok(None);
    };
    if name == BINARY_NAME {
        return Ok(None);
    }
    name.parse().map(Some)
}

fn init_tracing(agent: &AgentConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&agent.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match agent.log_format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let argv0 = std::env::args().next().unwrap_or_default();
    let cli = match hook_from_argv0(&argv0)? {
        Some(event) => Cli {
            config: None,
            unit: None,
            command: Commands::Hook {
                event: event.to_string(),
            },
        },
        None => Cli::parse(),
    };

    let config = Config::load_default(cli.config.as_deref())?;
    init_tracing(&config.agent);

    let unit_name = match cli.unit {
        Some(unit) => unit,
        None => std::env::var(UNIT_NAME_VAR)
            .wrap_err_with(|| format!("{UNIT_NAME_VAR} is not set and --unit was not given"))?,
    };

    let reconciler = build_reconciler(&config, &unit_name).await?;
    let actor_ref = ReconcilerActor::spawn(ReconcilerActorArgs { reconciler });

    let outcome = match cli.command {
        Commands::Hook { event } => run_hook(&actor_ref, &event).await,
        Commands::State => print_state(&actor_ref).await,
    };

    actor_ref
        .stop_gracefully()
        .await
        .map_err(|e| eyre!("failed to stop reconciler: {e:?}"))?;
    outcome
}

async fn run_hook(actor_ref: &kameo::actor::ActorRef<ReconcilerActor>, name: &str) -> Result<()> {
    let event: HookEvent = name.parse()?;

    match actor_ref.ask(HandleHook { event }).await {
        Ok(report) => {
            info!(
                event = %report.event,
                packages_changed = report.packages_changed,
                rebuilt = report.rebuilt,
                announced = report.announced.len(),
                "hook handled"
            );
            Ok(())
        }
        Err(SendError::HandlerError(err)) => {
            let step = err.step();
            Err(eyre::Report::new(err).wrap_err(format!("{event} failed during {step}")))
        }
        Err(other) => Err(eyre!("reconciler unavailable: {other:?}")),
    }
}

async fn print_state(actor_ref: &kameo::actor::ActorRef<ReconcilerActor>) -> Result<()> {
    let state = match actor_ref.ask(GetDurableState).await {
        Ok(state) => state,
        Err(SendError::HandlerError(err)) => return Err(err.into()),
        Err(other) => return Err(eyre!("reconciler unavailable: {other:?}")),
    };
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}
