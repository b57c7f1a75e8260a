//! CLI command handlers.
//!
//! Every handler prints a JSON document on stdout; logs go to stderr.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use replset_core::ResultExt;
use replset_reconciler::{DesiredState, Reconciler, ReconcilerBuilder};
use serde::Serialize;
use serde_json::json;
use tokio::signal;
use tracing::info;

use crate::cli::Commands;
use crate::settings::Settings;

/// Execute a CLI command.
///
/// This is the main command dispatcher that routes to the appropriate handler.
pub async fn execute_command(config: &Path, command: Commands) -> Result<()> {
    let settings = Settings::load(config)
        .with_context(|| format!("Failed to load settings from {}", config.display()))?;
    let desired = settings
        .desired_state()
        .context("Invalid replica set declaration")?;

    match command {
        Commands::Validate => cmd_validate(&desired),
        Commands::Status => cmd_status(&build_reconciler(&settings)?, &desired).await,
        Commands::Plan => cmd_plan(&build_reconciler(&settings)?, &desired).await,
        Commands::Apply => cmd_apply(&build_reconciler(&settings)?, &desired).await,
        Commands::Watch { interval } => {
            cmd_watch(
                &build_reconciler(&settings)?,
                &desired,
                Duration::from_secs(interval),
            )
            .await
        }
    }
}

fn build_reconciler(settings: &Settings) -> Result<Reconciler> {
    ReconcilerBuilder::new()
        .with_channel(settings.channel())
        .with_config(settings.reconciler_config())
        .build()
        .context("Failed to build reconciler")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to render output")?;
    println!("{text}");
    Ok(())
}

fn cmd_validate(desired: &DesiredState) -> Result<()> {
    info!(set = %desired.name, members = desired.len(), "Declaration is valid");
    print_json(&json!({
        "name": desired.name,
        "ensure": desired.ensure,
        "members": desired.effective_members(),
    }))
}

async fn cmd_status(reconciler: &Reconciler, desired: &DesiredState) -> Result<()> {
    let state = reconciler.current_state().await;
    let in_sync = state.in_sync_with(desired);
    print_json(&json!({ "state": state, "in_sync": in_sync }))
}

async fn cmd_plan(reconciler: &Reconciler, desired: &DesiredState) -> Result<()> {
    let observed = reconciler.current_state().await;
    let plan = reconciler
        .plan(desired, &observed)
        .await
        .with_context(|| format!("Failed to plan replicaset {}", desired.name))?;
    info!(set = %desired.name, action = %plan.action.description(), "Planned");
    print_json(&plan)
}

async fn cmd_apply(reconciler: &Reconciler, desired: &DesiredState) -> Result<()> {
    let result = reconciler
        .converge(desired)
        .await
        .with_context(|| format!("Failed to reconcile replicaset {}", desired.name))?;
    print_json(&result)
}

async fn cmd_watch(
    reconciler: &Reconciler,
    desired: &DesiredState,
    interval: Duration,
) -> Result<()> {
    info!(
        set = %desired.name,
        interval_secs = interval.as_secs(),
        "Watching replicaset. Press Ctrl+C to stop."
    );

    loop {
        if let Some(result) = reconciler
            .converge(desired)
            .await
            .into_option_logged("Reconciliation pass failed")
        {
            info!(
                run_id = %result.run_id,
                phase = %result.phase,
                action = %result.action.description(),
                "Pass complete"
            );
        }

        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, stopping");
                return Ok(());
            }
            () = tokio::time::sleep(interval) => {}
        }
    }
}
