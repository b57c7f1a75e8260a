//! Reconciler implementation.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::channel::{
    AdminClient, CommandChannel, DEFAULT_COMMAND_RETRIES, error_message, is_not_ok,
};
use crate::config::build_config;
use crate::error::{Error, Result};
use crate::inspector;
use crate::prober::{self, reports_primary};
use crate::retry::{PollConfig, poll_until};
use crate::types::{
    DesiredState, Ensure, MemberProbe, ObservedState, Phase, ReconcileAction, ReconcileResult,
};

/// Configuration for the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Primary election wait after `rs.initiate()`.
    pub primary_poll: PollConfig,
    /// Attempts granted to the transport for every command.
    pub command_retries: u32,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            primary_poll: PollConfig::default(),
            command_retries: DEFAULT_COMMAND_RETRIES,
        }
    }
}

/// A decision taken without touching the cluster.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    /// What a pass would do.
    pub action: ReconcileAction,
    /// Liveness of the declared members.
    pub probe: MemberProbe,
    /// Primary reported by the alive members.
    pub master: Option<String>,
}

/// Replica set membership reconciler.
///
/// Each pass probes the declared members, decides between initiating a new
/// set and reconfiguring the running one, applies the generated config and
/// reads the resulting state back.
pub struct Reconciler {
    admin: AdminClient,
    config: ReconcilerConfig,
}

impl Reconciler {
    /// Create a new reconciler.
    pub fn new(channel: Arc<dyn CommandChannel>, config: ReconcilerConfig) -> Self {
        Self {
            admin: AdminClient::new(channel, config.command_retries),
            config,
        }
    }

    /// Read the current state of the set.
    pub async fn current_state(&self) -> ObservedState {
        inspector::current_state(&self.admin).await
    }

    /// Decide what a pass would do, without mutating the cluster.
    ///
    /// # Errors
    ///
    /// Returns topology conflicts found while probing, `NoReachableMembers`
    /// when no declared member answers, and `NoMembers` or `NoPrimary` when
    /// neither branch can proceed.
    pub async fn plan(&self, desired: &DesiredState, observed: &ObservedState) -> Result<Plan> {
        if desired.ensure == Ensure::Absent {
            return Ok(Plan {
                action: ReconcileAction::Noop {
                    reason: "removing a replicaset is not supported".to_string(),
                },
                probe: MemberProbe::default(),
                master: None,
            });
        }

        let probe =
            prober::probe_members(&self.admin, &desired.members, &desired.name, desired.auth)
                .await?;

        if !desired.is_empty() && probe.alive.is_empty() {
            return Err(Error::NoReachableMembers {
                set: desired.name.clone(),
            });
        }

        for host in probe.dead_hosts() {
            warn!(
                set = %desired.name,
                host = %host,
                "Member is down, excluding it from the config"
            );
        }

        let master = prober::master_host(&self.admin, &probe.alive).await?;
        let config = build_config(&desired.name, &probe.alive, desired.arbiter.as_deref());

        let action = if !observed.exists && master.is_none() {
            let target = if desired.auth.is_enabled() {
                desired.initialize_host.clone()
            } else {
                probe
                    .alive
                    .first()
                    .map(|member| member.host.clone())
                    .ok_or_else(|| Error::NoMembers {
                        set: desired.name.clone(),
                    })?
            };
            if config.members.is_empty() {
                return Err(Error::NoMembers {
                    set: desired.name.clone(),
                });
            }
            ReconcileAction::Initiate { target, config }
        } else {
            let target = master.clone().ok_or_else(|| Error::NoPrimary {
                set: desired.name.clone(),
            })?;
            ReconcileAction::Reconfigure { target, config }
        };

        debug!(set = %desired.name, action = %action.description(), "Planned action");
        Ok(Plan {
            action,
            probe,
            master,
        })
    }

    /// Run one reconciliation pass against an observed state.
    ///
    /// # Errors
    ///
    /// Returns any planning error, `InitiateFailed` or `ReconfigFailed` when
    /// the cluster rejects the config, and `PrimaryTimeout` when a freshly
    /// initiated set never elects its first member.
    pub async fn reconcile(
        &self,
        desired: &DesiredState,
        observed: &ObservedState,
    ) -> Result<ReconcileResult> {
        let run_id = Ulid::new();
        info!(
            %run_id,
            set = %desired.name,
            exists = observed.exists,
            members = desired.len(),
            "Starting reconciliation"
        );

        let plan = self.plan(desired, observed).await?;
        let mut poll_attempts = 0;

        match &plan.action {
            ReconcileAction::Noop { reason } => {
                info!(%run_id, set = %desired.name, reason = %reason, "Nothing to do");
            }
            ReconcileAction::Initiate { target, config } => {
                transition(run_id, &desired.name, Phase::Absent, Phase::Initiating);
                info!(%run_id, set = %desired.name, host = %target, "Initializing the replicaset");

                let response = self.admin.rs_initiate(config, target).await?;
                if is_not_ok(&response) {
                    return Err(Error::InitiateFailed {
                        set: desired.name.clone(),
                        message: error_message(&response),
                    });
                }

                transition(run_id, &desired.name, Phase::Initiating, Phase::Converging);
                let first = plan.probe.alive.first().ok_or_else(|| Error::NoMembers {
                    set: desired.name.clone(),
                })?;
                poll_attempts = self.wait_for_primary(&desired.name, &first.host).await?;
                transition(run_id, &desired.name, Phase::Converging, Phase::Present);
            }
            ReconcileAction::Reconfigure { target, config } => {
                transition(run_id, &desired.name, Phase::Present, Phase::Reconfiguring);
                info!(
                    %run_id,
                    set = %desired.name,
                    host = %target,
                    members = config.members.len(),
                    "Reconfiguring the replicaset"
                );

                let response = self.admin.rs_reconfig(config, target).await?;
                if is_not_ok(&response) {
                    return Err(Error::ReconfigFailed {
                        set: desired.name.clone(),
                        message: error_message(&response),
                    });
                }

                transition(run_id, &desired.name, Phase::Reconfiguring, Phase::Converging);
                transition(run_id, &desired.name, Phase::Converging, Phase::Present);
            }
        }

        let state = self.current_state().await;
        let phase = if state.exists {
            Phase::Present
        } else {
            Phase::Absent
        };

        info!(%run_id, set = %desired.name, %phase, "Reconciliation complete");

        Ok(ReconcileResult {
            run_id,
            alive: plan.probe.alive_hosts(),
            dead: plan.probe.dead_hosts(),
            action: plan.action,
            phase,
            state,
            poll_attempts,
        })
    }

    /// One full pass: inspect, then reconcile unless already in sync.
    ///
    /// # Errors
    ///
    /// Propagates `reconcile` errors.
    pub async fn converge(&self, desired: &DesiredState) -> Result<ReconcileResult> {
        let observed = self.current_state().await;

        if desired.ensure == Ensure::Present && observed.in_sync_with(desired) {
            let run_id = Ulid::new();
            info!(%run_id, set = %desired.name, "Replicaset already in sync");
            return Ok(ReconcileResult {
                run_id,
                action: ReconcileAction::Noop {
                    reason: "replicaset already in sync".to_string(),
                },
                alive: Vec::new(),
                dead: Vec::new(),
                phase: Phase::Present,
                state: observed,
                poll_attempts: 0,
            });
        }

        self.reconcile(desired, &observed).await
    }

    /// Get the configuration.
    pub const fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    async fn wait_for_primary(&self, set: &str, host: &str) -> Result<u32> {
        info!(set, host, "Checking for PRIMARY");
        let admin = &self.admin;
        let outcome = poll_until(&self.config.primary_poll, |attempt| async move {
            let status = admin.is_master(host).await?;
            if reports_primary(&status) {
                return Ok(true);
            }
            warn!(set, host, attempt, "Waiting for host to become PRIMARY");
            Ok(false)
        })
        .await?;

        if outcome.satisfied {
            info!(set, host, attempts = outcome.attempts, "Host is PRIMARY");
            Ok(outcome.attempts)
        } else {
            Err(Error::PrimaryTimeout {
                set: set.to_string(),
                host: host.to_string(),
                attempts: outcome.attempts,
            })
        }
    }
}

fn transition(run_id: Ulid, set: &str, from: Phase, to: Phase) {
    debug!(%run_id, set, %from, %to, "Phase transition");
}

/// Builder for Reconciler.
pub struct ReconcilerBuilder {
    channel: Option<Arc<dyn CommandChannel>>,
    config: ReconcilerConfig,
}

impl ReconcilerBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            channel: None,
            config: ReconcilerConfig::default(),
        }
    }

    /// Set the command channel.
    #[must_use]
    pub fn with_channel(mut self, channel: Arc<dyn CommandChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Set the configuration.
    #[must_use]
    pub const fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the primary election wait.
    #[must_use]
    pub const fn primary_poll(mut self, poll: PollConfig) -> Self {
        self.config.primary_poll = poll;
        self
    }

    /// Set the transport attempts per command.
    #[must_use]
    pub const fn command_retries(mut self, retries: u32) -> Self {
        self.config.command_retries = retries;
        self
    }

    /// Build the reconciler.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` when no channel was set.
    pub fn build(self) -> Result<Reconciler> {
        let channel = self
            .channel
            .ok_or_else(|| Error::invalid_config("Command channel is required"))?;
        Ok(Reconciler::new(channel, self.config))
    }
}

impl Default for ReconcilerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
