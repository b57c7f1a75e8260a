//! Core types for the reconciler.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ulid::Ulid;

use crate::config::ReplSetConfig;
use crate::error::{Error, Result};
use crate::member;

/// Default host used to initiate a set when authentication is enabled.
pub const DEFAULT_INITIALIZE_HOST: &str = "127.0.0.1";

/// One replica set participant.
///
/// Serialized with the wire field names. Unset fields are omitted so that a
/// member without an explicit value never forces that field into the config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    /// `hostname:port`; the identity of the member within its set.
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arbiter_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_indexes: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slave_delay: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub votes: Option<u8>,
}

impl Member {
    /// Create a member with every attribute at its default.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            arbiter_only: Some(false),
            build_indexes: Some(true),
            hidden: Some(false),
            priority: Some(1.0),
            tags: Some(BTreeMap::new()),
            slave_delay: Some(0),
            votes: Some(1),
        }
    }

    /// Project a member document from `rs.conf()` onto the member fields.
    ///
    /// Returns `None` when the document has no string `host`.
    pub fn from_wire(doc: &Value) -> Option<Self> {
        let host = doc.get("host")?.as_str()?.to_string();
        Some(Self {
            host,
            arbiter_only: doc.get("arbiterOnly").and_then(Value::as_bool),
            build_indexes: doc.get("buildIndexes").and_then(Value::as_bool),
            hidden: doc.get("hidden").and_then(Value::as_bool),
            priority: doc.get("priority").and_then(Value::as_f64),
            tags: doc.get("tags").and_then(Value::as_object).map(|tags| {
                tags.iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            }),
            slave_delay: doc.get("slaveDelay").and_then(Value::as_u64),
            votes: doc
                .get("votes")
                .and_then(Value::as_u64)
                .and_then(|v| u8::try_from(v).ok()),
        })
    }

    /// Mark this member as an arbiter.
    #[must_use]
    pub fn as_arbiter(mut self) -> Self {
        self.arbiter_only = Some(true);
        self
    }

    /// Set the election priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: f64) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// Whether the replica set should exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ensure {
    #[default]
    Present,
    Absent,
}

/// Authentication mode of the cluster.
///
/// When enabled, data-bearing nodes may refuse status queries, and a brand
/// new set is initiated through the bootstrap host instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    Disabled,
    Enabled,
}

impl AuthMode {
    /// Whether authentication is enabled.
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled)
    }
}

/// Raw replica set declaration, as decoded from the configuration layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaSetDeclaration {
    /// The replica set identifier.
    pub name: String,
    #[serde(default)]
    pub ensure: Ensure,
    /// Host to mark as arbiter; must match a member.
    #[serde(default)]
    pub arbiter: Option<String>,
    /// Host used for initialization when authentication is enabled.
    #[serde(default = "default_initialize_host")]
    pub initialize_host: String,
    #[serde(default)]
    pub auth_enabled: AuthMode,
    /// Member declarations: hostname strings or attribute maps.
    #[serde(default)]
    pub members: Vec<Value>,
}

fn default_initialize_host() -> String {
    DEFAULT_INITIALIZE_HOST.to_string()
}

/// Desired state declaration.
///
/// This represents what the replica set should look like.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DesiredState {
    /// Replica set name, used as the config `_id`.
    pub name: String,
    pub ensure: Ensure,
    /// Members in declaration order.
    pub members: Vec<Member>,
    pub arbiter: Option<String>,
    pub initialize_host: String,
    pub auth: AuthMode,
}

impl DesiredState {
    /// Create a desired state for a present set with the given members.
    pub fn new(name: impl Into<String>, members: Vec<Member>) -> Self {
        Self {
            name: name.into(),
            ensure: Ensure::Present,
            members,
            arbiter: None,
            initialize_host: default_initialize_host(),
            auth: AuthMode::Disabled,
        }
    }

    /// Normalize and validate a raw declaration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMember` for a bad member declaration and
    /// `InvalidDesiredState` when the set as a whole is inconsistent.
    pub fn from_declaration(declaration: &ReplicaSetDeclaration) -> Result<Self> {
        let members = member::normalize_all(&declaration.members)?;
        let desired = Self {
            name: declaration.name.clone(),
            ensure: declaration.ensure,
            members,
            arbiter: declaration.arbiter.clone(),
            initialize_host: declaration.initialize_host.clone(),
            auth: declaration.auth_enabled,
        };
        desired.validate()?;
        Ok(desired)
    }

    /// Set the arbiter host.
    #[must_use]
    pub fn with_arbiter(mut self, host: impl Into<String>) -> Self {
        self.arbiter = Some(host.into());
        self
    }

    /// Set the authentication mode.
    #[must_use]
    pub const fn with_auth(mut self, auth: AuthMode) -> Self {
        self.auth = auth;
        self
    }

    /// Set the initialization host.
    #[must_use]
    pub fn with_initialize_host(mut self, host: impl Into<String>) -> Self {
        self.initialize_host = host.into();
        self
    }

    /// Set whether the set should exist.
    #[must_use]
    pub const fn with_ensure(mut self, ensure: Ensure) -> Self {
        self.ensure = ensure;
        self
    }

    /// Check the invariants of the declaration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDesiredState` for an empty name, a duplicated host or
    /// an arbiter that matches no member.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::invalid_desired_state(
                &self.name,
                "replica set name must be a non-empty string",
            ));
        }

        if let Some(host) = self.members.iter().map(|m| m.host.as_str()).duplicates().next() {
            return Err(Error::invalid_desired_state(
                &self.name,
                format!("host {host} is declared more than once"),
            ));
        }

        if let Some(arbiter) = &self.arbiter {
            if !self.members.iter().any(|m| &m.host == arbiter) {
                return Err(Error::invalid_desired_state(
                    &self.name,
                    format!("arbiter {arbiter} is not a declared member"),
                ));
            }
        }

        Ok(())
    }

    /// Hosts in declaration order.
    pub fn hosts(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.host.as_str()).collect()
    }

    /// Members as they would appear in a generated config.
    pub fn effective_members(&self) -> Vec<Member> {
        self.members
            .iter()
            .map(|m| match &self.arbiter {
                Some(arbiter) if *arbiter == m.host => m.clone().as_arbiter(),
                _ => m.clone(),
            })
            .collect()
    }

    /// Get the number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check if no members are declared.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Observed state of the replica set, read from the live cluster.
///
/// A snapshot: recomputed on every pass and replaced, never updated in place.
#[derive(Debug, Clone, Serialize)]
pub struct ObservedState {
    pub exists: bool,
    pub name: Option<String>,
    pub members: Vec<Member>,
    pub observed_at: DateTime<Utc>,
}

impl ObservedState {
    /// A set that is not configured (or could not be read).
    pub fn absent() -> Self {
        Self {
            exists: false,
            name: None,
            members: Vec::new(),
            observed_at: Utc::now(),
        }
    }

    /// A configured set.
    pub fn present(name: impl Into<String>, members: Vec<Member>) -> Self {
        Self {
            exists: true,
            name: Some(name.into()),
            members,
            observed_at: Utc::now(),
        }
    }

    /// Whether this snapshot already matches the desired membership.
    ///
    /// Members are compared by host, ignoring order.
    pub fn in_sync_with(&self, desired: &DesiredState) -> bool {
        if !self.exists || self.name.as_deref() != Some(desired.name.as_str()) {
            return false;
        }

        let effective = desired.effective_members();
        if effective.len() != self.members.len() {
            return false;
        }

        let observed: BTreeMap<&str, &Member> =
            self.members.iter().map(|m| (m.host.as_str(), m)).collect();
        effective
            .iter()
            .all(|wanted| observed.get(wanted.host.as_str()) == Some(&wanted))
    }
}

/// Liveness classification of one declared member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum Liveness {
    /// Reachable and already a member of the declared set.
    InSet,
    /// Reachable, replication-capable, not yet part of any set.
    Unconfigured,
    /// Reachable but refused the status query while auth is enabled.
    Unauthorized,
    /// Reachable but reports another set.
    Foreign { set: String },
    /// Running without replication support.
    NotReplicaCapable,
    /// Unreachable, or an unrecognized answer.
    Dead,
}

impl Liveness {
    /// Whether the member counts as alive for config generation.
    pub const fn is_alive(&self) -> bool {
        matches!(self, Self::InSet | Self::Unconfigured | Self::Unauthorized)
    }
}

/// Alive/dead partition of the declared members.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MemberProbe {
    /// Alive members, in declaration order.
    pub alive: Vec<Member>,
    /// Dead members, in declaration order.
    pub dead: Vec<Member>,
    /// Classification of every probed host.
    pub liveness: Vec<(String, Liveness)>,
}

impl MemberProbe {
    /// Hosts of the alive members.
    pub fn alive_hosts(&self) -> Vec<String> {
        self.alive.iter().map(|m| m.host.clone()).collect()
    }

    /// Hosts of the dead members.
    pub fn dead_hosts(&self) -> Vec<String> {
        self.dead.iter().map(|m| m.host.clone()).collect()
    }
}

/// Position of a replica set in the convergence state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Absent,
    Initiating,
    Reconfiguring,
    Converging,
    Present,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "absent"),
            Self::Initiating => write!(f, "initiating"),
            Self::Reconfiguring => write!(f, "reconfiguring"),
            Self::Converging => write!(f, "converging"),
            Self::Present => write!(f, "present"),
        }
    }
}

/// Actions the reconciler can take.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum ReconcileAction {
    /// Nothing to do.
    Noop { reason: String },
    /// Create a brand-new set with `rs.initiate()`.
    Initiate { target: String, config: ReplSetConfig },
    /// Apply a new config to the running set with `rs.reconfig()`.
    Reconfigure { target: String, config: ReplSetConfig },
}

impl ReconcileAction {
    /// Whether the action changes the cluster.
    pub const fn is_mutating(&self) -> bool {
        !matches!(self, Self::Noop { .. })
    }

    /// The config document the action would apply.
    pub const fn config(&self) -> Option<&ReplSetConfig> {
        match self {
            Self::Noop { .. } => None,
            Self::Initiate { config, .. } | Self::Reconfigure { config, .. } => Some(config),
        }
    }

    /// Get a description of the action.
    pub fn description(&self) -> String {
        match self {
            Self::Noop { reason } => format!("no-op: {reason}"),
            Self::Initiate { target, config } => format!(
                "initiate replicaset {} on {target} with {} members",
                config.id,
                config.members.len()
            ),
            Self::Reconfigure { target, config } => format!(
                "reconfigure replicaset {} via {target} with {} members",
                config.id,
                config.members.len()
            ),
        }
    }
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileResult {
    /// Identifier correlating the log lines of this pass.
    pub run_id: Ulid,
    /// The action that was taken.
    pub action: ReconcileAction,
    /// Hosts that answered the probe.
    pub alive: Vec<String>,
    /// Hosts excluded from the config.
    pub dead: Vec<String>,
    /// Final state machine position.
    pub phase: Phase,
    /// Freshly observed state after the pass.
    pub state: ObservedState,
    /// Number of primary checks made after initiating.
    pub poll_attempts: u32,
}

impl ReconcileResult {
    /// Whether the pass left the cluster untouched.
    pub const fn is_noop(&self) -> bool {
        !self.action.is_mutating()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn three_members() -> Vec<Member> {
        vec![
            Member::new("a:27017"),
            Member::new("b:27017"),
            Member::new("c:27017"),
        ]
    }

    #[test]
    fn test_member_serializes_camel_case_and_skips_unset() -> Result<()> {
        let mut member = Member::new("a:27017");
        member.priority = None;

        let wire = serde_json::to_value(&member)?;

        assert_eq!(wire.get("arbiterOnly"), Some(&json!(false)));
        assert_eq!(wire.get("slaveDelay"), Some(&json!(0)));
        assert!(wire.get("priority").is_none());
        Ok(())
    }

    #[test]
    fn test_member_from_wire_ignores_extra_fields() {
        let doc = json!({
            "_id": 0,
            "host": "a:27017",
            "arbiterOnly": false,
            "buildIndexes": true,
            "hidden": false,
            "priority": 1,
            "tags": {},
            "slaveDelay": 0,
            "votes": 1,
            "secondaryDelaySecs": 0
        });
        assert_eq!(Member::from_wire(&doc), Some(Member::new("a:27017")));
        assert_eq!(Member::from_wire(&json!({ "_id": 1 })), None);
    }

    #[test]
    fn test_declaration_defaults() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let declaration: ReplicaSetDeclaration =
            serde_json::from_value(json!({ "name": "rs0", "members": ["a:27017"] }))?;

        assert_eq!(declaration.ensure, Ensure::Present);
        assert_eq!(declaration.auth_enabled, AuthMode::Disabled);
        assert_eq!(declaration.initialize_host, DEFAULT_INITIALIZE_HOST);

        let desired = DesiredState::from_declaration(&declaration)?;
        assert_eq!(desired.hosts(), vec!["a:27017"]);
        Ok(())
    }

    #[test]
    fn test_duplicate_hosts_rejected() {
        let desired =
            DesiredState::new("rs0", vec![Member::new("a:27017"), Member::new("a:27017")]);
        assert!(matches!(
            desired.validate(),
            Err(Error::InvalidDesiredState { .. })
        ));
    }

    #[test]
    fn test_unknown_arbiter_rejected() {
        let desired = DesiredState::new("rs0", three_members()).with_arbiter("z:27017");
        assert!(desired.validate().is_err());
    }

    #[test]
    fn test_effective_members_apply_arbiter() {
        let desired = DesiredState::new("rs0", three_members()).with_arbiter("c:27017");
        let effective = desired.effective_members();

        assert_eq!(effective.first().and_then(|m| m.arbiter_only), Some(false));
        assert_eq!(effective.get(2).and_then(|m| m.arbiter_only), Some(true));
        // The declaration itself is untouched.
        assert_eq!(desired.members.get(2).and_then(|m| m.arbiter_only), Some(false));
    }

    #[test]
    fn test_in_sync_ignores_order() {
        let desired = DesiredState::new("rs0", three_members());
        let mut reversed = three_members();
        reversed.reverse();

        assert!(ObservedState::present("rs0", reversed).in_sync_with(&desired));
        assert!(!ObservedState::absent().in_sync_with(&desired));
        assert!(!ObservedState::present("rs1", three_members()).in_sync_with(&desired));
    }

    #[test]
    fn test_in_sync_detects_attribute_drift() {
        let desired = DesiredState::new("rs0", three_members());
        let mut drifted = three_members();
        if let Some(member) = drifted.first_mut() {
            member.priority = Some(5.0);
        }

        assert!(!ObservedState::present("rs0", drifted).in_sync_with(&desired));
    }

    #[test]
    fn test_in_sync_detects_missing_member() {
        let mut members = three_members();
        members.push(Member::new("d:27017"));
        let desired = DesiredState::new("rs0", members);

        assert!(!ObservedState::present("rs0", three_members()).in_sync_with(&desired));
    }

    #[test]
    fn test_liveness_alive_classes() {
        assert!(Liveness::InSet.is_alive());
        assert!(Liveness::Unconfigured.is_alive());
        assert!(Liveness::Unauthorized.is_alive());
        assert!(!Liveness::Dead.is_alive());
        assert!(!Liveness::Foreign { set: "x".into() }.is_alive());
    }

    #[test]
    fn test_noop_is_not_mutating() {
        let action = ReconcileAction::Noop {
            reason: "in sync".into(),
        };
        assert!(!action.is_mutating());
        assert!(action.config().is_none());
        assert!(action.description().contains("in sync"));
    }
}
