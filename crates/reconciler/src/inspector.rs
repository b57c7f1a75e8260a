//! Topology inspection: what the replica set currently looks like.

use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use crate::channel::AdminClient;
use crate::types::{Member, ObservedState};

/// Read the current replica set configuration.
///
/// Runs `rs.conf()` through the channel's default connection. A failed
/// command (set not initiated, node unreachable) or a document without
/// `members` means the set does not exist.
pub async fn current_state(admin: &AdminClient) -> ObservedState {
    let state = match admin.rs_conf().await {
        Ok(conf) => project(&conf),
        Err(e) => {
            debug!(error = %e, "rs.conf() failed, treating replicaset as absent");
            ObservedState::absent()
        }
    };

    debug!(
        exists = state.exists,
        name = state.name.as_deref(),
        members = state.members.len(),
        "MongoDB replset properties"
    );
    state
}

/// Project an `rs.conf()` document onto an observed state.
pub fn project(conf: &Value) -> ObservedState {
    let Some(members) = conf.get("members").and_then(Value::as_array) else {
        return ObservedState::absent();
    };

    ObservedState {
        exists: true,
        name: conf.get("_id").and_then(Value::as_str).map(str::to_string),
        members: members.iter().filter_map(Member::from_wire).collect(),
        observed_at: Utc::now(),
    }
}
