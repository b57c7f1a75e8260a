//! Member liveness probing and primary discovery.
//!
//! Members are probed one at a time, in declaration order.

use either::Either;
use itertools::Itertools;
use serde_json::Value;
use tracing::{debug, warn};

use crate::channel::AdminClient;
use crate::error::{Error, Result};
use crate::types::{AuthMode, Liveness, Member, MemberProbe};

/// `errmsg` of `rs.status()` on a node started without `--replSet`.
pub const NOT_RUNNING_WITH_REPLSET: &str = "not running with --replSet";

/// Classify one `rs.status()` answer.
pub fn classify(status: &Value, set_name: &str, auth: AuthMode) -> Liveness {
    let errmsg = status.get("errmsg").and_then(Value::as_str);
    let code_name = status.get("codeName").and_then(Value::as_str);

    if errmsg == Some(NOT_RUNNING_WITH_REPLSET) || code_name == Some("NoReplicationEnabled") {
        return Liveness::NotReplicaCapable;
    }

    if auth.is_enabled()
        && errmsg.is_some_and(|msg| msg.contains("unauthorized") || msg.contains("not authorized"))
    {
        return Liveness::Unauthorized;
    }

    if let Some(set) = status.get("set") {
        let set = set.as_str().map_or_else(|| set.to_string(), str::to_string);
        return if set == set_name {
            Liveness::InSet
        } else {
            Liveness::Foreign { set }
        };
    }

    if status.get("info").is_some() || code_name == Some("NotYetInitialized") {
        return Liveness::Unconfigured;
    }

    Liveness::Dead
}

/// Probe every candidate and partition them into alive and dead.
///
/// # Errors
///
/// Returns `NotReplicaCapable` or `ForeignReplicaSet` as soon as a host
/// reports either; decoding errors are also fatal. Unreachable hosts are
/// only logged.
pub async fn probe_members(
    admin: &AdminClient,
    candidates: &[Member],
    set_name: &str,
    auth: AuthMode,
) -> Result<MemberProbe> {
    let mut liveness = Vec::with_capacity(candidates.len());

    for member in candidates {
        let host = member.host.as_str();
        debug!(host, "Checking replicaset member");

        let class = match admin.rs_status(host).await {
            Ok(status) => {
                let class = classify(&status, set_name, auth);
                if class == Liveness::Dead {
                    debug!(host, %status, "Unrecognized rs.status() answer");
                }
                class
            }
            Err(e) if e.is_unreachable() => {
                warn!(host, error = %e, "Can't connect to replicaset member");
                Liveness::Dead
            }
            Err(e) => return Err(e),
        };

        match &class {
            Liveness::NotReplicaCapable => {
                return Err(Error::NotReplicaCapable {
                    set: set_name.to_string(),
                    host: host.to_string(),
                });
            }
            Liveness::Foreign { set } => {
                return Err(Error::ForeignReplicaSet {
                    set: set_name.to_string(),
                    host: host.to_string(),
                    foreign: set.clone(),
                });
            }
            Liveness::Unauthorized => warn!(
                host,
                "Host is available, but unauthorized because authentication is enabled"
            ),
            Liveness::InSet => debug!(host, set = set_name, "Host is available for replset"),
            Liveness::Unconfigured => debug!(host, "Host is alive but unconfigured"),
            Liveness::Dead => {}
        }

        liveness.push((member, class));
    }

    let (alive, dead): (Vec<Member>, Vec<Member>) =
        liveness.iter().partition_map(|(member, class)| {
            if class.is_alive() {
                Either::Left((*member).clone())
            } else {
                Either::Right((*member).clone())
            }
        });

    Ok(MemberProbe {
        alive,
        dead,
        liveness: liveness
            .into_iter()
            .map(|(member, class)| (member.host.clone(), class))
            .collect(),
    })
}

/// Whether a `db.isMaster()` answer says the node is the writable primary.
pub fn reports_primary(status: &Value) -> bool {
    ["ismaster", "isWritablePrimary"]
        .iter()
        .any(|key| status.get(key).and_then(Value::as_bool).unwrap_or(false))
}

/// Find the primary as reported by the alive members.
///
/// Asks each member in order and returns the first `primary` reported.
///
/// # Errors
///
/// Propagates command errors.
pub async fn master_host(admin: &AdminClient, alive: &[Member]) -> Result<Option<String>> {
    for member in alive {
        let status = admin.is_master(&member.host).await?;
        if let Some(primary) = status.get("primary").and_then(Value::as_str) {
            debug!(host = %member.host, primary, "Found primary");
            return Ok(Some(primary.to_string()));
        }
    }
    Ok(None)
}
