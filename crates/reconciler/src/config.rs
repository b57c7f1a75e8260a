//! Replica set configuration document generation.

use serde::Serialize;

use crate::error::Result;
use crate::types::Member;

/// The wire-level replica set configuration: `{_id: name, members: [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplSetConfig {
    #[serde(rename = "_id")]
    pub id: String,
    pub members: Vec<ConfigMember>,
}

/// A member entry in a generated config.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigMember {
    /// Position of the member in this document.
    #[serde(rename = "_id")]
    pub id: usize,
    #[serde(flatten)]
    pub member: Member,
}

impl ReplSetConfig {
    /// Render the document as JSON for a shell expression.
    ///
    /// # Errors
    ///
    /// Returns a JSON error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Hosts in index order.
    pub fn hosts(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.member.host.as_str()).collect()
    }

    /// Look up a member entry by host.
    pub fn member(&self, host: &str) -> Option<&ConfigMember> {
        self.members.iter().find(|m| m.member.host == host)
    }
}

/// Build the config document for `name` from the alive members.
///
/// Members get dense zero-based ids in input order. The member whose host
/// equals `arbiter` is forced to `arbiterOnly: true`.
pub fn build_config(name: &str, alive: &[Member], arbiter: Option<&str>) -> ReplSetConfig {
    let members = alive
        .iter()
        .enumerate()
        .map(|(id, member)| {
            let member = match arbiter {
                Some(host) if host == member.host => member.clone().as_arbiter(),
                _ => member.clone(),
            };
            ConfigMember { id, member }
        })
        .collect();

    ReplSetConfig {
        id: name.to_string(),
        members,
    }
}
