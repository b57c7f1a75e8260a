//! Member normalization.
//!
//! A member is declared either as a bare `hostname:port` string or as a map
//! of snake_case attributes. Normalization turns both into a [`Member`] with
//! every absent attribute set to its default. An attribute declared as
//! `null` stays `None` and is therefore left off the wire.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::types::Member;

/// Attribute names accepted in the map form of a member declaration.
pub const MEMBER_KEYS: [&str; 8] = [
    "host",
    "arbiter_only",
    "build_indexes",
    "hidden",
    "priority",
    "tags",
    "slave_delay",
    "votes",
];

/// Normalize one raw member declaration.
///
/// # Errors
///
/// Returns `InvalidMember` when the declaration is an empty string, a map
/// without `host`, a map with an unknown key or an out-of-range value, or
/// any other JSON shape.
pub fn normalize(raw: &Value) -> Result<Member> {
    match raw {
        Value::String(host) => {
            if host.is_empty() {
                return Err(Error::invalid_member("Hostname must be a non-empty string"));
            }
            Ok(Member::new(host.clone()))
        }
        Value::Object(map) => normalize_map(map),
        _ => Err(Error::invalid_member(
            "Invalid member definition. Must either be a hostname string \
             or a replSet member configuration hash.",
        )),
    }
}

/// Normalize a list of raw declarations, stopping at the first invalid one.
///
/// # Errors
///
/// Returns the first `InvalidMember` error, prefixed with the member index.
pub fn normalize_all(raw: &[Value]) -> Result<Vec<Member>> {
    raw.iter()
        .enumerate()
        .map(|(index, value)| {
            normalize(value).map_err(|e| match e {
                Error::InvalidMember { reason } => {
                    Error::invalid_member(format!("member #{index}: {reason}"))
                }
                other => other,
            })
        })
        .collect()
}

fn normalize_map(map: &Map<String, Value>) -> Result<Member> {
    let Some(host) = map.get("host") else {
        return Err(Error::invalid_member(
            "Host field is required for a replSet member",
        ));
    };

    if let Some(key) = map.keys().find(|key| !MEMBER_KEYS.contains(&key.as_str())) {
        return Err(Error::invalid_member(format!(
            "Invalid key in member definition: {key}"
        )));
    }

    let host = match host.as_str() {
        Some(host) if !host.is_empty() => host.to_string(),
        _ => {
            return Err(Error::invalid_member(
                "Hostname must be a non-empty string",
            ));
        }
    };

    Ok(Member {
        host,
        arbiter_only: field(map, "arbiter_only", false, "a boolean", Value::as_bool)?,
        build_indexes: field(map, "build_indexes", true, "a boolean", Value::as_bool)?,
        hidden: field(map, "hidden", false, "a boolean", Value::as_bool)?,
        priority: field(map, "priority", 1.0, "a number >= 0", |v| {
            v.as_f64().filter(|p| p.is_finite() && *p >= 0.0)
        })?,
        tags: field(map, "tags", BTreeMap::new(), "a map of strings", parse_tags)?,
        slave_delay: field(
            map,
            "slave_delay",
            0,
            "a non-negative integer",
            Value::as_u64,
        )?,
        votes: field(map, "votes", 1, "0 or 1", |v| {
            v.as_u64().filter(|votes| *votes <= 1).and_then(|votes| u8::try_from(votes).ok())
        })?,
    })
}

/// Resolve one optional attribute: absent takes the default, `null` stays unset.
fn field<T>(
    map: &Map<String, Value>,
    key: &str,
    default: T,
    expected: &str,
    parse: impl FnOnce(&Value) -> Option<T>,
) -> Result<Option<T>> {
    match map.get(key) {
        None => Ok(Some(default)),
        Some(Value::Null) => Ok(None),
        Some(value) => parse(value).map(Some).ok_or_else(|| {
            Error::invalid_member(format!(
                "Invalid value for {key}: {value} (expected {expected})"
            ))
        }),
    }
}

fn parse_tags(value: &Value) -> Option<BTreeMap<String, String>> {
    value
        .as_object()?
        .iter()
        .map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
        .collect()
}
