//! Command channel abstraction.
//!
//! [`CommandChannel`] is the only seam between the reconciler and a MongoDB
//! deployment: it evaluates a shell script against a host and returns the
//! raw text it printed. [`AdminClient`] builds the administrative commands on
//! top of it and decodes their output.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::config::ReplSetConfig;
use crate::error::{Error, Result};

/// Database administrative commands are run against.
pub const ADMIN_DATABASE: &str = "admin";

/// Default number of attempts the transport gets for one command.
pub const DEFAULT_COMMAND_RETRIES: u32 = 4;

/// Trait for executing administrative shell scripts.
#[async_trait]
pub trait CommandChannel: Send + Sync {
    /// Evaluate `script` against `database` on `host`.
    ///
    /// With `host` unset the channel uses its own default connection.
    /// `retries` bounds the attempts made on connection failures.
    async fn eval(
        &self,
        script: &str,
        database: &str,
        host: Option<&str>,
        retries: u32,
    ) -> Result<String>;
}

// Both patterns are literals compiled by the sanitizer tests below.
#[expect(clippy::expect_used)]
static TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+\((\d+),\s*\d+\)").expect("valid timestamp pattern"));

#[expect(clippy::expect_used)]
static WRAPPER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+\((.+?)\)").expect("valid wrapper pattern"));

/// Strip shell wrapper objects so the output decodes as JSON.
///
/// `Timestamp(1462971623, 1)` keeps its first number, any other
/// `Wrapper(inner)` keeps `inner`, and a bare `null` becomes `{}`.
pub fn sanitize_output(output: &str) -> String {
    let output = TIMESTAMP.replace_all(output, "$1");
    let output = WRAPPER.replace_all(&output, "$1");

    if output.trim() == "null" {
        return "{}".to_string();
    }
    output.into_owned()
}

/// Whether a command document reports failure (`ok: 0`).
pub fn is_not_ok(response: &Value) -> bool {
    response
        .get("ok")
        .and_then(Value::as_f64)
        .is_some_and(|ok| ok.abs() < f64::EPSILON)
}

/// The `errmsg` of a command document.
pub fn error_message(response: &Value) -> String {
    response
        .get("errmsg")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string()
}

/// Administrative command client over a [`CommandChannel`].
#[derive(Clone)]
pub struct AdminClient {
    channel: Arc<dyn CommandChannel>,
    retries: u32,
}

impl AdminClient {
    /// Create a new admin client.
    pub fn new(channel: Arc<dyn CommandChannel>, retries: u32) -> Self {
        Self { channel, retries }
    }

    /// Run an expression and decode the document it prints.
    ///
    /// # Errors
    ///
    /// Returns the channel error, or `InvalidResponse` if the output does not
    /// decode as a JSON document.
    pub async fn run_command(&self, expression: &str, host: Option<&str>) -> Result<Value> {
        let script = format!("printjson({expression})");
        let output = self
            .channel
            .eval(&script, ADMIN_DATABASE, host, self.retries)
            .await
            .inspect_err(|e| debug!(expression, host, error = %e, "Command failed"))?;

        let cleaned = sanitize_output(&output);
        serde_json::from_str(&cleaned).map_err(|e| {
            Error::invalid_response(format!("{expression} on {}: {e}", host.unwrap_or("default")))
        })
    }

    /// `rs.status()` on a host.
    ///
    /// # Errors
    ///
    /// Propagates `run_command` errors.
    pub async fn rs_status(&self, host: &str) -> Result<Value> {
        self.run_command("rs.status()", Some(host)).await
    }

    /// `db.isMaster()` on a host.
    ///
    /// # Errors
    ///
    /// Propagates `run_command` errors.
    pub async fn is_master(&self, host: &str) -> Result<Value> {
        self.run_command("db.isMaster()", Some(host)).await
    }

    /// `rs.conf()` through the channel's default connection.
    ///
    /// # Errors
    ///
    /// Propagates `run_command` errors.
    pub async fn rs_conf(&self) -> Result<Value> {
        self.run_command("rs.conf()", None).await
    }

    /// `rs.initiate(config)` on a host.
    ///
    /// # Errors
    ///
    /// Propagates `run_command` errors and JSON rendering errors.
    pub async fn rs_initiate(&self, config: &ReplSetConfig, host: &str) -> Result<Value> {
        let expression = format!("rs.initiate({})", config.to_json()?);
        self.run_command(&expression, Some(host)).await
    }

    /// `rs.reconfig(config)` on a host.
    ///
    /// # Errors
    ///
    /// Propagates `run_command` errors and JSON rendering errors.
    pub async fn rs_reconfig(&self, config: &ReplSetConfig, host: &str) -> Result<Value> {
        let expression = format!("rs.reconfig({})", config.to_json()?);
        self.run_command(&expression, Some(host)).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_sanitize_timestamp() -> Result<()> {
        let cleaned = sanitize_output(r#"{ "optime" : Timestamp(1462971623, 1), "ok" : 1 }"#);
        let doc: Value = serde_json::from_str(&cleaned)?;
        assert_eq!(doc.get("optime"), Some(&json!(1_462_971_623)));
        Ok(())
    }

    #[test]
    fn test_sanitize_object_id_and_dates() -> Result<()> {
        let cleaned = sanitize_output(concat!(
            r#"{ "replicaSetId" : ObjectId("5c7f1a2b3d4e5f6a7b8c9d0e"), "#,
            r#""date" : ISODate("2016-05-11T12:00:00Z") }"#,
        ));
        let doc: Value = serde_json::from_str(&cleaned)?;
        assert_eq!(
            doc.get("replicaSetId"),
            Some(&json!("5c7f1a2b3d4e5f6a7b8c9d0e"))
        );
        assert_eq!(doc.get("date"), Some(&json!("2016-05-11T12:00:00Z")));
        Ok(())
    }

    #[test]
    fn test_sanitize_number_long() -> Result<()> {
        let cleaned = sanitize_output(r#"{ "term" : NumberLong("42") }"#);
        let doc: Value = serde_json::from_str(&cleaned)?;
        assert_eq!(doc.get("term"), Some(&json!("42")));
        Ok(())
    }

    #[test]
    fn test_sanitize_unquoted_number_long_keeps_every_digit() -> Result<()> {
        // GIVEN: an unquoted NumberLong next to a Timestamp
        let raw = r#"{ "slaveDelay" : NumberLong(3600), "t" : Timestamp(1462971623, 1) }"#;

        // WHEN: sanitizing it
        let doc: Value = serde_json::from_str(&sanitize_output(raw))?;

        // THEN: both values survive intact
        assert_eq!(doc.get("slaveDelay"), Some(&json!(3600)));
        assert_eq!(doc.get("t"), Some(&json!(1_462_971_623)));
        Ok(())
    }

    #[test]
    fn test_sanitize_single_argument_wrappers() {
        assert_eq!(sanitize_output("NumberLong(7)"), "7");
        assert_eq!(sanitize_output("NumberInt(12345)"), "12345");
        assert_eq!(sanitize_output("Timestamp(5, 0)"), "5");
    }

    #[test]
    fn test_sanitize_null_is_empty_document() {
        assert_eq!(sanitize_output("null\n"), "{}");
    }

    #[test]
    fn test_sanitize_leaves_plain_json_alone() {
        let plain = r#"{"set":"rs0","ok":1}"#;
        assert_eq!(sanitize_output(plain), plain);
    }

    #[test]
    fn test_not_ok_detection() {
        assert!(is_not_ok(&json!({ "ok": 0, "errmsg": "boom" })));
        assert!(is_not_ok(&json!({ "ok": 0.0 })));
        assert!(!is_not_ok(&json!({ "ok": 1 })));
        assert!(!is_not_ok(&json!({})));
        assert_eq!(error_message(&json!({ "ok": 0, "errmsg": "boom" })), "boom");
        assert_eq!(error_message(&json!({ "ok": 0 })), "unknown error");
    }
}
