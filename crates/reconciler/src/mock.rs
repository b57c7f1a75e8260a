//! Scripted command channel for tests.
//!
//! Records every evaluated script and serves pre-configured responses, making
//! it easy to write deterministic tests for the reconciliation logic without
//! a running deployment.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::channel::CommandChannel;
use crate::error::{Error, Result};

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Raw text printed by the shell.
    Output(String),
    /// The host could not be reached.
    Unreachable(String),
}

impl MockResponse {
    /// A response printing `value` as JSON.
    pub fn json(value: &Value) -> Self {
        Self::Output(value.to_string())
    }

    /// A connection failure with the given reason.
    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self::Unreachable(reason.into())
    }
}

/// A script evaluated through the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub host: Option<String>,
    pub database: String,
    /// The expression inside `printjson(...)`.
    pub expression: String,
}

impl RecordedCall {
    /// Whether this call changes the replica set config.
    pub fn is_mutating(&self) -> bool {
        self.expression.starts_with("rs.initiate(") || self.expression.starts_with("rs.reconfig(")
    }

    /// Decode the JSON argument of a call such as `rs.initiate({...})`.
    pub fn argument(&self) -> Option<Value> {
        let open = self.expression.find('(')?;
        let inner = self
            .expression
            .get(open.saturating_add(1)..self.expression.len().saturating_sub(1))?;
        serde_json::from_str(inner).ok()
    }
}

#[derive(Debug)]
struct Rule {
    host: Option<String>,
    prefix: String,
    responses: VecDeque<MockResponse>,
    last: MockResponse,
}

/// Test-double channel with per-host scripted responses.
///
/// A rule matches on the target host and the start of the expression. Its
/// responses are served in order and the last one repeats. Calls matching no
/// rule fail as unreachable.
#[derive(Debug, Default)]
pub struct MockChannel {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockChannel {
    /// Create a mock with no rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `responses` in order for `prefix` on `host`.
    #[must_use]
    pub fn on(self, host: Option<&str>, prefix: &str, responses: Vec<MockResponse>) -> Self {
        let mut responses: VecDeque<MockResponse> = responses.into();
        let last = responses
            .back()
            .cloned()
            .unwrap_or_else(|| MockResponse::unreachable("no scripted response"));
        if responses.len() == 1 {
            responses.clear();
        }
        self.rules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Rule {
                host: host.map(str::to_string),
                prefix: prefix.to_string(),
                responses,
                last,
            });
        self
    }

    /// Always answer `prefix` on `host` with `value`.
    #[must_use]
    pub fn respond(self, host: Option<&str>, prefix: &str, value: &Value) -> Self {
        self.on(host, prefix, vec![MockResponse::json(value)])
    }

    /// Always fail `prefix` on `host` as unreachable.
    #[must_use]
    pub fn fail(self, host: Option<&str>, prefix: &str, reason: &str) -> Self {
        self.on(host, prefix, vec![MockResponse::unreachable(reason)])
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Calls that initiate or reconfigure the set.
    pub fn mutating_calls(&self) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(RecordedCall::is_mutating)
            .collect()
    }

    /// Calls whose expression starts with `prefix`.
    pub fn calls_to(&self, prefix: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.expression.starts_with(prefix))
            .collect()
    }

    fn next_response(&self, host: Option<&str>, expression: &str) -> Option<MockResponse> {
        let mut rules = self.rules.lock().unwrap_or_else(PoisonError::into_inner);
        let rule = rules
            .iter_mut()
            .find(|rule| rule.host.as_deref() == host && expression.starts_with(&rule.prefix))?;
        Some(
            rule.responses
                .pop_front()
                .unwrap_or_else(|| rule.last.clone()),
        )
    }
}

#[async_trait]
impl CommandChannel for MockChannel {
    async fn eval(
        &self,
        script: &str,
        database: &str,
        host: Option<&str>,
        _retries: u32,
    ) -> Result<String> {
        let expression = script
            .strip_prefix("printjson(")
            .and_then(|rest| rest.strip_suffix(')'))
            .unwrap_or(script)
            .to_string();

        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                host: host.map(str::to_string),
                database: database.to_string(),
                expression: expression.clone(),
            });

        let target = host.unwrap_or("default connection");
        match self.next_response(host, &expression) {
            Some(MockResponse::Output(text)) => Ok(text),
            Some(MockResponse::Unreachable(reason)) => {
                Err(Error::connection_failed(target, reason))
            }
            None => Err(Error::connection_failed(target, "no route to host")),
        }
    }
}
