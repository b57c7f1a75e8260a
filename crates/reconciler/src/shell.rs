//! Command channel backed by the `mongo` shell.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::channel::CommandChannel;
use crate::error::{Error, Result};
use crate::retry::{PollConfig, with_retry};

/// Configuration for the shell channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellConfig {
    /// Path to the shell executable.
    #[serde(default = "default_binary")]
    pub binary: String,

    /// Connection target used when a command names no host.
    #[serde(default)]
    pub host: Option<String>,

    /// Extra arguments passed before `--eval` (TLS, credentials file, ...).
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Delay between attempts after a connection failure.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            host: None,
            extra_args: Vec::new(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

impl ShellConfig {
    /// Create a config for the given executable.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            ..Default::default()
        }
    }

    /// Set the default connection target.
    #[must_use]
    pub fn default_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Delay between attempts.
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    /// Command-line arguments for one evaluation.
    pub fn args(&self, script: &str, database: &str, host: Option<&str>) -> Vec<String> {
        let mut args = vec![database.to_string(), "--quiet".to_string()];
        if let Some(host) = host.or(self.host.as_deref()) {
            args.push("--host".to_string());
            args.push(host.to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args.push("--eval".to_string());
        args.push(script.to_string());
        args
    }
}

fn default_binary() -> String {
    "mongo".to_string()
}

const fn default_retry_delay_secs() -> u64 {
    3
}

/// [`CommandChannel`] that runs each script through the shell executable.
#[derive(Debug, Clone, Default)]
pub struct MongoShell {
    config: ShellConfig,
}

impl MongoShell {
    /// Create a shell channel.
    pub const fn new(config: ShellConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    pub const fn config(&self) -> &ShellConfig {
        &self.config
    }

    async fn eval_once(&self, script: &str, database: &str, host: Option<&str>) -> Result<String> {
        let target = host
            .or(self.config.host.as_deref())
            .unwrap_or("default connection");
        let args = self.config.args(script, database, host);

        debug!(binary = %self.config.binary, host = target, "Running mongo shell");

        let output = Command::new(&self.config.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // The legacy shell reports connection errors on stdout.
            let reason = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(Error::connection_failed(
                target,
                format!("{} exited with {}: {reason}", self.config.binary, output.status),
            ));
        }

        Ok(stdout)
    }
}

#[async_trait]
impl CommandChannel for MongoShell {
    async fn eval(
        &self,
        script: &str,
        database: &str,
        host: Option<&str>,
        retries: u32,
    ) -> Result<String> {
        let policy = PollConfig::new(retries, self.config.retry_delay());
        with_retry(&policy, |attempt| async move {
            self.eval_once(script, database, host).await.inspect_err(|e| {
                if e.is_retryable() && attempt < retries {
                    warn!(attempt, error = %e, "Shell command failed, retrying");
                }
            })
        })
        .await
    }
}
