//! Settings file: shell transport, reconciler tuning and the declaration.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use replset_reconciler::{
    CommandChannel, DesiredState, MongoShell, PollConfig, ReconcilerConfig, ReplicaSetDeclaration,
    ShellConfig,
};
use serde::Deserialize;

/// Everything a `replset` invocation needs.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub shell: ShellConfig,
    #[serde(default)]
    pub reconciler: ReconcilerSettings,
    pub replset: ReplicaSetDeclaration,
}

/// Reconciler tuning, in file units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ReconcilerSettings {
    #[serde(default = "default_command_retries")]
    pub command_retries: u32,
    #[serde(default = "default_primary_poll_attempts")]
    pub primary_poll_attempts: u32,
    #[serde(default = "default_primary_poll_interval_secs")]
    pub primary_poll_interval_secs: u64,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            command_retries: default_command_retries(),
            primary_poll_attempts: default_primary_poll_attempts(),
            primary_poll_interval_secs: default_primary_poll_interval_secs(),
        }
    }
}

const fn default_command_retries() -> u32 {
    4
}

const fn default_primary_poll_attempts() -> u32 {
    10
}

const fn default_primary_poll_interval_secs() -> u64 {
    3
}

impl Settings {
    /// Load settings from a YAML or TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    pub fn load(path: &Path) -> replset_core::Result<Self> {
        replset_core::load_document(path)
    }

    /// Reconciler configuration.
    pub const fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            primary_poll: PollConfig::new(
                self.reconciler.primary_poll_attempts,
                Duration::from_secs(self.reconciler.primary_poll_interval_secs),
            ),
            command_retries: self.reconciler.command_retries,
        }
    }

    /// Normalized and validated declaration.
    ///
    /// # Errors
    ///
    /// Returns the normalization or validation error.
    pub fn desired_state(&self) -> replset_reconciler::Result<DesiredState> {
        DesiredState::from_declaration(&self.replset)
    }

    /// Shell-backed command channel.
    pub fn channel(&self) -> Arc<dyn CommandChannel> {
        Arc::new(MongoShell::new(self.shell.clone()))
    }
}
