//! Replica set membership reconciliation.
//!
//! This crate drives a MongoDB replica set towards a declared membership:
//!
//! - **Desired State**: the set name and its members, normalized from a declaration
//! - **Observed State**: read from `rs.conf()` on every pass, never cached
//! - **Probe**: classify each declared member as alive or dead
//! - **Action**: initiate a new set, or reconfigure the running one through its primary
//!
//! # Key Concepts
//!
//! ## Reconciliation
//!
//! One pass:
//! 1. Probes the declared members with `rs.status()`
//! 2. Asks the alive members for the primary
//! 3. Builds a config from the alive members only
//! 4. Runs `rs.initiate()` or `rs.reconfig()`
//! 5. Waits for the first member to become primary after an initiate
//! 6. Reads the resulting state back
//!
//! ## Command channel
//!
//! Every cluster interaction goes through [`CommandChannel`]. [`MongoShell`]
//! drives the `mongo` shell; [`MockChannel`] answers from a script.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use replset_reconciler::{DesiredState, Member, MongoShell, ReconcilerBuilder, ShellConfig};
//!
//! #[tokio::main]
//! async fn main() -> replset_reconciler::Result<()> {
//!     let shell = MongoShell::new(ShellConfig::default().default_host("127.0.0.1:27017"));
//!     let reconciler = ReconcilerBuilder::new()
//!         .with_channel(Arc::new(shell))
//!         .build()?;
//!
//!     let desired = DesiredState::new(
//!         "rs0",
//!         vec![Member::new("a:27017"), Member::new("b:27017")],
//!     );
//!     let result = reconciler.converge(&desired).await?;
//!     println!("{}", result.action.description());
//!     Ok(())
//! }
//! ```

#![forbid(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod channel;
pub mod config;
pub mod error;
pub mod inspector;
pub mod member;
pub mod mock;
pub mod prober;
pub mod reconciler;
pub mod retry;
pub mod shell;
pub mod types;

// Re-export main types
pub use channel::{AdminClient, CommandChannel, sanitize_output};
pub use config::{ConfigMember, ReplSetConfig, build_config};
pub use error::{Error, Result};
pub use member::{normalize, normalize_all};
pub use mock::{MockChannel, MockResponse, RecordedCall};
pub use reconciler::{Plan, Reconciler, ReconcilerBuilder, ReconcilerConfig};
pub use retry::{PollConfig, PollOutcome, poll_until, with_retry};
pub use shell::{MongoShell, ShellConfig};
pub use types::{
    AuthMode, DesiredState, Ensure, Liveness, Member, MemberProbe, ObservedState, Phase,
    ReconcileAction, ReconcileResult, ReplicaSetDeclaration,
};
