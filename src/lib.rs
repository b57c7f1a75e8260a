#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # replset
//!
//! Converge a MongoDB replica set's membership to a declared state.
//!
//! This library re-exports the workspace crates and holds the CLI layer.

pub use replset_core;
pub use replset_reconciler;

pub mod cli;
pub mod commands;
pub mod settings;
