//! Library crate for userdir-client.
//!
//! This crate exposes the building blocks of the client:
//! - Remote service boundary and wire types (`api`)
//! - Directory state store: collection plus form mode/draft (`state`)
//! - Sync engine: one request per action, then a full re-read (`sync`)
//! - Application state, config and event loop (`app`)
//! - UI rendering (`ui`)
//! - Scripted journey runner for the same four operations (`journey`)
//! - Error and result types (`error`)
//!
//! It is used by the `userdir-client` binary and by tests.
#![doc = include_str!("../README.md")]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod api;
pub mod app;
pub mod error;
pub mod journey;
pub mod state;
pub mod sync;
pub mod ui;

// Re-export commonly used items at the crate root for convenience
pub use error::SyncError;
pub use state::{DirectoryState, FormState};
pub use sync::SyncEngine;
