//! Error types shared across the crate.
//!
//! [`SyncError`] is what the sync engine and the remote API report. The
//! binary wraps it in `anyhow` at the edge.
use thiserror::Error;

use crate::state::Field;

/// Failure of a single round trip with the remote service.
///
/// `Transport` and `Rejected` are handled the same way by the engine: no
/// state change, no retry. They are kept apart only for the diagnostic text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Network unreachable, timed out, or the response body could not be decoded.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The service answered with a non-2xx status.
    #[error("{}", rejected_message(.status, .detail))]
    Rejected { status: u16, detail: Option<String> },

    /// A required draft field was empty; nothing was sent.
    #[error("{0} is required")]
    IncompleteDraft(Field),
}

fn rejected_message(status: &u16, detail: &Option<String>) -> String {
    match detail {
        Some(d) => format!("rejected by service (HTTP {status}): {d}"),
        None => format!("rejected by service (HTTP {status})"),
    }
}
