//! Sync engine: one remote call per operator action, then a full re-read.
//!
//! The protocol has two phases that can be driven separately:
//! [`SyncEngine::mutate`] reports only success or failure, and
//! [`SyncEngine::refresh`] is the only source of collection contents. The
//! TUI runs each phase as its own task; [`SyncEngine::submit`],
//! [`SyncEngine::remove`] and [`SyncEngine::fetch_all`] chain them against a
//! [`DirectoryState`] for headless callers and tests.
use std::io::{BufRead, Write};
use std::sync::Arc;

use crate::api::{UserId, UserRecord, UsersApi};
use crate::error::SyncError;
use crate::state::{Action, Applied, DirectoryState, Submission};

/// Prompt shown before a delete is dispatched.
pub const DELETE_PROMPT: &str = "Are you sure you want to delete this user?";

/// Yes/no gate consulted before a destructive request.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

/// A fixed answer, e.g. one already collected by a modal or `--yes`.
#[derive(Copy, Clone, Debug)]
pub struct Answer(pub bool);

impl Confirm for Answer {
    fn confirm(&self, _prompt: &str) -> bool {
        self.0
    }
}

/// Asks on a line-oriented reader/writer pair; only `y`/`yes` confirms.
pub struct LinePrompt<R, W> {
    input: std::cell::RefCell<R>,
    output: std::cell::RefCell<W>,
}

impl<R: BufRead, W: Write> LinePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input: std::cell::RefCell::new(input),
            output: std::cell::RefCell::new(output),
        }
    }
}

impl<R: BufRead, W: Write> Confirm for LinePrompt<R, W> {
    fn confirm(&self, prompt: &str) -> bool {
        let mut out = self.output.borrow_mut();
        if write!(out, "{prompt} [y/N] ").and_then(|_| out.flush()).is_err() {
            return false;
        }
        let mut line = String::new();
        if self.input.borrow_mut().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

/// A single write against the service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
    Submit(Submission),
    Delete(UserId),
}

impl Mutation {
    /// Whether success should also return the form to create mode.
    pub fn resets_form(&self) -> bool {
        matches!(self, Mutation::Submit(_))
    }

    pub fn describe(&self) -> String {
        match self {
            Mutation::Submit(Submission::Create(u)) => format!("created {}", u.email),
            Mutation::Submit(Submission::Update { id, .. }) => format!("updated user {id}"),
            Mutation::Delete(id) => format!("deleted user {id}"),
        }
    }
}

/// The delete to dispatch for `id`, or `None` if `confirm` declines.
pub fn gate_delete(id: UserId, confirm: &dyn Confirm) -> Option<Mutation> {
    if confirm.confirm(DELETE_PROMPT) {
        Some(Mutation::Delete(id))
    } else {
        tracing::debug!(id, "delete declined");
        None
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RemoveOutcome {
    Deleted,
    /// The confirmation gate said no; nothing was sent.
    Declined,
}

#[derive(Clone)]
pub struct SyncEngine {
    api: Arc<dyn UsersApi>,
}

impl SyncEngine {
    pub fn new(api: Arc<dyn UsersApi>) -> Self {
        Self { api }
    }

    /// Phase one: perform the write. The response body is dropped.
    pub async fn mutate(&self, mutation: &Mutation) -> Result<(), SyncError> {
        let res = match mutation {
            Mutation::Submit(Submission::Create(user)) => self.api.create(user).await.map(|_| ()),
            Mutation::Submit(Submission::Update { id, changes }) => {
                self.api.update(*id, changes).await.map(|_| ())
            }
            Mutation::Delete(id) => self.api.delete(*id).await,
        };
        match &res {
            Ok(()) => tracing::info!(op = %mutation.describe(), "mutation accepted"),
            Err(e) => tracing::warn!(error = %e, ?mutation, "mutation failed"),
        }
        res
    }

    /// Phase two: read the whole collection.
    pub async fn refresh(&self) -> Result<Vec<UserRecord>, SyncError> {
        let res = self.api.list().await;
        match &res {
            Ok(records) => tracing::debug!(count = records.len(), "collection refreshed"),
            Err(e) => tracing::warn!(error = %e, "refresh failed"),
        }
        res
    }

    /// Read one record, bypassing the cached collection.
    pub async fn fetch_one(&self, id: UserId) -> Result<UserRecord, SyncError> {
        self.api.get(id).await
    }

    /// Re-read the collection into `state`. On failure the collection is untouched.
    pub async fn fetch_all(&self, state: &mut DirectoryState) -> Result<Applied, SyncError> {
        let ticket = state.issue_ticket();
        let records = self.refresh().await?;
        Ok(state.apply(Action::Load { ticket, records }))
    }

    /// Send the form as a create or update, then reset and re-read.
    ///
    /// A draft missing a required field fails before any request. A failed
    /// write leaves both form and collection as they were.
    pub async fn submit(&self, state: &mut DirectoryState) -> Result<(), SyncError> {
        let submission = state.form().submission()?;
        self.mutate(&Mutation::Submit(submission)).await?;
        state.apply(Action::Reset);
        self.fetch_all(state).await.map(|_| ())
    }

    /// Delete `id` once `confirm` agrees, then re-read.
    pub async fn remove(
        &self,
        state: &mut DirectoryState,
        id: UserId,
        confirm: &dyn Confirm,
    ) -> Result<RemoveOutcome, SyncError> {
        let Some(mutation) = gate_delete(id, confirm) else {
            return Ok(RemoveOutcome::Declined);
        };
        self.mutate(&mutation).await?;
        self.fetch_all(state).await?;
        Ok(RemoveOutcome::Deleted)
    }
}
