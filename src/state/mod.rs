//! Directory state: the cached collection plus the form's mode and draft.
//!
//! All changes go through [`DirectoryState::apply`] with an [`Action`]. The
//! form is an enum, so a record id exists exactly when the form is in edit
//! mode and an edit draft has no password slot at all.
use std::fmt::{Display, Formatter};

use crate::api::{NewUser, UserId, UserRecord, UserUpdate};
use crate::error::SyncError;

/// Form fields an operator can type into.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Email,
    Password,
}

impl Display for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Field::Name => "name",
            Field::Email => "email",
            Field::Password => "password",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CreateDraft {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EditDraft {
    pub name: String,
    pub email: String,
}

/// Current mode and content of the entry form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FormState {
    Create(CreateDraft),
    Edit { id: UserId, draft: EditDraft },
}

impl Default for FormState {
    fn default() -> Self {
        FormState::Create(CreateDraft::default())
    }
}

impl FormState {
    /// Edit form seeded from `record`.
    pub fn editing(record: &UserRecord) -> Self {
        FormState::Edit {
            id: record.id,
            draft: EditDraft {
                name: record.name.clone(),
                email: record.email.clone(),
            },
        }
    }

    /// Same mode, one field replaced. `Password` is ignored in edit mode.
    pub fn with_field(self, field: Field, value: String) -> Self {
        match self {
            FormState::Create(mut d) => {
                match field {
                    Field::Name => d.name = value,
                    Field::Email => d.email = value,
                    Field::Password => d.password = value,
                }
                FormState::Create(d)
            }
            FormState::Edit { id, mut draft } => {
                match field {
                    Field::Name => draft.name = value,
                    Field::Email => draft.email = value,
                    Field::Password => {}
                }
                FormState::Edit { id, draft }
            }
        }
    }

    pub fn is_editing(&self) -> bool {
        matches!(self, FormState::Edit { .. })
    }

    pub fn editing_id(&self) -> Option<UserId> {
        match self {
            FormState::Edit { id, .. } => Some(*id),
            FormState::Create(_) => None,
        }
    }

    /// Fields the form collects in its current mode, in display order.
    pub fn fields(&self) -> &'static [Field] {
        match self {
            FormState::Create(_) => &[Field::Name, Field::Email, Field::Password],
            FormState::Edit { .. } => &[Field::Name, Field::Email],
        }
    }

    /// Current value of `field`, or `None` if the mode does not collect it.
    pub fn value(&self, field: Field) -> Option<&str> {
        match (self, field) {
            (FormState::Create(d), Field::Name) => Some(&d.name),
            (FormState::Create(d), Field::Email) => Some(&d.email),
            (FormState::Create(d), Field::Password) => Some(&d.password),
            (FormState::Edit { draft, .. }, Field::Name) => Some(&draft.name),
            (FormState::Edit { draft, .. }, Field::Email) => Some(&draft.email),
            (FormState::Edit { .. }, Field::Password) => None,
        }
    }

    /// The request this form would send, after checking required fields.
    pub fn submission(&self) -> Result<Submission, SyncError> {
        for &field in self.fields() {
            if self.value(field).is_some_and(|v| v.trim().is_empty()) {
                return Err(SyncError::IncompleteDraft(field));
            }
        }
        Ok(match self {
            FormState::Create(d) => Submission::Create(NewUser {
                name: d.name.clone(),
                email: d.email.clone(),
                password: d.password.clone(),
            }),
            FormState::Edit { id, draft } => Submission::Update {
                id: *id,
                changes: UserUpdate {
                    name: draft.name.clone(),
                    email: draft.email.clone(),
                },
            },
        })
    }
}

/// A form submission resolved to its wire operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Submission {
    Create(NewUser),
    Update { id: UserId, changes: UserUpdate },
}

/// Tag for a collection read, issued when the read is dispatched.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RefreshTicket(u64);

/// How completed refreshes that overlap are resolved.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum RefreshOrdering {
    /// Drop a result whose ticket is older than one already applied.
    #[default]
    LatestIssued,
    /// Whatever completes last is shown.
    LastCompleted,
}

/// Messages accepted by [`DirectoryState::apply`].
#[derive(Clone, Debug)]
pub enum Action {
    Load { ticket: RefreshTicket, records: Vec<UserRecord> },
    BeginEdit(UserRecord),
    UpdateDraftField { field: Field, value: String },
    Reset,
}

/// Outcome of applying an action.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Applied {
    Changed,
    /// A refresh result was older than the one on screen and was discarded.
    Stale,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DirectoryState {
    users: Vec<UserRecord>,
    form: FormState,
    ordering: RefreshOrdering,
    issued: u64,
    applied: u64,
}

impl DirectoryState {
    pub fn new(ordering: RefreshOrdering) -> Self {
        Self { ordering, ..Self::default() }
    }

    pub fn users(&self) -> &[UserRecord] {
        &self.users
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn ordering(&self) -> RefreshOrdering {
        self.ordering
    }

    /// Reserve the next refresh ticket. Call when dispatching a read.
    pub fn issue_ticket(&mut self) -> RefreshTicket {
        self.issued += 1;
        RefreshTicket(self.issued)
    }

    pub fn apply(&mut self, action: Action) -> Applied {
        match action {
            Action::Load { ticket, records } => {
                if self.ordering == RefreshOrdering::LatestIssued && ticket.0 < self.applied {
                    return Applied::Stale;
                }
                self.applied = self.applied.max(ticket.0);
                self.users = records;
            }
            Action::BeginEdit(record) => {
                self.form = FormState::editing(&record);
            }
            Action::UpdateDraftField { field, value } => {
                self.form = std::mem::take(&mut self.form).with_field(field, value);
            }
            Action::Reset => {
                self.form = FormState::default();
            }
        }
        Applied::Changed
    }

    /// Replace the collection with a fresh read, bypassing ticket ordering.
    pub fn load(&mut self, records: Vec<UserRecord>) {
        let ticket = self.issue_ticket();
        self.apply(Action::Load { ticket, records });
    }

    pub fn begin_edit(&mut self, record: &UserRecord) {
        self.apply(Action::BeginEdit(record.clone()));
    }

    pub fn update_draft_field(&mut self, field: Field, value: impl Into<String>) {
        self.apply(Action::UpdateDraftField { field, value: value.into() });
    }

    pub fn reset(&mut self) {
        self.apply(Action::Reset);
    }
}
