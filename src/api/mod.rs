//! Wire types and the remote service boundary.
//!
//! [`UsersApi`] is the only seam between the client and the user service.
//! [`http::HttpUsersApi`] talks to the real service; tests substitute an
//! in-memory implementation.
pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Server-assigned record identifier.
pub type UserId = i64;

/// A user as returned by the service. The password is never part of a read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Body of a create request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Body of an update request. Has no password field: the password is
/// immutable after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdate {
    pub name: String,
    pub email: String,
}

/// Operations offered by the remote user service.
///
/// Every method is exactly one HTTP round trip. Implementations map any
/// non-2xx status to [`SyncError::Rejected`] and everything else that goes
/// wrong to [`SyncError::Transport`].
#[async_trait]
pub trait UsersApi: Send + Sync {
    /// `GET /users`
    async fn list(&self) -> Result<Vec<UserRecord>, SyncError>;

    /// `GET /users/{id}`
    async fn get(&self, id: UserId) -> Result<UserRecord, SyncError>;

    /// `POST /users`
    async fn create(&self, user: &NewUser) -> Result<UserRecord, SyncError>;

    /// `PUT /users/{id}`
    async fn update(&self, id: UserId, changes: &UserUpdate) -> Result<UserRecord, SyncError>;

    /// `DELETE /users/{id}`
    async fn delete(&self, id: UserId) -> Result<(), SyncError>;
}
