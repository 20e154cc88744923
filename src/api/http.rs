//! `reqwest`-backed implementation of [`UsersApi`].
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use super::{NewUser, UserId, UserRecord, UserUpdate, UsersApi};
use crate::error::SyncError;

const USER_AGENT: &str = concat!("userdir-client/", env!("CARGO_PKG_VERSION"));

/// HTTP client for the `/users` resource of the service.
#[derive(Clone, Debug)]
pub struct HttpUsersApi {
    client: Client,
    base_url: String,
    trailing_slash: bool,
}

impl HttpUsersApi {
    /// Build a client rooted at `base_url` (e.g. `http://localhost:8000/api/v1`).
    ///
    /// Every request is bounded by `timeout`; an expired request is reported
    /// as a transport failure.
    pub fn new(base_url: &str, timeout: Duration, trailing_slash: bool) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SyncError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            trailing_slash,
        })
    }

    pub fn collection_url(&self) -> String {
        if self.trailing_slash {
            format!("{}/users/", self.base_url)
        } else {
            format!("{}/users", self.base_url)
        }
    }

    pub fn record_url(&self, id: UserId) -> String {
        format!("{}/users/{id}", self.base_url)
    }
}

#[async_trait]
impl UsersApi for HttpUsersApi {
    async fn list(&self) -> Result<Vec<UserRecord>, SyncError> {
        let url = self.collection_url();
        tracing::debug!(%url, "GET");
        let resp = self.client.get(&url).send().await.map_err(transport)?;
        decode(check(resp).await?).await
    }

    async fn get(&self, id: UserId) -> Result<UserRecord, SyncError> {
        let url = self.record_url(id);
        tracing::debug!(%url, "GET");
        let resp = self.client.get(&url).send().await.map_err(transport)?;
        decode(check(resp).await?).await
    }

    async fn create(&self, user: &NewUser) -> Result<UserRecord, SyncError> {
        let url = self.collection_url();
        tracing::debug!(%url, email = %user.email, "POST");
        let resp = self.client.post(&url).json(user).send().await.map_err(transport)?;
        decode(check(resp).await?).await
    }

    async fn update(&self, id: UserId, changes: &UserUpdate) -> Result<UserRecord, SyncError> {
        let url = self.record_url(id);
        tracing::debug!(%url, "PUT");
        let resp = self.client.put(&url).json(changes).send().await.map_err(transport)?;
        decode(check(resp).await?).await
    }

    async fn delete(&self, id: UserId) -> Result<(), SyncError> {
        let url = self.record_url(id);
        tracing::debug!(%url, "DELETE");
        let resp = self.client.delete(&url).send().await.map_err(transport)?;
        check(resp).await.map(|_| ())
    }
}

fn transport(e: reqwest::Error) -> SyncError {
    let mut msg = if e.is_timeout() { format!("request timed out: {e}") } else { e.to_string() };
    let mut cause = std::error::Error::source(&e);
    while let Some(c) = cause {
        msg.push_str(": ");
        msg.push_str(&c.to_string());
        cause = c.source();
    }
    SyncError::Transport(msg)
}

/// Pass 2xx responses through; turn anything else into `Rejected`.
async fn check(resp: Response) -> Result<Response, SyncError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(SyncError::Rejected {
        status: status.as_u16(),
        detail: parse_detail(&body),
    })
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, SyncError> {
    resp.json::<T>()
        .await
        .map_err(|e| SyncError::Transport(format!("malformed response: {e}")))
}

/// Extract the human-readable part of an error body.
///
/// The service answers `{"detail": "..."}` for domain errors and
/// `{"detail": [{"msg": "...", ...}]}` for validation errors.
pub fn parse_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(items) => {
            let msgs: Vec<&str> = items
                .iter()
                .filter_map(|i| i.get("msg").and_then(|m| m.as_str()))
                .collect();
            if msgs.is_empty() { None } else { Some(msgs.join("; ")) }
        }
        _ => None,
    }
}
