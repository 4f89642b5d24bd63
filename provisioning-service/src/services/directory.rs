//! Directory collaborator: person → role lookup keyed by personal email.
//!
//! The directory is the source of truth for who can be attributed a role.
//! Every provisioning operation re-resolves the identity; nothing is cached.

use crate::config::DirectoryConfig;
use crate::models::Identity;
use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("network error communicating with the directory")]
    Transport(#[source] reqwest::Error),

    #[error("unexpected directory response: status {0}")]
    Api(u16),
}

#[async_trait]
pub trait Directory: Send + Sync {
    /// Resolve a personal email to an identity, or `None` when the
    /// directory does not know the address.
    async fn lookup(&self, email: &str) -> Result<Option<Identity>, DirectoryError>;
}

/// Wire shape of a directory person record. The directory keys records by
/// the email we asked for, so the record itself does not repeat it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DirectoryRecord {
    name: String,
    #[serde(default)]
    team: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    chat_handle: Option<String>,
}

pub struct HttpDirectory {
    http: reqwest::Client,
    base_url: String,
    config: DirectoryConfig,
}

impl HttpDirectory {
    pub fn new(http: reqwest::Client, base_url: String, config: DirectoryConfig) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            config,
        }
    }
}

#[async_trait]
impl Directory for HttpDirectory {
    async fn lookup(&self, email: &str) -> Result<Option<Identity>, DirectoryError> {
        let url = format!("{}/people", self.base_url);

        let response = self
            .http
            .get(&url)
            .query(&[("email", email)])
            .bearer_auth(self.config.api_token.expose_secret())
            .send()
            .await
            .map_err(DirectoryError::Transport)?;

        match response.status() {
            status if status.is_success() => {
                let record: DirectoryRecord =
                    response.json().await.map_err(DirectoryError::Transport)?;
                tracing::debug!(email, name = %record.name, "Directory lookup hit");
                Ok(Some(Identity {
                    name: record.name,
                    email: email.to_string(),
                    team: record.team,
                    role: record.role,
                    chat_handle: record.chat_handle,
                }))
            }
            StatusCode::NOT_FOUND => {
                tracing::debug!(email, "Directory lookup miss");
                Ok(None)
            }
            status => Err(DirectoryError::Api(status.as_u16())),
        }
    }
}

/// In-memory directory used when no directory endpoint is configured, and
/// by tests.
#[derive(Default)]
pub struct MockDirectory {
    people: HashMap<String, Identity>,
    lookup_count: AtomicU64,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_person(mut self, identity: Identity) -> Self {
        self.people.insert(identity.email.to_lowercase(), identity);
        self
    }

    pub fn lookup_count(&self) -> u64 {
        self.lookup_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Directory for MockDirectory {
    async fn lookup(&self, email: &str) -> Result<Option<Identity>, DirectoryError> {
        self.lookup_count.fetch_add(1, Ordering::SeqCst);
        let identity = self.people.get(&email.to_lowercase()).cloned();
        tracing::info!(email, hit = identity.is_some(), "[MOCK] Directory lookup");
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ada() -> Identity {
        Identity {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            team: Some("Design".to_string()),
            role: Some("Design".to_string()),
            chat_handle: None,
        }
    }

    #[tokio::test]
    async fn mock_lookup_is_case_insensitive() {
        let directory = MockDirectory::new().with_person(ada());
        let found = directory.lookup("ADA@Example.COM").await.unwrap();
        assert_eq!(found.unwrap().name, "Ada");
        assert_eq!(directory.lookup_count(), 1);
    }

    #[tokio::test]
    async fn mock_lookup_miss_is_none() {
        let directory = MockDirectory::new().with_person(ada());
        assert!(directory.lookup("nobody@example.com").await.unwrap().is_none());
    }

    #[test]
    fn directory_record_deserializes_without_optionals() {
        let record: DirectoryRecord = serde_json::from_str(r#"{"name": "Ada"}"#).unwrap();
        assert_eq!(record.name, "Ada");
        assert!(record.team.is_none());
        assert!(record.role.is_none());
        assert!(record.chat_handle.is_none());
    }
}
