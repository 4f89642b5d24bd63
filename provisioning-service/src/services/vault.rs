//! Vault administration API client for organization membership.
//!
//! Wraps the invite, lookup, reinvite, confirm, list, and delete endpoints.
//! Every call authenticates through the [`SessionCache`]; a 401 invalidates
//! the cached credential and the request is retried exactly once with a
//! fresh one.

use crate::config::VaultConfig;
use crate::models::{CollectionGrant, OrganizationMember};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

use super::session::SessionCache;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("vault authentication failed")]
    Authentication,

    #[error("member already exists or is already invited")]
    AlreadyExists,

    #[error("precondition not met: {0}")]
    PreconditionNotMet(String),

    #[error("vault API error: status {status}")]
    Api { status: u16, message: String },

    #[error("network error communicating with the vault")]
    Transport(#[source] reqwest::Error),
}

/// Regular member, no organization-admin rights.
const MEMBER_TYPE_USER: i32 = 2;

fn invite_body(email: &str, grants: &[CollectionGrant]) -> serde_json::Value {
    serde_json::json!({
        "emails": [email],
        "type": MEMBER_TYPE_USER,
        "collections": grants,
        "groups": [],
        "accessSecretsManager": false,
    })
}

#[derive(Debug, Deserialize)]
struct MemberListPage {
    #[serde(default)]
    data: Vec<OrganizationMember>,
    #[serde(default, rename = "continuationToken")]
    continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublicKeyResponse {
    #[serde(default)]
    public_key: Option<String>,
}

#[derive(Clone)]
pub struct VaultClient {
    http: reqwest::Client,
    config: VaultConfig,
    session: Arc<SessionCache>,
}

impl VaultClient {
    pub fn new(http: reqwest::Client, config: VaultConfig, session: Arc<SessionCache>) -> Self {
        Self {
            http,
            config,
            session,
        }
    }

    fn org_url(&self, suffix: &str) -> String {
        format!(
            "{}/organizations/{}{}",
            self.config.api_base_url, self.config.organization_id, suffix
        )
    }

    /// Send an authenticated request; on 401 invalidate the session and
    /// retry once with a fresh credential. A second 401 is returned to the
    /// caller, never retried again.
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response, VaultError> {
        let mut retried = false;
        loop {
            let token = self.session.token().await?;
            let mut request = self.http.request(method.clone(), url).bearer_auth(token);
            if let Some(body) = body {
                request = request.json(body);
            }
            let response = request.send().await.map_err(VaultError::Transport)?;

            if response.status() == StatusCode::UNAUTHORIZED && !retried {
                tracing::warn!(url, "Vault rejected credential, retrying with a fresh one");
                self.session.invalidate().await;
                retried = true;
                continue;
            }
            return Ok(response);
        }
    }

    /// Invite a person into the organization with the given grants.
    pub async fn invite(&self, email: &str, grants: &[CollectionGrant]) -> Result<(), VaultError> {
        let body = invite_body(email, grants);
        let url = self.org_url("/users/invite");
        let response = self.send(Method::POST, &url, Some(&body)).await?;

        if response.status().is_success() {
            tracing::info!(email, collections = grants.len(), "Invitation issued");
            return Ok(());
        }
        Err(Self::map_error(response).await)
    }

    /// Locate a member by email, case-insensitively. Absence is not an
    /// error.
    pub async fn find_by_email(
        &self,
        email: &str,
    ) -> Result<Option<OrganizationMember>, VaultError> {
        let members = self.list_members().await?;
        Ok(members
            .into_iter()
            .find(|m| m.email.eq_ignore_ascii_case(email)))
    }

    /// Resend an invitation. The designed path for invited and accepted
    /// members who need the email again.
    pub async fn reinvite(&self, member_id: &str) -> Result<(), VaultError> {
        let url = self.org_url(&format!("/users/{}/reinvite", member_id));
        let response = self.send(Method::POST, &url, None).await?;

        if response.status().is_success() {
            tracing::info!(member_id, "Invitation resent");
            return Ok(());
        }
        Err(Self::map_error(response).await)
    }

    /// The member's public key, or `None` while they have not generated key
    /// material yet. Confirmation is impossible until this returns a key.
    pub async fn public_key(&self, user_id: &str) -> Result<Option<String>, VaultError> {
        let url = format!("{}/users/{}/public-key", self.config.api_base_url, user_id);
        let response = self.send(Method::GET, &url, None).await?;

        match response.status() {
            status if status.is_success() => {
                let key: PublicKeyResponse = response.json().await.map_err(VaultError::Transport)?;
                Ok(key.public_key)
            }
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(Self::map_error(response).await),
        }
    }

    /// Confirm an accepted member. Probes for the member's public key first;
    /// a missing key is a precondition failure and no confirm call is made.
    pub async fn confirm(&self, member_id: &str, user_id: &str) -> Result<(), VaultError> {
        let Some(_key) = self.public_key(user_id).await? else {
            return Err(VaultError::PreconditionNotMet(
                "member has not generated key material yet".to_string(),
            ));
        };

        let body = serde_json::json!({ "key": user_id });
        let url = self.org_url(&format!("/users/{}/confirm", member_id));
        let response = self.send(Method::POST, &url, Some(&body)).await?;

        if response.status().is_success() {
            tracing::info!(member_id, "Membership confirmed");
            return Ok(());
        }
        Err(Self::map_error(response).await)
    }

    /// The full member roster, draining paginated responses.
    pub async fn list_members(&self) -> Result<Vec<OrganizationMember>, VaultError> {
        let base = self.org_url("/users?includeCollections=true");
        let mut members = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let url = match &continuation {
                Some(token) => format!("{}&continuationToken={}", base, token),
                None => base.clone(),
            };
            let response = self.send(Method::GET, &url, None).await?;
            if !response.status().is_success() {
                return Err(Self::map_error(response).await);
            }

            let page: MemberListPage = response.json().await.map_err(VaultError::Transport)?;
            members.extend(page.data);

            match page.continuation_token {
                Some(token) if !token.is_empty() => continuation = Some(token),
                _ => break,
            }
        }

        tracing::debug!(count = members.len(), "Fetched member roster");
        Ok(members)
    }

    /// Remove a member. `Ok(false)` when the vault no longer knows the id.
    pub async fn delete(&self, member_id: &str) -> Result<bool, VaultError> {
        let url = self.org_url(&format!("/users/{}/delete", member_id));
        let response = self.send(Method::POST, &url, None).await?;

        match response.status() {
            status if status.is_success() => {
                tracing::info!(member_id, "Member deleted");
                Ok(true)
            }
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(Self::map_error(response).await),
        }
    }

    async fn map_error(response: reqwest::Response) -> VaultError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        match status.as_u16() {
            401 => VaultError::Authentication,
            409 => VaultError::AlreadyExists,
            400 if is_already_exists(&body) => VaultError::AlreadyExists,
            code => {
                tracing::error!(status = code, body = %body, "Vault API request failed");
                VaultError::Api {
                    status: code,
                    message: body,
                }
            }
        }
    }
}

/// The vault reports invite conflicts as a 400 with a message rather than a
/// structured code. The phrasing varies ("has already been invited", "user
/// already exists"), so match loosely.
fn is_already_exists(body: &str) -> bool {
    let body = body.to_lowercase();
    body.contains("already") && (body.contains("invited") || body.contains("exists"))
}
