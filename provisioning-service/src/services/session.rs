//! Short-lived credential cache for the vault administration API.
//!
//! Performs the OAuth client-credentials exchange against the vault's
//! identity service and caches the bearer token until shortly before its
//! declared expiry. Callers that see a 401 downstream invalidate the cache
//! and fetch a fresh token.

use crate::config::VaultConfig;
use chrono::{DateTime, Duration, Utc};
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::vault::VaultError;

/// Injected time source so expiry behavior is testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Process-wide session state for the administration API.
///
/// The check-then-refresh sequence runs under the mutex, so concurrent
/// callers either reuse the cached token or wait for the refresh in flight.
pub struct SessionCache {
    http: reqwest::Client,
    config: VaultConfig,
    clock: Arc<dyn Clock>,
    cached: Mutex<Option<CachedToken>>,
}

impl SessionCache {
    pub fn new(http: reqwest::Client, config: VaultConfig) -> Self {
        Self::with_clock(http, config, Arc::new(SystemClock))
    }

    pub fn with_clock(http: reqwest::Client, config: VaultConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            http,
            config,
            clock,
            cached: Mutex::new(None),
        }
    }

    /// The current bearer token, refreshed when missing or past its margin.
    pub async fn token(&self) -> Result<String, VaultError> {
        let mut cached = self.cached.lock().await;
        let now = self.clock.now();

        if let Some(token) = cached.as_ref() {
            if now < token.expires_at {
                return Ok(token.access_token.clone());
            }
            tracing::debug!("Cached vault credential expired, refreshing");
        }

        let fresh = self.authenticate(now).await?;
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access_token)
    }

    /// Drop the cached credential. Called when a downstream request is
    /// rejected with 401 despite a token the cache considered valid.
    pub async fn invalidate(&self) {
        let mut cached = self.cached.lock().await;
        if cached.take().is_some() {
            tracing::info!("Vault credential invalidated");
        }
    }

    async fn authenticate(&self, now: DateTime<Utc>) -> Result<CachedToken, VaultError> {
        let url = format!("{}/connect/token", self.config.identity_base_url);
        let params = [
            ("grant_type", "client_credentials"),
            ("scope", "api.organization"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.expose_secret()),
        ];

        let response = self
            .http
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(VaultError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Vault token exchange failed");
            return Err(VaultError::Authentication);
        }

        let token: TokenResponse = response.json().await.map_err(VaultError::Transport)?;
        let usable_for = (token.expires_in - self.config.token_expiry_margin_seconds).max(0);

        tracing::info!(
            expires_in = token.expires_in,
            usable_for,
            "Vault credential refreshed"
        );

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: now + Duration::seconds(usable_for),
        })
    }
}
