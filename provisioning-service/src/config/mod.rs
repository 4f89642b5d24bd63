use crate::services::policy::AccessPolicy;
use anyhow::{Context, Result};
use dotenvy::dotenv;
use secrecy::Secret;
use serde::Deserialize;
use service_core::config as core_config;
use std::env;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub vault: VaultConfig,
    pub directory: DirectoryConfig,
    pub retention: RetentionConfig,
    pub policy: AccessPolicy,
    pub service_name: String,
}

/// Connection settings for the vault administration API.
#[derive(Deserialize, Clone, Debug)]
pub struct VaultConfig {
    /// Base URL of the administration API (`/organizations/...` lives here).
    pub api_base_url: String,
    /// Base URL of the identity service (`/connect/token` lives here).
    pub identity_base_url: String,
    pub organization_id: String,
    pub client_id: String,
    pub client_secret: Secret<String>,
    /// Cached tokens are discarded this many seconds before their declared
    /// expiry. Must be at least 60.
    pub token_expiry_margin_seconds: i64,
}

/// Directory lookup settings. When `base_url` is unset the service falls back
/// to the compiled-in mock directory.
#[derive(Deserialize, Clone, Debug)]
pub struct DirectoryConfig {
    pub base_url: Option<String>,
    pub api_token: Secret<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct RetentionConfig {
    pub enabled: bool,
    /// Rule 1: never-activated accounts older than this are deleted.
    pub never_activated_days: i64,
    /// Rule 2: revoked accounts inactive longer than this are deleted.
    pub disabled_days: i64,
    /// Rule 3: any account inactive longer than this is deleted.
    pub inactive_days: i64,
    /// Pause between consecutive deletions, to stay under the vault API's
    /// rate limits.
    pub delete_pause_ms: u64,
    pub cleanup_interval_hours: u64,
    pub report_interval_hours: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let common = core_config::Config::load()?;

        let vault = VaultConfig {
            api_base_url: get_env("VAULT_API_BASE_URL", Some("https://api.bitwarden.com"), is_prod)?,
            identity_base_url: get_env(
                "VAULT_IDENTITY_BASE_URL",
                Some("https://identity.bitwarden.com"),
                is_prod,
            )?,
            organization_id: get_env("VAULT_ORGANIZATION_ID", None, is_prod)?,
            client_id: get_env("VAULT_CLIENT_ID", None, is_prod)?,
            client_secret: Secret::new(get_env("VAULT_CLIENT_SECRET", None, is_prod)?),
            token_expiry_margin_seconds: env::var("VAULT_TOKEN_EXPIRY_MARGIN_SECONDS")
                .unwrap_or_else(|_| "90".to_string())
                .parse()
                .unwrap_or(90)
                .max(60),
        };

        let directory = DirectoryConfig {
            base_url: env::var("DIRECTORY_BASE_URL").ok(),
            api_token: Secret::new(env::var("DIRECTORY_API_TOKEN").unwrap_or_default()),
        };

        let retention = RetentionConfig {
            enabled: env::var("RETENTION_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            never_activated_days: parse_env_or("RETENTION_NEVER_ACTIVATED_DAYS", 7),
            disabled_days: parse_env_or("RETENTION_DISABLED_DAYS", 30),
            inactive_days: parse_env_or("RETENTION_INACTIVE_DAYS", 90),
            delete_pause_ms: parse_env_or("RETENTION_DELETE_PAUSE_MS", 750),
            cleanup_interval_hours: parse_env_or("RETENTION_CLEANUP_INTERVAL_HOURS", 24),
            report_interval_hours: parse_env_or("RETENTION_REPORT_INTERVAL_HOURS", 168),
        };

        let policy = match env::var("ACCESS_POLICY_PATH") {
            Ok(path) => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read access policy file {}", path))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("Invalid access policy file {}", path))?
            }
            Err(_) if is_prod => {
                anyhow::bail!("ACCESS_POLICY_PATH is required in production but not set")
            }
            Err(_) => AccessPolicy::default(),
        };

        Ok(Self {
            common,
            vault,
            directory,
            retention,
            policy,
            service_name: "provisioning-service".to_string(),
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                anyhow::bail!("{} is required in production but not set", key)
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                anyhow::bail!("{} is required but not set", key)
            }
        }
    }
}

fn parse_env_or<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
