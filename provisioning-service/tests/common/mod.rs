#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use provisioning_service::Application;
use provisioning_service::config::{Config, DirectoryConfig, RetentionConfig, VaultConfig};
use provisioning_service::services::policy::{AccessPolicy, CollectionPolicy};
use provisioning_service::services::session::Clock;
use secrecy::Secret;
use std::collections::HashMap;
use std::sync::Mutex;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_ORG_ID: &str = "org-test";
pub const TEST_TOKEN: &str = "test-access-token";

/// A running application wired to mock vault and directory servers.
pub struct TestApp {
    pub address: String,
    pub vault: MockServer,
    pub directory: MockServer,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let vault = MockServer::start().await;
        let directory = MockServer::start().await;
        mount_token_endpoint(&vault, TEST_TOKEN).await;

        let app = Application::build(test_config(&vault, &directory))
            .await
            .expect("Failed to build test application");
        let port = app.port();

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let address = format!("http://127.0.0.1:{}", port);

        // Wait for the HTTP server to come up.
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            vault,
            directory,
        }
    }

    pub async fn provision(&self, email: &str) -> serde_json::Value {
        self.command("provision", email).await
    }

    pub async fn confirm(&self, email: &str) -> serde_json::Value {
        self.command("confirm", email).await
    }

    async fn command(&self, name: &str, email: &str) -> serde_json::Value {
        let response = reqwest::Client::new()
            .post(format!("{}/commands/{}", self.address, name))
            .json(&serde_json::json!({ "email": email, "requested_by": "operator" }))
            .send()
            .await
            .expect("Failed to execute request");
        assert!(
            response.status().is_success(),
            "command endpoint returned {}",
            response.status()
        );
        response.json().await.expect("Failed to parse reply")
    }
}

pub fn test_config(vault: &MockServer, directory: &MockServer) -> Config {
    Config {
        common: service_core::config::Config {
            host: "127.0.0.1".to_string(),
            port: 0, // Random port
            log_level: "info".to_string(),
        },
        vault: vault_config(&vault.uri()),
        directory: DirectoryConfig {
            base_url: Some(directory.uri()),
            api_token: Secret::new("directory-token".to_string()),
        },
        retention: RetentionConfig {
            enabled: false,
            never_activated_days: 7,
            disabled_days: 30,
            inactive_days: 90,
            delete_pause_ms: 0,
            cleanup_interval_hours: 24,
            report_interval_hours: 168,
        },
        policy: test_policy(),
        service_name: "provisioning-service-test".to_string(),
    }
}

/// Vault settings pointing both the admin API and the identity service at
/// the same mock server; the paths do not collide.
pub fn vault_config(base_url: &str) -> VaultConfig {
    VaultConfig {
        api_base_url: base_url.trim_end_matches('/').to_string(),
        identity_base_url: base_url.trim_end_matches('/').to_string(),
        organization_id: TEST_ORG_ID.to_string(),
        client_id: "organization.test-client".to_string(),
        client_secret: Secret::new("test-client-secret".to_string()),
        token_expiry_margin_seconds: 90,
    }
}

pub fn test_policy() -> AccessPolicy {
    let mut roles = HashMap::new();
    roles.insert(
        "Design".to_string(),
        vec![CollectionPolicy {
            id: "c-design".to_string(),
            name: "Design".to_string(),
            read_only: false,
            hide_passwords: false,
            manage: false,
        }],
    );
    AccessPolicy {
        baseline: CollectionPolicy {
            id: "c-all".to_string(),
            name: "All Teams".to_string(),
            read_only: true,
            hide_passwords: false,
            manage: false,
        },
        roles,
        default_role: Vec::new(),
    }
}

pub async fn mount_token_endpoint(vault: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/connect/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": token,
            "expires_in": 3600,
            "token_type": "Bearer"
        })))
        .named("token exchange")
        .mount(vault)
        .await;
}

/// A single-page roster response with the given members.
pub async fn mount_roster(vault: &MockServer, members: Vec<serde_json::Value>) {
    Mock::given(method("GET"))
        .and(path(format!("/organizations/{}/users", TEST_ORG_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(roster_page(members, None)))
        .named("member roster")
        .mount(vault)
        .await;
}

pub fn roster_page(
    members: Vec<serde_json::Value>,
    continuation_token: Option<&str>,
) -> serde_json::Value {
    serde_json::json!({
        "object": "list",
        "data": members,
        "continuationToken": continuation_token
    })
}

pub fn member_json(id: &str, email: &str, status: i32) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "userId": format!("u-{}", id),
        "email": email,
        "status": status,
        "twoFactorEnabled": false,
        "collections": []
    })
}

pub async fn mount_directory_person(directory: &MockServer, email: &str, name: &str, team: &str) {
    Mock::given(method("GET"))
        .and(path("/people"))
        .and(query_param("email", email))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": name,
            "team": team,
            "role": team
        })))
        .named("directory hit")
        .mount(directory)
        .await;
}

pub async fn mount_directory_miss(directory: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/people"))
        .respond_with(ResponseTemplate::new(404))
        .named("directory miss")
        .mount(directory)
        .await;
}

/// Hand-cranked time source for expiry and retention tests.
pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn default_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    pub fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}
