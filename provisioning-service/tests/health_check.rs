mod common;

use common::TestApp;
use reqwest::Client;

#[tokio::test]
async fn health_check_works() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let response = client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "provisioning-service");
}

#[tokio::test]
async fn readiness_check_works() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let response = client
        .get(format!("{}/ready", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
}

#[tokio::test]
async fn malformed_email_is_rejected_before_any_lookup() {
    let app = TestApp::spawn().await;

    let response = reqwest::Client::new()
        .post(format!("{}/commands/provision", app.address))
        .json(&serde_json::json!({ "email": "not-an-address" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 400);
}
