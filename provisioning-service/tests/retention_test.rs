mod common;

use chrono::{DateTime, Duration, Utc};
use common::{ManualClock, mount_roster, mount_token_endpoint, vault_config};
use provisioning_service::services::retention::{RetentionJob, RetentionPolicy};
use provisioning_service::services::session::SessionCache;
use provisioning_service::services::vault::VaultClient;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn job(server: &MockServer, pause: StdDuration, now: DateTime<Utc>) -> RetentionJob {
    let http = reqwest::Client::new();
    let config = vault_config(&server.uri());
    let session = Arc::new(SessionCache::new(http.clone(), config.clone()));
    let vault = Arc::new(VaultClient::new(http, config, session));
    RetentionJob::with_clock(
        vault,
        RetentionPolicy {
            never_activated_days: 7,
            disabled_days: 30,
            inactive_days: 90,
        },
        pause,
        Arc::new(ManualClock::starting_at(now)),
    )
}

/// A roster of three: one who never set a password, one in good standing,
/// one long idle.
fn three_member_roster(now: DateTime<Utc>) -> Vec<serde_json::Value> {
    vec![
        serde_json::json!({
            "id": "m-never",
            "userId": "u-never",
            "email": "never@example.com",
            "status": 2,
            "hasMasterPassword": false,
            "creationDate": (now - Duration::days(10)).to_rfc3339(),
            "lastActiveDate": (now - Duration::days(1)).to_rfc3339()
        }),
        serde_json::json!({
            "id": "m-keep",
            "userId": "u-keep",
            "email": "keep@example.com",
            "status": 2,
            "hasMasterPassword": true,
            "creationDate": (now - Duration::days(400)).to_rfc3339(),
            "lastActiveDate": (now - Duration::days(2)).to_rfc3339()
        }),
        serde_json::json!({
            "id": "m-idle",
            "userId": "u-idle",
            "email": "idle@example.com",
            "status": 2,
            "hasMasterPassword": true,
            "creationDate": (now - Duration::days(400)).to_rfc3339(),
            "lastActiveDate": (now - Duration::days(95)).to_rfc3339()
        }),
    ]
}

fn mount_delete(server: &MockServer, member_id: &str, expected: u64) -> Mock {
    Mock::given(method("POST"))
        .and(path(format!(
            "/organizations/org-test/users/{}/delete",
            member_id
        )))
        .respond_with(ResponseTemplate::new(200))
        .expect(expected)
}

#[tokio::test]
async fn cleanup_deletes_two_of_three_with_pacing() {
    let server = MockServer::start().await;
    let now = ManualClock::default_start();
    mount_token_endpoint(&server, "token").await;
    mount_roster(&server, three_member_roster(now)).await;
    mount_delete(&server, "m-never", 1).mount(&server).await;
    mount_delete(&server, "m-idle", 1).mount(&server).await;
    mount_delete(&server, "m-keep", 0).mount(&server).await;

    let pause = StdDuration::from_millis(600);
    let started = std::time::Instant::now();
    let summary = job(&server, pause, now)
        .run_cleanup()
        .await
        .unwrap()
        .expect("pass should not be skipped");

    assert_eq!(summary.total_users, 3);
    assert_eq!(summary.deleted, 2);
    assert_eq!(summary.retained, 1);
    assert!(summary.errors.is_empty());
    // Two deletions, one pause between them.
    assert!(
        started.elapsed() >= pause,
        "deletions were not paced: {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn failed_deletion_is_recorded_and_the_pass_continues() {
    let server = MockServer::start().await;
    let now = ManualClock::default_start();
    mount_token_endpoint(&server, "token").await;
    mount_roster(&server, three_member_roster(now)).await;

    Mock::given(method("POST"))
        .and(path("/organizations/org-test/users/m-never/delete"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    mount_delete(&server, "m-idle", 1).mount(&server).await;

    let summary = job(&server, StdDuration::from_millis(0), now)
        .run_cleanup()
        .await
        .unwrap()
        .expect("pass should not be skipped");

    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].contains("never@example.com"));
}

#[tokio::test]
async fn overlapping_cleanup_trigger_is_skipped() {
    let server = MockServer::start().await;
    let now = ManualClock::default_start();
    mount_token_endpoint(&server, "token").await;

    Mock::given(method("GET"))
        .and(path("/organizations/org-test/users"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({
                    "object": "list",
                    "data": [],
                    "continuationToken": null
                }))
                .set_delay(StdDuration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let job = Arc::new(job(&server, StdDuration::from_millis(0), now));
    let (first, second) = tokio::join!(job.run_cleanup(), job.run_cleanup());

    let summaries = [first.unwrap(), second.unwrap()];
    let completed = summaries.iter().filter(|s| s.is_some()).count();
    assert_eq!(completed, 1, "exactly one pass should run, the other skips");
}

#[tokio::test]
async fn report_pass_classifies_without_deleting() {
    let server = MockServer::start().await;
    let now = ManualClock::default_start();
    mount_token_endpoint(&server, "token").await;
    mount_roster(&server, three_member_roster(now)).await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/organizations/org-test/users/.+/delete$"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .named("report must not delete")
        .mount(&server)
        .await;

    let report = job(&server, StdDuration::from_millis(0), now)
        .run_report()
        .await
        .unwrap();

    assert_eq!(report.total_users, 3);
    assert_eq!(report.pending_delete, 2);
    assert_eq!(report.never_activated, 1);
    assert_eq!(report.disabled_stale, 0);
    assert_eq!(report.inactive, 1);
}
