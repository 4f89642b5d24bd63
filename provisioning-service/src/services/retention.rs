//! Scheduled decommissioning of stale and abandoned accounts.
//!
//! A cleanup pass lists the full roster, classifies each member against the
//! retention rules, and deletes the matches, pacing deletions to stay under
//! the vault API's rate limits. One failed deletion never aborts the pass.
//! Passes never overlap: a trigger that arrives while a pass is running is
//! skipped.

use crate::config::RetentionConfig;
use crate::models::{MemberStatus, OrganizationMember};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::session::{Clock, SystemClock};
use super::vault::{VaultClient, VaultError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionReason {
    NeverActivated,
    DisabledStale,
    Inactive,
}

impl RetentionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetentionReason::NeverActivated => "never activated",
            RetentionReason::DisabledStale => "disabled and stale",
            RetentionReason::Inactive => "inactive",
        }
    }
}

/// Classification of one member within a single pass. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionVerdict {
    Delete(RetentionReason),
    Retain,
}

/// The retention thresholds. Policy, not law: all three come from
/// configuration.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    pub never_activated_days: i64,
    pub disabled_days: i64,
    pub inactive_days: i64,
}

impl RetentionPolicy {
    pub fn from_config(config: &RetentionConfig) -> Self {
        Self {
            never_activated_days: config.never_activated_days,
            disabled_days: config.disabled_days,
            inactive_days: config.inactive_days,
        }
    }

    /// First matching rule wins:
    /// 1. never activated and older than `never_activated_days`;
    /// 2. revoked and inactive longer than `disabled_days`;
    /// 3. inactive longer than `inactive_days`, enabled or not.
    ///
    /// A member without a recorded last-active date is as stale as it is
    /// old: creation date stands in.
    pub fn classify(&self, member: &OrganizationMember, now: DateTime<Utc>) -> RetentionVerdict {
        let last_active = member.last_active_date.or(member.creation_date);

        if member.has_master_password == Some(false) {
            if let Some(created) = member.creation_date {
                if now - created > Duration::days(self.never_activated_days) {
                    return RetentionVerdict::Delete(RetentionReason::NeverActivated);
                }
            }
        }

        if member.status == MemberStatus::Revoked {
            if let Some(active) = last_active {
                if now - active > Duration::days(self.disabled_days) {
                    return RetentionVerdict::Delete(RetentionReason::DisabledStale);
                }
            }
        }

        if let Some(active) = last_active {
            if now - active > Duration::days(self.inactive_days) {
                return RetentionVerdict::Delete(RetentionReason::Inactive);
            }
        }

        RetentionVerdict::Retain
    }
}

/// Outcome of one cleanup pass.
#[derive(Debug, Default, Serialize)]
pub struct RetentionSummary {
    pub total_users: usize,
    pub deleted: usize,
    pub retained: usize,
    pub errors: Vec<String>,
}

/// Would-delete counts from a report pass. Nothing is mutated.
#[derive(Debug, Default, Serialize)]
pub struct RetentionReport {
    pub total_users: usize,
    pub pending_delete: usize,
    pub never_activated: usize,
    pub disabled_stale: usize,
    pub inactive: usize,
}

pub struct RetentionJob {
    vault: Arc<VaultClient>,
    policy: RetentionPolicy,
    clock: Arc<dyn Clock>,
    delete_pause: std::time::Duration,
    pass_guard: Mutex<()>,
}

impl RetentionJob {
    pub fn new(
        vault: Arc<VaultClient>,
        policy: RetentionPolicy,
        delete_pause: std::time::Duration,
    ) -> Self {
        Self::with_clock(vault, policy, delete_pause, Arc::new(SystemClock))
    }

    pub fn with_clock(
        vault: Arc<VaultClient>,
        policy: RetentionPolicy,
        delete_pause: std::time::Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            vault,
            policy,
            clock,
            delete_pause,
            pass_guard: Mutex::new(()),
        }
    }

    /// One sequential cleanup pass. `Ok(None)` when a pass was already
    /// running and this trigger was skipped.
    pub async fn run_cleanup(&self) -> Result<Option<RetentionSummary>, VaultError> {
        let Ok(_guard) = self.pass_guard.try_lock() else {
            tracing::warn!("Cleanup pass already running, skipping this trigger");
            return Ok(None);
        };

        let members = self.vault.list_members().await?;
        let now = self.clock.now();

        let mut summary = RetentionSummary {
            total_users: members.len(),
            ..Default::default()
        };
        let mut first_delete = true;

        for member in &members {
            match self.policy.classify(member, now) {
                RetentionVerdict::Retain => summary.retained += 1,
                RetentionVerdict::Delete(reason) => {
                    if !first_delete {
                        tokio::time::sleep(self.delete_pause).await;
                    }
                    first_delete = false;

                    match self.vault.delete(&member.id).await {
                        Ok(_) => {
                            summary.deleted += 1;
                            tracing::info!(
                                member_id = %member.id,
                                email = %member.email,
                                reason = reason.as_str(),
                                "Deleted stale member"
                            );
                        }
                        Err(err) => {
                            tracing::error!(
                                member_id = %member.id,
                                email = %member.email,
                                error = %err,
                                "Failed to delete member, continuing"
                            );
                            summary.errors.push(format!("{}: {}", member.email, err));
                        }
                    }
                }
            }
        }

        tracing::info!(
            total_users = summary.total_users,
            deleted = summary.deleted,
            retained = summary.retained,
            errors = summary.errors.len(),
            "Cleanup pass finished"
        );
        Ok(Some(summary))
    }

    /// Classification-only pass; logs what the next cleanup would remove.
    pub async fn run_report(&self) -> Result<RetentionReport, VaultError> {
        let members = self.vault.list_members().await?;
        let now = self.clock.now();

        let mut report = RetentionReport {
            total_users: members.len(),
            ..Default::default()
        };

        for member in &members {
            if let RetentionVerdict::Delete(reason) = self.policy.classify(member, now) {
                report.pending_delete += 1;
                match reason {
                    RetentionReason::NeverActivated => report.never_activated += 1,
                    RetentionReason::DisabledStale => report.disabled_stale += 1,
                    RetentionReason::Inactive => report.inactive += 1,
                }
            }
        }

        tracing::info!(
            total_users = report.total_users,
            pending_delete = report.pending_delete,
            never_activated = report.never_activated,
            disabled_stale = report.disabled_stale,
            inactive = report.inactive,
            "Retention report"
        );
        Ok(report)
    }
}

/// Drives the job on its two cadences: frequent cleanup, infrequent report.
pub struct RetentionScheduler {
    job: Arc<RetentionJob>,
    cleanup_interval: std::time::Duration,
    report_interval: std::time::Duration,
    shutdown: CancellationToken,
}

impl RetentionScheduler {
    pub fn new(job: Arc<RetentionJob>, config: &RetentionConfig, shutdown: CancellationToken) -> Self {
        Self {
            job,
            cleanup_interval: std::time::Duration::from_secs(config.cleanup_interval_hours * 3600),
            report_interval: std::time::Duration::from_secs(config.report_interval_hours * 3600),
            shutdown,
        }
    }

    pub async fn run(self) {
        let mut cleanup = tokio::time::interval(self.cleanup_interval);
        cleanup.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut report = tokio::time::interval(self.report_interval);
        report.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Both intervals fire immediately; consume those so the first real
        // run happens one full interval after startup.
        cleanup.tick().await;
        report.tick().await;

        tracing::info!(
            cleanup_interval_secs = self.cleanup_interval.as_secs(),
            report_interval_secs = self.report_interval.as_secs(),
            "Retention scheduler started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Retention scheduler shutting down");
                    break;
                }
                _ = cleanup.tick() => {
                    if let Err(err) = self.job.run_cleanup().await {
                        tracing::error!(error = %err, "Cleanup pass failed");
                    }
                }
                _ = report.tick() => {
                    if let Err(err) = self.job.run_report().await {
                        tracing::error!(error = %err, "Report pass failed");
                    }
                }
            }
        }
    }
}
