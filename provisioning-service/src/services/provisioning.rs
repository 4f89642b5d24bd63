//! Operator command workflows: provision and confirm membership.
//!
//! Each command is one pass through a small state machine keyed on the
//! member's current standing in the vault, which is always re-fetched before
//! a decision is made. The directory lookup precedes any vault mutation: an
//! email the directory cannot attribute to a role is rejected outright.
//!
//! Every command produces exactly one user-facing reply. Error details are
//! logged in full server-side; the operator only ever sees sanitized text.

use crate::dtos::UserFacingResult;
use crate::models::MemberStatus;
use crate::services::directory::{Directory, DirectoryError};
use crate::services::policy::AccessPolicy;
use crate::services::vault::{VaultClient, VaultError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
enum WorkflowError {
    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

pub struct ProvisioningService {
    directory: Arc<dyn Directory>,
    vault: Arc<VaultClient>,
    policy: AccessPolicy,
}

impl ProvisioningService {
    pub fn new(directory: Arc<dyn Directory>, vault: Arc<VaultClient>, policy: AccessPolicy) -> Self {
        Self {
            directory,
            vault,
            policy,
        }
    }

    /// Drive the invite lifecycle for one email: new invite, reinvite, or
    /// an informational reply when there is nothing to do.
    pub async fn provision_access(
        &self,
        email: &str,
        requested_by: Option<&str>,
    ) -> UserFacingResult {
        tracing::info!(
            email,
            requested_by = requested_by.unwrap_or("-"),
            "Provision command received"
        );
        match self.provision_inner(email).await {
            Ok(result) => result,
            Err(err) => render_failure("provision", email, err),
        }
    }

    async fn provision_inner(&self, email: &str) -> Result<UserFacingResult, WorkflowError> {
        let Some(identity) = self.directory.lookup(email).await? else {
            return Ok(UserFacingResult::new(
                "Not found in directory",
                format!(
                    "{} has no directory entry, so no role can be attributed. \
                     Check the address, or add the person to the directory first.",
                    email
                ),
            ));
        };

        let member = self.vault.find_by_email(email).await?;

        match member {
            None => {
                let role = identity.effective_role().unwrap_or_default();
                let grants = self.policy.resolve_grants(role);
                let names = self.policy.resolve_collection_names(role);

                match self.vault.invite(email, &grants).await {
                    Ok(()) => {
                        tracing::info!(email, role, ?names, "Invitation sent");
                        Ok(UserFacingResult::new(
                            "Invitation sent",
                            format!(
                                "{} has been invited with access to: {}.",
                                email,
                                names.join(", ")
                            ),
                        ))
                    }
                    // Lost a race with a concurrent invite; the member now
                    // exists, which is what the operator wanted.
                    Err(VaultError::AlreadyExists) => Ok(UserFacingResult::new(
                        "Already invited",
                        format!("{} already has a pending invitation.", email),
                    )),
                    Err(err) => Err(err.into()),
                }
            }
            Some(m) if m.can_reinvite() => {
                self.vault.reinvite(&m.id).await?;
                Ok(UserFacingResult::new(
                    "Invitation resent",
                    format!("{} was already invited; the invitation has been resent.", email),
                ))
            }
            Some(m) if m.is_confirmed() => Ok(UserFacingResult::new(
                "Already confirmed",
                format!("{} is already a confirmed member. Nothing to do.", email),
            )),
            Some(_) => Ok(UserFacingResult::new(
                "Membership revoked",
                format!(
                    "{}'s membership was revoked by an admin. \
                     Restoring access needs an admin decision, not a new invite.",
                    email
                ),
            )),
        }
    }

    /// Confirm an accepted member, or explain why confirmation cannot
    /// happen yet. Confirmed members short-circuit with zero vault
    /// mutations.
    pub async fn confirm_access(&self, email: &str, requested_by: Option<&str>) -> UserFacingResult {
        tracing::info!(
            email,
            requested_by = requested_by.unwrap_or("-"),
            "Confirm command received"
        );
        match self.confirm_inner(email).await {
            Ok(result) => result,
            Err(err) => render_failure("confirm", email, err),
        }
    }

    async fn confirm_inner(&self, email: &str) -> Result<UserFacingResult, WorkflowError> {
        let Some(member) = self.vault.find_by_email(email).await? else {
            return Ok(UserFacingResult::new(
                "Not a member",
                format!("{} has no membership in the vault organization.", email),
            ));
        };

        if member.is_confirmed() {
            return Ok(UserFacingResult::new(
                "Already confirmed",
                format!("{} is already confirmed. Nothing to do.", email),
            ));
        }

        if member.status == MemberStatus::Revoked {
            return Ok(UserFacingResult::new(
                "Membership revoked",
                format!("{}'s membership was revoked; it cannot be confirmed.", email),
            ));
        }

        let Some(user_id) = member.user_id.as_deref() else {
            return Ok(UserFacingResult::new(
                "Not ready to confirm",
                format!("{} has not accepted the invitation yet.", email),
            ));
        };

        match self.vault.confirm(&member.id, user_id).await {
            Ok(()) => Ok(UserFacingResult::new(
                "Membership confirmed",
                format!("{} is now a confirmed member of the organization.", email),
            )),
            Err(VaultError::PreconditionNotMet(_)) => Ok(UserFacingResult::new(
                "Not ready to confirm",
                format!(
                    "{} has not finished setting up their account. \
                     Ask them to log in to the vault once, then confirm again.",
                    email
                ),
            )),
            Err(err) => Err(err.into()),
        }
    }
}

/// Map an error category to the one reply the operator sees. Raw statuses
/// and response bodies stay in the server-side log.
fn render_failure(operation: &str, email: &str, err: WorkflowError) -> UserFacingResult {
    tracing::error!(operation, email, error = ?err, "Command failed");

    match err {
        WorkflowError::Vault(VaultError::Authentication) => UserFacingResult::new(
            "Vault authentication failed",
            "The service could not authenticate to the vault. \
             This usually resolves itself; if it persists, contact an admin.",
        ),
        WorkflowError::Vault(VaultError::AlreadyExists) => UserFacingResult::new(
            "Already invited",
            format!("{} is already in a conflicting membership state.", email),
        ),
        WorkflowError::Vault(VaultError::PreconditionNotMet(_)) => UserFacingResult::new(
            "Not ready to confirm",
            format!("{} has not finished setting up their account yet.", email),
        ),
        WorkflowError::Vault(VaultError::Api { status, .. }) => UserFacingResult::new(
            "Vault error",
            format!(
                "The vault API rejected the request (status {}). \
                 Try again in a moment or contact support.",
                status
            ),
        ),
        WorkflowError::Vault(VaultError::Transport(_)) => UserFacingResult::new(
            "Vault unreachable",
            "The vault did not respond. Try again in a moment.",
        ),
        WorkflowError::Directory(DirectoryError::Transport(_)) => UserFacingResult::new(
            "Directory unreachable",
            "The directory did not respond. Try again in a moment.",
        ),
        WorkflowError::Directory(DirectoryError::Api(_)) => UserFacingResult::new(
            "Directory error",
            "The directory rejected the lookup. Try again or contact support.",
        ),
    }
}
