//! Chat-command endpoints.
//!
//! The chat front-end forwards operator commands here and renders the
//! returned `{title, description}` pair. Both endpoints always answer 200
//! with exactly one reply; workflow failures are folded into the reply
//! text. Only a malformed request from the front-end itself is an HTTP
//! error.

use crate::AppState;
use crate::dtos::{CommandRequest, UserFacingResult};
use axum::{Json, extract::State};
use service_core::error::AppError;

pub async fn provision_access(
    State(state): State<AppState>,
    Json(request): Json<CommandRequest>,
) -> Result<Json<UserFacingResult>, AppError> {
    let email = validate_email(&request)?.to_string();
    let provisioner = state.provisioner.clone();

    // Detached so the workflow runs to completion even when the front-end
    // gives up on the reply; the outcome lands in the log either way.
    let workflow = tokio::spawn(async move {
        provisioner
            .provision_access(&email, request.requested_by.as_deref())
            .await
    });

    let result = workflow
        .await
        .map_err(|err| AppError::InternalError(anyhow::Error::new(err)))?;
    Ok(Json(result))
}

pub async fn confirm_access(
    State(state): State<AppState>,
    Json(request): Json<CommandRequest>,
) -> Result<Json<UserFacingResult>, AppError> {
    let email = validate_email(&request)?.to_string();
    let provisioner = state.provisioner.clone();

    let workflow = tokio::spawn(async move {
        provisioner
            .confirm_access(&email, request.requested_by.as_deref())
            .await
    });

    let result = workflow
        .await
        .map_err(|err| AppError::InternalError(anyhow::Error::new(err)))?;
    Ok(Json(result))
}

fn validate_email(request: &CommandRequest) -> Result<&str, AppError> {
    let email = request.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "'{}' is not an email address",
            request.email
        )));
    }
    Ok(email)
}
