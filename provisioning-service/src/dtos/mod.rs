//! Request and reply shapes for the chat-command endpoints.

use serde::{Deserialize, Serialize};

/// An operator command targeting one person by email.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandRequest {
    pub email: String,
    /// Operator identity, recorded for audit logging only.
    #[serde(default)]
    pub requested_by: Option<String>,
}

/// The single reply every command produces, rendered by the chat front-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFacingResult {
    pub title: String,
    pub description: String,
}

impl UserFacingResult {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}
