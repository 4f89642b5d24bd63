//! Identities as the directory collaborator reports them.

use serde::{Deserialize, Serialize};

/// A person resolved from the directory by personal email.
///
/// Re-resolved on every operation; never cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub chat_handle: Option<String>,
}

impl Identity {
    /// The role string used for grant resolution. Directories that only
    /// track a team use it as the role.
    pub fn effective_role(&self) -> Option<&str> {
        self.role.as_deref().or(self.team.as_deref())
    }
}
