//! Membership records as the vault administration API reports them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle stage of a person's organizational membership.
///
/// The administration API encodes this as an integer: invited members have
/// not touched their invitation yet, accepted members have registered but
/// are awaiting confirmation, confirmed members hold working access.
/// Revocation is an explicit admin action, never an automated transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum MemberStatus {
    Revoked,
    Invited,
    Accepted,
    Confirmed,
}

impl From<i32> for MemberStatus {
    fn from(code: i32) -> Self {
        match code {
            0 => MemberStatus::Invited,
            1 => MemberStatus::Accepted,
            2 => MemberStatus::Confirmed,
            _ => MemberStatus::Revoked,
        }
    }
}

impl From<MemberStatus> for i32 {
    fn from(status: MemberStatus) -> i32 {
        match status {
            MemberStatus::Revoked => -1,
            MemberStatus::Invited => 0,
            MemberStatus::Accepted => 1,
            MemberStatus::Confirmed => 2,
        }
    }
}

/// Access to a single resource collection within the organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionGrant {
    pub id: String,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub hide_passwords: bool,
    #[serde(default)]
    pub manage: bool,
}

/// A person's standing in the vault organization.
///
/// Never mutated locally; always re-fetched from the administration API
/// before a decision is made. The activity fields feed the retention policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationMember {
    /// Organization-member id, the handle for reinvite/confirm/delete.
    pub id: String,
    /// The person's vault user id; absent until the invitation is accepted.
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub status: MemberStatus,
    #[serde(default)]
    pub two_factor_enabled: bool,
    #[serde(default)]
    pub collections: Vec<CollectionGrant>,
    #[serde(default)]
    pub creation_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_active_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub has_master_password: Option<bool>,
}

impl OrganizationMember {
    pub fn is_confirmed(&self) -> bool {
        self.status == MemberStatus::Confirmed
    }

    /// Resending an invite is the designed path for invited and accepted
    /// members; confirmed and revoked members are out of its reach.
    pub fn can_reinvite(&self) -> bool {
        matches!(self.status, MemberStatus::Invited | MemberStatus::Accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_round_trip() {
        for (code, status) in [
            (-1, MemberStatus::Revoked),
            (0, MemberStatus::Invited),
            (1, MemberStatus::Accepted),
            (2, MemberStatus::Confirmed),
        ] {
            assert_eq!(MemberStatus::from(code), status);
            assert_eq!(i32::from(status), code);
        }
    }

    #[test]
    fn member_deserialize_from_list_payload() {
        let json = r#"{
            "id": "om-1",
            "userId": "u-1",
            "email": "ada@example.com",
            "name": "Ada",
            "status": 1,
            "twoFactorEnabled": true,
            "collections": [{"id": "c-1", "readOnly": true}]
        }"#;
        let member: OrganizationMember = serde_json::from_str(json).unwrap();
        assert_eq!(member.status, MemberStatus::Accepted);
        assert!(member.two_factor_enabled);
        assert_eq!(member.collections.len(), 1);
        assert!(member.collections[0].read_only);
        assert!(!member.collections[0].manage);
        assert!(member.can_reinvite());
    }

    #[test]
    fn member_deserialize_minimal_invite() {
        let json = r#"{"id": "om-2", "email": "new@example.com", "status": 0}"#;
        let member: OrganizationMember = serde_json::from_str(json).unwrap();
        assert_eq!(member.status, MemberStatus::Invited);
        assert!(member.user_id.is_none());
        assert!(member.collections.is_empty());
        assert!(!member.is_confirmed());
    }
}
