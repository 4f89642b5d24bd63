pub mod identity;
pub mod member;

pub use identity::Identity;
pub use member::{CollectionGrant, MemberStatus, OrganizationMember};
