pub mod directory;
pub mod policy;
pub mod provisioning;
pub mod retention;
pub mod session;
pub mod vault;

pub use directory::{Directory, DirectoryError, HttpDirectory, MockDirectory};
pub use policy::AccessPolicy;
pub use provisioning::ProvisioningService;
pub use retention::{RetentionJob, RetentionPolicy, RetentionScheduler};
pub use session::SessionCache;
pub use vault::{VaultClient, VaultError};
