use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Actor, CreateAuditLog, Organization, OrganizationQuery, Role, User, UserWrite};

/// Storage seam for users, roles and organizations.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Role names and organization ids of an account, or `None` if it does not exist
    async fn load_actor(&self, user_id: i64) -> Result<Option<Actor>>;

    /// All roles ordered by id
    async fn list_roles(&self) -> Result<Vec<Role>>;

    async fn find_role(&self, role_id: i64) -> Result<Option<Role>>;

    /// Organizations matching the query, ordered by name (case-insensitive), then id
    async fn find_organizations(&self, query: &OrganizationQuery) -> Result<Vec<Organization>>;

    /// Whether another record already uses `email`
    async fn email_taken(&self, email: &str, exclude_id: Option<i64>) -> Result<bool>;

    async fn find_user(&self, user_id: i64) -> Result<Option<User>>;

    /// Insert or update the user row and sync its organization links.
    ///
    /// Only links inside `write.organization_scope` are replaced; links the
    /// writer cannot see are kept.
    async fn save_user(&self, write: UserWrite) -> Result<User>;

    async fn user_roles(&self, user_id: i64) -> Result<Vec<Role>>;

    /// Replace the user's roles with exactly `role_ids`
    async fn sync_roles(&self, user_id: i64, role_ids: &[i64]) -> Result<()>;

    /// Detach a single role by name; no-op when not attached
    async fn remove_role(&self, user_id: i64, role_name: &str) -> Result<()>;

    async fn user_organizations(&self, user_id: i64) -> Result<Vec<Organization>>;

    async fn record_audit(&self, entry: CreateAuditLog) -> Result<()>;
}
