use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Role name carrying the highest privilege. Only holders may grant it.
pub const SUPER_ADMIN: &str = "super-admin";

/// Role whose holders are scoped to the organizations they belong to.
pub const ORGANIZATION_MANAGER: &str = "organization-manager";

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Role {
    pub id: i64,
    pub name: String,
}

impl Role {
    pub fn is_super_admin(&self) -> bool {
        self.name == SUPER_ADMIN
    }
}
