use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::{Organization, OrganizationScope, Role};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(skip_serializing)]
    pub remember_token: Option<String>,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Submitted create/edit form
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UserInput {
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "The name must be between 1 and 100 characters."))]
    pub name: String,

    #[serde(default)]
    #[validate(
        email(message = "The email must be a valid email address."),
        length(max = 120, message = "The email may not be greater than 120 characters.")
    )]
    pub email: String,

    /// Plaintext; hashed before it reaches the directory
    #[serde(default)]
    #[validate(length(min = 8, max = 100, message = "The password must be between 8 and 100 characters."))]
    pub password: Option<String>,

    #[serde(default)]
    #[validate(required(message = "The role field is required."))]
    pub role: Option<i64>,

    #[serde(default)]
    pub organizations: Vec<i64>,
}

impl UserInput {
    /// Trim text fields and drop a blank password so it is treated as "not provided".
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.email = self.email.trim().to_string();
        self.password = self.password.filter(|p| !p.trim().is_empty());
        self.organizations.sort_unstable();
        self.organizations.dedup();
        self
    }
}

/// Row-level write handed to the directory. Role links are not part of it:
/// roles only change through the role guard.
#[derive(Debug, Clone)]
pub struct UserWrite {
    /// `None` inserts a new record
    pub id: Option<i64>,
    pub name: String,
    pub email: String,
    /// `None` keeps the stored hash on update
    pub password_hash: Option<String>,
    /// Desired memberships among the organizations `organization_scope` covers
    pub organization_ids: Vec<i64>,
    /// The writer's visibility. Links outside it are left as they are.
    pub organization_scope: OrganizationScope,
}

/// User with its role and organization links resolved
#[derive(Debug, Clone, Serialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: User,
    pub role: Option<Role>,
    pub organizations: Vec<Organization>,
}
