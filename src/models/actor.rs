use std::collections::BTreeSet;

use super::role::{ORGANIZATION_MANAGER, SUPER_ADMIN};

/// Snapshot of the authenticated account performing a request.
///
/// Loaded once per request and passed explicitly to the resolver and the
/// guard so that every decision in one submission sees the same privileges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Actor {
    pub id: i64,
    pub roles: BTreeSet<String>,
    pub organization_ids: BTreeSet<i64>,
}

impl Actor {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn with_role(mut self, role: &str) -> Self {
        self.roles.insert(role.to_string());
        self
    }

    pub fn with_organizations(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.organization_ids.extend(ids);
        self
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.roles.contains(name)
    }

    pub fn is_super_admin(&self) -> bool {
        self.has_role(SUPER_ADMIN)
    }

    pub fn is_organization_manager(&self) -> bool {
        self.has_role(ORGANIZATION_MANAGER)
    }
}

/// An absent actor never holds super-admin.
pub fn holds_super_admin(actor: Option<&Actor>) -> bool {
    actor.is_some_and(Actor::is_super_admin)
}
