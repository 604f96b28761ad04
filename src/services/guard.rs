// Role guard: the only path through which a user's role changes
use std::sync::Arc;

use serde_json::json;

use crate::db::Directory;
use crate::error::Result;
use crate::models::{holds_super_admin, Actor, AuditAction, Role, SUPER_ADMIN};
use crate::services::AuditService;

/// What `assign_role` did. Callers do not surface `Refused` as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleAssignment {
    Cleared,
    Assigned(Role),
    /// Super-admin requested by an actor who does not hold it
    Refused,
    /// The role id does not exist
    UnknownRole,
}

#[derive(Clone)]
pub struct RoleGuard {
    directory: Arc<dyn Directory>,
    audit: AuditService,
}

impl RoleGuard {
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        let audit = AuditService::new(directory.clone());
        Self { directory, audit }
    }

    /// Replace the user's role with `role_id`, or clear it when `None`.
    ///
    /// Granting super-admin requires the actor to hold it; otherwise the
    /// user's roles are left untouched and no error is returned.
    pub async fn assign_role(
        &self,
        actor: Option<&Actor>,
        user_id: i64,
        role_id: Option<i64>,
    ) -> Result<RoleAssignment> {
        let actor_id = actor.map(|a| a.id);

        let Some(role_id) = role_id else {
            self.directory.sync_roles(user_id, &[]).await?;
            self.audit.log(actor_id, AuditAction::ClearRole, user_id, None).await;
            return Ok(RoleAssignment::Cleared);
        };

        let Some(role) = self.directory.find_role(role_id).await? else {
            tracing::debug!(user_id, role_id, "Ignoring assignment of unknown role");
            return Ok(RoleAssignment::UnknownRole);
        };

        if role.is_super_admin() && !holds_super_admin(actor) {
            tracing::warn!(
                actor_id = ?actor_id,
                user_id,
                "Refused super-admin assignment by non super-admin actor"
            );
            self.audit
                .log(
                    actor_id,
                    AuditAction::RefuseRole,
                    user_id,
                    Some(json!({ "role": role.name })),
                )
                .await;
            return Ok(RoleAssignment::Refused);
        }

        self.directory.sync_roles(user_id, &[role.id]).await?;
        self.audit
            .log(
                actor_id,
                AuditAction::AssignRole,
                user_id,
                Some(json!({ "role": role.name })),
            )
            .await;

        Ok(RoleAssignment::Assigned(role))
    }

    /// Post-write invariant check: a user saved by an actor without
    /// super-admin must not hold super-admin, however the role got there.
    ///
    /// Returns `true` when the role had to be removed.
    pub async fn enforce_role_ceiling(&self, actor: Option<&Actor>, user_id: i64) -> Result<bool> {
        if holds_super_admin(actor) {
            return Ok(false);
        }

        let roles = self.directory.user_roles(user_id).await?;
        if !roles.iter().any(Role::is_super_admin) {
            return Ok(false);
        }

        self.directory.remove_role(user_id, SUPER_ADMIN).await?;

        let actor_id = actor.map(|a| a.id);
        tracing::warn!(
            actor_id = ?actor_id,
            user_id,
            "Removed super-admin granted outside the role guard"
        );
        self.audit
            .log(actor_id, AuditAction::RevokeSuperAdmin, user_id, None)
            .await;

        Ok(true)
    }

    /// `false` when another record already uses `email`
    pub async fn email_is_unique(&self, email: &str, exclude_id: Option<i64>) -> Result<bool> {
        Ok(!self.directory.email_taken(email, exclude_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDirectory;
    use crate::models::ORGANIZATION_MANAGER;

    struct Fixture {
        directory: Arc<MemoryDirectory>,
        guard: RoleGuard,
        super_admin_role: i64,
        manager_role: i64,
        editor_role: i64,
    }

    fn fixture() -> Fixture {
        let directory = Arc::new(MemoryDirectory::new());
        let super_admin_role = directory.add_role(SUPER_ADMIN);
        let manager_role = directory.add_role(ORGANIZATION_MANAGER);
        let editor_role = directory.add_role("editor");
        let guard = RoleGuard::new(directory.clone());

        Fixture {
            directory,
            guard,
            super_admin_role,
            manager_role,
            editor_role,
        }
    }

    #[tokio::test]
    async fn test_assign_replaces_existing_role() {
        let fx = fixture();
        let target = fx.directory.add_user("T", "t@x.com", &["editor"], &[]);
        let actor = Actor::new(1).with_role(ORGANIZATION_MANAGER);

        let outcome = fx
            .guard
            .assign_role(Some(&actor), target, Some(fx.manager_role))
            .await
            .unwrap();

        assert!(matches!(outcome, RoleAssignment::Assigned(ref r) if r.id == fx.manager_role));
        assert_eq!(fx.directory.role_names(target), vec![ORGANIZATION_MANAGER]);
    }

    #[tokio::test]
    async fn test_assign_none_clears_roles() {
        let fx = fixture();
        let target = fx.directory.add_user("T", "t@x.com", &["editor"], &[]);

        let outcome = fx.guard.assign_role(None, target, None).await.unwrap();

        assert_eq!(outcome, RoleAssignment::Cleared);
        assert!(fx.directory.role_names(target).is_empty());
    }

    #[tokio::test]
    async fn test_super_admin_escalation_is_silently_refused() {
        let fx = fixture();
        let manager = Actor::new(1).with_role(ORGANIZATION_MANAGER);

        for prior in [vec![], vec!["editor"], vec![ORGANIZATION_MANAGER]] {
            let email = format!("t{}@x.com", prior.len());
            let target = fx.directory.add_user("T", &email, &prior, &[]);
            let before = fx.directory.role_names(target);

            for actor in [Some(&manager), None] {
                let outcome = fx
                    .guard
                    .assign_role(actor, target, Some(fx.super_admin_role))
                    .await
                    .unwrap();
                assert_eq!(outcome, RoleAssignment::Refused);
                assert_eq!(fx.directory.role_names(target), before);
            }
        }

        assert!(fx.directory.audit_actions().contains(&"refuse_role"));
    }

    #[tokio::test]
    async fn test_super_admin_may_grant_super_admin() {
        let fx = fixture();
        let target = fx.directory.add_user("T", "t@x.com", &[], &[]);
        let admin = Actor::new(1).with_role(SUPER_ADMIN);

        fx.guard
            .assign_role(Some(&admin), target, Some(fx.super_admin_role))
            .await
            .unwrap();

        assert_eq!(fx.directory.role_names(target), vec![SUPER_ADMIN]);
        assert!(!fx.guard.enforce_role_ceiling(Some(&admin), target).await.unwrap());
        assert_eq!(fx.directory.role_names(target), vec![SUPER_ADMIN]);
    }

    #[tokio::test]
    async fn test_unknown_role_leaves_user_untouched() {
        let fx = fixture();
        let target = fx.directory.add_user("T", "t@x.com", &["editor"], &[]);

        let outcome = fx.guard.assign_role(None, target, Some(9_999)).await.unwrap();

        assert_eq!(outcome, RoleAssignment::UnknownRole);
        assert_eq!(fx.directory.role_names(target), vec!["editor"]);
    }

    #[tokio::test]
    async fn test_ceiling_removes_super_admin_set_outside_guard() {
        let fx = fixture();
        let target = fx.directory.add_user("T", "t@x.com", &["editor"], &[]);
        // relationship write that never went through assign_role
        fx.directory.attach_role(target, fx.super_admin_role);
        let editor = Actor::new(1).with_role("editor");

        let removed = fx.guard.enforce_role_ceiling(Some(&editor), target).await.unwrap();

        assert!(removed);
        assert_eq!(fx.directory.role_names(target), vec!["editor"]);
        assert!(fx.directory.audit_actions().contains(&"revoke_super_admin"));
    }

    #[tokio::test]
    async fn test_ceiling_applies_without_actor() {
        let fx = fixture();
        let target = fx.directory.add_user("T", "t@x.com", &[SUPER_ADMIN], &[]);

        assert!(fx.guard.enforce_role_ceiling(None, target).await.unwrap());
        assert!(fx.directory.role_names(target).is_empty());
    }

    #[tokio::test]
    async fn test_ceiling_is_noop_for_other_roles() {
        let fx = fixture();
        let target = fx.directory.add_user("T", "t@x.com", &[], &[]);
        fx.directory.attach_role(target, fx.editor_role);

        assert!(!fx.guard.enforce_role_ceiling(None, target).await.unwrap());
        assert_eq!(fx.directory.role_names(target), vec!["editor"]);
    }

    #[tokio::test]
    async fn test_email_uniqueness_excludes_self() {
        let fx = fixture();
        let existing = fx.directory.add_user("A", "a@x.com", &[], &[]);

        assert!(!fx.guard.email_is_unique("a@x.com", None).await.unwrap());
        assert!(fx.guard.email_is_unique("a@x.com", Some(existing)).await.unwrap());
        assert!(fx.guard.email_is_unique("b@x.com", None).await.unwrap());
    }
}
