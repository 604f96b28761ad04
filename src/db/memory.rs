use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use super::Directory;
use crate::error::{AppError, Result};
use crate::models::{
    Actor, CreateAuditLog, Organization, OrganizationQuery, Role, User, UserWrite,
};

/// In-process directory used by tests and local tooling.
///
/// Mirrors the Postgres semantics: roles ordered by id, organizations
/// ordered by name, unique emails, scoped sync for organization links.
#[derive(Default)]
pub struct MemoryDirectory {
    state: RwLock<State>,
}

#[derive(Default)]
struct State {
    next_id: i64,
    users: BTreeMap<i64, User>,
    roles: BTreeMap<i64, Role>,
    organizations: BTreeMap<i64, Organization>,
    user_roles: BTreeMap<i64, BTreeSet<i64>>,
    user_organizations: BTreeMap<i64, BTreeSet<i64>>,
    audit: Vec<CreateAuditLog>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn insert_organization(&mut self, id: i64, name: &str) {
        self.organizations.insert(
            id,
            Organization {
                id,
                name: name.to_string(),
            },
        );
    }
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_role(&self, name: &str) -> i64 {
        let mut state = self.write();
        let id = state.next_id();
        state.roles.insert(
            id,
            Role {
                id,
                name: name.to_string(),
            },
        );
        id
    }

    pub fn add_organization(&self, name: &str) -> i64 {
        let mut state = self.write();
        let id = state.next_id();
        state.insert_organization(id, name);
        id
    }

    /// Insert an organization under a caller-chosen id
    pub fn add_organization_with_id(&self, id: i64, name: &str) {
        let mut state = self.write();
        state.next_id = state.next_id.max(id);
        state.insert_organization(id, name);
    }

    /// Insert an account with the given role names and organization ids.
    /// Unknown role names are ignored.
    pub fn add_user(&self, name: &str, email: &str, roles: &[&str], organizations: &[i64]) -> i64 {
        let mut state = self.write();
        let id = state.next_id();
        let now = Utc::now();

        state.users.insert(
            id,
            User {
                id,
                name: name.to_string(),
                email: email.to_string(),
                password: String::new(),
                remember_token: None,
                email_verified_at: None,
                created_at: now,
                updated_at: now,
            },
        );

        let role_ids: BTreeSet<i64> = state
            .roles
            .values()
            .filter(|r| roles.contains(&r.name.as_str()))
            .map(|r| r.id)
            .collect();
        state.user_roles.insert(id, role_ids);
        state
            .user_organizations
            .insert(id, organizations.iter().copied().collect());

        id
    }

    /// Attach a role directly, bypassing the guard (e.g. a relationship write)
    pub fn attach_role(&self, user_id: i64, role_id: i64) {
        self.write()
            .user_roles
            .entry(user_id)
            .or_default()
            .insert(role_id);
    }

    pub fn role_names(&self, user_id: i64) -> Vec<String> {
        let state = self.read();
        role_names_of(&state, user_id)
    }

    pub fn audit_actions(&self) -> Vec<&'static str> {
        self.read().audit.iter().map(|a| a.action.as_str()).collect()
    }
}

fn role_names_of(state: &State, user_id: i64) -> Vec<String> {
    state
        .user_roles
        .get(&user_id)
        .into_iter()
        .flatten()
        .filter_map(|id| state.roles.get(id))
        .map(|r| r.name.clone())
        .collect()
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn load_actor(&self, user_id: i64) -> Result<Option<Actor>> {
        let state = self.read();
        if !state.users.contains_key(&user_id) {
            return Ok(None);
        }

        Ok(Some(Actor {
            id: user_id,
            roles: role_names_of(&state, user_id).into_iter().collect(),
            organization_ids: state
                .user_organizations
                .get(&user_id)
                .cloned()
                .unwrap_or_default(),
        }))
    }

    async fn list_roles(&self) -> Result<Vec<Role>> {
        Ok(self.read().roles.values().cloned().collect())
    }

    async fn find_role(&self, role_id: i64) -> Result<Option<Role>> {
        Ok(self.read().roles.get(&role_id).cloned())
    }

    async fn find_organizations(&self, query: &OrganizationQuery) -> Result<Vec<Organization>> {
        Ok(query.apply(self.read().organizations.values()))
    }

    async fn email_taken(&self, email: &str, exclude_id: Option<i64>) -> Result<bool> {
        Ok(self
            .read()
            .users
            .values()
            .any(|u| u.email == email && Some(u.id) != exclude_id))
    }

    async fn find_user(&self, user_id: i64) -> Result<Option<User>> {
        Ok(self.read().users.get(&user_id).cloned())
    }

    async fn save_user(&self, write: UserWrite) -> Result<User> {
        let mut state = self.write();

        if state
            .users
            .values()
            .any(|u| u.email == write.email && Some(u.id) != write.id)
        {
            return Err(AppError::Conflict("Email already exists".to_string()));
        }

        let now = Utc::now();
        let user = match write.id {
            None => {
                let password = write.password_hash.ok_or_else(|| {
                    AppError::Internal(anyhow::anyhow!("password hash required for new users"))
                })?;
                let id = state.next_id();
                User {
                    id,
                    name: write.name,
                    email: write.email,
                    password,
                    remember_token: None,
                    email_verified_at: None,
                    created_at: now,
                    updated_at: now,
                }
            }
            Some(id) => {
                let existing = state
                    .users
                    .get(&id)
                    .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;
                User {
                    name: write.name,
                    email: write.email,
                    password: write.password_hash.unwrap_or_else(|| existing.password.clone()),
                    updated_at: now,
                    ..existing.clone()
                }
            }
        };

        state.users.insert(user.id, user.clone());

        let scope = write.organization_scope;
        let links = state.user_organizations.entry(user.id).or_default();
        links.retain(|id| !scope.permits(*id));
        links.extend(
            write
                .organization_ids
                .into_iter()
                .filter(|id| scope.permits(*id)),
        );

        Ok(user)
    }

    async fn user_roles(&self, user_id: i64) -> Result<Vec<Role>> {
        let state = self.read();
        Ok(state
            .user_roles
            .get(&user_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.roles.get(id).cloned())
            .collect())
    }

    async fn sync_roles(&self, user_id: i64, role_ids: &[i64]) -> Result<()> {
        self.write()
            .user_roles
            .insert(user_id, role_ids.iter().copied().collect());
        Ok(())
    }

    async fn remove_role(&self, user_id: i64, role_name: &str) -> Result<()> {
        let mut state = self.write();
        let role_ids: Vec<i64> = state
            .roles
            .values()
            .filter(|r| r.name == role_name)
            .map(|r| r.id)
            .collect();

        if let Some(assigned) = state.user_roles.get_mut(&user_id) {
            assigned.retain(|id| !role_ids.contains(id));
        }
        Ok(())
    }

    async fn user_organizations(&self, user_id: i64) -> Result<Vec<Organization>> {
        let state = self.read();
        let mut organizations: Vec<Organization> = state
            .user_organizations
            .get(&user_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.organizations.get(id).cloned())
            .collect();
        organizations.sort_by(Organization::display_order);
        Ok(organizations)
    }

    async fn record_audit(&self, entry: CreateAuditLog) -> Result<()> {
        self.write().audit.push(entry);
        Ok(())
    }
}
