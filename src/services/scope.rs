// Assignable scope: which roles and organizations an actor may see and select
use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;

use crate::db::Directory;
use crate::error::Result;
use crate::models::{holds_super_admin, Actor, Organization, OrganizationQuery, OrganizationScope, Role};

/// One entry of a select input, in display order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub id: i64,
    pub name: String,
}

impl From<Role> for SelectOption {
    fn from(role: Role) -> Self {
        Self {
            id: role.id,
            name: role.name,
        }
    }
}

impl From<Organization> for SelectOption {
    fn from(org: Organization) -> Self {
        Self {
            id: org.id,
            name: org.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSchema {
    pub name: &'static str,
    pub label: &'static str,
    pub required: bool,
    /// Whether the submitted value is written as a plain column
    pub dehydrated: bool,
    pub multiple: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub helper_text: Option<&'static str>,
}

/// Field layout of the user form as seen by one actor
#[derive(Debug, Clone, Serialize)]
pub struct FormSchema {
    pub fields: Vec<FieldSchema>,
    pub default_organizations: BTreeSet<i64>,
}

impl FormSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// The single predicate used by every organization lookup.
pub fn organization_scope(actor: Option<&Actor>) -> OrganizationScope {
    match actor {
        None => OrganizationScope::Nothing,
        Some(actor) if actor.is_super_admin() => OrganizationScope::All,
        // organization managers and everyone else: own memberships only
        Some(actor) => OrganizationScope::Only(actor.organization_ids.clone()),
    }
}

/// Pre-selected organizations for a new user
pub fn default_organizations(actor: Option<&Actor>) -> BTreeSet<i64> {
    match actor {
        Some(actor) if actor.is_organization_manager() && actor.organization_ids.len() == 1 => {
            actor.organization_ids.clone()
        }
        _ => BTreeSet::new(),
    }
}

pub fn organizations_required(actor: Option<&Actor>) -> bool {
    actor.is_some_and(Actor::is_organization_manager)
}

pub fn form_schema(actor: Option<&Actor>, creating: bool) -> FormSchema {
    let fields = vec![
        FieldSchema {
            name: "name",
            label: "Name",
            required: true,
            dehydrated: true,
            multiple: false,
            helper_text: None,
        },
        FieldSchema {
            name: "email",
            label: "Email",
            required: true,
            dehydrated: true,
            multiple: false,
            helper_text: None,
        },
        FieldSchema {
            name: "password",
            label: "Password",
            required: creating,
            dehydrated: true,
            multiple: false,
            helper_text: None,
        },
        FieldSchema {
            name: "role",
            label: "Role",
            required: true,
            // committed only through the role guard
            dehydrated: false,
            multiple: false,
            helper_text: None,
        },
        FieldSchema {
            name: "organizations",
            label: "Organizations",
            required: organizations_required(actor),
            dehydrated: true,
            multiple: true,
            helper_text: Some("Select the organizations this user belongs to"),
        },
    ];

    FormSchema {
        fields,
        default_organizations: default_organizations(actor),
    }
}

/// Produces the role and organization option lists for the user form.
#[derive(Clone)]
pub struct ScopeResolver {
    directory: Arc<dyn Directory>,
    page_size: i64,
}

impl ScopeResolver {
    pub fn new(directory: Arc<dyn Directory>, page_size: i64) -> Self {
        Self {
            directory,
            page_size: page_size.max(1),
        }
    }

    /// Roles ordered by id. Super-admin is only listed for super-admins.
    pub async fn role_options(&self, actor: Option<&Actor>) -> Result<Vec<SelectOption>> {
        let roles = self.directory.list_roles().await?;
        let show_super_admin = holds_super_admin(actor);

        Ok(roles
            .into_iter()
            .filter(|role| show_super_admin || !role.is_super_admin())
            .map(SelectOption::from)
            .collect())
    }

    /// Preloaded organization list, capped at `limit` (or the page size)
    pub async fn organization_options(
        &self,
        actor: Option<&Actor>,
        limit: Option<i64>,
    ) -> Result<Vec<SelectOption>> {
        let query = OrganizationQuery::new(organization_scope(actor)).limit(self.clamp(limit));
        self.fetch(&query).await
    }

    /// Incremental search by name. A blank term behaves like the plain listing.
    pub async fn organization_search(
        &self,
        actor: Option<&Actor>,
        term: &str,
        limit: Option<i64>,
    ) -> Result<Vec<SelectOption>> {
        let term = term.trim();
        let mut query = OrganizationQuery::new(organization_scope(actor)).limit(self.clamp(limit));
        if !term.is_empty() {
            query = query.search(term);
        }
        self.fetch(&query).await
    }

    /// Labels for already-selected ids. Uncapped; ids outside the scope are dropped.
    pub async fn organization_labels(
        &self,
        actor: Option<&Actor>,
        ids: &[i64],
    ) -> Result<Vec<SelectOption>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = OrganizationQuery::new(organization_scope(actor)).ids(ids.to_vec());
        self.fetch(&query).await
    }

    async fn fetch(&self, query: &OrganizationQuery) -> Result<Vec<SelectOption>> {
        if query.scope == OrganizationScope::Nothing {
            return Ok(Vec::new());
        }

        let organizations = self.directory.find_organizations(query).await?;
        Ok(organizations.into_iter().map(SelectOption::from).collect())
    }

    fn clamp(&self, limit: Option<i64>) -> i64 {
        limit.unwrap_or(self.page_size).clamp(1, self.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDirectory;
    use crate::models::{ORGANIZATION_MANAGER, SUPER_ADMIN};

    struct Fixture {
        directory: Arc<MemoryDirectory>,
        resolver: ScopeResolver,
    }

    fn fixture() -> Fixture {
        let directory = Arc::new(MemoryDirectory::new());
        directory.add_role(SUPER_ADMIN);
        directory.add_role(ORGANIZATION_MANAGER);
        directory.add_role("editor");

        let resolver = ScopeResolver::new(directory.clone(), 50);
        Fixture {
            directory,
            resolver,
        }
    }

    fn names(options: &[SelectOption]) -> Vec<&str> {
        options.iter().map(|o| o.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_role_options_hide_super_admin_from_others() {
        let fx = fixture();
        let manager = Actor::new(10).with_role(ORGANIZATION_MANAGER);

        for actor in [Some(&manager), None] {
            let options = fx.resolver.role_options(actor).await.unwrap();
            assert_eq!(names(&options), vec![ORGANIZATION_MANAGER, "editor"]);
        }
    }

    #[tokio::test]
    async fn test_role_options_for_super_admin_list_everything() {
        let fx = fixture();
        let admin = Actor::new(10).with_role(SUPER_ADMIN);

        let options = fx.resolver.role_options(Some(&admin)).await.unwrap();
        assert_eq!(names(&options), vec![SUPER_ADMIN, ORGANIZATION_MANAGER, "editor"]);
    }

    #[tokio::test]
    async fn test_organizations_empty_without_actor() {
        let fx = fixture();
        fx.directory.add_organization("Acme");

        assert!(fx.resolver.organization_options(None, None).await.unwrap().is_empty());
        assert!(fx
            .resolver
            .organization_search(None, "acme", None)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_super_admin_sees_all_organizations_sorted() {
        let fx = fixture();
        fx.directory.add_organization("Zeta");
        fx.directory.add_organization("Alpha");
        let admin = Actor::new(99).with_role(SUPER_ADMIN);

        let options = fx.resolver.organization_options(Some(&admin), None).await.unwrap();
        assert_eq!(names(&options), vec!["Alpha", "Zeta"]);
    }

    #[tokio::test]
    async fn test_member_only_sees_own_organizations_on_every_path() {
        let fx = fixture();
        let own = fx.directory.add_organization("North Branch");
        let other = fx.directory.add_organization("North Depot");
        let editor = Actor::new(99).with_role("editor").with_organizations([own]);

        let listed = fx.resolver.organization_options(Some(&editor), None).await.unwrap();
        let searched = fx
            .resolver
            .organization_search(Some(&editor), "north", None)
            .await
            .unwrap();
        let labels = fx
            .resolver
            .organization_labels(Some(&editor), &[own, other])
            .await
            .unwrap();

        let expected = vec![SelectOption {
            id: own,
            name: "North Branch".to_string(),
        }];
        assert_eq!(listed, expected);
        assert_eq!(searched, expected);
        assert_eq!(labels, expected);
    }

    #[tokio::test]
    async fn test_listing_is_capped_at_page_size() {
        let directory = Arc::new(MemoryDirectory::new());
        for i in 0..60 {
            directory.add_organization(&format!("Org {:02}", i));
        }
        let resolver = ScopeResolver::new(directory.clone(), 50);
        let admin = Actor::new(1).with_role(SUPER_ADMIN);

        let listed = resolver.organization_options(Some(&admin), None).await.unwrap();
        assert_eq!(listed.len(), 50);
        assert_eq!(listed[0].name, "Org 00");

        // callers may ask for fewer, never more
        let small = resolver.organization_options(Some(&admin), Some(5)).await.unwrap();
        assert_eq!(small.len(), 5);
        let big = resolver.organization_options(Some(&admin), Some(500)).await.unwrap();
        assert_eq!(big.len(), 50);
    }

    #[tokio::test]
    async fn test_labels_are_uncapped() {
        let directory = Arc::new(MemoryDirectory::new());
        let ids: Vec<i64> = (0..60)
            .map(|i| directory.add_organization(&format!("Org {:02}", i)))
            .collect();
        let resolver = ScopeResolver::new(directory.clone(), 50);
        let admin = Actor::new(1).with_role(SUPER_ADMIN);

        let labels = resolver.organization_labels(Some(&admin), &ids).await.unwrap();
        assert_eq!(labels.len(), 60);
    }

    #[tokio::test]
    async fn test_blank_search_lists_everything_in_scope() {
        let fx = fixture();
        fx.directory.add_organization("Acme");
        fx.directory.add_organization("Globex");
        let admin = Actor::new(1).with_role(SUPER_ADMIN);

        let options = fx.resolver.organization_search(Some(&admin), "  ", None).await.unwrap();
        assert_eq!(options.len(), 2);
    }

    #[tokio::test]
    async fn test_organization_manager_scenario() {
        let fx = fixture();
        fx.directory.add_organization_with_id(7, "Org7");
        fx.directory.add_organization_with_id(8, "Org8");
        let manager = Actor::new(100)
            .with_role(ORGANIZATION_MANAGER)
            .with_organizations([7]);

        let options = fx.resolver.organization_options(Some(&manager), None).await.unwrap();
        assert_eq!(
            options,
            vec![SelectOption {
                id: 7,
                name: "Org7".to_string()
            }]
        );
        assert_eq!(default_organizations(Some(&manager)), BTreeSet::from([7]));

        let roles = fx.resolver.role_options(Some(&manager)).await.unwrap();
        assert!(!names(&roles).contains(&SUPER_ADMIN));
    }

    #[test]
    fn test_default_organizations() {
        let single = Actor::new(1).with_role(ORGANIZATION_MANAGER).with_organizations([3]);
        let several = Actor::new(2)
            .with_role(ORGANIZATION_MANAGER)
            .with_organizations([3, 4]);
        let editor = Actor::new(3).with_role("editor").with_organizations([3]);

        assert_eq!(default_organizations(Some(&single)), BTreeSet::from([3]));
        assert!(default_organizations(Some(&several)).is_empty());
        assert!(default_organizations(Some(&editor)).is_empty());
        assert!(default_organizations(None).is_empty());
    }

    #[test]
    fn test_organization_scope() {
        let admin = Actor::new(1).with_role(SUPER_ADMIN).with_organizations([1]);
        let editor = Actor::new(2).with_organizations([5]);

        assert_eq!(organization_scope(None), OrganizationScope::Nothing);
        assert_eq!(organization_scope(Some(&admin)), OrganizationScope::All);
        assert_eq!(
            organization_scope(Some(&editor)),
            OrganizationScope::Only(BTreeSet::from([5]))
        );
    }

    #[test]
    fn test_form_schema_requiredness() {
        let manager = Actor::new(1).with_role(ORGANIZATION_MANAGER).with_organizations([2]);
        let editor = Actor::new(2).with_role("editor");

        let schema = form_schema(Some(&manager), true);
        assert!(schema.field("organizations").unwrap().required);
        assert!(schema.field("password").unwrap().required);
        assert_eq!(schema.default_organizations, BTreeSet::from([2]));

        let role = schema.field("role").unwrap();
        assert!(role.required);
        assert!(!role.dehydrated);

        let schema = form_schema(Some(&editor), false);
        assert!(!schema.field("organizations").unwrap().required);
        assert!(!schema.field("password").unwrap().required);
    }
}
