use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Organization {
    pub id: i64,
    pub name: String,
}

impl Organization {
    /// Display order: case-insensitive name, then id
    pub fn display_order(a: &Organization, b: &Organization) -> Ordering {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then(a.id.cmp(&b.id))
    }
}

/// Which organizations an actor is allowed to see or select.
///
/// Listing, search and label lookup all filter through the same value so
/// the three paths cannot drift apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrganizationScope {
    /// No actor: nothing is visible
    Nothing,
    /// Unrestricted
    All,
    /// Only these organization ids
    Only(BTreeSet<i64>),
}

impl OrganizationScope {
    pub fn permits(&self, organization_id: i64) -> bool {
        match self {
            OrganizationScope::Nothing => false,
            OrganizationScope::All => true,
            OrganizationScope::Only(ids) => ids.contains(&organization_id),
        }
    }
}

/// Organization lookup issued against the directory
#[derive(Debug, Clone)]
pub struct OrganizationQuery {
    pub scope: OrganizationScope,
    /// Case-insensitive substring match on the name
    pub search: Option<String>,
    /// Restrict to these ids (label resolution)
    pub ids: Option<Vec<i64>>,
    pub limit: Option<i64>,
}

impl OrganizationQuery {
    pub fn new(scope: OrganizationScope) -> Self {
        Self {
            scope,
            search: None,
            ids: None,
            limit: None,
        }
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn ids(mut self, ids: Vec<i64>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// In-process evaluation of the query predicate (name order, then limit).
    pub fn apply<'a, I>(&self, organizations: I) -> Vec<Organization>
    where
        I: IntoIterator<Item = &'a Organization>,
    {
        let needle = self.search.as_ref().map(|s| s.to_lowercase());

        let mut matched: Vec<Organization> = organizations
            .into_iter()
            .filter(|org| self.scope.permits(org.id))
            .filter(|org| match &self.ids {
                Some(ids) => ids.contains(&org.id),
                None => true,
            })
            .filter(|org| match &needle {
                Some(needle) => org.name.to_lowercase().contains(needle.as_str()),
                None => true,
            })
            .cloned()
            .collect();

        matched.sort_by(Organization::display_order);

        if let Some(limit) = self.limit {
            matched.truncate(limit.max(0) as usize);
        }

        matched
    }
}
