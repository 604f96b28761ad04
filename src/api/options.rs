use std::collections::BTreeSet;

use axum::{
    extract::{Query, State},
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::middleware::CurrentActor;
use crate::services::scope::default_organizations;
use crate::services::{ScopeResolver, SelectOption};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/roles", get(role_options))
        .route("/organizations", get(organization_options))
        .route("/organizations/labels", get(organization_labels))
        .route("/organizations/default", get(default_organization_ids))
}

fn resolver(state: &AppState) -> ScopeResolver {
    ScopeResolver::new(state.directory.clone(), state.config.options.page_size)
}

async fn role_options(
    State(state): State<AppState>,
    Extension(CurrentActor(actor)): Extension<CurrentActor>,
) -> Result<Json<Vec<SelectOption>>> {
    let options = resolver(&state).role_options(Some(&actor)).await?;
    Ok(Json(options))
}

#[derive(Debug, Deserialize)]
pub struct OrganizationQueryParams {
    pub search: Option<String>,
    pub limit: Option<i64>,
}

async fn organization_options(
    State(state): State<AppState>,
    Extension(CurrentActor(actor)): Extension<CurrentActor>,
    Query(params): Query<OrganizationQueryParams>,
) -> Result<Json<Vec<SelectOption>>> {
    let resolver = resolver(&state);

    let options = match params.search {
        Some(ref term) => resolver.organization_search(Some(&actor), term, params.limit).await?,
        None => resolver.organization_options(Some(&actor), params.limit).await?,
    };

    Ok(Json(options))
}

#[derive(Debug, Deserialize)]
pub struct LabelParams {
    /// Comma-separated organization ids
    #[serde(default)]
    pub ids: String,
}

fn parse_ids(raw: &str) -> Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| AppError::BadRequest(format!("Invalid organization id: {}", s)))
        })
        .collect()
}

async fn organization_labels(
    State(state): State<AppState>,
    Extension(CurrentActor(actor)): Extension<CurrentActor>,
    Query(params): Query<LabelParams>,
) -> Result<Json<Vec<SelectOption>>> {
    let ids = parse_ids(&params.ids)?;
    let labels = resolver(&state).organization_labels(Some(&actor), &ids).await?;
    Ok(Json(labels))
}

async fn default_organization_ids(
    Extension(CurrentActor(actor)): Extension<CurrentActor>,
) -> Json<BTreeSet<i64>> {
    Json(default_organizations(Some(&actor)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ids() {
        assert_eq!(parse_ids("1, 2,3").unwrap(), vec![1, 2, 3]);
        assert!(parse_ids("").unwrap().is_empty());
        assert!(matches!(parse_ids("1,x"), Err(AppError::BadRequest(_))));
    }
}
