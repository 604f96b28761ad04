use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;

use crate::error::Result;
use crate::middleware::CurrentActor;
use crate::models::{UserDetail, UserInput};
use crate::services::scope::{form_schema, FormSchema};
use crate::services::UserService;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_user))
        .route("/form", get(get_form))
        .route("/:id", get(get_user).put(update_user))
}

#[derive(Debug, Deserialize)]
pub struct FormQuery {
    /// `create` (default) or `edit`
    pub mode: Option<String>,
}

async fn get_form(
    Extension(CurrentActor(actor)): Extension<CurrentActor>,
    Query(query): Query<FormQuery>,
) -> Json<FormSchema> {
    let creating = query.mode.as_deref() != Some("edit");
    Json(form_schema(Some(&actor), creating))
}

async fn create_user(
    State(state): State<AppState>,
    Extension(CurrentActor(actor)): Extension<CurrentActor>,
    Json(payload): Json<UserInput>,
) -> Result<(StatusCode, Json<UserDetail>)> {
    let user_service = UserService::new(state.directory.clone());
    let detail = user_service.create_user(Some(&actor), payload).await?;

    Ok((StatusCode::CREATED, Json(detail)))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserDetail>> {
    let user_service = UserService::new(state.directory.clone());
    Ok(Json(user_service.get_user(id).await?))
}

async fn update_user(
    State(state): State<AppState>,
    Extension(CurrentActor(actor)): Extension<CurrentActor>,
    Path(id): Path<i64>,
    Json(payload): Json<UserInput>,
) -> Result<Json<UserDetail>> {
    let user_service = UserService::new(state.directory.clone());
    let detail = user_service.update_user(Some(&actor), id, payload).await?;

    Ok(Json(detail))
}
