mod options;
mod users;

use axum::{middleware, Router};

use crate::middleware::require_auth;
use crate::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/options", options::routes())
        .nest("/users", users::routes())
        .layer(middleware::from_fn_with_state(state, require_auth))
}
