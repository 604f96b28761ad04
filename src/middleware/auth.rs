use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Actor;
use crate::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,       // User ID
    pub exp: usize,        // Expiration time
    pub iat: usize,        // Issued at
}

/// Privilege snapshot of the caller, read once per request
#[derive(Debug, Clone)]
pub struct CurrentActor(pub Actor);

/// Sign an access token for `user_id`. Token issuance normally belongs to the
/// login service; this is used by the seed tool and tests.
pub fn issue_token(secret: &str, user_id: i64, expiry_hours: u64) -> Result<String> {
    let now = Utc::now();
    let exp = i64::try_from(expiry_hours)
        .ok()
        .and_then(Duration::try_hours)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("Token expiry out of range: {}h", expiry_hours))
        })?;

    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp() as usize,
        exp: exp.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("Token generation failed: {}", e)))
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthorized)?;

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.config.jwt.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized)?
    .claims;

    let user_id: i64 = claims.sub.parse().map_err(|_| AppError::Unauthorized)?;

    let actor = state
        .directory
        .load_actor(user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    tracing::debug!(actor_id = actor.id, roles = ?actor.roles, "Actor resolved");

    request.extensions_mut().insert(CurrentActor(actor));

    Ok(next.run(request).await)
}
