//! Bearer-token principal resolution
//!
//! Token issuance and password login live outside this server; requests
//! arrive with a signed JWT whose subject is the user id. The user record,
//! including its rule set, is loaded from the registry per request.

mod jwt;

pub use jwt::{issue_user_jwt, verify_user_jwt, UserJwtClaims};

use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use fed_core::member::User;
use uuid::Uuid;

use crate::routes::ErrorResponse;
use crate::state::AppState;

type RouteError = (StatusCode, Json<ErrorResponse>);

fn unauthorized(error: impl Into<String>) -> RouteError {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

/// Resolve the principal from the `Authorization: Bearer <jwt>` header
pub async fn principal_from_headers(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<User, RouteError> {
    let header = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| unauthorized("Missing Authorization header"))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| unauthorized("Expected Bearer token"))?;

    let claims = verify_user_jwt(token).map_err(unauthorized)?;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| unauthorized("Invalid token subject"))?;

    state
        .registry()
        .user(user_id)
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
        })?
        .ok_or_else(|| unauthorized("Unknown user"))
}
