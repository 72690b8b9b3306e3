use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use deaconn_types::api::Claims;
use deaconn_types::policy::Session;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::run_db;

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Resolve the caller's session from a JWT in the Authorization header.
///
/// Requests without a token pass through anonymously. A token that fails
/// validation, or names a user that no longer exists, is rejected.
pub async fn load_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = bearer_token(req.headers()).map(str::to_owned) else {
        return Ok(next.run(req).await);
    };

    let token_data = decode::<Claims>(
        &token,
        &DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        debug!("Rejected session token: {}", e);
        ApiError::Unauthorized
    })?;

    let user_id = token_data.claims.sub;
    let uid = user_id.to_string();
    let user = run_db(&state, move |db| db.get_user(&uid))
        .await?
        .ok_or_else(|| {
            warn!("Session token for unknown user {}", user_id);
            ApiError::Unauthorized
        })?;

    req.extensions_mut().insert(Session {
        user_id: user.id,
        name: user.name,
        roles: user.roles,
        is_root: user.is_root,
        is_restricted: user.is_restricted,
    });
    Ok(next.run(req).await)
}

/// The signed-in caller; rejects anonymous requests with 401.
pub struct CurrentSession(pub Session);

impl<S: Send + Sync> FromRequestParts<S> for CurrentSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .map(CurrentSession)
            .ok_or(ApiError::Unauthorized)
    }
}

/// The caller if signed in.
pub struct MaybeSession(pub Option<Session>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeSession {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeSession(parts.extensions.get::<Session>().cloned()))
    }
}

/// Check a static bearer secret used by webhooks and admin utilities.
/// Both sides are hashed first so the comparison does not leak length or
/// prefix timing.
pub fn require_bearer(headers: &HeaderMap, secret: &str) -> Result<(), ApiError> {
    let token = bearer_token(headers).ok_or(ApiError::Unauthorized)?;
    let given = Sha256::digest(token.as_bytes());
    let expected = Sha256::digest(secret.as_bytes());

    let diff = given
        .iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b));
    if diff == 0 {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        map
    }

    #[test]
    fn bearer_secret_must_match_exactly() {
        assert!(require_bearer(&headers("Bearer hunter2"), "hunter2").is_ok());
        assert!(require_bearer(&headers("Bearer hunter"), "hunter2").is_err());
        assert!(require_bearer(&headers("hunter2"), "hunter2").is_err());
        assert!(require_bearer(&HeaderMap::new(), "hunter2").is_err());
    }
}
