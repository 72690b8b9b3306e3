use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;
use uuid::Uuid;

use deaconn_db::Database;
use deaconn_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

use crate::config::Config;
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::middleware::CurrentSession;
use crate::{run_db, run_write};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub config: Config,
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate input
    let email = req.email.trim().to_lowercase();
    if email.len() < 3 || email.len() > 254 || !email.contains('@') {
        return Err(ApiError::BadRequest("email is invalid".into()));
    }
    if req.password.len() < 8 {
        return Err(ApiError::BadRequest("password must be at least 8 characters".into()));
    }
    let name = req.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    if name.as_ref().is_some_and(|n| n.chars().count() > 64) {
        return Err(ApiError::BadRequest("name must be at most 64 characters".into()));
    }

    // Check if email is taken
    let lookup = email.clone();
    if run_db(&state, move |db| db.get_credentials_by_email(&lookup)).await?.is_some() {
        return Err(ApiError::Conflict("an account with this email already exists".into()));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {}", e)))?
        .to_string();

    let user_id = Uuid::new_v4();
    let (uid, insert_email, insert_name) = (user_id.to_string(), email.clone(), name.clone());
    run_write(&state, "account", move |db| {
        db.create_user(&uid, &insert_email, &password_hash, insert_name.as_deref())
    })
    .await?;

    let token = create_token(&state.config, user_id, name.as_deref())?;
    info!("Registered user {}", user_id);

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id, token })))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_lowercase();
    let user = run_db(&state, move |db| db.get_credentials_by_email(&email))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("stored hash for {} is corrupt: {}", user.id, e)))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt user id '{}': {}", user.id, e)))?;

    let token = create_token(&state.config, user_id, user.name.as_deref())?;

    Ok(Json(LoginResponse {
        user_id,
        name: user.name,
        token,
    }))
}

/// GET /auth/session: the caller as the server sees them.
pub async fn session(CurrentSession(session): CurrentSession) -> impl IntoResponse {
    Json(session)
}

pub fn create_token(config: &Config, user_id: Uuid, name: Option<&str>) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        name: name.map(str::to_string),
        exp: (chrono::Utc::now() + chrono::Duration::days(config.session_days)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?;

    Ok(token)
}
