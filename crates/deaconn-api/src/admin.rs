use axum::{
    Json,
    extract::State,
};
use tracing::info;
use uuid::Uuid;

use deaconn_types::api::UserAdminUpdate;
use deaconn_types::models::User;
use deaconn_types::policy::can_manage_user;
use deaconn_types::roles::sort_by_role_priority;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::CurrentSession;
use crate::run_db;
use crate::users::present;

/// GET /admin/team. Admins first, then moderators, contributors and the
/// rest; members of equal rank keep join order.
pub async fn list_team(State(state): State<AppState>) -> Result<Json<Vec<User>>, ApiError> {
    let mut team = run_db(&state, |db| db.list_team()).await?;
    sort_by_role_priority(&mut team);
    Ok(Json(team.into_iter().map(|u| present(&state, u)).collect()))
}

/// PATCH /admin/users/{id}
pub async fn update_user(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(update): ApiJson<UserAdminUpdate>,
) -> Result<Json<User>, ApiError> {
    let uid = id.to_string();
    let target = run_db(&state, move |db| db.get_user(&uid))
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    if !can_manage_user(Some(&session), target.is_root) {
        return Err(ApiError::Forbidden);
    }

    let uid = id.to_string();
    let updated = run_db(&state, move |db| {
        if !db.update_user_admin(&uid, update.roles.as_deref(), update.is_team, update.is_restricted)? {
            return Ok(None);
        }
        db.get_user(&uid)
    })
    .await?
    .ok_or(ApiError::NotFound("User"))?;

    info!(
        "User {} updated by {}: roles={:?} team={} restricted={}",
        id, session.user_id, updated.roles, updated.is_team, updated.is_restricted
    );
    Ok(Json(present(&state, updated)))
}
