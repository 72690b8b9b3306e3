use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use deaconn_types::api::{LogSort, PageQuery, Paginated, UpdateLogInput};
use deaconn_types::models::{GitLog, GithubStats, UpdateLog};
use deaconn_types::policy::can_manage_site;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::CurrentSession;
use crate::{page_request, run_db};

/// GET /git-logs
pub async fn list_git_logs(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery<LogSort>>,
) -> Result<Json<Paginated<GitLog>>, ApiError> {
    let page = page_request(query)?;
    Ok(Json(run_db(&state, move |db| db.list_git_logs(&page)).await?))
}

pub async fn delete_git_log(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    if !can_manage_site(Some(&session)) {
        return Err(ApiError::Forbidden);
    }
    if !run_db(&state, move |db| db.delete_git_log(id)).await? {
        return Err(ApiError::NotFound("Git log"));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /update-logs
pub async fn list_update_logs(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery<LogSort>>,
) -> Result<Json<Paginated<UpdateLog>>, ApiError> {
    let page = page_request(query)?;
    Ok(Json(run_db(&state, move |db| db.list_update_logs(&page)).await?))
}

pub async fn create_update_log(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    ApiJson(input): ApiJson<UpdateLogInput>,
) -> Result<impl IntoResponse, ApiError> {
    if !can_manage_site(Some(&session)) {
        return Err(ApiError::Forbidden);
    }
    input.validate().map_err(ApiError::BadRequest)?;

    let uid = session.user_id.to_string();
    let id = run_db(&state, move |db| db.insert_update_log(Some(&uid), &input)).await?;
    info!("Update log {} posted by {}", id, session.user_id);

    let log = run_db(&state, move |db| db.get_update_log(id))
        .await?
        .ok_or(ApiError::NotFound("Update log"))?;
    Ok((StatusCode::CREATED, Json(log)))
}

pub async fn delete_update_log(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    if !can_manage_site(Some(&session)) {
        return Err(ApiError::Forbidden);
    }
    if !run_db(&state, move |db| db.delete_update_log(id)).await? {
        return Err(ApiError::NotFound("Update log"));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /stats
pub async fn github_stats(State(state): State<AppState>) -> Result<Json<GithubStats>, ApiError> {
    Ok(Json(run_db(&state, |db| db.github_stats()).await?))
}
