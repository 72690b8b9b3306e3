use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{debug, info};

use deaconn_types::api::{PageQuery, Paginated, ReplyInput, RequestDetail, RequestInput, RequestSort, RequestUpdate};
use deaconn_types::models::{Request, RequestReply};
use deaconn_types::policy::{
    can_create_request, can_delete_reply, can_delete_request, can_edit_request, can_list_all_requests,
    can_moderate_request, can_reply_to_request, can_view_request, request_capabilities,
};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::CurrentSession;
use crate::{page_request, run_db};

async fn load(state: &AppState, id: i64) -> Result<Request, ApiError> {
    run_db(state, move |db| db.get_request(id))
        .await?
        .ok_or(ApiError::NotFound("Request"))
}

/// GET /requests. Staff see every request, everyone else only their own.
pub async fn list_requests(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    ApiQuery(query): ApiQuery<PageQuery<RequestSort>>,
) -> Result<Json<Paginated<Request>>, ApiError> {
    let page = page_request(query)?;
    let owner = (!can_list_all_requests(Some(&session))).then(|| session.user_id.to_string());
    let result = run_db(&state, move |db| db.list_requests(&page, owner.as_deref())).await?;
    Ok(Json(result))
}

pub async fn create_request(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    ApiJson(input): ApiJson<RequestInput>,
) -> Result<impl IntoResponse, ApiError> {
    if !can_create_request(Some(&session)) {
        return Err(ApiError::Forbidden);
    }
    input.validate().map_err(ApiError::BadRequest)?;
    if let Some(service_id) = input.service_id {
        if !run_db(&state, move |db| db.service_exists(service_id)).await? {
            return Err(ApiError::BadRequest(format!("service {service_id} does not exist")));
        }
    }

    let uid = session.user_id.to_string();
    let id = run_db(&state, move |db| db.create_request(&uid, &input)).await?;
    let request = load(&state, id).await?;

    info!("Request {} opened by {}", id, session.user_id);
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn get_request(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<RequestDetail>, ApiError> {
    let request = load(&state, id).await?;
    if !can_view_request(Some(&session), request.user_id) {
        return Err(ApiError::Forbidden);
    }
    let replies = run_db(&state, move |db| db.list_replies(id)).await?;

    Ok(Json(RequestDetail {
        capabilities: request_capabilities(Some(&session), request.user_id),
        request,
        replies,
    }))
}

/// PATCH /requests/{id}. Owners may change title and content; status and
/// acceptance need staff.
pub async fn update_request(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    ApiPath(id): ApiPath<i64>,
    ApiJson(update): ApiJson<RequestUpdate>,
) -> Result<Json<Request>, ApiError> {
    let request = load(&state, id).await?;
    if !can_view_request(Some(&session), request.user_id) {
        return Err(ApiError::Forbidden);
    }
    if !update.touches_content() && !update.touches_moderation() {
        return Err(ApiError::BadRequest("nothing to update".into()));
    }
    if update.touches_content() && !can_edit_request(Some(&session), request.user_id) {
        return Err(ApiError::Forbidden);
    }
    if update.touches_moderation() && !can_moderate_request(Some(&session)) {
        return Err(ApiError::Forbidden);
    }
    update.validate().map_err(ApiError::BadRequest)?;

    if let Some(status) = update.status {
        debug!("Request {} status {} -> {}", id, request.status, status);
    }
    if !run_db(&state, move |db| db.update_request(id, &update)).await? {
        return Err(ApiError::NotFound("Request"));
    }
    Ok(Json(load(&state, id).await?))
}

pub async fn delete_request(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    let request = load(&state, id).await?;
    if !can_delete_request(Some(&session), request.user_id) {
        return Err(ApiError::Forbidden);
    }
    run_db(&state, move |db| db.delete_request(id)).await?;
    info!("Request {} deleted by {}", id, session.user_id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_reply(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<ReplyInput>,
) -> Result<impl IntoResponse, ApiError> {
    let request = load(&state, id).await?;
    if !can_reply_to_request(Some(&session), request.user_id, request.status) {
        return Err(ApiError::Forbidden);
    }
    input.validate().map_err(ApiError::BadRequest)?;

    let uid = session.user_id.to_string();
    let reply_id = run_db(&state, move |db| db.add_reply(id, &uid, &input.content)).await?;
    let reply: RequestReply = run_db(&state, move |db| db.get_reply(reply_id))
        .await?
        .ok_or(ApiError::NotFound("Reply"))?;

    Ok((StatusCode::CREATED, Json(reply)))
}

pub async fn delete_reply(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    ApiPath((id, reply_id)): ApiPath<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    let reply = run_db(&state, move |db| db.get_reply(reply_id))
        .await?
        .filter(|r| r.request_id == id)
        .ok_or(ApiError::NotFound("Reply"))?;
    if !can_delete_reply(Some(&session), reply.user_id) {
        return Err(ApiError::Forbidden);
    }
    run_db(&state, move |db| db.delete_reply(reply_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
