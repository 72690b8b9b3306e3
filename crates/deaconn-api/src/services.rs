use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use deaconn_db::models::CountKind;
use deaconn_types::api::{CategoryFilter, CategoryList, PageQuery, Paginated, ServiceDetail, ServiceInput, ServiceSort};
use deaconn_types::models::Service;
use deaconn_types::policy::{Session, can_manage_site, site_capabilities};

use crate::auth::AppState;
use crate::categories::{display_rows, ensure_category};
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::{CurrentSession, MaybeSession};
use crate::{or_default, page_request, run_db, run_write};

fn present(state: &AppState, mut service: Service) -> Service {
    or_default(&mut service.banner, &state.config.default_banner);
    service
}

fn detail(state: &AppState, session: Option<&Session>, service: Service) -> ServiceDetail {
    ServiceDetail {
        capabilities: site_capabilities(session),
        service: present(state, service),
    }
}

async fn load(state: &AppState, id: i64) -> Result<Service, ApiError> {
    run_db(state, move |db| db.get_service(id))
        .await?
        .ok_or(ApiError::NotFound("Service"))
}

/// GET /services
pub async fn list_services(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery<ServiceSort>>,
    ApiQuery(filter): ApiQuery<CategoryFilter>,
) -> Result<Json<Paginated<Service>>, ApiError> {
    let page = page_request(query)?;
    let mut result = run_db(&state, move |db| db.list_services(&page, filter.category)).await?;
    result.items = result.items.into_iter().map(|s| present(&state, s)).collect();
    Ok(Json(result))
}

/// GET /services/categories
pub async fn list_categories(State(state): State<AppState>) -> Result<Json<CategoryList>, ApiError> {
    Ok(Json(display_rows(&state, CountKind::Services).await?))
}

/// GET /services/view/{url}
pub async fn view_service(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(url): ApiPath<String>,
) -> Result<Json<ServiceDetail>, ApiError> {
    let service = run_db(&state, move |db| db.view_service(&url))
        .await?
        .ok_or(ApiError::NotFound("Service"))?;
    Ok(Json(detail(&state, session.as_ref(), service)))
}

pub async fn create_service(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    ApiJson(input): ApiJson<ServiceInput>,
) -> Result<impl IntoResponse, ApiError> {
    if !can_manage_site(Some(&session)) {
        return Err(ApiError::Forbidden);
    }
    input.validate().map_err(ApiError::BadRequest)?;
    ensure_category(&state, input.category_id).await?;

    let uid = session.user_id.to_string();
    let id = run_write(&state, "service url", move |db| db.create_service(&uid, &input)).await?;
    let service = load(&state, id).await?;

    info!("Service {} '{}' created by {}", id, service.url, session.user_id);
    Ok((StatusCode::CREATED, Json(detail(&state, Some(&session), service))))
}

pub async fn update_service(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<ServiceInput>,
) -> Result<Json<ServiceDetail>, ApiError> {
    if !can_manage_site(Some(&session)) {
        return Err(ApiError::Forbidden);
    }
    input.validate().map_err(ApiError::BadRequest)?;
    ensure_category(&state, input.category_id).await?;

    if !run_write(&state, "service url", move |db| db.update_service(id, &input)).await? {
        return Err(ApiError::NotFound("Service"));
    }
    let service = load(&state, id).await?;
    Ok(Json(detail(&state, Some(&session), service)))
}

pub async fn delete_service(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    if !can_manage_site(Some(&session)) {
        return Err(ApiError::Forbidden);
    }
    if !run_db(&state, move |db| db.delete_service(id)).await? {
        return Err(ApiError::NotFound("Service"));
    }
    info!("Service {} deleted by {}", id, session.user_id);
    Ok(StatusCode::NO_CONTENT)
}
