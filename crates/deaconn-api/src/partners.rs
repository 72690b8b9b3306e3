use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use deaconn_types::api::{Footer, PageQuery, Paginated, PartnerInput, PartnerSort};
use deaconn_types::models::Partner;
use deaconn_types::policy::can_manage_site;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::CurrentSession;
use crate::{or_default, page_request, run_db, run_write};

/// Entries per footer column.
const FOOTER_LIMIT: u32 = 5;

fn present(state: &AppState, mut partner: Partner) -> Partner {
    or_default(&mut partner.banner, &state.config.default_banner);
    partner
}

async fn load_by_url(state: &AppState, url: String) -> Result<Partner, ApiError> {
    run_db(state, move |db| db.get_partner_by_url(&url))
        .await?
        .map(|p| present(state, p))
        .ok_or(ApiError::NotFound("Partner"))
}

/// GET /partners
pub async fn list_partners(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery<PartnerSort>>,
) -> Result<Json<Paginated<Partner>>, ApiError> {
    let page = page_request(query)?;
    let mut result = run_db(&state, move |db| db.list_partners(&page)).await?;
    result.items = result.items.into_iter().map(|p| present(&state, p)).collect();
    Ok(Json(result))
}

/// GET /partners/view/{url}
pub async fn view_partner(
    State(state): State<AppState>,
    ApiPath(url): ApiPath<String>,
) -> Result<Json<Partner>, ApiError> {
    Ok(Json(load_by_url(&state, url).await?))
}

/// GET /footer. Most viewed services and highest priority partners.
pub async fn footer(State(state): State<AppState>) -> Result<Json<Footer>, ApiError> {
    let footer = run_db(&state, |db| {
        Ok(Footer {
            services: db.footer_services(FOOTER_LIMIT)?,
            partners: db.footer_partners(FOOTER_LIMIT)?,
        })
    })
    .await?;
    Ok(Json(footer))
}

pub async fn create_partner(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    ApiJson(input): ApiJson<PartnerInput>,
) -> Result<impl IntoResponse, ApiError> {
    if !can_manage_site(Some(&session)) {
        return Err(ApiError::Forbidden);
    }
    input.validate().map_err(ApiError::BadRequest)?;

    let url = input.url.clone();
    let id = run_write(&state, "partner url", move |db| db.create_partner(&input)).await?;
    info!("Partner {} '{}' created by {}", id, url, session.user_id);

    Ok((StatusCode::CREATED, Json(load_by_url(&state, url).await?)))
}

pub async fn update_partner(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<PartnerInput>,
) -> Result<Json<Partner>, ApiError> {
    if !can_manage_site(Some(&session)) {
        return Err(ApiError::Forbidden);
    }
    input.validate().map_err(ApiError::BadRequest)?;

    let url = input.url.clone();
    if !run_write(&state, "partner url", move |db| db.update_partner(id, &input)).await? {
        return Err(ApiError::NotFound("Partner"));
    }
    Ok(Json(load_by_url(&state, url).await?))
}

pub async fn delete_partner(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    if !can_manage_site(Some(&session)) {
        return Err(ApiError::Forbidden);
    }
    if !run_db(&state, move |db| db.delete_partner(id)).await? {
        return Err(ApiError::NotFound("Partner"));
    }
    info!("Partner {} deleted by {}", id, session.user_id);
    Ok(StatusCode::NO_CONTENT)
}
