use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use deaconn_db::models::CountKind;
use deaconn_types::api::{CategoryInput, CategoryList};
use deaconn_types::categories::flatten;
use deaconn_types::models::Category;
use deaconn_types::policy::can_manage_site;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::CurrentSession;
use crate::{run_db, run_write};

/// Display rows for the blog or service category sidebar.
pub(crate) async fn display_rows(state: &AppState, kind: CountKind) -> Result<CategoryList, ApiError> {
    let tree = run_db(state, move |db| db.category_tree(kind)).await?;
    Ok(CategoryList { rows: flatten(&tree) })
}

/// Reject items filed under a category that does not exist.
pub(crate) async fn ensure_category(state: &AppState, id: Option<i64>) -> Result<(), ApiError> {
    let Some(id) = id else { return Ok(()) };
    match run_db(state, move |db| db.get_category(id)).await? {
        Some(_) => Ok(()),
        None => Err(ApiError::BadRequest(format!("category {id} does not exist"))),
    }
}

/// Categories nest one level deep: a parent must itself be top-level.
async fn check_parent(state: &AppState, id: Option<i64>, input: &CategoryInput) -> Result<(), ApiError> {
    let Some(parent_id) = input.parent_id else { return Ok(()) };

    if Some(parent_id) == id {
        return Err(ApiError::BadRequest("a category cannot be its own parent".into()));
    }
    let parent = run_db(state, move |db| db.get_category(parent_id))
        .await?
        .ok_or_else(|| ApiError::BadRequest(format!("parent category {parent_id} does not exist")))?;
    if parent.parent_id.is_some() {
        return Err(ApiError::BadRequest("parent category must be top-level".into()));
    }
    if let Some(id) = id {
        if run_db(state, move |db| db.category_has_children(id)).await? {
            return Err(ApiError::BadRequest(
                "a category with children cannot be given a parent".into(),
            ));
        }
    }
    Ok(())
}

pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(run_db(&state, |db| db.list_categories()).await?))
}

pub async fn create_category(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    ApiJson(input): ApiJson<CategoryInput>,
) -> Result<impl IntoResponse, ApiError> {
    if !can_manage_site(Some(&session)) {
        return Err(ApiError::Forbidden);
    }
    input.validate().map_err(ApiError::BadRequest)?;
    check_parent(&state, None, &input).await?;

    let id = run_write(&state, "category url", move |db| db.create_category(&input)).await?;
    let category = run_db(&state, move |db| db.get_category(id))
        .await?
        .ok_or(ApiError::NotFound("Category"))?;

    info!("Category {} created by {}", id, session.user_id);
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update_category(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<CategoryInput>,
) -> Result<Json<Category>, ApiError> {
    if !can_manage_site(Some(&session)) {
        return Err(ApiError::Forbidden);
    }
    input.validate().map_err(ApiError::BadRequest)?;
    check_parent(&state, Some(id), &input).await?;

    if !run_write(&state, "category url", move |db| db.update_category(id, &input)).await? {
        return Err(ApiError::NotFound("Category"));
    }
    let category = run_db(&state, move |db| db.get_category(id))
        .await?
        .ok_or(ApiError::NotFound("Category"))?;
    Ok(Json(category))
}

pub async fn delete_category(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    if !can_manage_site(Some(&session)) {
        return Err(ApiError::Forbidden);
    }
    if !run_db(&state, move |db| db.delete_category(id)).await? {
        return Err(ApiError::NotFound("Category"));
    }
    info!("Category {} deleted by {}", id, session.user_id);
    Ok(StatusCode::NO_CONTENT)
}
