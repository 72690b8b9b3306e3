use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use deaconn_db::models::CountKind;
use deaconn_types::api::{ArticleDetail, ArticleInput, ArticleSort, CategoryFilter, CategoryList, PageQuery, Paginated};
use deaconn_types::models::Article;
use deaconn_types::policy::{article_capabilities, can_create_article, can_edit_article};

use crate::auth::AppState;
use crate::categories::{display_rows, ensure_category};
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::{CurrentSession, MaybeSession};
use crate::{or_default, page_request, run_db, run_write};

fn present(state: &AppState, mut article: Article) -> Article {
    or_default(&mut article.banner, &state.config.default_banner);
    article
}

async fn load(state: &AppState, id: i64) -> Result<Article, ApiError> {
    run_db(state, move |db| db.get_article(id))
        .await?
        .ok_or(ApiError::NotFound("Article"))
}

/// GET /blog
pub async fn list_articles(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery<ArticleSort>>,
    ApiQuery(filter): ApiQuery<CategoryFilter>,
) -> Result<Json<Paginated<Article>>, ApiError> {
    let page = page_request(query)?;
    let mut result = run_db(&state, move |db| db.list_articles(&page, filter.category)).await?;
    result.items = result.items.into_iter().map(|a| present(&state, a)).collect();
    Ok(Json(result))
}

/// GET /blog/categories
pub async fn list_categories(State(state): State<AppState>) -> Result<Json<CategoryList>, ApiError> {
    Ok(Json(display_rows(&state, CountKind::Articles).await?))
}

/// GET /blog/view/{url}. Every successful read counts as a view.
pub async fn view_article(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(url): ApiPath<String>,
) -> Result<Json<ArticleDetail>, ApiError> {
    let article = run_db(&state, move |db| db.view_article(&url))
        .await?
        .ok_or(ApiError::NotFound("Article"))?;

    Ok(Json(ArticleDetail {
        capabilities: article_capabilities(session.as_ref(), article.user_id),
        article: present(&state, article),
    }))
}

pub async fn create_article(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    ApiJson(input): ApiJson<ArticleInput>,
) -> Result<impl IntoResponse, ApiError> {
    if !can_create_article(Some(&session)) {
        return Err(ApiError::Forbidden);
    }
    input.validate().map_err(ApiError::BadRequest)?;
    ensure_category(&state, input.category_id).await?;

    let uid = session.user_id.to_string();
    let id = run_write(&state, "article url", move |db| db.create_article(&uid, &input)).await?;
    let article = load(&state, id).await?;

    info!("Article {} '{}' created by {}", id, article.url, session.user_id);
    Ok((
        StatusCode::CREATED,
        Json(ArticleDetail {
            capabilities: article_capabilities(Some(&session), article.user_id),
            article: present(&state, article),
        }),
    ))
}

pub async fn update_article(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<ArticleInput>,
) -> Result<Json<ArticleDetail>, ApiError> {
    let existing = load(&state, id).await?;
    if !can_edit_article(Some(&session), existing.user_id) {
        return Err(ApiError::Forbidden);
    }
    input.validate().map_err(ApiError::BadRequest)?;
    ensure_category(&state, input.category_id).await?;

    if !run_write(&state, "article url", move |db| db.update_article(id, &input)).await? {
        return Err(ApiError::NotFound("Article"));
    }
    let article = load(&state, id).await?;
    Ok(Json(ArticleDetail {
        capabilities: article_capabilities(Some(&session), article.user_id),
        article: present(&state, article),
    }))
}

pub async fn delete_article(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    let existing = load(&state, id).await?;
    if !article_capabilities(Some(&session), existing.user_id).can_delete {
        return Err(ApiError::Forbidden);
    }
    run_db(&state, move |db| db.delete_article(id)).await?;
    info!("Article {} deleted by {}", id, session.user_id);
    Ok(StatusCode::NO_CONTENT)
}
