pub mod admin;
pub mod auth;
pub mod blog;
pub mod categories;
pub mod config;
pub mod error;
pub mod extract;
pub mod files;
pub mod logs;
pub mod middleware;
pub mod partners;
pub mod requests;
pub mod services;
pub mod sitemap;
pub mod users;
pub mod webhooks;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, patch, post, put},
};
use serde_json::{Value, json};
use tracing::info;

use deaconn_db::{Database, PageRequest, SortKey};
use deaconn_types::api::PageQuery;

use crate::auth::AppState;
use crate::error::ApiError;

/// Run a database call on the blocking pool.
pub(crate) async fn run_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("spawn_blocking join error: {}", e)))?
        .map_err(ApiError::Internal)
}

/// Like [`run_db`], reporting constraint violations on `what` as conflicts.
pub(crate) async fn run_write<F, T>(state: &AppState, what: &'static str, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("spawn_blocking join error: {}", e)))?
        .map_err(|e| ApiError::from_write(e, what))
}

pub(crate) fn page_request<S, C>(query: PageQuery<S, C>) -> Result<PageRequest<S, C>, ApiError>
where
    S: SortKey + Default,
{
    PageRequest::from_query(query).map_err(ApiError::BadRequest)
}

/// Fill an unset image with the configured fallback.
pub(crate) fn or_default(image: &mut Option<String>, fallback: &str) {
    if image.as_deref().is_none_or(str::is_empty) {
        *image = Some(fallback.to_string());
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Build the HTTP surface. Routes guarded by an optional secret are only
/// mounted when that secret is configured.
pub fn router(state: AppState) -> Router {
    let app = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/session", get(auth::session))
        // Blog
        .route("/blog", get(blog::list_articles).post(blog::create_article))
        .route("/blog/categories", get(blog::list_categories))
        .route("/blog/view/{url}", get(blog::view_article))
        .route("/blog/{id}", put(blog::update_article).delete(blog::delete_article))
        // Services
        .route("/services", get(services::list_services).post(services::create_service))
        .route("/services/categories", get(services::list_categories))
        .route("/services/view/{url}", get(services::view_service))
        .route(
            "/services/{id}",
            put(services::update_service).delete(services::delete_service),
        )
        // Categories
        .route(
            "/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/categories/{id}",
            put(categories::update_category).delete(categories::delete_category),
        )
        // Requests
        .route("/requests", get(requests::list_requests).post(requests::create_request))
        .route(
            "/requests/{id}",
            get(requests::get_request)
                .patch(requests::update_request)
                .delete(requests::delete_request),
        )
        .route("/requests/{id}/replies", post(requests::add_reply))
        .route(
            "/requests/{id}/replies/{reply_id}",
            axum::routing::delete(requests::delete_reply),
        )
        // Users and profiles
        .route("/users", get(users::list_users))
        .route("/users/{id}", get(users::get_profile).put(users::update_profile))
        .route(
            "/users/{id}/experiences",
            get(users::list_experiences).post(users::create_experience),
        )
        .route("/users/{id}/skills", get(users::list_skills).post(users::create_skill))
        .route(
            "/users/{id}/projects",
            get(users::list_projects).post(users::create_project),
        )
        .route(
            "/experiences/{id}",
            put(users::update_experience).delete(users::delete_experience),
        )
        .route("/skills/{id}", put(users::update_skill).delete(users::delete_skill))
        .route(
            "/projects/{id}",
            get(users::get_project)
                .put(users::update_project)
                .delete(users::delete_project),
        )
        // Administration
        .route("/admin/team", get(admin::list_team))
        .route("/admin/users/{id}", patch(admin::update_user))
        // Partners
        .route("/partners", get(partners::list_partners).post(partners::create_partner))
        .route("/partners/view/{url}", get(partners::view_partner))
        .route(
            "/partners/{id}",
            put(partners::update_partner).delete(partners::delete_partner),
        )
        .route("/footer", get(partners::footer))
        // Logs
        .route("/git-logs", get(logs::list_git_logs))
        .route("/git-logs/{id}", axum::routing::delete(logs::delete_git_log))
        .route(
            "/update-logs",
            get(logs::list_update_logs).post(logs::create_update_log),
        )
        .route("/update-logs/{id}", axum::routing::delete(logs::delete_update_log))
        .route("/stats", get(logs::github_stats))
        // Files
        .route(
            "/files",
            post(files::upload_file).layer(DefaultBodyLimit::max(files::MAX_UPLOAD_SIZE)),
        )
        .route("/files/{name}", get(files::serve_file))
        .layer(from_fn_with_state(state.clone(), middleware::load_session));

    // Bearer-secret routes sit outside the session layer: their tokens are
    // shared secrets, not session JWTs.
    let mut open = Router::new()
        .route("/health", get(health))
        .route("/sitemap.xml", get(sitemap::sitemap));

    if state.config.gitlog_secret.is_some() {
        open = open.route("/webhooks/git-log", post(webhooks::git_log));
    } else {
        info!("DEACONN_GITLOG_SECRET unset, commit webhook disabled");
    }
    if state.config.github_stats_secret.is_some() {
        open = open.route("/webhooks/github-stats", post(webhooks::github_stats));
    } else {
        info!("DEACONN_GITHUB_STATS_SECRET unset, stats webhook disabled");
    }
    if state.config.admin_api_secret.is_some() {
        open = open
            .route("/admin-api/add-role", post(webhooks::add_role))
            .route("/admin-api/make-root", post(webhooks::make_root));
    } else {
        info!("DEACONN_ADMIN_API_SECRET unset, admin utility disabled");
    }

    app.merge(open).with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_blank_images_get_the_fallback() {
        let mut image = None;
        or_default(&mut image, "/default.png");
        assert_eq!(image.as_deref(), Some("/default.png"));

        let mut image = Some(String::new());
        or_default(&mut image, "/default.png");
        assert_eq!(image.as_deref(), Some("/default.png"));

        let mut image = Some("/mine.png".to_string());
        or_default(&mut image, "/default.png");
        assert_eq!(image.as_deref(), Some("/mine.png"));
    }
}
