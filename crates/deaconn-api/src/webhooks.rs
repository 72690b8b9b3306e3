//! Endpoints called by external systems with a shared bearer secret rather
//! than a user session: the commit feed, GitHub counters and the admin
//! bootstrap utility.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

use deaconn_db::Database;
use deaconn_db::queries::NewGitLog;
use deaconn_types::api::{
    AddRoleRequest, CommitWebhook, GithubStatsUpdate, MakeRootRequest, MessageResponse, WebhookCommit,
};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::require_bearer;
use crate::run_db;

/// Authenticate first so unauthenticated callers learn nothing about the
/// payload format.
fn authorize<T: DeserializeOwned>(
    headers: &HeaderMap,
    secret: Option<&str>,
    body: &[u8],
) -> Result<T, ApiError> {
    let secret = secret.ok_or(ApiError::NotFound("Endpoint"))?;
    require_bearer(headers, secret)?;
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid payload: {e}")))
}

fn message(text: impl Into<String>) -> Json<MessageResponse> {
    Json(MessageResponse { message: text.into() })
}

/// `refs/heads/main` -> `main`. Other refs are kept as sent.
pub fn branch_of(git_ref: Option<&str>) -> &str {
    let git_ref = git_ref.unwrap_or_default();
    git_ref.strip_prefix("refs/heads/").unwrap_or(git_ref)
}

/// Store each commit on its own. A commit that is malformed or fails to
/// insert is logged and skipped so the rest of the push still lands.
/// Returns how many were stored.
pub fn ingest_commits(db: &Database, repo_name: &str, commits: &[Value]) -> usize {
    let mut added = 0;
    for (index, raw) in commits.iter().enumerate() {
        let commit = match WebhookCommit::deserialize(raw) {
            Ok(commit) => commit,
            Err(e) => {
                warn!("Skipping malformed commit #{} on {}: {}", index, repo_name, e);
                continue;
            }
        };

        let user_id = match commit.author.email.as_deref() {
            Some(email) => db.get_user_id_by_email(email).unwrap_or_else(|e| {
                warn!("Author lookup for commit {} failed: {:#}", commit.id, e);
                None
            }),
            None => None,
        };

        let log = NewGitLog {
            commit_id: &commit.id,
            repo_name,
            repo_branch: branch_of(commit.git_ref.as_deref()),
            message: &commit.message,
            author_name: &commit.author.name,
            author_username: &commit.author.username,
            author_email: commit.author.email.as_deref(),
            user_id: user_id.as_deref(),
        };
        match db.insert_git_log(&log) {
            Ok(_) => added += 1,
            Err(e) => warn!("Skipping commit {} on {}: {:#}", commit.id, repo_name, e),
        }
    }
    added
}

/// POST /webhooks/git-log
pub async fn git_log(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<MessageResponse>, ApiError> {
    let payload: CommitWebhook = authorize(&headers, state.config.gitlog_secret.as_deref(), &body)?;

    if payload.action != "push" {
        return Ok(message(format!("Ignoring '{}' event.", payload.action)));
    }
    let repo_name = payload
        .repository
        .and_then(|r| r.name)
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("repository name is required".into()))?;

    let commits = payload.commits;
    let received = commits.len();
    let (repo, added) = run_db(&state, move |db| {
        let added = ingest_commits(db, &repo_name, &commits);
        Ok((repo_name, added))
    })
    .await?;

    info!("Commit webhook for {}: stored {}/{} commits", repo, added, received);
    Ok(message(format!("Added {added} commits!")))
}

/// POST /webhooks/github-stats
pub async fn github_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<MessageResponse>, ApiError> {
    let update: GithubStatsUpdate =
        authorize(&headers, state.config.github_stats_secret.as_deref(), &body)?;
    if update.repositories.is_some_and(|v| v < 0) || update.commits.is_some_and(|v| v < 0) {
        return Err(ApiError::BadRequest("counters must not be negative".into()));
    }

    run_db(&state, move |db| db.update_github_stats(update.repositories, update.commits)).await?;
    Ok(message("Updated GitHub stats!"))
}

/// POST /admin-api/add-role
pub async fn add_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<MessageResponse>, ApiError> {
    let req: AddRoleRequest = authorize(&headers, state.config.admin_api_secret.as_deref(), &body)?;

    let uid = req.user_id.to_string();
    if !run_db(&state, move |db| db.add_role(&uid, req.role)).await? {
        return Err(ApiError::NotFound("User"));
    }
    info!("Admin utility granted {} to {}", req.role, req.user_id);
    Ok(message(format!("Added role {} to {}!", req.role, req.user_id)))
}

/// POST /admin-api/make-root
pub async fn make_root(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<MessageResponse>, ApiError> {
    let req: MakeRootRequest = authorize(&headers, state.config.admin_api_secret.as_deref(), &body)?;

    let uid = req.user_id.to_string();
    if !run_db(&state, move |db| db.make_root(&uid)).await? {
        return Err(ApiError::NotFound("User"));
    }
    warn!("Admin utility made {} a root user", req.user_id);
    Ok(message(format!("Made {} a root user!", req.user_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn commit(id: &str, email: Option<&str>) -> Value {
        json!({
            "id": id,
            "ref": "refs/heads/main",
            "message": "fix",
            "author": { "name": "Dev", "username": "dev", "email": email }
        })
    }

    #[test]
    fn branch_strips_heads_prefix() {
        assert_eq!(branch_of(Some("refs/heads/main")), "main");
        assert_eq!(branch_of(Some("refs/heads/feature/x")), "feature/x");
        assert_eq!(branch_of(Some("refs/tags/v1")), "refs/tags/v1");
        assert_eq!(branch_of(None), "");
    }

    #[test]
    fn duplicate_commits_are_skipped_not_fatal() {
        let db = Database::open_in_memory().unwrap();
        let added = ingest_commits(&db, "site", &[commit("a1", None), commit("a1", None), commit("b2", None)]);
        assert_eq!(added, 2);
    }

    #[test]
    fn malformed_commits_are_skipped() {
        let db = Database::open_in_memory().unwrap();
        let missing_message = json!({ "id": "bad2", "author": { "name": "Dev", "username": "dev" } });
        let added = ingest_commits(&db, "site", &[commit("good1", None), missing_message, json!("nope")]);
        assert_eq!(added, 1);

        let logs = db.list_git_logs(&deaconn_db::PageRequest::new(10)).unwrap().items;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].commit_id, "good1");
    }

    #[test]
    fn commits_link_to_users_by_email() {
        let db = Database::open_in_memory().unwrap();
        let uid = "7d1f3c52-1b0a-4f7e-9a43-2f6b1c0d9e88";
        db.create_user(uid, "dev@example.com", "hash", Some("Dev")).unwrap();

        ingest_commits(&db, "site", &[commit("c3", Some("dev@example.com")), commit("d4", Some("x@y.z"))]);
        let logs = db
            .list_git_logs(&deaconn_db::PageRequest::new(10))
            .unwrap()
            .items;
        let linked: Vec<_> = logs.iter().filter(|l| l.user_id.is_some()).collect();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].commit_id, "c3");
        assert_eq!(linked[0].repo_branch, "main");
    }
}
