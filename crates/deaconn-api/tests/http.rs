use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use deaconn_api::auth::AppStateInner;
use deaconn_api::config::Config;
use deaconn_db::Database;

const GITLOG_SECRET: &str = "gitlog-test-secret";
const ADMIN_SECRET: &str = "admin-test-secret";

fn app() -> Router {
    let config = Config::from_lookup(|key| {
        let value = match key {
            "DEACONN_JWT_SECRET" => "integration-test-secret",
            "DEACONN_GITLOG_SECRET" => GITLOG_SECRET,
            "DEACONN_ADMIN_API_SECRET" => ADMIN_SECRET,
            "DEACONN_PUBLIC_URL" => "https://deaconn.test",
            _ => return None,
        };
        Some(value.to_string())
    })
    .expect("config");
    let db = Database::open_in_memory().expect("db");
    deaconn_api::router(Arc::new(AppStateInner { db, config }))
}

async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, value)
}

/// Register an account and return `(user_id, token)`.
async fn register(app: &Router, email: &str) -> (String, String) {
    let (status, body) = send(
        app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "email": email, "password": "correct horse battery", "name": "Tester" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    (
        body["user_id"].as_str().unwrap().to_string(),
        body["token"].as_str().unwrap().to_string(),
    )
}

async fn grant(app: &Router, user_id: &str, role: &str) {
    let (status, body) = send(
        app,
        "POST",
        "/admin-api/add-role",
        Some(ADMIN_SECRET),
        Some(json!({ "user_id": user_id, "role": role })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

fn article(url: &str) -> Value {
    json!({
        "url": url,
        "title": "A post",
        "description": "About things",
        "content": "Body text",
        "banner": null,
        "category_id": null
    })
}

fn push(commits: Value) -> Value {
    json!({ "action": "push", "repository": { "name": "deaconn" }, "commits": commits })
}

#[tokio::test]
async fn health_is_public() {
    let (status, body) = send(&app(), "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn push_webhook_stores_commit_with_branch() {
    let app = app();
    let payload = push(json!([{
        "id": "0f1e2d3c",
        "ref": "refs/heads/main",
        "message": "Fix footer",
        "author": { "name": "Dev", "username": "dev" }
    }]));

    let (status, body) = send(&app, "POST", "/webhooks/git-log", Some(GITLOG_SECRET), Some(payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Added 1 commits!");

    let (status, body) = send(&app, "GET", "/git-logs", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["repo_branch"], "main");
    assert_eq!(items[0]["repo_name"], "deaconn");
}

#[tokio::test]
async fn malformed_commit_does_not_sink_the_push() {
    let app = app();
    let payload = push(json!([
        { "id": "good1", "ref": "refs/heads/main", "message": "Works", "author": { "name": "Dev", "username": "dev" } },
        { "id": "bad2", "ref": "refs/heads/main", "author": { "name": "Dev", "username": "dev" } }
    ]));

    let (status, body) = send(&app, "POST", "/webhooks/git-log", Some(GITLOG_SECRET), Some(payload)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Added 1 commits!");

    let (_, body) = send(&app, "GET", "/git-logs", None, None).await;
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["commit_id"], "good1");
}

#[tokio::test]
async fn non_push_events_are_ignored() {
    let app = app();
    let payload = json!({ "action": "pull_request", "repository": { "name": "deaconn" }, "commits": [] });

    let (status, _) = send(&app, "POST", "/webhooks/git-log", Some(GITLOG_SECRET), Some(payload)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, "GET", "/git-logs", None, None).await;
    assert!(body["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn webhook_rejects_bad_token_and_missing_repository() {
    let app = app();
    let (status, _) = send(&app, "POST", "/webhooks/git-log", Some("wrong"), Some(push(json!([])))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "POST", "/webhooks/git-log", None, Some(push(json!([])))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let payload = json!({ "action": "push", "repository": {}, "commits": [] });
    let (status, _) = send(&app, "POST", "/webhooks/git-log", Some(GITLOG_SECRET), Some(payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unset_secret_leaves_route_unmounted() {
    let app = app();
    let (status, _) = send(&app, "POST", "/webhooks/github-stats", Some("anything"), Some(json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_session_token_is_rejected() {
    let app = app();
    let (status, body) = send(&app, "GET", "/auth/session", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _) = send(&app, "GET", "/auth/session", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_login_and_session() {
    let app = app();
    let (user_id, _) = register(&app, "someone@example.com").await;

    let (status, _) = send(&app, "POST", "/auth/register", None, Some(json!({
        "email": "Someone@Example.com", "password": "another password"
    })))
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, "POST", "/auth/login", None, Some(json!({
        "email": "someone@example.com", "password": "wrong password"
    })))
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, "POST", "/auth/login", None, Some(json!({
        "email": "someone@example.com", "password": "correct horse battery"
    })))
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "GET", "/auth/session", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], user_id.as_str());
    assert_eq!(body["roles"], json!(["user"]));
}

#[tokio::test]
async fn article_creation_is_role_gated() {
    let app = app();
    let (user_id, token) = register(&app, "writer@example.com").await;

    let (status, body) = send(&app, "POST", "/blog", Some(&token), Some(article("first-post"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["title"], "No Permissions");

    // Roles are read per request, so the same token picks up the grant.
    grant(&app, &user_id, "contributor").await;
    let (status, body) = send(&app, "POST", "/blog", Some(&token), Some(article("first-post"))).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["capabilities"]["can_edit"], true);

    let (status, _) = send(&app, "POST", "/blog", Some(&token), Some(article("first-post"))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(&app, "GET", "/blog/view/first-post", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["views"], 1);
    assert_eq!(body["capabilities"]["can_edit"], false);
}

#[tokio::test]
async fn blog_pages_follow_cursor() {
    let app = app();
    let (user_id, token) = register(&app, "bulk@example.com").await;
    grant(&app, &user_id, "contributor").await;
    for i in 0..15 {
        let (status, _) = send(&app, "POST", "/blog", Some(&token), Some(article(&format!("post-{i}")))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, first) = send(&app, "GET", "/blog?limit=10", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["items"].as_array().unwrap().len(), 10);
    let cursor = first["next_cursor"].as_i64().expect("cursor");

    let (_, second) = send(&app, "GET", &format!("/blog?limit=10&cursor={cursor}"), None, None).await;
    assert_eq!(second["items"].as_array().unwrap().len(), 5);
    assert!(second.get("next_cursor").is_none());

    let (status, body) = send(&app, "GET", "/blog?limit=0", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
    let (status, body) = send(&app, "GET", "/blog?sort=password", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
    assert_eq!(body["title"], "Invalid Input");
    assert!(body["message"].as_str().unwrap().contains("password"), "{body}");
}

#[tokio::test]
async fn malformed_input_gets_error_banner() {
    let app = app();
    let (status, body) = send(&app, "POST", "/auth/register", None, Some(json!({ "email": "x@example.com" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["title"], "Invalid Input");
    assert!(body["message"].as_str().unwrap().contains("password"), "{body}");

    let (_, token) = register(&app, "paths@example.com").await;
    let (status, body) = send(&app, "GET", "/requests/not-a-number", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn requests_are_private_to_owner_and_staff() {
    let app = app();
    let (_, owner) = register(&app, "owner@example.com").await;
    let (_, stranger) = register(&app, "stranger@example.com").await;
    let (mod_id, moderator) = register(&app, "mod@example.com").await;
    grant(&app, &mod_id, "moderator").await;

    let (status, body) = send(&app, "POST", "/requests", Some(&owner), Some(json!({
        "title": "Need a site", "content": "Details", "service_id": null
    })))
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_i64().unwrap();

    let (status, _) = send(&app, "GET", &format!("/requests/{id}"), Some(&stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, "GET", "/requests", Some(&stranger), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["items"].as_array().unwrap().is_empty());

    // Owners cannot change status; staff can.
    let (status, _) = send(&app, "PATCH", &format!("/requests/{id}"), Some(&owner), Some(json!({ "status": "completed" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = send(&app, "PATCH", &format!("/requests/{id}"), Some(&moderator), Some(json!({ "status": "completed" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");

    // Completed requests only take staff replies.
    let (status, _) = send(&app, "POST", &format!("/requests/{id}/replies"), Some(&owner), Some(json!({ "content": "Thanks" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, "POST", &format!("/requests/{id}/replies"), Some(&moderator), Some(json!({ "content": "Done" }))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = send(&app, "GET", &format!("/requests/{id}"), Some(&owner), None).await;
    assert_eq!(body["replies"].as_array().unwrap().len(), 1);
    assert_eq!(body["capabilities"]["can_delete"], true);
}

#[tokio::test]
async fn team_is_sorted_by_role_priority() {
    let app = app();
    let (admin_id, admin) = register(&app, "admin@example.com").await;
    grant(&app, &admin_id, "admin").await;
    let (contrib_id, _) = register(&app, "contrib@example.com").await;
    let (mod_id, _) = register(&app, "moderator@example.com").await;

    for (id, role) in [(&contrib_id, json!(["contributor"])), (&mod_id, json!(["moderator"]))] {
        let (status, body) = send(&app, "PATCH", &format!("/admin/users/{id}"), Some(&admin), Some(json!({
            "roles": role, "is_team": true
        })))
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }
    let (status, _) = send(&app, "PATCH", &format!("/admin/users/{admin_id}"), Some(&admin), Some(json!({
        "roles": ["admin"], "is_team": true
    })))
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, "GET", "/admin/team", None, None).await;
    let ids: Vec<&str> = body.as_array().unwrap().iter().map(|u| u["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec![admin_id.as_str(), mod_id.as_str(), contrib_id.as_str()]);
    assert_eq!(body[0]["image"], "/images/default_avatar.png");
}

#[tokio::test]
async fn category_rows_aggregate_child_counts() {
    let app = app();
    let (admin_id, admin) = register(&app, "cats@example.com").await;
    grant(&app, &admin_id, "admin").await;

    let (_, parent) = send(&app, "POST", "/categories", Some(&admin), Some(json!({
        "parent_id": null, "name": "Guides", "url": "guides", "description": null
    })))
    .await;
    let parent_id = parent["id"].as_i64().unwrap();
    let (_, child) = send(&app, "POST", "/categories", Some(&admin), Some(json!({
        "parent_id": parent_id, "name": "Linux", "url": "linux", "description": null
    })))
    .await;
    let child_id = child["id"].as_i64().unwrap();

    // Only one level of nesting.
    let (status, _) = send(&app, "POST", "/categories", Some(&admin), Some(json!({
        "parent_id": child_id, "name": "Deep", "url": "deep", "description": null
    })))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for (url, category) in [("a", parent_id), ("b", child_id), ("c", child_id)] {
        let mut body = article(url);
        body["category_id"] = json!(category);
        let (status, _) = send(&app, "POST", "/blog", Some(&admin), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, body) = send(&app, "GET", "/blog/categories", None, None).await;
    let rows = body["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["count"], 3);
    assert_eq!(rows[1]["count"], 2);
    assert_eq!(rows[1]["parent_id"], parent_id);
}

#[tokio::test]
async fn root_profiles_are_closed_to_other_staff() {
    let app = app();
    let (root_id, root) = register(&app, "root@example.com").await;
    let (status, _) = send(&app, "POST", "/admin-api/make-root", Some(ADMIN_SECRET), Some(json!({ "user_id": root_id }))).await;
    assert_eq!(status, StatusCode::OK);
    let (mod_id, moderator) = register(&app, "moderator@example.com").await;
    grant(&app, &mod_id, "moderator").await;
    let (admin_id, admin) = register(&app, "admin@example.com").await;
    grant(&app, &admin_id, "admin").await;

    let defaced = json!({ "name": "defaced", "url": "pwned" });
    for token in [&moderator, &admin] {
        let (status, _) = send(&app, "PUT", &format!("/users/{root_id}"), Some(token), Some(defaced.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
    let (_, body) = send(&app, "GET", &format!("/users/{root_id}"), Some(&admin), None).await;
    assert_eq!(body["capabilities"]["can_edit"], false);
    assert_eq!(body["name"], "Tester");

    let (status, skill) = send(&app, "POST", &format!("/users/{root_id}/skills"), Some(&root), Some(json!({
        "title": "Rust", "description": null, "hours": 100
    })))
    .await;
    assert_eq!(status, StatusCode::CREATED, "{skill}");
    let skill_id = skill["id"].as_i64().unwrap();
    let (status, _) = send(&app, "DELETE", &format!("/skills/{skill_id}"), Some(&moderator), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Staff still manage ordinary profiles.
    let (status, _) = send(&app, "PUT", &format!("/users/{admin_id}"), Some(&moderator), Some(json!({ "name": "Renamed" }))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "PUT", &format!("/users/{root_id}"), Some(&root), Some(json!({ "name": "Root" }))).await;
    assert_eq!(status, StatusCode::OK);
}
