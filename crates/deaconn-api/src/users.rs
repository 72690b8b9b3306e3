use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use deaconn_types::api::{
    ExperienceInput, PageQuery, Paginated, ProfileInput, ProfileResponse, ProjectDetail, ProjectInput,
    RecordSort, SkillInput, UserSort,
};
use deaconn_types::models::{Experience, Project, Skill, User};
use deaconn_types::policy::{Session, can_edit_profile, can_list_users, profile_capabilities};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::{CurrentSession, MaybeSession};
use crate::{or_default, page_request, run_db, run_write};

pub(crate) fn present(state: &AppState, mut user: User) -> User {
    or_default(&mut user.image, &state.config.default_avatar);
    user
}

/// Profiles are addressed by user id or by vanity url.
async fn resolve_user(state: &AppState, key: String) -> Result<User, ApiError> {
    let user = match key.parse::<Uuid>() {
        Ok(id) => run_db(state, move |db| db.get_user(&id.to_string())).await?,
        Err(_) => run_db(state, move |db| db.get_user_by_url(&key)).await?,
    };
    user.ok_or(ApiError::NotFound("User"))
}

/// Resolve `key` and check the caller may edit that user's profile records.
async fn editable_user(state: &AppState, session: &Session, key: String) -> Result<User, ApiError> {
    let user = resolve_user(state, key).await?;
    if !can_edit_profile(Some(session), user.id, user.is_root) {
        return Err(ApiError::Forbidden);
    }
    Ok(user)
}

async fn owner_is_root(state: &AppState, owner: Uuid) -> Result<bool, ApiError> {
    let uid = owner.to_string();
    let user = run_db(state, move |db| db.get_user(&uid)).await?;
    Ok(user.is_some_and(|u| u.is_root))
}

/// Check the caller may edit a record owned by `owner`. Returns whether the
/// owner is a root user.
async fn check_owner(state: &AppState, session: &Session, owner: Uuid) -> Result<bool, ApiError> {
    let target_is_root = owner_is_root(state, owner).await?;
    if can_edit_profile(Some(session), owner, target_is_root) {
        Ok(target_is_root)
    } else {
        Err(ApiError::Forbidden)
    }
}

// -- Users --

/// GET /users
pub async fn list_users(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    ApiQuery(query): ApiQuery<PageQuery<UserSort, String>>,
) -> Result<Json<Paginated<User, String>>, ApiError> {
    if !can_list_users(Some(&session)) {
        return Err(ApiError::Forbidden);
    }
    let page = page_request(query)?;
    let mut result = run_db(&state, move |db| db.list_users(&page)).await?;
    result.items = result.items.into_iter().map(|u| present(&state, u)).collect();
    Ok(Json(result))
}

/// GET /users/{id}
pub async fn get_profile(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(key): ApiPath<String>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = resolve_user(&state, key).await?;
    Ok(Json(ProfileResponse {
        capabilities: profile_capabilities(session.as_ref(), user.id, user.is_root),
        user: present(&state, user),
    }))
}

/// PUT /users/{id}. Replaces every editable profile field.
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    ApiPath(key): ApiPath<String>,
    ApiJson(input): ApiJson<ProfileInput>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = editable_user(&state, &session, key).await?;
    input.validate().map_err(ApiError::BadRequest)?;

    let uid = user.id.to_string();
    if !run_write(&state, "profile url", move |db| db.update_profile(&uid, &input)).await? {
        return Err(ApiError::NotFound("User"));
    }
    let updated = resolve_user(&state, user.id.to_string()).await?;
    info!("Profile {} updated by {}", user.id, session.user_id);

    Ok(Json(ProfileResponse {
        capabilities: profile_capabilities(Some(&session), updated.id, updated.is_root),
        user: present(&state, updated),
    }))
}

// -- Experiences --

pub async fn list_experiences(
    State(state): State<AppState>,
    ApiPath(key): ApiPath<String>,
    ApiQuery(query): ApiQuery<PageQuery<RecordSort>>,
) -> Result<Json<Paginated<Experience>>, ApiError> {
    let page = page_request(query)?;
    let uid = resolve_user(&state, key).await?.id.to_string();
    Ok(Json(run_db(&state, move |db| db.list_experiences(&uid, &page)).await?))
}

pub async fn create_experience(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    ApiPath(key): ApiPath<String>,
    ApiJson(input): ApiJson<ExperienceInput>,
) -> Result<impl IntoResponse, ApiError> {
    let user = editable_user(&state, &session, key).await?;
    input.validate().map_err(ApiError::BadRequest)?;

    let uid = user.id.to_string();
    let id = run_db(&state, move |db| db.create_experience(&uid, &input)).await?;
    let experience = run_db(&state, move |db| db.get_experience(id))
        .await?
        .ok_or(ApiError::NotFound("Experience"))?;
    Ok((StatusCode::CREATED, Json(experience)))
}

pub async fn update_experience(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<ExperienceInput>,
) -> Result<Json<Experience>, ApiError> {
    let existing = run_db(&state, move |db| db.get_experience(id))
        .await?
        .ok_or(ApiError::NotFound("Experience"))?;
    check_owner(&state, &session, existing.user_id).await?;
    input.validate().map_err(ApiError::BadRequest)?;

    run_db(&state, move |db| db.update_experience(id, &input)).await?;
    let experience = run_db(&state, move |db| db.get_experience(id))
        .await?
        .ok_or(ApiError::NotFound("Experience"))?;
    Ok(Json(experience))
}

pub async fn delete_experience(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    let existing = run_db(&state, move |db| db.get_experience(id))
        .await?
        .ok_or(ApiError::NotFound("Experience"))?;
    check_owner(&state, &session, existing.user_id).await?;
    run_db(&state, move |db| db.delete_experience(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// -- Skills --

pub async fn list_skills(
    State(state): State<AppState>,
    ApiPath(key): ApiPath<String>,
    ApiQuery(query): ApiQuery<PageQuery<RecordSort>>,
) -> Result<Json<Paginated<Skill>>, ApiError> {
    let page = page_request(query)?;
    let uid = resolve_user(&state, key).await?.id.to_string();
    Ok(Json(run_db(&state, move |db| db.list_skills(&uid, &page)).await?))
}

pub async fn create_skill(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    ApiPath(key): ApiPath<String>,
    ApiJson(input): ApiJson<SkillInput>,
) -> Result<impl IntoResponse, ApiError> {
    let user = editable_user(&state, &session, key).await?;
    input.validate().map_err(ApiError::BadRequest)?;

    let uid = user.id.to_string();
    let id = run_db(&state, move |db| db.create_skill(&uid, &input)).await?;
    let skill = run_db(&state, move |db| db.get_skill(id))
        .await?
        .ok_or(ApiError::NotFound("Skill"))?;
    Ok((StatusCode::CREATED, Json(skill)))
}

pub async fn update_skill(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<SkillInput>,
) -> Result<Json<Skill>, ApiError> {
    let existing = run_db(&state, move |db| db.get_skill(id))
        .await?
        .ok_or(ApiError::NotFound("Skill"))?;
    check_owner(&state, &session, existing.user_id).await?;
    input.validate().map_err(ApiError::BadRequest)?;

    run_db(&state, move |db| db.update_skill(id, &input)).await?;
    let skill = run_db(&state, move |db| db.get_skill(id))
        .await?
        .ok_or(ApiError::NotFound("Skill"))?;
    Ok(Json(skill))
}

pub async fn delete_skill(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    let existing = run_db(&state, move |db| db.get_skill(id))
        .await?
        .ok_or(ApiError::NotFound("Skill"))?;
    check_owner(&state, &session, existing.user_id).await?;
    run_db(&state, move |db| db.delete_skill(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// -- Projects --

async fn load_project(state: &AppState, id: i64) -> Result<Project, ApiError> {
    run_db(state, move |db| db.get_project(id))
        .await?
        .ok_or(ApiError::NotFound("Project"))
}

pub async fn list_projects(
    State(state): State<AppState>,
    ApiPath(key): ApiPath<String>,
    ApiQuery(query): ApiQuery<PageQuery<RecordSort>>,
) -> Result<Json<Paginated<Project>>, ApiError> {
    let page = page_request(query)?;
    let uid = resolve_user(&state, key).await?.id.to_string();
    Ok(Json(run_db(&state, move |db| db.list_projects(&uid, &page)).await?))
}

pub async fn get_project(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ProjectDetail>, ApiError> {
    let project = load_project(&state, id).await?;
    let owner_root = owner_is_root(&state, project.user_id).await?;
    Ok(Json(ProjectDetail {
        capabilities: profile_capabilities(session.as_ref(), project.user_id, owner_root),
        project,
    }))
}

pub async fn create_project(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    ApiPath(key): ApiPath<String>,
    ApiJson(input): ApiJson<ProjectInput>,
) -> Result<impl IntoResponse, ApiError> {
    let user = editable_user(&state, &session, key).await?;
    input.validate().map_err(ApiError::BadRequest)?;

    let uid = user.id.to_string();
    let id = run_db(&state, move |db| db.create_project(&uid, &input)).await?;
    let project = load_project(&state, id).await?;
    Ok((
        StatusCode::CREATED,
        Json(ProjectDetail {
            capabilities: profile_capabilities(Some(&session), project.user_id, user.is_root),
            project,
        }),
    ))
}

/// PUT /projects/{id}. The source list is replaced wholesale.
pub async fn update_project(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<ProjectInput>,
) -> Result<Json<ProjectDetail>, ApiError> {
    let existing = load_project(&state, id).await?;
    let owner_root = check_owner(&state, &session, existing.user_id).await?;
    input.validate().map_err(ApiError::BadRequest)?;

    run_db(&state, move |db| db.update_project(id, &input)).await?;
    let project = load_project(&state, id).await?;
    Ok(Json(ProjectDetail {
        capabilities: profile_capabilities(Some(&session), project.user_id, owner_root),
        project,
    }))
}

pub async fn delete_project(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    let existing = load_project(&state, id).await?;
    check_owner(&state, &session, existing.user_id).await?;
    run_db(&state, move |db| db.delete_project(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
