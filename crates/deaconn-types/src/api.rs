use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::categories::CategoryRow;
use crate::models::{
    Article, FooterItem, Project, Request, RequestReply, RequestStatus, Service, User,
};
use crate::policy::Capabilities;
use crate::roles::Role;

// -- JWT Claims --

/// Session token claims. Roles are deliberately absent: they are loaded from
/// the database on every request so role edits apply immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub name: Option<String>,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub name: Option<String>,
    pub token: String,
}

// -- Pagination --

pub const DEFAULT_PAGE_LIMIT: u32 = 10;
pub const MAX_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Query-string shape shared by every list endpoint. `sort` only accepts the
/// variants of the endpoint's sort enum, so arbitrary columns are rejected
/// before they reach the database.
#[derive(Debug, Deserialize)]
pub struct PageQuery<S, C = i64> {
    pub limit: Option<u32>,
    pub cursor: Option<C>,
    pub sort: Option<S>,
    pub direction: Option<SortDirection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T, C = i64> {
    pub items: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub next_cursor: Option<C>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleSort {
    Id,
    #[default]
    CreatedAt,
    UpdatedAt,
    Views,
    Title,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceSort {
    Id,
    #[default]
    CreatedAt,
    Views,
    Name,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestSort {
    Id,
    CreatedAt,
    #[default]
    UpdatedAt,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserSort {
    #[default]
    CreatedAt,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartnerSort {
    Id,
    #[default]
    Priority,
    CreatedAt,
    Name,
}

/// Logs are append-only, so id order is creation order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSort {
    #[default]
    Id,
}

/// Profile child records (experiences, skills, projects).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSort {
    #[default]
    Id,
    Title,
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryFilter {
    pub category: Option<i64>,
}

// -- Validation --

pub const MAX_SLUG_LEN: usize = 128;

/// Slugs are lowercase ASCII letters, digits and single inner dashes.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= MAX_SLUG_LEN
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

fn require(value: &str, field: &str, max: usize) -> Result<(), String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(format!("{field} is required"));
    }
    if trimmed.chars().count() > max {
        return Err(format!("{field} must be at most {max} characters"));
    }
    Ok(())
}

fn slug(value: &str, field: &str) -> Result<(), String> {
    if is_valid_slug(value) {
        Ok(())
    } else {
        Err(format!(
            "{field} must be lowercase letters, digits and dashes (max {MAX_SLUG_LEN})"
        ))
    }
}

fn web_link(value: Option<&str>, field: &str) -> Result<(), String> {
    match value {
        Some(v) if !(v.starts_with("https://") || v.starts_with("http://")) => {
            Err(format!("{field} must be an http(s) URL"))
        }
        _ => Ok(()),
    }
}

// -- Blog --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArticleInput {
    pub url: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub banner: Option<String>,
    pub category_id: Option<i64>,
}

impl ArticleInput {
    pub fn validate(&self) -> Result<(), String> {
        slug(&self.url, "url")?;
        require(&self.title, "title", 128)?;
        require(&self.description, "description", 512)?;
        require(&self.content, "content", 65_536)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleDetail {
    #[serde(flatten)]
    pub article: Article,
    pub capabilities: Capabilities,
}

// -- Services --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceInput {
    pub url: String,
    pub name: String,
    pub description: String,
    pub content: String,
    pub price: Option<f64>,
    pub banner: Option<String>,
    pub icon: Option<String>,
    pub category_id: Option<i64>,
}

impl ServiceInput {
    pub fn validate(&self) -> Result<(), String> {
        slug(&self.url, "url")?;
        require(&self.name, "name", 128)?;
        require(&self.description, "description", 512)?;
        require(&self.content, "content", 65_536)?;
        match self.price {
            Some(p) if !p.is_finite() || p < 0.0 => Err("price must be a non-negative number".into()),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDetail {
    #[serde(flatten)]
    pub service: Service,
    pub capabilities: Capabilities,
}

// -- Categories --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategoryInput {
    pub parent_id: Option<i64>,
    pub name: String,
    pub url: String,
    pub description: Option<String>,
}

impl CategoryInput {
    pub fn validate(&self) -> Result<(), String> {
        require(&self.name, "name", 64)?;
        slug(&self.url, "url")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryList {
    pub rows: Vec<CategoryRow>,
}

// -- Requests --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestInput {
    pub title: String,
    pub content: String,
    pub service_id: Option<i64>,
}

impl RequestInput {
    pub fn validate(&self) -> Result<(), String> {
        require(&self.title, "title", 128)?;
        require(&self.content, "content", 16_384)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub status: Option<RequestStatus>,
    pub accepted: Option<bool>,
}

impl RequestUpdate {
    pub fn touches_moderation(&self) -> bool {
        self.status.is_some() || self.accepted.is_some()
    }

    pub fn touches_content(&self) -> bool {
        self.title.is_some() || self.content.is_some()
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(title) = &self.title {
            require(title, "title", 128)?;
        }
        if let Some(content) = &self.content {
            require(content, "content", 16_384)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplyInput {
    pub content: String,
}

impl ReplyInput {
    pub fn validate(&self) -> Result<(), String> {
        require(&self.content, "content", 16_384)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestDetail {
    #[serde(flatten)]
    pub request: Request,
    pub replies: Vec<RequestReply>,
    pub capabilities: Capabilities,
}

// -- Users --

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileInput {
    pub name: Option<String>,
    pub url: Option<String>,
    pub image: Option<String>,
    pub bio: Option<String>,
    pub birthday: Option<String>,
    pub website: Option<String>,
    pub github: Option<String>,
    pub linkedin: Option<String>,
    pub twitter: Option<String>,
}

impl ProfileInput {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.name {
            require(name, "name", 64)?;
        }
        if let Some(url) = &self.url {
            slug(url, "url")?;
            // Vanity urls must not be mistaken for user ids.
            if url.parse::<Uuid>().is_ok() {
                return Err("url must not look like a user id".into());
            }
        }
        if let Some(bio) = &self.bio {
            if bio.chars().count() > 2048 {
                return Err("bio must be at most 2048 characters".into());
            }
        }
        if let Some(birthday) = &self.birthday {
            chrono::NaiveDate::parse_from_str(birthday, "%Y-%m-%d")
                .map_err(|_| "birthday must be YYYY-MM-DD".to_string())?;
        }
        web_link(self.website.as_deref(), "website")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub user: User,
    pub capabilities: Capabilities,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExperienceInput {
    pub title: String,
    pub description: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub details: Option<String>,
}

impl ExperienceInput {
    pub fn validate(&self) -> Result<(), String> {
        require(&self.title, "title", 128)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SkillInput {
    pub title: String,
    pub description: Option<String>,
    pub hours: Option<i64>,
}

impl SkillInput {
    pub fn validate(&self) -> Result<(), String> {
        require(&self.title, "title", 64)?;
        match self.hours {
            Some(h) if h < 0 => Err("hours must not be negative".into()),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectSourceInput {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectInput {
    pub name: String,
    pub description: Option<String>,
    pub details: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default)]
    pub sources: Vec<ProjectSourceInput>,
}

impl ProjectInput {
    pub fn validate(&self) -> Result<(), String> {
        require(&self.name, "name", 128)?;
        if self.sources.len() > 16 {
            return Err("a project can have at most 16 sources".into());
        }
        for source in &self.sources {
            require(&source.title, "source title", 64)?;
            web_link(Some(&source.url), "source url")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub capabilities: Capabilities,
}

// -- Admin --

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserAdminUpdate {
    pub roles: Option<Vec<Role>>,
    pub is_team: Option<bool>,
    pub is_restricted: Option<bool>,
}

// -- Partners --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartnerInput {
    pub name: String,
    pub url: String,
    pub description: Option<String>,
    pub banner: Option<String>,
    pub icon: Option<String>,
    pub website: Option<String>,
    #[serde(default)]
    pub priority: i64,
}

impl PartnerInput {
    pub fn validate(&self) -> Result<(), String> {
        require(&self.name, "name", 128)?;
        slug(&self.url, "url")?;
        web_link(self.website.as_deref(), "website")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Footer {
    pub services: Vec<FooterItem>,
    pub partners: Vec<FooterItem>,
}

// -- Logs --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateLogInput {
    pub version: Option<String>,
    pub message: String,
}

impl UpdateLogInput {
    pub fn validate(&self) -> Result<(), String> {
        require(&self.message, "message", 4096)
    }
}

// -- Webhooks --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitWebhook {
    pub action: String,
    pub repository: Option<WebhookRepository>,
    /// Left raw so one malformed commit cannot reject the whole push; each
    /// entry is read as a [`WebhookCommit`] when it is stored.
    #[serde(default)]
    pub commits: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookRepository {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookCommit {
    pub id: String,
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
    pub message: String,
    pub author: CommitAuthor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitAuthor {
    pub name: String,
    pub username: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GithubStatsUpdate {
    pub repositories: Option<i64>,
    pub commits: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddRoleRequest {
    pub user_id: Uuid,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MakeRootRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

// -- Files --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub name: String,
    pub url: String,
    pub size: u64,
}

// -- Errors --

/// Error payload rendered as a titled banner by clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub title: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs() {
        assert!(is_valid_slug("hello-world-2"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("Hello"));
        assert!(!is_valid_slug("-lead"));
        assert!(!is_valid_slug("trail-"));
        assert!(!is_valid_slug("double--dash"));
        assert!(!is_valid_slug("../etc"));
        assert!(!is_valid_slug(&"a".repeat(MAX_SLUG_LEN + 1)));
    }

    #[test]
    fn article_input_validation() {
        let mut input = ArticleInput {
            url: "first-post".into(),
            title: "First".into(),
            description: "desc".into(),
            content: "body".into(),
            banner: None,
            category_id: None,
        };
        assert!(input.validate().is_ok());

        input.title = "   ".into();
        assert_eq!(input.validate().unwrap_err(), "title is required");
    }

    #[test]
    fn profile_rejects_uuid_like_url_and_bad_birthday() {
        let input = ProfileInput {
            url: Some(Uuid::new_v4().to_string()),
            ..Default::default()
        };
        assert!(input.validate().is_err());

        let input = ProfileInput {
            birthday: Some("31/12/1999".into()),
            ..Default::default()
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn page_query_rejects_unknown_sort_field() {
        let ok: Result<PageQuery<ArticleSort>, _> =
            serde_json::from_str(r#"{"limit":5,"sort":"views","direction":"asc"}"#);
        let ok = ok.unwrap();
        assert_eq!(ok.sort, Some(ArticleSort::Views));
        assert_eq!(ok.direction, Some(SortDirection::Asc));

        let bad: Result<PageQuery<ArticleSort>, _> =
            serde_json::from_str(r#"{"sort":"password"}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn webhook_commit_reads_ref_field() {
        let commit: WebhookCommit = serde_json::from_str(
            r#"{"id":"abc","ref":"refs/heads/main","message":"fix","author":{"name":"A","username":"a"}}"#,
        )
        .unwrap();
        assert_eq!(commit.git_ref.as_deref(), Some("refs/heads/main"));
        assert!(commit.author.email.is_none());
    }
}
