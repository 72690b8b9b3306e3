use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::roles::{HasRoles, Role};

/// Public view of a user. Email and credentials never leave the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: Option<String>,
    pub url: Option<String>,
    pub image: Option<String>,
    pub bio: Option<String>,
    pub birthday: Option<String>,
    pub website: Option<String>,
    pub github: Option<String>,
    pub linkedin: Option<String>,
    pub twitter: Option<String>,
    pub roles: Vec<Role>,
    pub is_team: bool,
    pub is_restricted: bool,
    pub is_root: bool,
    pub created_at: DateTime<Utc>,
}

impl HasRoles for User {
    fn roles(&self) -> &[Role] {
        &self.roles
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub name: String,
    pub url: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub user_id: Uuid,
    pub author_name: Option<String>,
    pub category_id: Option<i64>,
    pub url: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub banner: Option<String>,
    pub views: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: i64,
    pub user_id: Uuid,
    pub category_id: Option<i64>,
    pub url: String,
    pub name: String,
    pub description: String,
    pub content: String,
    pub price: Option<f64>,
    pub banner: Option<String>,
    pub icon: Option<String>,
    pub views: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Open,
    Pending,
    Completed,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Open => "open",
            RequestStatus::Pending => "pending",
            RequestStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(RequestStatus::Open),
            "pending" => Ok(RequestStatus::Pending),
            "completed" => Ok(RequestStatus::Completed),
            other => Err(format!("unknown request status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: i64,
    pub user_id: Uuid,
    pub service_id: Option<i64>,
    pub title: String,
    pub content: String,
    pub status: RequestStatus,
    pub accepted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestReply {
    pub id: i64,
    pub request_id: i64,
    pub user_id: Uuid,
    pub author_name: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Partner {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub description: Option<String>,
    pub banner: Option<String>,
    pub icon: Option<String>,
    pub website: Option<String>,
    pub priority: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experience {
    pub id: i64,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    pub id: i64,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub hours: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSource {
    pub id: i64,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub details: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub sources: Vec<ProjectSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitLog {
    pub id: i64,
    pub commit_id: String,
    pub repo_name: String,
    pub repo_branch: String,
    pub message: String,
    pub author_name: String,
    pub author_username: String,
    pub author_email: Option<String>,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateLog {
    pub id: i64,
    pub user_id: Option<Uuid>,
    pub version: Option<String>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Lightweight projection of a service or partner shown on every page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FooterItem {
    pub id: i64,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubStats {
    pub repositories: i64,
    pub commits: i64,
}
