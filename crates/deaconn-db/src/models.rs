/// Database-only row types. Public entities map straight into
/// `deaconn_types::models`; these carry data that never leaves the server.

/// Login credentials for the local session provider.
pub struct CredentialRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

/// Category row with the number of articles or services filed under it.
pub struct CategoryCountRow {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub name: String,
    pub url: String,
    pub count: i64,
}

/// What a category count aggregates over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountKind {
    Articles,
    Services,
}

impl CountKind {
    pub fn table(self) -> &'static str {
        match self {
            CountKind::Articles => "articles",
            CountKind::Services => "services",
        }
    }
}

/// A `<url>` entry of the sitemap.
pub struct SitemapEntry {
    pub url: String,
    pub updated_at: String,
}
