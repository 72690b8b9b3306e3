mod categories;
mod content;
mod logs;
mod partners;
mod profile;
mod requests;
mod users;

pub use logs::NewGitLog;

use chrono::{DateTime, NaiveDateTime, Utc};
use deaconn_types::Role;
use rusqlite::Row;
use tracing::warn;
use uuid::Uuid;

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

pub(crate) fn parse_uuid(raw: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt user id '{}': {}", raw, e);
        Uuid::default()
    })
}

/// Roles arrive as a `group_concat` of the user's `user_roles` rows.
pub(crate) fn parse_roles(raw: Option<String>) -> Vec<Role> {
    let mut roles: Vec<Role> = raw
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse() {
            Ok(role) => Some(role),
            Err(e) => {
                warn!("Ignoring stored role: {}", e);
                None
            }
        })
        .collect();
    roles.sort_by_key(|r| r.priority());
    roles
}

pub(crate) fn timestamp_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    Ok(parse_timestamp(&row.get::<_, String>(idx)?))
}

pub(crate) fn uuid_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    Ok(parse_uuid(&row.get::<_, String>(idx)?))
}

pub(crate) fn opt_uuid_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    Ok(row.get::<_, Option<String>>(idx)?.as_deref().map(parse_uuid))
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> anyhow::Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> anyhow::Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sqlite_and_rfc3339_timestamps() {
        let naive = parse_timestamp("2024-03-01 12:30:00");
        assert_eq!(naive.to_rfc3339(), "2024-03-01T12:30:00+00:00");

        let rfc = parse_timestamp("2024-03-01T12:30:00Z");
        assert_eq!(rfc, naive);

        assert_eq!(parse_timestamp("garbage"), DateTime::<Utc>::default());
    }

    #[test]
    fn roles_are_parsed_and_ordered() {
        let roles = parse_roles(Some("user,admin,bogus,contributor".into()));
        assert_eq!(roles, vec![Role::Admin, Role::Contributor, Role::User]);
        assert!(parse_roles(None).is_empty());
    }
}
