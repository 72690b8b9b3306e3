use anyhow::Result;
use deaconn_types::api::{LogSort, Paginated, UpdateLogInput};
use deaconn_types::models::{GitLog, GithubStats, UpdateLog};
use rusqlite::{Row, named_params};

use super::{OptionalExt, opt_uuid_col, timestamp_col};
use crate::Database;
use crate::pagination::{PageRequest, finish_page};

const STAT_GITHUB_REPOSITORIES: &str = "github_repositories";
const STAT_GITHUB_COMMITS: &str = "github_commits";

/// A commit ready to be stored.
pub struct NewGitLog<'a> {
    pub commit_id: &'a str,
    pub repo_name: &'a str,
    pub repo_branch: &'a str,
    pub message: &'a str,
    pub author_name: &'a str,
    pub author_username: &'a str,
    pub author_email: Option<&'a str>,
    pub user_id: Option<&'a str>,
}

fn map_git_log(row: &Row<'_>) -> rusqlite::Result<GitLog> {
    Ok(GitLog {
        id: row.get(0)?,
        commit_id: row.get(1)?,
        repo_name: row.get(2)?,
        repo_branch: row.get(3)?,
        message: row.get(4)?,
        author_name: row.get(5)?,
        author_username: row.get(6)?,
        author_email: row.get(7)?,
        user_id: opt_uuid_col(row, 8)?,
        created_at: timestamp_col(row, 9)?,
    })
}

fn map_update_log(row: &Row<'_>) -> rusqlite::Result<UpdateLog> {
    Ok(UpdateLog {
        id: row.get(0)?,
        user_id: opt_uuid_col(row, 1)?,
        version: row.get(2)?,
        message: row.get(3)?,
        created_at: timestamp_col(row, 4)?,
    })
}

impl Database {
    // -- Git log --

    pub fn insert_git_log(&self, log: &NewGitLog<'_>) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO git_logs (commit_id, repo_name, repo_branch, message, author_name,
                     author_username, author_email, user_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    log.commit_id,
                    log.repo_name,
                    log.repo_branch,
                    log.message,
                    log.author_name,
                    log.author_username,
                    log.author_email,
                    log.user_id,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn list_git_logs(&self, page: &PageRequest<LogSort>) -> Result<Paginated<GitLog>> {
        self.with_conn(|conn| {
            let keyset = page.keyset("git_logs", "g");
            let sql = format!(
                "SELECT g.id, g.commit_id, g.repo_name, g.repo_branch, g.message, g.author_name,
                     g.author_username, g.author_email, g.user_id, g.created_at
                 FROM git_logs g WHERE {} {} LIMIT :limit",
                keyset.predicate, keyset.order_by
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    named_params! { ":cursor": page.cursor, ":limit": page.fetch_limit() },
                    map_git_log,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(finish_page(rows, page.limit, |g| g.id))
        })
    }

    pub fn delete_git_log(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM git_logs WHERE id = ?1", [id])? > 0))
    }

    // -- Update log --

    pub fn insert_update_log(&self, user_id: Option<&str>, input: &UpdateLogInput) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO update_logs (user_id, version, message) VALUES (?1, ?2, ?3)",
                rusqlite::params![user_id, input.version, input.message],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_update_log(&self, id: i64) -> Result<Option<UpdateLog>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, user_id, version, message, created_at FROM update_logs WHERE id = ?1",
                [id],
                map_update_log,
            )
            .optional()
        })
    }

    pub fn list_update_logs(&self, page: &PageRequest<LogSort>) -> Result<Paginated<UpdateLog>> {
        self.with_conn(|conn| {
            let keyset = page.keyset("update_logs", "l");
            let sql = format!(
                "SELECT l.id, l.user_id, l.version, l.message, l.created_at
                 FROM update_logs l WHERE {} {} LIMIT :limit",
                keyset.predicate, keyset.order_by
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    named_params! { ":cursor": page.cursor, ":limit": page.fetch_limit() },
                    map_update_log,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(finish_page(rows, page.limit, |l| l.id))
        })
    }

    pub fn delete_update_log(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM update_logs WHERE id = ?1", [id])? > 0))
    }

    // -- Stats --

    /// Upsert whichever counters are present; absent ones keep their value.
    pub fn update_github_stats(&self, repositories: Option<i64>, commits: Option<i64>) -> Result<()> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "INSERT INTO stats (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )?;
            if let Some(value) = repositories {
                stmt.execute((STAT_GITHUB_REPOSITORIES, value))?;
            }
            if let Some(value) = commits {
                stmt.execute((STAT_GITHUB_COMMITS, value))?;
            }
            Ok(())
        })
    }

    pub fn github_stats(&self) -> Result<GithubStats> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT key, value FROM stats WHERE key IN (?1, ?2)")?;
            let rows = stmt.query_map((STAT_GITHUB_REPOSITORIES, STAT_GITHUB_COMMITS), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;

            let mut stats = GithubStats::default();
            for row in rows {
                let (key, value) = row?;
                match key.as_str() {
                    STAT_GITHUB_REPOSITORIES => stats.repositories = value,
                    STAT_GITHUB_COMMITS => stats.commits = value,
                    _ => {}
                }
            }
            Ok(stats)
        })
    }
}
