use anyhow::Result;
use deaconn_types::api::{Paginated, RequestInput, RequestSort, RequestUpdate};
use deaconn_types::models::{Request, RequestReply, RequestStatus};
use rusqlite::{Row, named_params};
use tracing::warn;

use super::{OptionalExt, timestamp_col, uuid_col};
use crate::Database;
use crate::pagination::{PageRequest, finish_page};

const REQUEST_COLUMNS: &str = "r.id, r.user_id, r.service_id, r.title, r.content, r.status, \
     r.accepted, r.created_at, r.updated_at";

const REPLY_COLUMNS: &str = "p.id, p.request_id, p.user_id, u.name, p.content, p.created_at";

fn map_request(row: &Row<'_>) -> rusqlite::Result<Request> {
    let id: i64 = row.get(0)?;
    let status: String = row.get(5)?;
    Ok(Request {
        id,
        user_id: uuid_col(row, 1)?,
        service_id: row.get(2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        status: status.parse().unwrap_or_else(|e| {
            warn!("Request {}: {}", id, e);
            RequestStatus::Open
        }),
        accepted: row.get(6)?,
        created_at: timestamp_col(row, 7)?,
        updated_at: timestamp_col(row, 8)?,
    })
}

fn map_reply(row: &Row<'_>) -> rusqlite::Result<RequestReply> {
    Ok(RequestReply {
        id: row.get(0)?,
        request_id: row.get(1)?,
        user_id: uuid_col(row, 2)?,
        author_name: row.get(3)?,
        content: row.get(4)?,
        created_at: timestamp_col(row, 5)?,
    })
}

impl Database {
    pub fn create_request(&self, user_id: &str, input: &RequestInput) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO requests (user_id, service_id, title, content) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![user_id, input.service_id, input.title, input.content],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_request(&self, id: i64) -> Result<Option<Request>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {REQUEST_COLUMNS} FROM requests r WHERE r.id = ?1");
            conn.query_row(&sql, [id], map_request).optional()
        })
    }

    /// `owner` limits the listing to one user's requests.
    pub fn list_requests(
        &self,
        page: &PageRequest<RequestSort>,
        owner: Option<&str>,
    ) -> Result<Paginated<Request>> {
        self.with_conn(|conn| {
            let keyset = page.keyset("requests", "r");
            let sql = format!(
                "SELECT {REQUEST_COLUMNS} FROM requests r
                 WHERE {} AND (:owner IS NULL OR r.user_id = :owner)
                 {} LIMIT :limit",
                keyset.predicate, keyset.order_by
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    named_params! {
                        ":cursor": page.cursor,
                        ":owner": owner,
                        ":limit": page.fetch_limit(),
                    },
                    map_request,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(finish_page(rows, page.limit, |r| r.id))
        })
    }

    /// Apply the fields present in `update`.
    pub fn update_request(&self, id: i64, update: &RequestUpdate) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE requests SET
                     title = COALESCE(?2, title),
                     content = COALESCE(?3, content),
                     status = COALESCE(?4, status),
                     accepted = COALESCE(?5, accepted),
                     updated_at = datetime('now')
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    update.title,
                    update.content,
                    update.status.map(|s| s.as_str()),
                    update.accepted,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_request(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM requests WHERE id = ?1", [id])? > 0))
    }

    pub fn add_reply(&self, request_id: i64, user_id: &str, content: &str) -> Result<i64> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO request_replies (request_id, user_id, content) VALUES (?1, ?2, ?3)",
                rusqlite::params![request_id, user_id, content],
            )?;
            let id = tx.last_insert_rowid();
            tx.execute(
                "UPDATE requests SET updated_at = datetime('now') WHERE id = ?1",
                [request_id],
            )?;
            tx.commit()?;
            Ok(id)
        })
    }

    /// Replies in the order they were written.
    pub fn list_replies(&self, request_id: i64) -> Result<Vec<RequestReply>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {REPLY_COLUMNS} FROM request_replies p LEFT JOIN users u ON u.id = p.user_id
                 WHERE p.request_id = ?1 ORDER BY p.created_at ASC, p.id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([request_id], map_reply)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_reply(&self, id: i64) -> Result<Option<RequestReply>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {REPLY_COLUMNS} FROM request_replies p LEFT JOIN users u ON u.id = p.user_id
                 WHERE p.id = ?1"
            );
            conn.query_row(&sql, [id], map_reply).optional()
        })
    }

    pub fn delete_reply(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM request_replies WHERE id = ?1", [id])? > 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: &str = "4c1f0a7e-0e2c-4b8e-9b4a-7d1e2c3b4a55";
    const OTHER: &str = "4c1f0a7e-0e2c-4b8e-9b4a-7d1e2c3b4a56";

    fn setup() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_user(OWNER, "owner@example.com", "h", Some("Owner")).unwrap();
        db.create_user(OTHER, "other@example.com", "h", None).unwrap();
        db
    }

    fn input(title: &str) -> RequestInput {
        RequestInput {
            title: title.into(),
            content: "please help".into(),
            service_id: None,
        }
    }

    #[test]
    fn owner_filter_limits_listing() {
        let db = setup();
        db.create_request(OWNER, &input("mine")).unwrap();
        db.create_request(OTHER, &input("theirs")).unwrap();

        let page = PageRequest::<RequestSort>::new(10);
        assert_eq!(db.list_requests(&page, Some(OWNER)).unwrap().items.len(), 1);
        assert_eq!(db.list_requests(&page, None).unwrap().items.len(), 2);
    }

    #[test]
    fn moderation_update_keeps_other_fields() {
        let db = setup();
        let id = db.create_request(OWNER, &input("site down")).unwrap();

        let update = RequestUpdate {
            status: Some(RequestStatus::Pending),
            accepted: Some(true),
            ..Default::default()
        };
        assert!(db.update_request(id, &update).unwrap());

        let request = db.get_request(id).unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Pending);
        assert!(request.accepted);
        assert_eq!(request.title, "site down");
    }

    #[test]
    fn replies_are_ordered_and_cascade() {
        let db = setup();
        let id = db.create_request(OWNER, &input("question")).unwrap();
        db.add_reply(id, OWNER, "first").unwrap();
        db.add_reply(id, OTHER, "second").unwrap();

        let replies = db.list_replies(id).unwrap();
        let contents: Vec<_> = replies.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);
        assert_eq!(replies[0].author_name.as_deref(), Some("Owner"));

        assert!(db.delete_request(id).unwrap());
        assert!(db.get_reply(replies[0].id).unwrap().is_none());
    }
}
