use anyhow::Result;
use deaconn_types::api::{Paginated, PartnerInput, PartnerSort};
use deaconn_types::models::{FooterItem, Partner};
use rusqlite::{Row, named_params};

use super::{OptionalExt, timestamp_col};
use crate::Database;
use crate::pagination::{PageRequest, finish_page};

const PARTNER_COLUMNS: &str =
    "p.id, p.name, p.url, p.description, p.banner, p.icon, p.website, p.priority, p.created_at";

fn map_partner(row: &Row<'_>) -> rusqlite::Result<Partner> {
    Ok(Partner {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        description: row.get(3)?,
        banner: row.get(4)?,
        icon: row.get(5)?,
        website: row.get(6)?,
        priority: row.get(7)?,
        created_at: timestamp_col(row, 8)?,
    })
}

impl Database {
    pub fn create_partner(&self, input: &PartnerInput) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO partners (name, url, description, banner, icon, website, priority)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    input.name,
                    input.url,
                    input.description,
                    input.banner,
                    input.icon,
                    input.website,
                    input.priority,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn update_partner(&self, id: i64, input: &PartnerInput) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE partners SET name = ?2, url = ?3, description = ?4, banner = ?5,
                     icon = ?6, website = ?7, priority = ?8
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    input.name,
                    input.url,
                    input.description,
                    input.banner,
                    input.icon,
                    input.website,
                    input.priority,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_partner(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM partners WHERE id = ?1", [id])? > 0))
    }

    pub fn get_partner_by_url(&self, url: &str) -> Result<Option<Partner>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {PARTNER_COLUMNS} FROM partners p WHERE p.url = ?1");
            conn.query_row(&sql, [url], map_partner).optional()
        })
    }

    pub fn list_partners(&self, page: &PageRequest<PartnerSort>) -> Result<Paginated<Partner>> {
        self.with_conn(|conn| {
            let keyset = page.keyset("partners", "p");
            let sql = format!(
                "SELECT {PARTNER_COLUMNS} FROM partners p WHERE {} {} LIMIT :limit",
                keyset.predicate, keyset.order_by
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    named_params! { ":cursor": page.cursor, ":limit": page.fetch_limit() },
                    map_partner,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(finish_page(rows, page.limit, |p| p.id))
        })
    }

    /// Footer links, highest priority first.
    pub fn footer_partners(&self, limit: u32) -> Result<Vec<FooterItem>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, url FROM partners ORDER BY priority DESC, id ASC LIMIT ?1",
            )?;
            let rows = stmt
                .query_map([limit], |row| {
                    Ok(FooterItem {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        url: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}
