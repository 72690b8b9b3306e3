use anyhow::Result;
use deaconn_types::api::{ArticleInput, ArticleSort, Paginated, ServiceInput, ServiceSort};
use deaconn_types::models::{Article, FooterItem, Service};
use rusqlite::{Connection, Row, named_params};

use super::{OptionalExt, timestamp_col, uuid_col};
use crate::Database;
use crate::models::SitemapEntry;
use crate::pagination::{PageRequest, finish_page};

const ARTICLE_COLUMNS: &str = "a.id, a.user_id, u.name, a.category_id, a.url, a.title, \
     a.description, a.content, a.banner, a.views, a.created_at, a.updated_at";

const SERVICE_COLUMNS: &str = "s.id, s.user_id, s.category_id, s.url, s.name, s.description, \
     s.content, s.price, s.banner, s.icon, s.views, s.created_at, s.updated_at";

fn map_article(row: &Row<'_>) -> rusqlite::Result<Article> {
    Ok(Article {
        id: row.get(0)?,
        user_id: uuid_col(row, 1)?,
        author_name: row.get(2)?,
        category_id: row.get(3)?,
        url: row.get(4)?,
        title: row.get(5)?,
        description: row.get(6)?,
        content: row.get(7)?,
        banner: row.get(8)?,
        views: row.get(9)?,
        created_at: timestamp_col(row, 10)?,
        updated_at: timestamp_col(row, 11)?,
    })
}

fn map_service(row: &Row<'_>) -> rusqlite::Result<Service> {
    Ok(Service {
        id: row.get(0)?,
        user_id: uuid_col(row, 1)?,
        category_id: row.get(2)?,
        url: row.get(3)?,
        name: row.get(4)?,
        description: row.get(5)?,
        content: row.get(6)?,
        price: row.get(7)?,
        banner: row.get(8)?,
        icon: row.get(9)?,
        views: row.get(10)?,
        created_at: timestamp_col(row, 11)?,
        updated_at: timestamp_col(row, 12)?,
    })
}

impl Database {
    // -- Articles --

    pub fn create_article(&self, user_id: &str, input: &ArticleInput) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO articles (user_id, category_id, url, title, description, content, banner)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    user_id,
                    input.category_id,
                    input.url,
                    input.title,
                    input.description,
                    input.content,
                    input.banner,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn update_article(&self, id: i64, input: &ArticleInput) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE articles SET category_id = ?2, url = ?3, title = ?4, description = ?5,
                     content = ?6, banner = ?7, updated_at = datetime('now')
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    input.category_id,
                    input.url,
                    input.title,
                    input.description,
                    input.content,
                    input.banner,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_article(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM articles WHERE id = ?1", [id])? > 0))
    }

    pub fn get_article(&self, id: i64) -> Result<Option<Article>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {ARTICLE_COLUMNS} FROM articles a LEFT JOIN users u ON u.id = a.user_id
                 WHERE a.id = ?1"
            );
            conn.query_row(&sql, [id], map_article).optional()
        })
    }

    /// Fetch by slug and count the visit.
    pub fn view_article(&self, url: &str) -> Result<Option<Article>> {
        self.with_conn(|conn| {
            bump_views(conn, "articles", url)?;
            let sql = format!(
                "SELECT {ARTICLE_COLUMNS} FROM articles a LEFT JOIN users u ON u.id = a.user_id
                 WHERE a.url = ?1"
            );
            conn.query_row(&sql, [url], map_article).optional()
        })
    }

    pub fn list_articles(
        &self,
        page: &PageRequest<ArticleSort>,
        category_id: Option<i64>,
    ) -> Result<Paginated<Article>> {
        self.with_conn(|conn| {
            let keyset = page.keyset("articles", "a");
            let sql = format!(
                "SELECT {ARTICLE_COLUMNS} FROM articles a LEFT JOIN users u ON u.id = a.user_id
                 WHERE {} AND (:category IS NULL OR a.category_id = :category)
                 {} LIMIT :limit",
                keyset.predicate, keyset.order_by
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    named_params! {
                        ":cursor": page.cursor,
                        ":category": category_id,
                        ":limit": page.fetch_limit(),
                    },
                    map_article,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(finish_page(rows, page.limit, |a| a.id))
        })
    }

    pub fn article_sitemap(&self) -> Result<Vec<SitemapEntry>> {
        self.with_conn(|conn| sitemap_entries(conn, "articles"))
    }

    // -- Services --

    pub fn create_service(&self, user_id: &str, input: &ServiceInput) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO services
                     (user_id, category_id, url, name, description, content, price, banner, icon)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    user_id,
                    input.category_id,
                    input.url,
                    input.name,
                    input.description,
                    input.content,
                    input.price,
                    input.banner,
                    input.icon,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn update_service(&self, id: i64, input: &ServiceInput) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE services SET category_id = ?2, url = ?3, name = ?4, description = ?5,
                     content = ?6, price = ?7, banner = ?8, icon = ?9, updated_at = datetime('now')
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    input.category_id,
                    input.url,
                    input.name,
                    input.description,
                    input.content,
                    input.price,
                    input.banner,
                    input.icon,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_service(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM services WHERE id = ?1", [id])? > 0))
    }

    pub fn get_service(&self, id: i64) -> Result<Option<Service>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {SERVICE_COLUMNS} FROM services s WHERE s.id = ?1");
            conn.query_row(&sql, [id], map_service).optional()
        })
    }

    pub fn view_service(&self, url: &str) -> Result<Option<Service>> {
        self.with_conn(|conn| {
            bump_views(conn, "services", url)?;
            let sql = format!("SELECT {SERVICE_COLUMNS} FROM services s WHERE s.url = ?1");
            conn.query_row(&sql, [url], map_service).optional()
        })
    }

    pub fn list_services(
        &self,
        page: &PageRequest<ServiceSort>,
        category_id: Option<i64>,
    ) -> Result<Paginated<Service>> {
        self.with_conn(|conn| {
            let keyset = page.keyset("services", "s");
            let sql = format!(
                "SELECT {SERVICE_COLUMNS} FROM services s
                 WHERE {} AND (:category IS NULL OR s.category_id = :category)
                 {} LIMIT :limit",
                keyset.predicate, keyset.order_by
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    named_params! {
                        ":cursor": page.cursor,
                        ":category": category_id,
                        ":limit": page.fetch_limit(),
                    },
                    map_service,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(finish_page(rows, page.limit, |s| s.id))
        })
    }

    /// Footer links, most viewed first.
    pub fn footer_services(&self, limit: u32) -> Result<Vec<FooterItem>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, url FROM services ORDER BY views DESC, id ASC LIMIT ?1",
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

    pub fn service_exists(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row("SELECT 1 FROM services WHERE id = ?1", [id], |_| Ok(()))
                .optional()?;
            Ok(found.is_some())
        })
    }

    pub fn service_sitemap(&self) -> Result<Vec<SitemapEntry>> {
        self.with_conn(|conn| sitemap_entries(conn, "services"))
    }
}

/// `table` is always a literal from this module.
fn bump_views(conn: &Connection, table: &str, url: &str) -> Result<()> {
    conn.execute(&format!("UPDATE {table} SET views = views + 1 WHERE url = ?1"), [url])?;
    Ok(())
}

fn sitemap_entries(conn: &Connection, table: &str) -> Result<Vec<SitemapEntry>> {
    let mut stmt = conn.prepare(&format!("SELECT url, updated_at FROM {table} ORDER BY id"))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(SitemapEntry {
                url: row.get(0)?,
                updated_at: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::is_constraint_violation;

    const AUTHOR: &str = "0b5b0d0e-8c55-4a4d-8f0e-0b4a0c9d8e11";

    fn setup() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_user(AUTHOR, "author@example.com", "hash", Some("Author")).unwrap();
        db
    }

    fn article(url: &str) -> ArticleInput {
        ArticleInput {
            url: url.into(),
            title: format!("Title {url}"),
            description: "desc".into(),
            content: "body".into(),
            banner: None,
            category_id: None,
        }
    }

    #[test]
    fn viewing_an_article_counts_visits() {
        let db = setup();
        db.create_article(AUTHOR, &article("hello")).unwrap();

        db.view_article("hello").unwrap().unwrap();
        let seen = db.view_article("hello").unwrap().unwrap();
        assert_eq!(seen.views, 2);
        assert_eq!(seen.author_name.as_deref(), Some("Author"));

        assert!(db.view_article("missing").unwrap().is_none());
    }

    #[test]
    fn duplicate_slug_is_rejected() {
        let db = setup();
        db.create_article(AUTHOR, &article("same")).unwrap();
        let err = db.create_article(AUTHOR, &article("same")).unwrap_err();
        assert!(is_constraint_violation(&err));
    }

    #[test]
    fn update_and_delete_report_missing_rows() {
        let db = setup();
        let id = db.create_article(AUTHOR, &article("one")).unwrap();

        let mut changed = article("one-renamed");
        changed.title = "Renamed".into();
        assert!(db.update_article(id, &changed).unwrap());
        assert_eq!(db.get_article(id).unwrap().unwrap().url, "one-renamed");

        assert!(!db.update_article(id + 100, &changed).unwrap());
        assert!(db.delete_article(id).unwrap());
        assert!(!db.delete_article(id).unwrap());
    }

    #[test]
    fn services_footer_prefers_popular() {
        let db = setup();
        for url in ["web", "hosting", "design"] {
            db.create_service(
                AUTHOR,
                &ServiceInput {
                    url: url.into(),
                    name: url.to_uppercase(),
                    description: "d".into(),
                    content: "c".into(),
                    price: Some(10.0),
                    banner: None,
                    icon: None,
                    category_id: None,
                },
            )
            .unwrap();
        }
        db.view_service("design").unwrap();

        let footer = db.footer_services(2).unwrap();
        let urls: Vec<_> = footer.iter().map(|f| f.url.as_str()).collect();
        assert_eq!(urls, vec!["design", "web"]);
    }
}
