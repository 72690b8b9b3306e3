use std::collections::HashMap;

use anyhow::Result;
use deaconn_types::api::CategoryInput;
use deaconn_types::categories::CategoryNode;
use deaconn_types::models::Category;
use rusqlite::Row;

use super::OptionalExt;
use crate::Database;
use crate::models::{CategoryCountRow, CountKind};

fn map_category(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        parent_id: row.get(1)?,
        name: row.get(2)?,
        url: row.get(3)?,
        description: row.get(4)?,
    })
}

impl Database {
    pub fn create_category(&self, input: &CategoryInput) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO categories (parent_id, name, url, description) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![input.parent_id, input.name, input.url, input.description],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn update_category(&self, id: i64, input: &CategoryInput) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE categories SET parent_id = ?2, name = ?3, url = ?4, description = ?5
                 WHERE id = ?1",
                rusqlite::params![id, input.parent_id, input.name, input.url, input.description],
            )?;
            Ok(changed > 0)
        })
    }

    /// Items filed under the category are detached and its children become
    /// top-level.
    pub fn delete_category(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM categories WHERE id = ?1", [id])? > 0))
    }

    pub fn get_category(&self, id: i64) -> Result<Option<Category>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, parent_id, name, url, description FROM categories WHERE id = ?1",
                [id],
                map_category,
            )
            .optional()
        })
    }

    pub fn list_categories(&self) -> Result<Vec<Category>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, parent_id, name, url, description FROM categories ORDER BY id")?;
            let rows = stmt
                .query_map([], map_category)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn category_has_children(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row("SELECT 1 FROM categories WHERE parent_id = ?1 LIMIT 1", [id], |_| Ok(()))
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Top-level categories with their direct children, each carrying the
    /// number of articles or services filed directly under it.
    pub fn category_tree(&self, kind: CountKind) -> Result<Vec<CategoryNode>> {
        let rows = self.with_conn(|conn| {
            let sql = format!(
                "SELECT c.id, c.parent_id, c.name, c.url,
                     (SELECT COUNT(*) FROM {} i WHERE i.category_id = c.id)
                 FROM categories c ORDER BY c.id",
                kind.table()
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(CategoryCountRow {
                        id: row.get(0)?,
                        parent_id: row.get(1)?,
                        name: row.get(2)?,
                        url: row.get(3)?,
                        count: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        Ok(build_tree(rows))
    }
}

fn node(row: CategoryCountRow) -> CategoryNode {
    CategoryNode {
        id: row.id,
        name: row.name,
        url: row.url,
        count: row.count,
        children: Vec::new(),
    }
}

/// Attach rows to their top-level parent, keeping row order at both levels.
/// Rows nested deeper than one level are not part of the display tree.
fn build_tree(rows: Vec<CategoryCountRow>) -> Vec<CategoryNode> {
    let mut roots: Vec<CategoryNode> = Vec::new();
    let mut root_index: HashMap<i64, usize> = HashMap::new();
    let mut children: Vec<CategoryCountRow> = Vec::new();

    for row in rows {
        if row.parent_id.is_none() {
            root_index.insert(row.id, roots.len());
            roots.push(node(row));
        } else {
            children.push(row);
        }
    }

    for row in children {
        if let Some(&idx) = row.parent_id.and_then(|p| root_index.get(&p)) {
            roots[idx].children.push(node(row));
        }
    }

    roots
}

#[cfg(test)]
mod tests {
    use super::*;
    use deaconn_types::api::ArticleInput;
    use deaconn_types::categories::flatten;

    const AUTHOR: &str = "9a7b4a52-3b1e-4c5e-8f63-5a4f0f1e2d33";

    fn category(parent_id: Option<i64>, url: &str) -> CategoryInput {
        CategoryInput {
            parent_id,
            name: url.to_uppercase(),
            url: url.into(),
            description: None,
        }
    }

    fn article_in(db: &Database, url: &str, category_id: i64) {
        db.create_article(
            AUTHOR,
            &ArticleInput {
                url: url.into(),
                title: url.into(),
                description: "d".into(),
                content: "c".into(),
                banner: None,
                category_id: Some(category_id),
            },
        )
        .unwrap();
    }

    #[test]
    fn tree_counts_roll_up_into_parents() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(AUTHOR, "a@example.com", "h", None).unwrap();

        let dev = db.create_category(&category(None, "dev")).unwrap();
        let ops = db.create_category(&category(None, "ops")).unwrap();
        let rust = db.create_category(&category(Some(dev), "rust")).unwrap();
        let web = db.create_category(&category(Some(dev), "web")).unwrap();

        article_in(&db, "a1", dev);
        article_in(&db, "a2", rust);
        article_in(&db, "a3", rust);
        article_in(&db, "a4", web);

        let tree = db.category_tree(CountKind::Articles).unwrap();
        let rows = flatten(&tree);
        let summary: Vec<_> = rows.iter().map(|r| (r.id, r.count)).collect();
        assert_eq!(summary, vec![(dev, 4), (rust, 2), (web, 1), (ops, 0)]);

        // Service counts are independent.
        let services = flatten(&db.category_tree(CountKind::Services).unwrap());
        assert!(services.iter().all(|r| r.count == 0));
    }

    #[test]
    fn deleting_a_parent_promotes_children() {
        let db = Database::open_in_memory().unwrap();
        let dev = db.create_category(&category(None, "dev")).unwrap();
        let rust = db.create_category(&category(Some(dev), "rust")).unwrap();
        assert!(db.category_has_children(dev).unwrap());

        assert!(db.delete_category(dev).unwrap());
        let promoted = db.get_category(rust).unwrap().unwrap();
        assert_eq!(promoted.parent_id, None);
    }
}
