use std::collections::HashMap;

use anyhow::Result;
use deaconn_types::api::{ExperienceInput, Paginated, ProjectInput, RecordSort, SkillInput};
use deaconn_types::models::{Experience, Project, ProjectSource, Skill};
use rusqlite::{Connection, Row, named_params};

use super::{OptionalExt, uuid_col};
use crate::Database;
use crate::pagination::{PageRequest, finish_page};

fn map_experience(row: &Row<'_>) -> rusqlite::Result<Experience> {
    Ok(Experience {
        id: row.get(0)?,
        user_id: uuid_col(row, 1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        start_date: row.get(4)?,
        end_date: row.get(5)?,
        details: row.get(6)?,
    })
}

fn map_skill(row: &Row<'_>) -> rusqlite::Result<Skill> {
    Ok(Skill {
        id: row.get(0)?,
        user_id: uuid_col(row, 1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        hours: row.get(4)?,
    })
}

fn map_project(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        user_id: uuid_col(row, 1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        details: row.get(4)?,
        start_date: row.get(5)?,
        end_date: row.get(6)?,
        sources: Vec::new(),
    })
}

impl Database {
    // -- Experiences --

    pub fn create_experience(&self, user_id: &str, input: &ExperienceInput) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO user_experiences (user_id, title, description, start_date, end_date, details)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    user_id,
                    input.title,
                    input.description,
                    input.start_date,
                    input.end_date,
                    input.details,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn update_experience(&self, id: i64, input: &ExperienceInput) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE user_experiences SET title = ?2, description = ?3, start_date = ?4,
                     end_date = ?5, details = ?6
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    input.title,
                    input.description,
                    input.start_date,
                    input.end_date,
                    input.details,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_experience(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM user_experiences WHERE id = ?1", [id])? > 0)
        })
    }

    pub fn get_experience(&self, id: i64) -> Result<Option<Experience>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT e.id, e.user_id, e.title, e.description, e.start_date, e.end_date, e.details
                 FROM user_experiences e WHERE e.id = ?1",
                [id],
                map_experience,
            )
            .optional()
        })
    }

    pub fn list_experiences(
        &self,
        user_id: &str,
        page: &PageRequest<RecordSort>,
    ) -> Result<Paginated<Experience>> {
        self.with_conn(|conn| {
            let keyset = page.keyset("user_experiences", "e");
            let sql = format!(
                "SELECT e.id, e.user_id, e.title, e.description, e.start_date, e.end_date, e.details
                 FROM user_experiences e
                 WHERE e.user_id = :user AND {} {} LIMIT :limit",
                keyset.predicate, keyset.order_by
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    named_params! {
                        ":user": user_id,
                        ":cursor": page.cursor,
                        ":limit": page.fetch_limit(),
                    },
                    map_experience,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(finish_page(rows, page.limit, |e| e.id))
        })
    }

    // -- Skills --

    pub fn create_skill(&self, user_id: &str, input: &SkillInput) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO user_skills (user_id, title, description, hours) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![user_id, input.title, input.description, input.hours],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn update_skill(&self, id: i64, input: &SkillInput) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE user_skills SET title = ?2, description = ?3, hours = ?4 WHERE id = ?1",
                rusqlite::params![id, input.title, input.description, input.hours],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_skill(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM user_skills WHERE id = ?1", [id])? > 0))
    }

    pub fn get_skill(&self, id: i64) -> Result<Option<Skill>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT s.id, s.user_id, s.title, s.description, s.hours FROM user_skills s WHERE s.id = ?1",
                [id],
                map_skill,
            )
            .optional()
        })
    }

    pub fn list_skills(&self, user_id: &str, page: &PageRequest<RecordSort>) -> Result<Paginated<Skill>> {
        self.with_conn(|conn| {
            let keyset = page.keyset("user_skills", "s");
            let sql = format!(
                "SELECT s.id, s.user_id, s.title, s.description, s.hours
                 FROM user_skills s
                 WHERE s.user_id = :user AND {} {} LIMIT :limit",
                keyset.predicate, keyset.order_by
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    named_params! {
                        ":user": user_id,
                        ":cursor": page.cursor,
                        ":limit": page.fetch_limit(),
                    },
                    map_skill,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(finish_page(rows, page.limit, |s| s.id))
        })
    }

    // -- Projects --

    pub fn create_project(&self, user_id: &str, input: &ProjectInput) -> Result<i64> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO user_projects (user_id, name, description, details, start_date, end_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    user_id,
                    input.name,
                    input.description,
                    input.details,
                    input.start_date,
                    input.end_date,
                ],
            )?;
            let id = tx.last_insert_rowid();
            insert_sources(&tx, id, input)?;
            tx.commit()?;
            Ok(id)
        })
    }

    /// Replaces the project's fields and its full source list.
    pub fn update_project(&self, id: i64, input: &ProjectInput) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE user_projects SET name = ?2, description = ?3, details = ?4,
                     start_date = ?5, end_date = ?6
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    input.name,
                    input.description,
                    input.details,
                    input.start_date,
                    input.end_date,
                ],
            )?;
            if changed == 0 {
                return Ok(false);
            }
            tx.execute("DELETE FROM user_project_sources WHERE project_id = ?1", [id])?;
            insert_sources(&tx, id, input)?;
            tx.commit()?;
            Ok(true)
        })
    }

    pub fn delete_project(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM user_projects WHERE id = ?1", [id])? > 0))
    }

    pub fn get_project(&self, id: i64) -> Result<Option<Project>> {
        self.with_conn(|conn| {
            let project = conn
                .query_row(
                    "SELECT p.id, p.user_id, p.name, p.description, p.details, p.start_date, p.end_date
                     FROM user_projects p WHERE p.id = ?1",
                    [id],
                    map_project,
                )
                .optional()?;
            let Some(mut project) = project else {
                return Ok(None);
            };
            project.sources = load_sources(conn, &[id])?.remove(&id).unwrap_or_default();
            Ok(Some(project))
        })
    }

    pub fn list_projects(&self, user_id: &str, page: &PageRequest<RecordSort>) -> Result<Paginated<Project>> {
        self.with_conn(|conn| {
            let column = match page.sort {
                RecordSort::Id => "id",
                RecordSort::Title => "name",
            };
            let keyset = page.keyset_on("user_projects", "p", column);
            let sql = format!(
                "SELECT p.id, p.user_id, p.name, p.description, p.details, p.start_date, p.end_date
                 FROM user_projects p
                 WHERE p.user_id = :user AND {} {} LIMIT :limit",
                keyset.predicate, keyset.order_by
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    named_params! {
                        ":user": user_id,
                        ":cursor": page.cursor,
                        ":limit": page.fetch_limit(),
                    },
                    map_project,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let mut result = finish_page(rows, page.limit, |p| p.id);

            let ids: Vec<i64> = result.items.iter().map(|p| p.id).collect();
            let mut sources = load_sources(conn, &ids)?;
            for project in &mut result.items {
                project.sources = sources.remove(&project.id).unwrap_or_default();
            }
            Ok(result)
        })
    }
}

fn insert_sources(conn: &Connection, project_id: i64, input: &ProjectInput) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO user_project_sources (project_id, title, url) VALUES (?1, ?2, ?3)",
    )?;
    for source in &input.sources {
        stmt.execute(rusqlite::params![project_id, source.title, source.url])?;
    }
    Ok(())
}

/// Batch-fetch sources for a set of projects.
fn load_sources(conn: &Connection, project_ids: &[i64]) -> Result<HashMap<i64, Vec<ProjectSource>>> {
    let mut grouped: HashMap<i64, Vec<ProjectSource>> = HashMap::new();
    if project_ids.is_empty() {
        return Ok(grouped);
    }

    let placeholders: Vec<String> = (1..=project_ids.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "SELECT project_id, id, title, url FROM user_project_sources
         WHERE project_id IN ({}) ORDER BY id",
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(project_ids.iter()), |row| {
        Ok((
            row.get::<_, i64>(0)?,
            ProjectSource {
                id: row.get(1)?,
                title: row.get(2)?,
                url: row.get(3)?,
            },
        ))
    })?;
    for row in rows {
        let (project_id, source) = row?;
        grouped.entry(project_id).or_default().push(source);
    }
    Ok(grouped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use deaconn_types::api::ProjectSourceInput;

    const USER: &str = "2d5e3c1b-7a8f-4d2e-b1c0-9e8d7c6b5a44";

    fn setup() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_user(USER, "dev@example.com", "h", None).unwrap();
        db
    }

    fn project(name: &str, sources: &[&str]) -> ProjectInput {
        ProjectInput {
            name: name.into(),
            description: None,
            details: None,
            start_date: None,
            end_date: None,
            sources: sources
                .iter()
                .map(|s| ProjectSourceInput {
                    title: s.to_string(),
                    url: format!("https://github.com/example/{s}"),
                })
                .collect(),
        }
    }

    #[test]
    fn project_sources_are_replaced_on_update() {
        let db = setup();
        let id = db.create_project(USER, &project("site", &["frontend", "backend"])).unwrap();
        assert_eq!(db.get_project(id).unwrap().unwrap().sources.len(), 2);

        assert!(db.update_project(id, &project("site", &["monorepo"])).unwrap());
        let updated = db.get_project(id).unwrap().unwrap();
        let titles: Vec<_> = updated.sources.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["monorepo"]);

        assert!(!db.update_project(id + 1, &project("x", &[])).unwrap());
    }

    #[test]
    fn project_listing_attaches_sources_per_project() {
        let db = setup();
        db.create_project(USER, &project("a", &["one"])).unwrap();
        db.create_project(USER, &project("b", &[])).unwrap();
        db.create_project(USER, &project("c", &["two", "three"])).unwrap();

        let page = PageRequest::<RecordSort>::new(10)
            .sorted(RecordSort::Title, deaconn_types::api::SortDirection::Asc);
        let listed = db.list_projects(USER, &page).unwrap();
        let shape: Vec<_> = listed.items.iter().map(|p| (p.name.as_str(), p.sources.len())).collect();
        assert_eq!(shape, vec![("a", 1), ("b", 0), ("c", 2)]);
    }

    #[test]
    fn skills_and_experiences_are_scoped_to_user() {
        let db = setup();
        db.create_user("2d5e3c1b-7a8f-4d2e-b1c0-9e8d7c6b5a45", "x@example.com", "h", None)
            .unwrap();
        db.create_skill(USER, &SkillInput { title: "Rust".into(), description: None, hours: Some(900) })
            .unwrap();
        db.create_experience(
            "2d5e3c1b-7a8f-4d2e-b1c0-9e8d7c6b5a45",
            &ExperienceInput {
                title: "Intern".into(),
                description: None,
                start_date: None,
                end_date: None,
                details: None,
            },
        )
        .unwrap();

        let page = PageRequest::<RecordSort>::new(10);
        assert_eq!(db.list_skills(USER, &page).unwrap().items.len(), 1);
        assert!(db.list_experiences(USER, &page).unwrap().items.is_empty());
    }
}
