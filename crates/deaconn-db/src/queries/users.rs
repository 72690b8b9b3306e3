use anyhow::Result;
use deaconn_types::Role;
use deaconn_types::api::{Paginated, ProfileInput, UserSort};
use deaconn_types::models::User;
use rusqlite::{Connection, Row, named_params};

use super::{OptionalExt, parse_roles, timestamp_col, uuid_col};
use crate::Database;
use crate::models::CredentialRow;
use crate::pagination::{PageRequest, finish_page};

const USER_COLUMNS: &str = "u.id, u.name, u.url, u.image, u.bio, u.birthday, u.website, u.github, \
     u.linkedin, u.twitter, \
     (SELECT group_concat(r.role) FROM user_roles r WHERE r.user_id = u.id), \
     u.is_team, u.is_restricted, u.is_root, u.created_at";

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: uuid_col(row, 0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        image: row.get(3)?,
        bio: row.get(4)?,
        birthday: row.get(5)?,
        website: row.get(6)?,
        github: row.get(7)?,
        linkedin: row.get(8)?,
        twitter: row.get(9)?,
        roles: parse_roles(row.get(10)?),
        is_team: row.get(11)?,
        is_restricted: row.get(12)?,
        is_root: row.get(13)?,
        created_at: timestamp_col(row, 14)?,
    })
}

impl Database {
    /// New accounts start with the base `user` role.
    pub fn create_user(&self, id: &str, email: &str, password_hash: &str, name: Option<&str>) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO users (id, email, password, name) VALUES (?1, ?2, ?3, ?4)",
                (id, email, password_hash, name),
            )?;
            tx.execute(
                "INSERT INTO user_roles (user_id, role) VALUES (?1, ?2)",
                (id, Role::User.as_str()),
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_credentials_by_email(&self, email: &str) -> Result<Option<CredentialRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, email, password, name FROM users WHERE email = ?1",
                [email],
                |row| {
                    Ok(CredentialRow {
                        id: row.get(0)?,
                        email: row.get(1)?,
                        password: row.get(2)?,
                        name: row.get(3)?,
                    })
                },
            )
            .optional()
        })
    }

    pub fn get_user(&self, id: &str) -> Result<Option<User>> {
        self.with_conn(|conn| query_user(conn, "u.id = ?1", id))
    }

    pub fn get_user_by_url(&self, url: &str) -> Result<Option<User>> {
        self.with_conn(|conn| query_user(conn, "u.url = ?1", url))
    }

    pub fn get_user_id_by_email(&self, email: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT id FROM users WHERE email = ?1 COLLATE NOCASE", [email], |row| {
                row.get(0)
            })
            .optional()
        })
    }

    pub fn list_users(&self, page: &PageRequest<UserSort, String>) -> Result<Paginated<User, String>> {
        self.with_conn(|conn| {
            let keyset = page.keyset("users", "u");
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users u WHERE {} {} LIMIT :limit",
                keyset.predicate, keyset.order_by
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    named_params! { ":cursor": page.cursor, ":limit": page.fetch_limit() },
                    map_user,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(finish_page(rows, page.limit, |u| u.id.to_string()))
        })
    }

    /// Team members in join order; callers apply role-priority ordering.
    pub fn list_team(&self) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users u WHERE u.is_team = 1 ORDER BY u.created_at, u.id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Replace the editable profile fields. Returns false if the user is unknown.
    pub fn update_profile(&self, id: &str, profile: &ProfileInput) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET name = ?2, url = ?3, image = ?4, bio = ?5, birthday = ?6,
                     website = ?7, github = ?8, linkedin = ?9, twitter = ?10
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    profile.name,
                    profile.url,
                    profile.image,
                    profile.bio,
                    profile.birthday,
                    profile.website,
                    profile.github,
                    profile.linkedin,
                    profile.twitter,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    /// Apply an admin edit in one transaction. `roles` replaces the role set
    /// when given; the base role is always kept. Returns false if the user
    /// is unknown.
    pub fn update_user_admin(
        &self,
        id: &str,
        roles: Option<&[Role]>,
        is_team: Option<bool>,
        is_restricted: Option<bool>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE users SET is_team = COALESCE(?2, is_team),
                     is_restricted = COALESCE(?3, is_restricted)
                 WHERE id = ?1",
                rusqlite::params![id, is_team, is_restricted],
            )?;
            if changed == 0 {
                return Ok(false);
            }

            if let Some(roles) = roles {
                tx.execute("DELETE FROM user_roles WHERE user_id = ?1", [id])?;
                let mut stmt =
                    tx.prepare("INSERT OR IGNORE INTO user_roles (user_id, role) VALUES (?1, ?2)")?;
                stmt.execute((id, Role::User.as_str()))?;
                for role in roles {
                    stmt.execute((id, role.as_str()))?;
                }
            }
            tx.commit()?;
            Ok(true)
        })
    }

    /// Grant a single role. Already holding it is not an error.
    /// Returns false if the user is unknown.
    pub fn add_role(&self, id: &str, role: Role) -> Result<bool> {
        self.with_conn(|conn| {
            if !user_exists(conn, id)? {
                return Ok(false);
            }
            conn.execute(
                "INSERT OR IGNORE INTO user_roles (user_id, role) VALUES (?1, ?2)",
                (id, role.as_str()),
            )?;
            Ok(true)
        })
    }

    pub fn make_root(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("UPDATE users SET is_root = 1 WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }
}

fn query_user(conn: &Connection, predicate: &str, value: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE {predicate}");
    conn.query_row(&sql, [value], map_user).optional()
}

fn user_exists(conn: &Connection, id: &str) -> Result<bool> {
    let found = conn
        .query_row("SELECT 1 FROM users WHERE id = ?1", [id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::is_constraint_violation;

    fn db_with_user(id: &str, email: &str) -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_user(id, email, "hash", Some("Alice")).unwrap();
        db
    }

    const ALICE: &str = "6f1c6a2e-2b7a-4e44-9d7e-2f7c2b1b9a01";

    #[test]
    fn new_user_has_base_role() {
        let db = db_with_user(ALICE, "alice@example.com");
        let user = db.get_user(ALICE).unwrap().unwrap();
        assert_eq!(user.roles, vec![Role::User]);
        assert_eq!(user.name.as_deref(), Some("Alice"));
        assert!(!user.is_root);
    }

    #[test]
    fn duplicate_email_is_a_constraint_violation() {
        let db = db_with_user(ALICE, "alice@example.com");
        let err = db
            .create_user("6f1c6a2e-2b7a-4e44-9d7e-2f7c2b1b9a02", "alice@example.com", "h", None)
            .unwrap_err();
        assert!(is_constraint_violation(&err));
    }

    #[test]
    fn add_role_is_idempotent_and_admin_update_keeps_base() {
        let db = db_with_user(ALICE, "alice@example.com");
        assert!(db.add_role(ALICE, Role::Admin).unwrap());
        assert!(db.add_role(ALICE, Role::Admin).unwrap());
        assert!(!db.add_role("missing", Role::Admin).unwrap());

        let user = db.get_user(ALICE).unwrap().unwrap();
        assert_eq!(user.roles, vec![Role::Admin, Role::User]);

        assert!(db.update_user_admin(ALICE, Some(&[Role::Contributor][..]), None, None).unwrap());
        let user = db.get_user(ALICE).unwrap().unwrap();
        assert_eq!(user.roles, vec![Role::Contributor, Role::User]);
    }

    #[test]
    fn admin_update_without_roles_keeps_existing_roles() {
        let db = db_with_user(ALICE, "alice@example.com");
        db.add_role(ALICE, Role::Moderator).unwrap();

        assert!(db.update_user_admin(ALICE, None, None, Some(true)).unwrap());
        let user = db.get_user(ALICE).unwrap().unwrap();
        assert_eq!(user.roles, vec![Role::Moderator, Role::User]);
        assert!(user.is_restricted);
        assert!(!user.is_team);

        assert!(!db.update_user_admin("missing", Some(&[Role::Admin][..]), None, None).unwrap());
    }

    #[test]
    fn profile_lookup_by_vanity_url() {
        let db = db_with_user(ALICE, "alice@example.com");
        let profile = ProfileInput {
            name: Some("Alice A.".into()),
            url: Some("alice".into()),
            ..Default::default()
        };
        assert!(db.update_profile(ALICE, &profile).unwrap());

        let user = db.get_user_by_url("alice").unwrap().unwrap();
        assert_eq!(user.id.to_string(), ALICE);
        assert_eq!(user.name.as_deref(), Some("Alice A."));
        assert!(db.get_user_by_url("bob").unwrap().is_none());
    }

    #[test]
    fn team_listing_only_contains_team_members() {
        let db = db_with_user(ALICE, "alice@example.com");
        db.create_user("6f1c6a2e-2b7a-4e44-9d7e-2f7c2b1b9a02", "bob@example.com", "h", None)
            .unwrap();
        db.update_user_admin(ALICE, None, Some(true), None).unwrap();

        let team = db.list_team().unwrap();
        assert_eq!(team.len(), 1);
        assert!(team[0].is_team);
    }

    #[test]
    fn email_lookup_ignores_case() {
        let db = db_with_user(ALICE, "alice@example.com");
        assert_eq!(
            db.get_user_id_by_email("Alice@Example.com").unwrap().as_deref(),
            Some(ALICE)
        );
    }
}
