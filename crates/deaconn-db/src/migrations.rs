use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                email           TEXT NOT NULL UNIQUE,
                password        TEXT NOT NULL,
                name            TEXT,
                url             TEXT UNIQUE,
                image           TEXT,
                bio             TEXT,
                birthday        TEXT,
                website         TEXT,
                github          TEXT,
                linkedin        TEXT,
                twitter         TEXT,
                is_team         INTEGER NOT NULL DEFAULT 0,
                is_restricted   INTEGER NOT NULL DEFAULT 0,
                is_root         INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_users_created ON users(created_at, id);

            CREATE TABLE user_roles (
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                role        TEXT NOT NULL
                    CHECK (role IN ('admin', 'moderator', 'contributor', 'user')),
                PRIMARY KEY (user_id, role)
            );

            CREATE TABLE categories (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                parent_id   INTEGER REFERENCES categories(id) ON DELETE SET NULL,
                name        TEXT NOT NULL,
                url         TEXT NOT NULL UNIQUE,
                description TEXT
            );

            CREATE TABLE articles (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     TEXT NOT NULL REFERENCES users(id),
                category_id INTEGER REFERENCES categories(id) ON DELETE SET NULL,
                url         TEXT NOT NULL UNIQUE,
                title       TEXT NOT NULL,
                description TEXT NOT NULL,
                content     TEXT NOT NULL,
                banner      TEXT,
                views       INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_articles_category ON articles(category_id);

            CREATE TABLE services (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     TEXT NOT NULL REFERENCES users(id),
                category_id INTEGER REFERENCES categories(id) ON DELETE SET NULL,
                url         TEXT NOT NULL UNIQUE,
                name        TEXT NOT NULL,
                description TEXT NOT NULL,
                content     TEXT NOT NULL,
                price       REAL,
                banner      TEXT,
                icon        TEXT,
                views       INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_services_category ON services(category_id);

            CREATE TABLE requests (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     TEXT NOT NULL REFERENCES users(id),
                service_id  INTEGER REFERENCES services(id) ON DELETE SET NULL,
                title       TEXT NOT NULL,
                content     TEXT NOT NULL,
                status      TEXT NOT NULL DEFAULT 'open'
                    CHECK (status IN ('open', 'pending', 'completed')),
                accepted    INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_requests_user ON requests(user_id);

            CREATE TABLE request_replies (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                request_id  INTEGER NOT NULL REFERENCES requests(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id),
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_replies_request ON request_replies(request_id, id);

            CREATE TABLE partners (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT NOT NULL,
                url         TEXT NOT NULL UNIQUE,
                description TEXT,
                banner      TEXT,
                icon        TEXT,
                website     TEXT,
                priority    INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE user_experiences (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title       TEXT NOT NULL,
                description TEXT,
                start_date  TEXT,
                end_date    TEXT,
                details     TEXT
            );

            CREATE TABLE user_skills (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title       TEXT NOT NULL,
                description TEXT,
                hours       INTEGER
            );

            CREATE TABLE user_projects (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                name        TEXT NOT NULL,
                description TEXT,
                details     TEXT,
                start_date  TEXT,
                end_date    TEXT
            );

            CREATE TABLE user_project_sources (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id  INTEGER NOT NULL REFERENCES user_projects(id) ON DELETE CASCADE,
                title       TEXT NOT NULL,
                url         TEXT NOT NULL
            );

            CREATE INDEX idx_project_sources ON user_project_sources(project_id);

            CREATE TABLE git_logs (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                commit_id       TEXT NOT NULL UNIQUE,
                repo_name       TEXT NOT NULL,
                repo_branch     TEXT NOT NULL,
                message         TEXT NOT NULL,
                author_name     TEXT NOT NULL,
                author_username TEXT NOT NULL,
                author_email    TEXT,
                user_id         TEXT REFERENCES users(id) ON DELETE SET NULL,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE update_logs (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     TEXT REFERENCES users(id) ON DELETE SET NULL,
                version     TEXT,
                message     TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE stats (
                key     TEXT PRIMARY KEY,
                value   INTEGER NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
