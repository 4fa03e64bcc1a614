//! Embedded `SQLite` migrations.
//!
//! # Example
//!
//! ```rust,ignore
//! use cellar::sqlite::migrations;
//! use sqlx::SqlitePool;
//!
//! async fn setup_database(pool: &SqlitePool) -> Result<(), sqlx::Error> {
//!     migrations::run(pool).await?;
//!     Ok(())
//! }
//! ```

use sqlx::{Executor, SqlitePool};

const MIGRATIONS: &[(&str, &str)] = &[(
    "20260101000001_create_sessions_table",
    include_str!("../../migrations_sqlite/20260101000001_create_sessions_table.sql"),
)];

/// Creates the `sessions` table and its `modified` index.
///
/// Applied migrations are tracked in `_cellar_migrations`, so running this
/// on every startup is safe.
pub async fn run(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    pool.execute(
        r"
        CREATE TABLE IF NOT EXISTS _cellar_migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )
        ",
    )
    .await?;

    for (name, sql) in MIGRATIONS {
        let applied: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM _cellar_migrations WHERE name = ?)")
                .bind(*name)
                .fetch_one(pool)
                .await?;
        if applied {
            continue;
        }

        // One statement per execute. Migrations must not put ';' inside literals.
        for statement in sql.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            pool.execute(statement).await?;
        }

        sqlx::query("INSERT INTO _cellar_migrations (name) VALUES (?)")
            .bind(*name)
            .execute(pool)
            .await?;
        log::info!(target: "cellar::record", "msg=\"migration applied\" name=\"{name}\"");
    }
    Ok(())
}
