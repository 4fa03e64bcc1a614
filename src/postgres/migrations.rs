//! Embedded Postgres migrations.
//!
//! # Example
//!
//! ```rust,ignore
//! use cellar::postgres::migrations;
//! use sqlx::PgPool;
//!
//! async fn setup_database(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
//!     migrations::run(pool).await
//! }
//! ```

use sqlx::PgPool;

/// Creates the `sessions` table and its `modified` index.
///
/// Applied migrations are tracked by sqlx in `_sqlx_migrations`.
pub async fn run(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations_postgres").run(pool).await
}
