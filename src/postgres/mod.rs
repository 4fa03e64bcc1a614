//! Postgres record backend.
//!
//! Enable the `sqlx_postgres` feature to use it.

pub mod migrations;
mod record;

pub use record::PostgresRecordBackend;
