//! `SQLite` record backend.
//!
//! Enable the `sqlx_sqlite` feature to use it.

pub mod migrations;
mod record;

pub use record::SqliteRecordBackend;
