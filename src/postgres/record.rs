use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::record::{RecordBackend, SessionRecord};
use crate::{SessionError, SessionId};

/// Session records in the `sessions` table of a Postgres database.
///
/// Run [`migrations::run`](super::migrations::run) before first use.
#[derive(Debug, Clone)]
pub struct PostgresRecordBackend {
    pool: PgPool,
}

impl PostgresRecordBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct SessionRow {
    id: String,
    payload: String,
    modified: DateTime<Utc>,
}

impl From<SessionRow> for SessionRecord {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            payload: row.payload,
            modified: row.modified,
        }
    }
}

fn database_error(operation: &str, e: &sqlx::Error) -> SessionError {
    log::error!(target: "cellar::record", "msg=\"database error\", operation=\"{operation}\", error=\"{e}\"");
    SessionError::StoreUnavailable(e.to_string())
}

#[async_trait]
impl RecordBackend for PostgresRecordBackend {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find(&self, id: &SessionId) -> Result<Option<SessionRecord>, SessionError> {
        let row: Option<SessionRow> =
            sqlx::query_as("SELECT id, payload, modified FROM sessions WHERE id = $1")
                .bind(id.to_hex())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| database_error("find_session", &e))?;

        Ok(row.map(SessionRecord::from))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(id = %record.id), err))]
    async fn upsert(&self, record: &SessionRecord) -> Result<(), SessionError> {
        sqlx::query(
            r"INSERT INTO sessions (id, payload, modified)
               VALUES ($1, $2, $3)
               ON CONFLICT (id) DO UPDATE SET
                   payload = excluded.payload,
                   modified = excluded.modified",
        )
        .bind(&record.id)
        .bind(&record.payload)
        .bind(record.modified)
        .execute(&self.pool)
        .await
        .map_err(|e| database_error("upsert_session", &e))?;

        Ok(())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn remove(&self, id: &SessionId) -> Result<bool, SessionError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id.to_hex())
            .execute(&self.pool)
            .await
            .map_err(|e| database_error("remove_session", &e))?;

        Ok(result.rows_affected() > 0)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn prune_modified_before(&self, cutoff: DateTime<Utc>) -> Result<u64, SessionError> {
        let result = sqlx::query("DELETE FROM sessions WHERE modified < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| database_error("prune_sessions", &e))?;

        Ok(result.rows_affected())
    }
}
