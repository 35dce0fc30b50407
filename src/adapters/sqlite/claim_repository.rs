//! SQLite implementation of the file claim arbiter port.
//!
//! The take-over path is a single conditional upsert with RETURNING, so two
//! racing sessions resolve inside the database: exactly one row survives and
//! both callers learn the stored owner.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::util::parse_datetime;
use super::StoreError;
use crate::domain::models::FileClaim;
use crate::domain::ports::ClaimRepository;

/// SQLite-backed claim arbiter.
#[derive(Clone)]
pub struct SqliteClaimRepository {
    pool: SqlitePool,
}

impl SqliteClaimRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ClaimRow {
    file_path: String,
    project: String,
    session_id: String,
    claimed_at: String,
    ttl_seconds: i64,
}

impl ClaimRow {
    fn into_claim(self) -> Result<FileClaim, StoreError> {
        Ok(FileClaim {
            file_path: self.file_path,
            project: self.project,
            session_id: self.session_id,
            claimed_at: parse_datetime(&self.claimed_at)?,
            ttl_seconds: self.ttl_seconds,
        })
    }
}

#[async_trait]
impl ClaimRepository for SqliteClaimRepository {
    async fn claim(&self, claim: &FileClaim) -> Result<FileClaim> {
        // The update fires only for the current owner (refresh) or when the
        // stored claim's TTL elapsed before the requester's claimed_at.
        let row: ClaimRow = sqlx::query_as(
            r#"
            INSERT INTO file_claims (file_path, project, session_id, claimed_at, ttl_seconds)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(file_path, project) DO UPDATE SET
                session_id = CASE
                    WHEN file_claims.session_id = excluded.session_id
                      OR (julianday(excluded.claimed_at) - julianday(file_claims.claimed_at)) * 86400.0
                         > CAST(file_claims.ttl_seconds AS REAL)
                    THEN excluded.session_id ELSE file_claims.session_id END,
                claimed_at = CASE
                    WHEN file_claims.session_id = excluded.session_id
                      OR (julianday(excluded.claimed_at) - julianday(file_claims.claimed_at)) * 86400.0
                         > CAST(file_claims.ttl_seconds AS REAL)
                    THEN excluded.claimed_at ELSE file_claims.claimed_at END,
                ttl_seconds = CASE
                    WHEN file_claims.session_id = excluded.session_id
                      OR (julianday(excluded.claimed_at) - julianday(file_claims.claimed_at)) * 86400.0
                         > CAST(file_claims.ttl_seconds AS REAL)
                    THEN excluded.ttl_seconds ELSE file_claims.ttl_seconds END
            RETURNING file_path, project, session_id, claimed_at, ttl_seconds
            "#,
        )
        .bind(&claim.file_path)
        .bind(&claim.project)
        .bind(&claim.session_id)
        .bind(claim.claimed_at.to_rfc3339())
        .bind(claim.ttl_seconds)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from)?;

        row.into_claim().map_err(Into::into)
    }

    async fn get(&self, file_path: &str, project: &str) -> Result<Option<FileClaim>> {
        let row: Option<ClaimRow> = sqlx::query_as(
            "SELECT file_path, project, session_id, claimed_at, ttl_seconds \
             FROM file_claims WHERE file_path = ? AND project = ?",
        )
        .bind(file_path)
        .bind(project)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from)?;

        row.map(ClaimRow::into_claim).transpose().map_err(Into::into)
    }

    async fn release(&self, file_path: &str, project: &str, session_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM file_claims \
             WHERE file_path = ? AND project = ? AND session_id = ?",
        )
        .bind(file_path)
        .bind(project)
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_project(&self, project: &str) -> Result<Vec<FileClaim>> {
        let rows: Vec<ClaimRow> = sqlx::query_as(
            "SELECT file_path, project, session_id, claimed_at, ttl_seconds \
             FROM file_claims WHERE project = ? ORDER BY claimed_at DESC",
        )
        .bind(project)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from)?;

        rows.into_iter()
            .map(|r| r.into_claim().map_err(Into::into))
            .collect()
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM file_claims \
             WHERE (julianday(?) - julianday(claimed_at)) * 86400.0 > CAST(ttl_seconds AS REAL)",
        )
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(result.rows_affected())
    }
}
