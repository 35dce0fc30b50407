//! SQLite implementation of the circuit breaker port.
//!
//! Outcome application is a single transactional read-modify-write so
//! concurrent hook invocations for the same breaker serialize at the store.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};

use super::util::{parse_datetime, parse_optional_datetime};
use super::StoreError;
use crate::domain::models::{BreakerOutcome, BreakerTuning, CircuitRecord, CircuitState};
use crate::domain::ports::BreakerRepository;

/// SQLite-backed breaker state.
#[derive(Clone)]
pub struct SqliteBreakerRepository {
    pool: SqlitePool,
}

impl SqliteBreakerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_record(
        tx: &mut Transaction<'_, Sqlite>,
        cb_id: &str,
    ) -> Result<Option<CircuitRecord>, StoreError> {
        let row: Option<CircuitRow> = sqlx::query_as(
            r#"
            SELECT cb_id, state, failure_count, success_count, current_threshold,
                   window_start, last_failure_at, last_success_at, created_at, updated_at
            FROM circuit_state
            WHERE cb_id = ?
            "#,
        )
        .bind(cb_id)
        .fetch_optional(&mut **tx)
        .await?;

        row.map(CircuitRow::into_record).transpose()
    }

    async fn store_record(
        tx: &mut Transaction<'_, Sqlite>,
        record: &CircuitRecord,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO circuit_state
                (cb_id, state, failure_count, success_count, current_threshold,
                 window_start, last_failure_at, last_success_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(cb_id) DO UPDATE SET
                state = excluded.state,
                failure_count = excluded.failure_count,
                success_count = excluded.success_count,
                current_threshold = excluded.current_threshold,
                window_start = excluded.window_start,
                last_failure_at = excluded.last_failure_at,
                last_success_at = excluded.last_success_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&record.cb_id)
        .bind(record.state.as_str())
        .bind(record.failure_count)
        .bind(record.success_count)
        .bind(record.current_threshold)
        .bind(record.window_start.to_rfc3339())
        .bind(record.last_failure_at.map(|t| t.to_rfc3339()))
        .bind(record.last_success_at.map(|t| t.to_rfc3339()))
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CircuitRow {
    cb_id: String,
    state: String,
    failure_count: i64,
    success_count: i64,
    current_threshold: i64,
    window_start: String,
    last_failure_at: Option<String>,
    last_success_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl CircuitRow {
    fn into_record(self) -> Result<CircuitRecord, StoreError> {
        Ok(CircuitRecord {
            cb_id: self.cb_id,
            state: CircuitState::parse_str(&self.state).unwrap_or(CircuitState::Closed),
            failure_count: self.failure_count,
            success_count: self.success_count,
            current_threshold: self.current_threshold,
            window_start: parse_datetime(&self.window_start)?,
            last_failure_at: parse_optional_datetime(self.last_failure_at.as_deref())?,
            last_success_at: parse_optional_datetime(self.last_success_at.as_deref())?,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

#[async_trait]
impl BreakerRepository for SqliteBreakerRepository {
    async fn get(&self, cb_id: &str) -> Result<Option<CircuitRecord>> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;
        let record = Self::fetch_record(&mut tx, cb_id).await?;
        tx.commit().await.map_err(StoreError::from)?;
        Ok(record)
    }

    async fn apply(
        &self,
        cb_id: &str,
        outcome: BreakerOutcome,
        tuning: &BreakerTuning,
    ) -> Result<CircuitRecord> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        let mut record = Self::fetch_record(&mut tx, cb_id)
            .await?
            .unwrap_or_else(|| CircuitRecord::fresh(cb_id, tuning));
        record.apply(outcome, tuning, Utc::now());

        Self::store_record(&mut tx, &record).await?;
        tx.commit().await.map_err(StoreError::from)?;

        Ok(record)
    }
}
