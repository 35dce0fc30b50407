//! SQLite implementation of the agent registry port.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::util::{parse_datetime, parse_optional_datetime};
use super::StoreError;
use crate::domain::models::{Agent, AgentSource, AgentStatus};
use crate::domain::ports::AgentRepository;

/// SQLite-backed agent registry.
#[derive(Clone)]
pub struct SqliteAgentRepository {
    pool: SqlitePool,
}

impl SqliteAgentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AgentRow {
    id: String,
    session_id: String,
    pattern: Option<String>,
    parent_agent_id: Option<String>,
    pid: Option<i64>,
    ppid: Option<i64>,
    spawned_at: String,
    completed_at: Option<String>,
    status: String,
    error_message: Option<String>,
    source: String,
}

impl AgentRow {
    fn into_agent(self) -> Result<Agent, StoreError> {
        Ok(Agent {
            id: self.id,
            session_id: self.session_id,
            pattern: self.pattern,
            parent_agent_id: self.parent_agent_id,
            pid: self.pid,
            ppid: self.ppid,
            spawned_at: parse_datetime(&self.spawned_at)?,
            completed_at: parse_optional_datetime(self.completed_at.as_deref())?,
            status: AgentStatus::parse_str(&self.status).unwrap_or(AgentStatus::Running),
            error_message: self.error_message,
            source: AgentSource::parse_str(&self.source).unwrap_or(AgentSource::Cli),
        })
    }
}

const SELECT_COLUMNS: &str = "id, session_id, pattern, parent_agent_id, pid, ppid, \
                              spawned_at, completed_at, status, error_message, source";

#[async_trait]
impl AgentRepository for SqliteAgentRepository {
    async fn register(&self, agent: &Agent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO agents (id, session_id, pattern, parent_agent_id, pid, ppid,
                                spawned_at, completed_at, status, error_message, source)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                session_id = excluded.session_id,
                pattern = COALESCE(excluded.pattern, agents.pattern),
                parent_agent_id = COALESCE(excluded.parent_agent_id, agents.parent_agent_id),
                pid = COALESCE(excluded.pid, agents.pid),
                ppid = COALESCE(excluded.ppid, agents.ppid),
                status = excluded.status,
                completed_at = excluded.completed_at,
                error_message = excluded.error_message,
                source = excluded.source
            "#,
        )
        .bind(&agent.id)
        .bind(&agent.session_id)
        .bind(&agent.pattern)
        .bind(&agent.parent_agent_id)
        .bind(agent.pid)
        .bind(agent.ppid)
        .bind(agent.spawned_at.to_rfc3339())
        .bind(agent.completed_at.map(|t| t.to_rfc3339()))
        .bind(agent.status.as_str())
        .bind(&agent.error_message)
        .bind(agent.source.as_str())
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(())
    }

    async fn complete(
        &self,
        id: &str,
        status: AgentStatus,
        error_message: Option<&str>,
    ) -> Result<bool> {
        // Only the first terminal write lands: completed_at reflects it and
        // later calls (or unknown ids) touch nothing.
        let result = sqlx::query(
            r#"
            UPDATE agents
            SET status = ?, completed_at = ?, error_message = ?
            WHERE id = ? AND status = 'running'
            "#,
        )
        .bind(status.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(error_message)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(result.rows_affected() > 0)
    }

    async fn get(&self, id: &str) -> Result<Option<Agent>> {
        let row: Option<AgentRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM agents WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from)?;

        row.map(AgentRow::into_agent).transpose().map_err(Into::into)
    }

    async fn count_running(&self) -> Result<u64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM agents WHERE status = 'running'")
                .fetch_one(&self.pool)
                .await
                .map_err(StoreError::from)?;
        Ok(count.0 as u64)
    }

    async fn list_running(&self, session_id: Option<&str>) -> Result<Vec<Agent>> {
        let rows: Vec<AgentRow> = if let Some(session_id) = session_id {
            sqlx::query_as(&format!(
                "SELECT {SELECT_COLUMNS} FROM agents \
                 WHERE status = 'running' AND session_id = ? ORDER BY spawned_at"
            ))
            .bind(session_id)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as(&format!(
                "SELECT {SELECT_COLUMNS} FROM agents WHERE status = 'running' ORDER BY spawned_at"
            ))
            .fetch_all(&self.pool)
            .await
        }
        .map_err(StoreError::from)?;

        rows.into_iter()
            .map(|r| r.into_agent().map_err(Into::into))
            .collect()
    }

    async fn sweep_stale(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE agents
            SET status = 'cancelled',
                completed_at = ?,
                error_message = 'presumed leaked; garbage-collected'
            WHERE status = 'running' AND spawned_at < ?
            "#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(cutoff.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(result.rows_affected())
    }
}
