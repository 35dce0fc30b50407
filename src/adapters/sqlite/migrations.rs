//! Embedded schema migrations.
//!
//! The schema ships inside the binary and is applied on every startup; a
//! ledger table records what already ran, so re-application is a no-op and
//! concurrent first-runs race harmlessly on `IF NOT EXISTS`.

use sqlx::SqlitePool;
use thiserror::Error;

/// One schema step, compiled in.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: i64,
    pub label: &'static str,
    pub sql: &'static str,
}

const EMBEDDED: &[Migration] = &[Migration {
    version: 1,
    label: "coordination schema",
    sql: include_str!("../../../migrations/001_initial_schema.sql"),
}];

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("could not read the schema version: {0}")]
    Version(#[source] sqlx::Error),

    #[error("migration {version} ({label}) failed: {source}")]
    Apply {
        version: i64,
        label: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

/// Bring the store up to the current schema. Returns how many steps ran.
pub async fn apply_all(pool: &SqlitePool) -> Result<usize, MigrationError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            label TEXT,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .execute(pool)
    .await
    .map_err(MigrationError::Version)?;

    let current = schema_version(pool).await?;
    let mut applied = 0;

    for migration in EMBEDDED.iter().filter(|m| m.version > current) {
        sqlx::raw_sql(migration.sql)
            .execute(pool)
            .await
            .map_err(|source| MigrationError::Apply {
                version: migration.version,
                label: migration.label,
                source,
            })?;

        sqlx::query("INSERT OR IGNORE INTO schema_migrations (version, label) VALUES (?, ?)")
            .bind(migration.version)
            .bind(migration.label)
            .execute(pool)
            .await
            .map_err(|source| MigrationError::Apply {
                version: migration.version,
                label: migration.label,
                source,
            })?;
        applied += 1;
    }

    Ok(applied)
}

/// Highest applied migration version; 0 for a fresh store.
pub async fn schema_version(pool: &SqlitePool) -> Result<i64, MigrationError> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
            .fetch_optional(pool)
            .await
            .map_err(MigrationError::Version)?;
    Ok(row.map(|(v,)| v).unwrap_or(0))
}
