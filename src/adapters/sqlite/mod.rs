//! SQLite adapters for the coordination store.
//!
//! All access goes through these repositories; no component formats SQL
//! elsewhere. Identifiers are validated before any query and every statement
//! is parameterized.

pub mod agent_repository;
pub mod artifact_repository;
pub mod breaker_repository;
pub mod broadcast_repository;
pub mod claim_repository;
pub mod connection;
pub mod finding_repository;
pub mod migrations;
pub mod session_repository;
mod util;

pub use agent_repository::SqliteAgentRepository;
pub use artifact_repository::SqliteArtifactRepository;
pub use breaker_repository::SqliteBreakerRepository;
pub use broadcast_repository::SqliteBroadcastRepository;
pub use claim_repository::SqliteClaimRepository;
pub use connection::{open, open_in_memory, OpenError};
pub use finding_repository::SqliteFindingRepository;
pub use migrations::{Migration, MigrationError};
pub use session_repository::SqliteSessionRepository;

use thiserror::Error;

/// Store failure kinds surfaced to services.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The bounded pool-acquire wait elapsed.
    #[error("store unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),

    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(#[from] chrono::ParseError),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => Self::Unavailable(err),
            other => Self::Query(other),
        }
    }
}
