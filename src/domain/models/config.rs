//! Runtime configuration model.

use serde::{Deserialize, Serialize};

use super::breaker::BreakerTuning;

/// Top-level configuration, merged from defaults, project files, and
/// `STIGMERGY_*` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub limits: LimitsConfig,
    /// Default breaker tuning; `CB_*` variables override per breaker
    pub breaker: BreakerTuning,
    pub learning: LearningConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            limits: LimitsConfig::default(),
            breaker: BreakerTuning::default(),
            learning: LearningConfig::default(),
        }
    }
}

/// Coordination store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite DSN, e.g. `sqlite:.stigmergy/coordination.db`
    pub url: String,
    pub max_connections: u32,
    /// Bounded wait for a pooled connection; a breach is `StoreUnavailable`
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:.stigmergy/coordination.db".to_string(),
            max_connections: 5,
            acquire_timeout_secs: 5,
        }
    }
}

/// Diagnostic logging; stderr only, stdout belongs to the hook protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Operational budgets and admission limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Advisory cap consulted by fan-out patterns
    pub max_agents: usize,
    /// Running agent rows older than this are presumed leaked
    pub agent_max_age_hours: i64,
    /// Default blackboard read window
    pub broadcast_read_limit: u32,
    /// Budget for reading the hook body from stdin
    pub stdin_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_agents: 20,
            agent_max_age_hours: 24,
            broadcast_read_limit: 10,
            stdin_timeout_secs: 30,
        }
    }
}

/// Learning service sink; absent endpoint disables it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.limits.max_agents, 20);
        assert_eq!(config.breaker.initial_threshold, 3);
        assert!(config.learning.endpoint.is_none());
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"limits": {"max_agents": 5}}"#).unwrap();
        assert_eq!(config.limits.max_agents, 5);
        assert_eq!(config.limits.agent_max_age_hours, 24);
        assert_eq!(config.database.acquire_timeout_secs, 5);
    }
}
