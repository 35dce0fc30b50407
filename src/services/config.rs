//! Configuration assembly.
//!
//! A hook invocation cannot prompt anyone, so every setting needs a workable
//! default and every override has to come from the checkout or the process
//! environment. The merged view is built in override order: compiled-in
//! defaults are the floor, `.stigmergy/config.yaml` is what the project
//! commits, `.stigmergy/local.yaml` holds per-checkout tweaks that stay out
//! of version control, and `STIGMERGY_*` variables beat all of it (nesting
//! spelled with `__`, e.g. `STIGMERGY_DATABASE__URL`).

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::Config;

const PROJECT_FILE: &str = ".stigmergy/config.yaml";
const LOCAL_FILE: &str = ".stigmergy/local.yaml";
const ENV_PREFIX: &str = "STIGMERGY_";

/// A merged configuration that cannot run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("database URL is empty")]
    EmptyDatabaseUrl,

    #[error("max_connections is 0; the store needs at least one connection")]
    NoConnections,

    #[error("unknown log level '{0}' (expected trace, debug, info, warn, or error)")]
    UnknownLogLevel(String),

    #[error("max_agents {0} outside 1..=500")]
    MaxAgentsOutOfRange(usize),

    #[error("breaker tuning rejected: {0}")]
    BreakerTuning(String),
}

/// Assemble the runtime configuration from the standard layers.
pub fn load() -> Result<Config> {
    let merged = with_env(
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::file(PROJECT_FILE))
            .merge(Yaml::file(LOCAL_FILE)),
    )?;
    validate(&merged)?;
    Ok(merged)
}

/// Assemble from one explicit file. Environment variables still win, so an
/// operator can point a hook at a shared config and tweak it per machine.
pub fn load_from(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let merged = with_env(
        Figment::from(Serialized::defaults(Config::default())).merge(Yaml::file(path)),
    )
    .with_context(|| format!("while loading {}", path.display()))?;
    validate(&merged)?;
    Ok(merged)
}

fn with_env(figment: Figment) -> Result<Config> {
    figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .context("configuration layers did not merge into a valid Config")
}

/// Reject configurations the runtime could not honor.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.database.url.is_empty() {
        return Err(ConfigError::EmptyDatabaseUrl);
    }
    if config.database.max_connections == 0 {
        return Err(ConfigError::NoConnections);
    }

    let level = config.logging.level.as_str();
    if !matches!(level, "trace" | "debug" | "info" | "warn" | "error") {
        return Err(ConfigError::UnknownLogLevel(level.to_string()));
    }

    if !(1..=500).contains(&config.limits.max_agents) {
        return Err(ConfigError::MaxAgentsOutOfRange(config.limits.max_agents));
    }

    config
        .breaker
        .validate()
        .map_err(ConfigError::BreakerTuning)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_rejects_empty_database_url() {
        let mut config = Config::default();
        config.database.url = String::new();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::EmptyDatabaseUrl)
        ));
    }

    #[test]
    fn test_rejects_bad_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".into();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::UnknownLogLevel(_))
        ));
    }

    #[test]
    fn test_rejects_inverted_breaker_band() {
        let mut config = Config::default();
        config.breaker.min_threshold = 10;
        config.breaker.max_threshold = 2;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::BreakerTuning(_))
        ));
    }

    #[test]
    fn test_rejects_zero_max_agents() {
        let mut config = Config::default();
        config.limits.max_agents = 0;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::MaxAgentsOutOfRange(0))
        ));
    }

    #[test]
    fn test_file_overrides_defaults_keeps_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "limits:\n  max_agents: 7\ndatabase:\n  url: sqlite:test.db\n",
        )
        .unwrap();

        let config = load_from(&path).unwrap();
        assert_eq!(config.limits.max_agents, 7);
        assert_eq!(config.database.url, "sqlite:test.db");
        assert_eq!(config.breaker.initial_threshold, 3);
    }
}
