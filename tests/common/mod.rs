//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::collections::HashMap;

use sqlx::SqlitePool;
use stigmergy::adapters::sqlite::{open_in_memory, migrations};
use stigmergy::domain::models::{BreakerTuning, Config, HookEvent, PatternContext};
use stigmergy::services::HookDispatcher;

/// Fresh in-memory coordination store with the schema applied.
pub async fn pool() -> SqlitePool {
    let pool = open_in_memory().await.expect("failed to create pool");
    migrations::apply_all(&pool)
        .await
        .expect("failed to apply migrations");
    pool
}

/// Dispatcher over a fresh store.
pub async fn dispatcher() -> HookDispatcher {
    HookDispatcher::from_pool(pool().await, Config::default(), "test-project")
}

/// Coordination context from explicit variables.
pub fn ctx(pairs: &[(&str, &str)]) -> PatternContext {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    PatternContext::from_vars(move |name| map.get(name).cloned(), BreakerTuning::default())
}

/// Decode an event from loose JSON.
pub fn event(body: serde_json::Value) -> HookEvent {
    serde_json::from_value(body).expect("invalid test event")
}
