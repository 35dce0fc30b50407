//! Stigmergy - agent coordination runtime for coding-assistant CLI hooks.
//!
//! Wraps a host CLI's lifecycle hooks with a persistent coordination
//! substrate:
//! - Agent registry with leak-tolerant lifecycle tracking
//! - Append-only blackboard (at-least-once broadcasts) keyed by swarm id
//! - Pattern state machines (swarm, pipeline, adaptive circuit breaker, ...)
//! - Exclusive file claims with TTL take-over across concurrent sessions
//! - Checksummed state handoff between agents
//! - SQLite store with WAL mode

pub mod adapters;
pub mod domain;
pub mod services;

// Re-export key types for convenience
pub use domain::models::hook::{Decision, HookEvent, HookEventName};
pub use services::dispatcher::HookDispatcher;
