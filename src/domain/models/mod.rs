//! Domain models for the coordination runtime.

pub mod agent;
pub mod artifact;
pub mod breaker;
pub mod broadcast;
pub mod claim;
pub mod composition;
pub mod config;
pub mod finding;
pub mod handoff;
pub mod hook;
pub mod session;

pub use agent::{Agent, AgentSource, AgentStatus};
pub use artifact::PipelineArtifact;
pub use breaker::{BreakerOutcome, BreakerTuning, CircuitRecord, CircuitState};
pub use broadcast::{Broadcast, BroadcastType};
pub use claim::{ClaimStatus, FileClaim};
pub use composition::{
    CompositionReport, CompositionRequest, PatternKind, ScopeOperator, SequenceOperator,
};
pub use config::Config;
pub use finding::{Checkpoint, FeatureWorkspace, Finding};
pub use handoff::{AgentState, StateEnvelope};
pub use hook::{AgentRole, Decision, HookEvent, HookEventName, PatternContext};
pub use session::Session;
