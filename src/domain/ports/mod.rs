//! Repository and sink ports (traits) for dependency injection.
//!
//! Services depend on these contracts, not on concrete store adapters.

pub mod agent_repository;
pub mod artifact_repository;
pub mod breaker_repository;
pub mod broadcast_repository;
pub mod claim_repository;
pub mod finding_repository;
pub mod learning;
pub mod session_repository;

pub use agent_repository::AgentRepository;
pub use artifact_repository::ArtifactRepository;
pub use breaker_repository::BreakerRepository;
pub use broadcast_repository::BroadcastRepository;
pub use claim_repository::ClaimRepository;
pub use finding_repository::FindingRepository;
pub use learning::{Confidence, LearningKind, LearningSink, ScanIngest};
pub use session_repository::SessionRepository;
