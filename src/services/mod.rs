//! Application services for the coordination runtime.

pub mod blackboard;
pub mod claims;
pub mod composition;
pub mod config;
pub mod dispatcher;
pub mod handoff;
pub mod patterns;
pub mod registry;
pub mod supervisor;

pub use blackboard::BlackboardService;
pub use claims::ClaimService;
pub use composition::CompositionGate;
pub use dispatcher::HookDispatcher;
pub use handoff::StateTransferService;
pub use registry::AgentRegistryService;
pub use supervisor::SessionSupervisor;
