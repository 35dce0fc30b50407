//! Pattern engines: per-pattern state machines over the hook events.
//!
//! Each engine implements the subset of events it needs and returns a typed
//! [`Decision`]. Selection is a lookup table keyed by `PATTERN_TYPE`.

pub mod auxiliary;
pub mod breaker;
pub mod pipeline;
pub mod swarm;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::models::{Decision, HookEvent, PatternContext, PatternKind};
use crate::domain::ports::{ArtifactRepository, BreakerRepository, LearningSink};
use crate::services::{AgentRegistryService, BlackboardService, StateTransferService};

/// Shared services handed to every engine at construction.
#[derive(Clone)]
pub struct PatternServices {
    pub registry: AgentRegistryService,
    pub blackboard: Arc<BlackboardService>,
    pub transfer: StateTransferService,
    pub artifacts: Arc<dyn ArtifactRepository>,
    pub breakers: Arc<dyn BreakerRepository>,
    pub learning: Arc<dyn LearningSink>,
    /// Advisory fan-out cap
    pub max_agents: usize,
}

/// One coordination pattern's state machine.
#[async_trait]
pub trait PatternEngine: Send + Sync {
    fn kind(&self) -> PatternKind;

    /// Handle one hook event. Errors are funneled by the dispatcher into
    /// `{}`; engines never need to catch their own store failures.
    async fn on_event(&self, event: &HookEvent, ctx: &PatternContext) -> Result<Decision>;
}

/// The lookup table of all engines.
pub struct PatternSet {
    engines: HashMap<PatternKind, Arc<dyn PatternEngine>>,
}

impl PatternSet {
    /// Construct the full engine set over one service bundle.
    pub fn standard(services: PatternServices) -> Self {
        let mut engines: HashMap<PatternKind, Arc<dyn PatternEngine>> = HashMap::new();

        let all: Vec<Arc<dyn PatternEngine>> = vec![
            Arc::new(swarm::SwarmEngine::new(services.clone())),
            Arc::new(pipeline::PipelineEngine::new(services.clone())),
            Arc::new(breaker::CircuitBreakerEngine::new(services.clone())),
            Arc::new(auxiliary::GeneratorCriticEngine::new(services.clone())),
            Arc::new(auxiliary::HierarchicalEngine::new(services.clone())),
            Arc::new(auxiliary::MapReduceEngine::new(services.clone())),
            Arc::new(auxiliary::JuryEngine::new(services.clone())),
            Arc::new(auxiliary::ChainEngine::new(services.clone())),
            Arc::new(auxiliary::AdversarialEngine::new(services.clone())),
            Arc::new(auxiliary::EventDrivenEngine::new(services)),
        ];
        for engine in all {
            engines.insert(engine.kind(), engine);
        }

        Self { engines }
    }

    pub fn engine_for(&self, kind: PatternKind) -> Option<Arc<dyn PatternEngine>> {
        self.engines.get(&kind).cloned()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::adapters::learning::NullLearningSink;
    use crate::adapters::sqlite::{
        open_in_memory, migrations, SqliteAgentRepository, SqliteArtifactRepository,
        SqliteBreakerRepository, SqliteBroadcastRepository,
    };
    use crate::domain::models::BreakerTuning;
    use serde_json::Value;

    /// In-memory service bundle for engine tests.
    pub async fn services() -> PatternServices {
        let pool = open_in_memory().await.unwrap();
        migrations::apply_all(&pool).await.unwrap();

        let blackboard = Arc::new(BlackboardService::new(Arc::new(
            SqliteBroadcastRepository::new(pool.clone()),
        )));
        PatternServices {
            registry: AgentRegistryService::new(
                Arc::new(SqliteAgentRepository::new(pool.clone())),
                24,
            ),
            blackboard: blackboard.clone(),
            transfer: StateTransferService::new(blackboard),
            artifacts: Arc::new(SqliteArtifactRepository::new(pool.clone())),
            breakers: Arc::new(SqliteBreakerRepository::new(pool)),
            learning: Arc::new(NullLearningSink),
            max_agents: 20,
        }
    }

    /// Decode an event from loose JSON.
    pub fn event(body: Value) -> HookEvent {
        serde_json::from_value(body).unwrap()
    }

    /// Context with the given coordination variables set.
    pub fn context(pairs: &[(&str, &str)]) -> PatternContext {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PatternContext::from_vars(move |name| map.get(name).cloned(), BreakerTuning::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_standard_set_covers_every_pattern() {
        let set = PatternSet::standard(test_support::services().await);
        for kind in PatternKind::ALL {
            assert!(set.engine_for(kind).is_some(), "missing engine for {}", kind.as_str());
        }
    }
}
