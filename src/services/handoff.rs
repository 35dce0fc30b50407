//! State transfer between agents over the blackboard.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::models::{AgentState, BroadcastType, StateEnvelope};
use crate::services::BlackboardService;

/// Publishes and restores checksummed agent state.
#[derive(Clone)]
pub struct StateTransferService {
    blackboard: Arc<BlackboardService>,
}

impl StateTransferService {
    pub fn new(blackboard: Arc<BlackboardService>) -> Self {
        Self { blackboard }
    }

    /// Serialize and publish `state` addressed to `to`. Oversized or
    /// unserializable state is a validation failure: the caller skips the
    /// publish and the hook continues.
    pub async fn publish(
        &self,
        swarm_id: &str,
        from: &str,
        to: &str,
        state: &AgentState,
    ) -> Result<()> {
        let envelope = StateEnvelope::seal(from, to, state)?;
        self.blackboard
            .post(
                swarm_id,
                from,
                BroadcastType::StateTransfer,
                envelope.to_payload(),
            )
            .await?;
        info!(swarm_id, from, to, "state transfer published");
        Ok(())
    }

    /// Restore the latest transfer addressed to `agent_id`. A corrupted or
    /// malformed transfer is discarded with a warning, never an error: the
    /// successor simply starts cold.
    pub async fn restore(
        &self,
        swarm_id: &str,
        agent_id: &str,
    ) -> Result<Option<(AgentState, String)>> {
        let Some(broadcast) = self.blackboard.latest_transfer_for(swarm_id, agent_id).await?
        else {
            return Ok(None);
        };

        let Some(envelope) = StateEnvelope::from_payload(&broadcast.payload) else {
            warn!(swarm_id, agent_id, "state transfer payload malformed; discarding");
            return Ok(None);
        };

        match envelope.open() {
            Ok(state) => {
                info!(swarm_id, agent_id, from = %envelope.from, "state restored");
                Ok(Some((state, envelope.from)))
            }
            Err(err) => {
                warn!(swarm_id, agent_id, error = %err, "state transfer rejected; discarding");
                Ok(None)
            }
        }
    }
}
