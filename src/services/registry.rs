//! Agent registry service: the source of truth for "who is running".

use anyhow::Result;
use chrono::{Duration, Utc};
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::ident;
use crate::domain::models::{Agent, AgentStatus};
use crate::domain::ports::AgentRepository;

/// Tracks agent lifecycles observed through hook events.
#[derive(Clone)]
pub struct AgentRegistryService {
    repo: Arc<dyn AgentRepository>,
    max_age: Duration,
}

impl AgentRegistryService {
    pub fn new(repo: Arc<dyn AgentRepository>, max_age_hours: i64) -> Self {
        Self {
            repo,
            max_age: Duration::hours(max_age_hours),
        }
    }

    /// Idempotently record an agent as running. Invalid ids are dropped.
    pub async fn register(&self, agent: &Agent) -> Result<()> {
        if !ident::is_valid_id(&agent.id) {
            debug!(id = %agent.id, "dropping registration with invalid agent id");
            return Ok(());
        }
        self.repo.register(agent).await
    }

    /// Terminate an agent; repeats and unknown ids are no-ops.
    pub async fn complete(
        &self,
        id: &str,
        status: AgentStatus,
        error_message: Option<&str>,
    ) -> Result<bool> {
        if !ident::is_valid_id(id) {
            return Ok(false);
        }
        self.repo.complete(id, status, error_message).await
    }

    /// Admission signal for fan-out patterns.
    pub async fn count_running(&self) -> Result<u64> {
        self.repo.count_running().await
    }

    /// Running agents, optionally scoped to one session.
    pub async fn list_running(&self, session_id: Option<&str>) -> Result<Vec<Agent>> {
        self.repo.list_running(session_id).await
    }

    /// Garbage-collect leaked rows: anything running beyond the max age, plus
    /// rows whose recorded PID no longer maps to a live process.
    pub async fn sweep(&self) -> Result<u64> {
        let mut collected = self.repo.sweep_stale(Utc::now() - self.max_age).await?;

        let probes: Vec<_> = self
            .repo
            .list_running(None)
            .await?
            .into_iter()
            .filter(|agent| agent.pid.is_some_and(|pid| !process_alive(pid)))
            .map(|agent| {
                let repo = self.repo.clone();
                async move {
                    repo.complete(
                        &agent.id,
                        AgentStatus::Failed,
                        Some("process exited without SubagentStop"),
                    )
                    .await
                }
            })
            .collect();
        for terminated in futures::future::join_all(probes).await {
            if terminated? {
                collected += 1;
            }
        }

        if collected > 0 {
            info!(collected, "registry sweep collected leaked agents");
        }
        Ok(collected)
    }
}

/// Signal-0 probe; only meaningful for PIDs on this host.
fn process_alive(pid: i64) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    kill(Pid::from_raw(pid), None).is_ok()
}
