//! Genesis supervisor
//!
//! Top-level run coordination: plan subtasks, spawn one worker per subtask
//! under the worker cap, run the workers concurrently, synthesize their
//! outputs, and report a structurally complete summary. At most one run is
//! active at a time; a second request is rejected without touching any state.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::state::{RunStatus, StateManager};
use crate::orchestrator::agent::{Agent, AgentOutput};
use crate::orchestrator::bus::{MessageBus, Subscription};
use crate::orchestrator::decomposer::Subtask;
use crate::orchestrator::error::RunError;
use crate::orchestrator::spawner::{AgentSpawner, SpawnRequest};
use crate::providers::{fallback, AgentStub, Decomposer, MemoryStore, RunRecord, Synthesizer};
use crate::roles::RoleRegistry;

/// Terminal artifact of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub task: String,
    pub subtasks: Vec<Subtask>,
    pub results: Vec<AgentOutput>,
    pub synthesis: String,
}

/// A spawned worker paired with the subtask it was spawned for
pub struct Worker {
    pub agent: Arc<Agent>,
    pub subtask: Subtask,
}

/// The top-level coordinator
pub struct Genesis {
    id: String,
    spawner: Arc<AgentSpawner>,
    decomposer: Arc<dyn Decomposer>,
    synthesizer: Arc<dyn Synthesizer>,
    memory: Option<Arc<dyn MemoryStore>>,
    registry: Arc<StateManager>,
    roles: RoleRegistry,
    max_workers: usize,
    active: AtomicBool,
    _subscription: Subscription,
}

impl Genesis {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bus: Arc<MessageBus>,
        spawner: Arc<AgentSpawner>,
        decomposer: Arc<dyn Decomposer>,
        synthesizer: Arc<dyn Synthesizer>,
        memory: Option<Arc<dyn MemoryStore>>,
        registry: Arc<StateManager>,
        roles: RoleRegistry,
        max_workers: usize,
    ) -> Self {
        let id = format!("genesis-{}", &Uuid::new_v4().simple().to_string()[..8]);

        // Mirror every message the supervisor observes into the registry.
        // Observation only: delivery and ordering are untouched.
        let subscription = bus.subscribe(id.clone(), {
            let registry = registry.clone();
            move |message| registry.track_message(&message)
        });

        Self {
            id,
            spawner,
            decomposer,
            synthesizer,
            memory,
            registry,
            roles,
            max_workers,
            active: AtomicBool::new(false),
            _subscription: subscription,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Delegate planning to the decomposer; a failed or empty decomposition
    /// becomes the built-in default split
    pub async fn plan(&self, task: &str) -> Vec<Subtask> {
        match self.decomposer.decompose(task, &Value::Null).await {
            Ok(subtasks) if !subtasks.is_empty() => subtasks,
            Ok(_) => {
                warn!("Decomposer returned no subtasks, using the default split");
                fallback::decomposition(task)
            }
            Err(err) => {
                warn!("Decomposer failed ({}), using the default split", err);
                fallback::decomposition(task)
            }
        }
    }

    /// Spawn one worker per subtask, capped at `max_workers`. Roles come from
    /// the subtask when recognized, otherwise from the default team rotation.
    pub fn spawn_workers(&self, subtasks: &[Subtask]) -> Result<Vec<Worker>, RunError> {
        let mut workers = Vec::new();
        for (position, subtask) in subtasks.iter().take(self.max_workers).enumerate() {
            let role = self.roles.assign(subtask.role.as_deref(), position);
            let agent = self
                .spawner
                .spawn(SpawnRequest {
                    role,
                    task: assignment(subtask).to_string(),
                    parent_id: Some(self.id.clone()),
                })
                .map_err(|source| RunError::WorkerUnavailable {
                    title: subtask.title.clone(),
                    source,
                })?;
            workers.push(Worker { agent, subtask: subtask.clone() });
        }
        Ok(workers)
    }

    /// Execute one full emergence. Rejected with `RunError::Conflict` while
    /// another run is in flight.
    pub async fn run(&self, task: &str) -> Result<RunSummary, RunError> {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(RunError::Conflict);
        }

        let result = self.execute(task).await;
        self.active.store(false, Ordering::SeqCst);
        if result.is_err() {
            self.registry.set_status(RunStatus::Error);
        }
        result
    }

    async fn execute(&self, task: &str) -> Result<RunSummary, RunError> {
        info!("Genesis {} starting run: {}", self.id, task);
        self.registry.set_status(RunStatus::Running);
        self.registry.set_task(task);

        let subtasks = self.plan(task).await;
        let workers = self.spawn_workers(&subtasks)?;

        // All workers progress concurrently; join_all keeps spawn order, so
        // the synthesizer sees results ordered by spawn regardless of which
        // model call returns first.
        let outcomes = join_all(workers.iter().map(|worker| {
            let agent = worker.agent.clone();
            let assignment = assignment(&worker.subtask).to_string();
            async move { agent.work(&assignment).await }
        }))
        .await;

        let mut results = Vec::with_capacity(outcomes.len());
        for (worker, outcome) in workers.iter().zip(outcomes) {
            match outcome {
                Ok(output) => results.push(output),
                Err(source) => {
                    return Err(RunError::WorkerFailed {
                        agent_id: worker.agent.id().to_string(),
                        role: worker.agent.role_name().to_string(),
                        source,
                    })
                }
            }
        }

        let synthesis = match self.synthesizer.synthesize(task, &results).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => fallback::synthesis(task, &results),
            Err(err) => {
                warn!("Synthesizer failed ({}), composing offline", err);
                fallback::synthesis(task, &results)
            }
        };

        if let Some(memory) = &self.memory {
            let record = RunRecord {
                id: Uuid::new_v4(),
                task: task.to_string(),
                synthesis: synthesis.clone(),
                agents: results
                    .iter()
                    .map(|result| AgentStub {
                        id: result.agent_id.clone(),
                        role: result.role.clone(),
                        model: result.model.clone(),
                    })
                    .collect(),
                created_at: chrono::Utc::now(),
            };
            if let Err(err) = memory.record_run(record).await {
                warn!("Run archival failed: {}", err);
            }
        }

        self.spawner.shutdown_all();
        self.registry.set_synthesis(&synthesis);
        self.registry.set_status(RunStatus::Complete);
        info!("Genesis {} run complete ({} workers)", self.id, results.len());

        Ok(RunSummary {
            task: task.to_string(),
            subtasks,
            results,
            synthesis,
        })
    }
}

/// Worker assignment text for a subtask
fn assignment(subtask: &Subtask) -> &str {
    if subtask.description.is_empty() {
        &subtask.title
    } else {
        &subtask.description
    }
}
