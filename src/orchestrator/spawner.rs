//! Agent spawner
//!
//! Centralized, capacity- and depth-bounded agent creation. Every agent in a
//! run is created here, so the population cap and the spawn depth limit hold
//! across the whole run. The capacity check and the insertion happen under
//! one lock so concurrent spawns cannot exceed the cap.

use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tracing::info;

use crate::config::Config;
use crate::engine::state::StateManager;
use crate::orchestrator::agent::{Agent, AgentContext};
use crate::orchestrator::bus::{Draft, Message, MessageBus};
use crate::orchestrator::decomposer::Subtask;
use crate::orchestrator::error::SpawnError;
use crate::orchestrator::lock;
use crate::providers::{Decomposer, ModelInvoker, SearchProvider};
use crate::roles::{RoleProfile, RoleRegistry, CAP_DECOMPOSE, CAP_MESSAGE, CAP_SPAWN};

/// Request to create one agent
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub role: String,
    pub task: String,
    pub parent_id: Option<String>,
}

const TOOL_SEND_MESSAGE: &str = "send_message";
const TOOL_SPAWN_AGENT: &str = "spawn_agent";
const TOOL_DECOMPOSE_TASK: &str = "decompose_task";

/// Capability-scoped handles an agent may use to reach back into the run.
/// Holds weak references so agents never keep the run infrastructure alive.
#[derive(Clone)]
pub struct Toolset {
    bus: Weak<MessageBus>,
    spawner: Weak<AgentSpawner>,
    decomposer: Arc<dyn Decomposer>,
    granted: Vec<&'static str>,
}

impl Toolset {
    pub(crate) fn scoped(
        bus: Weak<MessageBus>,
        spawner: Weak<AgentSpawner>,
        decomposer: Arc<dyn Decomposer>,
        profile: &RoleProfile,
    ) -> Self {
        let mut granted = Vec::new();
        if profile.can(CAP_MESSAGE) {
            granted.push(TOOL_SEND_MESSAGE);
        }
        if profile.can(CAP_SPAWN) {
            granted.push(TOOL_SPAWN_AGENT);
        }
        if profile.can(CAP_DECOMPOSE) {
            granted.push(TOOL_DECOMPOSE_TASK);
        }
        Self { bus, spawner, decomposer, granted }
    }

    /// Names of the tools this agent's role grants
    pub fn names(&self) -> &[&'static str] {
        &self.granted
    }

    fn permit(&self, tool: &str) -> Result<()> {
        if self.granted.contains(&tool) {
            Ok(())
        } else {
            anyhow::bail!("tool {} not granted to this role", tool)
        }
    }

    /// Publish a message on the run's bus
    pub fn send_message(
        &self,
        from: impl Into<String>,
        to: Option<String>,
        topic: impl Into<String>,
        content: Value,
    ) -> Result<Message> {
        self.permit(TOOL_SEND_MESSAGE)?;
        let bus = self.bus.upgrade().context("message bus is gone")?;
        Ok(bus.publish(Draft {
            from: from.into(),
            to,
            topic: topic.into(),
            content,
            meta: Value::Null,
        }))
    }

    /// Spawn a child agent through the run's spawner
    pub fn spawn_agent(&self, request: SpawnRequest) -> Result<Arc<Agent>> {
        self.permit(TOOL_SPAWN_AGENT)?;
        let spawner = self.spawner.upgrade().context("spawner is gone")?;
        spawner.spawn(request).map_err(Into::into)
    }

    /// Break a task into subtasks via the run's decomposer
    pub async fn decompose_task(&self, task: &str) -> Result<Vec<Subtask>> {
        self.permit(TOOL_DECOMPOSE_TASK)?;
        self.decomposer.decompose(task, &Value::Null).await
    }
}

/// Limits and model settings the spawner hands to every agent
#[derive(Debug, Clone)]
pub struct SpawnerOptions {
    pub worker_model: String,
    pub timeout: Duration,
    pub max_agents: usize,
    pub max_depth: u32,
}

impl SpawnerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            worker_model: config.models.worker.clone(),
            timeout: Duration::from_secs(config.limits.collaborator_timeout_secs),
            max_agents: config.limits.max_agents,
            max_depth: config.limits.max_spawn_depth,
        }
    }
}

/// Creates and tracks every agent in a run
pub struct AgentSpawner {
    bus: Arc<MessageBus>,
    registry: Arc<StateManager>,
    roles: RoleRegistry,
    invoker: Arc<dyn ModelInvoker>,
    search: Option<Arc<dyn SearchProvider>>,
    decomposer: Arc<dyn Decomposer>,
    options: SpawnerOptions,
    agents: Mutex<Vec<Arc<Agent>>>,
}

impl AgentSpawner {
    pub fn new(
        bus: Arc<MessageBus>,
        registry: Arc<StateManager>,
        roles: RoleRegistry,
        invoker: Arc<dyn ModelInvoker>,
        search: Option<Arc<dyn SearchProvider>>,
        decomposer: Arc<dyn Decomposer>,
        options: SpawnerOptions,
    ) -> Arc<Self> {
        Arc::new(Self {
            bus,
            registry,
            roles,
            invoker,
            search,
            decomposer,
            options,
            agents: Mutex::new(Vec::new()),
        })
    }

    /// Create, register, and initialize one agent. Fails when the population
    /// cap is reached or the spawn depth limit would be exceeded; a depth
    /// violation never clamps.
    pub fn spawn(self: &Arc<Self>, request: SpawnRequest) -> Result<Arc<Agent>, SpawnError> {
        let depth = match &request.parent_id {
            None => 1,
            Some(parent) => self.registry.agent_depth(parent).unwrap_or(1) + 1,
        };
        if depth > self.options.max_depth {
            return Err(SpawnError::DepthLimitExceeded { limit: self.options.max_depth });
        }

        let profile = self.roles.profile_for(&request.role);

        let agent = {
            let mut agents = lock(&self.agents);
            if agents.len() >= self.options.max_agents {
                return Err(SpawnError::CapacityExceeded { limit: self.options.max_agents });
            }

            let toolset = Toolset::scoped(
                Arc::downgrade(&self.bus),
                Arc::downgrade(self),
                self.decomposer.clone(),
                &profile,
            );
            let agent = Arc::new(Agent::new(
                profile,
                request.task.clone(),
                request.parent_id.clone(),
                depth,
                AgentContext {
                    bus: self.bus.clone(),
                    registry: self.registry.clone(),
                    invoker: self.invoker.clone(),
                    search: self.search.clone(),
                    toolset,
                    model: self.options.worker_model.clone(),
                    timeout: self.options.timeout,
                },
            ));
            agents.push(agent.clone());
            agent
        };

        self.registry.register_agent(&agent);
        agent.initialize()?;
        info!("Spawned {} agent {} (depth {})", agent.role_name(), agent.id(), depth);
        Ok(agent)
    }

    /// Snapshot of every spawned agent, regardless of state
    pub fn list_agents(&self) -> Vec<Arc<Agent>> {
        lock(&self.agents).clone()
    }

    pub fn agent_count(&self) -> usize {
        lock(&self.agents).len()
    }

    /// Shut every agent down; safe to call more than once
    pub fn shutdown_all(&self) {
        for agent in lock(&self.agents).iter() {
            agent.shutdown();
        }
    }
}

#[cfg(test)]
pub(crate) mod testkit {
    use super::*;
    use crate::orchestrator::decomposer::TaskDecomposer;
    use crate::providers::OfflineInvoker;

    /// Fresh bus/registry/spawner wired with the given collaborators
    pub(crate) fn build_run(
        invoker: Arc<dyn ModelInvoker>,
        search: Option<Arc<dyn SearchProvider>>,
    ) -> (Arc<MessageBus>, Arc<StateManager>, Arc<AgentSpawner>) {
        let config = Config::default();
        build_run_with_config(invoker, search, &config)
    }

    pub(crate) fn build_run_with_config(
        invoker: Arc<dyn ModelInvoker>,
        search: Option<Arc<dyn SearchProvider>>,
        config: &Config,
    ) -> (Arc<MessageBus>, Arc<StateManager>, Arc<AgentSpawner>) {
        let bus = MessageBus::new();
        let registry = Arc::new(StateManager::new());
        let roles = RoleRegistry::from_config(config);
        let decomposer: Arc<dyn Decomposer> = Arc::new(TaskDecomposer::new(
            Arc::new(OfflineInvoker),
            config.models.planner.clone(),
            roles.default_team().to_vec(),
            Duration::from_secs(1),
        ));
        let spawner = AgentSpawner::new(
            bus.clone(),
            registry.clone(),
            roles,
            invoker,
            search,
            decomposer,
            SpawnerOptions::from_config(config),
        );
        (bus, registry, spawner)
    }

    pub(crate) fn worker_request(role: &str) -> SpawnRequest {
        SpawnRequest {
            role: role.to_string(),
            task: format!("do some {} work", role),
            parent_id: None,
        }
    }
}
