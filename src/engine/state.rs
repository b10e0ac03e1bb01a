//! Run observation mirror
//!
//! Passive registry of agents, messages, and events for presentation layers
//! (dashboard, CLI). Never the source of truth: it only mirrors what the
//! core reports, behind a single lock so concurrent worker updates are not
//! lost. A fresh instance is created for every run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::orchestrator::agent::{Agent, AgentState};
use crate::orchestrator::bus::Message;
use crate::orchestrator::lock;

/// Event ring capacity; the oldest entries are evicted first
const MAX_EVENTS: usize = 200;
/// Messages exposed by `snapshot`
const SNAPSHOT_MESSAGES: usize = 50;

/// Overall run status as seen by observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Idle,
    Running,
    Complete,
    Error,
}

/// Mirror record for one agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: String,
    pub role: String,
    pub parent_id: Option<String>,
    pub state: AgentState,
    pub depth: u32,
}

/// Spawn relationship edge, for graph views
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnLink {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Spawn,
    State,
    Message,
}

/// One observable run event; newest first in the ring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    pub id: Uuid,
    pub kind: EventKind,
    pub text: String,
    pub agent_id: Option<String>,
    pub ts: DateTime<Utc>,
}

/// Read-only projection handed to presentation layers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub status: RunStatus,
    pub task: String,
    pub agents: Vec<AgentRecord>,
    pub links: Vec<SpawnLink>,
    pub events: Vec<RunEvent>,
    pub recent_messages: Vec<Message>,
    pub synthesis: String,
}

struct StateInner {
    status: RunStatus,
    task: String,
    agents: Vec<AgentRecord>,
    links: Vec<SpawnLink>,
    events: VecDeque<RunEvent>,
    messages: Vec<Message>,
    synthesis: String,
}

/// Passive mirror of one run's state
pub struct StateManager {
    inner: Mutex<StateInner>,
}

impl StateManager {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StateInner {
                status: RunStatus::Idle,
                task: String::new(),
                agents: Vec::new(),
                links: Vec::new(),
                events: VecDeque::new(),
                messages: Vec::new(),
                synthesis: String::new(),
            }),
        }
    }

    /// Mirror a newly spawned agent
    pub fn register_agent(&self, agent: &Agent) {
        let record = AgentRecord {
            id: agent.id().to_string(),
            role: agent.role_name().to_string(),
            parent_id: agent.parent_id().map(String::from),
            state: agent.state(),
            depth: agent.depth(),
        };

        let mut inner = lock(&self.inner);
        if let Some(parent) = &record.parent_id {
            inner.links.push(SpawnLink {
                source: parent.clone(),
                target: record.id.clone(),
            });
        }
        let text = format!("Spawned {} ({})", record.role, record.id);
        let agent_id = record.id.clone();
        inner.agents.push(record);
        Self::push_event(&mut inner, EventKind::Spawn, text, Some(agent_id));
    }

    /// Mirror a state transition
    pub fn update_agent_state(&self, id: &str, state: AgentState) {
        let mut inner = lock(&self.inner);
        let role = match inner.agents.iter_mut().find(|record| record.id == id) {
            Some(record) => {
                record.state = state;
                record.role.clone()
            }
            None => {
                debug!("State update for unregistered agent {}", id);
                "agent".to_string()
            }
        };
        let text = format!("{} {} -> {}", role, id, state.as_str());
        Self::push_event(&mut inner, EventKind::State, text, Some(id.to_string()));
    }

    /// Mirror an observed bus message
    pub fn track_message(&self, message: &Message) {
        let mut inner = lock(&self.inner);
        inner.messages.push(message.clone());
        let text = format!(
            "{} -> {}: {}",
            message.from,
            message.to.as_deref().unwrap_or("all"),
            message.topic
        );
        let agent_id = message.to.clone();
        Self::push_event(&mut inner, EventKind::Message, text, agent_id);
    }

    fn push_event(inner: &mut StateInner, kind: EventKind, text: String, agent_id: Option<String>) {
        inner.events.push_front(RunEvent {
            id: Uuid::new_v4(),
            kind,
            text,
            agent_id,
            ts: Utc::now(),
        });
        inner.events.truncate(MAX_EVENTS);
    }

    pub fn get_agent(&self, id: &str) -> Option<AgentRecord> {
        lock(&self.inner).agents.iter().find(|record| record.id == id).cloned()
    }

    pub fn agent_depth(&self, id: &str) -> Option<u32> {
        self.get_agent(id).map(|record| record.depth)
    }

    /// Every mirrored agent, in registration order
    pub fn list_agents(&self) -> Vec<AgentRecord> {
        lock(&self.inner).agents.clone()
    }

    /// Agents that have not reached `Complete`
    pub fn list_active(&self) -> Vec<AgentRecord> {
        lock(&self.inner)
            .agents
            .iter()
            .filter(|record| record.state != AgentState::Complete)
            .cloned()
            .collect()
    }

    pub fn status(&self) -> RunStatus {
        lock(&self.inner).status
    }

    pub fn set_status(&self, status: RunStatus) {
        lock(&self.inner).status = status;
    }

    pub fn set_task(&self, task: &str) {
        lock(&self.inner).task = task.to_string();
    }

    pub fn set_synthesis(&self, synthesis: &str) {
        lock(&self.inner).synthesis = synthesis.to_string();
    }

    /// Read-only projection for observers
    pub fn snapshot(&self) -> StateSnapshot {
        let inner = lock(&self.inner);
        let recent_start = inner.messages.len().saturating_sub(SNAPSHOT_MESSAGES);
        StateSnapshot {
            status: inner.status,
            task: inner.task.clone(),
            agents: inner.agents.clone(),
            links: inner.links.clone(),
            events: inner.events.iter().cloned().collect(),
            recent_messages: inner.messages[recent_start..].to_vec(),
            synthesis: inner.synthesis.clone(),
        }
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::bus::Draft;
    use crate::orchestrator::spawner::testkit::{build_run, worker_request};
    use crate::providers::OfflineInvoker;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_register_and_update_agent() {
        let (_bus, registry, spawner) = build_run(Arc::new(OfflineInvoker), None);
        let agent = spawner.spawn(worker_request("researcher")).unwrap();

        let record = registry.get_agent(agent.id()).unwrap();
        assert_eq!(record.role, "researcher");
        assert_eq!(record.state, AgentState::Active);
        assert_eq!(record.depth, 1);
        assert_eq!(registry.list_active().len(), 1);
    }

    #[tokio::test]
    async fn test_links_record_spawn_edges() {
        let (_bus, registry, spawner) = build_run(Arc::new(OfflineInvoker), None);
        let parent = spawner.spawn(worker_request("researcher")).unwrap();
        let child = spawner
            .spawn(crate::orchestrator::spawner::SpawnRequest {
                role: "analyst".to_string(),
                task: "child task".to_string(),
                parent_id: Some(parent.id().to_string()),
            })
            .unwrap();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.links.len(), 1);
        assert_eq!(snapshot.links[0].source, parent.id());
        assert_eq!(snapshot.links[0].target, child.id());
    }

    #[test]
    fn test_event_ring_is_capped() {
        let registry = StateManager::new();
        for i in 0..250 {
            registry.track_message(&Message {
                id: Uuid::new_v4(),
                from: format!("sender-{}", i),
                to: None,
                topic: format!("topic-{}", i),
                content: json!({}),
                meta: json!(null),
                ts: Utc::now(),
            });
        }

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.events.len(), MAX_EVENTS);
        // Newest first; the oldest events were evicted
        assert!(snapshot.events[0].text.contains("topic-249"));
        assert!(snapshot.events.last().unwrap().text.contains("topic-50"));
    }

    #[test]
    fn test_snapshot_limits_recent_messages() {
        let registry = StateManager::new();
        for i in 0..60 {
            registry.track_message(&Message {
                id: Uuid::new_v4(),
                from: "x".to_string(),
                to: Some("y".to_string()),
                topic: format!("m-{}", i),
                content: json!({}),
                meta: json!(null),
                ts: Utc::now(),
            });
        }

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.recent_messages.len(), SNAPSHOT_MESSAGES);
        assert_eq!(snapshot.recent_messages[0].topic, "m-10");
        assert_eq!(snapshot.recent_messages.last().unwrap().topic, "m-59");
    }

    #[test]
    fn test_status_task_synthesis_roundtrip() {
        let registry = StateManager::new();
        assert_eq!(registry.status(), RunStatus::Idle);

        registry.set_status(RunStatus::Running);
        registry.set_task("the task");
        registry.set_synthesis("the plan");
        registry.set_status(RunStatus::Complete);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.status, RunStatus::Complete);
        assert_eq!(snapshot.task, "the task");
        assert_eq!(snapshot.synthesis, "the plan");
    }

    #[tokio::test]
    async fn test_update_for_unknown_agent_still_records_event() {
        let registry = StateManager::new();
        registry.update_agent_state("ghost", AgentState::Working);
        let snapshot = registry.snapshot();
        assert!(registry.get_agent("ghost").is_none());
        assert_eq!(snapshot.events.len(), 1);
        assert!(snapshot.events[0].text.contains("ghost"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tracked_messages_come_from_bus_observation() {
        let (bus, registry, _spawner) = build_run(Arc::new(OfflineInvoker), None);
        let registry_clone = registry.clone();
        let _sub = bus.subscribe("observer", move |message| registry_clone.track_message(&message));

        bus.publish(Draft::targeted("a", "observer", "hello", json!({})));
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.recent_messages.len(), 1);
        assert_eq!(snapshot.recent_messages[0].topic, "hello");
    }
}
