//! Agent lifecycle
//!
//! A single role-bound unit of work. Each agent owns its append-only log,
//! moves through a strictly forward state machine, and reports completion to
//! its parent over the bus. Collaborator failures never escape `work`: they
//! are logged and converted into clearly-labeled demo fallback output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::orchestrator::bus::{Draft, Message, MessageBus, Subscription, TOPIC_TASK_COMPLETE};
use crate::orchestrator::error::AgentError;
use crate::orchestrator::lock;
use crate::orchestrator::spawner::Toolset;
use crate::engine::state::StateManager;
use crate::providers::{fallback, ChatTurn, ModelInvoker, SearchProvider, SearchResult};
use crate::roles::{RoleProfile, CAP_SEARCH};

/// Lifecycle states, in order. `Complete` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgentState {
    #[serde(rename = "SPAWNED")]
    Spawned,
    #[serde(rename = "INITIALIZING")]
    Initializing,
    #[serde(rename = "ACTIVE")]
    Active,
    #[serde(rename = "WORKING")]
    Working,
    #[serde(rename = "COMPLETE")]
    Complete,
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::Spawned => "SPAWNED",
            AgentState::Initializing => "INITIALIZING",
            AgentState::Active => "ACTIVE",
            AgentState::Working => "WORKING",
            AgentState::Complete => "COMPLETE",
        }
    }
}

/// Kinds of agent log entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogKind {
    #[serde(rename = "lifecycle")]
    Lifecycle,
    #[serde(rename = "message:received")]
    MessageReceived,
    #[serde(rename = "result")]
    Result,
    #[serde(rename = "error")]
    Error,
}

impl LogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::Lifecycle => "lifecycle",
            LogKind::MessageReceived => "message:received",
            LogKind::Result => "result",
            LogKind::Error => "error",
        }
    }
}

/// Append-only, timestamped log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentLogEntry {
    pub kind: LogKind,
    pub detail: Value,
    pub ts: DateTime<Utc>,
}

/// What a worker hands back to its parent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutput {
    pub agent_id: String,
    pub role: String,
    pub task: String,
    /// Identifier of the model that produced the output (`demo` for fallback)
    pub model: String,
    pub output: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub search_results: Vec<SearchResult>,
}

/// Shared run infrastructure handed to every agent at spawn time
pub struct AgentContext {
    pub bus: Arc<MessageBus>,
    pub registry: Arc<StateManager>,
    pub invoker: Arc<dyn ModelInvoker>,
    pub search: Option<Arc<dyn SearchProvider>>,
    pub toolset: Toolset,
    pub model: String,
    pub timeout: Duration,
}

/// A role-bound unit of work with its own lifecycle and log
pub struct Agent {
    id: String,
    role: RoleProfile,
    parent_id: Option<String>,
    depth: u32,
    ctx: AgentContext,
    task: Mutex<String>,
    state: Mutex<AgentState>,
    log: Mutex<Vec<AgentLogEntry>>,
    result: Mutex<Option<AgentOutput>>,
    subscription: Mutex<Option<Subscription>>,
}

impl Agent {
    pub(crate) fn new(
        role: RoleProfile,
        task: String,
        parent_id: Option<String>,
        depth: u32,
        ctx: AgentContext,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            parent_id,
            depth,
            ctx,
            task: Mutex::new(task),
            state: Mutex::new(AgentState::Spawned),
            log: Mutex::new(Vec::new()),
            result: Mutex::new(None),
            subscription: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role_name(&self) -> &str {
        &self.role.name
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn state(&self) -> AgentState {
        *lock(&self.state)
    }

    pub fn task(&self) -> String {
        lock(&self.task).clone()
    }

    /// Snapshot of the append-only log
    pub fn log(&self) -> Vec<AgentLogEntry> {
        lock(&self.log).clone()
    }

    pub fn result(&self) -> Option<AgentOutput> {
        lock(&self.result).clone()
    }

    pub fn toolset(&self) -> &Toolset {
        &self.ctx.toolset
    }

    /// Move the state machine forward and notify the registry. Transitions
    /// only ever advance; everything else is an `InvalidTransition`.
    fn set_state(&self, next: AgentState) -> Result<(), AgentError> {
        {
            let mut state = lock(&self.state);
            if next <= *state {
                return Err(AgentError::InvalidTransition { from: *state, to: next });
            }
            *state = next;
        }
        self.ctx.registry.update_agent_state(&self.id, next);
        Ok(())
    }

    fn append_log(&self, kind: LogKind, detail: Value) {
        lock(&self.log).push(AgentLogEntry { kind, detail, ts: Utc::now() });
    }

    /// Subscribe to the bus and become active. Valid only from `Spawned`.
    pub fn initialize(self: &Arc<Self>) -> Result<(), AgentError> {
        self.set_state(AgentState::Initializing)?;

        let weak = Arc::downgrade(self);
        let subscription = self.ctx.bus.subscribe(self.id.clone(), move |message| {
            if let Some(agent) = weak.upgrade() {
                agent.handle_message(&message);
            }
        });
        *lock(&self.subscription) = Some(subscription);

        self.append_log(
            LogKind::Lifecycle,
            json!({ "message": "initialized", "role": self.role.name, "parent_id": self.parent_id }),
        );
        self.set_state(AgentState::Active)?;
        debug!("Agent {} ({}) initialized", self.id, self.role.name);
        Ok(())
    }

    /// Default handling for any message addressed to this agent
    pub fn handle_message(&self, message: &Message) {
        self.append_log(LogKind::MessageReceived, json!({ "message": message }));
    }

    /// Execute the assigned task: optional search, one model call (with
    /// fallback), completion report to the parent.
    pub async fn work(self: &Arc<Self>, task: &str) -> Result<AgentOutput, AgentError> {
        if self.state() == AgentState::Spawned {
            self.initialize()?;
        }

        self.set_state(AgentState::Working)?;
        *lock(&self.task) = task.to_string();

        let search_results = self.run_search(task).await;
        let output = self.generate_response(task, search_results).await;

        self.append_log(LogKind::Result, json!({ "response": &output }));
        self.set_state(AgentState::Complete)?;

        if let Some(parent) = &self.parent_id {
            self.ctx.bus.publish(Draft::targeted(
                &self.id,
                parent,
                TOPIC_TASK_COMPLETE,
                serde_json::to_value(&output).unwrap_or(Value::Null),
            ));
        }

        *lock(&self.result) = Some(output.clone());
        Ok(output)
    }

    /// Query the search collaborator when the role carries the capability.
    /// Failures and timeouts degrade to an empty, logged result list.
    async fn run_search(&self, task: &str) -> Vec<SearchResult> {
        let Some(provider) = &self.ctx.search else {
            return Vec::new();
        };
        if !self.role.can(CAP_SEARCH) {
            return Vec::new();
        }

        match tokio::time::timeout(self.ctx.timeout, provider.search(task, 5)).await {
            Ok(Ok(results)) => {
                debug!("Agent {} found {} search results", self.id, results.len());
                results
            }
            Ok(Err(err)) => {
                warn!("Agent {} search failed: {}", self.id, err);
                self.append_log(LogKind::Error, json!({ "message": format!("search failed: {}", err) }));
                Vec::new()
            }
            Err(_) => {
                warn!("Agent {} search timed out", self.id);
                self.append_log(LogKind::Error, json!({ "message": "search timed out" }));
                Vec::new()
            }
        }
    }

    /// One model call composed from the role instruction, recent log context,
    /// and search findings. Any failure becomes demo fallback output.
    async fn generate_response(&self, task: &str, search_results: Vec<SearchResult>) -> AgentOutput {
        let turns = self.compose_request(task, &search_results);

        let invoked =
            tokio::time::timeout(self.ctx.timeout, self.ctx.invoker.invoke(&self.ctx.model, &turns))
                .await;

        match invoked {
            Ok(Ok(reply)) => AgentOutput {
                agent_id: self.id.clone(),
                role: self.role.name.clone(),
                task: task.to_string(),
                model: reply.model,
                output: reply.output,
                search_results,
            },
            Ok(Err(err)) => {
                warn!("Agent {} model call failed: {}", self.id, err);
                self.append_log(LogKind::Error, json!({ "message": err.to_string() }));
                self.fallback_output(task, search_results)
            }
            Err(_) => {
                warn!("Agent {} model call timed out", self.id);
                self.append_log(LogKind::Error, json!({ "message": "model call timed out" }));
                self.fallback_output(task, search_results)
            }
        }
    }

    fn fallback_output(&self, task: &str, search_results: Vec<SearchResult>) -> AgentOutput {
        AgentOutput {
            agent_id: self.id.clone(),
            role: self.role.name.clone(),
            task: task.to_string(),
            model: fallback::FALLBACK_MODEL.to_string(),
            output: fallback::agent_result(&self.role.name, task),
            search_results,
        }
    }

    fn compose_request(&self, task: &str, search_results: &[SearchResult]) -> Vec<ChatTurn> {
        let mut sections = vec![format!("Task: {}", task)];

        if !search_results.is_empty() {
            let findings = search_results
                .iter()
                .take(3)
                .enumerate()
                .map(|(i, result)| format!("{}. {} - {}", i + 1, result.title, result.snippet))
                .collect::<Vec<_>>()
                .join("\n");
            sections.push(format!("Search findings:\n{}", findings));
        }

        let recent = {
            let log = lock(&self.log);
            log.iter()
                .rev()
                .take(3)
                .rev()
                .map(|entry| format!("{}: {}", entry.kind.as_str(), entry.detail))
                .collect::<Vec<_>>()
                .join("\n")
        };
        if !recent.is_empty() {
            sections.push(format!("Recent context:\n{}", recent));
        }

        let tools = self.ctx.toolset.names();
        if !tools.is_empty() {
            sections.push(format!("Available tools: {}", tools.join(", ")));
        }

        sections.push("Provide a concise, structured answer. Use bullet points where they help.".to_string());

        vec![
            ChatTurn::system(&self.role.instruction),
            ChatTurn::user(sections.join("\n\n")),
        ]
    }

    /// Leave the bus and close out the log. Calling again is a no-op.
    pub fn shutdown(&self) {
        let subscription = lock(&self.subscription).take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
            self.append_log(LogKind::Lifecycle, json!({ "message": "shutting down" }));
            debug!("Agent {} ({}) shut down", self.id, self.role.name);
        }
    }
}
