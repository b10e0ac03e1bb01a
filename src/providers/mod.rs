//! Collaborator contracts
//!
//! The orchestration core reaches every external system (hosted models, web
//! search, archival memory) through the narrow traits defined here. The core
//! never retries or routes; it only converts collaborator failures into the
//! fallback paths the run protocol requires.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::orchestrator::agent::AgentOutput;
use crate::orchestrator::decomposer::Subtask;

pub mod fallback;
pub mod memory;
pub mod offline;

pub use memory::LocalMemory;
pub use offline::OfflineInvoker;

/// One turn of a model conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

/// Completion returned by a model provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelReply {
    pub output: String,
    /// Identifier of the model that actually produced the output
    pub model: String,
}

/// A ranked search hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Archived record of one completed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: Uuid,
    pub task: String,
    pub synthesis: String,
    pub agents: Vec<AgentStub>,
    pub created_at: DateTime<Utc>,
}

/// Minimal agent identity kept in archived runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStub {
    pub id: String,
    pub role: String,
    pub model: String,
}

/// Hosted model invocation. Failures are expected (network, quota, model
/// unavailable) and must be absorbed by the caller's fallback path.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn invoke(&self, model: &str, turns: &[ChatTurn]) -> Result<ModelReply>;
}

/// Web search used by roles that carry the `search` capability
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>>;
}

/// Archival store for completed runs. Recording is best-effort; recall feeds
/// the planner with similar past runs.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn record_run(&self, record: RunRecord) -> Result<()>;
    async fn query_similar(&self, task: &str, limit: usize) -> Result<Vec<RunRecord>>;
}

/// Breaks a task into role-tagged subtasks. An error or an empty result is
/// treated by the supervisor as "use the built-in default split".
#[async_trait]
pub trait Decomposer: Send + Sync {
    async fn decompose(&self, task: &str, context: &Value) -> Result<Vec<Subtask>>;
}

/// Merges worker outputs into one consolidated plan. Must accept any number
/// of outputs, including none.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, task: &str, outputs: &[AgentOutput]) -> Result<String>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Returns a fixed output and records every request it sees.
    pub(crate) struct CapturingInvoker {
        pub output: String,
        pub seen: Mutex<Vec<(String, Vec<ChatTurn>)>>,
    }

    impl CapturingInvoker {
        pub(crate) fn new(output: impl Into<String>) -> Self {
            Self { output: output.into(), seen: Mutex::new(Vec::new()) }
        }

        pub(crate) fn requests(&self) -> Vec<(String, Vec<ChatTurn>)> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ModelInvoker for CapturingInvoker {
        async fn invoke(&self, model: &str, turns: &[ChatTurn]) -> Result<ModelReply> {
            self.seen.lock().unwrap().push((model.to_string(), turns.to_vec()));
            Ok(ModelReply { output: self.output.clone(), model: model.to_string() })
        }
    }

    pub(crate) struct StaticSearch {
        pub results: Vec<SearchResult>,
    }

    #[async_trait]
    impl SearchProvider for StaticSearch {
        async fn search(&self, _query: &str, limit: usize) -> Result<Vec<SearchResult>> {
            Ok(self.results.iter().take(limit).cloned().collect())
        }
    }

    pub(crate) struct FailingSearch;

    #[async_trait]
    impl SearchProvider for FailingSearch {
        async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<SearchResult>> {
            anyhow::bail!("search backend unreachable")
        }
    }

    pub(crate) struct FailingMemory;

    #[async_trait]
    impl MemoryStore for FailingMemory {
        async fn record_run(&self, _record: RunRecord) -> Result<()> {
            anyhow::bail!("memory backend unreachable")
        }

        async fn query_similar(&self, _task: &str, _limit: usize) -> Result<Vec<RunRecord>> {
            anyhow::bail!("memory backend unreachable")
        }
    }
}
