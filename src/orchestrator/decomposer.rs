//! Task decomposition
//!
//! Asks the planning model to split the main task into role-tagged subtasks.
//! Anything unusable (failure, timeout, malformed or empty output) falls back
//! to the built-in default team split.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::providers::{fallback, ChatTurn, Decomposer, MemoryStore, ModelInvoker, RunRecord};

/// One decomposed unit of the overall task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    pub title: String,
    /// Role requested by the planner; unrecognized or absent roles are
    /// assigned by position from the default team
    pub role: Option<String>,
    pub description: String,
}

/// Model-backed implementation of the `Decomposer` contract
pub struct TaskDecomposer {
    invoker: Arc<dyn ModelInvoker>,
    memory: Option<Arc<dyn MemoryStore>>,
    model: String,
    team: Vec<String>,
    timeout: Duration,
}

impl TaskDecomposer {
    pub fn new(
        invoker: Arc<dyn ModelInvoker>,
        model: String,
        team: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self { invoker, memory: None, model, team, timeout }
    }

    /// Feed similar past runs into the planning prompt
    pub fn with_memory(mut self, memory: Arc<dyn MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    async fn similar_runs(&self, task: &str) -> Vec<RunRecord> {
        let Some(memory) = &self.memory else {
            return Vec::new();
        };
        match memory.query_similar(task, 3).await {
            Ok(records) => records,
            Err(err) => {
                warn!("Similar-run lookup failed: {}", err);
                Vec::new()
            }
        }
    }

    fn build_prompt(&self, task: &str, similar: &[RunRecord]) -> String {
        let mut sections = vec![
            "You are planning subtasks for an emergence run.".to_string(),
            format!("Main task: {}", task),
        ];

        if similar.is_empty() {
            sections.push("No similar past runs found.".to_string());
        } else {
            let lines = similar
                .iter()
                .enumerate()
                .map(|(i, record)| format!("{}. {} -> {}", i + 1, record.task, record.synthesis))
                .collect::<Vec<_>>()
                .join("\n");
            sections.push(format!("Similar past runs:\n{}", lines));
        }

        sections.push(format!("Available roles: {}", self.team.join(", ")));
        sections.push(
            r#"Return 3-5 concise subtasks as a JSON array: [{"title", "role", "description"}]."#
                .to_string(),
        );
        sections.push("Prefer diverse roles and avoid redundant subtasks.".to_string());
        sections.join("\n\n")
    }

    /// Pull a JSON array of subtasks out of a free-form completion. Returns
    /// nothing when the array is missing, unparseable, or contains an item
    /// without a title and description.
    fn parse_completion(text: &str) -> Vec<Subtask> {
        #[derive(Deserialize)]
        struct RawSubtask {
            title: Option<String>,
            role: Option<String>,
            description: Option<String>,
        }

        let Some(start) = text.find('[') else {
            return Vec::new();
        };
        let Some(end) = text.rfind(']') else {
            return Vec::new();
        };
        if end < start {
            return Vec::new();
        }

        let parsed: Vec<RawSubtask> = match serde_json::from_str(&text[start..=end]) {
            Ok(items) => items,
            Err(err) => {
                debug!("Decomposition output not parseable: {}", err);
                return Vec::new();
            }
        };

        let mut subtasks = Vec::new();
        for raw in parsed {
            match (raw.title, raw.description) {
                (Some(title), Some(description))
                    if !title.trim().is_empty() && !description.trim().is_empty() =>
                {
                    subtasks.push(Subtask { title, role: raw.role, description });
                }
                _ => {
                    debug!("Decomposition item missing required fields");
                    return Vec::new();
                }
            }
        }
        subtasks
    }
}

#[async_trait]
impl Decomposer for TaskDecomposer {
    async fn decompose(&self, task: &str, _context: &Value) -> Result<Vec<Subtask>> {
        let similar = self.similar_runs(task).await;
        let prompt = self.build_prompt(task, &similar);
        let turns = vec![
            ChatTurn::system("Plan subtasks for the agent collective."),
            ChatTurn::user(prompt),
        ];

        match tokio::time::timeout(self.timeout, self.invoker.invoke(&self.model, &turns)).await {
            Ok(Ok(reply)) => {
                let parsed = Self::parse_completion(&reply.output);
                if !parsed.is_empty() {
                    return Ok(parsed);
                }
                warn!("Decomposition returned nothing usable, using the default split");
            }
            Ok(Err(err)) => warn!("Decomposition call failed: {}", err),
            Err(_) => warn!("Decomposition call timed out"),
        }

        Ok(fallback::decomposition(task))
    }
}
