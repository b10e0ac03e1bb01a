//! In-process run archive
//!
//! Keeps completed runs for the lifetime of the engine and ranks them by
//! keyword overlap when the planner asks for similar past work. Nothing is
//! persisted to disk.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Mutex;
use tracing::debug;

use super::{MemoryStore, RunRecord};

/// In-memory `MemoryStore` implementation
pub struct LocalMemory {
    records: Mutex<Vec<RunRecord>>,
}

impl LocalMemory {
    pub fn new() -> Self {
        Self { records: Mutex::new(Vec::new()) }
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LocalMemory {
    fn default() -> Self {
        Self::new()
    }
}

fn tokenize(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(|s| s.to_string())
        .collect()
}

/// Count of query tokens that appear in the text
fn keyword_score(text: &str, query: &str) -> usize {
    let text_tokens = tokenize(text);
    tokenize(query).iter().filter(|token| text_tokens.contains(*token)).count()
}

#[async_trait]
impl MemoryStore for LocalMemory {
    async fn record_run(&self, record: RunRecord) -> Result<()> {
        debug!("Archiving run {} ({} agents)", record.id, record.agents.len());
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(record);
        Ok(())
    }

    async fn query_similar(&self, task: &str, limit: usize) -> Result<Vec<RunRecord>> {
        let records = self.records.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut ranked: Vec<(usize, &RunRecord)> = records
            .iter()
            .map(|record| (keyword_score(&record.task, task), record))
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(ranked.into_iter().take(limit).map(|(_, record)| record.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn record(task: &str) -> RunRecord {
        RunRecord {
            id: Uuid::new_v4(),
            task: task.to_string(),
            synthesis: "plan".to_string(),
            agents: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_keyword_score_counts_overlap() {
        assert_eq!(keyword_score("plan a mobile app launch", "launch the app"), 2);
        assert_eq!(keyword_score("unrelated text", "launch the app"), 0);
    }

    #[test]
    fn test_keyword_score_ignores_punctuation_and_case() {
        assert_eq!(keyword_score("Launch: the APP!", "launch app"), 2);
    }

    #[tokio::test]
    async fn test_query_similar_ranks_by_overlap() {
        let memory = LocalMemory::new();
        memory.record_run(record("bake a cake")).await.unwrap();
        memory.record_run(record("launch a mobile app")).await.unwrap();
        memory.record_run(record("launch a rocket")).await.unwrap();

        let hits = memory.query_similar("launch the mobile app", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].task, "launch a mobile app");
    }

    #[tokio::test]
    async fn test_record_run_accumulates() {
        let memory = LocalMemory::new();
        assert!(memory.is_empty());
        memory.record_run(record("first")).await.unwrap();
        memory.record_run(record("second")).await.unwrap();
        assert_eq!(memory.len(), 2);
    }
}
