//! Run wiring
//!
//! Builds a fresh bus, registry, and spawner for every run (no cross-run
//! state leakage) and drives one emergence end to end. Collaborators are
//! injected once per engine and shared across runs.

pub mod state;

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::orchestrator::bus::MessageBus;
use crate::orchestrator::decomposer::TaskDecomposer;
use crate::orchestrator::error::RunError;
use crate::orchestrator::genesis::{Genesis, RunSummary};
use crate::orchestrator::spawner::{AgentSpawner, SpawnerOptions};
use crate::orchestrator::synthesizer::PlanSynthesizer;
use crate::providers::{
    Decomposer, LocalMemory, MemoryStore, ModelInvoker, OfflineInvoker, SearchProvider, Synthesizer,
};
use crate::roles::RoleRegistry;
use self::state::{StateManager, StateSnapshot};

/// Result of one engine run: the summary plus the final observation snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergenceOutcome {
    pub summary: RunSummary,
    pub snapshot: StateSnapshot,
}

/// Reusable entry point for emergence runs
pub struct EmergenceEngine {
    config: Config,
    invoker: Arc<dyn ModelInvoker>,
    search: Option<Arc<dyn SearchProvider>>,
    memory: Option<Arc<dyn MemoryStore>>,
    active: AtomicBool,
}

impl EmergenceEngine {
    pub fn new(config: Config, invoker: Arc<dyn ModelInvoker>) -> Self {
        Self {
            config,
            invoker,
            search: None,
            memory: Some(Arc::new(LocalMemory::new())),
            active: AtomicBool::new(false),
        }
    }

    /// Engine with offline collaborators; every run uses fallback content
    pub fn offline(config: Config) -> Self {
        Self::new(config, Arc::new(OfflineInvoker))
    }

    pub fn with_search(mut self, search: Arc<dyn SearchProvider>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_memory(mut self, memory: Arc<dyn MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn without_memory(mut self) -> Self {
        self.memory = None;
        self
    }

    /// Run one emergence. At most one run is active per engine; a second
    /// request while one is in flight is rejected as a conflict.
    pub async fn run(&self, task: &str) -> Result<EmergenceOutcome, RunError> {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(RunError::Conflict);
        }
        let outcome = self.run_once(task).await;
        self.active.store(false, Ordering::SeqCst);
        outcome
    }

    async fn run_once(&self, task: &str) -> Result<EmergenceOutcome, RunError> {
        let bus = MessageBus::new();
        let registry = Arc::new(StateManager::new());
        let roles = RoleRegistry::from_config(&self.config);
        let timeout = Duration::from_secs(self.config.limits.collaborator_timeout_secs);

        let mut decomposer = TaskDecomposer::new(
            self.invoker.clone(),
            self.config.models.planner.clone(),
            roles.default_team().to_vec(),
            timeout,
        );
        if let Some(memory) = &self.memory {
            decomposer = decomposer.with_memory(memory.clone());
        }
        let decomposer: Arc<dyn Decomposer> = Arc::new(decomposer);

        let synthesizer: Arc<dyn Synthesizer> = Arc::new(PlanSynthesizer::new(
            self.invoker.clone(),
            self.config.models.synthesis.clone(),
            timeout,
        ));

        let spawner = AgentSpawner::new(
            bus.clone(),
            registry.clone(),
            roles.clone(),
            self.invoker.clone(),
            self.search.clone(),
            decomposer.clone(),
            SpawnerOptions::from_config(&self.config),
        );

        let genesis = Genesis::new(
            bus,
            spawner,
            decomposer,
            synthesizer,
            self.memory.clone(),
            registry.clone(),
            roles,
            self.config.limits.max_workers,
        );

        let summary = genesis.run(task).await?;
        Ok(EmergenceOutcome {
            summary,
            snapshot: registry.snapshot(),
        })
    }
}

/// One-shot offline run, used by the demo binary
pub async fn run_emergence(task: &str, config: &Config) -> Result<EmergenceOutcome, RunError> {
    EmergenceEngine::offline(config.clone()).run(task).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::agent::AgentState;
    use super::state::RunStatus;

    #[tokio::test(start_paused = true)]
    async fn test_offline_run_end_to_end() {
        let config = Config::default();
        let outcome = run_emergence("Design a mobile app for mental health", &config)
            .await
            .unwrap();

        let summary = &outcome.summary;
        assert_eq!(summary.task, "Design a mobile app for mental health");
        assert!(!summary.subtasks.is_empty());
        assert_eq!(summary.results.len(), summary.subtasks.len().min(5));
        for result in &summary.results {
            assert!(!result.output.is_empty());
            assert!(!result.role.is_empty());
            assert_eq!(result.model, "demo");
        }
        assert!(!summary.synthesis.is_empty());

        let snapshot = &outcome.snapshot;
        assert_eq!(snapshot.status, RunStatus::Complete);
        assert_eq!(snapshot.agents.len(), summary.results.len());
        assert!(snapshot.agents.iter().all(|a| a.state == AgentState::Complete));
        assert!(!snapshot.events.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_runs_are_isolated() {
        let engine = EmergenceEngine::offline(Config::default());

        let first = engine.run("first task").await.unwrap();
        let second = engine.run("second task").await.unwrap();

        // Fresh registry and spawner per run: populations do not accumulate
        assert_eq!(first.snapshot.agents.len(), second.snapshot.agents.len());
        assert_eq!(second.snapshot.task, "second task");
    }

    #[tokio::test(start_paused = true)]
    async fn test_injected_collaborators_are_used() {
        use crate::providers::testing::StaticSearch;
        use crate::providers::{LocalMemory, SearchResult};

        let memory = Arc::new(LocalMemory::new());
        let engine = EmergenceEngine::offline(Config::default())
            .with_search(Arc::new(StaticSearch {
                results: vec![SearchResult {
                    title: "hit".to_string(),
                    url: "https://example.com".to_string(),
                    snippet: "a finding".to_string(),
                }],
            }))
            .with_memory(memory.clone());

        let outcome = engine.run("research something").await.unwrap();

        // The researcher role carries the search capability
        let researcher = outcome
            .summary
            .results
            .iter()
            .find(|r| r.role == "researcher")
            .unwrap();
        assert_eq!(researcher.search_results.len(), 1);

        // The completed run was archived
        assert_eq!(memory.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_cap_applies_to_engine_runs() {
        let mut config = Config::default();
        config.limits.max_workers = 2;
        let outcome = EmergenceEngine::offline(config).run("small team").await.unwrap();
        assert_eq!(outcome.summary.results.len(), 2);
        assert_eq!(outcome.snapshot.agents.len(), 2);
    }
}
