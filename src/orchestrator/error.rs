//! Error taxonomy for the orchestration core
//!
//! Only capacity, depth, lifecycle, and run-conflict conditions surface as
//! typed errors. Collaborator failures (model, search, memory, decompose)
//! are absorbed into fallback content at the point of use and never appear
//! here.

use thiserror::Error;

use crate::orchestrator::agent::AgentState;

/// Agent lifecycle violations
#[derive(Debug, Error)]
pub enum AgentError {
    /// The lifecycle only moves forward; anything else is a caller bug
    #[error("invalid agent state transition: {from:?} -> {to:?}")]
    InvalidTransition { from: AgentState, to: AgentState },
}

/// Spawn-time failures
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("max agent limit ({limit}) reached")]
    CapacityExceeded { limit: usize },
    #[error("spawn depth limit ({limit}) exceeded")]
    DepthLimitExceeded { limit: u32 },
    #[error("spawned agent failed to initialize: {0}")]
    Initialize(#[from] AgentError),
}

/// Run-level failures reported by the supervisor
#[derive(Debug, Error)]
pub enum RunError {
    #[error("an emergence run is already in progress")]
    Conflict,
    #[error("no worker available for subtask '{title}': {source}")]
    WorkerUnavailable {
        title: String,
        #[source]
        source: SpawnError,
    },
    #[error("worker {agent_id} ({role}) failed: {source}")]
    WorkerFailed {
        agent_id: String,
        role: String,
        #[source]
        source: AgentError,
    },
}
