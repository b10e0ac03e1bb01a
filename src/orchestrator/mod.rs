//! Multi-agent orchestration core

pub mod agent;
pub mod bus;
pub mod decomposer;
pub mod error;
pub mod genesis;
pub mod spawner;
pub mod synthesizer;

// Re-export commonly used types
pub use agent::{Agent, AgentLogEntry, AgentOutput, AgentState, LogKind};
pub use bus::{Draft, HistoryFilter, Message, MessageBus, Subscription};
pub use decomposer::{Subtask, TaskDecomposer};
pub use error::{AgentError, RunError, SpawnError};
pub use genesis::{Genesis, RunSummary};
pub use spawner::{AgentSpawner, SpawnRequest, Toolset};
pub use synthesizer::PlanSynthesizer;

/// Lock a mutex, recovering the guard if a holder panicked
pub(crate) fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
