//! Emergence - multi-agent demo orchestrator
//!
//! Fans a task out to a small team of role-tagged agents over an in-process
//! message bus, runs them concurrently against a hosted model collaborator,
//! and synthesizes their outputs into one plan. Every external system (model,
//! search, archival memory) sits behind a narrow trait, and every collaborator
//! failure degrades to local demo content so a run always completes.
//!
//! # Example
//!
//! ```ignore
//! use emergence::config::Config;
//! use emergence::engine::run_emergence;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let outcome = run_emergence("Plan a product launch", &Config::default()).await?;
//!     println!("{}", outcome.summary.synthesis);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod orchestrator;
pub mod providers;
pub mod roles;

// Re-export commonly used types for convenience
pub use config::Config;

pub use orchestrator::{
    Agent, AgentError, AgentOutput, AgentSpawner, AgentState, Genesis, Message, MessageBus,
    RunError, RunSummary, SpawnError, SpawnRequest, Subtask,
};

pub use engine::{
    run_emergence,
    state::{StateManager, StateSnapshot},
    EmergenceEngine, EmergenceOutcome,
};

pub use providers::{MemoryStore, ModelInvoker, SearchProvider};

pub use roles::{RoleProfile, RoleRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
