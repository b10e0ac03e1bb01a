//! Configuration management
//!
//! Limits, model assignments, and the role vocabulary for emergence runs.
//! Everything has a sensible default so the demo runs with no config file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Population, depth, and timing limits
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Model assignments for the planning, worker, and synthesis calls
    #[serde(default)]
    pub models: ModelsConfig,
    /// Role overrides and additions, merged over the built-in table
    #[serde(default)]
    pub roles: BTreeMap<String, RoleSettings>,
    /// Worker role rotation used when a subtask names no recognized role
    #[serde(default = "default_team")]
    pub default_team: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: LimitsConfig::default(),
            models: ModelsConfig::default(),
            roles: BTreeMap::new(),
            default_team: default_team(),
        }
    }
}

fn default_team() -> Vec<String> {
    ["researcher", "analyst", "architect", "designer", "coordinator"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Population, depth, and timing limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum agents alive in one run
    #[serde(default = "default_max_agents")]
    pub max_agents: usize,
    /// Maximum workers the supervisor fans a task out to
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Maximum spawn recursion depth
    #[serde(default = "default_max_spawn_depth")]
    pub max_spawn_depth: u32,
    /// Per-call timeout for model and search collaborators
    #[serde(default = "default_collaborator_timeout_secs")]
    pub collaborator_timeout_secs: u64,
}

fn default_max_agents() -> usize { 10 }
fn default_max_workers() -> usize { 5 }
fn default_max_spawn_depth() -> u32 { 2 }
fn default_collaborator_timeout_secs() -> u64 { 30 }

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_agents: default_max_agents(),
            max_workers: default_max_workers(),
            max_spawn_depth: default_max_spawn_depth(),
            collaborator_timeout_secs: default_collaborator_timeout_secs(),
        }
    }
}

/// Model assignments for the three call sites
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Model for task decomposition
    #[serde(default = "default_planner_model")]
    pub planner: String,
    /// Model for worker responses
    #[serde(default = "default_worker_model")]
    pub worker: String,
    /// Model for output synthesis
    #[serde(default = "default_synthesis_model")]
    pub synthesis: String,
}

fn default_planner_model() -> String {
    "gpt-4-turbo".to_string()
}

fn default_worker_model() -> String {
    "gpt-4o".to_string()
}

fn default_synthesis_model() -> String {
    "gpt-4-turbo".to_string()
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            planner: default_planner_model(),
            worker: default_worker_model(),
            synthesis: default_synthesis_model(),
        }
    }
}

/// Per-role configuration: capability tags plus the instruction text handed
/// to the model as the system turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleSettings {
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub instruction: String,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }
}
