//! Agent role vocabulary
//!
//! Maps each role to a capability set and an instruction text. The built-in
//! table covers the demo team; configuration can override or extend it, and
//! unknown roles degrade to a generic messaging-only profile.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::Config;

/// Capability tag that lets a role query the search collaborator
pub const CAP_SEARCH: &str = "search";
/// Capability tag that lets a role publish arbitrary bus messages
pub const CAP_MESSAGE: &str = "message";
/// Capability tag that lets a role spawn child agents
pub const CAP_SPAWN: &str = "spawn";
/// Capability tag that lets a role decompose tasks
pub const CAP_DECOMPOSE: &str = "decompose";

/// A role resolved to its capability set and instruction text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleProfile {
    pub name: String,
    pub capabilities: BTreeSet<String>,
    pub instruction: String,
}

impl RoleProfile {
    pub fn can(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }
}

fn profile(name: &str, capabilities: &[&str], instruction: &str) -> (String, RoleProfile) {
    (
        name.to_string(),
        RoleProfile {
            name: name.to_string(),
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
            instruction: instruction.to_string(),
        },
    )
}

static BUILTIN_PROFILES: Lazy<BTreeMap<String, RoleProfile>> = Lazy::new(|| {
    BTreeMap::from([
        profile(
            "genesis",
            &["plan", CAP_DECOMPOSE, CAP_SPAWN, "synthesize", CAP_MESSAGE],
            "You are the supervisor of an agent collective. Decompose the task, \
             delegate to specialists, and synthesize their findings into one plan.",
        ),
        profile(
            "researcher",
            &[CAP_SEARCH, "gather", "summarize", CAP_MESSAGE],
            "You are a Researcher agent. Gather facts, surface sources, and report \
             the landscape around the task. Cite what you find and keep it concise.",
        ),
        profile(
            "analyst",
            &["analyze", "compare", "risks", CAP_MESSAGE],
            "You are an Analyst agent. Compare the options, identify risks and \
             trade-offs, and recommend a direction with clear reasoning.",
        ),
        profile(
            "designer",
            &["ideate", "ux", "copy", CAP_MESSAGE],
            "You are a Designer agent. Outline the user experience, content \
             direction, and creative choices that fit the task.",
        ),
        profile(
            "architect",
            &["tech-plan", "evaluate", "constraints", CAP_MESSAGE],
            "You are an Architect agent. Propose a technical approach, name the \
             major components, and call out feasibility constraints.",
        ),
        profile(
            "coordinator",
            &["track", "clarify", "resolve", CAP_MESSAGE],
            "You are a Coordinator agent. Summarize alignment across the team, \
             flag dependencies, and list concrete next steps.",
        ),
    ])
});

/// Role lookup built once per run from the built-in table plus config
#[derive(Debug, Clone)]
pub struct RoleRegistry {
    profiles: BTreeMap<String, RoleProfile>,
    default_team: Vec<String>,
}

impl RoleRegistry {
    /// Registry with only the built-in roles
    pub fn builtin() -> Self {
        Self {
            profiles: BUILTIN_PROFILES.clone(),
            default_team: crate::config::Config::default().default_team,
        }
    }

    /// Built-in table merged with config overrides and the configured team
    pub fn from_config(config: &Config) -> Self {
        let mut profiles = BUILTIN_PROFILES.clone();
        for (name, settings) in &config.roles {
            let base = profiles.get(name);
            let capabilities: BTreeSet<String> = if settings.capabilities.is_empty() {
                base.map(|p| p.capabilities.clone()).unwrap_or_default()
            } else {
                settings.capabilities.iter().cloned().collect()
            };
            let instruction = if settings.instruction.is_empty() {
                base.map(|p| p.instruction.clone()).unwrap_or_default()
            } else {
                settings.instruction.clone()
            };
            profiles.insert(
                name.clone(),
                RoleProfile { name: name.clone(), capabilities, instruction },
            );
        }

        let default_team = if config.default_team.is_empty() {
            Config::default().default_team
        } else {
            config.default_team.clone()
        };

        Self { profiles, default_team }
    }

    pub fn get(&self, role: &str) -> Option<&RoleProfile> {
        self.profiles.get(role)
    }

    pub fn recognizes(&self, role: &str) -> bool {
        self.profiles.contains_key(role)
    }

    pub fn default_team(&self) -> &[String] {
        &self.default_team
    }

    /// Resolve a requested role name, falling back to the default team by
    /// position when the request is absent or unrecognized
    pub fn assign(&self, requested: Option<&str>, position: usize) -> String {
        if let Some(role) = requested {
            if self.recognizes(role) {
                return role.to_string();
            }
        }
        self.default_team[position % self.default_team.len()].clone()
    }

    /// Profile for a role, degrading unknown names to a generic worker
    pub fn profile_for(&self, role: &str) -> RoleProfile {
        self.profiles.get(role).cloned().unwrap_or_else(|| RoleProfile {
            name: role.to_string(),
            capabilities: [CAP_MESSAGE.to_string()].into_iter().collect(),
            instruction: format!(
                "You are a specialized {} agent. Complete the assigned task and report your findings clearly.",
                role
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_roles_present() {
        let registry = RoleRegistry::builtin();
        for role in ["genesis", "researcher", "analyst", "designer", "architect", "coordinator"] {
            assert!(registry.recognizes(role), "missing builtin role {}", role);
        }
    }

    #[test]
    fn test_researcher_can_search() {
        let registry = RoleRegistry::builtin();
        assert!(registry.get("researcher").unwrap().can(CAP_SEARCH));
        assert!(!registry.get("analyst").unwrap().can(CAP_SEARCH));
    }

    #[test]
    fn test_genesis_can_spawn_and_decompose() {
        let registry = RoleRegistry::builtin();
        let genesis = registry.get("genesis").unwrap();
        assert!(genesis.can(CAP_SPAWN));
        assert!(genesis.can(CAP_DECOMPOSE));
    }

    #[test]
    fn test_assign_prefers_recognized_role() {
        let registry = RoleRegistry::builtin();
        assert_eq!(registry.assign(Some("designer"), 0), "designer");
    }

    #[test]
    fn test_assign_falls_back_by_position() {
        let registry = RoleRegistry::builtin();
        assert_eq!(registry.assign(None, 0), "researcher");
        assert_eq!(registry.assign(Some("wizard"), 1), "analyst");
        // Rotation wraps past the end of the team
        assert_eq!(registry.assign(None, 5), "researcher");
    }

    #[test]
    fn test_profile_for_unknown_role_is_generic() {
        let registry = RoleRegistry::builtin();
        let profile = registry.profile_for("wizard");
        assert_eq!(profile.name, "wizard");
        assert!(profile.can(CAP_MESSAGE));
        assert!(!profile.can(CAP_SEARCH));
        assert!(profile.instruction.contains("wizard"));
    }

    #[test]
    fn test_config_overrides_builtin_instruction() {
        let mut config = Config::default();
        config.roles.insert(
            "analyst".to_string(),
            crate::config::RoleSettings {
                capabilities: Vec::new(),
                instruction: "Custom analyst instruction.".to_string(),
            },
        );
        let registry = RoleRegistry::from_config(&config);
        let analyst = registry.get("analyst").unwrap();
        assert_eq!(analyst.instruction, "Custom analyst instruction.");
        // Capabilities were left empty in the override, so the builtin set survives
        assert!(analyst.can("analyze"));
    }

    #[test]
    fn test_config_adds_new_role() {
        let mut config = Config::default();
        config.roles.insert(
            "scout".to_string(),
            crate::config::RoleSettings {
                capabilities: vec![CAP_SEARCH.to_string(), CAP_MESSAGE.to_string()],
                instruction: "You are a scout.".to_string(),
            },
        );
        let registry = RoleRegistry::from_config(&config);
        assert!(registry.recognizes("scout"));
        assert!(registry.get("scout").unwrap().can(CAP_SEARCH));
    }
}
