//! The smallest unit of model-backed evaluation: an agent, grouped into
//! agencies that gate and compress their outputs.

mod parse;
mod prompt;
mod repair;
mod runtime;

pub use parse::{extract_json_block, extract_thinking, parse_salience};
pub use prompt::{build_prompt, load_system_prompt};
pub use repair::{extract_json_fields, parse_structured, repair_json};
pub use runtime::AgentRuntime;

use std::collections::BTreeMap;

use murmur_types::{AgentVoice, EventSignature};
use serde::{Deserialize, Serialize};

use crate::contracts::Message;

/// Agents that run regardless of gating.
pub const ALWAYS_ON_AGENTS: &[&str] = &[
    "censor",
    "exception_handler",
    "trigger_watcher",
    "anomaly_detector",
];

/// The fixed stage-1 watcher allow-list: cheap, always-on monitors.
pub const WATCHER_AGENTS: &[&str] = &[
    "monitoring.trigger_watcher",
    "monitoring.anomaly_detector",
    "inhibition.censor",
    "emotion.stress",
];

/// One registered agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDef {
    pub agency_id: String,
    pub name: String,
}

impl AgentDef {
    pub fn new(agency_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            agency_id: agency_id.into(),
            name: name.into(),
        }
    }

    /// Unique id: `{agency}.{name}`.
    pub fn agent_id(&self) -> String {
        format!("{}.{}", self.agency_id, self.name)
    }

    pub fn is_always_on(&self) -> bool {
        ALWAYS_ON_AGENTS.contains(&self.name.as_str())
    }
}

/// A named grouping of agents sharing a domain marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgencyDef {
    pub id: String,
    pub display_name: String,
    pub agents: Vec<AgentDef>,
}

impl AgencyDef {
    pub fn new(id: &str, display_name: &str, agent_names: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            agents: agent_names.iter().map(|n| AgentDef::new(id, *n)).collect(),
        }
    }

    /// Whether this agency's domain marker is active in the signature.
    /// Agencies without a marker (self, inhibition, monitoring) always
    /// pass.
    pub fn domain_active(&self, sig: &EventSignature) -> bool {
        match self.id.as_str() {
            "emotion" => sig.has_emotion_markers,
            "planning" => sig.has_planning_markers,
            "social" => sig.has_social_markers,
            "reasoning" => sig.has_problem_markers,
            "execution" => sig.has_action_markers,
            "creative" => sig.has_problem_markers,
            "resource" => sig.has_planning_markers,
            _ => true,
        }
    }

    /// True for agencies with no domain marker at all.
    pub fn is_markerless(&self) -> bool {
        matches!(self.id.as_str(), "self" | "inhibition" | "monitoring")
    }
}

/// The default agency roster.
pub fn default_agencies() -> Vec<AgencyDef> {
    vec![
        AgencyDef::new("monitoring", "Monitoring", &["trigger_watcher", "anomaly_detector"]),
        AgencyDef::new("inhibition", "Inhibition", &["censor"]),
        AgencyDef::new("emotion", "Emotion", &["stress", "wellbeing"]),
        AgencyDef::new("planning", "Planning", &["short_term"]),
        AgencyDef::new("resource", "Resource", &["energy", "time"]),
        AgencyDef::new("social", "Social", &["norms", "relationships"]),
        AgencyDef::new("reasoning", "Reasoning", &["analyst"]),
        AgencyDef::new("creative", "Creative", &["brainstormer"]),
        AgencyDef::new("self", "Self", &["observer"]),
    ]
}

/// Context for agents deliberating over previous voices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliberationContext {
    pub round: u32,
    pub max_rounds: u32,
    pub previous_voices: BTreeMap<String, AgentVoice>,
    pub consensus_level: f64,
    pub speaking_pressure: f64,
}

impl DeliberationContext {
    /// Render the previous round for inclusion in an agent prompt.
    pub fn format_for_prompt(&self) -> String {
        let mut lines = vec![format!(
            "Round {} of {}. Consensus: {:.2}. Speaking pressure: {:.2}.",
            self.round, self.max_rounds, self.consensus_level, self.speaking_pressure
        )];
        if self.previous_voices.is_empty() {
            lines.push("No voices yet.".to_string());
        } else {
            lines.push("Previous voices:".to_string());
            for voice in self.previous_voices.values() {
                lines.push(format!(
                    "- {} [{}]: {}",
                    voice.agent_id,
                    voice.stance.as_str(),
                    voice.content
                ));
            }
        }
        lines.push(
            "You may maintain your view, adjust it (\"I agree with ...\", \"building on ...\"), \
             defer (\"I defer to ...\"), or dissent (\"I disagree ...\")."
                .to_string(),
        );
        lines.join("\n")
    }
}

/// Read-only view of the context an agent conditions on.
#[derive(Debug, Clone, Default)]
pub struct WorkingMemoryView {
    /// Most recent conversation messages, oldest first.
    pub conversation_history: Vec<Message>,
    pub current_time: String,
    pub deliberation: Option<DeliberationContext>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_id_format() {
        let agent = AgentDef::new("emotion", "stress");
        assert_eq!(agent.agent_id(), "emotion.stress");
    }

    #[test]
    fn test_always_on_membership() {
        assert!(AgentDef::new("inhibition", "censor").is_always_on());
        assert!(!AgentDef::new("emotion", "wellbeing").is_always_on());
    }

    #[test]
    fn test_default_roster_covers_watchers() {
        let agencies = default_agencies();
        let all_ids: Vec<String> = agencies
            .iter()
            .flat_map(|a| a.agents.iter().map(|ag| ag.agent_id()))
            .collect();
        for watcher in WATCHER_AGENTS {
            assert!(all_ids.iter().any(|id| id == watcher), "missing {watcher}");
        }
    }

    #[test]
    fn test_markerless_agencies_always_pass() {
        let sig = EventSignature::default();
        for agency in default_agencies() {
            if agency.is_markerless() {
                assert!(agency.domain_active(&sig));
            }
        }
        let emotion = AgencyDef::new("emotion", "Emotion", &["stress"]);
        assert!(!emotion.domain_active(&sig));
    }
}
