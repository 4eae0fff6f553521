use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::contracts::ReasoningEffort;

/// Known thinking-capable model id fragments.
const THINKING_MODEL_PATTERNS: &[&str] =
    &[":thinking", "deepseek-r1", "o1", "o3", "gemini-2.5", "qwq"];

/// True when the model id names a model with a native reasoning channel.
pub fn is_thinking_model(model_id: &str) -> bool {
    let lower = model_id.to_lowercase();
    THINKING_MODEL_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Model ids by capability tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTiers {
    pub tiny: String,
    pub small: String,
    pub medium: String,
    pub large: String,
}

impl Default for ModelTiers {
    fn default() -> Self {
        Self {
            tiny: "meta-llama/llama-3.1-8b-instruct".to_string(),
            small: "meta-llama/llama-3.3-70b-instruct".to_string(),
            medium: "anthropic/claude-3.5-haiku".to_string(),
            large: "anthropic/claude-3.7-sonnet".to_string(),
        }
    }
}

/// Per-call reasoning effort levels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffortLevels {
    pub agent_assess: ReasoningEffort,
    pub council_synthesis: ReasoningEffort,
}

impl Default for EffortLevels {
    fn default() -> Self {
        Self {
            agent_assess: ReasoningEffort::Minimal,
            council_synthesis: ReasoningEffort::Low,
        }
    }
}

/// Tunables for the engine core. The runtime crate populates this from the
/// environment; tests construct it directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Deadline for a single agent assess call.
    pub agent_timeout_ms: u64,
    /// Deadline for a whole agency fan-out.
    pub agency_timeout_ms: u64,
    pub deliberation_max_rounds: u32,
    pub deliberation_consensus_threshold: f64,
    /// Attach reasoning effort to agent calls made inside deliberation.
    pub deliberation_use_thinking: bool,
    /// Cap on agents selected in one scheduler pass; `None` means no cap.
    pub max_agents_per_cycle: Option<usize>,
    /// Cooldown window applied when an agent fires.
    pub cooldown_seconds: f64,
    pub models: ModelTiers,
    pub efforts: EffortLevels,
    /// Root of the per-agent prompt files (`{agency}/{agent}.md`).
    pub prompts_dir: PathBuf,
    /// Identity section handed to the voice renderer.
    pub self_model: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            agent_timeout_ms: 2_000,
            agency_timeout_ms: 5_000,
            deliberation_max_rounds: 3,
            deliberation_consensus_threshold: 0.8,
            deliberation_use_thinking: false,
            max_agents_per_cycle: None,
            cooldown_seconds: 30.0,
            models: ModelTiers::default(),
            efforts: EffortLevels::default(),
            prompts_dir: PathBuf::from("prompts"),
            self_model: "A steady, honest ambient companion. Present, not performative."
                .to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thinking_model_detection() {
        assert!(is_thinking_model("anthropic/claude-3.7-sonnet:thinking"));
        assert!(is_thinking_model("deepseek/deepseek-r1-distill-llama-70b"));
        assert!(is_thinking_model("openai/o3-mini"));
        assert!(!is_thinking_model("meta-llama/llama-3.1-8b-instruct"));
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let settings = EngineSettings::default();
        assert_eq!(settings.agent_timeout_ms, 2_000);
        assert_eq!(settings.agency_timeout_ms, 5_000);
        assert_eq!(settings.deliberation_max_rounds, 3);
        assert_eq!(settings.deliberation_consensus_threshold, 0.8);
        assert_eq!(settings.cooldown_seconds, 30.0);
    }
}
