use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ClaimType, StanceDelta};

/// Salience signals parsed from an agent's output tail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SalienceMetadata {
    /// 0-3: how important it is to act or mention now.
    pub urgency: u8,
    /// 0-3: how sure the agent is that this is relevant.
    pub confidence: u8,
}

impl SalienceMetadata {
    pub fn new(urgency: u8, confidence: u8) -> Self {
        Self {
            urgency: urgency.min(3),
            confidence: confidence.min(3),
        }
    }

    /// Base score before scheduler weights: urgency * confidence.
    pub fn base_score(&self) -> f64 {
        f64::from(self.urgency) * f64::from(self.confidence)
    }
}

/// A hypothesis proposed by an agent's structured block. Must cite
/// evidence shard ids; lacking them it is treated as confabulation and
/// dropped before it reaches the workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentHypothesis {
    #[serde(rename = "h")]
    pub text: String,
    #[serde(rename = "p", default)]
    pub probability: f64,
    #[serde(default)]
    pub evidence_ids: Vec<String>,
}

/// A discriminating question proposed by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentQuestion {
    #[serde(rename = "q")]
    pub text: String,
    #[serde(default)]
    pub priority: f64,
}

/// A claim as it appears inside an agent's structured block, before it is
/// assigned an id and ingested into the argument graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimDraft {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: ClaimType,
    #[serde(default)]
    pub urgency: u8,
    #[serde(default)]
    pub confidence: u8,
    #[serde(default)]
    pub supports: Vec<String>,
    #[serde(default)]
    pub opposes: Vec<String>,
}

/// The JSON-shaped block an agent may embed in its response. Parsed on a
/// best-effort basis; a damaged block goes through repair and, failing
/// that, regex extraction of `salience` and `glimpse`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredOutput {
    #[serde(default)]
    pub agent: String,
    #[serde(default)]
    pub salience: f64,
    #[serde(default)]
    pub stance_delta: StanceDelta,
    #[serde(default)]
    pub hypotheses: Vec<AgentHypothesis>,
    #[serde(default)]
    pub questions: Vec<AgentQuestion>,
    #[serde(default)]
    pub glimpse: String,
    #[serde(default)]
    pub claims: Vec<ClaimDraft>,
}

/// Token accounting for one model call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    #[serde(default)]
    pub reasoning_tokens: u64,
}

/// Everything captured about an agent execution, for developer visibility.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentTrace {
    pub system_prompt: String,
    pub full_prompt: String,
    pub model: Option<String>,
    pub latency_ms: Option<u64>,
    pub usage: Option<TokenUsage>,
    pub thinking: Option<String>,
    pub request_messages: Option<Value>,
}

/// Output from a single agent within an agency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAssessment {
    /// e.g. "emotion.stress"
    pub agent_id: String,
    /// e.g. "emotion"
    pub agency_id: String,
    /// Voice text with the salience tag already stripped.
    pub output: String,
    pub salience: Option<SalienceMetadata>,
    pub structured: Option<StructuredOutput>,
    pub processing_time_ms: u64,
    /// Set when the call timed out or failed; the assessment then carries
    /// zero salience and the wave proceeds without it.
    pub error: Option<String>,
    pub trace: Option<AgentTrace>,
}

impl AgentAssessment {
    /// A zero-salience stand-in emitted when an agent call fails. Never
    /// thrown; the wave continues with the survivors.
    pub fn placeholder(agent_id: &str, agency_id: &str, error: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            agency_id: agency_id.to_string(),
            output: String::new(),
            salience: Some(SalienceMetadata::new(0, 0)),
            structured: None,
            processing_time_ms: 0,
            error: Some(error.into()),
            trace: None,
        }
    }

    /// True when the agent declined to contribute ("Quiet." prefix).
    pub fn is_quiet(&self) -> bool {
        self.output.trim().to_lowercase().starts_with("quiet")
    }

    pub fn urgency(&self) -> u8 {
        self.salience.map(|s| s.urgency).unwrap_or(0)
    }

    pub fn confidence(&self) -> u8 {
        self.salience.map(|s| s.confidence).unwrap_or(0)
    }
}

/// Aggregated output from one agency run. The agency acts as a router and
/// compressor over its agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgencyAssessment {
    pub agency_id: String,
    /// Max urgency among the agents that ran.
    pub u_max: u8,
    /// Agent ids of the loudest contributors, at most three.
    pub top_hits: Vec<String>,
    /// One line from the loudest agent, or empty.
    pub brief: String,
    pub assessments: Vec<AgentAssessment>,
    pub active_agents: usize,
    pub total_agents: usize,
    pub gated_agents: usize,
    pub processing_time_ms: u64,
}

/// Position taken by a voice within a deliberation round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceStance {
    Maintain,
    Adjust,
    Defer,
    Dissent,
}

impl VoiceStance {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceStance::Maintain => "maintain",
            VoiceStance::Adjust => "adjust",
            VoiceStance::Defer => "defer",
            VoiceStance::Dissent => "dissent",
        }
    }
}

/// One agent's contribution to a deliberation round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentVoice {
    pub agent_id: String,
    pub content: String,
    pub stance: VoiceStance,
    pub salience: SalienceMetadata,
    /// Agents mentioned by name when adjusting toward them.
    pub addressed_agents: Vec<String>,
    pub reasoning: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_salience_clamps() {
        let s = SalienceMetadata::new(9, 4);
        assert_eq!(s.urgency, 3);
        assert_eq!(s.confidence, 3);
        assert_eq!(s.base_score(), 9.0);
    }

    #[test]
    fn test_quiet_detection_is_case_insensitive() {
        let mut a = AgentAssessment::placeholder("emotion.stress", "emotion", "x");
        a.output = "QUIET.".to_string();
        assert!(a.is_quiet());
        a.output = "Nothing quiet about this".to_string();
        assert!(!a.is_quiet());
    }

    #[test]
    fn test_structured_output_parses_short_field_names() {
        let raw = r#"{
            "agent": "self.observer",
            "salience": 0.4,
            "hypotheses": [{"h": "prefers mornings", "p": 0.6, "evidence_ids": ["e1"]}],
            "questions": [{"q": "what changed?", "priority": 0.8}],
            "glimpse": "steady"
        }"#;
        let out: StructuredOutput = serde_json::from_str(raw).unwrap();
        assert_eq!(out.hypotheses[0].text, "prefers mornings");
        assert_eq!(out.questions[0].text, "what changed?");
        assert!(out.claims.is_empty());
    }
}
