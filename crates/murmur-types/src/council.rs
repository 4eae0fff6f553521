use serde::{Deserialize, Serialize};

/// How urgently the response should land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseUrgency {
    Low,
    Medium,
    High,
    Critical,
}

impl ResponseUrgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseUrgency::Low => "low",
            ResponseUrgency::Medium => "medium",
            ResponseUrgency::High => "high",
            ResponseUrgency::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<ResponseUrgency> {
        match s {
            "low" => Some(ResponseUrgency::Low),
            "medium" => Some(ResponseUrgency::Medium),
            "high" => Some(ResponseUrgency::High),
            "critical" => Some(ResponseUrgency::Critical),
            _ => None,
        }
    }
}

/// The primary intent of a speech act.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseIntent {
    /// Acknowledge and reflect. The default.
    Witness,
    /// Ask the discriminating question.
    Clarify,
    /// Offer a concrete direction.
    Guide,
    /// Respond to risk with care.
    Protect,
    /// Mark something going well.
    Celebrate,
}

impl ResponseIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseIntent::Witness => "witness",
            ResponseIntent::Clarify => "clarify",
            ResponseIntent::Guide => "guide",
            ResponseIntent::Protect => "protect",
            ResponseIntent::Celebrate => "celebrate",
        }
    }
}

/// A structured description of what to say. Rendering to natural language
/// is the voice contract's job; the speech act adds no wording of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechAct {
    pub intent: ResponseIntent,
    /// At most four points, already ordered.
    pub key_points: Vec<String>,
    /// Comma-joined tone tokens, e.g. "gentle, supportive".
    pub tone: String,
    /// At most five constraints.
    pub do_not: Vec<String>,
    pub asks_user: Option<Vec<String>>,
}

impl Default for SpeechAct {
    fn default() -> Self {
        Self {
            intent: ResponseIntent::Witness,
            key_points: Vec::new(),
            tone: "friendly, present".to_string(),
            do_not: Vec::new(),
            asks_user: None,
        }
    }
}

/// The council's verdict for a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouncilDecision {
    pub speak: bool,
    pub urgency: ResponseUrgency,
    pub speech_act: SpeechAct,
    pub needs_clarification: Option<String>,
    /// Debug trace explaining how the decision fell out.
    pub thinking: String,
}

impl CouncilDecision {
    pub fn silent(thinking: impl Into<String>) -> Self {
        Self {
            speak: false,
            urgency: ResponseUrgency::Low,
            speech_act: SpeechAct::default(),
            needs_clarification: None,
            thinking: thinking.into(),
        }
    }
}
