use serde::{Deserialize, Serialize};

const EMOTION_WORDS: &[&str] = &[
    "feel",
    "feeling",
    "happy",
    "sad",
    "angry",
    "anxious",
    "stressed",
    "tired",
];

const PLANNING_WORDS: &[&str] = &[
    "plan",
    "goal",
    "task",
    "deadline",
    "schedule",
    "tomorrow",
    "next week",
];

const SOCIAL_WORDS: &[&str] = &[
    "friend",
    "family",
    "relationship",
    "they said",
    "meeting",
    "people",
];

const PROBLEM_WORDS: &[&str] = &["problem", "issue", "bug", "error", "wrong", "broken", "help"];

const ACTION_WORDS: &[&str] = &["do", "make", "create", "build", "start", "finish", "run"];

const URGENT_WORDS: &[&str] = &["urgent", "asap", "immediately", "now"];

/// Cheap routing features extracted from an input event. Agencies use these
/// to gate which agents run; the scheduler uses them to pick deepening
/// agencies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventSignature {
    pub event_type: String,
    pub has_emotion_markers: bool,
    pub has_planning_markers: bool,
    pub has_social_markers: bool,
    pub has_problem_markers: bool,
    pub has_action_markers: bool,
    pub is_question: bool,
    pub is_urgent: bool,
    pub word_count: usize,
}

impl EventSignature {
    pub fn from_text(event_type: impl Into<String>, content: &str) -> Self {
        let lower = content.to_lowercase();
        let hit = |words: &[&str]| words.iter().any(|w| lower.contains(w));

        Self {
            event_type: event_type.into(),
            has_emotion_markers: hit(EMOTION_WORDS),
            has_planning_markers: hit(PLANNING_WORDS),
            has_social_markers: hit(SOCIAL_WORDS),
            has_problem_markers: hit(PROBLEM_WORDS),
            has_action_markers: hit(ACTION_WORDS),
            is_question: content.contains('?'),
            is_urgent: hit(URGENT_WORDS),
            word_count: content.split_whitespace().count(),
        }
    }
}
