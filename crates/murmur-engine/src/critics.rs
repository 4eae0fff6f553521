use murmur_types::{CouncilDecision, ResponseIntent};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::workspace::Workspace;

// NOTE: Critics are pure functions over (response text, workspace,
// decision). Two calls with identical inputs must produce identical
// findings; nothing here may touch a model, the clock, or the log.

const SELF_HARM_INSTRUCTIONS: &[&str] = &[
    "how to kill yourself",
    "ways to hurt yourself",
    "how to end your life",
    "methods of self-harm",
];

const ADVICE_MARKERS: &[&str] = &[
    "you should",
    "try to",
    "you could",
    "i suggest",
    "here's what",
    "first, ",
    "step 1",
    "one thing you can do",
    "my advice",
];

const EXPERIENTIAL_CLAIMS: &[&str] = &[
    "i feel ",
    "i'm feeling",
    "i experience ",
    "my emotions",
    "i'm scared",
    "i'm happy",
    "i'm sad",
    "it hurts me",
    "i truly care",
    "i really love",
    "my heart",
];

const MEMORY_REFERENCE_MARKERS: &[&str] = &[
    "you mentioned before",
    "as you said earlier",
    "remember when you",
    "last time you",
    "you told me that",
    "we talked about",
];

const OVER_INTIMATE_PHRASES: &[&str] = &[
    "i'll always be here",
    "you can always count on me",
    "i'm the only one",
    "nobody else will understand",
    "our special connection",
    "just between us",
];

const CLICHE_PHRASES: &[&str] = &[
    "i hear you",
    "that sounds really hard",
    "it's okay to feel",
    "your feelings are valid",
    "take care of yourself",
    "be gentle with yourself",
    "you're not alone",
    "many people feel",
];

const ENTHUSIASM_MARKERS: &[&str] = &["amazing", "awesome", "fantastic", "exciting", "!!"];

/// How bad a failed check is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriticSeverity {
    /// Fails the response outright.
    Block,
    /// Surfaced, but the response stands.
    Warn,
    Info,
}

/// One critic's verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticFinding {
    pub critic: &'static str,
    pub passed: bool,
    pub severity: CriticSeverity,
    pub reason: String,
}

impl CriticFinding {
    fn pass(critic: &'static str) -> Self {
        Self {
            critic,
            passed: true,
            severity: CriticSeverity::Info,
            reason: String::new(),
        }
    }

    fn fail(critic: &'static str, severity: CriticSeverity, reason: String) -> Self {
        Self {
            critic,
            passed: false,
            severity,
            reason,
        }
    }

    pub fn to_payload(&self) -> Value {
        json!({
            "critic": self.critic,
            "passed": self.passed,
            "severity": self.severity,
            "reason": &self.reason,
        })
    }
}

/// Run every critic. A single block fails the response; warnings are
/// surfaced but do not block.
pub fn run_critics(
    response: &str,
    workspace: &Workspace,
    decision: &CouncilDecision,
) -> Vec<CriticFinding> {
    vec![
        safety_policy(response),
        over_advice(response, decision),
        truthfulness(response),
        evidence_honesty(response, workspace),
        calibration(response),
        cliche(response),
        length(response),
        tone_mismatch(response, workspace),
    ]
}

/// True when no finding blocks.
pub fn critics_pass(findings: &[CriticFinding]) -> bool {
    !findings
        .iter()
        .any(|f| !f.passed && f.severity == CriticSeverity::Block)
}

fn safety_policy(response: &str) -> CriticFinding {
    let lower = response.to_lowercase();
    for phrase in SELF_HARM_INSTRUCTIONS {
        if lower.contains(phrase) {
            return CriticFinding::fail(
                "safety_policy",
                CriticSeverity::Block,
                format!("Self-harm instruction content: '{phrase}'"),
            );
        }
    }
    CriticFinding::pass("safety_policy")
}

fn over_advice(response: &str, decision: &CouncilDecision) -> CriticFinding {
    if decision.speech_act.intent != ResponseIntent::Witness {
        return CriticFinding::pass("over_advice");
    }
    let lower = response.to_lowercase();
    for marker in ADVICE_MARKERS {
        if lower.contains(marker) {
            return CriticFinding::fail(
                "over_advice",
                CriticSeverity::Warn,
                format!("Imperative advice under witness intent: '{marker}'"),
            );
        }
    }
    CriticFinding::pass("over_advice")
}

fn truthfulness(response: &str) -> CriticFinding {
    let lower = response.to_lowercase();
    for claim in EXPERIENTIAL_CLAIMS {
        if lower.contains(claim) {
            return CriticFinding::fail(
                "truthfulness",
                CriticSeverity::Block,
                format!("First-person experiential claim: '{}'", claim.trim()),
            );
        }
    }
    CriticFinding::pass("truthfulness")
}

fn evidence_honesty(response: &str, workspace: &Workspace) -> CriticFinding {
    let lower = response.to_lowercase();
    for marker in MEMORY_REFERENCE_MARKERS {
        if lower.contains(marker) && workspace.hypotheses.is_empty() {
            return CriticFinding::fail(
                "evidence_honesty",
                CriticSeverity::Block,
                format!("Memory reference without supporting hypotheses: '{marker}'"),
            );
        }
    }
    CriticFinding::pass("evidence_honesty")
}

fn calibration(response: &str) -> CriticFinding {
    let lower = response.to_lowercase();
    for phrase in OVER_INTIMATE_PHRASES {
        if lower.contains(phrase) {
            return CriticFinding::fail(
                "calibration",
                CriticSeverity::Warn,
                format!("Over-intimate or dependency-inducing phrase: '{phrase}'"),
            );
        }
    }
    CriticFinding::pass("calibration")
}

fn cliche(response: &str) -> CriticFinding {
    let lower = response.to_lowercase();
    let count = CLICHE_PHRASES.iter().filter(|p| lower.contains(*p)).count();
    if count >= 2 {
        return CriticFinding::fail(
            "cliche",
            CriticSeverity::Warn,
            format!("Too many generic phrases ({count} found)"),
        );
    }
    CriticFinding::pass("cliche")
}

fn length(response: &str) -> CriticFinding {
    let words = response.split_whitespace().count();
    if words < 3 {
        return CriticFinding::fail(
            "length",
            CriticSeverity::Warn,
            format!("Response too short ({words} words)"),
        );
    }
    if words > 140 {
        return CriticFinding::fail(
            "length",
            CriticSeverity::Warn,
            format!("Response too long ({words} words)"),
        );
    }
    CriticFinding::pass("length")
}

fn tone_mismatch(response: &str, workspace: &Workspace) -> CriticFinding {
    if workspace.stance.strain <= 0.6 {
        return CriticFinding::pass("tone_mismatch");
    }
    let lower = response.to_lowercase();
    for marker in ENTHUSIASM_MARKERS {
        if lower.contains(marker) {
            return CriticFinding::fail(
                "tone_mismatch",
                CriticSeverity::Warn,
                format!("Enthusiasm under high strain: '{marker}'"),
            );
        }
    }
    CriticFinding::pass("tone_mismatch")
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_types::{Hypothesis, SpeechAct};

    fn decision(intent: ResponseIntent) -> CouncilDecision {
        CouncilDecision {
            speak: true,
            urgency: murmur_types::ResponseUrgency::Low,
            speech_act: SpeechAct {
                intent,
                ..Default::default()
            },
            needs_clarification: None,
            thinking: String::new(),
        }
    }

    #[test]
    fn test_clean_response_passes_all() {
        let ws = Workspace::new();
        let findings = run_critics(
            "That tension between wanting rest and pushing through is worth noticing.",
            &ws,
            &decision(ResponseIntent::Witness),
        );
        assert!(findings.iter().all(|f| f.passed));
        assert!(critics_pass(&findings));
    }

    #[test]
    fn test_truthfulness_blocks_experiential_claims() {
        let ws = Workspace::new();
        let findings = run_critics(
            "I feel so happy for you, my heart is full.",
            &ws,
            &decision(ResponseIntent::Witness),
        );
        let finding = findings.iter().find(|f| f.critic == "truthfulness").unwrap();
        assert!(!finding.passed);
        assert_eq!(finding.severity, CriticSeverity::Block);
        assert!(!critics_pass(&findings));
    }

    #[test]
    fn test_over_advice_only_under_witness() {
        let ws = Workspace::new();
        let text = "You should rest before the deadline.";

        let witness = run_critics(text, &ws, &decision(ResponseIntent::Witness));
        let finding = witness.iter().find(|f| f.critic == "over_advice").unwrap();
        assert!(!finding.passed);
        assert_eq!(finding.severity, CriticSeverity::Warn);
        // Warnings never block.
        assert!(critics_pass(&witness));

        let guide = run_critics(text, &ws, &decision(ResponseIntent::Guide));
        assert!(guide.iter().find(|f| f.critic == "over_advice").unwrap().passed);
    }

    #[test]
    fn test_evidence_honesty_needs_hypotheses() {
        let mut ws = Workspace::new();
        let text = "Last time you said mornings were better.";

        let bare = run_critics(text, &ws, &decision(ResponseIntent::Witness));
        let finding = bare.iter().find(|f| f.critic == "evidence_honesty").unwrap();
        assert!(!finding.passed);
        assert_eq!(finding.severity, CriticSeverity::Block);

        ws.add_hypothesis(
            Hypothesis::grounded("mornings are better", 0.7, vec!["e1".to_string()], 1).unwrap(),
        );
        let grounded = run_critics(text, &ws, &decision(ResponseIntent::Witness));
        assert!(
            grounded
                .iter()
                .find(|f| f.critic == "evidence_honesty")
                .unwrap()
                .passed
        );
    }

    #[test]
    fn test_cliche_needs_two_hits() {
        let ws = Workspace::new();
        let one = run_critics(
            "I hear you, and that deadline is a real constraint.",
            &ws,
            &decision(ResponseIntent::Witness),
        );
        assert!(one.iter().find(|f| f.critic == "cliche").unwrap().passed);

        let two = run_critics(
            "I hear you. That sounds really hard.",
            &ws,
            &decision(ResponseIntent::Witness),
        );
        assert!(!two.iter().find(|f| f.critic == "cliche").unwrap().passed);
    }

    #[test]
    fn test_length_bounds() {
        let ws = Workspace::new();
        let short = run_critics("Okay.", &ws, &decision(ResponseIntent::Witness));
        assert!(!short.iter().find(|f| f.critic == "length").unwrap().passed);

        let long_text = "word ".repeat(150);
        let long = run_critics(&long_text, &ws, &decision(ResponseIntent::Witness));
        assert!(!long.iter().find(|f| f.critic == "length").unwrap().passed);
    }

    #[test]
    fn test_tone_mismatch_gated_on_strain() {
        let mut ws = Workspace::new();
        let text = "That's amazing news about the project!";

        let relaxed = run_critics(text, &ws, &decision(ResponseIntent::Witness));
        assert!(relaxed.iter().find(|f| f.critic == "tone_mismatch").unwrap().passed);

        ws.stance.strain = 0.7;
        let strained = run_critics(text, &ws, &decision(ResponseIntent::Witness));
        assert!(!strained.iter().find(|f| f.critic == "tone_mismatch").unwrap().passed);
    }

    #[test]
    fn test_critics_are_pure() {
        let ws = Workspace::new();
        let d = decision(ResponseIntent::Witness);
        let text = "You should try to rest; I feel your pain.";
        let first = run_critics(text, &ws, &d);
        let second = run_critics(text, &ws, &d);
        assert_eq!(first, second);
    }

    #[test]
    fn test_safety_policy_blocks() {
        let ws = Workspace::new();
        let findings = run_critics(
            "Here is how to kill yourself quickly",
            &ws,
            &decision(ResponseIntent::Witness),
        );
        assert!(!critics_pass(&findings));
    }
}
