use std::collections::BTreeMap;
use std::sync::Arc;

use murmur_types::{
    Claim, ClaimType, CouncilDecision, ResponseIntent, ResponseUrgency, SpeechAct,
};
use tracing::warn;

use crate::contracts::{CompletionRequest, LanguageModel, Message};
use crate::settings::EngineSettings;
use crate::workspace::Workspace;

const GREETING_WORDS: &[&str] = &["hi", "hello", "hey", "morning", "evening"];

const ENGAGEMENT_SYSTEM_PROMPT: &str = "You are a conversation analyzer. Answer YES or NO only.";

/// The fixed consolation spoken on a safety interrupt.
pub const SAFETY_RESPONSE: &str = "I notice you might be going through something difficult. \
     I'm here to listen. Would you like to talk about what's on your mind?";

struct ClaimsAnalysis {
    observations: Vec<Claim>,
    recommendations: Vec<Claim>,
    concerns: Vec<Claim>,
    questions: Vec<Claim>,
    max_urgency: u8,
    high_urgency_count: usize,
    avg_confidence: f64,
}

/// Decides whether and how to respond, from the workspace's stance, its
/// ranked claims, and a safety flag. The only model call here is the
/// engagement classifier fallback; everything else is deterministic.
pub struct Council {
    model: Arc<dyn LanguageModel>,
    settings: Arc<EngineSettings>,
}

impl Council {
    pub fn new(model: Arc<dyn LanguageModel>, settings: Arc<EngineSettings>) -> Self {
        Self { model, settings }
    }

    pub async fn decide(&self, workspace: &Workspace, safety_interrupt: bool) -> CouncilDecision {
        if safety_interrupt {
            return Self::safety_decision();
        }

        let analysis = analyze_claims(workspace.graph.claims_for_council());

        if !self.should_speak(workspace, &analysis).await {
            return CouncilDecision::silent(
                "No response needed - user statement doesn't require reply",
            );
        }

        let urgency = determine_urgency(workspace, &analysis);
        let speech_act = build_speech_act(workspace, &analysis);
        let needs_clarification = check_clarification(workspace, &analysis);
        let thinking = format!(
            "Stance: valence={:.2}, strain={:.2} | Claims: {} total, {} high-urgency | Consensus: {:.2}",
            workspace.stance.valence,
            workspace.stance.strain,
            workspace.graph.len(),
            analysis.high_urgency_count,
            workspace.consensus_level,
        );

        CouncilDecision {
            speak: true,
            urgency,
            speech_act,
            needs_clarification,
            thinking,
        }
    }

    /// The fixed protect-path decision used by the safety interrupt.
    pub fn safety_decision() -> CouncilDecision {
        CouncilDecision {
            speak: true,
            urgency: ResponseUrgency::Critical,
            speech_act: SpeechAct {
                intent: ResponseIntent::Protect,
                key_points: vec![
                    "Acknowledge concern".to_string(),
                    "Offer support resources".to_string(),
                ],
                tone: "gentle, non-judgmental".to_string(),
                do_not: vec![
                    "Lecture".to_string(),
                    "Panic".to_string(),
                    "Dismiss".to_string(),
                ],
                asks_user: None,
            },
            needs_clarification: None,
            thinking: "Safety concern detected - responding with protective care".to_string(),
        }
    }

    async fn should_speak(&self, workspace: &Workspace, analysis: &ClaimsAnalysis) -> bool {
        // Agent findings come first.
        if !analysis.concerns.is_empty() || !analysis.questions.is_empty() {
            return true;
        }
        if analysis.max_urgency >= 2 {
            return true;
        }
        if !analysis.recommendations.is_empty() {
            return true;
        }

        // Deterministic message patterns: a trailing question mark or a
        // greeting token always warrants a reply.
        let message = workspace.user_message.trim();
        if message.ends_with('?') {
            return true;
        }
        if has_greeting_token(message) {
            return true;
        }

        // Semantic fallback: ask the tiny model whether the message
        // invites a response at all.
        match self.engagement_detector(message).await {
            Some(answer) => answer,
            // Unclear or unavailable: fall back to the pattern result
            // (already false) and any remaining agent signal.
            None => analysis.max_urgency > 0,
        }
    }

    async fn engagement_detector(&self, message: &str) -> Option<bool> {
        let request = CompletionRequest {
            messages: vec![
                Message::system(ENGAGEMENT_SYSTEM_PROMPT),
                Message::user(format!(
                    "Does this message expect, invite, or warrant a conversational response?\n\
                     Consider: Is it a question? A greeting? An invitation to chat? A request? \
                     Something that would be rude to ignore?\n\n\
                     Message: \"{message}\"\n\nAnswer YES or NO:"
                )),
            ],
            model: self.settings.models.tiny.clone(),
            temperature: 0.0,
            max_tokens: Some(10),
            reasoning_effort: None,
        };

        match self.model.complete(request).await {
            Ok(response) => {
                let answer = response.content.trim().to_uppercase();
                if answer.contains("YES") {
                    Some(true)
                } else if answer.contains("NO") {
                    Some(false)
                } else {
                    None
                }
            }
            Err(err) => {
                warn!(error = %err, "engagement detector failed, using pattern fallback");
                None
            }
        }
    }
}

fn has_greeting_token(message: &str) -> bool {
    message
        .to_lowercase()
        .split_whitespace()
        .any(|word| GREETING_WORDS.contains(&word.trim_matches(|c: char| !c.is_alphanumeric())))
}

fn analyze_claims(buckets: BTreeMap<ClaimType, Vec<Claim>>) -> ClaimsAnalysis {
    let mut analysis = ClaimsAnalysis {
        observations: Vec::new(),
        recommendations: Vec::new(),
        concerns: Vec::new(),
        questions: Vec::new(),
        max_urgency: 0,
        high_urgency_count: 0,
        avg_confidence: 0.0,
    };

    let mut total_confidence = 0u32;
    let mut count = 0u32;
    for (kind, claims) in buckets {
        for claim in &claims {
            analysis.max_urgency = analysis.max_urgency.max(claim.urgency);
            if claim.urgency >= 2 {
                analysis.high_urgency_count += 1;
            }
            total_confidence += u32::from(claim.confidence);
            count += 1;
        }
        match kind {
            ClaimType::Observation => analysis.observations = claims,
            ClaimType::Recommendation => analysis.recommendations = claims,
            ClaimType::Concern => analysis.concerns = claims,
            ClaimType::Question => analysis.questions = claims,
        }
    }
    if count > 0 {
        analysis.avg_confidence = f64::from(total_confidence) / f64::from(count);
    }
    analysis
}

fn determine_urgency(workspace: &Workspace, analysis: &ClaimsAnalysis) -> ResponseUrgency {
    if analysis.max_urgency >= 3 {
        return ResponseUrgency::Critical;
    }
    if analysis.max_urgency >= 2 || workspace.stance.strain > 0.6 {
        return ResponseUrgency::High;
    }
    if analysis.high_urgency_count > 0 || !analysis.concerns.is_empty() {
        return ResponseUrgency::Medium;
    }
    ResponseUrgency::Low
}

fn determine_intent(workspace: &Workspace, analysis: &ClaimsAnalysis) -> ResponseIntent {
    if analysis.concerns.iter().any(|c| c.urgency >= 2) {
        return ResponseIntent::Protect;
    }
    if !analysis.questions.is_empty() {
        return ResponseIntent::Clarify;
    }
    if workspace.stance.strain > 0.5 {
        return ResponseIntent::Witness;
    }
    if !analysis.recommendations.is_empty() {
        return ResponseIntent::Guide;
    }
    if workspace.stance.valence > 0.3 {
        return ResponseIntent::Celebrate;
    }
    ResponseIntent::Witness
}

fn determine_tone(workspace: &Workspace) -> String {
    let stance = &workspace.stance;
    let mut tones = Vec::new();
    if stance.strain > 0.5 {
        tones.push("gentle");
    }
    if stance.valence < -0.3 {
        tones.push("supportive");
    }
    if stance.closeness > 0.5 {
        tones.push("warm");
    }
    if stance.arousal > 0.6 {
        tones.push("calm");
    }
    if stance.certainty < 0.4 {
        tones.push("exploratory");
    }
    if tones.is_empty() {
        tones = vec!["friendly", "present"];
    }
    tones.join(", ")
}

fn build_speech_act(workspace: &Workspace, analysis: &ClaimsAnalysis) -> SpeechAct {
    let intent = determine_intent(workspace, analysis);

    // Top 2 observations + top 2 recommendations + top 1 concern,
    // trimmed to 4 total.
    let mut key_points = Vec::new();
    for claim in analysis.observations.iter().take(2) {
        key_points.push(format!("Acknowledge: {}", claim.text));
    }
    for claim in analysis.recommendations.iter().take(2) {
        key_points.push(format!("Suggest: {}", claim.text));
    }
    for claim in analysis.concerns.iter().take(1) {
        key_points.push(format!("Address: {}", claim.text));
    }
    key_points.truncate(4);

    let mut do_not: Vec<String> = workspace.constraints.clone();
    if workspace.stance.strain > 0.4 {
        do_not.push("Don't minimize or dismiss feelings".to_string());
    }
    if workspace.stance.closeness < 0.3 {
        do_not.push("Don't be overly familiar".to_string());
    }
    if analysis.avg_confidence < 1.5 && workspace.graph.len() > 0 {
        do_not.push("Don't present uncertain observations as facts".to_string());
    }
    do_not.truncate(5);

    let asks: Vec<String> = analysis
        .questions
        .iter()
        .take(2)
        .map(|c| c.text.clone())
        .collect();

    SpeechAct {
        intent,
        key_points,
        tone: determine_tone(workspace),
        do_not,
        asks_user: if asks.is_empty() { None } else { Some(asks) },
    }
}

fn check_clarification(workspace: &Workspace, analysis: &ClaimsAnalysis) -> Option<String> {
    if let Some(ask) = workspace.pending_asks.first() {
        return Some(ask.clone());
    }
    analysis
        .recommendations
        .iter()
        .find(|c| c.urgency >= 2 && c.confidence <= 1)
        .map(|c| format!("Would you like me to elaborate on: {}?", c.text))
}
