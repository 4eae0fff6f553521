use std::sync::Arc;

use murmur_types::{CouncilDecision, ResponseIntent};
use tracing::warn;

use crate::contracts::{VoiceRenderer, VoiceResult};

/// Render the decision through the voice contract, falling back to a
/// deterministic per-intent template when the renderer fails. The
/// fallback adds no content beyond the decision's own key points.
pub async fn render_with_fallback(
    renderer: &Arc<dyn VoiceRenderer>,
    decision: &CouncilDecision,
    last_user_message: &str,
    self_model: &str,
) -> VoiceResult {
    match renderer.render(decision, last_user_message, self_model).await {
        Ok(mut result) => {
            // Strip stray wrapping quotes some renderers add.
            let text = result.text.trim();
            if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
                result.text = text[1..text.len() - 1].to_string();
            } else {
                result.text = text.to_string();
            }
            result
        }
        Err(err) => {
            warn!(error = %err, "voice renderer failed, using template fallback");
            VoiceResult {
                text: fallback_render(decision),
                latency_ms: 0,
            }
        }
    }
}

/// Deterministic template keyed by intent.
pub fn fallback_render(decision: &CouncilDecision) -> String {
    let intro = match decision.speech_act.intent {
        ResponseIntent::Witness => "I'm noticing that",
        ResponseIntent::Clarify => "I'm curious about",
        ResponseIntent::Guide => "You might consider",
        ResponseIntent::Protect => "I want to flag that",
        ResponseIntent::Celebrate => "It's worth marking that",
    };
    let points = decision
        .speech_act
        .key_points
        .iter()
        .map(|p| strip_prefix(p))
        .collect::<Vec<_>>()
        .join(" ");
    if points.is_empty() {
        format!("{intro} I'm here and listening.")
    } else {
        format!("{intro} {points}")
    }
}

fn strip_prefix(point: &str) -> &str {
    for prefix in ["Acknowledge: ", "Suggest: ", "Address: "] {
        if let Some(rest) = point.strip_prefix(prefix) {
            return rest;
        }
    }
    point
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Result;
    use async_trait::async_trait;
    use murmur_types::{ResponseUrgency, SpeechAct};

    struct QuotingRenderer;

    #[async_trait]
    impl VoiceRenderer for QuotingRenderer {
        async fn render(
            &self,
            _decision: &CouncilDecision,
            _last_user_message: &str,
            _self_model: &str,
        ) -> Result<VoiceResult> {
            Ok(VoiceResult {
                text: "\"Hello there.\"".to_string(),
                latency_ms: 5,
            })
        }
    }

    struct BrokenRenderer;

    #[async_trait]
    impl VoiceRenderer for BrokenRenderer {
        async fn render(
            &self,
            _decision: &CouncilDecision,
            _last_user_message: &str,
            _self_model: &str,
        ) -> Result<VoiceResult> {
            Err(crate::Error::Transport("render backend down".to_string()))
        }
    }

    fn decision(intent: ResponseIntent, key_points: Vec<String>) -> CouncilDecision {
        CouncilDecision {
            speak: true,
            urgency: ResponseUrgency::Low,
            speech_act: SpeechAct {
                intent,
                key_points,
                ..Default::default()
            },
            needs_clarification: None,
            thinking: String::new(),
        }
    }

    #[tokio::test]
    async fn test_wrapping_quotes_stripped() {
        let renderer: Arc<dyn VoiceRenderer> = Arc::new(QuotingRenderer);
        let result = render_with_fallback(
            &renderer,
            &decision(ResponseIntent::Witness, vec![]),
            "hi",
            "",
        )
        .await;
        assert_eq!(result.text, "Hello there.");
    }

    #[tokio::test]
    async fn test_fallback_on_renderer_failure() {
        let renderer: Arc<dyn VoiceRenderer> = Arc::new(BrokenRenderer);
        let result = render_with_fallback(
            &renderer,
            &decision(
                ResponseIntent::Guide,
                vec!["Suggest: a short walk".to_string()],
            ),
            "hi",
            "",
        )
        .await;
        assert_eq!(result.text, "You might consider a short walk");
    }

    #[test]
    fn test_fallback_never_empty() {
        let text = fallback_render(&decision(ResponseIntent::Witness, vec![]));
        assert!(!text.is_empty());
    }
}
