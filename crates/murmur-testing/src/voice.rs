use async_trait::async_trait;
use murmur_engine::Result;
use murmur_engine::contracts::{VoiceRenderer, VoiceResult};
use murmur_types::CouncilDecision;

/// Deterministic renderer: joins the decision's key points into a short
/// sentence, or falls back to a fixed line. Produces text that clears the
/// critics so pipeline tests exercise the happy path by default.
pub struct TemplateVoice;

#[async_trait]
impl VoiceRenderer for TemplateVoice {
    async fn render(
        &self,
        decision: &CouncilDecision,
        _last_user_message: &str,
        _self_model: &str,
    ) -> Result<VoiceResult> {
        let points: Vec<&str> = decision
            .speech_act
            .key_points
            .iter()
            .map(|p| {
                p.strip_prefix("Acknowledge: ")
                    .or_else(|| p.strip_prefix("Suggest: "))
                    .or_else(|| p.strip_prefix("Address: "))
                    .unwrap_or(p)
            })
            .collect();

        let text = if points.is_empty() {
            "Here with you. What's on your mind?".to_string()
        } else {
            format!("Worth noting: {}.", points.join("; "))
        };

        Ok(VoiceResult {
            text,
            latency_ms: 1,
        })
    }
}
