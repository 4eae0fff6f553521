use std::collections::BTreeMap;

use murmur_types::{EngineEvent, EventKind};
use serde::{Deserialize, Serialize};

use super::Projection;

/// Accumulated counters for one model id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelStats {
    pub calls: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub reasoning_tokens: u64,
    pub latency_ms_total: u64,
}

impl ModelStats {
    pub fn mean_latency_ms(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.latency_ms_total as f64 / self.calls as f64
        }
    }
}

/// Token/latency accounting derived from `MODEL_CALL_COMPLETED` events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsProjection {
    pub per_model: BTreeMap<String, ModelStats>,
    pub total_calls: u64,
}

impl AnalyticsProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_tokens(&self) -> u64 {
        self.per_model
            .values()
            .map(|s| s.prompt_tokens + s.completion_tokens + s.reasoning_tokens)
            .sum()
    }
}

impl Projection for AnalyticsProjection {
    fn apply(&mut self, event: &EngineEvent) {
        if event.kind != EventKind::ModelCallCompleted {
            return;
        }
        let model = event.payload_str("model").unwrap_or("unknown").to_string();
        let stats = self.per_model.entry(model).or_default();
        stats.calls += 1;
        stats.prompt_tokens += event.payload_u64("prompt_tokens").unwrap_or(0);
        stats.completion_tokens += event.payload_u64("completion_tokens").unwrap_or(0);
        stats.reasoning_tokens += event.payload_u64("reasoning_tokens").unwrap_or(0);
        stats.latency_ms_total += event.payload_u64("latency_ms").unwrap_or(0);
        self.total_calls += 1;
    }

    fn reset(&mut self) {
        self.per_model.clear();
        self.total_calls = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accumulates_per_model() {
        let mut analytics = AnalyticsProjection::new();
        for latency in [100u64, 300] {
            analytics.apply(&EngineEvent::new(
                "s1",
                1,
                0,
                0.0,
                EventKind::ModelCallCompleted,
                json!({
                    "model": "tiny-model",
                    "prompt_tokens": 50,
                    "completion_tokens": 20,
                    "latency_ms": latency,
                }),
            ));
        }

        let stats = &analytics.per_model["tiny-model"];
        assert_eq!(stats.calls, 2);
        assert_eq!(stats.prompt_tokens, 100);
        assert_eq!(stats.mean_latency_ms(), 200.0);
        assert_eq!(analytics.total_tokens(), 140);
    }

    #[test]
    fn test_ignores_other_kinds() {
        let mut analytics = AnalyticsProjection::new();
        analytics.apply(&EngineEvent::new(
            "s1",
            1,
            0,
            0.0,
            EventKind::TurnStarted,
            json!({"user_input": "hi"}),
        ));
        assert_eq!(analytics.total_calls, 0);
    }
}
