use murmur_types::ModulatorKind;
use serde::{Deserialize, Serialize};

/// EMA smoothing factor for rolling salience.
pub const ROLLING_SALIENCE_ALPHA: f64 = 0.3;

/// Window over which the cooldown penalty decays to zero.
pub const COOLDOWN_PENALTY_WINDOW_SECONDS: f64 = 60.0;

/// Seconds after which an agent earns the recency boost again.
pub const RECENCY_BOOST_AFTER_SECONDS: f64 = 300.0;

/// Per-agent firing history. Timestamps are monotonic seconds supplied by
/// the caller so the scheduler stays deterministic under test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentActivationState {
    pub agent_id: String,
    pub last_fired: Option<f64>,
    pub cooldown_until: Option<f64>,
    pub fire_count: u64,
    /// Exponential moving average of raw salience scores.
    pub rolling_salience: f64,
    /// Higher for interrupt-capable roles, lower for known-verbose ones.
    pub archetype_weight: f64,
}

impl AgentActivationState {
    pub fn new(agent_id: impl Into<String>, archetype_weight: f64) -> Self {
        Self {
            agent_id: agent_id.into(),
            last_fired: None,
            cooldown_until: None,
            fire_count: 0,
            rolling_salience: 0.0,
            archetype_weight,
        }
    }

    pub fn mark_fired(&mut self, now: f64, cooldown_seconds: f64) {
        self.last_fired = Some(now);
        self.fire_count += 1;
        if cooldown_seconds > 0.0 {
            self.cooldown_until = Some(now + cooldown_seconds);
        }
    }

    pub fn is_on_cooldown(&self, now: f64) -> bool {
        self.cooldown_until.is_some_and(|until| now < until)
    }

    /// Penalty in [0, 0.5], decaying linearly from fire time over the
    /// cooldown window.
    pub fn cooldown_penalty(&self, now: f64) -> f64 {
        let Some(until) = self.cooldown_until else {
            return 0.0;
        };
        if now >= until {
            return 0.0;
        }
        ((until - now) / COOLDOWN_PENALTY_WINDOW_SECONDS).min(0.5)
    }

    /// 1.2 if never fired or fired more than five minutes ago, else 1.0.
    pub fn recency_boost(&self, now: f64) -> f64 {
        match self.last_fired {
            None => 1.2,
            Some(at) if now - at > RECENCY_BOOST_AFTER_SECONDS => 1.2,
            Some(_) => 1.0,
        }
    }

    pub fn update_rolling_salience(&mut self, raw_score: f64) {
        self.rolling_salience =
            ROLLING_SALIENCE_ALPHA * raw_score + (1.0 - ROLLING_SALIENCE_ALPHA) * self.rolling_salience;
    }
}

/// Archetype weights: interrupt-capable roles score higher, known-verbose
/// roles slightly lower.
pub fn archetype_weight(agent_name: &str) -> f64 {
    match agent_name {
        "censor" | "exception_handler" => 1.5,
        "trigger_watcher" | "anomaly_detector" => 1.3,
        "brainstormer" | "researcher" => 0.9,
        _ => 1.0,
    }
}

/// Which agents feed which modulator: `(modulator, weight, inverse)`.
/// Inverse entries subtract (e.g. high wellbeing lowers fatigue).
pub fn modulator_mapping(agent_id: &str) -> Option<(ModulatorKind, f64, bool)> {
    let mapping = match agent_id {
        "emotion.stress" => (ModulatorKind::Arousal, 0.3, false),
        "monitoring.trigger_watcher" => (ModulatorKind::Arousal, 0.2, false),
        "emotion.wellbeing" => (ModulatorKind::Fatigue, 0.3, true),
        "resource.energy" => (ModulatorKind::Fatigue, 0.2, false),
        "resource.time" => (ModulatorKind::TimePressure, 0.3, false),
        "planning.short_term" => (ModulatorKind::TimePressure, 0.2, false),
        "social.norms" => (ModulatorKind::SocialRisk, 0.3, false),
        "social.relationships" => (ModulatorKind::SocialRisk, 0.2, false),
        "inhibition.censor" => (ModulatorKind::SocialRisk, 0.2, false),
        _ => return None,
    };
    Some(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_penalty_decays_linearly() {
        let mut state = AgentActivationState::new("emotion.stress", 1.0);
        state.mark_fired(100.0, 30.0);

        // Immediately after firing: 30/60 = 0.5.
        assert!((state.cooldown_penalty(100.0) - 0.5).abs() < 1e-9);
        // Halfway through: 15/60 = 0.25.
        assert!((state.cooldown_penalty(115.0) - 0.25).abs() < 1e-9);
        // Cooldown expired.
        assert_eq!(state.cooldown_penalty(130.0), 0.0);
        assert!(!state.is_on_cooldown(130.0));
    }

    #[test]
    fn test_recency_boost() {
        let mut state = AgentActivationState::new("emotion.stress", 1.0);
        assert_eq!(state.recency_boost(0.0), 1.2);

        state.mark_fired(100.0, 30.0);
        assert_eq!(state.recency_boost(150.0), 1.0);
        assert_eq!(state.recency_boost(100.0 + 301.0), 1.2);
    }

    #[test]
    fn test_rolling_salience_ema() {
        let mut state = AgentActivationState::new("emotion.stress", 1.0);
        state.update_rolling_salience(9.0);
        assert!((state.rolling_salience - 2.7).abs() < 1e-9);
        state.update_rolling_salience(9.0);
        assert!((state.rolling_salience - (0.3 * 9.0 + 0.7 * 2.7)).abs() < 1e-9);
    }

    #[test]
    fn test_archetype_weights() {
        assert_eq!(archetype_weight("censor"), 1.5);
        assert_eq!(archetype_weight("anomaly_detector"), 1.3);
        assert_eq!(archetype_weight("brainstormer"), 0.9);
        assert_eq!(archetype_weight("stress"), 1.0);
    }

    #[test]
    fn test_modulator_mapping_inverse_flag() {
        let (kind, weight, inverse) = modulator_mapping("emotion.wellbeing").unwrap();
        assert_eq!(kind, ModulatorKind::Fatigue);
        assert_eq!(weight, 0.3);
        assert!(inverse);
        assert!(modulator_mapping("creative.brainstormer").is_none());
    }
}
