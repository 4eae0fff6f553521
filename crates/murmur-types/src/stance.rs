use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Maximum per-turn change in any stance dimension.
pub const STANCE_STEP_CAP: f64 = 0.15;

/// Default smoothing factor applied to proposed deltas.
pub const STANCE_ALPHA: f64 = 0.25;

/// The engine's persistent control state. Not a claim of emotion; an
/// internal modulation vector that downstream decisions condition on.
///
/// `valence` lives in [-1, 1]; every other dimension in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StanceVector {
    pub valence: f64,
    pub arousal: f64,
    pub control: f64,
    pub certainty: f64,
    pub safety: f64,
    pub closeness: f64,
    pub curiosity: f64,
    pub strain: f64,

    /// Internal style hints, at most six short items.
    #[serde(default)]
    pub notes: Vec<String>,
}

impl Default for StanceVector {
    fn default() -> Self {
        Self {
            valence: 0.0,
            arousal: 0.3,
            control: 0.5,
            certainty: 0.5,
            safety: 0.5,
            closeness: 0.3,
            curiosity: 0.5,
            strain: 0.0,
            notes: Vec::new(),
        }
    }
}

/// A proposed stance change. Fields default to zero so partial deltas
/// deserialize cleanly from model output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StanceDelta {
    #[serde(default)]
    pub valence: f64,
    #[serde(default)]
    pub arousal: f64,
    #[serde(default)]
    pub control: f64,
    #[serde(default)]
    pub certainty: f64,
    #[serde(default)]
    pub safety: f64,
    #[serde(default)]
    pub closeness: f64,
    #[serde(default)]
    pub curiosity: f64,
    #[serde(default)]
    pub strain: f64,
}

impl StanceDelta {
    pub fn is_zero(&self) -> bool {
        [
            self.valence,
            self.arousal,
            self.control,
            self.certainty,
            self.safety,
            self.closeness,
            self.curiosity,
            self.strain,
        ]
        .iter()
        .all(|v| *v == 0.0)
    }

    /// Scale every dimension by `factor`.
    pub fn scaled(&self, factor: f64) -> StanceDelta {
        StanceDelta {
            valence: self.valence * factor,
            arousal: self.arousal * factor,
            control: self.control * factor,
            certainty: self.certainty * factor,
            safety: self.safety * factor,
            closeness: self.closeness * factor,
            curiosity: self.curiosity * factor,
            strain: self.strain * factor,
        }
    }
}

fn step(current: f64, delta: f64, alpha: f64, lo: f64, hi: f64) -> f64 {
    let applied = (alpha * delta).clamp(-STANCE_STEP_CAP, STANCE_STEP_CAP);
    (current + applied).clamp(lo, hi)
}

impl StanceVector {
    /// Apply a clamped exponential-moving-average update. The per-turn step
    /// in any dimension is capped at [`STANCE_STEP_CAP`].
    pub fn apply_delta(&mut self, delta: &StanceDelta, alpha: f64, notes: Vec<String>) {
        self.valence = step(self.valence, delta.valence, alpha, -1.0, 1.0);
        self.arousal = step(self.arousal, delta.arousal, alpha, 0.0, 1.0);
        self.control = step(self.control, delta.control, alpha, 0.0, 1.0);
        self.certainty = step(self.certainty, delta.certainty, alpha, 0.0, 1.0);
        self.safety = step(self.safety, delta.safety, alpha, 0.0, 1.0);
        self.closeness = step(self.closeness, delta.closeness, alpha, 0.0, 1.0);
        self.curiosity = step(self.curiosity, delta.curiosity, alpha, 0.0, 1.0);
        self.strain = step(self.strain, delta.strain, alpha, 0.0, 1.0);
        if !notes.is_empty() {
            notes.into_iter().take(6).for_each(|n| self.notes.push(n));
            let excess = self.notes.len().saturating_sub(6);
            if excess > 0 {
                self.notes.drain(..excess);
            }
        }
    }

    /// Dimension values as a JSON object for event payloads.
    pub fn to_payload(&self) -> Value {
        json!({
            "valence": self.valence,
            "arousal": self.arousal,
            "control": self.control,
            "certainty": self.certainty,
            "safety": self.safety,
            "closeness": self.closeness,
            "curiosity": self.curiosity,
            "strain": self.strain,
        })
    }

    /// Compact one-line form for prompts.
    pub fn to_prompt_line(&self) -> String {
        format!(
            "valence={:.2}, arousal={:.2}, closeness={:.2}, curiosity={:.2}, certainty={:.2}, strain={:.2}",
            self.valence, self.arousal, self.closeness, self.curiosity, self.certainty, self.strain
        )
    }
}

/// Merge a JSON object of dimension deltas into a typed delta, ignoring
/// unknown keys. Used when folding micro-agent stance output.
pub fn delta_from_map(map: &Map<String, Value>) -> StanceDelta {
    let mut delta = StanceDelta::default();
    for (key, value) in map {
        let Some(v) = value.as_f64() else { continue };
        match key.as_str() {
            "valence" => delta.valence = v,
            "arousal" => delta.arousal = v,
            "control" => delta.control = v,
            "certainty" => delta.certainty = v,
            "safety" => delta.safety = v,
            "closeness" => delta.closeness = v,
            "curiosity" => delta.curiosity = v,
            "strain" => delta.strain = v,
            _ => {}
        }
    }
    delta
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_cap_applies() {
        let mut stance = StanceVector::default();
        let delta = StanceDelta {
            strain: 10.0,
            ..Default::default()
        };
        stance.apply_delta(&delta, 1.0, vec![]);
        assert!((stance.strain - STANCE_STEP_CAP).abs() < 1e-9);
    }

    #[test]
    fn test_bounds_hold() {
        let mut stance = StanceVector::default();
        let delta = StanceDelta {
            valence: -10.0,
            ..Default::default()
        };
        for _ in 0..20 {
            stance.apply_delta(&delta, 1.0, vec![]);
        }
        assert!(stance.valence >= -1.0);
    }

    #[test]
    fn test_notes_capped_at_six() {
        let mut stance = StanceVector::default();
        let notes: Vec<String> = (0..10).map(|i| format!("note {i}")).collect();
        stance.apply_delta(&StanceDelta::default(), STANCE_ALPHA, notes);
        assert_eq!(stance.notes.len(), 6);
    }

    #[test]
    fn test_delta_from_map_ignores_unknown_keys() {
        let map = serde_json::from_str::<Map<String, Value>>(
            r#"{"curiosity": 0.05, "bogus": 1.0, "strain": "nan"}"#,
        )
        .unwrap();
        let delta = delta_from_map(&map);
        assert_eq!(delta.curiosity, 0.05);
        assert_eq!(delta.strain, 0.0);
    }
}
