use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// The four system-wide affective signals that steer scheduling. All values
/// are normalized to [0, 1]. Decay pulls each value back toward its
/// baseline rather than toward zero, so arousal settles at a resting level
/// instead of flatlining.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalModulators {
    /// 0.0 (calm) to 1.0 (activated). Baseline 0.3.
    pub arousal: f64,
    /// 0.0 (rested) to 1.0 (exhausted).
    pub fatigue: f64,
    /// 0.0 (relaxed) to 1.0 (urgent).
    pub time_pressure: f64,
    /// 0.0 (safe) to 1.0 (high stakes).
    pub social_risk: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModulatorKind {
    Arousal,
    Fatigue,
    TimePressure,
    SocialRisk,
}

impl ModulatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModulatorKind::Arousal => "arousal",
            ModulatorKind::Fatigue => "fatigue",
            ModulatorKind::TimePressure => "time_pressure",
            ModulatorKind::SocialRisk => "social_risk",
        }
    }

    pub fn baseline(&self) -> f64 {
        match self {
            ModulatorKind::Arousal => 0.3,
            _ => 0.0,
        }
    }
}

impl Default for GlobalModulators {
    fn default() -> Self {
        Self {
            arousal: ModulatorKind::Arousal.baseline(),
            fatigue: 0.0,
            time_pressure: 0.0,
            social_risk: 0.0,
        }
    }
}

impl GlobalModulators {
    pub const DEFAULT_DECAY: f64 = 0.9;

    pub fn get(&self, kind: ModulatorKind) -> f64 {
        match kind {
            ModulatorKind::Arousal => self.arousal,
            ModulatorKind::Fatigue => self.fatigue,
            ModulatorKind::TimePressure => self.time_pressure,
            ModulatorKind::SocialRisk => self.social_risk,
        }
    }

    fn slot(&mut self, kind: ModulatorKind) -> &mut f64 {
        match kind {
            ModulatorKind::Arousal => &mut self.arousal,
            ModulatorKind::Fatigue => &mut self.fatigue,
            ModulatorKind::TimePressure => &mut self.time_pressure,
            ModulatorKind::SocialRisk => &mut self.social_risk,
        }
    }

    /// Decay every modulator toward its baseline by `factor`.
    pub fn decay(&mut self, factor: f64) {
        for kind in [
            ModulatorKind::Arousal,
            ModulatorKind::Fatigue,
            ModulatorKind::TimePressure,
            ModulatorKind::SocialRisk,
        ] {
            let baseline = kind.baseline();
            let slot = self.slot(kind);
            *slot = (baseline + (*slot - baseline) * factor).clamp(0.0, 1.0);
        }
    }

    /// Add a bounded contribution to one modulator.
    pub fn update(&mut self, kind: ModulatorKind, delta: f64) {
        let slot = self.slot(kind);
        *slot = (*slot + delta).clamp(0.0, 1.0);
    }

    pub fn to_payload(&self) -> Value {
        json!({
            "arousal": self.arousal,
            "fatigue": self.fatigue,
            "time_pressure": self.time_pressure,
            "social_risk": self.social_risk,
        })
    }

    pub fn to_prompt_section(&self) -> String {
        format!(
            "Arousal: {:.2} (0=calm, 1=activated)\n\
             Fatigue: {:.2} (0=rested, 1=exhausted)\n\
             Time pressure: {:.2} (0=relaxed, 1=urgent)\n\
             Social risk: {:.2} (0=safe, 1=high stakes)",
            self.arousal, self.fatigue, self.time_pressure, self.social_risk
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decay_moves_toward_baseline() {
        let mut mods = GlobalModulators {
            arousal: 0.8,
            fatigue: 0.5,
            time_pressure: 0.0,
            social_risk: 0.0,
        };
        mods.decay(GlobalModulators::DEFAULT_DECAY);
        assert!(mods.arousal < 0.8);
        assert!(mods.arousal > 0.3);
        assert!(mods.fatigue < 0.5);
        // Already at baseline, stays put.
        assert_eq!(mods.time_pressure, 0.0);
    }

    #[test]
    fn test_decay_rises_toward_baseline_from_below() {
        let mut mods = GlobalModulators {
            arousal: 0.1,
            ..Default::default()
        };
        mods.decay(GlobalModulators::DEFAULT_DECAY);
        assert!(mods.arousal > 0.1);
        assert!(mods.arousal < 0.3);
    }

    #[test]
    fn test_update_clamps() {
        let mut mods = GlobalModulators::default();
        mods.update(ModulatorKind::SocialRisk, 2.0);
        assert_eq!(mods.social_risk, 1.0);
        mods.update(ModulatorKind::SocialRisk, -5.0);
        assert_eq!(mods.social_risk, 0.0);
    }
}
