use serde::{Deserialize, Serialize};

/// Claim categories produced by agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimType {
    Observation,
    Recommendation,
    Concern,
    Question,
}

impl ClaimType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimType::Observation => "observation",
            ClaimType::Recommendation => "recommendation",
            ClaimType::Concern => "concern",
            ClaimType::Question => "question",
        }
    }

    /// Weight used when folding per-type consensus into the overall score.
    pub fn consensus_weight(&self) -> f64 {
        match self {
            ClaimType::Recommendation => 2.0,
            ClaimType::Concern => 2.0,
            ClaimType::Observation => 1.0,
            ClaimType::Question => 0.5,
        }
    }
}

/// A typed statement produced by an agent, unique by id within a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: ClaimType,
    pub source_agent: String,
    /// 0..3, clamped on ingest.
    pub urgency: u8,
    /// 0..3, clamped on ingest.
    pub confidence: u8,
    /// Ids of claims this claim supports. Unknown ids are dropped on ingest.
    #[serde(default)]
    pub supports: Vec<String>,
    /// Ids of claims this claim opposes. Unknown ids are dropped on ingest.
    #[serde(default)]
    pub opposes: Vec<String>,
}

impl Claim {
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        kind: ClaimType,
        source_agent: impl Into<String>,
        urgency: u8,
        confidence: u8,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            kind,
            source_agent: source_agent.into(),
            urgency: urgency.min(3),
            confidence: confidence.min(3),
            supports: Vec::new(),
            opposes: Vec::new(),
        }
    }

    pub fn with_supports(mut self, ids: Vec<String>) -> Self {
        self.supports = ids;
        self
    }

    pub fn with_opposes(mut self, ids: Vec<String>) -> Self {
        self.opposes = ids;
        self
    }

    /// Base salience in [0, 1]: urgency * confidence / 9.
    pub fn base_salience(&self) -> f64 {
        f64::from(self.urgency) * f64::from(self.confidence) / 9.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clamps_ranges() {
        let claim = Claim::new("c1", "text", ClaimType::Concern, "emotion.stress", 7, 9);
        assert_eq!(claim.urgency, 3);
        assert_eq!(claim.confidence, 3);
    }

    #[test]
    fn test_base_salience() {
        let claim = Claim::new("c1", "t", ClaimType::Observation, "a", 3, 3);
        assert!((claim.base_salience() - 1.0).abs() < f64::EPSILON);

        let quiet = Claim::new("c2", "t", ClaimType::Observation, "a", 0, 3);
        assert_eq!(quiet.base_salience(), 0.0);
    }

    #[test]
    fn test_type_tag_is_snake_case() {
        let claim = Claim::new("c1", "t", ClaimType::Recommendation, "a", 1, 1);
        let value = serde_json::to_value(&claim).unwrap();
        assert_eq!(value["type"], "recommendation");
    }
}
