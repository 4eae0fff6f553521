use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-turn decay applied to unconfirmed hypotheses.
pub const HYPOTHESIS_DECAY: f64 = 0.95;

/// A stored episodic memory, retrieved through the memory contract. The
/// engine treats these as opaque context records; persistence internals
/// are the memory collaborator's business.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    pub session_id: String,
    pub turn_id: u64,
    pub timestamp: DateTime<Utc>,
    pub summary: String,
    #[serde(default)]
    pub emotions: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub importance: f64,
}

/// A durable fact about the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserFact {
    pub id: String,
    pub fact: String,
    pub category: String,
    pub confidence: f64,
    pub evidence_count: u32,
}

/// An unresolved goal or thread the user left open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenThread {
    pub id: String,
    pub description: String,
    /// 0-3, where 3 is highest.
    pub priority: u8,
}

/// Typed category for an evidence shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardCategory {
    Preference,
    Boundary,
    Value,
    Commitment,
    Decision,
    Vulnerability,
    Bio,
}

/// A literal user quote pinned to a category and turn. Evidence shards are
/// the ground truth that hypotheses must cite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceShard {
    pub id: String,
    pub quote: String,
    pub category: ShardCategory,
    pub turn_id: u64,
    pub confidence: f64,
}

impl EvidenceShard {
    pub fn capture(quote: impl Into<String>, category: ShardCategory, turn_id: u64, confidence: f64) -> Self {
        Self {
            id: format!("shard-{}", &Uuid::new_v4().simple().to_string()[..8]),
            quote: quote.into(),
            category,
            turn_id,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// A hypothesis about the user, grounded in evidence shards. A hypothesis
/// without supporting shard ids is confabulation and never constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub id: String,
    pub text: String,
    pub probability: f64,
    pub evidence_ids: Vec<String>,
    pub last_confirmed_turn: u64,
}

impl Hypothesis {
    /// Returns `None` when `evidence_ids` is empty.
    pub fn grounded(
        text: impl Into<String>,
        probability: f64,
        evidence_ids: Vec<String>,
        turn_id: u64,
    ) -> Option<Self> {
        if evidence_ids.is_empty() {
            return None;
        }
        Some(Self {
            id: format!("hyp-{}", &Uuid::new_v4().simple().to_string()[..8]),
            text: text.into(),
            probability: probability.clamp(0.0, 1.0),
            evidence_ids,
            last_confirmed_turn: turn_id,
        })
    }

    /// Probability after geometric decay for the turns elapsed since the
    /// last confirmation.
    pub fn decayed_probability(&self, current_turn: u64) -> f64 {
        let elapsed = current_turn.saturating_sub(self.last_confirmed_turn);
        self.probability * HYPOTHESIS_DECAY.powi(elapsed as i32)
    }

    /// Re-confirm the hypothesis, optionally adjusting probability.
    pub fn confirm(&mut self, turn_id: u64, probability: Option<f64>) {
        self.last_confirmed_turn = turn_id;
        if let Some(p) = probability {
            self.probability = p.clamp(0.0, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ungrounded_hypothesis_is_dropped() {
        assert!(Hypothesis::grounded("likes tea", 0.8, vec![], 3).is_none());
        assert!(Hypothesis::grounded("likes tea", 0.8, vec!["e1".into()], 3).is_some());
    }

    #[test]
    fn test_decay_is_geometric() {
        let hyp = Hypothesis::grounded("x", 1.0, vec!["e1".into()], 10).unwrap();
        let p1 = hyp.decayed_probability(11);
        let p2 = hyp.decayed_probability(12);
        assert!((p1 - HYPOTHESIS_DECAY).abs() < 1e-9);
        assert!((p2 - HYPOTHESIS_DECAY * HYPOTHESIS_DECAY).abs() < 1e-9);
        // Never grows when current turn is behind the confirmation.
        assert_eq!(hyp.decayed_probability(5), 1.0);
    }

    #[test]
    fn test_confirm_resets_decay() {
        let mut hyp = Hypothesis::grounded("x", 0.5, vec!["e1".into()], 1).unwrap();
        hyp.confirm(6, Some(0.9));
        assert_eq!(hyp.last_confirmed_turn, 6);
        assert_eq!(hyp.decayed_probability(6), 0.9);
    }
}
