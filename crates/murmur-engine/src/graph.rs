use std::collections::{BTreeMap, BTreeSet};

use murmur_types::{Claim, ClaimType};
use serde::{Deserialize, Serialize};

// NOTE: Adjacency is stored as owned id -> set<id> tables, never as shared
// pointers between claims. Insertion order is kept separately so ranking
// ties break deterministically on replay.

/// Marker pairs that flag two same-type claims as contradictory.
const CONTRADICTION_MARKERS: &[(&str, &str)] = &[
    ("should", "should not"),
    ("can", "cannot"),
    ("do", "don't"),
    ("increase", "decrease"),
    ("more", "less"),
    ("high", "low"),
];

/// Result of a consensus computation over the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    /// Weighted mean of per-type scores, in [0, 1]. Empty graph yields 1.0.
    pub overall_score: f64,
    pub type_scores: BTreeMap<ClaimType, f64>,
    pub top_claims: Vec<Claim>,
    /// Opposition strength above 0.5.
    pub contested_claims: Vec<Claim>,
    /// Support above 0.5 with opposition below 0.2.
    pub resolved_claims: Vec<Claim>,
}

/// Claims keyed by id with support/oppose edges and salience ranking.
#[derive(Debug, Clone, Default)]
pub struct ArgumentGraph {
    claims: BTreeMap<String, Claim>,
    supports: BTreeMap<String, BTreeSet<String>>,
    opposes: BTreeMap<String, BTreeSet<String>>,
    insertion_order: Vec<String>,
}

impl ArgumentGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Claim> {
        self.claims.get(id)
    }

    pub fn claims(&self) -> impl Iterator<Item = &Claim> {
        self.insertion_order.iter().filter_map(|id| self.claims.get(id))
    }

    /// Add a claim. Explicit support/oppose references to unknown ids are
    /// dropped silently; oppose edges are symmetric; implicit opposition is
    /// detected against existing claims of the same type.
    pub fn add_claim(&mut self, claim: Claim) {
        let id = claim.id.clone();

        self.supports.entry(id.clone()).or_default();
        self.opposes.entry(id.clone()).or_default();

        for supported in &claim.supports {
            if self.claims.contains_key(supported)
                && let Some(entries) = self.supports.get_mut(supported)
            {
                entries.insert(id.clone());
            }
        }

        for opposed in &claim.opposes {
            if self.claims.contains_key(opposed) {
                if let Some(entries) = self.opposes.get_mut(opposed) {
                    entries.insert(id.clone());
                }
                if let Some(entries) = self.opposes.get_mut(&id) {
                    entries.insert(opposed.clone());
                }
            }
        }

        self.detect_implicit_opposition(&claim);

        self.insertion_order.push(id.clone());
        self.claims.insert(id, claim);
    }

    fn detect_implicit_opposition(&mut self, new_claim: &Claim) {
        let new_text = new_claim.text.to_lowercase();
        let mut opposing_ids = Vec::new();

        for (id, existing) in &self.claims {
            if existing.kind != new_claim.kind {
                continue;
            }
            let existing_text = existing.text.to_lowercase();
            let contradicts = CONTRADICTION_MARKERS.iter().any(|(pos, neg)| {
                (contains_marker(&new_text, pos) && contains_marker(&existing_text, neg))
                    || (contains_marker(&new_text, neg) && contains_marker(&existing_text, pos))
            });
            if contradicts {
                opposing_ids.push(id.clone());
            }
        }

        for id in opposing_ids {
            if let Some(entries) = self.opposes.get_mut(&id) {
                entries.insert(new_claim.id.clone());
            }
            self.opposes
                .entry(new_claim.id.clone())
                .or_default()
                .insert(id);
        }
    }

    /// min(1, Σ opposer confidence ÷ (own confidence + Σ opposer confidence))
    pub fn opposition_strength(&self, claim_id: &str) -> f64 {
        let Some(claim) = self.claims.get(claim_id) else {
            return 0.0;
        };
        let Some(opposers) = self.opposes.get(claim_id) else {
            return 0.0;
        };
        if opposers.is_empty() {
            return 0.0;
        }

        let opposition_weight: f64 = opposers
            .iter()
            .filter_map(|id| self.claims.get(id))
            .map(|c| f64::from(c.confidence) / 3.0)
            .sum();
        if opposition_weight == 0.0 {
            return 0.0;
        }

        let own_strength = f64::from(claim.confidence) / 3.0;
        if own_strength == 0.0 {
            return opposition_weight.min(1.0);
        }
        (opposition_weight / (own_strength + opposition_weight)).min(1.0)
    }

    /// min(1, Σ supporter confidence / 3)
    pub fn support_strength(&self, claim_id: &str) -> f64 {
        let Some(supporters) = self.supports.get(claim_id) else {
            return 0.0;
        };
        let support_weight: f64 = supporters
            .iter()
            .filter_map(|id| self.claims.get(id))
            .map(|c| f64::from(c.confidence) / 3.0)
            .sum();
        support_weight.min(1.0)
    }

    pub fn opposers(&self, claim_id: &str) -> impl Iterator<Item = &str> {
        self.opposes
            .get(claim_id)
            .into_iter()
            .flat_map(|s| s.iter().map(String::as_str))
    }

    pub fn supporters(&self, claim_id: &str) -> impl Iterator<Item = &str> {
        self.supports
            .get(claim_id)
            .into_iter()
            .flat_map(|s| s.iter().map(String::as_str))
    }

    fn final_score(&self, claim: &Claim) -> f64 {
        claim.base_salience()
            * (1.0 - self.opposition_strength(&claim.id))
            * (1.0 + self.support_strength(&claim.id))
    }

    /// Top `n` claims by `base · (1 − opposition) · (1 + support)`,
    /// ties broken by insertion order.
    pub fn top_claims(&self, n: usize) -> Vec<Claim> {
        let mut scored: Vec<(f64, usize, &Claim)> = self
            .insertion_order
            .iter()
            .enumerate()
            .filter_map(|(order, id)| self.claims.get(id).map(|c| (self.final_score(c), order, c)))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal).then(a.1.cmp(&b.1)));
        scored.into_iter().take(n).map(|(_, _, c)| c.clone()).collect()
    }

    /// Consensus across the graph. Per-type score is 1 minus the mean
    /// opposition over claims of that type; the overall score weights
    /// recommendations and concerns double and questions half.
    pub fn compute_consensus(&self) -> ConsensusResult {
        if self.claims.is_empty() {
            return ConsensusResult {
                overall_score: 1.0,
                type_scores: BTreeMap::new(),
                top_claims: Vec::new(),
                contested_claims: Vec::new(),
                resolved_claims: Vec::new(),
            };
        }

        let mut type_claims: BTreeMap<ClaimType, Vec<&Claim>> = BTreeMap::new();
        for claim in self.claims.values() {
            type_claims.entry(claim.kind).or_default().push(claim);
        }

        let mut type_scores = BTreeMap::new();
        for (kind, claims) in &type_claims {
            let total_opposition: f64 = claims
                .iter()
                .map(|c| self.opposition_strength(&c.id))
                .sum();
            type_scores.insert(*kind, 1.0 - total_opposition / claims.len() as f64);
        }

        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;
        for (kind, score) in &type_scores {
            let weight = kind.consensus_weight();
            weighted_sum += score * weight;
            total_weight += weight;
        }
        let overall = if total_weight > 0.0 {
            weighted_sum / total_weight
        } else {
            1.0
        };

        let contested = self
            .claims()
            .filter(|c| self.opposition_strength(&c.id) > 0.5)
            .cloned()
            .collect();
        let resolved = self
            .claims()
            .filter(|c| {
                self.support_strength(&c.id) > 0.5 && self.opposition_strength(&c.id) < 0.2
            })
            .cloned()
            .collect();

        ConsensusResult {
            overall_score: overall.clamp(0.0, 1.0),
            type_scores,
            top_claims: self.top_claims(10),
            contested_claims: contested,
            resolved_claims: resolved,
        }
    }

    /// Top 20 claims bucketed by type, at most 5 per bucket, for the
    /// council.
    pub fn claims_for_council(&self) -> BTreeMap<ClaimType, Vec<Claim>> {
        let mut buckets: BTreeMap<ClaimType, Vec<Claim>> = BTreeMap::new();
        for claim in self.top_claims(20) {
            let bucket = buckets.entry(claim.kind).or_default();
            if bucket.len() < 5 {
                bucket.push(claim);
            }
        }
        buckets
    }
}

/// Word-boundary-aware marker check so "should not" does not also count
/// as "should" on the same side.
fn contains_marker(text: &str, marker: &str) -> bool {
    match marker {
        "should" => {
            text.match_indices("should")
                .any(|(idx, _)| !text[idx..].starts_with("should not"))
        }
        "can" => text
            .match_indices("can")
            .any(|(idx, _)| !text[idx..].starts_with("cannot") && !text[idx..].starts_with("can't")),
        "do" => text.split_whitespace().any(|w| w == "do"),
        _ => text.contains(marker),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claim(id: &str, text: &str, kind: ClaimType, urgency: u8, confidence: u8) -> Claim {
        Claim::new(id, text, kind, "test.agent", urgency, confidence)
    }

    #[test]
    fn test_empty_graph_consensus_is_one() {
        let graph = ArgumentGraph::new();
        let result = graph.compute_consensus();
        assert_eq!(result.overall_score, 1.0);
    }

    #[test]
    fn test_implicit_opposition_on_increase_decrease() {
        let mut graph = ArgumentGraph::new();
        graph.add_claim(claim(
            "c1",
            "should increase activity",
            ClaimType::Recommendation,
            3,
            3,
        ));
        graph.add_claim(claim(
            "c2",
            "should decrease activity",
            ClaimType::Recommendation,
            3,
            3,
        ));

        assert!(graph.opposition_strength("c1") > 0.0);
        assert!(graph.opposition_strength("c2") > 0.0);

        let result = graph.compute_consensus();
        assert!(result.overall_score <= 0.7, "got {}", result.overall_score);
    }

    #[test]
    fn test_no_implicit_opposition_across_types() {
        let mut graph = ArgumentGraph::new();
        graph.add_claim(claim("c1", "should increase activity", ClaimType::Recommendation, 2, 2));
        graph.add_claim(claim("c2", "activity did decrease", ClaimType::Observation, 2, 2));
        assert_eq!(graph.opposition_strength("c1"), 0.0);
    }

    #[test]
    fn test_unknown_references_are_dropped() {
        let mut graph = ArgumentGraph::new();
        graph.add_claim(
            claim("c1", "user is tired", ClaimType::Observation, 2, 2)
                .with_supports(vec!["ghost".to_string()]),
        );
        assert_eq!(graph.support_strength("ghost"), 0.0);
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_support_raises_ranking() {
        let mut graph = ArgumentGraph::new();
        graph.add_claim(claim("c1", "rest is needed", ClaimType::Recommendation, 2, 2));
        graph.add_claim(claim("c2", "user slept 4 hours", ClaimType::Observation, 2, 2));
        graph.add_claim(
            claim("c3", "fatigue is visible", ClaimType::Observation, 2, 2)
                .with_supports(vec!["c1".to_string()]),
        );

        let top = graph.top_claims(3);
        assert_eq!(top[0].id, "c1");
    }

    #[test]
    fn test_ties_break_by_insertion_order() {
        let mut graph = ArgumentGraph::new();
        graph.add_claim(claim("b", "first in", ClaimType::Observation, 2, 2));
        graph.add_claim(claim("a", "second in", ClaimType::Observation, 2, 2));
        let top = graph.top_claims(2);
        assert_eq!(top[0].id, "b");
    }

    #[test]
    fn test_contested_and_resolved_buckets() {
        let mut graph = ArgumentGraph::new();
        graph.add_claim(claim("c1", "should rest more", ClaimType::Recommendation, 3, 1));
        graph.add_claim(claim("c2", "should rest less", ClaimType::Recommendation, 3, 3));
        graph.add_claim(
            claim("c3", "user naps daily", ClaimType::Observation, 2, 3)
                .with_supports(vec!["c1".to_string()]),
        );

        let result = graph.compute_consensus();
        assert!(result.contested_claims.iter().any(|c| c.id == "c1"));
    }

    #[test]
    fn test_council_buckets_capped_at_five() {
        let mut graph = ArgumentGraph::new();
        for i in 0..8 {
            graph.add_claim(claim(
                &format!("o{i}"),
                &format!("observation number {i}"),
                ClaimType::Observation,
                2,
                2,
            ));
        }
        let buckets = graph.claims_for_council();
        assert_eq!(buckets[&ClaimType::Observation].len(), 5);
    }
}
