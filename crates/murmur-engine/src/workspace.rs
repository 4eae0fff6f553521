use std::collections::BTreeMap;

use murmur_types::{
    Claim, Episode, GlobalModulators, Hypothesis, OpenThread, StanceDelta, StanceVector, UserFact,
};
use serde_json::{Map, Value, json};

use crate::graph::ArgumentGraph;

// NOTE: The workspace is the turn-scoped blackboard. It is constructed at
// TURN_STARTED, mutated only through the named operations below (each of
// which records a summary into a pending patch), and read-only for
// everything outside the active turn. The pending patch is drained by the
// runner into WORKSPACE_PATCHED events, so the log stays the source of
// truth for how the workspace evolved.

/// Mutable per-turn state.
#[derive(Debug, Default)]
pub struct Workspace {
    pub turn_id: u64,
    pub user_message: String,
    pub sensors: BTreeMap<String, f64>,
    pub stance: StanceVector,
    pub modulators: GlobalModulators,

    // Retrieved memory context (opaque records from the memory contract).
    pub retrieved_episodes: Vec<Episode>,
    pub user_facts: Vec<UserFact>,
    pub open_threads: Vec<OpenThread>,
    pub hypotheses: Vec<Hypothesis>,

    pub graph: ArgumentGraph,
    pub consensus_level: f64,

    pub current_goal: Option<String>,
    pub constraints: Vec<String>,
    pub pending_asks: Vec<String>,
    pub current_response: String,

    /// Monotonic seconds of the last user message, for daemon triggers.
    pub last_user_message_at: Option<f64>,

    pending_patch: Map<String, Value>,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            consensus_level: 1.0,
            ..Default::default()
        }
    }

    /// Begin a new turn: clear turn-scoped fields. Stance and modulators
    /// persist across turns.
    pub fn begin_turn(&mut self, turn_id: u64, now_monotonic: f64) {
        self.turn_id = turn_id;
        self.user_message.clear();
        self.sensors.clear();
        self.retrieved_episodes.clear();
        self.user_facts.clear();
        self.open_threads.clear();
        self.hypotheses.clear();
        self.graph = ArgumentGraph::new();
        self.consensus_level = 1.0;
        self.current_goal = None;
        self.constraints.clear();
        self.pending_asks.clear();
        self.current_response.clear();
        self.last_user_message_at = Some(now_monotonic);
        self.pending_patch.clear();
    }

    pub fn set_user_message(&mut self, text: &str) {
        self.user_message = text.trim().to_string();
        self.pending_patch
            .insert("user_message_len".to_string(), json!(self.user_message.len()));
    }

    pub fn apply_sensor_patch(&mut self, sensors: BTreeMap<String, f64>) {
        let active = sensors.values().filter(|v| **v > 0.0).count();
        self.sensors = sensors;
        self.pending_patch.insert("sensors_active".to_string(), json!(active));
    }

    pub fn apply_stance_delta(&mut self, delta: &StanceDelta, alpha: f64, notes: Vec<String>) {
        self.stance.apply_delta(delta, alpha, notes);
        self.pending_patch
            .insert("stance".to_string(), self.stance.to_payload());
    }

    pub fn set_memory_context(
        &mut self,
        episodes: Vec<Episode>,
        facts: Vec<UserFact>,
        threads: Vec<OpenThread>,
    ) {
        self.pending_patch.extend([
            ("retrieved_episodes_count".to_string(), json!(episodes.len())),
            ("user_facts_count".to_string(), json!(facts.len())),
            ("open_threads_count".to_string(), json!(threads.len())),
        ]);
        self.retrieved_episodes = episodes;
        self.user_facts = facts;
        self.open_threads = threads;
    }

    pub fn add_claim(&mut self, claim: Claim) {
        self.graph.add_claim(claim);
        self.pending_patch
            .insert("claims_count".to_string(), json!(self.graph.len()));
    }

    pub fn add_hypothesis(&mut self, hypothesis: Hypothesis) {
        self.hypotheses.push(hypothesis);
        self.pending_patch
            .insert("hypotheses_count".to_string(), json!(self.hypotheses.len()));
    }

    /// Record the current modulator block in the pending patch after the
    /// scheduler folds agent outputs into it.
    pub fn note_modulator_update(&mut self) {
        self.pending_patch
            .insert("modulators".to_string(), self.modulators.to_payload());
    }

    pub fn set_consensus(&mut self, level: f64) {
        self.consensus_level = level.clamp(0.0, 1.0);
        self.pending_patch
            .insert("consensus".to_string(), json!(self.consensus_level));
    }

    pub fn set_response(&mut self, text: impl Into<String>) {
        self.current_response = text.into();
        self.pending_patch.insert(
            "response_len".to_string(),
            json!(self.current_response.len()),
        );
    }

    /// Drain the accumulated patch summary. Empty when nothing changed
    /// since the last drain.
    pub fn take_patch(&mut self) -> Map<String, Value> {
        std::mem::take(&mut self.pending_patch)
    }

    /// Highest urgency across active claims.
    pub fn max_claim_urgency(&self) -> u8 {
        self.graph.claims().map(|c| c.urgency).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_types::ClaimType;

    #[test]
    fn test_operations_accumulate_patch() {
        let mut ws = Workspace::new();
        ws.set_user_message("  hello  ");
        ws.set_consensus(0.9);
        ws.add_claim(Claim::new("c1", "t", ClaimType::Observation, "a", 1, 1));

        let patch = ws.take_patch();
        assert_eq!(patch["user_message_len"], json!(5));
        assert_eq!(patch["consensus"], json!(0.9));
        assert_eq!(patch["claims_count"], json!(1));

        // Drained.
        assert!(ws.take_patch().is_empty());
    }

    #[test]
    fn test_begin_turn_preserves_stance_and_modulators() {
        let mut ws = Workspace::new();
        ws.modulators.arousal = 0.9;
        ws.stance.strain = 0.7;
        ws.add_claim(Claim::new("c1", "t", ClaimType::Concern, "a", 2, 2));

        ws.begin_turn(2, 10.0);

        assert_eq!(ws.modulators.arousal, 0.9);
        assert_eq!(ws.stance.strain, 0.7);
        assert!(ws.graph.is_empty());
        assert_eq!(ws.consensus_level, 1.0);
        assert_eq!(ws.last_user_message_at, Some(10.0));
    }

    #[test]
    fn test_consensus_clamped() {
        let mut ws = Workspace::new();
        ws.set_consensus(1.7);
        assert_eq!(ws.consensus_level, 1.0);
    }
}
