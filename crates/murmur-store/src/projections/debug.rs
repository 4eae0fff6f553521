use std::collections::BTreeMap;

use murmur_types::{EngineEvent, EventKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Projection;

/// One agent execution as observed in the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTraceRecord {
    pub agent_id: String,
    pub failed: bool,
    /// Full event payload, including any captured trace fields.
    pub payload: Value,
}

/// Per-turn agent traces for inspection. Heavier than the other
/// projections; intended for a debug panel, not the hot path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebugProjection {
    pub traces: BTreeMap<u64, Vec<AgentTraceRecord>>,
}

impl DebugProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn traces_for_turn(&self, turn_id: u64) -> &[AgentTraceRecord] {
        self.traces.get(&turn_id).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Projection for DebugProjection {
    fn apply(&mut self, event: &EngineEvent) {
        let failed = match event.kind {
            EventKind::AgentCompleted => false,
            EventKind::AgentFailed => true,
            _ => return,
        };
        let agent_id = event.payload_str("agent_id").unwrap_or("?").to_string();
        self.traces.entry(event.turn_id).or_default().push(AgentTraceRecord {
            agent_id,
            failed,
            payload: event.payload.clone(),
        });
    }

    fn reset(&mut self) {
        self.traces.clear();
    }
}
