use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// NOTE: Event Schema Design
//
// 1. Single source of truth: every observable transition in the engine is
//    an EngineEvent appended to the log. All UI, analytics, and debug state
//    is a deterministic fold over the event prefix.
//
// 2. Dense ordering: (session_id, turn_id, seq) is unique and seq is dense
//    from 0 within a turn. Replay order is therefore total and stable
//    regardless of how fan-out groups completed at runtime.
//
// 3. Two clocks: ts_monotonic orders events within a process run and is
//    what invariant checks use; ts_wall is informational only (display,
//    export) and carries no ordering guarantee across clock adjustments.
//
// 4. Opaque payloads: payload is a JSON object of scalars. Projections own
//    the interpretation; the log does not look inside.

/// The closed set of event kinds the engine can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    TurnStarted,
    TurnStageChanged,
    SensorsFastUpdated,
    MemoryRetrieved,
    WorkspacePatched,
    WaveStarted,
    AgentStarted,
    AgentCompleted,
    AgentFailed,
    WaveCompleted,
    DelibRoundStarted,
    ConsensusUpdated,
    DelibRoundCompleted,
    CouncilDecisionMade,
    VoiceRendered,
    CriticsUpdated,
    MemoryCommitted,
    TurnCompleted,
    SafetyInterrupt,
    DaemonTick,
    ProactiveNudge,
    Error,
    ModelCallCompleted,
}

impl EventKind {
    /// Stable string form, used as the `kind` column in the event log.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::TurnStarted => "TURN_STARTED",
            EventKind::TurnStageChanged => "TURN_STAGE_CHANGED",
            EventKind::SensorsFastUpdated => "SENSORS_FAST_UPDATED",
            EventKind::MemoryRetrieved => "MEMORY_RETRIEVED",
            EventKind::WorkspacePatched => "WORKSPACE_PATCHED",
            EventKind::WaveStarted => "WAVE_STARTED",
            EventKind::AgentStarted => "AGENT_STARTED",
            EventKind::AgentCompleted => "AGENT_COMPLETED",
            EventKind::AgentFailed => "AGENT_FAILED",
            EventKind::WaveCompleted => "WAVE_COMPLETED",
            EventKind::DelibRoundStarted => "DELIB_ROUND_STARTED",
            EventKind::ConsensusUpdated => "CONSENSUS_UPDATED",
            EventKind::DelibRoundCompleted => "DELIB_ROUND_COMPLETED",
            EventKind::CouncilDecisionMade => "COUNCIL_DECISION_MADE",
            EventKind::VoiceRendered => "VOICE_RENDERED",
            EventKind::CriticsUpdated => "CRITICS_UPDATED",
            EventKind::MemoryCommitted => "MEMORY_COMMITTED",
            EventKind::TurnCompleted => "TURN_COMPLETED",
            EventKind::SafetyInterrupt => "SAFETY_INTERRUPT",
            EventKind::DaemonTick => "DAEMON_TICK",
            EventKind::ProactiveNudge => "PROACTIVE_NUDGE",
            EventKind::Error => "ERROR",
            EventKind::ModelCallCompleted => "MODEL_CALL_COMPLETED",
        }
    }

    /// Parse the stable string form back into a kind.
    pub fn parse(s: &str) -> Option<EventKind> {
        let kind = match s {
            "TURN_STARTED" => EventKind::TurnStarted,
            "TURN_STAGE_CHANGED" => EventKind::TurnStageChanged,
            "SENSORS_FAST_UPDATED" => EventKind::SensorsFastUpdated,
            "MEMORY_RETRIEVED" => EventKind::MemoryRetrieved,
            "WORKSPACE_PATCHED" => EventKind::WorkspacePatched,
            "WAVE_STARTED" => EventKind::WaveStarted,
            "AGENT_STARTED" => EventKind::AgentStarted,
            "AGENT_COMPLETED" => EventKind::AgentCompleted,
            "AGENT_FAILED" => EventKind::AgentFailed,
            "WAVE_COMPLETED" => EventKind::WaveCompleted,
            "DELIB_ROUND_STARTED" => EventKind::DelibRoundStarted,
            "CONSENSUS_UPDATED" => EventKind::ConsensusUpdated,
            "DELIB_ROUND_COMPLETED" => EventKind::DelibRoundCompleted,
            "COUNCIL_DECISION_MADE" => EventKind::CouncilDecisionMade,
            "VOICE_RENDERED" => EventKind::VoiceRendered,
            "CRITICS_UPDATED" => EventKind::CriticsUpdated,
            "MEMORY_COMMITTED" => EventKind::MemoryCommitted,
            "TURN_COMPLETED" => EventKind::TurnCompleted,
            "SAFETY_INTERRUPT" => EventKind::SafetyInterrupt,
            "DAEMON_TICK" => EventKind::DaemonTick,
            "PROACTIVE_NUDGE" => EventKind::ProactiveNudge,
            "ERROR" => EventKind::Error,
            "MODEL_CALL_COMPLETED" => EventKind::ModelCallCompleted,
            _ => return None,
        };
        Some(kind)
    }
}

/// Pipeline stages, in execution order. Emitted as `TURN_STAGE_CHANGED`
/// payloads and tracked by the TurnState projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStage {
    Ingest,
    SensingFast,
    Context,
    Agents,
    Deliberation,
    Council,
    Critics,
    MemoryCommit,
}

impl TurnStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnStage::Ingest => "ingest",
            TurnStage::SensingFast => "sensing_fast",
            TurnStage::Context => "context",
            TurnStage::Agents => "agents",
            TurnStage::Deliberation => "deliberation",
            TurnStage::Council => "council",
            TurnStage::Critics => "critics",
            TurnStage::MemoryCommit => "memory_commit",
        }
    }
}

/// One immutable engine event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineEvent {
    /// Opaque session identifier.
    pub session_id: String,

    /// Turn counter, monotonic per session. Turn 0 is reserved for the
    /// background daemon stream; runner turns start at 1.
    pub turn_id: u64,

    /// Dense per-turn sequence number, starting at 0.
    pub seq: u64,

    /// Monotonic seconds since process start; non-decreasing in `seq`.
    pub ts_monotonic: f64,

    /// Wall clock, informational only.
    pub ts_wall: DateTime<Utc>,

    pub kind: EventKind,

    /// Opaque mapping of scalars. Interpretation belongs to projections.
    pub payload: Value,

    pub schema_version: u32,
}

impl EngineEvent {
    pub const SCHEMA_VERSION: u32 = 1;

    pub fn new(
        session_id: impl Into<String>,
        turn_id: u64,
        seq: u64,
        ts_monotonic: f64,
        kind: EventKind,
        payload: Value,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            turn_id,
            seq,
            ts_monotonic,
            ts_wall: Utc::now(),
            kind,
            payload,
            schema_version: Self::SCHEMA_VERSION,
        }
    }

    /// Fetch a string field out of the payload.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(|v| v.as_str())
    }

    /// Fetch a numeric field out of the payload.
    pub fn payload_f64(&self, key: &str) -> Option<f64> {
        self.payload.get(key).and_then(|v| v.as_f64())
    }

    /// Fetch an integer field out of the payload.
    pub fn payload_u64(&self, key: &str) -> Option<u64> {
        self.payload.get(key).and_then(|v| v.as_u64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_roundtrip() {
        let kinds = [
            EventKind::TurnStarted,
            EventKind::WaveCompleted,
            EventKind::ModelCallCompleted,
            EventKind::SafetyInterrupt,
            EventKind::TurnCompleted,
        ];
        for kind in kinds {
            assert_eq!(EventKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EventKind::parse("NOT_A_KIND"), None);
    }

    #[test]
    fn test_serde_uses_screaming_snake_case() {
        let s = serde_json::to_string(&EventKind::DelibRoundStarted).unwrap();
        assert_eq!(s, "\"DELIB_ROUND_STARTED\"");
    }

    #[test]
    fn test_payload_accessors() {
        let event = EngineEvent::new(
            "s1",
            1,
            0,
            0.5,
            EventKind::TurnStarted,
            json!({"user_input": "hello", "turn_id": 1}),
        );
        assert_eq!(event.payload_str("user_input"), Some("hello"));
        assert_eq!(event.payload_u64("turn_id"), Some(1));
        assert_eq!(event.payload_str("missing"), None);
    }
}
