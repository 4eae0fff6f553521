use murmur_types::{EngineEvent, EventKind};
use serde_json::Value;

/// Build an event with `ts_monotonic` derived from its seq.
pub fn event(session: &str, turn: u64, seq: u64, kind: EventKind, payload: Value) -> EngineEvent {
    event_at(session, turn, seq, seq as f64, kind, payload)
}

/// Build an event with an explicit monotonic timestamp.
pub fn event_at(
    session: &str,
    turn: u64,
    seq: u64,
    ts_monotonic: f64,
    kind: EventKind,
    payload: Value,
) -> EngineEvent {
    EngineEvent::new(session, turn, seq, ts_monotonic, kind, payload)
}
