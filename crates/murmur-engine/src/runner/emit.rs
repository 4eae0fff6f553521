use std::sync::{Arc, Mutex};
use std::time::Instant;

use murmur_store::EventLog;
use murmur_types::{EngineEvent, EventKind};
use once_cell::sync::Lazy;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

use crate::Result;

static PROCESS_START: Lazy<Instant> = Lazy::new(Instant::now);

/// Monotonic seconds since process start. Strictly non-decreasing, which
/// is all `ts_monotonic` promises.
pub fn monotonic_now() -> f64 {
    PROCESS_START.elapsed().as_secs_f64()
}

/// Mints, persists, and forwards events for one turn (or the daemon's
/// turn-0 stream). Every emit is: take the next dense seq, append to the
/// log, then forward to the live consumer. Append failures propagate:
/// an event that is not in the log did not happen.
pub struct Emitter {
    log: Arc<Mutex<EventLog>>,
    tx: Option<UnboundedSender<EngineEvent>>,
    session_id: String,
    turn_id: u64,
}

impl Emitter {
    pub fn new(
        log: Arc<Mutex<EventLog>>,
        tx: Option<UnboundedSender<EngineEvent>>,
        session_id: impl Into<String>,
        turn_id: u64,
    ) -> Self {
        Self {
            log,
            tx,
            session_id: session_id.into(),
            turn_id,
        }
    }

    pub fn turn_id(&self) -> u64 {
        self.turn_id
    }

    pub fn emit(&self, kind: EventKind, payload: Value) -> Result<EngineEvent> {
        let event = {
            let mut log = self.log.lock().expect("event log lock poisoned");
            let seq = log.next_seq(&self.session_id, self.turn_id);
            let event = EngineEvent::new(
                self.session_id.clone(),
                self.turn_id,
                seq,
                monotonic_now(),
                kind,
                payload,
            );
            log.append(&event)?;
            event
        };

        if let Some(tx) = &self.tx {
            // A gone consumer is not an error; the log remains the truth.
            let _ = tx.send(event.clone());
        }
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_monotonic_now_is_non_decreasing() {
        let a = monotonic_now();
        let b = monotonic_now();
        assert!(b >= a);
    }

    #[test]
    fn test_emit_assigns_dense_seq_and_persists() {
        let log = Arc::new(Mutex::new(EventLog::open_in_memory().unwrap()));
        let emitter = Emitter::new(log.clone(), None, "s1", 1);

        let first = emitter
            .emit(EventKind::TurnStarted, json!({"user_input": "hi"}))
            .unwrap();
        let second = emitter
            .emit(EventKind::TurnCompleted, json!({"response": ""}))
            .unwrap();

        assert_eq!(first.seq, 0);
        assert_eq!(second.seq, 1);
        assert!(second.ts_monotonic >= first.ts_monotonic);
        assert_eq!(
            log.lock().unwrap().count_events(Some("s1"), Some(1)).unwrap(),
            2
        );
    }

    #[test]
    fn test_emit_forwards_to_consumer() {
        let log = Arc::new(Mutex::new(EventLog::open_in_memory().unwrap()));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let emitter = Emitter::new(log, Some(tx), "s1", 1);

        emitter.emit(EventKind::TurnStarted, json!({})).unwrap();
        let forwarded = rx.try_recv().unwrap();
        assert_eq!(forwarded.kind, EventKind::TurnStarted);
    }
}
