//! Assembly-level tests: session resume, the daemon's turn-0 stream, and
//! replay across a whole session.

use std::sync::{Arc, Mutex};

use murmur_runtime::{Config, Runtime};
use murmur_store::EventLog;
use murmur_store::projections::{AnalyticsProjection, Projection, TurnStateProjection};
use murmur_testing::{ScriptedModel, StaticMemory, TemplateVoice};
use murmur_types::EventKind;

fn runtime_with_log(log: Arc<Mutex<EventLog>>) -> Runtime {
    Runtime::with_log(
        Config::default(),
        log,
        Arc::new(ScriptedModel::quiet()),
        Arc::new(StaticMemory::empty()),
        Arc::new(TemplateVoice),
    )
    .unwrap()
}

#[tokio::test]
async fn test_session_resumes_turn_counter() {
    let log = Arc::new(Mutex::new(EventLog::open_in_memory().unwrap()));

    let mut runtime = runtime_with_log(log.clone());
    runtime.open_session("s1").unwrap();
    let first = runtime.run_turn("hi").await.unwrap();
    let second = runtime.run_turn("hello again").await.unwrap();
    assert_eq!(first.turn_id, 1);
    assert_eq!(second.turn_id, 2);

    // A fresh assembly over the same log continues where it left off.
    let mut resumed = runtime_with_log(log.clone());
    resumed.open_session("s1").unwrap();
    let third = resumed.run_turn("and once more?").await.unwrap();
    assert_eq!(third.turn_id, 3);

    let last = log.lock().unwrap().get_last_turn_id("s1").unwrap();
    assert_eq!(last, 3);
}

#[tokio::test]
async fn test_daemon_stream_is_turn_zero() {
    let log = Arc::new(Mutex::new(EventLog::open_in_memory().unwrap()));
    let mut runtime = runtime_with_log(log.clone());
    runtime.open_session("s1").unwrap();
    runtime.run_turn("hi").await.unwrap();

    let mut daemon = runtime.build_daemon();
    daemon.tick(100.0, 12).unwrap();
    daemon.tick(200.0, 12).unwrap();

    // Daemon events live under the reserved turn 0 with their own dense
    // seq; runner turns stay strictly bracketed.
    let background = log.lock().unwrap().replay_turn("s1", 0).unwrap();
    assert_eq!(background.len(), 2);
    assert!(background.iter().all(|e| e.kind == EventKind::DaemonTick));
    assert_eq!(background[0].seq, 0);
    assert_eq!(background[1].seq, 1);

    let turn = log.lock().unwrap().replay_turn("s1", 1).unwrap();
    assert_eq!(turn[0].kind, EventKind::TurnStarted);
    assert_eq!(turn.last().unwrap().kind, EventKind::TurnCompleted);
    assert!(!turn.iter().any(|e| e.kind == EventKind::DaemonTick));
}

#[tokio::test]
async fn test_daemon_decay_carries_into_next_turn() {
    let log = Arc::new(Mutex::new(EventLog::open_in_memory().unwrap()));
    let mut runtime = runtime_with_log(log.clone());
    runtime.open_session("s1").unwrap();

    runtime.shared_affect().lock().unwrap().modulators.arousal = 0.9;
    let mut daemon = runtime.build_daemon();
    daemon.tick(100.0, 12).unwrap();

    let decayed = runtime.shared_affect().lock().unwrap().modulators.arousal;
    assert!(decayed < 0.9);

    // The next turn starts from the decayed value rather than snapping
    // back to where the previous turn left it.
    runtime.run_turn("hi").await.unwrap();
    let after_turn = runtime.shared_affect().lock().unwrap().modulators.arousal;
    assert!(after_turn < 0.9);
}

#[tokio::test]
async fn test_full_session_replay_is_deterministic() {
    let log = Arc::new(Mutex::new(EventLog::open_in_memory().unwrap()));
    let mut runtime = runtime_with_log(log.clone());
    runtime.open_session("s1").unwrap();
    runtime.run_turn("hi").await.unwrap();
    runtime.run_turn("how are things?").await.unwrap();

    let events = log.lock().unwrap().replay_session("s1").unwrap();

    // (turn_id, seq) is a total order.
    for pair in events.windows(2) {
        assert!(
            (pair[0].turn_id, pair[0].seq) < (pair[1].turn_id, pair[1].seq),
            "events out of order"
        );
    }

    let mut once = TurnStateProjection::new();
    once.replay(events.iter());
    let mut twice = TurnStateProjection::new();
    twice.replay(events.iter());
    assert_eq!(once, twice);

    let mut analytics = AnalyticsProjection::new();
    analytics.replay(events.iter());
    assert!(analytics.total_calls > 0);
}

#[tokio::test]
async fn test_durable_log_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.data_dir = dir.path().to_path_buf();

    let mut runtime = Runtime::new(
        config,
        Arc::new(ScriptedModel::quiet()),
        Arc::new(StaticMemory::empty()),
        Arc::new(TemplateVoice),
    )
    .unwrap();
    runtime.open_session("s1").unwrap();
    let outcome = runtime.run_turn("hi").await.unwrap();

    // Reopen the database cold and replay.
    let reopened = EventLog::open(&dir.path().join("events.db")).unwrap();
    let events = reopened.replay_turn("s1", 1).unwrap();
    assert_eq!(events.last().unwrap().kind, EventKind::TurnCompleted);
    assert_eq!(
        events.last().unwrap().payload_str("response"),
        Some(outcome.response.as_str())
    );
}
