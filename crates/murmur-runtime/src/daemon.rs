use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Timelike;
use murmur_engine::{Emitter, SharedAffectHandle, monotonic_now};
use murmur_store::EventLog;
use murmur_types::{EventKind, GlobalModulators, ResponseUrgency};
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::Result;
use crate::config::Config;

// NOTE: The daemon shares a session with the turn runner but writes to the
// reserved turn-0 stream, so runner turns keep their strict
// TURN_STARTED..TURN_COMPLETED bracketing. It only touches the shared
// affect block (modulators, its own nudge cooldowns); workspace fields
// written by an active turn are never its to mutate.

/// Silence before a high-stress check-in fires.
const HIGH_STRESS_SILENCE_SECS: f64 = 300.0;

/// Silence before an unresolved-rupture check-in fires.
const RUPTURE_SILENCE_SECS: f64 = 600.0;

/// Session length before a break suggestion fires.
const SESSION_BREAK_AFTER_SECS: f64 = 3600.0;

/// Phrases that read as surveillance; scrubbed from nudge text.
const FORBIDDEN_PHRASES: &[&str] = &[
    "I heard you say",
    "I noticed you mentioned",
    "Based on what you told me",
    "I've been tracking",
    "My analysis suggests",
    "I observed that you",
    "According to my records",
];

/// A nudge trigger that fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nudge {
    pub reason: &'static str,
    pub text: String,
    pub urgency: ResponseUrgency,
}

pub type NudgeCallback = Arc<dyn Fn(&Nudge) + Send + Sync>;

/// Timer-driven background loop: modulator decay plus idle nudges under
/// per-trigger cooldowns and a shared quiet-hours window.
pub struct Daemon {
    log: Arc<Mutex<EventLog>>,
    shared: SharedAffectHandle,
    session_id: String,
    tick_interval: Duration,
    nudge_cooldown_secs: f64,
    quiet_hours: (u32, u32),
    urgency_threshold: ResponseUrgency,
    tick_count: u64,
    last_nudge_times: HashMap<&'static str, f64>,
    session_start: f64,
    on_nudge: Option<NudgeCallback>,
}

impl Daemon {
    pub fn new(
        log: Arc<Mutex<EventLog>>,
        shared: SharedAffectHandle,
        session_id: impl Into<String>,
        config: &Config,
    ) -> Self {
        Self {
            log,
            shared,
            session_id: session_id.into(),
            tick_interval: Duration::from_secs_f64(config.daemon_tick_interval_secs),
            nudge_cooldown_secs: config.nudge_cooldown_secs,
            quiet_hours: config.quiet_hours,
            urgency_threshold: config.daemon_urgency_threshold,
            tick_count: 0,
            last_nudge_times: HashMap::new(),
            session_start: monotonic_now(),
            on_nudge: None,
        }
    }

    pub fn set_nudge_callback(&mut self, callback: NudgeCallback) {
        self.on_nudge = Some(callback);
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Reset per-session rolling state.
    pub fn reset_session(&mut self) {
        self.last_nudge_times.clear();
        self.session_start = monotonic_now();
    }

    /// One unit of background work. `now` is monotonic seconds and
    /// `local_hour` the local wall-clock hour; both are parameters so
    /// tests drive the daemon deterministically.
    pub fn tick(&mut self, now: f64, local_hour: u32) -> Result<Option<Nudge>> {
        self.tick_count += 1;
        let emitter = Emitter::new(self.log.clone(), None, self.session_id.clone(), 0);

        let modulator_snapshot = {
            let mut shared = self.shared.lock().expect("shared affect lock poisoned");
            let snapshot = shared.modulators.to_payload();
            shared.modulators.decay(GlobalModulators::DEFAULT_DECAY);
            snapshot
        };

        emitter.emit(
            EventKind::DaemonTick,
            json!({"tick": self.tick_count, "modulators": modulator_snapshot}),
        )?;

        let Some(nudge) = self.check_nudges(now, local_hour) else {
            return Ok(None);
        };

        emitter.emit(
            EventKind::ProactiveNudge,
            json!({
                "reason": nudge.reason,
                "text": &nudge.text,
                "urgency": nudge.urgency.as_str(),
            }),
        )?;
        info!(reason = nudge.reason, "proactive nudge fired");
        if let Some(callback) = &self.on_nudge {
            callback(&nudge);
        }
        Ok(Some(nudge))
    }

    fn check_nudges(&mut self, now: f64, local_hour: u32) -> Option<Nudge> {
        if in_quiet_hours(local_hour, self.quiet_hours) {
            debug!("in quiet hours, nudges suppressed");
            return None;
        }

        let (strain, valence, closeness, fatigue, last_message_at) = {
            let shared = self.shared.lock().expect("shared affect lock poisoned");
            (
                shared.stance.strain,
                shared.stance.valence,
                shared.stance.closeness,
                shared.modulators.fatigue,
                shared.last_user_message_at,
            )
        };
        let silence = last_message_at.map(|at| now - at);

        if strain > 0.6
            && silence.is_some_and(|s| s >= HIGH_STRESS_SILENCE_SECS)
            && self.surfaces(ResponseUrgency::High)
            && self.cooldown_clear("high_stress_silence", now)
        {
            return Some(self.fire(
                "high_stress_silence",
                "Quick thought: it's gone quiet and earlier felt heavy. \
                 No need to reply - just checking in.",
                ResponseUrgency::High,
                now,
            ));
        }

        if valence < -0.3
            && closeness < 0.3
            && silence.is_some_and(|s| s >= RUPTURE_SILENCE_SECS)
            && self.surfaces(ResponseUrgency::Medium)
            && self.cooldown_clear("rupture_unresolved", now)
        {
            return Some(self.fire(
                "rupture_unresolved",
                "One thing to consider: that last exchange may have landed \
                 badly. Happy to revisit it whenever.",
                ResponseUrgency::Medium,
                now,
            ));
        }

        if fatigue > 0.5
            && now - self.session_start > SESSION_BREAK_AFTER_SECS
            && self.surfaces(ResponseUrgency::Low)
            && self.cooldown_clear("session_break", now)
        {
            return Some(self.fire(
                "session_break",
                "Worth noting: this has been a long stretch. A short break \
                 might help.",
                ResponseUrgency::Low,
                now,
            ));
        }

        None
    }

    /// Whether a nudge at this urgency clears the configured threshold.
    fn surfaces(&self, urgency: ResponseUrgency) -> bool {
        urgency >= self.urgency_threshold
    }

    fn cooldown_clear(&self, reason: &'static str, now: f64) -> bool {
        self.last_nudge_times
            .get(reason)
            .is_none_or(|last| now - last >= self.nudge_cooldown_secs)
    }

    fn fire(
        &mut self,
        reason: &'static str,
        text: &str,
        urgency: ResponseUrgency,
        now: f64,
    ) -> Nudge {
        self.last_nudge_times.insert(reason, now);
        Nudge {
            reason,
            text: scrub_forbidden_phrases(text),
            urgency,
        }
    }

    /// Run the tick loop until the returned handle is aborted.
    pub fn spawn(mut self) -> DaemonHandle {
        let interval = self.tick_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first interval tick completes immediately; skip it so
            // the first unit of work lands one full period in.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let now = monotonic_now();
                let hour = chrono::Local::now().hour();
                if let Err(err) = self.tick(now, hour) {
                    tracing::error!(error = %err, "daemon tick failed");
                }
            }
        });
        DaemonHandle { handle }
    }
}

/// Handle to a spawned daemon loop.
pub struct DaemonHandle {
    handle: JoinHandle<()>,
}

impl DaemonHandle {
    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for DaemonHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Remove surveillance-sounding phrasing from a nudge.
fn scrub_forbidden_phrases(text: &str) -> String {
    let mut scrubbed = text.to_string();
    for phrase in FORBIDDEN_PHRASES {
        let lower = scrubbed.to_lowercase();
        if let Some(idx) = lower.find(&phrase.to_lowercase()) {
            scrubbed.replace_range(idx..idx + phrase.len(), "");
            scrubbed = scrubbed.trim().to_string();
        }
    }
    scrubbed
}

fn in_quiet_hours(hour: u32, (start, end): (u32, u32)) -> bool {
    if start > end {
        hour >= start || hour < end
    } else {
        start <= hour && hour < end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_engine::SharedAffect;

    fn setup(strain: f64) -> (Daemon, Arc<Mutex<EventLog>>, SharedAffectHandle) {
        let log = Arc::new(Mutex::new(EventLog::open_in_memory().unwrap()));
        let shared: SharedAffectHandle = Arc::new(Mutex::new(SharedAffect::default()));
        {
            let mut s = shared.lock().unwrap();
            s.stance.strain = strain;
            s.last_user_message_at = Some(0.0);
        }
        let config = Config::default();
        let mut daemon = Daemon::new(log.clone(), shared.clone(), "s1", &config);
        daemon.session_start = 0.0;
        (daemon, log, shared)
    }

    #[test]
    fn test_tick_emits_and_decays() {
        let (mut daemon, log, shared) = setup(0.0);
        shared.lock().unwrap().modulators.arousal = 0.8;

        daemon.tick(10.0, 12).unwrap();

        let arousal = shared.lock().unwrap().modulators.arousal;
        assert!(arousal < 0.8);
        assert!(arousal > 0.3);

        let events = log.lock().unwrap().replay_turn("s1", 0).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::DaemonTick);
        assert_eq!(events[0].payload["tick"], 1);
        // The snapshot carries the pre-decay value.
        assert_eq!(events[0].payload["modulators"]["arousal"], 0.8);
    }

    #[test]
    fn test_high_stress_silence_fires_and_cools_down() {
        let (mut daemon, log, _shared) = setup(0.8);

        let first = daemon.tick(400.0, 12).unwrap();
        assert_eq!(first.unwrap().reason, "high_stress_silence");

        // Within the 10 minute trigger cooldown: nothing.
        let second = daemon.tick(500.0, 12).unwrap();
        assert!(second.is_none());

        // Past the cooldown it may fire again.
        let third = daemon.tick(1100.0, 12).unwrap();
        assert_eq!(third.unwrap().reason, "high_stress_silence");

        let nudges = log
            .lock()
            .unwrap()
            .get_events_by_kind("s1", EventKind::ProactiveNudge, 10)
            .unwrap();
        assert_eq!(nudges.len(), 2);
    }

    #[test]
    fn test_no_nudge_when_recent_message() {
        let (mut daemon, _log, shared) = setup(0.8);
        shared.lock().unwrap().last_user_message_at = Some(350.0);
        let nudge = daemon.tick(400.0, 12).unwrap();
        assert!(nudge.is_none());
    }

    #[test]
    fn test_no_nudge_when_low_stress() {
        let (mut daemon, _log, _shared) = setup(0.3);
        let nudge = daemon.tick(400.0, 12).unwrap();
        assert!(nudge.is_none());
    }

    #[test]
    fn test_rupture_unresolved_fires() {
        let (mut daemon, _log, shared) = setup(0.55);
        {
            let mut s = shared.lock().unwrap();
            s.stance.valence = -0.5;
            s.stance.closeness = 0.2;
        }
        let nudge = daemon.tick(600.0, 12).unwrap();
        assert_eq!(nudge.unwrap().reason, "rupture_unresolved");
    }

    #[test]
    fn test_session_break_fires() {
        let (mut daemon, _log, shared) = setup(0.0);
        shared.lock().unwrap().modulators.fatigue = 0.6;
        shared.lock().unwrap().last_user_message_at = Some(3900.0);
        let nudge = daemon.tick(4000.0, 12).unwrap();
        assert_eq!(nudge.unwrap().reason, "session_break");
    }

    #[test]
    fn test_quiet_hours_suppress() {
        let (mut daemon, _log, _shared) = setup(0.9);
        assert!(daemon.tick(400.0, 23).unwrap().is_none());
        assert!(daemon.tick(500.0, 7).unwrap().is_none());
        assert!(daemon.tick(1200.0, 8).unwrap().is_some());
    }

    #[test]
    fn test_urgency_threshold_suppresses_low_nudges() {
        let (mut daemon, _log, shared) = setup(0.0);
        daemon.urgency_threshold = ResponseUrgency::High;
        shared.lock().unwrap().modulators.fatigue = 0.6;
        shared.lock().unwrap().last_user_message_at = Some(3900.0);

        // session_break is a low-urgency nudge; the threshold holds it back.
        assert!(daemon.tick(4000.0, 12).unwrap().is_none());

        daemon.urgency_threshold = ResponseUrgency::Low;
        assert_eq!(
            daemon.tick(4100.0, 12).unwrap().unwrap().reason,
            "session_break"
        );
    }

    #[test]
    fn test_reset_session_clears_rolling_state() {
        let (mut daemon, _log, _shared) = setup(0.8);
        daemon.tick(400.0, 12).unwrap();
        assert!(!daemon.last_nudge_times.is_empty());
        daemon.reset_session();
        assert!(daemon.last_nudge_times.is_empty());
    }

    #[test]
    fn test_scrub_forbidden_phrases() {
        let scrubbed = scrub_forbidden_phrases("I noticed you mentioned the deadline is close.");
        assert!(!scrubbed.to_lowercase().contains("i noticed you mentioned"));
        assert!(scrubbed.contains("the deadline is close"));
    }

    #[test]
    fn test_quiet_hours_window_spans_midnight() {
        assert!(in_quiet_hours(23, (22, 8)));
        assert!(in_quiet_hours(3, (22, 8)));
        assert!(!in_quiet_hours(12, (22, 8)));
        assert!(in_quiet_hours(13, (12, 14)));
        assert!(!in_quiet_hours(14, (12, 14)));
    }

    #[test]
    fn test_callback_invoked() {
        let (mut daemon, _log, _shared) = setup(0.8);
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        daemon.set_nudge_callback(Arc::new(move |nudge| {
            seen_clone.lock().unwrap().push(nudge.reason.to_string());
        }));

        daemon.tick(400.0, 12).unwrap();
        assert_eq!(seen.lock().unwrap().as_slice(), ["high_stress_silence"]);
    }
}
