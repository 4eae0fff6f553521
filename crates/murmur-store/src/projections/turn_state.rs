use std::collections::BTreeMap;

use murmur_types::{EngineEvent, EventKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::Projection;

/// Category of a single UI update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiUpdateKind {
    Sensors,
    Stance,
    Agents,
    Workspace,
    Critics,
    Memory,
    Chat,
    Activity,
}

/// One typed update for the UI to apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiUpdate {
    pub kind: UiUpdateKind,
    pub payload: Value,
}

impl UiUpdate {
    fn new(kind: UiUpdateKind, payload: Value) -> Self {
        Self { kind, payload }
    }
}

/// Maintains UI-ready state from the event stream. Each applied event
/// yields zero or more [`UiUpdate`]s for immediate rendering; the struct
/// itself is the accumulated view, rebuildable from replay at any time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnStateProjection {
    // Panel state
    pub sensors: BTreeMap<String, f64>,
    pub stance: BTreeMap<String, f64>,
    pub agent_logs: Vec<String>,
    pub workspace: Map<String, Value>,
    pub critics: Vec<Value>,
    pub memory: Map<String, Value>,
    pub chat: Vec<Value>,

    // Turn state
    pub current_stage: String,
    pub current_turn_id: u64,
    pub response: String,

    // Timing
    pub turn_start_time: f64,
    pub stage_times: BTreeMap<String, f64>,
}

impl TurnStateProjection {
    pub fn new() -> Self {
        Self {
            current_stage: "idle".to_string(),
            ..Default::default()
        }
    }

    /// Reset transient per-turn state, keeping the running chat.
    fn reset_for_turn(&mut self) {
        self.agent_logs.clear();
        self.critics.clear();
        self.response.clear();
        self.stage_times.clear();
    }

    /// Apply one event and collect the UI updates it produces.
    pub fn apply_updates(&mut self, event: &EngineEvent) -> Vec<UiUpdate> {
        let mut updates = Vec::new();

        match event.kind {
            EventKind::TurnStarted => {
                self.reset_for_turn();
                self.current_turn_id = event.payload_u64("turn_id").unwrap_or(0);
                self.turn_start_time = event.ts_monotonic;
                if let Some(user_input) = event.payload_str("user_input") {
                    let message = json!({"role": "user", "text": user_input});
                    self.chat.push(message.clone());
                    updates.push(UiUpdate::new(UiUpdateKind::Chat, message));
                }
                updates.push(UiUpdate::new(UiUpdateKind::Activity, json!({"stage": "starting"})));
            }

            EventKind::TurnStageChanged => {
                let stage = event.payload_str("stage").unwrap_or("unknown").to_string();
                self.stage_times.insert(stage.clone(), event.ts_monotonic);
                self.current_stage = stage.clone();
                updates.push(UiUpdate::new(UiUpdateKind::Activity, json!({"stage": stage})));
            }

            EventKind::TurnCompleted => {
                self.current_stage = "idle".to_string();
                if let Some(response) = event.payload_str("response") {
                    self.response = response.to_string();
                }
                updates.push(UiUpdate::new(UiUpdateKind::Activity, json!({"stage": "idle"})));
            }

            EventKind::SensorsFastUpdated => {
                if let Some(sensors) = event.payload.get("sensors").and_then(|v| v.as_object()) {
                    self.sensors = sensors
                        .iter()
                        .filter_map(|(k, v)| v.as_f64().map(|f| (k.clone(), f)))
                        .collect();
                }
                updates.push(UiUpdate::new(
                    UiUpdateKind::Sensors,
                    json!({"sensors": &self.sensors}),
                ));
            }

            EventKind::AgentCompleted => {
                let agent_id = event.payload_str("agent_id").unwrap_or("?");
                let observation = event.payload_str("observation").unwrap_or("");
                // "Quiet" entries carry no signal worth a log line.
                if !observation.is_empty() && !observation.eq_ignore_ascii_case("quiet") {
                    let line = format!("{}: {}", agent_id, truncate(observation, 100));
                    self.agent_logs.push(line.clone());
                    updates.push(UiUpdate::new(UiUpdateKind::Agents, json!({"line": line})));
                }
            }

            EventKind::AgentFailed => {
                let agent_id = event.payload_str("agent_id").unwrap_or("?");
                let error = event.payload_str("error").unwrap_or("Unknown error");
                let line = format!("{}: FAILED - {}", agent_id, truncate(error, 50));
                self.agent_logs.push(line.clone());
                updates.push(UiUpdate::new(UiUpdateKind::Agents, json!({"line": line})));
            }

            EventKind::WorkspacePatched => {
                if let Some(patch) = event.payload.get("patch").and_then(|v| v.as_object()) {
                    for (key, value) in patch {
                        self.workspace.insert(key.clone(), value.clone());
                    }
                    if let Some(stance) = patch.get("stance").and_then(|v| v.as_object()) {
                        for (dim, value) in stance {
                            if let Some(v) = value.as_f64() {
                                self.stance.insert(dim.clone(), v);
                            }
                        }
                        updates.push(UiUpdate::new(
                            UiUpdateKind::Stance,
                            json!({"stance": &self.stance}),
                        ));
                    }
                }
                updates.push(UiUpdate::new(
                    UiUpdateKind::Workspace,
                    json!({"workspace": &self.workspace}),
                ));
            }

            EventKind::DelibRoundStarted => {
                let round = event.payload_u64("round").unwrap_or(0);
                let line = format!("Deliberation round {round} started");
                self.agent_logs.push(line.clone());
                updates.push(UiUpdate::new(UiUpdateKind::Agents, json!({"line": line})));
            }

            EventKind::ConsensusUpdated => {
                let level = event.payload_f64("level").unwrap_or(0.0);
                self.workspace.insert("consensus".to_string(), json!(level));
                updates.push(UiUpdate::new(
                    UiUpdateKind::Workspace,
                    json!({"workspace": &self.workspace}),
                ));
            }

            EventKind::CouncilDecisionMade => {
                for key in ["speak", "urgency", "intent"] {
                    if let Some(value) = event.payload.get(key) {
                        self.workspace.insert(key.to_string(), value.clone());
                    }
                }
                updates.push(UiUpdate::new(
                    UiUpdateKind::Workspace,
                    json!({"workspace": &self.workspace}),
                ));
            }

            EventKind::VoiceRendered => {
                let text = event.payload_str("text").unwrap_or("").to_string();
                self.response = text.clone();
                let message = json!({"role": "assistant", "text": text});
                self.chat.push(message.clone());
                updates.push(UiUpdate::new(UiUpdateKind::Chat, message));
            }

            EventKind::CriticsUpdated => {
                if let Some(results) = event.payload.get("results").and_then(|v| v.as_array()) {
                    self.critics = results.clone();
                }
                updates.push(UiUpdate::new(
                    UiUpdateKind::Critics,
                    json!({"results": &self.critics}),
                ));
            }

            EventKind::SafetyInterrupt => {
                let reason = event.payload_str("reason").unwrap_or("unknown");
                self.critics.push(json!({
                    "critic": "safety_interrupt",
                    "passed": false,
                    "reason": reason,
                }));
                updates.push(UiUpdate::new(
                    UiUpdateKind::Critics,
                    json!({"results": &self.critics}),
                ));
                updates.push(UiUpdate::new(
                    UiUpdateKind::Activity,
                    json!({"stage": "safety_interrupt"}),
                ));
            }

            EventKind::MemoryRetrieved => {
                let count = |key: &str| {
                    event
                        .payload
                        .get(key)
                        .and_then(|v| v.as_array())
                        .map(|a| a.len())
                        .unwrap_or(0)
                };
                self.memory.insert(
                    "retrieved".to_string(),
                    json!({
                        "episodes": count("episodes"),
                        "user_facts": count("user_facts"),
                        "open_threads": count("open_threads"),
                    }),
                );
                updates.push(UiUpdate::new(UiUpdateKind::Memory, json!({"memory": &self.memory})));
            }

            EventKind::MemoryCommitted => {
                if let Some(summary) = event.payload.get("summary") {
                    self.memory.insert("committed".to_string(), summary.clone());
                }
                updates.push(UiUpdate::new(UiUpdateKind::Memory, json!({"memory": &self.memory})));
            }

            EventKind::ProactiveNudge => {
                let reason = event.payload_str("reason").unwrap_or("");
                let text = event.payload_str("text").unwrap_or("");
                let line = format!("Nudge ({reason}): {text}");
                self.agent_logs.push(line.clone());
                updates.push(UiUpdate::new(UiUpdateKind::Agents, json!({"line": line})));
            }

            // No UI surface for these.
            EventKind::WaveStarted
            | EventKind::AgentStarted
            | EventKind::WaveCompleted
            | EventKind::DelibRoundCompleted
            | EventKind::DaemonTick
            | EventKind::Error
            | EventKind::ModelCallCompleted => {}
        }

        updates
    }
}

impl Projection for TurnStateProjection {
    fn apply(&mut self, event: &EngineEvent) {
        let _ = self.apply_updates(event);
    }

    fn reset(&mut self) {
        *self = TurnStateProjection::new();
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
