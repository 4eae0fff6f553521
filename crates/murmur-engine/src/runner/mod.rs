//! The turn runner: drives the fixed stage pipeline for one user input,
//! emitting an event after every observable transition.
//!
//! Stage order: ingest → sensing_fast → context → agents → deliberation →
//! council → critics → memory_commit. The safety interrupt short-circuits
//! after sensing; unrecoverable errors end the turn with ERROR followed by
//! a failed TURN_COMPLETED.

mod emit;

pub use emit::{Emitter, monotonic_now};

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{Duration as ChronoDuration, Utc};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use murmur_store::EventLog;
use murmur_types::{
    AgencyAssessment, AgentAssessment, Claim, EngineEvent, EventKind, EventSignature,
    StanceDelta, TurnStage,
};
use serde_json::{Value, json};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, warn};

use crate::agent::{AgencyDef, AgentDef, AgentRuntime, WorkingMemoryView};
use crate::contracts::{LanguageModel, MemoryStore, Message, VoiceRenderer};
use crate::council::{Council, SAFETY_RESPONSE};
use crate::critics::{critics_pass, run_critics};
use crate::deliberation::{DelibPhase, DeliberationResult, Deliberator};
use crate::scheduler::Scheduler;
use crate::sensors::{SAFETY_INTERRUPT_THRESHOLD, run_fast_sensors};
use crate::settings::EngineSettings;
use crate::voice::{fallback_render, render_with_fallback};
use crate::workspace::Workspace;
use crate::{Error, Result};

/// Fixed template for unrecoverable failures.
const APOLOGY_RESPONSE: &str =
    "I'm sorry - something went wrong on my side while thinking that through. \
     Could you say that again?";

/// Affective state shared between the runner and the background daemon.
/// The runner syncs it at turn boundaries; the daemon decays modulators
/// and reads the stance snapshot between turns. Always locked briefly,
/// never across an await.
#[derive(Debug, Default)]
pub struct SharedAffect {
    pub modulators: murmur_types::GlobalModulators,
    pub stance: murmur_types::StanceVector,
    pub last_user_message_at: Option<f64>,
    pub last_turn_completed_at: Option<f64>,
}

pub type SharedAffectHandle = Arc<Mutex<SharedAffect>>;

/// Summary of a completed turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub turn_id: u64,
    pub response: String,
    pub spoke: bool,
    pub critics_passed: bool,
    pub total_time_ms: u64,
}

pub struct TurnRunner {
    log: Arc<Mutex<EventLog>>,
    memory: Arc<dyn MemoryStore>,
    voice: Arc<dyn VoiceRenderer>,
    settings: Arc<EngineSettings>,
    runtime: Arc<AgentRuntime>,
    scheduler: Scheduler,
    council: Council,
    deliberator: Deliberator,
    workspace: Workspace,
    shared: SharedAffectHandle,

    session_id: String,
    turn_id: u64,
    history: Vec<Message>,
    claim_counter: u64,
    events_tx: Option<UnboundedSender<EngineEvent>>,
    cancel: Arc<AtomicBool>,
}

impl TurnRunner {
    pub fn new(
        log: Arc<Mutex<EventLog>>,
        model: Arc<dyn LanguageModel>,
        memory: Arc<dyn MemoryStore>,
        voice: Arc<dyn VoiceRenderer>,
        settings: EngineSettings,
        agencies: Vec<AgencyDef>,
        shared: SharedAffectHandle,
    ) -> Self {
        let settings = Arc::new(settings);
        let runtime = Arc::new(AgentRuntime::new(model.clone(), settings.clone()));
        Self {
            log,
            memory,
            voice,
            scheduler: Scheduler::new(agencies, settings.clone()),
            council: Council::new(model, settings.clone()),
            deliberator: Deliberator::new(runtime.clone()),
            runtime,
            settings,
            workspace: Workspace::new(),
            shared,
            session_id: "default".to_string(),
            turn_id: 0,
            history: Vec::new(),
            claim_counter: 0,
            events_tx: None,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Point the runner at a session, resuming its turn counter from the
    /// log.
    pub fn set_session(&mut self, session_id: &str) -> Result<()> {
        self.session_id = session_id.to_string();
        self.turn_id = self
            .log
            .lock()
            .expect("event log lock poisoned")
            .get_last_turn_id(session_id)?;
        self.history.clear();
        Ok(())
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Live event feed. The log remains authoritative; this channel is a
    /// convenience for UIs.
    pub fn subscribe(&mut self) -> UnboundedReceiver<EngineEvent> {
        let (tx, rx) = unbounded_channel();
        self.events_tx = Some(tx);
        rx
    }

    /// Flag checked between stages; setting it abandons the turn with a
    /// `Cancelled` error. An already-issued model call finishes and its
    /// result is discarded.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    /// Execute one full turn for a user input.
    pub async fn run_turn(&mut self, user_input: &str) -> Result<TurnOutcome> {
        self.turn_id += 1;
        self.cancel.store(false, Ordering::Relaxed);
        let emitter = Emitter::new(
            self.log.clone(),
            self.events_tx.clone(),
            self.session_id.clone(),
            self.turn_id,
        );
        let started = Instant::now();

        match self.run_turn_inner(&emitter, user_input, &started).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                warn!(turn_id = self.turn_id, error = %err, "turn failed");
                let _ = emitter.emit(
                    EventKind::Error,
                    json!({"error_kind": err.kind_str(), "message": err.to_string()}),
                );
                if self.workspace.current_response.is_empty() {
                    let _ = emitter.emit(EventKind::VoiceRendered, json!({"text": APOLOGY_RESPONSE}));
                }
                let _ = emitter.emit(
                    EventKind::TurnCompleted,
                    json!({
                        "total_time_ms": started.elapsed().as_millis() as u64,
                        "response": APOLOGY_RESPONSE,
                        "failed": true,
                    }),
                );
                Err(err)
            }
        }
    }

    async fn run_turn_inner(
        &mut self,
        emitter: &Emitter,
        user_input: &str,
        started: &Instant,
    ) -> Result<TurnOutcome> {
        let now = monotonic_now();
        self.claim_counter = 0;
        self.workspace.begin_turn(self.turn_id, now);
        // Pick up any modulator decay the daemon applied between turns.
        {
            let shared = self.shared.lock().expect("shared affect lock poisoned");
            self.workspace.modulators = shared.modulators.clone();
        }

        // Stage 0: ingest & normalize.
        emitter.emit(
            EventKind::TurnStarted,
            json!({"user_input": user_input, "turn_id": self.turn_id}),
        )?;
        self.emit_stage(emitter, TurnStage::Ingest)?;
        self.workspace.set_user_message(user_input);

        // Stage 1: fast sensors.
        self.emit_stage(emitter, TurnStage::SensingFast)?;
        let sensors = run_fast_sensors(&self.workspace.user_message);
        emitter.emit(EventKind::SensorsFastUpdated, json!({"sensors": &sensors}))?;
        let safety_risk = sensors.get("safety_risk").copied().unwrap_or(0.0);
        self.workspace.apply_sensor_patch(sensors);

        if safety_risk > SAFETY_INTERRUPT_THRESHOLD {
            return self.run_safety_interrupt(emitter, safety_risk, started);
        }

        // Stage 2: context build (memory retrieval).
        self.check_cancelled()?;
        self.emit_stage(emitter, TurnStage::Context)?;
        self.run_memory_retrieval(emitter).await?;

        // Stages 3-4: agent waves.
        self.check_cancelled()?;
        self.emit_stage(emitter, TurnStage::Agents)?;
        let signature = EventSignature::from_text("text", &self.workspace.user_message);
        let view = self.working_view();
        let (delib_agents, all_assessments) =
            self.run_agent_waves(emitter, &signature, &view).await?;
        self.emit_workspace_patch(emitter)?;

        // Stage 5: deliberation.
        self.check_cancelled()?;
        self.emit_stage(emitter, TurnStage::Deliberation)?;
        let deliberation = self
            .run_deliberation(emitter, &delib_agents, &all_assessments, &view)
            .await?;
        self.workspace.set_consensus(deliberation.consensus_level);

        // Stage 6: council.
        self.check_cancelled()?;
        self.emit_stage(emitter, TurnStage::Council)?;
        let decision = self.council.decide(&self.workspace, false).await;
        emitter.emit(
            EventKind::CouncilDecisionMade,
            json!({
                "speak": decision.speak,
                "urgency": decision.urgency.as_str(),
                "intent": decision.speech_act.intent.as_str(),
                "thinking": &decision.thinking,
            }),
        )?;

        // Voice.
        if decision.speak {
            let result = render_with_fallback(
                &self.voice,
                &decision,
                &self.workspace.user_message,
                &self.settings.self_model,
            )
            .await;
            self.workspace.set_response(result.text.clone());
            emitter.emit(
                EventKind::VoiceRendered,
                json!({"text": result.text, "latency_ms": result.latency_ms}),
            )?;
        }

        // Stage 7: critics.
        self.check_cancelled()?;
        self.emit_stage(emitter, TurnStage::Critics)?;
        let mut passed = true;
        if !self.workspace.current_response.is_empty() {
            let findings = run_critics(&self.workspace.current_response, &self.workspace, &decision);
            passed = critics_pass(&findings);
            let results: Vec<Value> = findings.iter().map(|f| f.to_payload()).collect();
            emitter.emit(
                EventKind::CriticsUpdated,
                json!({"results": results, "passed": passed}),
            )?;
            if !passed {
                // A block fails the rendered text; fall back to the
                // deterministic template for the same decision.
                let replacement = fallback_render(&decision);
                self.workspace.set_response(replacement.clone());
                emitter.emit(EventKind::VoiceRendered, json!({"text": replacement}))?;
            }
        } else {
            emitter.emit(
                EventKind::CriticsUpdated,
                json!({"results": [], "passed": true}),
            )?;
        }

        self.emit_workspace_patch(emitter)?;

        // Stage 8: memory commit.
        self.check_cancelled()?;
        self.emit_stage(emitter, TurnStage::MemoryCommit)?;
        self.run_memory_commit(emitter).await?;

        self.finish_turn(emitter, started, decision.speak, passed)
    }

    fn run_safety_interrupt(
        &mut self,
        emitter: &Emitter,
        safety_risk: f64,
        started: &Instant,
    ) -> Result<TurnOutcome> {
        emitter.emit(
            EventKind::SafetyInterrupt,
            json!({
                "reason": "high_safety_risk",
                "sensor": "safety_risk",
                "value": safety_risk,
            }),
        )?;
        self.emit_stage(emitter, TurnStage::Council)?;
        self.workspace.set_response(SAFETY_RESPONSE);
        // No patch event here: the interrupt contract pins the remaining
        // event sequence to VOICE_RENDERED then TURN_COMPLETED.
        let _ = self.workspace.take_patch();
        emitter.emit(EventKind::VoiceRendered, json!({"text": SAFETY_RESPONSE}))?;
        self.finish_turn(emitter, started, true, true)
    }

    fn finish_turn(
        &mut self,
        emitter: &Emitter,
        started: &Instant,
        spoke: bool,
        critics_passed: bool,
    ) -> Result<TurnOutcome> {
        let total_time_ms = started.elapsed().as_millis() as u64;
        emitter.emit(
            EventKind::TurnCompleted,
            json!({
                "total_time_ms": total_time_ms,
                "response": &self.workspace.current_response,
                "failed": false,
            }),
        )?;

        self.history.push(Message::user(self.workspace.user_message.clone()));
        if spoke && !self.workspace.current_response.is_empty() {
            self.history.push(Message {
                role: crate::contracts::Role::Assistant,
                content: self.workspace.current_response.clone(),
            });
        }
        let excess = self.history.len().saturating_sub(20);
        if excess > 0 {
            self.history.drain(..excess);
        }

        // Publish end-of-turn affect for the daemon.
        {
            let mut shared = self.shared.lock().expect("shared affect lock poisoned");
            shared.modulators = self.workspace.modulators.clone();
            shared.stance = self.workspace.stance.clone();
            shared.last_user_message_at = self.workspace.last_user_message_at;
            shared.last_turn_completed_at = Some(monotonic_now());
        }

        Ok(TurnOutcome {
            turn_id: self.turn_id,
            response: self.workspace.current_response.clone(),
            spoke,
            critics_passed,
            total_time_ms,
        })
    }

    fn emit_stage(&self, emitter: &Emitter, stage: TurnStage) -> Result<()> {
        emitter.emit(EventKind::TurnStageChanged, json!({"stage": stage.as_str()}))?;
        Ok(())
    }

    fn emit_workspace_patch(&mut self, emitter: &Emitter) -> Result<()> {
        let patch = self.workspace.take_patch();
        if !patch.is_empty() {
            emitter.emit(EventKind::WorkspacePatched, json!({"patch": patch}))?;
        }
        Ok(())
    }

    fn working_view(&self) -> WorkingMemoryView {
        WorkingMemoryView {
            conversation_history: self.history.clone(),
            current_time: Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            deliberation: None,
        }
    }

    async fn run_memory_retrieval(&mut self, emitter: &Emitter) -> Result<()> {
        let since = Utc::now() - ChronoDuration::hours(24);
        let episodes = self
            .memory
            .retrieve_recent(since, 5)
            .await
            .unwrap_or_else(|err| {
                warn!(error = %err, "recent episode retrieval failed");
                Vec::new()
            });
        let exclude: Vec<String> = episodes.iter().map(|e| e.id.clone()).collect();
        let similar = self
            .memory
            .retrieve_similar(&self.workspace.user_message, 5, &exclude)
            .await
            .unwrap_or_else(|err| {
                warn!(error = %err, "similar episode retrieval failed");
                Vec::new()
            });
        let facts = self
            .memory
            .get_relevant_facts(&self.workspace.user_message, 10)
            .await
            .unwrap_or_else(|err| {
                warn!(error = %err, "fact retrieval failed");
                Vec::new()
            });
        let threads = self.memory.get_open_threads(5).await.unwrap_or_else(|err| {
            warn!(error = %err, "open thread retrieval failed");
            Vec::new()
        });

        let mut all_episodes = episodes;
        all_episodes.extend(similar);

        emitter.emit(
            EventKind::MemoryRetrieved,
            json!({
                "episodes": all_episodes.iter().map(|e| e.id.clone()).collect::<Vec<_>>(),
                "user_facts": facts.iter().map(|f| f.id.clone()).collect::<Vec<_>>(),
                "open_threads": threads.iter().map(|t| t.id.clone()).collect::<Vec<_>>(),
            }),
        )?;

        self.workspace.set_memory_context(all_episodes, facts, threads);
        self.emit_workspace_patch(emitter)
    }

    /// Stage 1 watchers, then selective deepening when a watcher reports
    /// urgency of at least 2. Returns the agents eligible for
    /// deliberation and every assessment gathered.
    async fn run_agent_waves(
        &mut self,
        emitter: &Emitter,
        signature: &EventSignature,
        view: &WorkingMemoryView,
    ) -> Result<(Vec<AgentDef>, Vec<AgentAssessment>)> {
        let now = monotonic_now();

        // Wave 0: always-on watchers.
        let watchers = self.scheduler.watchers();
        let watcher_assessments = self.run_wave(emitter, 0, &watchers, view).await?;

        // Compress per agency for the deepening decision.
        let mut stage1: Vec<AgencyAssessment> = Vec::new();
        for agency_id in watcher_agency_ids(&watchers) {
            let assessments: Vec<AgentAssessment> = watcher_assessments
                .iter()
                .filter(|a| a.agency_id == agency_id)
                .cloned()
                .collect();
            let elapsed: u64 = assessments.iter().map(|a| a.processing_time_ms).sum();
            stage1.push(
                self.scheduler
                    .compress_agency(&agency_id, assessments, 0, elapsed, now),
            );
        }

        self.scheduler
            .update_modulators(&watcher_assessments, &mut self.workspace.modulators);
        self.workspace.note_modulator_update();

        let mut all_assessments = watcher_assessments;
        let mut delib_agents = watchers;

        if self.scheduler.should_deepen(&stage1) {
            let agency_ids =
                self.scheduler
                    .select_deepening(signature, &self.workspace.modulators, &stage1);
            debug!(?agency_ids, "deepening into agencies");

            let mut deepened: Vec<AgentDef> = Vec::new();
            let fired: BTreeSet<String> = all_assessments
                .iter()
                .map(|a| a.agent_id.clone())
                .collect();
            for agency_id in &agency_ids {
                for agent in self.scheduler.gate_agents(
                    agency_id,
                    signature,
                    &self.workspace.modulators,
                    monotonic_now(),
                ) {
                    if !fired.contains(&agent.agent_id()) {
                        deepened.push(agent);
                    }
                }
            }

            if !deepened.is_empty() {
                let deep_assessments = self.run_wave(emitter, 1, &deepened, view).await?;
                all_assessments.extend(deep_assessments);
                delib_agents.extend(deepened);
            }
        }

        Ok((delib_agents, all_assessments))
    }

    /// Run one wave of agents in parallel under the agency deadline,
    /// emitting the bracketing WAVE events and per-agent lifecycle events.
    /// One agent's failure never cancels its siblings.
    async fn run_wave(
        &mut self,
        emitter: &Emitter,
        wave: u64,
        agents: &[AgentDef],
        view: &WorkingMemoryView,
    ) -> Result<Vec<AgentAssessment>> {
        emitter.emit(
            EventKind::WaveStarted,
            json!({"wave": wave, "agent_count": agents.len()}),
        )?;
        for agent in agents {
            emitter.emit(EventKind::AgentStarted, json!({"agent_id": agent.agent_id()}))?;
        }

        let event_text = self.workspace.user_message.clone();
        let mut futures = FuturesUnordered::new();
        for agent in agents.iter().cloned() {
            let runtime = self.runtime.clone();
            let text = event_text.clone();
            let view = view.clone();
            futures.push(async move { runtime.assess(&agent, &text, &view).await });
        }

        // Common deadline for the whole group; stragglers become failed
        // placeholders rather than cancelling the wave.
        let deadline = Duration::from_millis(self.settings.agency_timeout_ms);
        let mut assessments: Vec<AgentAssessment> = Vec::new();
        let _ = tokio::time::timeout(deadline, async {
            while let Some(assessment) = futures.next().await {
                assessments.push(assessment);
            }
        })
        .await;
        drop(futures);

        let completed: BTreeSet<String> =
            assessments.iter().map(|a| a.agent_id.clone()).collect();
        for agent in agents {
            if !completed.contains(&agent.agent_id()) {
                assessments.push(AgentAssessment::placeholder(
                    &agent.agent_id(),
                    &agent.agency_id,
                    "agency deadline exceeded",
                ));
            }
        }

        let now = monotonic_now();
        for assessment in &assessments {
            match &assessment.error {
                Some(error) => {
                    emitter.emit(
                        EventKind::AgentFailed,
                        json!({"agent_id": &assessment.agent_id, "error": error}),
                    )?;
                }
                None => {
                    let salience = self.scheduler.final_salience(assessment, now);
                    let claim_count = assessment
                        .structured
                        .as_ref()
                        .map(|s| s.claims.len())
                        .unwrap_or(0);
                    emitter.emit(
                        EventKind::AgentCompleted,
                        json!({
                            "agent_id": &assessment.agent_id,
                            "observation": &assessment.output,
                            "urgency": assessment.urgency(),
                            "confidence": assessment.confidence(),
                            "salience": salience,
                            "claims": claim_count,
                            "processing_time_ms": assessment.processing_time_ms,
                        }),
                    )?;
                    if let Some(trace) = &assessment.trace
                        && let Some(usage) = trace.usage
                    {
                        emitter.emit(
                            EventKind::ModelCallCompleted,
                            json!({
                                "model": trace.model.clone().unwrap_or_default(),
                                "caller": &assessment.agent_id,
                                "prompt_tokens": usage.prompt_tokens,
                                "completion_tokens": usage.completion_tokens,
                                "reasoning_tokens": usage.reasoning_tokens,
                                "latency_ms": trace.latency_ms.unwrap_or(0),
                            }),
                        )?;
                    }
                }
            }
        }

        // Activation bookkeeping and workspace ingest.
        for assessment in assessments.clone() {
            if assessment.error.is_none() {
                let raw = assessment
                    .salience
                    .map(|s| s.base_score())
                    .unwrap_or(0.0);
                self.scheduler.mark_fired(&assessment.agent_id, raw, now);
                self.ingest_assessment(&assessment);
            }
        }

        emitter.emit(
            EventKind::WaveCompleted,
            json!({"wave": wave, "results": assessments.len()}),
        )?;

        Ok(assessments)
    }

    /// Fold an agent's structured block into the workspace: claims into
    /// the graph, grounded hypotheses into the context, stance deltas as
    /// one salience-weighted nudge.
    fn ingest_assessment(&mut self, assessment: &AgentAssessment) {
        let Some(structured) = &assessment.structured else {
            return;
        };

        for draft in &structured.claims {
            self.claim_counter += 1;
            let claim = Claim::new(
                format!("c{}", self.claim_counter),
                draft.text.clone(),
                draft.kind,
                assessment.agent_id.clone(),
                draft.urgency,
                draft.confidence,
            )
            .with_supports(draft.supports.clone())
            .with_opposes(draft.opposes.clone());
            self.workspace.add_claim(claim);
        }

        for hypothesis in &structured.hypotheses {
            if let Some(grounded) = murmur_types::Hypothesis::grounded(
                hypothesis.text.clone(),
                hypothesis.probability,
                hypothesis.evidence_ids.clone(),
                self.turn_id,
            ) {
                self.workspace.add_hypothesis(grounded);
            } else if !hypothesis.text.is_empty() {
                debug!(
                    agent_id = %assessment.agent_id,
                    "dropped ungrounded hypothesis"
                );
            }
        }

        if structured.salience > 0.0 && !structured.stance_delta.is_zero() {
            let delta: StanceDelta = structured.stance_delta.scaled(structured.salience);
            self.workspace
                .apply_stance_delta(&delta, murmur_types::STANCE_ALPHA, Vec::new());
        }
    }

    async fn run_deliberation(
        &mut self,
        emitter: &Emitter,
        agents: &[AgentDef],
        initial: &[AgentAssessment],
        view: &WorkingMemoryView,
    ) -> Result<DeliberationResult> {
        let event_text = self.workspace.user_message.clone();
        let mut emit = |phase: DelibPhase<'_>| -> Result<()> {
            match phase {
                DelibPhase::RoundStarted { round } => {
                    emitter.emit(EventKind::DelibRoundStarted, json!({"round": round}))?;
                }
                DelibPhase::RoundCompleted { record } => {
                    emitter.emit(
                        EventKind::ConsensusUpdated,
                        json!({"level": record.consensus_level, "round": record.round}),
                    )?;
                    emitter.emit(
                        EventKind::DelibRoundCompleted,
                        json!({
                            "round": record.round,
                            "consensus": record.consensus_level,
                            "pressure": record.speaking_pressure,
                            "voices": record.voices.len(),
                        }),
                    )?;
                }
            }
            Ok(())
        };

        self.deliberator
            .deliberate(agents, &event_text, view, initial, &mut emit)
            .await
    }

    async fn run_memory_commit(&mut self, emitter: &Emitter) -> Result<()> {
        let episode = murmur_types::Episode {
            id: format!("ep-{}-{}", self.session_id, self.turn_id),
            session_id: self.session_id.clone(),
            turn_id: self.turn_id,
            timestamp: Utc::now(),
            summary: summarize_exchange(
                &self.workspace.user_message,
                &self.workspace.current_response,
            ),
            emotions: Vec::new(),
            tags: Vec::new(),
            importance: f64::from(self.workspace.max_claim_urgency()) / 3.0,
        };

        let episodes_added = match self.memory.commit_episodes(vec![episode]).await {
            Ok(count) => count,
            Err(err) => {
                warn!(error = %err, "episode commit failed");
                0
            }
        };

        emitter.emit(
            EventKind::MemoryCommitted,
            json!({"summary": {"episodes_added": episodes_added, "user_facts_added": 0}}),
        )?;
        Ok(())
    }
}

fn watcher_agency_ids(watchers: &[AgentDef]) -> Vec<String> {
    let mut ids: Vec<String> = watchers.iter().map(|a| a.agency_id.clone()).collect();
    ids.sort();
    ids.dedup();
    ids
}

fn summarize_exchange(user: &str, response: &str) -> String {
    let user: String = user.chars().take(200).collect();
    let response: String = response.chars().take(200).collect();
    if response.is_empty() {
        format!("User: {user}")
    } else {
        format!("User: {user} | Assistant: {response}")
    }
}
