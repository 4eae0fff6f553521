use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use murmur_types::{AgentAssessment, AgentVoice, VoiceStance};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::agent::{AgentDef, AgentRuntime, DeliberationContext, WorkingMemoryView};

/// Minimum speaking pressure for a consensus early exit.
const SPEAKING_PRESSURE_FLOOR: f64 = 0.5;

/// Why deliberation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    CriticalUrgency,
    ConsensusReached,
    AllDeferred,
    MaxRounds,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::CriticalUrgency => "critical_urgency",
            ExitReason::ConsensusReached => "consensus_reached",
            ExitReason::AllDeferred => "all_deferred",
            ExitReason::MaxRounds => "max_rounds",
        }
    }
}

/// One completed deliberation round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: u32,
    pub voices: BTreeMap<String, AgentVoice>,
    pub consensus_level: f64,
    pub speaking_pressure: f64,
}

/// Result of the full deliberation loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliberationResult {
    pub rounds: Vec<RoundRecord>,
    pub final_voices: BTreeMap<String, AgentVoice>,
    pub consensus_level: f64,
    pub speaking_pressure: f64,
    pub should_speak_early: bool,
    pub exit_reason: ExitReason,
}

/// Observable transitions surfaced to the caller mid-loop so events can be
/// emitted as rounds happen, not after the fact.
pub enum DelibPhase<'a> {
    RoundStarted { round: u32 },
    RoundCompleted { record: &'a RoundRecord },
}

/// Multi-round consensus loop. Each round re-invokes the selected agents
/// with the previous round's voices attached; agents that fail in a round
/// simply contribute no voice.
pub struct Deliberator {
    runtime: Arc<AgentRuntime>,
    max_rounds: u32,
    consensus_threshold: f64,
}

impl Deliberator {
    pub fn new(runtime: Arc<AgentRuntime>) -> Self {
        let settings = runtime.settings();
        let max_rounds = settings.deliberation_max_rounds;
        let consensus_threshold = settings.deliberation_consensus_threshold;
        Self {
            runtime,
            max_rounds,
            consensus_threshold,
        }
    }

    pub async fn deliberate(
        &self,
        agents: &[AgentDef],
        event_text: &str,
        base_view: &WorkingMemoryView,
        initial_assessments: &[AgentAssessment],
        emit: &mut dyn FnMut(DelibPhase<'_>) -> Result<()>,
    ) -> Result<DeliberationResult> {
        let mut rounds: Vec<RoundRecord> = Vec::new();
        let mut current_voices = assessments_to_voices(initial_assessments);
        let mut consensus = compute_consensus(&current_voices);
        let mut pressure = compute_speaking_pressure(&current_voices);

        let round_0 = RoundRecord {
            round: 0,
            consensus_level: consensus,
            speaking_pressure: pressure,
            voices: current_voices.clone(),
        };
        emit(DelibPhase::RoundCompleted { record: &round_0 })?;
        rounds.push(round_0);

        if has_critical_urgency(&current_voices) {
            return Ok(finish(rounds, current_voices, consensus, pressure, true, ExitReason::CriticalUrgency));
        }

        for round_num in 1..=self.max_rounds {
            emit(DelibPhase::RoundStarted { round: round_num })?;

            let context = DeliberationContext {
                round: round_num,
                max_rounds: self.max_rounds,
                previous_voices: current_voices.clone(),
                consensus_level: consensus,
                speaking_pressure: pressure,
            };

            let new_voices = self
                .run_round(agents, event_text, base_view, &context)
                .await;

            let record = RoundRecord {
                round: round_num,
                consensus_level: compute_consensus(&new_voices),
                speaking_pressure: compute_speaking_pressure(&new_voices),
                voices: new_voices.clone(),
            };
            emit(DelibPhase::RoundCompleted { record: &record })?;
            current_voices = new_voices;
            consensus = record.consensus_level;
            pressure = record.speaking_pressure;
            rounds.push(record);

            if has_critical_urgency(&current_voices) {
                return Ok(finish(rounds, current_voices, consensus, pressure, true, ExitReason::CriticalUrgency));
            }
            if consensus >= self.consensus_threshold && pressure >= SPEAKING_PRESSURE_FLOOR {
                return Ok(finish(rounds, current_voices, consensus, pressure, true, ExitReason::ConsensusReached));
            }
            if all_deferred(&current_voices) {
                return Ok(finish(rounds, current_voices, consensus, pressure, false, ExitReason::AllDeferred));
            }
        }

        Ok(finish(rounds, current_voices, consensus, pressure, false, ExitReason::MaxRounds))
    }

    async fn run_round(
        &self,
        agents: &[AgentDef],
        event_text: &str,
        base_view: &WorkingMemoryView,
        context: &DeliberationContext,
    ) -> BTreeMap<String, AgentVoice> {
        let view = WorkingMemoryView {
            conversation_history: base_view.conversation_history.clone(),
            current_time: base_view.current_time.clone(),
            deliberation: Some(context.clone()),
        };

        let futures = agents
            .iter()
            .map(|agent| self.runtime.assess(agent, event_text, &view));
        let assessments = join_all(futures).await;

        let mut voices = BTreeMap::new();
        for assessment in &assessments {
            if assessment.error.is_some() {
                continue;
            }
            let voice = assessment_to_voice(assessment, context);
            voices.insert(assessment.agent_id.clone(), voice);
        }
        voices
    }
}

fn finish(
    rounds: Vec<RoundRecord>,
    final_voices: BTreeMap<String, AgentVoice>,
    consensus_level: f64,
    speaking_pressure: f64,
    should_speak_early: bool,
    exit_reason: ExitReason,
) -> DeliberationResult {
    DeliberationResult {
        rounds,
        final_voices,
        consensus_level,
        speaking_pressure,
        should_speak_early,
        exit_reason,
    }
}

fn assessments_to_voices(assessments: &[AgentAssessment]) -> BTreeMap<String, AgentVoice> {
    assessments
        .iter()
        .filter(|a| a.error.is_none())
        .map(|a| {
            (
                a.agent_id.clone(),
                AgentVoice {
                    agent_id: a.agent_id.clone(),
                    content: a.output.clone(),
                    stance: VoiceStance::Maintain,
                    salience: a.salience.unwrap_or_default(),
                    addressed_agents: Vec::new(),
                    reasoning: None,
                },
            )
        })
        .collect()
}

/// Detect the stance a voice takes from its wording.
fn assessment_to_voice(assessment: &AgentAssessment, context: &DeliberationContext) -> AgentVoice {
    let content = assessment.output.clone();
    let lower = content.to_lowercase();

    let mut stance = VoiceStance::Maintain;
    let mut addressed = Vec::new();

    if lower.contains("i agree with") || lower.contains("building on") {
        stance = VoiceStance::Adjust;
        for agent_id in context.previous_voices.keys() {
            let name = agent_id.rsplit('.').next().unwrap_or(agent_id);
            if lower.contains(name) {
                addressed.push(agent_id.clone());
            }
        }
    } else if lower.contains("i defer to") || lower.contains("yield to") {
        stance = VoiceStance::Defer;
    } else if lower.contains("i disagree") || lower.contains("contrary to") {
        stance = VoiceStance::Dissent;
    }

    AgentVoice {
        agent_id: assessment.agent_id.clone(),
        content,
        stance,
        salience: assessment.salience.unwrap_or_default(),
        addressed_agents: addressed,
        reasoning: assessment
            .trace
            .as_ref()
            .and_then(|t| t.thinking.clone()),
    }
}

/// Consensus among voices: 0 when anyone dissents, 0.9 when at least half
/// defer, otherwise 0.5 plus a defer-weighted boost up to 0.3.
pub fn compute_consensus(voices: &BTreeMap<String, AgentVoice>) -> f64 {
    if voices.is_empty() {
        return 0.0;
    }
    let total = voices.len() as f64;
    let dissent = voices
        .values()
        .filter(|v| v.stance == VoiceStance::Dissent)
        .count();
    let defer = voices
        .values()
        .filter(|v| v.stance == VoiceStance::Defer)
        .count() as f64;

    if dissent > 0 {
        return 0.0;
    }
    if defer >= total * 0.5 {
        return 0.9;
    }
    0.5 + (defer / total) * 0.3
}

/// Weighted urgency: 70% max, 30% mean, normalized to [0, 1].
pub fn compute_speaking_pressure(voices: &BTreeMap<String, AgentVoice>) -> f64 {
    if voices.is_empty() {
        return 0.0;
    }
    let urgencies: Vec<f64> = voices
        .values()
        .map(|v| f64::from(v.salience.urgency))
        .collect();
    let max = urgencies.iter().cloned().fold(0.0, f64::max);
    let mean = urgencies.iter().sum::<f64>() / urgencies.len() as f64;
    (max / 3.0) * 0.7 + (mean / 3.0) * 0.3
}

fn has_critical_urgency(voices: &BTreeMap<String, AgentVoice>) -> bool {
    voices.values().any(|v| v.salience.urgency >= 3)
}

fn all_deferred(voices: &BTreeMap<String, AgentVoice>) -> bool {
    !voices.is_empty() && voices.values().all(|v| v.stance == VoiceStance::Defer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_types::SalienceMetadata;

    fn voice(agent_id: &str, stance: VoiceStance, urgency: u8) -> (String, AgentVoice) {
        (
            agent_id.to_string(),
            AgentVoice {
                agent_id: agent_id.to_string(),
                content: String::new(),
                stance,
                salience: SalienceMetadata::new(urgency, 2),
                addressed_agents: vec![],
                reasoning: None,
            },
        )
    }

    #[test]
    fn test_consensus_zero_on_any_dissent() {
        let voices: BTreeMap<_, _> = [
            voice("a.x", VoiceStance::Maintain, 1),
            voice("b.y", VoiceStance::Dissent, 1),
            voice("c.z", VoiceStance::Adjust, 1),
        ]
        .into_iter()
        .collect();
        assert_eq!(compute_consensus(&voices), 0.0);
    }

    #[test]
    fn test_consensus_high_when_half_defer() {
        let voices: BTreeMap<_, _> = [
            voice("a.x", VoiceStance::Defer, 0),
            voice("b.y", VoiceStance::Maintain, 1),
        ]
        .into_iter()
        .collect();
        assert_eq!(compute_consensus(&voices), 0.9);
    }

    #[test]
    fn test_consensus_baseline_with_defer_boost() {
        let voices: BTreeMap<_, _> = [
            voice("a.x", VoiceStance::Maintain, 1),
            voice("b.y", VoiceStance::Maintain, 1),
            voice("c.z", VoiceStance::Maintain, 1),
            voice("d.w", VoiceStance::Defer, 0),
        ]
        .into_iter()
        .collect();
        // 1 of 4 deferring: 0.5 + 0.25 * 0.3 = 0.575
        assert!((compute_consensus(&voices) - 0.575).abs() < 1e-9);
    }

    #[test]
    fn test_speaking_pressure_blend() {
        let voices: BTreeMap<_, _> = [
            voice("a.x", VoiceStance::Maintain, 3),
            voice("b.y", VoiceStance::Maintain, 0),
        ]
        .into_iter()
        .collect();
        // max 3 -> 0.7, mean 1.5 -> 0.15
        assert!((compute_speaking_pressure(&voices) - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_stance_detection() {
        let context = DeliberationContext {
            previous_voices: [voice("emotion.stress", VoiceStance::Maintain, 1)]
                .into_iter()
                .collect(),
            ..Default::default()
        };

        let mut assessment = AgentAssessment::placeholder("self.observer", "self", "");
        assessment.error = None;

        assessment.output = "I agree with stress here, the strain is real.".to_string();
        let v = assessment_to_voice(&assessment, &context);
        assert_eq!(v.stance, VoiceStance::Adjust);
        assert_eq!(v.addressed_agents, vec!["emotion.stress".to_string()]);

        assessment.output = "I defer to the others this round.".to_string();
        assert_eq!(
            assessment_to_voice(&assessment, &context).stance,
            VoiceStance::Defer
        );

        assessment.output = "I disagree; the evidence points elsewhere.".to_string();
        assert_eq!(
            assessment_to_voice(&assessment, &context).stance,
            VoiceStance::Dissent
        );

        assessment.output = "The pattern holds.".to_string();
        assert_eq!(
            assessment_to_voice(&assessment, &context).stance,
            VoiceStance::Maintain
        );
    }

    #[test]
    fn test_all_deferred_requires_nonempty() {
        assert!(!all_deferred(&BTreeMap::new()));
        let voices: BTreeMap<_, _> = [voice("a.x", VoiceStance::Defer, 0)].into_iter().collect();
        assert!(all_deferred(&voices));
    }
}
