//! Two-stage activation scheduling.
//!
//! Stage 1 runs a fixed allow-list of cheap watchers on every tick. Stage
//! 2 (selective deepening) only happens when a watcher reports urgency of
//! at least 2; the deepening set is assembled from the event signature,
//! the global modulators, and stage-1 critical signals, then intersected
//! with the registered agencies.

mod activation;

pub use activation::{
    AgentActivationState, COOLDOWN_PENALTY_WINDOW_SECONDS, RECENCY_BOOST_AFTER_SECONDS,
    ROLLING_SALIENCE_ALPHA, archetype_weight, modulator_mapping,
};

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use murmur_types::{AgencyAssessment, AgentAssessment, EventSignature, GlobalModulators};
use tracing::debug;

use crate::agent::{AgencyDef, AgentDef, WATCHER_AGENTS};
use crate::settings::EngineSettings;

/// Owns the agency/agent tables and per-agent activation memory. Agencies
/// and agents are plain records looked up by id; nothing here holds a
/// back-reference into the runner.
pub struct Scheduler {
    agencies: BTreeMap<String, AgencyDef>,
    activation: BTreeMap<String, AgentActivationState>,
    settings: Arc<EngineSettings>,
}

impl Scheduler {
    pub fn new(agencies: Vec<AgencyDef>, settings: Arc<EngineSettings>) -> Self {
        let mut activation = BTreeMap::new();
        for agency in &agencies {
            for agent in &agency.agents {
                activation.insert(
                    agent.agent_id(),
                    AgentActivationState::new(agent.agent_id(), archetype_weight(&agent.name)),
                );
            }
        }
        Self {
            agencies: agencies.into_iter().map(|a| (a.id.clone(), a)).collect(),
            activation,
            settings,
        }
    }

    pub fn agencies(&self) -> impl Iterator<Item = &AgencyDef> {
        self.agencies.values()
    }

    pub fn agency(&self, id: &str) -> Option<&AgencyDef> {
        self.agencies.get(id)
    }

    pub fn activation_state(&self, agent_id: &str) -> Option<&AgentActivationState> {
        self.activation.get(agent_id)
    }

    /// Stage-1 watchers: the fixed allow-list intersected with the
    /// registered roster.
    pub fn watchers(&self) -> Vec<AgentDef> {
        self.agencies
            .values()
            .flat_map(|agency| agency.agents.iter())
            .filter(|agent| WATCHER_AGENTS.contains(&agent.agent_id().as_str()))
            .cloned()
            .collect()
    }

    /// Deepening happens only when some watcher reported urgency >= 2.
    pub fn should_deepen(&self, stage1: &[AgencyAssessment]) -> bool {
        stage1.iter().any(|a| a.u_max >= 2)
    }

    /// Select agencies for stage 2 from signature markers, modulator
    /// levels, and stage-1 critical signals.
    pub fn select_deepening(
        &self,
        sig: &EventSignature,
        modulators: &GlobalModulators,
        stage1: &[AgencyAssessment],
    ) -> Vec<String> {
        let mut selected: BTreeSet<&str> = BTreeSet::new();

        if sig.has_emotion_markers {
            selected.insert("emotion");
        }
        if sig.has_planning_markers {
            selected.extend(["planning", "resource"]);
        }
        if sig.has_social_markers {
            selected.insert("social");
        }
        if sig.has_problem_markers {
            selected.extend(["reasoning", "creative"]);
        }
        if sig.is_question {
            selected.extend(["reasoning", "creative"]);
        }

        if modulators.arousal > 0.6 {
            selected.extend(["emotion", "monitoring"]);
        }
        if modulators.fatigue > 0.5 {
            selected.extend(["resource", "self"]);
        }
        if modulators.time_pressure > 0.5 {
            selected.insert("planning");
        }
        if modulators.social_risk > 0.5 {
            selected.extend(["social", "inhibition"]);
        }

        for assessment in stage1 {
            if assessment.u_max >= 3 {
                selected.insert(assessment.agency_id.as_str());
                match assessment.agency_id.as_str() {
                    "inhibition" => {
                        selected.insert("social");
                    }
                    "emotion" => {
                        selected.insert("self");
                    }
                    _ => {}
                }
            }
        }

        selected
            .into_iter()
            .filter(|id| self.agencies.contains_key(*id))
            .map(str::to_string)
            .collect()
    }

    /// Gate which of an agency's agents run this cycle.
    ///
    /// 1. Always-on agents are always included.
    /// 2. Agents pass when the agency's domain marker is active, or the
    ///    agency has no marker.
    /// 3. Modulator levels can pull in the agency's agents.
    /// 4. Cooldown drops everything except always-on agents.
    /// 5. A per-cycle budget truncates the list.
    pub fn gate_agents(
        &self,
        agency_id: &str,
        sig: &EventSignature,
        modulators: &GlobalModulators,
        now: f64,
    ) -> Vec<AgentDef> {
        let Some(agency) = self.agencies.get(agency_id) else {
            return Vec::new();
        };

        let mut candidates = Vec::new();
        for agent in &agency.agents {
            if agent.is_always_on() {
                candidates.push(agent.clone());
                continue;
            }
            if agency.domain_active(sig) || agency.is_markerless() {
                candidates.push(agent.clone());
                continue;
            }
            if sig.is_question && matches!(agency.id.as_str(), "reasoning" | "creative") {
                candidates.push(agent.clone());
                continue;
            }
            if self.modulator_activates(&agency.id, modulators) {
                candidates.push(agent.clone());
                continue;
            }
        }

        candidates.retain(|agent| {
            agent.is_always_on()
                || self
                    .activation
                    .get(&agent.agent_id())
                    .is_none_or(|state| !state.is_on_cooldown(now))
        });

        if let Some(budget) = self.settings.max_agents_per_cycle {
            candidates.truncate(budget);
        }
        candidates
    }

    fn modulator_activates(&self, agency_id: &str, modulators: &GlobalModulators) -> bool {
        (modulators.arousal > 0.6 && matches!(agency_id, "emotion" | "monitoring"))
            || (modulators.fatigue > 0.5 && matches!(agency_id, "resource" | "emotion"))
            || (modulators.time_pressure > 0.5 && agency_id == "planning")
            || (modulators.social_risk > 0.5 && matches!(agency_id, "social" | "inhibition"))
    }

    /// Final salience for an assessment:
    /// `U · C · archetype_weight · recency_boost · (1 − cooldown_penalty)`.
    pub fn final_salience(&self, assessment: &AgentAssessment, now: f64) -> f64 {
        let Some(salience) = assessment.salience else {
            return 0.0;
        };
        let Some(state) = self.activation.get(&assessment.agent_id) else {
            return salience.base_score();
        };
        salience.base_score()
            * state.archetype_weight
            * state.recency_boost(now)
            * (1.0 - state.cooldown_penalty(now))
    }

    /// Record that an agent fired: stamps `last_fired`, starts the
    /// cooldown window, and folds the raw score into the rolling EMA.
    pub fn mark_fired(&mut self, agent_id: &str, raw_score: f64, now: f64) {
        if let Some(state) = self.activation.get_mut(agent_id) {
            state.mark_fired(now, self.settings.cooldown_seconds);
            state.update_rolling_salience(raw_score);
        }
    }

    /// Fold qualifying agent outputs into the global modulators: decay
    /// toward baseline, then add bounded contributions from agents in the
    /// inference map that reported urgency >= 2.
    pub fn update_modulators(
        &self,
        assessments: &[AgentAssessment],
        modulators: &mut GlobalModulators,
    ) {
        modulators.decay(GlobalModulators::DEFAULT_DECAY);

        for assessment in assessments {
            let Some(salience) = assessment.salience else {
                continue;
            };
            if salience.urgency < 2 {
                continue;
            }
            let Some((kind, weight, inverse)) = modulator_mapping(&assessment.agent_id) else {
                continue;
            };
            let mut contribution = weight * (f64::from(salience.confidence) / 3.0);
            if inverse {
                contribution = -contribution;
            }
            modulators.update(kind, contribution);
        }

        debug!(
            arousal = modulators.arousal,
            fatigue = modulators.fatigue,
            time_pressure = modulators.time_pressure,
            social_risk = modulators.social_risk,
            "modulators updated"
        );
    }

    /// Compress an agency run: top-salience agent ids (at most three), a
    /// one-line brief from the loudest agent, and the agency urgency max.
    pub fn compress_agency(
        &self,
        agency_id: &str,
        assessments: Vec<AgentAssessment>,
        gated_agents: usize,
        processing_time_ms: u64,
        now: f64,
    ) -> AgencyAssessment {
        let total_agents = self
            .agencies
            .get(agency_id)
            .map(|a| a.agents.len())
            .unwrap_or(0);

        let mut ranked: Vec<(f64, &AgentAssessment)> = assessments
            .iter()
            .filter(|a| a.salience.is_some() && !a.is_quiet())
            .map(|a| (self.final_salience(a, now), a))
            .collect();
        ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let top_hits: Vec<String> = ranked
            .iter()
            .take(3)
            .map(|(_, a)| a.agent_id.clone())
            .collect();
        let brief = ranked
            .first()
            .map(|(_, a)| {
                let name = a.agent_id.rsplit('.').next().unwrap_or(&a.agent_id);
                let voice: String = a.output.chars().take(100).collect();
                format!("{name}: {voice}")
            })
            .unwrap_or_default();

        let u_max = assessments.iter().map(|a| a.urgency()).max().unwrap_or(0);
        let active_agents = assessments.len();

        AgencyAssessment {
            agency_id: agency_id.to_string(),
            u_max,
            top_hits,
            brief,
            assessments,
            active_agents,
            total_agents,
            gated_agents,
            processing_time_ms,
        }
    }
}
