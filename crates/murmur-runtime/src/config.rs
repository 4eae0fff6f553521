use std::path::{Path, PathBuf};

use murmur_engine::contracts::ReasoningEffort;
use murmur_engine::settings::{EffortLevels, EngineSettings, ModelTiers};
use murmur_types::ResponseUrgency;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Minimum proactive urgency the daemon will surface.
pub type UrgencyThreshold = ResponseUrgency;

/// Runtime configuration. Resolution priority per key:
/// 1. Environment variable
/// 2. Config file (`murmur.toml`)
/// 3. Built-in default
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the event database lives.
    pub data_dir: PathBuf,
    /// Root of the per-agent prompt files.
    pub prompts_dir: PathBuf,

    // Daemon
    pub daemon_tick_interval_secs: f64,
    pub daemon_urgency_threshold: UrgencyThreshold,
    pub nudge_cooldown_secs: f64,
    /// Local-time quiet window as (start hour, end hour); spans midnight
    /// when start > end.
    pub quiet_hours: (u32, u32),

    // Engine
    pub agent_timeout_ms: u64,
    pub agency_timeout_ms: u64,
    pub deliberation_max_rounds: u32,
    pub deliberation_consensus_threshold: f64,
    pub deliberation_use_thinking: bool,
    pub max_agents_per_cycle: Option<usize>,

    // Models
    pub model_tiny: String,
    pub model_small: String,
    pub model_medium: String,
    pub model_large: String,
    pub reasoning_effort_agent_assess: ReasoningEffort,
    pub reasoning_effort_council_synthesis: ReasoningEffort,
}

impl Default for Config {
    fn default() -> Self {
        let engine = EngineSettings::default();
        let tiers = ModelTiers::default();
        let efforts = EffortLevels::default();
        Self {
            data_dir: PathBuf::from("data"),
            prompts_dir: engine.prompts_dir.clone(),
            daemon_tick_interval_secs: 30.0,
            daemon_urgency_threshold: ResponseUrgency::Low,
            nudge_cooldown_secs: 600.0,
            quiet_hours: (22, 8),
            agent_timeout_ms: engine.agent_timeout_ms,
            agency_timeout_ms: engine.agency_timeout_ms,
            deliberation_max_rounds: engine.deliberation_max_rounds,
            deliberation_consensus_threshold: engine.deliberation_consensus_threshold,
            deliberation_use_thinking: engine.deliberation_use_thinking,
            max_agents_per_cycle: engine.max_agents_per_cycle,
            model_tiny: tiers.tiny,
            model_small: tiers.small,
            model_medium: tiers.medium,
            model_large: tiers.large,
            reasoning_effort_agent_assess: efforts.agent_assess,
            reasoning_effort_council_synthesis: efforts.council_synthesis,
        }
    }
}

impl Config {
    /// Defaults, then the config file if present, then the environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = match config_path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(path)?;
                toml::from_str(&content)?
            }
            _ => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Overlay the documented environment keys.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(v) = env_f64("DAEMON_TICK_INTERVAL")? {
            self.daemon_tick_interval_secs = v;
        }
        if let Some(v) = env_str("DAEMON_URGENCY_THRESHOLD") {
            self.daemon_urgency_threshold = ResponseUrgency::parse(&v).ok_or_else(|| {
                Error::Config(format!("invalid DAEMON_URGENCY_THRESHOLD: {v}"))
            })?;
        }
        if let Some(v) = env_u64("AGENCY_TIMEOUT_MS")? {
            self.agency_timeout_ms = v;
        }
        if let Some(v) = env_u64("AGENT_TIMEOUT_MS")? {
            self.agent_timeout_ms = v;
        }
        if let Some(v) = env_u64("DELIBERATION_MAX_ROUNDS")? {
            self.deliberation_max_rounds = v as u32;
        }
        if let Some(v) = env_f64("DELIBERATION_CONSENSUS_THRESHOLD")? {
            self.deliberation_consensus_threshold = v;
        }
        if let Some(v) = env_str("DELIBERATION_USE_THINKING") {
            self.deliberation_use_thinking = matches!(v.as_str(), "1" | "true" | "yes");
        }
        if let Some(v) = env_str("MODEL_TINY") {
            self.model_tiny = v;
        }
        if let Some(v) = env_str("MODEL_SMALL") {
            self.model_small = v;
        }
        if let Some(v) = env_str("MODEL_MEDIUM") {
            self.model_medium = v;
        }
        if let Some(v) = env_str("MODEL_LARGE") {
            self.model_large = v;
        }
        if let Some(v) = env_str("REASONING_EFFORT_AGENT_ASSESS") {
            self.reasoning_effort_agent_assess = parse_effort(&v)?;
        }
        if let Some(v) = env_str("REASONING_EFFORT_COUNCIL_SYNTHESIS") {
            self.reasoning_effort_council_synthesis = parse_effort(&v)?;
        }
        if let Some(v) = env_str("MURMUR_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = env_str("MURMUR_PROMPTS_DIR") {
            self.prompts_dir = PathBuf::from(v);
        }
        Ok(())
    }

    /// Project the engine-facing subset.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            agent_timeout_ms: self.agent_timeout_ms,
            agency_timeout_ms: self.agency_timeout_ms,
            deliberation_max_rounds: self.deliberation_max_rounds,
            deliberation_consensus_threshold: self.deliberation_consensus_threshold,
            deliberation_use_thinking: self.deliberation_use_thinking,
            max_agents_per_cycle: self.max_agents_per_cycle,
            cooldown_seconds: 30.0,
            models: ModelTiers {
                tiny: self.model_tiny.clone(),
                small: self.model_small.clone(),
                medium: self.model_medium.clone(),
                large: self.model_large.clone(),
            },
            efforts: EffortLevels {
                agent_assess: self.reasoning_effort_agent_assess,
                council_synthesis: self.reasoning_effort_council_synthesis,
            },
            prompts_dir: self.prompts_dir.clone(),
            self_model: EngineSettings::default().self_model,
        }
    }
}

fn env_str(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_f64(key: &str) -> Result<Option<f64>> {
    match env_str(key) {
        None => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("invalid {key}: {v}"))),
    }
}

fn env_u64(key: &str) -> Result<Option<u64>> {
    match env_str(key) {
        None => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("invalid {key}: {v}"))),
    }
}

fn parse_effort(v: &str) -> Result<ReasoningEffort> {
    ReasoningEffort::parse(v).ok_or_else(|| Error::Config(format!("invalid reasoning effort: {v}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_spec() {
        let config = Config::default();
        assert_eq!(config.daemon_tick_interval_secs, 30.0);
        assert_eq!(config.quiet_hours, (22, 8));
        assert_eq!(config.nudge_cooldown_secs, 600.0);
        assert_eq!(config.agent_timeout_ms, 2_000);
        assert_eq!(config.agency_timeout_ms, 5_000);
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default();
        let serialized = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_engine_settings_projection() {
        let mut config = Config::default();
        config.model_small = "test/small".to_string();
        config.deliberation_max_rounds = 5;
        let settings = config.engine_settings();
        assert_eq!(settings.models.small, "test/small");
        assert_eq!(settings.deliberation_max_rounds, 5);
    }
}
