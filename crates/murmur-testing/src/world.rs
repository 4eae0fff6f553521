use std::sync::{Arc, Mutex};

use anyhow::Result;
use murmur_engine::agent::default_agencies;
use murmur_engine::settings::EngineSettings;
use murmur_engine::{SharedAffect, SharedAffectHandle, TurnRunner};
use murmur_store::EventLog;
use murmur_types::EngineEvent;

use crate::{ScriptedModel, StaticMemory, TemplateVoice};

pub const TEST_SESSION: &str = "test-session";

/// Declarative setup for pipeline tests: an in-memory event log, default
/// agencies, the template voice, and a scripted model, wired into a
/// ready-to-run turn runner.
pub struct TestWorld {
    pub runner: TurnRunner,
    pub log: Arc<Mutex<EventLog>>,
    pub shared: SharedAffectHandle,
}

impl TestWorld {
    pub fn new(model: ScriptedModel) -> Result<Self> {
        Self::with_memory(model, StaticMemory::empty())
    }

    pub fn with_memory(model: ScriptedModel, memory: StaticMemory) -> Result<Self> {
        let log = Arc::new(Mutex::new(EventLog::open_in_memory()?));
        let shared: SharedAffectHandle = Arc::new(Mutex::new(SharedAffect::default()));
        let mut runner = TurnRunner::new(
            log.clone(),
            Arc::new(model),
            Arc::new(memory),
            Arc::new(TemplateVoice),
            EngineSettings::default(),
            default_agencies(),
            shared.clone(),
        );
        runner.set_session(TEST_SESSION)?;
        Ok(Self {
            runner,
            log,
            shared,
        })
    }

    /// All persisted events of one turn, in seq order.
    pub fn replay(&self, turn_id: u64) -> Result<Vec<EngineEvent>> {
        Ok(self
            .log
            .lock()
            .expect("event log lock poisoned")
            .replay_turn(TEST_SESSION, turn_id)?)
    }
}
