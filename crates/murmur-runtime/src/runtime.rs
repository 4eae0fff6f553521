use std::sync::{Arc, Mutex};

use murmur_engine::agent::default_agencies;
use murmur_engine::contracts::{LanguageModel, MemoryStore, VoiceRenderer};
use murmur_engine::{SharedAffect, SharedAffectHandle, TurnOutcome, TurnRunner};
use murmur_store::EventLog;
use tracing::info;

use crate::config::Config;
use crate::daemon::{Daemon, DaemonHandle};
use crate::Result;

/// Owns the assembled engine: the event log, the turn runner, and the
/// shared affect block the daemon works against. The model, memory, and
/// voice collaborators are injected; nothing is reached through globals.
pub struct Runtime {
    config: Config,
    log: Arc<Mutex<EventLog>>,
    shared: SharedAffectHandle,
    runner: TurnRunner,
}

impl Runtime {
    pub fn new(
        config: Config,
        model: Arc<dyn LanguageModel>,
        memory: Arc<dyn MemoryStore>,
        voice: Arc<dyn VoiceRenderer>,
    ) -> Result<Self> {
        let db_path = config.data_dir.join("events.db");
        let log = Arc::new(Mutex::new(EventLog::open(&db_path)?));
        Self::with_log(config, log, model, memory, voice)
    }

    /// Assemble over an existing log handle (tests use the in-memory log).
    pub fn with_log(
        config: Config,
        log: Arc<Mutex<EventLog>>,
        model: Arc<dyn LanguageModel>,
        memory: Arc<dyn MemoryStore>,
        voice: Arc<dyn VoiceRenderer>,
    ) -> Result<Self> {
        let shared: SharedAffectHandle = Arc::new(Mutex::new(SharedAffect::default()));
        let runner = TurnRunner::new(
            log.clone(),
            model,
            memory,
            voice,
            config.engine_settings(),
            default_agencies(),
            shared.clone(),
        );
        Ok(Self {
            config,
            log,
            shared,
            runner,
        })
    }

    /// Open (or resume) a session. The turn counter continues from the
    /// last turn recorded in the log.
    pub fn open_session(&mut self, session_id: &str) -> Result<()> {
        self.runner.set_session(session_id)?;
        info!(session_id, "session opened");
        Ok(())
    }

    /// Run one user turn through the full pipeline.
    pub async fn run_turn(&mut self, user_input: &str) -> Result<TurnOutcome> {
        Ok(self.runner.run_turn(user_input).await?)
    }

    /// Start the background daemon for the current session.
    pub fn start_daemon(&self) -> DaemonHandle {
        let daemon = Daemon::new(
            self.log.clone(),
            self.shared.clone(),
            self.runner.session_id().to_string(),
            &self.config,
        );
        daemon.spawn()
    }

    /// Build an unstarted daemon (callers attach callbacks, then spawn).
    pub fn build_daemon(&self) -> Daemon {
        Daemon::new(
            self.log.clone(),
            self.shared.clone(),
            self.runner.session_id().to_string(),
            &self.config,
        )
    }

    pub fn runner(&mut self) -> &mut TurnRunner {
        &mut self.runner
    }

    pub fn log(&self) -> Arc<Mutex<EventLog>> {
        self.log.clone()
    }

    pub fn shared_affect(&self) -> SharedAffectHandle {
        self.shared.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
