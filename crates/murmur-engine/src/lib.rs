//! The murmur core engine.
//!
//! A turn-scoped pipeline that fans out small-model agent evaluations,
//! merges their graded outputs into a per-turn workspace, runs a bounded
//! deliberation loop over their claims, and emits an append-only stream
//! of engine events as the sole source of truth for downstream views.
//!
//! External collaborators (language model, memory system, voice renderer)
//! are consumed through the traits in [`contracts`] and injected through
//! [`TurnRunner::new`]; there are no globals.

pub mod agent;
pub mod contracts;
pub mod council;
pub mod critics;
pub mod deliberation;
pub mod graph;
pub mod scheduler;
pub mod sensors;
pub mod settings;
pub mod voice;
pub mod workspace;

mod error;
mod runner;

pub use error::{Error, Result};
pub use runner::{
    Emitter, SharedAffect, SharedAffectHandle, TurnOutcome, TurnRunner, monotonic_now,
};
