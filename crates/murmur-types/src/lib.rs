//! Core schemas shared across the murmur workspace.
//!
//! This crate holds data only: events, claims, stance, modulators, agent
//! messages, and the records exchanged with the memory contract. Behavior
//! that touches I/O, models, or storage lives in `murmur-store` and
//! `murmur-engine`.

mod agent;
mod claim;
mod council;
mod event;
mod memory;
mod modulators;
mod signature;
mod stance;

pub use agent::*;
pub use claim::*;
pub use council::*;
pub use event::*;
pub use memory::*;
pub use modulators::*;
pub use signature::*;
pub use stance::*;
