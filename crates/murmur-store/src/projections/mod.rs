//! Views derived from the event stream.
//!
//! A projection is a pure fold over an event prefix: replaying the same
//! prefix into a fresh projection must yield the same view. Projections
//! never write back to the log.

mod analytics;
mod debug;
mod session;
mod turn_state;

pub use analytics::{AnalyticsProjection, ModelStats};
pub use debug::{AgentTraceRecord, DebugProjection};
pub use session::{ChatMessage, SessionProjection};
pub use turn_state::{TurnStateProjection, UiUpdate, UiUpdateKind};

use murmur_types::EngineEvent;

/// A deterministic fold over the event stream.
pub trait Projection {
    /// Apply one event. Must be free of I/O and other side effects.
    fn apply(&mut self, event: &EngineEvent);

    /// Return to the initial (empty) state.
    fn reset(&mut self);

    /// Fold a whole prefix, in order.
    fn replay<'a>(&mut self, events: impl IntoIterator<Item = &'a EngineEvent>)
    where
        Self: Sized,
    {
        for event in events {
            self.apply(event);
        }
    }
}
