//! Streaming playback engine.
//!
//! Leaf-first:
//! - [`Scheduler`]: start-time decisions against the output clock
//! - [`PlaybackRegistry`]: in-flight blocks and completion detection
//! - [`CancellationController`]: stop/reset with a grace window
//! - [`PlaybackEngine`]: composes the above with alignment, conversion and priming

mod cancel;
mod player;
mod registry;
mod scheduler;
mod session;
mod types;

pub use cancel::{CancellationController, StopFlag};
pub use player::PlaybackEngine;
pub use registry::PlaybackRegistry;
pub use scheduler::{ScheduledBlock, Scheduler, SchedulerConfig, StartDecision};
pub use session::{PlaybackSession, SessionPhase};
pub use types::{EngineEvent, EngineEvents, PlaybackStats, SessionId};
