//! Rill Core - Streaming PCM Playback Engine
//!
//! Plays synthesized speech as it arrives over the network: raw 16-bit PCM
//! bytes in, gapless audio out, with instantaneous cancellation.
//!
//! # Architecture
//!
//! ```text
//! network bytes -> ByteAligner -> convert -> PrimingBuffer / Scheduler
//!               -> OutputSink -> block-end events -> PlaybackRegistry -> EngineEvent
//! ```
//!
//! - Byte alignment across arbitrary chunk cuts
//! - Priming (warm-up) buffer before the first scheduled block
//! - Gapless scheduling against the sink's clock with underrun recovery
//! - Completion detection across download-finished and queue-drained
//! - Stop/reset with a grace window for in-flight stragglers
//!
//! # Example
//!
//! ```ignore
//! use rill_core::{PlaybackConfig, PlaybackEngine};
//! use rill_core::sink::{TimelineSink, WallClock};
//!
//! let sink = TimelineSink::new(WallClock::new(), 24000);
//! let (mut engine, mut events) = PlaybackEngine::new(PlaybackConfig::default(), sink)?;
//! engine.begin_session(24000)?;
//! let outcome = rill_core::stream::play_stream(&mut engine, body, cancel).await?;
//! ```

pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod sink;
pub mod stream;

pub use config::PlaybackConfig;
pub use engine::{
    EngineEvent, EngineEvents, PlaybackEngine, PlaybackSession, PlaybackStats, SessionId,
    SessionPhase,
};
pub use error::{Error, Result};
pub use sink::{BlockId, OutputSink};
pub use stream::{play_stream, StreamOutcome};
