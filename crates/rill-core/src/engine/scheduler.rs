//! Gapless block scheduler with underrun recovery.
//!
//! The scheduler owns no clock of its own. For every frame that is ready for
//! output it reads the sink's clock once and picks a start time:
//! - first block of a session: `now + startup_delay`
//! - the queue ran dry (`next_start_time < now`): `now + underrun_epsilon`
//! - otherwise: exactly where the previous block ends
//!
//! and then advances the session cursor by the frame's duration.

use tracing::{debug, warn};

use super::registry::PlaybackRegistry;
use super::session::PlaybackSession;
use crate::audio::SampleFrame;
use crate::config::PlaybackConfig;
use crate::error::Result;
use crate::sink::{BlockEndNotifier, BlockId, OutputSink};

/// Configuration for the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Margin ahead of the clock for a session's first block
    pub startup_delay_seconds: f64,
    /// Margin ahead of the clock when resynchronising after an underrun
    pub underrun_epsilon_seconds: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from(&PlaybackConfig::default())
    }
}

impl From<&PlaybackConfig> for SchedulerConfig {
    fn from(config: &PlaybackConfig) -> Self {
        Self {
            startup_delay_seconds: config.startup_delay_seconds,
            underrun_epsilon_seconds: config.underrun_epsilon_seconds,
        }
    }
}

/// Why a block starts where it does.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StartDecision {
    /// First block of the session, delayed for device wake-up
    FirstBlock,
    /// The output overtook the cursor by `late_by` seconds
    Resync { late_by: f64 },
    /// Appended directly after the previous block
    Append,
}

/// A frame bound to an output start time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledBlock {
    pub block: BlockId,
    pub start: f64,
    pub duration: f64,
    pub decision: StartDecision,
}

/// Block scheduler.
pub struct Scheduler {
    config: SchedulerConfig,
}

impl Scheduler {
    /// Create a new scheduler.
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    /// Decide where a block that is about to be submitted should start.
    ///
    /// First-block handling takes precedence over underrun detection.
    pub fn decide(&self, session: &PlaybackSession, now: f64) -> (f64, StartDecision) {
        if session.active_blocks.is_empty() && session.next_start_time == 0.0 {
            (
                now + self.config.startup_delay_seconds,
                StartDecision::FirstBlock,
            )
        } else if session.next_start_time < now {
            (
                now + self.config.underrun_epsilon_seconds,
                StartDecision::Resync {
                    late_by: now - session.next_start_time,
                },
            )
        } else {
            (session.next_start_time, StartDecision::Append)
        }
    }

    /// Submit `frame` to the sink at the next start time and register it.
    ///
    /// Returns `Ok(None)` without touching the sink while a stop is pending:
    /// the frame is discarded on purpose.
    pub fn schedule_next<S: OutputSink>(
        &self,
        frame: SampleFrame,
        session: &mut PlaybackSession,
        sink: &mut S,
        registry: &PlaybackRegistry,
        notifier: &BlockEndNotifier,
    ) -> Result<Option<ScheduledBlock>> {
        if session.is_stop_requested() {
            debug!("Stop pending, discarding {} samples", frame.len());
            return Ok(None);
        }
        if frame.is_empty() {
            return Ok(None);
        }

        let now = sink.now();
        let (requested, decision) = self.decide(session, now);
        if let StartDecision::Resync { late_by } = decision {
            session.underruns += 1;
            warn!(
                "Underrun: output ran {:.1}ms past the queue, resyncing at {:.3}s",
                late_by * 1000.0,
                requested
            );
        }
        let duration = frame.duration();
        let sample_count = frame.len();
        let sample_rate = frame.sample_rate();
        let block = sink.create_block(frame.into_samples(), sample_rate)?;
        sink.on_block_end(block, notifier.clone());
        let start = match sink.schedule_at(block, requested) {
            Ok(start) => start,
            Err(e) => {
                sink.force_end(block);
                return Err(e);
            }
        };
        registry.register(session, block);

        session.next_start_time = start + duration;
        session.samples_scheduled += sample_count as u64;
        session.blocks_scheduled += 1;

        debug!(
            "Scheduled {} ({} samples) at {:.4}s ({:?}), next start {:.4}s",
            block, sample_count, start, decision, session.next_start_time
        );

        Ok(Some(ScheduledBlock {
            block,
            start,
            duration,
            decision,
        }))
    }
}
