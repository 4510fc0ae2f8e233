//! Per-request playback state.

use std::collections::BTreeSet;
use tokio::time::Instant;

use super::cancel::StopFlag;
use super::types::SessionId;
use crate::sink::BlockId;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Bytes are still arriving
    Streaming,
    /// Download finished, waiting for scheduled blocks to drain
    Draining,
    /// Every block played out and completion was notified
    Complete,
    /// Torn down by `stop()`
    Stopped,
}

/// Aggregate state for one generation request.
///
/// Mutated only by the scheduler, the registry and the cancellation
/// controller; `next_start_time` is zeroed only by the controller.
#[derive(Debug)]
pub struct PlaybackSession {
    id: SessionId,
    sample_rate: u32,
    stop: StopFlag,
    started_at: Instant,
    pub(crate) phase: SessionPhase,
    pub(crate) next_start_time: f64,
    pub(crate) download_finished: bool,
    pub(crate) active_blocks: BTreeSet<BlockId>,
    pub(crate) completion_fired: bool,
    pub(crate) anomaly_reported: bool,
    pub(crate) bytes_received: u64,
    pub(crate) samples_scheduled: u64,
    pub(crate) blocks_scheduled: u64,
    pub(crate) underruns: u64,
    pub(crate) time_to_first_audio: Option<f64>,
}

impl PlaybackSession {
    pub fn new(sample_rate: u32, stop: StopFlag) -> Self {
        Self {
            id: SessionId::new(),
            sample_rate,
            stop,
            started_at: Instant::now(),
            phase: SessionPhase::Streaming,
            next_start_time: 0.0,
            download_finished: false,
            active_blocks: BTreeSet::new(),
            completion_fired: false,
            anomaly_reported: false,
            bytes_received: 0,
            samples_scheduled: 0,
            blocks_scheduled: 0,
            underruns: 0,
            time_to_first_audio: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Output-clock time at which the next block will start.
    pub fn next_start_time(&self) -> f64 {
        self.next_start_time
    }

    pub fn download_finished(&self) -> bool {
        self.download_finished
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.is_set()
    }

    pub fn active_block_count(&self) -> usize {
        self.active_blocks.len()
    }

    pub fn underruns(&self) -> u64 {
        self.underruns
    }

    /// Whether a new session may replace this one without stopping it first.
    pub fn is_finished(&self) -> bool {
        matches!(self.phase, SessionPhase::Complete | SessionPhase::Stopped)
    }

    pub(crate) fn mark_first_audio(&mut self) {
        if self.time_to_first_audio.is_none() {
            self.time_to_first_audio = Some(self.started_at.elapsed().as_secs_f64());
        }
    }
}
