//! Identifiers, notifications and statistics for the playback engine.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

/// Identifies one generation request's playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Notifications emitted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The stream ended and every scheduled block finished. Fired once per session.
    PlaybackComplete { session: SessionId },
    /// The grace window after `stop()` elapsed; a new session may begin.
    Stopped { session: SessionId },
    /// A leftover byte has been carried longer than the configured limit.
    AlignmentAnomaly {
        session: SessionId,
        carried_chunks: u32,
    },
}

/// Receiving end of the engine's notification channel.
pub struct EngineEvents {
    rx: mpsc::UnboundedReceiver<EngineEvent>,
}

impl EngineEvents {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<EngineEvent>) -> Self {
        Self { rx }
    }

    /// Wait for the next notification.
    pub async fn recv(&mut self) -> Option<EngineEvent> {
        self.rx.recv().await
    }

    /// Take a notification if one is already queued.
    pub fn try_recv(&mut self) -> Option<EngineEvent> {
        self.rx.try_recv().ok()
    }

    /// Drain everything queued so far.
    pub fn drain(&mut self) -> Vec<EngineEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    pub fn into_stream(self) -> UnboundedReceiverStream<EngineEvent> {
        UnboundedReceiverStream::new(self.rx)
    }
}

/// Snapshot of a session's progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlaybackStats {
    pub bytes_received: u64,
    pub samples_scheduled: u64,
    pub blocks_scheduled: u64,
    pub active_blocks: usize,
    pub underruns: u64,
    /// Audio queued ahead of the output clock, in seconds
    pub buffered_ahead_seconds: f64,
    /// Audio withheld by the priming buffer, in milliseconds
    pub priming_buffered_ms: f32,
    /// Seconds from session start to the first complete sample
    pub time_to_first_audio: Option<f64>,
}
