//! Bookkeeping of in-flight blocks and completion detection.
//!
//! Every scheduled block posts its end into one queue; the registry is the
//! single consumer. Removal is idempotent, so an end event for a block that
//! `stop()` already released is a no-op.

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::session::{PlaybackSession, SessionPhase};
use super::types::EngineEvent;
use crate::sink::BlockId;

pub struct PlaybackRegistry {
    events: mpsc::UnboundedSender<EngineEvent>,
}

impl PlaybackRegistry {
    pub fn new(events: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self { events }
    }

    /// Track a block that the sink accepted.
    pub fn register(&self, session: &mut PlaybackSession, block: BlockId) {
        session.active_blocks.insert(block);
    }

    /// Forget a finished block, then re-evaluate completion.
    ///
    /// Returns `false` for blocks the session does not know about.
    pub fn on_block_end(&self, block: BlockId, session: &mut PlaybackSession) -> bool {
        if !session.active_blocks.remove(&block) {
            debug!("Ignoring end of untracked {}", block);
            return false;
        }
        debug!(
            "{} ended, {} still active",
            block,
            session.active_blocks.len()
        );
        self.check_completion(session);
        true
    }

    /// Record that the network stream has delivered its last byte.
    pub fn mark_download_finished(&self, session: &mut PlaybackSession) {
        session.download_finished = true;
        if session.phase == SessionPhase::Streaming {
            session.phase = SessionPhase::Draining;
        }
    }

    /// Fire completion once both the stream and the output queue are done.
    pub fn check_completion(&self, session: &mut PlaybackSession) -> bool {
        if session.completion_fired
            || !session.download_finished
            || !session.active_blocks.is_empty()
        {
            return false;
        }

        session.completion_fired = true;
        session.phase = SessionPhase::Complete;
        info!(
            "Session {} playback complete ({} blocks, {} underruns)",
            session.id(),
            session.blocks_scheduled,
            session.underruns
        );
        let _ = self.events.send(EngineEvent::PlaybackComplete {
            session: session.id(),
        });
        true
    }
}
