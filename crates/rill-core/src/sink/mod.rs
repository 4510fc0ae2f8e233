//! Output sinks: where scheduled blocks are rendered against a device clock
//!
//! The engine never talks to an audio API directly. It needs five operations
//! from a sink and a clock that only moves forward; anything that provides
//! them can host playback.

mod clock;
#[cfg(feature = "device")]
mod device;
mod timeline;

use tokio::sync::mpsc;

use crate::error::Result;

pub use clock::{Clock, ManualClock, WallClock};
#[cfg(feature = "device")]
pub use device::DeviceSink;
pub use timeline::{ScheduledRecord, TimelineSink};

/// Opaque handle to a block owned by a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u64);

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "block-{}", self.0)
    }
}

/// Posts block-end events into the engine's single event queue.
///
/// Every scheduled block gets a clone; sinks call [`notify`](Self::notify)
/// from whatever thread observes the block finishing.
#[derive(Debug, Clone)]
pub struct BlockEndNotifier {
    tx: mpsc::UnboundedSender<BlockId>,
}

impl BlockEndNotifier {
    pub fn new(tx: mpsc::UnboundedSender<BlockId>) -> Self {
        Self { tx }
    }

    /// Report that `block` has finished playing. Ignored once the engine is gone.
    pub fn notify(&self, block: BlockId) {
        let _ = self.tx.send(block);
    }
}

/// Host audio output consumed by the scheduler.
pub trait OutputSink {
    /// Output clock in seconds since the device started.
    fn now(&self) -> f64;

    /// Hand samples to the sink, returning a handle for later scheduling.
    fn create_block(&mut self, samples: Vec<f32>, sample_rate: u32) -> Result<BlockId>;

    /// Start the block at `start` seconds on the output clock.
    ///
    /// A start the clock has already passed plays immediately. Returns the
    /// start time actually used.
    fn schedule_at(&mut self, block: BlockId, start: f64) -> Result<f64>;

    /// Register where the block's end event should be posted.
    fn on_block_end(&mut self, block: BlockId, notifier: BlockEndNotifier);

    /// Stop the block immediately and release it. No end event is posted.
    fn force_end(&mut self, block: BlockId);

    /// Give software sinks a chance to retire blocks the clock has passed.
    fn poll(&mut self) {}
}

impl<S: OutputSink + ?Sized> OutputSink for Box<S> {
    fn now(&self) -> f64 {
        (**self).now()
    }

    fn create_block(&mut self, samples: Vec<f32>, sample_rate: u32) -> Result<BlockId> {
        (**self).create_block(samples, sample_rate)
    }

    fn schedule_at(&mut self, block: BlockId, start: f64) -> Result<f64> {
        (**self).schedule_at(block, start)
    }

    fn on_block_end(&mut self, block: BlockId, notifier: BlockEndNotifier) {
        (**self).on_block_end(block, notifier)
    }

    fn force_end(&mut self, block: BlockId) {
        (**self).force_end(block)
    }

    fn poll(&mut self) {
        (**self).poll()
    }
}
