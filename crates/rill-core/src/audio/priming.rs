//! Priming buffer for the start of a session

use std::collections::VecDeque;
use tracing::debug;

use super::frame::SampleFrame;

/// Holds back the first frames of a session until enough audio is buffered.
///
/// The first block after the output device resumes is the one most likely to
/// be scheduled too close to "now"; withholding a fixed amount of audio up
/// front removes that whole class of start-up underruns. Once flushed, the
/// buffer passes frames straight through until it is reset.
pub struct PrimingBuffer {
    threshold_ms: u32,
    sample_rate: u32,
    frames: VecDeque<SampleFrame>,
    sample_count: usize,
    flushed: bool,
}

impl PrimingBuffer {
    /// Create a buffer that releases audio once `threshold_ms` is held.
    /// A threshold of 0 releases the first frame immediately.
    pub fn new(threshold_ms: u32, sample_rate: u32) -> Self {
        Self {
            threshold_ms,
            sample_rate,
            frames: VecDeque::new(),
            sample_count: 0,
            flushed: false,
        }
    }

    /// Accept a frame, returning audio that is ready to be scheduled.
    pub fn ingest(&mut self, frame: SampleFrame) -> Option<SampleFrame> {
        if self.flushed {
            return Some(frame);
        }

        self.sample_count += frame.len();
        self.frames.push_back(frame);

        if self.threshold_reached() {
            self.flush()
        } else {
            None
        }
    }

    /// Concatenate everything held into one block and stop priming.
    ///
    /// Returns `None` when nothing is held; the buffer then stays unprimed
    /// so a later frame can still be withheld.
    pub fn flush(&mut self) -> Option<SampleFrame> {
        if self.frames.is_empty() {
            return None;
        }

        let block = SampleFrame::concat(self.frames.drain(..), self.sample_rate);
        debug!(
            "Priming buffer flushed {} samples ({:.1}ms)",
            block.len(),
            block.duration() * 1000.0
        );
        self.sample_count = 0;
        self.flushed = true;
        Some(block)
    }

    fn threshold_reached(&self) -> bool {
        // Integer compare avoids float drift right at the threshold
        self.sample_count as u64 * 1000 >= self.threshold_ms as u64 * self.sample_rate as u64
    }

    /// Whether the initial block has already been released.
    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    /// Whether audio is being withheld right now.
    pub fn has_pending(&self) -> bool {
        !self.frames.is_empty()
    }

    pub fn buffered_samples(&self) -> usize {
        self.sample_count
    }

    pub fn buffered_duration_ms(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        (self.sample_count as f32 / self.sample_rate as f32) * 1000.0
    }

    /// Drop held audio and return to the unprimed state.
    pub fn reset(&mut self) {
        self.frames.clear();
        self.sample_count = 0;
        self.flushed = false;
    }
}
