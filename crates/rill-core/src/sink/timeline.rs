//! Software sink that renders blocks into an in-memory timeline
//!
//! Blocks are mixed into a single f32 buffer at `start * sample_rate` and
//! retired on [`poll`](OutputSink::poll) once the clock passes their end.
//! With a [`WallClock`](super::WallClock) it behaves like a real device that
//! records instead of playing; with a [`ManualClock`](super::ManualClock) it
//! is fully deterministic.

use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use super::{BlockEndNotifier, BlockId, Clock, OutputSink};
use crate::audio::AudioEncoder;
use crate::error::{Error, Result};

/// Where and for how long a block was scheduled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledRecord {
    pub block: BlockId,
    pub start: f64,
    pub duration: f64,
}

impl ScheduledRecord {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

struct TimelineBlock {
    samples: Vec<f32>,
    start_index: Option<usize>,
    end: f64,
    notifier: Option<BlockEndNotifier>,
}

pub struct TimelineSink<C: Clock> {
    clock: C,
    sample_rate: u32,
    next_id: u64,
    blocks: HashMap<BlockId, TimelineBlock>,
    timeline: Vec<f32>,
    history: Vec<ScheduledRecord>,
}

impl<C: Clock> TimelineSink<C> {
    pub fn new(clock: C, sample_rate: u32) -> Self {
        Self {
            clock,
            sample_rate,
            next_id: 0,
            blocks: HashMap::new(),
            timeline: Vec::new(),
            history: Vec::new(),
        }
    }

    /// Everything rendered so far, starting at clock time zero.
    pub fn timeline(&self) -> &[f32] {
        &self.timeline
    }

    /// Every block that was scheduled, in scheduling order.
    pub fn history(&self) -> &[ScheduledRecord] {
        &self.history
    }

    /// Blocks created or scheduled that have not ended yet.
    pub fn live_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Encode the rendered timeline as a 16-bit WAV file.
    pub fn write_wav(&self, path: &Path) -> Result<()> {
        AudioEncoder::new(self.sample_rate).write_wav(&self.timeline, path)
    }

    fn index_of(&self, seconds: f64) -> usize {
        (seconds.max(0.0) * self.sample_rate as f64).round() as usize
    }
}

impl<C: Clock> OutputSink for TimelineSink<C> {
    fn now(&self) -> f64 {
        self.clock.now()
    }

    fn create_block(&mut self, samples: Vec<f32>, sample_rate: u32) -> Result<BlockId> {
        if sample_rate != self.sample_rate {
            return Err(Error::SinkRejected(format!(
                "sink runs at {} Hz, block is {} Hz",
                self.sample_rate, sample_rate
            )));
        }

        let id = BlockId(self.next_id);
        self.next_id += 1;
        self.blocks.insert(
            id,
            TimelineBlock {
                samples,
                start_index: None,
                end: 0.0,
                notifier: None,
            },
        );
        Ok(id)
    }

    fn schedule_at(&mut self, block: BlockId, start: f64) -> Result<f64> {
        let now = self.clock.now();
        let start = if start < now {
            debug!(
                "{} requested at {:.4}s, clock is at {:.4}s, starting now",
                block, start, now
            );
            now
        } else {
            start
        };

        let start_index = self.index_of(start);
        let sample_rate = self.sample_rate;
        let entry = self
            .blocks
            .get_mut(&block)
            .ok_or_else(|| Error::SinkRejected(format!("unknown {}", block)))?;
        if entry.start_index.is_some() {
            return Err(Error::SinkRejected(format!("{} already scheduled", block)));
        }

        let end_index = start_index + entry.samples.len();
        if self.timeline.len() < end_index {
            self.timeline.resize(end_index, 0.0);
        }
        for (out, &sample) in self.timeline[start_index..end_index]
            .iter_mut()
            .zip(&entry.samples)
        {
            *out += sample;
        }

        let duration = entry.samples.len() as f64 / sample_rate as f64;
        entry.start_index = Some(start_index);
        entry.end = start + duration;
        self.history.push(ScheduledRecord {
            block,
            start,
            duration,
        });
        Ok(start)
    }

    fn on_block_end(&mut self, block: BlockId, notifier: BlockEndNotifier) {
        if let Some(entry) = self.blocks.get_mut(&block) {
            entry.notifier = Some(notifier);
        }
    }

    fn force_end(&mut self, block: BlockId) {
        let cut = self.index_of(self.clock.now());
        let Some(entry) = self.blocks.remove(&block) else {
            return;
        };

        // Unmix whatever the device would not have played yet
        if let Some(start_index) = entry.start_index {
            let from = cut.max(start_index);
            let end_index = start_index + entry.samples.len();
            for index in from..end_index {
                self.timeline[index] -= entry.samples[index - start_index];
            }
        }
        debug!("Force-ended {}", block);
    }

    fn poll(&mut self) {
        let now = self.clock.now();
        let mut ended: Vec<(f64, BlockId)> = self
            .blocks
            .iter()
            .filter(|(_, entry)| entry.start_index.is_some() && entry.end <= now)
            .map(|(id, entry)| (entry.end, *id))
            .collect();
        ended.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        for (_, id) in ended {
            if let Some(entry) = self.blocks.remove(&id) {
                if let Some(notifier) = entry.notifier {
                    notifier.notify(id);
                }
            }
        }
    }
}
