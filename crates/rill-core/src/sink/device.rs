//! Real audio output through the default cpal device
//!
//! The output callback is the clock: every frame it renders advances the
//! frame counter, and blocks are mixed in at their scheduled frame. Block-end
//! events are posted from the callback thread.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

use super::{BlockEndNotifier, BlockId, OutputSink};
use crate::error::{Error, Result};

struct DeviceBlock {
    samples: Vec<f32>,
    start_frame: Option<u64>,
    notifier: Option<BlockEndNotifier>,
}

impl DeviceBlock {
    fn end_frame(&self) -> Option<u64> {
        self.start_frame.map(|start| start + self.samples.len() as u64)
    }
}

#[derive(Default)]
struct DeviceState {
    frames_rendered: u64,
    next_id: u64,
    blocks: HashMap<BlockId, DeviceBlock>,
}

impl DeviceState {
    /// Fill one interleaved output buffer and retire finished blocks.
    fn render(&mut self, data: &mut [f32], channels: usize) {
        let first = self.frames_rendered;
        for (offset, frame) in data.chunks_mut(channels).enumerate() {
            let position = first + offset as u64;
            let mut mixed = 0.0f32;
            for block in self.blocks.values() {
                if let Some(start) = block.start_frame {
                    if position >= start {
                        if let Some(&sample) = block.samples.get((position - start) as usize) {
                            mixed += sample;
                        }
                    }
                }
            }
            frame.fill(mixed.clamp(-1.0, 1.0));
        }
        self.frames_rendered += (data.len() / channels) as u64;

        let now = self.frames_rendered;
        let ended: Vec<BlockId> = self
            .blocks
            .iter()
            .filter(|(_, block)| block.end_frame().is_some_and(|end| end <= now))
            .map(|(id, _)| *id)
            .collect();
        for id in ended {
            if let Some(block) = self.blocks.remove(&id) {
                if let Some(notifier) = block.notifier {
                    notifier.notify(id);
                }
            }
        }
    }
}

/// Sink backed by the system's default output device.
pub struct DeviceSink {
    state: Arc<Mutex<DeviceState>>,
    sample_rate: u32,
    _stream: Stream,
}

impl DeviceSink {
    /// Open the default output device at `sample_rate` and start the clock.
    pub fn open(sample_rate: u32) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::SinkRejected("no audio output device found".to_string()))?;
        let channels = device
            .default_output_config()
            .map_err(|e| Error::SinkRejected(e.to_string()))?
            .channels();

        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let state = Arc::new(Mutex::new(DeviceState::default()));
        let callback_state = state.clone();
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    match callback_state.lock() {
                        Ok(mut state) => state.render(data, channels as usize),
                        Err(_) => data.fill(0.0),
                    }
                },
                |err| warn!("Output stream error: {}", err),
                None,
            )
            .map_err(|e| Error::SinkRejected(e.to_string()))?;
        stream
            .play()
            .map_err(|e| Error::SinkRejected(e.to_string()))?;

        info!(
            "Opened output device {:?} at {} Hz, {} channels",
            device.name().unwrap_or_default(),
            sample_rate,
            channels
        );

        Ok(Self {
            state,
            sample_rate,
            _stream: stream,
        })
    }

    fn state(&self) -> MutexGuard<'_, DeviceState> {
        // The callback never panics while holding the lock, but stay usable if it did
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl OutputSink for DeviceSink {
    fn now(&self) -> f64 {
        self.state().frames_rendered as f64 / self.sample_rate as f64
    }

    fn create_block(&mut self, samples: Vec<f32>, sample_rate: u32) -> Result<BlockId> {
        if sample_rate != self.sample_rate {
            return Err(Error::SinkRejected(format!(
                "device opened at {} Hz, block is {} Hz",
                self.sample_rate, sample_rate
            )));
        }

        let mut state = self.state();
        let id = BlockId(state.next_id);
        state.next_id += 1;
        state.blocks.insert(
            id,
            DeviceBlock {
                samples,
                start_frame: None,
                notifier: None,
            },
        );
        Ok(id)
    }

    fn schedule_at(&mut self, block: BlockId, start: f64) -> Result<f64> {
        let sample_rate = self.sample_rate as f64;
        let mut state = self.state();
        let requested = (start.max(0.0) * sample_rate).round() as u64;
        // Behind the callback already: start at the next rendered frame
        let start_frame = requested.max(state.frames_rendered);
        let entry = state
            .blocks
            .get_mut(&block)
            .ok_or_else(|| Error::SinkRejected(format!("unknown {}", block)))?;
        entry.start_frame = Some(start_frame);
        Ok(start_frame as f64 / sample_rate)
    }

    fn on_block_end(&mut self, block: BlockId, notifier: BlockEndNotifier) {
        if let Some(entry) = self.state().blocks.get_mut(&block) {
            entry.notifier = Some(notifier);
        }
    }

    fn force_end(&mut self, block: BlockId) {
        self.state().blocks.remove(&block);
    }
}
