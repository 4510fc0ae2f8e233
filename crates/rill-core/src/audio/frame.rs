//! Normalized sample frames

/// A run of mono samples in `[-1.0, 1.0]` at a fixed sample rate.
///
/// Produced once per aligned chunk and consumed exactly once, either by the
/// priming buffer or by the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleFrame {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl SampleFrame {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Concatenate frames that share a sample rate into a single frame.
    pub fn concat(frames: impl IntoIterator<Item = SampleFrame>, sample_rate: u32) -> Self {
        let mut samples = Vec::new();
        for frame in frames {
            debug_assert_eq!(frame.sample_rate, sample_rate);
            if samples.is_empty() {
                samples = frame.samples;
            } else {
                samples.extend_from_slice(&frame.samples);
            }
        }
        Self::new(samples, sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playback length in seconds (`sample_count / sample_rate`).
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}
