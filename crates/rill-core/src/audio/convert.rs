//! 16-bit PCM to normalized float conversion
//!
//! Scaling is asymmetric so the full integer range maps onto `[-1.0, 1.0]`
//! exactly: `i16::MAX` becomes `1.0` and `i16::MIN` becomes `-1.0`.

use super::aligner::SAMPLE_WIDTH;
use super::frame::SampleFrame;

const POSITIVE_SCALE: f32 = 32767.0;
const NEGATIVE_SCALE: f32 = 32768.0;

/// Map one signed 16-bit sample into `[-1.0, 1.0]`.
#[inline]
pub fn i16_to_f32(value: i16) -> f32 {
    if value >= 0 {
        value as f32 / POSITIVE_SCALE
    } else {
        value as f32 / NEGATIVE_SCALE
    }
}

/// Inverse of [`i16_to_f32`], clamping out-of-range input.
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    let sample = sample.clamp(-1.0, 1.0);
    if sample >= 0.0 {
        (sample * POSITIVE_SCALE).round() as i16
    } else {
        (sample * NEGATIVE_SCALE).round() as i16
    }
}

/// Decode an aligned little-endian span into a frame.
///
/// The span must be a multiple of [`SAMPLE_WIDTH`]; the aligner guarantees it.
pub fn convert(span: &[u8], sample_rate: u32) -> SampleFrame {
    debug_assert_eq!(span.len() % SAMPLE_WIDTH, 0);
    let samples = span
        .chunks_exact(SAMPLE_WIDTH)
        .map(|pair| i16_to_f32(i16::from_le_bytes([pair[0], pair[1]])))
        .collect();
    SampleFrame::new(samples, sample_rate)
}
