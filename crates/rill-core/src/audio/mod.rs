//! PCM handling from raw network bytes up to schedulable frames

mod aligner;
mod convert;
mod encoder;
mod frame;
mod priming;

pub use aligner::{align, ByteAligner, SAMPLE_WIDTH};
pub use convert::{convert, f32_to_i16, i16_to_f32};
pub use encoder::AudioEncoder;
pub use frame::SampleFrame;
pub use priming::PrimingBuffer;
