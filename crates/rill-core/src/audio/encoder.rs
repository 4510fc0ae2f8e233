//! WAV encoding of rendered playback

use hound::{WavSpec, WavWriter};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

use super::convert::f32_to_i16;
use crate::error::Result;

/// Encoder for mono f32 samples to 16-bit PCM WAV
pub struct AudioEncoder {
    sample_rate: u32,
}

impl AudioEncoder {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    /// Encode to WAV and write the result to `path`.
    pub fn write_wav(&self, samples: &[f32], path: &Path) -> Result<()> {
        let bytes = self.encode_wav(samples)?;
        std::fs::write(path, bytes)?;
        debug!("Wrote {} samples to {:?}", samples.len(), path);
        Ok(())
    }

    fn spec(&self) -> WavSpec {
        WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        }
    }

    /// Encode samples as an in-memory WAV file.
    pub fn encode_wav(&self, samples: &[f32]) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut buffer, self.spec())?;
            for &sample in samples {
                writer.write_sample(f32_to_i16(sample))?;
            }
            writer.finalize()?;
        }

        debug!(
            "Encoded {} samples to WAV ({} bytes)",
            samples.len(),
            buffer.get_ref().len()
        );
        Ok(buffer.into_inner())
    }
}
