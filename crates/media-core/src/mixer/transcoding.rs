//! Transcoding source adapter
//!
//! Wraps an input source whose native format the mixer can't blend and
//! exposes the same source surface in the mixer's target format. The
//! conversions are the cheap ones a software mixer needs: bit-depth
//! rescaling, stereo fold-down and nearest-sample rate conversion.

use std::sync::Arc;

use crate::format::{AudioEncoding, AudioFormat};
use crate::source::{AudioSource, SourceStream, TransferHandler};
use crate::Result;

/// Adapter converting an input source to a target format
pub struct TranscodingSource {
    input: Arc<dyn AudioSource>,
    out_format: AudioFormat,
}

impl TranscodingSource {
    /// Wrap `input`, converting its output to `out_format`
    pub fn new(input: Arc<dyn AudioSource>, out_format: AudioFormat) -> Self {
        Self { input, out_format }
    }

    /// The wrapped input source
    pub fn input(&self) -> &Arc<dyn AudioSource> {
        &self.input
    }
}

impl AudioSource for TranscodingSource {
    fn connect(&self) -> Result<()> {
        self.input.connect()
    }

    fn disconnect(&self) {
        self.input.disconnect();
    }

    fn start(&self) -> Result<()> {
        self.input.start()
    }

    fn stop(&self) -> Result<()> {
        self.input.stop()
    }

    fn format(&self) -> AudioFormat {
        self.out_format
    }

    fn set_preferred_format(&self, _format: &AudioFormat) -> bool {
        // The adapter exists to hit the target format
        true
    }

    fn streams(&self) -> Vec<Arc<dyn SourceStream>> {
        self.input
            .streams()
            .into_iter()
            .map(|stream| {
                Arc::new(TranscodingStream {
                    input: stream,
                    out_format: self.out_format,
                }) as Arc<dyn SourceStream>
            })
            .collect()
    }
}

/// Stream facet of [`TranscodingSource`]
struct TranscodingStream {
    input: Arc<dyn SourceStream>,
    out_format: AudioFormat,
}

impl SourceStream for TranscodingStream {
    fn format(&self) -> AudioFormat {
        self.out_format
    }

    fn read(&self, samples: &mut Vec<i32>) -> Result<usize> {
        let mut raw = Vec::new();
        self.input.read(&mut raw)?;

        let in_format = self.input.format();
        let converted = convert(&raw, &in_format, &self.out_format);

        samples.clear();
        samples.extend_from_slice(&converted);
        Ok(samples.len())
    }

    fn set_transfer_handler(&self, handler: Option<TransferHandler>) {
        self.input.set_transfer_handler(handler);
    }
}

/// Convert samples between linear PCM layouts
fn convert(samples: &[i32], from: &AudioFormat, to: &AudioFormat) -> Vec<i32> {
    let mut out = decode(samples, from);

    if from.channels == 2 && to.channels == 1 {
        out = fold_stereo(&out);
    }

    if from.sample_rate != to.sample_rate && from.sample_rate > 0 {
        out = resample(&out, from.sample_rate, to.sample_rate);
    }

    if from.sample_size_bits != to.sample_size_bits {
        out = rescale_bits(&out, from.sample_size_bits, to.sample_size_bits);
    }

    out
}

/// Decode companded encodings to linear; linear passes through
fn decode(samples: &[i32], format: &AudioFormat) -> Vec<i32> {
    match format.encoding {
        AudioEncoding::LinearPcm => samples.to_vec(),
        AudioEncoding::Ulaw => samples.iter().map(|&s| ulaw_to_linear(s as u8)).collect(),
        AudioEncoding::Alaw => samples.iter().map(|&s| alaw_to_linear(s as u8)).collect(),
    }
}

fn fold_stereo(samples: &[i32]) -> Vec<i32> {
    samples
        .chunks(2)
        .map(|pair| {
            if pair.len() == 2 {
                (pair[0] + pair[1]) / 2
            } else {
                pair[0]
            }
        })
        .collect()
}

/// Nearest-sample rate conversion
fn resample(samples: &[i32], from_rate: u32, to_rate: u32) -> Vec<i32> {
    let out_len = (samples.len() as u64 * to_rate as u64 / from_rate as u64) as usize;
    (0..out_len)
        .map(|i| {
            let src = (i as u64 * from_rate as u64 / to_rate as u64) as usize;
            samples[src.min(samples.len() - 1)]
        })
        .collect()
}

fn rescale_bits(samples: &[i32], from_bits: u16, to_bits: u16) -> Vec<i32> {
    if from_bits < to_bits {
        let shift = to_bits - from_bits;
        samples.iter().map(|&s| s << shift).collect()
    } else {
        let shift = from_bits - to_bits;
        samples.iter().map(|&s| s >> shift).collect()
    }
}

/// G.711 mu-law expansion (ITU-T G.711)
fn ulaw_to_linear(value: u8) -> i32 {
    let value = !value;
    let sign = (value & 0x80) != 0;
    let exponent = ((value >> 4) & 0x07) as i32;
    let mantissa = (value & 0x0F) as i32;

    let magnitude = (((mantissa << 3) + 0x84) << exponent) - 0x84;
    if sign {
        -magnitude
    } else {
        magnitude
    }
}

/// G.711 A-law expansion (ITU-T G.711)
fn alaw_to_linear(value: u8) -> i32 {
    let value = value ^ 0x55;
    let sign = (value & 0x80) != 0;
    let exponent = ((value >> 4) & 0x07) as i32;
    let mantissa = (value & 0x0F) as i32;

    let magnitude = if exponent == 0 {
        (mantissa << 4) + 8
    } else {
        ((mantissa << 4) + 0x108) << (exponent - 1)
    };
    if sign {
        -magnitude
    } else {
        magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_doubles_length() {
        let samples = vec![1, 2, 3, 4];
        let out = resample(&samples, 8000, 16_000);
        assert_eq!(out.len(), 8);
        assert_eq!(out[0], 1);
        assert_eq!(out[7], 4);
    }

    #[test]
    fn test_rescale_widens_and_narrows() {
        assert_eq!(rescale_bits(&[100], 8, 16), vec![100 << 8]);
        assert_eq!(rescale_bits(&[100 << 8], 16, 8), vec![100]);
    }

    #[test]
    fn test_fold_stereo_averages_pairs() {
        assert_eq!(fold_stereo(&[10, 20, 30, 50]), vec![15, 40]);
    }

    #[test]
    fn test_ulaw_zero_is_near_silence() {
        // 0xFF encodes the smallest magnitude
        assert_eq!(ulaw_to_linear(0xFF), 0);
        assert!(ulaw_to_linear(0x7F) < 0 || ulaw_to_linear(0x7F) == 0);
    }
}
