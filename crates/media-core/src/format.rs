//! Audio format model

use crate::error::Error;
use crate::Result;

/// Audio sample encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEncoding {
    /// Linear PCM
    LinearPcm,

    /// G.711 mu-law
    Ulaw,

    /// G.711 A-law
    Alaw,
}

/// Sample byte order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    /// Little-endian
    Little,

    /// Big-endian
    Big,
}

/// Description of an audio stream's sample layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// Sample encoding
    pub encoding: AudioEncoding,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Bits per sample
    pub sample_size_bits: u16,

    /// Channel count
    pub channels: u8,

    /// Whether samples are signed
    pub signed: bool,

    /// Byte order of multi-byte samples
    pub endian: Endian,
}

impl AudioFormat {
    /// The fallback mixing format: 8 kHz, 16-bit, mono, signed,
    /// little-endian linear PCM
    pub fn default_mix_format() -> Self {
        Self {
            encoding: AudioEncoding::LinearPcm,
            sample_rate: 8000,
            sample_size_bits: 16,
            channels: 1,
            signed: true,
            endian: Endian::Little,
        }
    }

    /// Encoding-name match, deliberately weaker than full equality:
    /// sample rate and size differences are tolerated and handled by
    /// padding/transcoding downstream
    pub fn matches_encoding(&self, other: &AudioFormat) -> bool {
        self.encoding == other.encoding
    }

    /// Whether the format is something the mixer can blend directly
    pub fn is_mixer_native(&self) -> bool {
        self.encoding == AudioEncoding::LinearPcm && self.signed && self.endian == Endian::Little
    }

    /// Maximum representable sample magnitude for the bit depth.
    ///
    /// 24-bit audio is not supported by the blending arithmetic.
    pub fn max_sample_value(&self) -> Result<f64> {
        match self.sample_size_bits {
            8 => Ok(i8::MAX as f64),
            16 => Ok(i16::MAX as f64),
            32 => Ok(i32::MAX as f64),
            bits => Err(Error::UnsupportedFormat(format!(
                "{}-bit samples can't be mixed",
                bits
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_match_ignores_rate_and_size() {
        let a = AudioFormat::default_mix_format();
        let b = AudioFormat {
            sample_rate: 48_000,
            sample_size_bits: 32,
            ..a
        };
        assert!(a.matches_encoding(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_max_sample_value() {
        let mut format = AudioFormat::default_mix_format();
        assert_eq!(format.max_sample_value().unwrap(), 32767.0);

        format.sample_size_bits = 24;
        assert!(matches!(
            format.max_sample_value(),
            Err(Error::UnsupportedFormat(_))
        ));
    }
}
