//! Per-consumer mixed output stream
//!
//! The thin facet a consumer reads mixed audio from. Each push cycle the
//! aggregator hands over the latest per-input sample sets; `read` swaps
//! them out atomically (at most once per cycle), blends them with the
//! overflow-attenuating mix arithmetic, and serializes the result.
//!
//! The pending-sample handoff has its own lock, deliberately separate
//! from the mixer's topology lock, so a push thread never blocks on
//! membership changes.

use std::sync::{Arc, Weak};

use bytes::{BufMut, BytesMut};
use parking_lot::Mutex;

use super::source_desc::{OutputId, SourceKey};
use super::AudioMixer;
use crate::error::Error;
use crate::format::{AudioFormat, Endian};
use crate::source::SourceStream;
use crate::Result;

/// A buffer of serialized media handed to the consumer
#[derive(Debug, Default)]
pub struct MediaBuffer {
    /// Serialized sample bytes
    pub data: BytesMut,

    /// Capture timestamp of the samples, microseconds
    pub timestamp_us: Option<u64>,

    /// Set when there was nothing to deliver; `data` is empty
    pub discard: bool,
}

impl MediaBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }
}

/// One push cycle's worth of unmixed input samples
struct PendingSamples {
    /// Per-input sample sets in registry order; `None` marks an input
    /// excluded from (or silent in) this output
    in_samples: Vec<Option<Vec<i32>>>,

    /// Number of samples the mixed output must span
    sample_count: usize,

    timestamp_us: u64,
}

/// Mixed output stream of an [`AudioMixer`]
pub struct MixOutputStream {
    id: OutputId,
    mixer: Weak<AudioMixer>,

    format: Mutex<AudioFormat>,

    /// Input streams retained from the last renegotiation
    inputs: Mutex<Vec<(SourceKey, Arc<dyn SourceStream>)>>,

    /// The pending-sample handoff slot
    pending: Mutex<Option<PendingSamples>>,
}

impl MixOutputStream {
    pub(crate) fn new(id: OutputId, mixer: Weak<AudioMixer>, format: AudioFormat) -> Self {
        Self {
            id,
            mixer,
            format: Mutex::new(format),
            inputs: Mutex::new(Vec::new()),
            pending: Mutex::new(None),
        }
    }

    /// Identifier of this output
    pub fn id(&self) -> OutputId {
        self.id
    }

    /// The negotiated output format
    pub fn format(&self) -> AudioFormat {
        *self.format.lock()
    }

    pub(crate) fn set_format(&self, format: AudioFormat) {
        *self.format.lock() = format;
    }

    pub(crate) fn set_inputs(&self, inputs: Vec<(SourceKey, Arc<dyn SourceStream>)>) {
        *self.inputs.lock() = inputs;
    }

    /// Number of input streams currently feeding this output
    pub fn input_count(&self) -> usize {
        self.inputs.lock().len()
    }

    /// Drop retained inputs and any pending samples so a consumer blocked
    /// on this stream is released rather than left waiting
    pub(crate) fn clear_inputs(&self) {
        self.inputs.lock().clear();
        self.pending.lock().take();
    }

    /// Start the mixer through this output.
    ///
    /// The generation is claimed under the mixer lock; the side-effecting
    /// start happens after this stream's own locks are released, avoiding
    /// a lock-order inversion between stream and mixer.
    pub fn start(&self) -> Result<()> {
        let Some(mixer) = self.mixer.upgrade() else {
            return Ok(());
        };
        let generation = mixer.next_generation();
        mixer.start(self.id, generation)
    }

    /// Stop the mixer through this output; stale generations are no-ops
    pub fn stop(&self) -> Result<()> {
        let Some(mixer) = self.mixer.upgrade() else {
            return Ok(());
        };
        let generation = mixer.next_generation();
        mixer.stop(self.id, generation)
    }

    /// Replace the pending sample sets for the next `read`.
    ///
    /// Called once per push cycle by the aggregator; the previous cycle's
    /// samples, if unread, are dropped.
    pub fn push(
        &self,
        in_samples: Vec<Option<Vec<i32>>>,
        sample_count: usize,
        timestamp_us: u64,
    ) {
        *self.pending.lock() = Some(PendingSamples {
            in_samples,
            sample_count,
            timestamp_us,
        });
    }

    /// Mix and serialize the pending samples into `buffer`.
    ///
    /// At-most-once per push cycle: the pending set is taken under the
    /// handoff lock, so a second read before the next push finds nothing
    /// and flags the buffer as discarded. Serialization supports 16-bit
    /// little-endian output only.
    pub fn read(&self, buffer: &mut MediaBuffer) -> Result<()> {
        let pending = self.pending.lock().take();

        let Some(pending) = pending else {
            buffer.data.clear();
            buffer.discard = true;
            buffer.timestamp_us = None;
            return Ok(());
        };

        let format = self.format();
        let samples = mix(pending.in_samples, &format, pending.sample_count)?;

        if format.sample_size_bits != 16 || format.endian != Endian::Little {
            return Err(Error::UnsupportedFormat(format!(
                "can't serialize {}-bit {:?} output",
                format.sample_size_bits, format.endian
            )));
        }

        buffer.data.clear();
        buffer.data.reserve(samples.len() * 2);
        for sample in &samples {
            buffer.data.put_i16_le(*sample as i16);
        }
        buffer.timestamp_us = Some(pending.timestamp_us);
        buffer.discard = false;
        Ok(())
    }
}

/// Blend the contributing sample sets into one output of `out_count`
/// samples.
///
/// A single contributing set is passed through, zero-padded when shorter
/// than `out_count`. Otherwise each input is folded into the running
/// output with
/// `out[i] = in[i] + out[i] - round(in[i] * (out[i] / max))`,
/// which attenuates toward saturation instead of clipping. The division
/// term makes the fold order-dependent, so inputs must arrive in a
/// stable order; the result for a given order is a characterized
/// behavior, not an accident to correct.
pub(crate) fn mix(
    in_samples: Vec<Option<Vec<i32>>>,
    format: &AudioFormat,
    out_count: usize,
) -> Result<Vec<i32>> {
    let contributing = in_samples.iter().filter(|set| set.is_some()).count();

    if contributing == 1 {
        let mut samples = in_samples.into_iter().flatten().next().unwrap_or_default();
        if samples.len() < out_count {
            samples.resize(out_count, 0);
        }
        return Ok(samples);
    }

    let max = format.max_sample_value()?;
    let mut out = vec![0i32; out_count];

    for set in in_samples.iter().flatten() {
        let n = set.len().min(out_count);
        for i in 0..n {
            let in_sample = set[i] as f64;
            let out_sample = out[i] as f64;
            out[i] = (in_sample + out_sample - (in_sample * (out_sample / max)).round()) as i32;
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt() -> AudioFormat {
        AudioFormat::default_mix_format()
    }

    #[test]
    fn test_single_input_passthrough() {
        let input = vec![100, -200, 300];
        let out = mix(vec![Some(input.clone())], &fmt(), 3).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn test_single_input_zero_padded() {
        let out = mix(vec![Some(vec![5, 6]), None], &fmt(), 4).unwrap();
        assert_eq!(out, vec![5, 6, 0, 0]);
    }

    #[test]
    fn test_opposite_phase_never_wraps_i16() {
        for magnitude in [1i32, 1000, 20_000, i16::MAX as i32] {
            let a = vec![magnitude; 8];
            let b = vec![-magnitude; 8];
            let out = mix(vec![Some(a), Some(b)], &fmt(), 8).unwrap();
            for sample in out {
                assert!(sample >= i16::MIN as i32 && sample <= i16::MAX as i32);
            }
        }
    }

    #[test]
    fn test_mix_is_deterministic_for_a_fixed_order() {
        // The rounding inside the fold makes the result sensitive to the
        // order inputs arrive in, so the mixer feeds them in registry
        // order; the same order must reproduce the same samples
        let sets = vec![
            Some(vec![30_000, -12_345]),
            Some(vec![30_000, 23_456]),
            Some(vec![-30_000, 1]),
        ];

        let first = mix(sets.clone(), &fmt(), 2).unwrap();
        let second = mix(sets, &fmt(), 2).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_two_quiet_inputs_sum() {
        // Far from saturation the attenuation term rounds to zero
        let out = mix(vec![Some(vec![10]), Some(vec![20])], &fmt(), 1).unwrap();
        assert_eq!(out[0], 30);
    }

    #[test]
    fn test_24_bit_output_rejected() {
        let mut format = fmt();
        format.sample_size_bits = 24;
        let result = mix(vec![Some(vec![1]), Some(vec![2])], &format, 1);
        assert!(matches!(result, Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn test_no_contributions_is_silence() {
        let out = mix(vec![None, None], &fmt(), 4).unwrap();
        assert_eq!(out, vec![0, 0, 0, 0]);
    }
}
