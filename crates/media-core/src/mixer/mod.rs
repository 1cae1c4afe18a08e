//! Audio mixing engine
//!
//! [`AudioMixer`] registers audio input sources into a shared graph,
//! negotiates a common linear PCM output format across them (creating
//! transcoding adapters for inputs that can't comply), and produces a
//! mixed output stream. Membership, connect/start reference counts and
//! renegotiation are all serialized under one topology lock; the output
//! stream's sample handoff and the background transcoder connects
//! deliberately stay off that lock.

pub mod source_desc;
pub mod stream;
pub mod transcoding;

pub use source_desc::{InSourceDesc, OutputId, SourceKey};
pub use stream::{MediaBuffer, MixOutputStream};
pub use transcoding::TranscodingSource;

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::error::Error;
use crate::format::AudioFormat;
use crate::source::{AudioSource, SourceStream};
use crate::Result;

/// Identifier of the mixer's default output stream
pub const DEFAULT_OUTPUT: OutputId = 0;

struct MixerInner {
    /// Registry of input descriptors keyed by their stable handle
    sources: BTreeMap<SourceKey, Arc<InSourceDesc>>,
    next_key: SourceKey,

    /// Reference count of connect() calls
    connected: usize,

    /// Reference count of started outputs
    started: usize,

    /// Monotonic generation counter handed to the output stream
    generation: u64,

    /// Highest start/stop generation already processed
    last_generation: u64,

    out_stream: Option<Arc<MixOutputStream>>,
}

/// Fan-in/fan-out audio mixing graph
pub struct AudioMixer {
    inner: Mutex<MixerInner>,

    /// Completion channel for background transcoder connects
    completions: mpsc::UnboundedSender<SourceKey>,
}

impl AudioMixer {
    /// Create a mixer and spawn its completion pump.
    ///
    /// Must be called within a tokio runtime; background transcoder
    /// connects and their completion delivery run on it.
    pub fn new() -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mixer = Arc::new(Self {
            inner: Mutex::new(MixerInner {
                sources: BTreeMap::new(),
                next_key: 1,
                connected: 0,
                started: 0,
                generation: 0,
                last_generation: 0,
                out_stream: None,
            }),
            completions: tx,
        });

        // Completion events funnel into the same topology-mutation path
        // the public API uses, keeping all membership changes serialized
        let weak = Arc::downgrade(&mixer);
        tokio::spawn(async move {
            let mut rx = rx;
            while let Some(key) = rx.recv().await {
                match weak.upgrade() {
                    Some(mixer) => mixer.source_connected(key),
                    None => break,
                }
            }
        });

        mixer
    }

    /// Register an input source, optionally excluding its contribution
    /// from one output.
    ///
    /// Registering the same source instance twice is an error. When the
    /// mixer is already connected/started the new source is brought to
    /// the same state immediately, and an existing output renegotiates.
    pub fn add_in_source(
        &self,
        source: Arc<dyn AudioSource>,
        excluded_output: Option<OutputId>,
    ) -> Result<SourceKey> {
        let (desc, was_connected, was_started, has_out) = {
            let mut inner = self.inner.lock();

            if inner
                .sources
                .values()
                .any(|existing| Arc::ptr_eq(&existing.source, &source))
            {
                return Err(Error::DuplicateSource);
            }

            let key = inner.next_key;
            inner.next_key += 1;

            let desc = Arc::new(InSourceDesc::new(key, source, excluded_output));
            inner.sources.insert(key, Arc::clone(&desc));

            (
                desc,
                inner.connected > 0,
                inner.started > 0,
                inner.out_stream.is_some(),
            )
        };

        if was_connected {
            desc.connect(&self.completions)?;
        }
        if was_started {
            if let Some(source) = desc.effective_source() {
                source
                    .start()
                    .map_err(|e| Error::SourceControl(e.to_string()))?;
            }
        }
        if has_out {
            self.renegotiate();
        }

        Ok(desc.key)
    }

    /// Remove input sources by handle, disconnecting them
    pub fn remove_in_sources(&self, keys: &[SourceKey]) {
        let (removed, has_out) = {
            let mut inner = self.inner.lock();
            let removed: Vec<_> = keys.iter().filter_map(|key| inner.sources.remove(key)).collect();
            (removed, inner.out_stream.is_some())
        };

        for desc in &removed {
            desc.disconnect();
        }
        if has_out && !removed.is_empty() {
            self.renegotiate();
        }
    }

    /// Connect the mixer, reference-counted.
    ///
    /// The first connect connects every registered input; the first
    /// failure aborts and propagates.
    pub fn connect(&self) -> Result<()> {
        let to_connect = {
            let mut inner = self.inner.lock();
            inner.connected += 1;
            if inner.connected > 1 {
                return Ok(());
            }
            inner.sources.values().cloned().collect::<Vec<_>>()
        };

        for desc in &to_connect {
            if let Err(e) = desc.connect(&self.completions) {
                error!(key = desc.key, error = %e, "input source failed to connect");
                self.inner.lock().connected -= 1;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Disconnect the mixer, reference-counted.
    ///
    /// When the count reaches zero all inputs disconnect and the output
    /// stream's retained inputs are cleared, releasing any consumer
    /// blocked on cached streams.
    pub fn disconnect(&self) {
        let released = {
            let mut inner = self.inner.lock();
            if inner.connected == 0 {
                return;
            }
            inner.connected -= 1;
            if inner.connected > 0 {
                return;
            }
            (
                inner.sources.values().cloned().collect::<Vec<_>>(),
                inner.out_stream.clone(),
            )
        };

        for desc in &released.0 {
            desc.disconnect();
        }
        if let Some(out) = released.1 {
            out.clear_inputs();
        }
    }

    /// The mixer's output stream, created on first call.
    ///
    /// Every call renegotiates the output format and the set of input
    /// streams feeding the mix.
    pub fn get_out_stream(self: &Arc<Self>) -> Arc<MixOutputStream> {
        let stream = {
            let mut inner = self.inner.lock();
            match &inner.out_stream {
                Some(stream) => Arc::clone(stream),
                None => {
                    let stream = Arc::new(MixOutputStream::new(
                        DEFAULT_OUTPUT,
                        Arc::downgrade(self),
                        AudioFormat::default_mix_format(),
                    ));
                    inner.out_stream = Some(Arc::clone(&stream));
                    stream
                }
            }
        };

        self.renegotiate();
        stream
    }

    /// Hand a push cycle's per-input samples to the output stream.
    ///
    /// Inputs are ordered by registry key so the order-sensitive mix
    /// arithmetic is reproducible, and inputs excluded from the output
    /// contribute `None`.
    pub fn deliver_samples(
        &self,
        mut samples: Vec<(SourceKey, Vec<i32>)>,
        sample_count: usize,
        timestamp_us: u64,
    ) {
        let (out, exclusions) = {
            let inner = self.inner.lock();
            let Some(out) = inner.out_stream.clone() else {
                return;
            };
            let exclusions: BTreeMap<SourceKey, Option<OutputId>> = inner
                .sources
                .iter()
                .map(|(key, desc)| (*key, desc.out_exclusion))
                .collect();
            (out, exclusions)
        };

        samples.sort_by_key(|(key, _)| *key);

        let sets = samples
            .into_iter()
            .map(|(key, set)| {
                if exclusions.get(&key).copied().flatten() == Some(out.id()) {
                    None
                } else {
                    Some(set)
                }
            })
            .collect();

        out.push(sets, sample_count, timestamp_us);
    }

    /// Claim the next start/stop generation; bumped strictly under the
    /// topology lock
    pub(crate) fn next_generation(&self) -> u64 {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        inner.generation
    }

    /// Start the inputs on behalf of an output stream.
    ///
    /// Only the current output is honored, and a generation not strictly
    /// greater than the last processed one is a no-op — that's what lets
    /// the output stream call in from outside its own lock without
    /// double-starting under races. The side-effecting start calls run
    /// after the topology lock is released.
    pub(crate) fn start(&self, out_id: OutputId, generation: u64) -> Result<()> {
        let to_start = {
            let mut inner = self.inner.lock();
            if inner.out_stream.as_ref().map(|o| o.id()) != Some(out_id) {
                return Ok(());
            }
            if generation <= inner.last_generation {
                return Ok(());
            }
            inner.last_generation = generation;

            inner.started += 1;
            if inner.started > 1 {
                return Ok(());
            }
            inner.sources.values().cloned().collect::<Vec<_>>()
        };

        for desc in &to_start {
            if let Some(source) = desc.effective_source() {
                source
                    .start()
                    .map_err(|e| Error::SourceControl(e.to_string()))?;
            }
        }
        Ok(())
    }

    /// Stop the inputs on behalf of an output stream; same generation
    /// and current-output rules as [`start`](Self::start)
    pub(crate) fn stop(&self, out_id: OutputId, generation: u64) -> Result<()> {
        let to_stop = {
            let mut inner = self.inner.lock();
            if inner.out_stream.as_ref().map(|o| o.id()) != Some(out_id) {
                return Ok(());
            }
            if generation <= inner.last_generation {
                return Ok(());
            }
            inner.last_generation = generation;

            if inner.started == 0 {
                return Ok(());
            }
            inner.started -= 1;
            if inner.started > 0 {
                return Ok(());
            }
            inner.sources.values().cloned().collect::<Vec<_>>()
        };

        for desc in &to_stop {
            if let Some(source) = desc.effective_source() {
                source
                    .stop()
                    .map_err(|e| Error::SourceControl(e.to_string()))?;
            }
        }
        Ok(())
    }

    /// Completion-pump entry: a background transcoder finished
    /// connecting. Re-runs stream discovery and, when the mixer is
    /// started, starts the source; errors here are logged only since no
    /// caller is waiting.
    fn source_connected(&self, key: SourceKey) {
        let (desc, started, has_out) = {
            let inner = self.inner.lock();
            (
                inner.sources.get(&key).cloned(),
                inner.started > 0,
                inner.out_stream.is_some(),
            )
        };

        let Some(desc) = desc else {
            return;
        };

        debug!(key, "transcoding source connected");

        if has_out {
            self.renegotiate();
        }
        if started {
            if let Some(source) = desc.effective_source() {
                if let Err(e) = source.start() {
                    warn!(key, error = %e, "failed to start late-connected source");
                }
            }
        }
    }

    /// Renegotiate the output format and rebuild the output's input set.
    ///
    /// Format selection scans connected inputs for one already producing
    /// signed little-endian linear PCM and falls back to the 8 kHz mono
    /// default. Inputs that refuse the preferred format are kept and
    /// matched by encoding name; an input with no matching stream gets a
    /// transcoding adapter and joins the mix once it connects.
    fn renegotiate(&self) {
        let (descs, out) = {
            let inner = self.inner.lock();
            (
                inner.sources.values().cloned().collect::<Vec<_>>(),
                inner.out_stream.clone(),
            )
        };
        let Some(out) = out else {
            return;
        };

        let out_format = descs
            .iter()
            .filter_map(|desc| desc.effective_source())
            .map(|source| source.format())
            .find(AudioFormat::is_mixer_native)
            .unwrap_or_else(AudioFormat::default_mix_format);

        for desc in &descs {
            if let Some(source) = desc.effective_source() {
                if !source.set_preferred_format(&out_format) {
                    debug!(key = desc.key, "input kept its native format");
                }
            }
        }

        let mut in_streams: Vec<(SourceKey, Arc<dyn SourceStream>)> = Vec::new();
        for desc in &descs {
            let streams = matching_streams(desc, &out_format);
            if !streams.is_empty() {
                in_streams.extend(streams.into_iter().map(|s| (desc.key, s)));
                continue;
            }

            // No native match: transcode towards the output format and
            // retry once (an adapter still connecting joins later via
            // the completion pump)
            if desc.create_transcoding_source(out_format) {
                if let Err(e) = desc.connect(&self.completions) {
                    warn!(key = desc.key, error = %e, "transcoding source connect failed");
                }
            }
            let streams = matching_streams(desc, &out_format);
            in_streams.extend(streams.into_iter().map(|s| (desc.key, s)));
        }

        out.set_format(out_format);
        out.set_inputs(in_streams);
    }
}

/// Streams of the descriptor's effective source matching the output
/// format by encoding name
fn matching_streams(desc: &InSourceDesc, out_format: &AudioFormat) -> Vec<Arc<dyn SourceStream>> {
    match desc.effective_source() {
        Some(source) => source
            .streams()
            .into_iter()
            .filter(|stream| stream.format().matches_encoding(out_format))
            .collect(),
        None => Vec::new(),
    }
}
