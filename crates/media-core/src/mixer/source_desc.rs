//! Per-input bookkeeping for the mixer
//!
//! Each registered input source gets a descriptor tracking its connection
//! state, its optional per-output exclusion, and the transcoding adapter
//! created when the source can't deliver the mixer's target format
//! natively. Transcoding adapters connect on a background task so a slow
//! transcoder setup never stalls the mixer; completion is reported back
//! through the mixer's completion channel.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::warn;

use super::transcoding::TranscodingSource;
use crate::format::AudioFormat;
use crate::source::AudioSource;
use crate::Result;

/// Stable handle of a registered input source
pub type SourceKey = u64;

/// Identifier of a mixer output stream
pub type OutputId = u64;

struct DescState {
    transcoding: Option<Arc<TranscodingSource>>,
    connected: bool,
    connect_task: Option<tokio::task::JoinHandle<()>>,
}

/// Descriptor of one input source registered with the mixer
pub struct InSourceDesc {
    /// Registry handle, assigned at registration and never reused
    pub key: SourceKey,

    /// The raw input source
    pub source: Arc<dyn AudioSource>,

    /// Output stream that must exclude this input's contribution
    pub out_exclusion: Option<OutputId>,

    state: Mutex<DescState>,
}

impl InSourceDesc {
    /// Create a descriptor for a registered source
    pub fn new(
        key: SourceKey,
        source: Arc<dyn AudioSource>,
        out_exclusion: Option<OutputId>,
    ) -> Self {
        Self {
            key,
            source,
            out_exclusion,
            state: Mutex::new(DescState {
                transcoding: None,
                connected: false,
                connect_task: None,
            }),
        }
    }

    /// Whether the effective source finished connecting
    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    /// Create the transcoding adapter towards `out_format`.
    ///
    /// Idempotent: returns `false` when an adapter already exists.
    /// Creating one resets the connected flag until the adapter is
    /// (re)connected.
    pub fn create_transcoding_source(&self, out_format: AudioFormat) -> bool {
        let mut state = self.state.lock();
        if state.transcoding.is_some() {
            return false;
        }
        state.transcoding = Some(Arc::new(TranscodingSource::new(
            Arc::clone(&self.source),
            out_format,
        )));
        state.connected = false;
        true
    }

    /// The source the mixer should actually read.
    ///
    /// With a transcoding adapter present, the adapter — but only once
    /// connected; until then `None`, meaning "temporarily unavailable",
    /// which callers treat as skip-for-now rather than an error. Without
    /// an adapter, the raw input.
    pub fn effective_source(&self) -> Option<Arc<dyn AudioSource>> {
        let state = self.state.lock();
        match &state.transcoding {
            Some(transcoding) => {
                if state.connected {
                    Some(Arc::clone(transcoding) as Arc<dyn AudioSource>)
                } else {
                    None
                }
            }
            None => Some(Arc::clone(&self.source)),
        }
    }

    /// Connect the effective source.
    ///
    /// A transcoding adapter connects on a background task and reports
    /// completion through `completions`; the call returns immediately.
    /// Background failures are logged only, since no caller waits on
    /// them. A plain source connects inline, propagating its error.
    pub fn connect(
        self: &Arc<Self>,
        completions: &mpsc::UnboundedSender<SourceKey>,
    ) -> Result<()> {
        let mut state = self.state.lock();
        if state.connected {
            return Ok(());
        }

        match state.transcoding.clone() {
            Some(transcoding) => {
                let desc = Arc::clone(self);
                let completions = completions.clone();
                state.connect_task = Some(tokio::task::spawn_blocking(move || {
                    match transcoding.connect() {
                        Ok(()) => {
                            desc.state.lock().connected = true;
                            let _ = completions.send(desc.key);
                        }
                        Err(e) => {
                            warn!(key = desc.key, error = %e, "transcoding source failed to connect");
                        }
                    }
                }));
                Ok(())
            }
            None => {
                self.source.connect()?;
                state.connected = true;
                Ok(())
            }
        }
    }

    /// Disconnect the effective source and abort any pending connect
    pub fn disconnect(&self) {
        let (transcoding, task) = {
            let mut state = self.state.lock();
            state.connected = false;
            (state.transcoding.clone(), state.connect_task.take())
        };

        if let Some(task) = task {
            task.abort();
        }

        match transcoding {
            Some(transcoding) => transcoding.disconnect(),
            None => self.source.disconnect(),
        }
    }
}
