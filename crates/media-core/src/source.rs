//! Audio source collaborator interface
//!
//! Capture devices, file readers and network receivers plug into the
//! mixer through these traits: a connect/start/stop lifecycle, a
//! queryable format, and streams delivering samples either by pull
//! (`read`) or by push (a data-ready transfer handler).

use std::sync::Arc;

use crate::format::AudioFormat;
use crate::Result;

/// Callback invoked by push-style streams when data is ready
pub type TransferHandler = Box<dyn Fn() + Send + Sync>;

/// An audio-producing collaborator
pub trait AudioSource: Send + Sync {
    /// Open the source's resources
    fn connect(&self) -> Result<()>;

    /// Release the source's resources
    fn disconnect(&self);

    /// Begin producing data
    fn start(&self) -> Result<()>;

    /// Stop producing data
    fn stop(&self) -> Result<()>;

    /// The source's output format
    fn format(&self) -> AudioFormat;

    /// Ask the source to produce `format` instead of its native format.
    ///
    /// Sources may refuse; a refusal is not fatal to negotiation.
    fn set_preferred_format(&self, _format: &AudioFormat) -> bool {
        false
    }

    /// The source's streams
    fn streams(&self) -> Vec<Arc<dyn SourceStream>>;
}

/// One stream of an audio source
pub trait SourceStream: Send + Sync {
    /// The stream's sample format
    fn format(&self) -> AudioFormat;

    /// Pull available samples into `samples`, returning how many were
    /// produced. Samples are widened to `i32` regardless of bit depth.
    fn read(&self, samples: &mut Vec<i32>) -> Result<usize>;

    /// Register or clear a data-ready callback for push-style delivery.
    ///
    /// Pull-only streams keep the default no-op.
    fn set_transfer_handler(&self, _handler: Option<TransferHandler>) {}
}
