//! Crosstalk media core
//!
//! The audio mixing engine of the crosstalk media stack: a dynamic
//! fan-in/fan-out graph that registers heterogeneous audio input sources,
//! negotiates a common linear PCM format (transcoding inputs that can't
//! deliver it natively), and produces per-consumer mixed output streams
//! with overflow-safe sample blending.

pub mod error;
pub mod format;
pub mod mixer;
pub mod source;

pub use error::Error;
pub use format::{AudioEncoding, AudioFormat, Endian};
pub use mixer::{AudioMixer, MediaBuffer, MixOutputStream};
pub use source::{AudioSource, SourceStream};

/// Result type for media-core operations
pub type Result<T> = std::result::Result<T, Error>;
