//! Error types for the media core

use thiserror::Error;

/// Errors produced by the audio mixing engine
#[derive(Error, Debug)]
pub enum Error {
    /// The same input source was registered twice
    #[error("duplicate input source")]
    DuplicateSource,

    /// An input source failed to connect
    #[error("failed to connect input source: {0}")]
    Connect(String),

    /// An input source failed to start or stop
    #[error("failed to control input source: {0}")]
    SourceControl(String),

    /// Sample format the mixing or serialization path can't handle
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Reading an input stream failed
    #[error("stream read failed: {0}")]
    StreamRead(String),
}
