//! Error types for the RTP core

use thiserror::Error;

/// Errors produced by the RTCP codec, statistics and DTLS-SRTP layers
#[derive(Error, Debug)]
pub enum Error {
    /// Buffer doesn't contain enough data
    #[error("Buffer too small: required {required} bytes, available {available}")]
    BufferTooSmall {
        /// Bytes required by the operation
        required: usize,
        /// Bytes actually available
        available: usize,
    },

    /// RTCP version bits were not 2
    #[error("Invalid RTCP version: {0}")]
    BadVersion(u8),

    /// Structurally invalid RTCP packet
    #[error("Malformed RTCP packet: {0}")]
    BadFormat(String),

    /// RTCP payload type not recognized by the parser or its extension hook
    #[error("Unknown RTCP payload type: {0}")]
    UnknownPacketType(u8),

    /// General RTCP error
    #[error("RTCP error: {0}")]
    RtcpError(String),

    /// Certificate generation or parsing failed
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// Remote fingerprint map has no entry usable for the peer certificate
    #[error("No fingerprint declared for hash function {0}")]
    NoFingerprintDeclared(String),

    /// Computed fingerprint did not equal the signaled one
    #[error("Fingerprint verification failed: {0}")]
    FingerprintMismatch(String),

    /// Signature algorithm OID not in the supported RSA/ECDSA x SHA table
    #[error("Unsupported signature algorithm: {0}")]
    UnsupportedSignatureAlgorithm(String),

    /// use_srtp extension negotiation failed
    #[error("SRTP negotiation failed: {0}")]
    SrtpNegotiation(String),

    /// DTLS handshake failure outside SRTP negotiation
    #[error("DTLS handshake failed: {0}")]
    Handshake(String),

    /// Invalid tunable value
    #[error("Configuration error: {0}")]
    Configuration(String),
}
