//! Crosstalk RTP core
//!
//! Real-time transport control for the crosstalk media engine: the RTCP
//! packet model and streaming parser (RFC 3550/3611/4585), burst-loss
//! metrics (RFC 3611 Appendix A.2), and the DTLS-SRTP control plane
//! (RFC 4572/5763/5764).

pub mod config;
pub mod dtls;
pub mod error;
pub mod packet;
pub mod stats;

pub use error::Error;

/// Result type for rtp-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// RTP synchronization source identifier
pub type RtpSsrc = u32;
