//! DTLS-SRTP control plane
//!
//! Certificate lifecycle and caching, RFC 4572 fingerprint verification,
//! SRTP protection-profile negotiation over the `use_srtp` extension
//! (RFC 5764), and the client/server handshake role endpoints that install
//! the derived SRTP transform on completion (RFC 5763).
//!
//! The DTLS record layer itself is an external collaborator: the role
//! endpoints here consume parsed extension data, peer certificates and
//! exporter bytes, and expose the negotiation and verification decisions.

pub mod algorithms;
pub mod cert;
pub mod client;
pub mod control;
pub mod extension;
pub mod properties;
pub mod server;
pub mod srtp;

pub use algorithms::{HashFunction, SignatureAlgorithm};
pub use cert::{CertificateCache, CertificateConfig, CertificateInfo, CERT_CACHE_EXPIRE_TIME};
pub use client::TlsClient;
pub use control::DtlsControl;
pub use extension::{SrtpProtectionProfile, UseSrtpExtension};
pub use properties::{MediaType, Properties, Setup};
pub use server::TlsServer;
pub use srtp::{SrtpKeyMaterial, SrtpTransformer, TransformerSlot};

/// Progress of a handshake role endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Endpoint created, nothing exchanged
    New,

    /// use_srtp extensions exchanged and validated
    ExtensionsExchanged,

    /// Peer certificate verified against the signaled fingerprints
    CertificateVerified,

    /// Handshake finished; SRTP transform installed when enabled
    Complete,

    /// A fatal negotiation or verification error occurred
    Failed,
}
