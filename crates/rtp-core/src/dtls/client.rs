//! DTLS client role endpoint
//!
//! Drives the client side of the DTLS-SRTP negotiation on top of an
//! external DTLS engine: offers the use_srtp extension, validates the
//! server's answer (a wrong profile or MKI is a downgrade attempt and
//! always fatal), verifies the server certificate through the control
//! object, and installs the derived SRTP transform once the handshake
//! completes.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use super::algorithms::{signature_and_hash_from_oid, HashFunction, SignatureAlgorithm};
use super::control::{DtlsControl, SRTP_PROTECTION_PROFILES};
use super::extension::{SrtpProtectionProfile, UseSrtpExtension};
use super::srtp::{SrtpKeyMaterial, SrtpTransformer, TransformerSlot};
use super::HandshakeState;
use crate::error::Error;
use crate::Result;
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;

/// Client side of the DTLS-SRTP handshake
pub struct TlsClient {
    control: Arc<DtlsControl>,
    transformer_slot: TransformerSlot,
    state: HandshakeState,

    /// MKI offered in our client hello; the server must echo it exactly
    offered_mki: Bytes,

    chosen_profile: Option<SrtpProtectionProfile>,
}

impl TlsClient {
    /// Create a client endpoint installing into `transformer_slot`
    pub fn new(control: Arc<DtlsControl>, transformer_slot: TransformerSlot) -> Self {
        Self {
            control,
            transformer_slot,
            state: HandshakeState::New,
            offered_mki: Bytes::new(),
            chosen_profile: None,
        }
    }

    /// Current handshake state
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// The use_srtp extension for our client hello, or `None` when SRTP
    /// is disabled for the session
    pub fn client_hello_use_srtp(&self) -> Option<UseSrtpExtension> {
        if self.control.properties().is_srtp_disabled() {
            return None;
        }
        Some(UseSrtpExtension {
            profiles: SRTP_PROTECTION_PROFILES.to_vec(),
            mki: self.offered_mki.clone(),
        })
    }

    /// Validate the server hello's use_srtp answer
    pub fn process_server_extensions(
        &mut self,
        use_srtp: Option<&UseSrtpExtension>,
    ) -> Result<()> {
        if self.control.properties().is_srtp_disabled() {
            self.state = HandshakeState::ExtensionsExchanged;
            return Ok(());
        }

        let ext = match use_srtp {
            Some(ext) => ext,
            None => {
                self.state = HandshakeState::Failed;
                return Err(Error::SrtpNegotiation(
                    "Server didn't include the use_srtp extension".to_string(),
                ));
            }
        };

        // The server must answer with exactly one of the offered profiles
        if ext.profiles.len() != 1 {
            self.state = HandshakeState::Failed;
            return Err(Error::SrtpNegotiation(format!(
                "Server answered with {} protection profiles instead of one",
                ext.profiles.len()
            )));
        }
        let profile = ext.profiles[0];
        if !SRTP_PROTECTION_PROFILES.contains(&profile) {
            self.state = HandshakeState::Failed;
            return Err(Error::SrtpNegotiation(format!(
                "Server chose unoffered protection profile {:?}",
                profile
            )));
        }

        // An altered MKI is a downgrade attempt
        if ext.mki != self.offered_mki {
            self.state = HandshakeState::Failed;
            return Err(Error::SrtpNegotiation(
                "Server MKI doesn't match the offered MKI".to_string(),
            ));
        }

        debug!(profile = ?profile, "server accepted use_srtp");
        self.chosen_profile = Some(profile);
        self.state = HandshakeState::ExtensionsExchanged;
        Ok(())
    }

    /// Verify the server certificate against the signaled fingerprints
    pub fn process_server_certificate(&mut self, certificate_der: &[u8]) -> Result<()> {
        match self.control.verify_and_validate_certificate(certificate_der) {
            Ok(()) => {
                self.state = HandshakeState::CertificateVerified;
                Ok(())
            }
            Err(e) => {
                self.state = HandshakeState::Failed;
                Err(e)
            }
        }
    }

    /// Signature-and-hash pair for our certificate-verify message,
    /// selected from the local certificate's actual signing algorithm
    pub fn signature_and_hash_algorithm(&self) -> Result<(SignatureAlgorithm, HashFunction)> {
        local_signature_and_hash(&self.control)
    }

    /// Called when the DTLS engine reports handshake completion.
    ///
    /// With SRTP enabled, derives the key material from the exporter
    /// bytes and installs the transformer; installation synchronizes on
    /// the shared slot. With SRTP disabled this is a pure-DTLS no-op.
    pub fn handshake_complete(&mut self, exporter: &[u8]) -> Result<()> {
        if self.control.properties().is_srtp_disabled() {
            self.state = HandshakeState::Complete;
            return Ok(());
        }

        let profile = self.chosen_profile.ok_or_else(|| {
            Error::Handshake("Handshake completed before use_srtp negotiation".to_string())
        })?;

        let material = SrtpKeyMaterial::derive(profile, exporter)?;
        {
            let mut slot = self.transformer_slot.lock();
            *slot = Some(SrtpTransformer::new(material));
        }

        self.state = HandshakeState::Complete;
        Ok(())
    }
}

/// Resolve the (signature, hash) pair of the local certificate by its OID
pub(super) fn local_signature_and_hash(
    control: &DtlsControl,
) -> Result<(SignatureAlgorithm, HashFunction)> {
    let der = control.certificate().certificate_der();
    let (_, x509) = X509Certificate::from_der(der)
        .map_err(|e| Error::Certificate(format!("Local certificate unparsable: {}", e)))?;
    signature_and_hash_from_oid(&x509.signature_algorithm.algorithm.to_id_string())
}
