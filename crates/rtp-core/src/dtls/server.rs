//! DTLS server role endpoint
//!
//! The server side of the DTLS-SRTP negotiation: requires the client's
//! use_srtp extension (when SRTP is enabled), picks a protection profile
//! from the intersection, echoes the client's MKI, verifies the client
//! certificate, and installs the derived SRTP transform on completion.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use super::algorithms::{HashFunction, SignatureAlgorithm};
use super::client::local_signature_and_hash;
use super::control::DtlsControl;
use super::extension::{SrtpProtectionProfile, UseSrtpExtension};
use super::srtp::{SrtpKeyMaterial, SrtpTransformer, TransformerSlot};
use super::HandshakeState;
use crate::error::Error;
use crate::Result;

/// Server side of the DTLS-SRTP handshake
pub struct TlsServer {
    control: Arc<DtlsControl>,
    transformer_slot: TransformerSlot,
    state: HandshakeState,

    chosen_profile: Option<SrtpProtectionProfile>,

    /// MKI received from the client, echoed in our server hello
    client_mki: Bytes,
}

impl TlsServer {
    /// Create a server endpoint installing into `transformer_slot`
    pub fn new(control: Arc<DtlsControl>, transformer_slot: TransformerSlot) -> Self {
        Self {
            control,
            transformer_slot,
            state: HandshakeState::New,
            chosen_profile: None,
            client_mki: Bytes::new(),
        }
    }

    /// Current handshake state
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Process the client hello's use_srtp offer, returning the answer to
    /// include in our server hello (`None` in pure-DTLS mode)
    pub fn process_client_extensions(
        &mut self,
        use_srtp: Option<&UseSrtpExtension>,
    ) -> Result<Option<UseSrtpExtension>> {
        if self.control.properties().is_srtp_disabled() {
            self.state = HandshakeState::ExtensionsExchanged;
            return Ok(None);
        }

        let ext = match use_srtp {
            Some(ext) => ext,
            None => {
                self.state = HandshakeState::Failed;
                return Err(Error::SrtpNegotiation(
                    "Client didn't offer the use_srtp extension".to_string(),
                ));
            }
        };

        let profile = match self.control.choose_srtp_protection_profile(&ext.profiles) {
            Some(profile) => profile,
            None => {
                self.state = HandshakeState::Failed;
                return Err(Error::SrtpNegotiation(format!(
                    "No common protection profile in client offer {:?}",
                    ext.profiles
                )));
            }
        };

        debug!(profile = ?profile, "chose SRTP protection profile");
        self.chosen_profile = Some(profile);
        self.client_mki = ext.mki.clone();
        self.state = HandshakeState::ExtensionsExchanged;

        Ok(Some(UseSrtpExtension {
            profiles: vec![profile],
            mki: self.client_mki.clone(),
        }))
    }

    /// Verify the client certificate against the signaled fingerprints
    pub fn process_client_certificate(&mut self, certificate_der: &[u8]) -> Result<()> {
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

    /// Signature-and-hash pair for the server key exchange / certificate
    /// messages, selected from the local certificate's signing algorithm
    pub fn signature_and_hash_algorithm(&self) -> Result<(SignatureAlgorithm, HashFunction)> {
        local_signature_and_hash(&self.control)
    }

    /// Called when the DTLS engine reports handshake completion; installs
    /// the SRTP transformer unless the session runs pure DTLS
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtls::cert::{CertificateCache, CertificateConfig};
    use crate::dtls::control::SRTP_PROTECTION_PROFILES;
    use crate::dtls::srtp::new_transformer_slot;

    fn test_control(srtp_disabled: bool) -> Arc<DtlsControl> {
        let cache = CertificateCache::with_default_ttl();
        let cert_config = CertificateConfig {
            signature_algorithm: "SHA256withECDSA".to_string(),
            ..CertificateConfig::default()
        };
        Arc::new(DtlsControl::with_options(&cache, &cert_config, true, srtp_disabled).unwrap())
    }

    #[test]
    fn test_chooses_by_local_preference_and_echoes_mki() {
        let mut server = TlsServer::new(test_control(false), new_transformer_slot());

        let offer = UseSrtpExtension {
            profiles: vec![
                SrtpProtectionProfile::Aes128CmSha1_32,
                SrtpProtectionProfile::Aes128CmSha1_80,
            ],
            mki: Bytes::from_static(&[7, 7, 7]),
        };

        let answer = server.process_client_extensions(Some(&offer)).unwrap().unwrap();
        assert_eq!(answer.profiles, vec![SrtpProtectionProfile::Aes128CmSha1_80]);
        assert_eq!(answer.mki, offer.mki);
    }

    #[test]
    fn test_missing_client_extension_is_fatal() {
        let mut server = TlsServer::new(test_control(false), new_transformer_slot());
        assert!(server.process_client_extensions(None).is_err());
        assert_eq!(server.state(), HandshakeState::Failed);
    }

    #[test]
    fn test_no_profile_overlap_is_fatal() {
        let mut server = TlsServer::new(test_control(false), new_transformer_slot());
        let offer = UseSrtpExtension::with_profiles(vec![
            SrtpProtectionProfile::AeadAes128Gcm,
            SrtpProtectionProfile::Unknown(0x4242),
        ]);
        let result = server.process_client_extensions(Some(&offer));
        assert!(matches!(result, Err(Error::SrtpNegotiation(_))));
    }

    #[test]
    fn test_pure_dtls_answers_nothing() {
        let mut server = TlsServer::new(test_control(true), new_transformer_slot());
        let answer = server.process_client_extensions(None).unwrap();
        assert!(answer.is_none());
        assert_eq!(server.state(), HandshakeState::ExtensionsExchanged);
    }

    #[test]
    fn test_completion_installs_transformer() {
        let slot = new_transformer_slot();
        let mut server = TlsServer::new(test_control(false), Arc::clone(&slot));

        let offer =
            UseSrtpExtension::with_profiles(SRTP_PROTECTION_PROFILES.to_vec());
        server.process_client_extensions(Some(&offer)).unwrap();

        let exporter: Vec<u8> = (100u8..160).collect();
        server.handshake_complete(&exporter).unwrap();

        assert!(slot.lock().is_some());
        assert_eq!(server.state(), HandshakeState::Complete);
    }
}
