//! DTLS-SRTP control object
//!
//! Owns the local certificate (through the shared cache), the remote
//! fingerprint map supplied over signaling, the RFC 4572/5763 certificate
//! verification protocol, and SRTP protection-profile selection.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;
use x509_parser::prelude::FromDer;
use x509_parser::certificate::X509Certificate;

use super::algorithms::{hash_upgrades, signature_and_hash_from_oid, HashFunction};
use super::cert::{compute_fingerprint, CertificateCache, CertificateConfig, CertificateInfo};
use super::extension::SrtpProtectionProfile;
use super::properties::Properties;
use crate::config::ConfigSource;
use crate::error::Error;
use crate::Result;

/// Configuration key for the verification-failure behavior
pub const VERIFY_FATAL_PNAME: &str = "CROSSTALK_DTLS_VERIFY_FINGERPRINT_FATAL";

/// Protection profiles this engine offers, in preference order
pub const SRTP_PROTECTION_PROFILES: [SrtpProtectionProfile; 2] = [
    SrtpProtectionProfile::Aes128CmSha1_80,
    SrtpProtectionProfile::Aes128CmSha1_32,
];

/// DTLS-SRTP control object, one per media session
pub struct DtlsControl {
    certificate: Arc<CertificateInfo>,
    properties: Arc<Properties>,
    remote_fingerprints: RwLock<HashMap<String, String>>,

    /// Whether a verification failure aborts the handshake (RFC 5763
    /// behavior) or is only logged. The non-fatal mode is an explicit
    /// interop opt-in; it weakens the authentication guarantee.
    verify_fatal: bool,
}

impl DtlsControl {
    /// Create a control object, obtaining the certificate through the
    /// shared cache and reading tunables from `config`
    pub fn new(cache: &CertificateCache, config: &dyn ConfigSource) -> Result<Self> {
        let cert_config = CertificateConfig::from_config(config);
        let verify_fatal = config.get_bool(VERIFY_FATAL_PNAME, true);
        Self::with_options(cache, &cert_config, verify_fatal, false)
    }

    /// Create a control object with explicit options
    pub fn with_options(
        cache: &CertificateCache,
        cert_config: &CertificateConfig,
        verify_fatal: bool,
        srtp_disabled: bool,
    ) -> Result<Self> {
        let certificate = cache.get_or_generate(cert_config)?;
        Ok(Self {
            certificate,
            properties: Arc::new(Properties::new(srtp_disabled)),
            remote_fingerprints: RwLock::new(HashMap::new()),
            verify_fatal,
        })
    }

    /// The local certificate bundle
    pub fn certificate(&self) -> &Arc<CertificateInfo> {
        &self.certificate
    }

    /// Colon-separated upper-case hex fingerprint of the local certificate
    pub fn local_fingerprint(&self) -> &str {
        self.certificate.local_fingerprint()
    }

    /// Hash function of the local fingerprint
    pub fn local_fingerprint_hash(&self) -> HashFunction {
        self.certificate.fingerprint_hash()
    }

    /// The shared session properties
    pub fn properties(&self) -> &Arc<Properties> {
        &self.properties
    }

    /// Install the remote fingerprints received over signaling.
    ///
    /// Hash-function names are normalized to lower case. An entry with an
    /// empty hash name or an empty fingerprint is meaningless and dropped.
    pub fn set_remote_fingerprints(&self, fingerprints: HashMap<String, String>) {
        let mut normalized = HashMap::with_capacity(fingerprints.len());
        for (hash, fingerprint) in fingerprints {
            if hash.is_empty() || fingerprint.is_empty() {
                continue;
            }
            normalized.insert(hash.to_lowercase(), fingerprint);
        }
        *self.remote_fingerprints.write() = normalized;
    }

    /// Verify the peer certificate against the signaled fingerprints.
    ///
    /// The digest is chosen from the certificate's own signature
    /// algorithm. When no fingerprint was signaled for that hash, the
    /// SHA-1 upgrade table is consulted before failing. With
    /// `verify_fatal` unset, failures are logged and tolerated — an
    /// explicit deviation from RFC 5763's mandatory teardown.
    pub fn verify_and_validate_certificate(&self, certificate_der: &[u8]) -> Result<()> {
        match self.verify_certificate(certificate_der) {
            Ok(()) => Ok(()),
            Err(e) if self.verify_fatal => Err(e),
            Err(e) => {
                warn!(error = %e, "accepting peer certificate despite failed verification");
                Ok(())
            }
        }
    }

    fn verify_certificate(&self, certificate_der: &[u8]) -> Result<()> {
        let (_, x509) = X509Certificate::from_der(certificate_der)
            .map_err(|e| Error::Certificate(format!("Peer certificate unparsable: {}", e)))?;

        let oid = x509.signature_algorithm.algorithm.to_id_string();
        let (_signature, hash) = signature_and_hash_from_oid(&oid)?;

        let fingerprints = self.remote_fingerprints.read();

        let (hash, expected) = match fingerprints.get(hash.name()) {
            Some(fingerprint) => (hash, fingerprint.clone()),
            None => {
                let upgraded = hash_upgrades(hash).iter().find_map(|candidate| {
                    fingerprints
                        .get(candidate.name())
                        .map(|fp| (*candidate, fp.clone()))
                });
                match upgraded {
                    Some(found) => found,
                    None => return Err(Error::NoFingerprintDeclared(hash.name().to_string())),
                }
            }
        };
        drop(fingerprints);

        let actual = compute_fingerprint(hash, certificate_der);
        if actual != expected.to_uppercase() {
            return Err(Error::FingerprintMismatch(format!(
                "{} fingerprint {} doesn't match signaled {}",
                hash.name(),
                actual,
                expected
            )));
        }

        Ok(())
    }

    /// Pick the SRTP protection profile: first locally supported profile
    /// that the peer offered, or `None` when the sets don't intersect
    pub fn choose_srtp_protection_profile(
        &self,
        offered: &[SrtpProtectionProfile],
    ) -> Option<SrtpProtectionProfile> {
        SRTP_PROTECTION_PROFILES
            .iter()
            .find(|local| offered.contains(local))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapConfig;

    fn test_control(verify_fatal: bool) -> DtlsControl {
        let cache = CertificateCache::with_default_ttl();
        let cert_config = CertificateConfig {
            signature_algorithm: "SHA256withECDSA".to_string(),
            ..CertificateConfig::default()
        };
        DtlsControl::with_options(&cache, &cert_config, verify_fatal, false).unwrap()
    }

    fn fingerprint_map(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_verify_succeeds_with_matching_fingerprint() {
        let alice = test_control(true);
        let bob = test_control(true);

        // Bob learns Alice's fingerprint over signaling
        bob.set_remote_fingerprints(fingerprint_map(&[(
            "sha-256",
            alice.local_fingerprint(),
        )]));

        bob.verify_and_validate_certificate(alice.certificate().certificate_der())
            .unwrap();
    }

    #[test]
    fn test_verify_fails_without_usable_fingerprint() {
        let alice = test_control(true);
        let bob = test_control(true);

        // Only an unrelated hash function, and SHA-256 has no upgrade path
        bob.set_remote_fingerprints(fingerprint_map(&[("sha-384", "AA:BB")]));

        let result = bob.verify_and_validate_certificate(alice.certificate().certificate_der());
        assert!(matches!(result, Err(Error::NoFingerprintDeclared(_))));
    }

    #[test]
    fn test_verify_fails_on_mismatch() {
        let alice = test_control(true);
        let bob = test_control(true);

        let mut wrong = alice.local_fingerprint().to_string();
        // Flip the first hex digit
        let replacement = if wrong.starts_with('0') { "1" } else { "0" };
        wrong.replace_range(0..1, replacement);
        bob.set_remote_fingerprints(fingerprint_map(&[("sha-256", &wrong)]));

        let result = bob.verify_and_validate_certificate(alice.certificate().certificate_der());
        assert!(matches!(result, Err(Error::FingerprintMismatch(_))));
    }

    #[test]
    fn test_non_fatal_mode_tolerates_mismatch() {
        let alice = test_control(true);
        let bob = test_control(false);

        bob.set_remote_fingerprints(fingerprint_map(&[("sha-384", "AA:BB")]));
        // Verification fails but the configured mode downgrades it
        bob.verify_and_validate_certificate(alice.certificate().certificate_der())
            .unwrap();
    }

    #[test]
    fn test_empty_entries_dropped() {
        let control = test_control(true);
        control.set_remote_fingerprints(fingerprint_map(&[
            ("", "AA:BB"),
            ("sha-256", ""),
            ("SHA-1", "CC:DD"),
        ]));

        let fingerprints = control.remote_fingerprints.read();
        assert_eq!(fingerprints.len(), 1);
        // Hash names are lower-cased on the way in
        assert_eq!(fingerprints.get("sha-1").map(String::as_str), Some("CC:DD"));
    }

    #[test]
    fn test_profile_choice_first_match_wins() {
        let control = test_control(true);

        let chosen = control.choose_srtp_protection_profile(&[
            SrtpProtectionProfile::AeadAes128Gcm,
            SrtpProtectionProfile::Aes128CmSha1_32,
            SrtpProtectionProfile::Aes128CmSha1_80,
        ]);
        // Local preference order decides, not the peer's
        assert_eq!(chosen, Some(SrtpProtectionProfile::Aes128CmSha1_80));

        let none = control.choose_srtp_protection_profile(&[
            SrtpProtectionProfile::AeadAes128Gcm,
            SrtpProtectionProfile::AeadAes256Gcm,
        ]);
        assert_eq!(none, None);
    }
}
