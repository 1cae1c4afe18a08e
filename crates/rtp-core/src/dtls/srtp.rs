//! SRTP keying from a completed DTLS handshake
//!
//! RFC 5764 Section 4.2: the SRTP master keys and salts are extracted from
//! the DTLS keying-material exporter with the label "EXTRACTOR-dtls_srtp",
//! concatenated as client key | server key | client salt | server salt.
//! The derived material is wrapped in a transformer installed into the
//! packet transform chain.

use parking_lot::Mutex;
use std::sync::Arc;

use super::extension::SrtpProtectionProfile;
use crate::error::Error;
use crate::Result;

/// Exporter label for DTLS-SRTP key derivation
pub const EXPORTER_LABEL: &str = "EXTRACTOR-dtls_srtp";

/// Key and salt sizes of a protection profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SrtpProfileParams {
    /// Cipher key length in bytes
    pub cipher_key_len: usize,

    /// Cipher salt length in bytes
    pub cipher_salt_len: usize,

    /// Authentication tag length in bytes
    pub auth_tag_len: usize,
}

impl SrtpProtectionProfile {
    /// Keying parameters of the profile, when this engine supports it
    pub fn params(&self) -> Option<SrtpProfileParams> {
        match self {
            SrtpProtectionProfile::Aes128CmSha1_80 => Some(SrtpProfileParams {
                cipher_key_len: 16,
                cipher_salt_len: 14,
                auth_tag_len: 10,
            }),
            SrtpProtectionProfile::Aes128CmSha1_32 => Some(SrtpProfileParams {
                cipher_key_len: 16,
                cipher_salt_len: 14,
                auth_tag_len: 4,
            }),
            _ => None,
        }
    }

    /// Total exporter output needed for the profile
    pub fn keying_material_len(&self) -> Option<usize> {
        self.params()
            .map(|p| 2 * (p.cipher_key_len + p.cipher_salt_len))
    }
}

/// Master keys and salts for both directions of an SRTP session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrtpKeyMaterial {
    /// Profile the material was derived for
    pub profile: SrtpProtectionProfile,

    /// Client write master key
    pub client_key: Vec<u8>,

    /// Server write master key
    pub server_key: Vec<u8>,

    /// Client write master salt
    pub client_salt: Vec<u8>,

    /// Server write master salt
    pub server_salt: Vec<u8>,
}

impl SrtpKeyMaterial {
    /// Split exporter output into per-direction keys and salts
    pub fn derive(profile: SrtpProtectionProfile, exporter: &[u8]) -> Result<Self> {
        let params = profile.params().ok_or_else(|| {
            Error::SrtpNegotiation(format!("Profile {:?} is not supported", profile))
        })?;

        let needed = 2 * (params.cipher_key_len + params.cipher_salt_len);
        if exporter.len() < needed {
            return Err(Error::SrtpNegotiation(format!(
                "Exporter produced {} bytes, profile needs {}",
                exporter.len(),
                needed
            )));
        }

        let key_len = params.cipher_key_len;
        let salt_len = params.cipher_salt_len;

        let client_key = exporter[..key_len].to_vec();
        let server_key = exporter[key_len..2 * key_len].to_vec();
        let client_salt = exporter[2 * key_len..2 * key_len + salt_len].to_vec();
        let server_salt = exporter[2 * key_len + salt_len..needed].to_vec();

        Ok(Self {
            profile,
            client_key,
            server_key,
            client_salt,
            server_salt,
        })
    }
}

/// SRTP packet transformer holding the installed key material.
///
/// Packet protection itself lives in the transform chain; this type is the
/// keyed unit the handshake endpoints install.
#[derive(Debug)]
pub struct SrtpTransformer {
    material: SrtpKeyMaterial,
}

impl SrtpTransformer {
    /// Create a transformer from derived material
    pub fn new(material: SrtpKeyMaterial) -> Self {
        Self { material }
    }

    /// The installed key material
    pub fn material(&self) -> &SrtpKeyMaterial {
        &self.material
    }

    /// The negotiated profile
    pub fn profile(&self) -> SrtpProtectionProfile {
        self.material.profile
    }
}

/// Shared slot the handshake endpoints install the transformer into.
///
/// Installation synchronizes on the slot so a transform chain reading it
/// never observes a partial install.
pub type TransformerSlot = Arc<Mutex<Option<SrtpTransformer>>>;

/// Create an empty transformer slot
pub fn new_transformer_slot() -> TransformerSlot {
    Arc::new(Mutex::new(None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_split() {
        // 2 * (16 + 14) = 60 bytes of exporter output
        let exporter: Vec<u8> = (0u8..60).collect();
        let material =
            SrtpKeyMaterial::derive(SrtpProtectionProfile::Aes128CmSha1_80, &exporter).unwrap();

        assert_eq!(material.client_key, (0u8..16).collect::<Vec<_>>());
        assert_eq!(material.server_key, (16u8..32).collect::<Vec<_>>());
        assert_eq!(material.client_salt, (32u8..46).collect::<Vec<_>>());
        assert_eq!(material.server_salt, (46u8..60).collect::<Vec<_>>());
    }

    #[test]
    fn test_short_exporter_rejected() {
        let exporter = [0u8; 10];
        assert!(matches!(
            SrtpKeyMaterial::derive(SrtpProtectionProfile::Aes128CmSha1_80, &exporter),
            Err(Error::SrtpNegotiation(_))
        ));
    }

    #[test]
    fn test_unsupported_profile_rejected() {
        let exporter = [0u8; 100];
        assert!(SrtpKeyMaterial::derive(SrtpProtectionProfile::AeadAes256Gcm, &exporter).is_err());
    }

    #[test]
    fn test_profile_params() {
        let params = SrtpProtectionProfile::Aes128CmSha1_32.params().unwrap();
        assert_eq!(params.auth_tag_len, 4);
        assert_eq!(
            SrtpProtectionProfile::Aes128CmSha1_80.keying_material_len(),
            Some(60)
        );
        assert_eq!(SrtpProtectionProfile::Unknown(0x9999).params(), None);
    }
}
