//! use_srtp DTLS extension (RFC 5764 Section 4.1.1)

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;

use crate::error::Error;
use crate::Result;

/// SRTP protection profile identifiers (RFC 5764, RFC 7714)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SrtpProtectionProfile {
    /// SRTP_AES128_CM_HMAC_SHA1_80
    Aes128CmSha1_80,

    /// SRTP_AES128_CM_HMAC_SHA1_32
    Aes128CmSha1_32,

    /// SRTP_AEAD_AES_128_GCM
    AeadAes128Gcm,

    /// SRTP_AEAD_AES_256_GCM
    AeadAes256Gcm,

    /// Profile not known to this engine
    Unknown(u16),
}

impl From<u16> for SrtpProtectionProfile {
    fn from(value: u16) -> Self {
        match value {
            0x0001 => SrtpProtectionProfile::Aes128CmSha1_80,
            0x0002 => SrtpProtectionProfile::Aes128CmSha1_32,
            0x0007 => SrtpProtectionProfile::AeadAes128Gcm,
            0x0008 => SrtpProtectionProfile::AeadAes256Gcm,
            _ => SrtpProtectionProfile::Unknown(value),
        }
    }
}

impl From<SrtpProtectionProfile> for u16 {
    fn from(value: SrtpProtectionProfile) -> Self {
        match value {
            SrtpProtectionProfile::Aes128CmSha1_80 => 0x0001,
            SrtpProtectionProfile::Aes128CmSha1_32 => 0x0002,
            SrtpProtectionProfile::AeadAes128Gcm => 0x0007,
            SrtpProtectionProfile::AeadAes256Gcm => 0x0008,
            SrtpProtectionProfile::Unknown(value) => value,
        }
    }
}

impl SrtpProtectionProfile {
    /// Whether this engine can key SRTP with the profile
    pub fn is_supported(&self) -> bool {
        matches!(
            self,
            SrtpProtectionProfile::Aes128CmSha1_80 | SrtpProtectionProfile::Aes128CmSha1_32
        )
    }
}

/// Body of the use_srtp hello extension: offered/chosen protection
/// profiles plus the SRTP Master Key Identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UseSrtpExtension {
    /// Protection profiles, in preference order
    pub profiles: Vec<SrtpProtectionProfile>,

    /// MKI value; empty when unused
    pub mki: Bytes,
}

impl UseSrtpExtension {
    /// Create an extension with the given profiles and no MKI
    pub fn with_profiles(profiles: Vec<SrtpProtectionProfile>) -> Self {
        Self {
            profiles,
            mki: Bytes::new(),
        }
    }

    /// Serialize the extension data (without the extension type/length
    /// envelope, which belongs to the hello message codec)
    pub fn serialize(&self) -> Result<Bytes> {
        let profiles_len = self.profiles.len() * 2;
        let mut buf = BytesMut::with_capacity(2 + profiles_len + 1 + self.mki.len());

        buf.put_u16(profiles_len as u16);
        for profile in &self.profiles {
            buf.put_u16((*profile).into());
        }

        buf.put_u8(self.mki.len() as u8);
        if !self.mki.is_empty() {
            buf.extend_from_slice(&self.mki);
        }

        Ok(buf.freeze())
    }

    /// Parse the extension data
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 3 {
            return Err(Error::BadFormat("use_srtp extension too short".to_string()));
        }

        let mut cursor = Cursor::new(data);

        let profiles_len = cursor.get_u16() as usize;
        if profiles_len % 2 != 0 {
            return Err(Error::BadFormat(
                "use_srtp profile list length must be even".to_string(),
            ));
        }
        if data.len() < 3 + profiles_len {
            return Err(Error::BadFormat(
                "use_srtp profile list exceeds extension".to_string(),
            ));
        }

        let mut profiles = Vec::with_capacity(profiles_len / 2);
        for _ in 0..profiles_len / 2 {
            profiles.push(SrtpProtectionProfile::from(cursor.get_u16()));
        }

        let mki_len = cursor.get_u8() as usize;
        if data.len() < 3 + profiles_len + mki_len {
            return Err(Error::BadFormat("use_srtp MKI exceeds extension".to_string()));
        }

        let mki = if mki_len > 0 {
            let offset = 3 + profiles_len;
            Bytes::copy_from_slice(&data[offset..offset + mki_len])
        } else {
            Bytes::new()
        };

        Ok(Self { profiles, mki })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let original = UseSrtpExtension {
            profiles: vec![
                SrtpProtectionProfile::Aes128CmSha1_80,
                SrtpProtectionProfile::Aes128CmSha1_32,
            ],
            mki: Bytes::from_static(&[1, 2, 3, 4]),
        };

        let bytes = original.serialize().unwrap();
        let parsed = UseSrtpExtension::parse(&bytes).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_unknown_profile_survives_round_trip() {
        let original = UseSrtpExtension::with_profiles(vec![SrtpProtectionProfile::Unknown(0x7777)]);
        let bytes = original.serialize().unwrap();
        let parsed = UseSrtpExtension::parse(&bytes).unwrap();
        assert_eq!(parsed.profiles, vec![SrtpProtectionProfile::Unknown(0x7777)]);
        assert!(!parsed.profiles[0].is_supported());
    }

    #[test]
    fn test_odd_profile_length_rejected() {
        // Declared profile list of 3 bytes
        let data = [0x00, 0x03, 0x00, 0x01, 0x00, 0x00];
        assert!(UseSrtpExtension::parse(&data).is_err());
    }

    #[test]
    fn test_truncated_mki_rejected() {
        let data = [0x00, 0x02, 0x00, 0x01, 0x04, 0xaa];
        assert!(UseSrtpExtension::parse(&data).is_err());
    }
}
