//! Signature and hash algorithm tables
//!
//! Maps X.509 signature-algorithm OIDs onto (signature, hash) pairs for
//! the RSA/ECDSA x SHA families used in certificate authentication, and
//! carries the fixed SHA-1 fingerprint hash upgrade table.

use sha1::{Digest, Sha1};
use sha2::{Sha224, Sha256, Sha384, Sha512};

use crate::error::Error;
use crate::Result;

/// Public-key signature algorithm of a certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// RSA (PKCS#1)
    Rsa,

    /// ECDSA
    Ecdsa,
}

/// Hash function used for certificate signatures and fingerprints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashFunction {
    /// SHA-1
    Sha1,

    /// SHA-224
    Sha224,

    /// SHA-256
    Sha256,

    /// SHA-384
    Sha384,

    /// SHA-512
    Sha512,
}

impl HashFunction {
    /// Lower-case name as used in SDP fingerprint attributes (RFC 4572)
    pub fn name(&self) -> &'static str {
        match self {
            HashFunction::Sha1 => "sha-1",
            HashFunction::Sha224 => "sha-224",
            HashFunction::Sha256 => "sha-256",
            HashFunction::Sha384 => "sha-384",
            HashFunction::Sha512 => "sha-512",
        }
    }

    /// Look up a hash function by its RFC 4572 name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "sha-1" => Some(HashFunction::Sha1),
            "sha-224" => Some(HashFunction::Sha224),
            "sha-256" => Some(HashFunction::Sha256),
            "sha-384" => Some(HashFunction::Sha384),
            "sha-512" => Some(HashFunction::Sha512),
            _ => None,
        }
    }

    /// Digest `data` with this hash function
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            HashFunction::Sha1 => Sha1::digest(data).to_vec(),
            HashFunction::Sha224 => Sha224::digest(data).to_vec(),
            HashFunction::Sha256 => Sha256::digest(data).to_vec(),
            HashFunction::Sha384 => Sha384::digest(data).to_vec(),
            HashFunction::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

/// Map an X.509 signature-algorithm OID to its (signature, hash) pair.
///
/// An OID outside the RSA/ECDSA x SHA table is a hard failure, never a
/// silent default.
pub fn signature_and_hash_from_oid(oid: &str) -> Result<(SignatureAlgorithm, HashFunction)> {
    match oid {
        // RSA (PKCS#1 v1.5)
        "1.2.840.113549.1.1.5" => Ok((SignatureAlgorithm::Rsa, HashFunction::Sha1)),
        "1.2.840.113549.1.1.14" => Ok((SignatureAlgorithm::Rsa, HashFunction::Sha224)),
        "1.2.840.113549.1.1.11" => Ok((SignatureAlgorithm::Rsa, HashFunction::Sha256)),
        "1.2.840.113549.1.1.12" => Ok((SignatureAlgorithm::Rsa, HashFunction::Sha384)),
        "1.2.840.113549.1.1.13" => Ok((SignatureAlgorithm::Rsa, HashFunction::Sha512)),
        // ECDSA
        "1.2.840.10045.4.1" => Ok((SignatureAlgorithm::Ecdsa, HashFunction::Sha1)),
        "1.2.840.10045.4.3.1" => Ok((SignatureAlgorithm::Ecdsa, HashFunction::Sha224)),
        "1.2.840.10045.4.3.2" => Ok((SignatureAlgorithm::Ecdsa, HashFunction::Sha256)),
        "1.2.840.10045.4.3.3" => Ok((SignatureAlgorithm::Ecdsa, HashFunction::Sha384)),
        "1.2.840.10045.4.3.4" => Ok((SignatureAlgorithm::Ecdsa, HashFunction::Sha512)),
        _ => Err(Error::UnsupportedSignatureAlgorithm(oid.to_string())),
    }
}

/// Fingerprint hash-function upgrades tolerated during verification.
///
/// Some peers announce a stronger fingerprint hash over signaling than the
/// hash their certificate is actually signed with. Only the SHA-1 →
/// stronger-SHA upgrades are tolerated; the table is deliberately not
/// generalized further.
pub fn hash_upgrades(hash: HashFunction) -> &'static [HashFunction] {
    match hash {
        HashFunction::Sha1 => &[
            HashFunction::Sha224,
            HashFunction::Sha256,
            HashFunction::Sha384,
            HashFunction::Sha512,
        ],
        _ => &[],
    }
}
