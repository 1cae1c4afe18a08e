//! Self-signed certificate lifecycle
//!
//! DTLS endpoints authenticate with self-signed certificates bound to the
//! session by RFC 4572 fingerprints, so certificate quality matters less
//! than generation cost: generation is CPU-bound and the result is shared
//! through a time-boxed cache. Every control object constructed within the
//! cache window reuses the same certificate and therefore advertises an
//! identical fingerprint.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::RsaPrivateKey;
use tracing::debug;

use super::algorithms::HashFunction;
use crate::config::ConfigSource;
use crate::error::Error;
use crate::Result;

/// Default lifetime of a cached certificate
pub const CERT_CACHE_EXPIRE_TIME: Duration = Duration::from_secs(24 * 60 * 60);

/// Configuration key for the RSA key size
pub const KEY_SIZE_PNAME: &str = "CROSSTALK_DTLS_KEY_SIZE";

/// Configuration key for the certificate signature algorithm
pub const SIGNATURE_ALGORITHM_PNAME: &str = "CROSSTALK_DTLS_SIGNATURE_ALGORITHM";

/// Configuration key for the certificate cache TTL in seconds
pub const CERT_CACHE_TTL_PNAME: &str = "CROSSTALK_DTLS_CERT_CACHE_TTL_SECONDS";

/// Tunables for certificate generation
#[derive(Debug, Clone)]
pub struct CertificateConfig {
    /// RSA modulus size in bits
    pub key_size: usize,

    /// Signature algorithm name, e.g. "SHA256withRSA"
    pub signature_algorithm: String,

    /// Subject common name
    pub common_name: String,
}

impl Default for CertificateConfig {
    fn default() -> Self {
        Self {
            key_size: 2048,
            signature_algorithm: "SHA256withRSA".to_string(),
            common_name: "crosstalk".to_string(),
        }
    }
}

impl CertificateConfig {
    /// Read the tunables from a configuration source
    pub fn from_config(config: &dyn ConfigSource) -> Self {
        let defaults = Self::default();
        Self {
            key_size: config.get_int(KEY_SIZE_PNAME, defaults.key_size as i64) as usize,
            signature_algorithm: config
                .get_str(SIGNATURE_ALGORITHM_PNAME, &defaults.signature_algorithm),
            common_name: defaults.common_name,
        }
    }
}

/// Immutable bundle of a generated certificate and its fingerprint
pub struct CertificateInfo {
    certificate_der: Vec<u8>,
    private_key_pem: String,
    local_fingerprint: String,
    fingerprint_hash: HashFunction,
    generated_at: Instant,
}

impl CertificateInfo {
    /// DER encoding of the certificate
    pub fn certificate_der(&self) -> &[u8] {
        &self.certificate_der
    }

    /// PEM encoding of the private key
    pub fn private_key_pem(&self) -> &str {
        &self.private_key_pem
    }

    /// Colon-separated upper-case hex fingerprint of the certificate
    pub fn local_fingerprint(&self) -> &str {
        &self.local_fingerprint
    }

    /// Hash function the fingerprint was computed with
    pub fn fingerprint_hash(&self) -> HashFunction {
        self.fingerprint_hash
    }

    /// When the certificate was generated
    pub fn generated_at(&self) -> Instant {
        self.generated_at
    }
}

/// Format a digest as a colon-separated upper-case hex fingerprint
/// (RFC 4572 Section 5)
pub fn format_fingerprint(digest: &[u8]) -> String {
    let mut out = String::with_capacity(digest.len() * 3);
    for (i, byte) in digest.iter().enumerate() {
        if i > 0 {
            out.push(':');
        }
        out.push_str(&format!("{:02X}", byte));
    }
    out
}

/// Compute the fingerprint of a DER-encoded certificate
pub fn compute_fingerprint(hash: HashFunction, der: &[u8]) -> String {
    format_fingerprint(&hash.digest(der))
}

/// Time-boxed certificate cache shared by all control objects of a
/// process.
///
/// Modeled as an explicit owned object rather than process-global state:
/// the embedder constructs one cache, decides its TTL, and hands it to
/// every `DtlsControl` it creates.
pub struct CertificateCache {
    ttl: Duration,
    slot: Mutex<Option<Arc<CertificateInfo>>>,
}

impl CertificateCache {
    /// Create a cache with the given TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// Create a cache with the default 24-hour TTL
    pub fn with_default_ttl() -> Self {
        Self::new(CERT_CACHE_EXPIRE_TIME)
    }

    /// Create a cache with the TTL read from a configuration source
    pub fn from_config(config: &dyn ConfigSource) -> Self {
        let seconds = config.get_int(
            CERT_CACHE_TTL_PNAME,
            CERT_CACHE_EXPIRE_TIME.as_secs() as i64,
        );
        Self::new(Duration::from_secs(seconds.max(0) as u64))
    }

    /// The cache TTL
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached certificate, generating a fresh one when the slot is
    /// empty or older than the TTL.
    ///
    /// The whole check-and-generate runs under one lock so concurrent
    /// callers never generate twice.
    pub fn get_or_generate(&self, config: &CertificateConfig) -> Result<Arc<CertificateInfo>> {
        let mut slot = self.slot.lock();

        if let Some(info) = slot.as_ref() {
            if info.generated_at.elapsed() < self.ttl {
                return Ok(Arc::clone(info));
            }
        }

        let info = Arc::new(generate_certificate(config)?);
        debug!(
            fingerprint = info.local_fingerprint.as_str(),
            "generated DTLS certificate"
        );
        *slot = Some(Arc::clone(&info));
        Ok(info)
    }

    /// Drop the cached certificate and generate a fresh one
    pub fn refresh(&self, config: &CertificateConfig) -> Result<Arc<CertificateInfo>> {
        let mut slot = self.slot.lock();
        let info = Arc::new(generate_certificate(config)?);
        *slot = Some(Arc::clone(&info));
        Ok(info)
    }

    /// Empty the cache
    pub fn clear(&self) {
        self.slot.lock().take();
    }
}

/// Key family of a signature algorithm name
enum KeyKind {
    Rsa,
    EcdsaP256,
}

/// Map a "HASHwithALG" signature algorithm name onto the rcgen algorithm,
/// the fingerprint hash and the key family
fn resolve_signature_algorithm(
    name: &str,
) -> Result<(&'static rcgen::SignatureAlgorithm, HashFunction, KeyKind)> {
    match name {
        "SHA256withRSA" => Ok((&rcgen::PKCS_RSA_SHA256, HashFunction::Sha256, KeyKind::Rsa)),
        "SHA384withRSA" => Ok((&rcgen::PKCS_RSA_SHA384, HashFunction::Sha384, KeyKind::Rsa)),
        "SHA512withRSA" => Ok((&rcgen::PKCS_RSA_SHA512, HashFunction::Sha512, KeyKind::Rsa)),
        "SHA256withECDSA" => Ok((
            &rcgen::PKCS_ECDSA_P256_SHA256,
            HashFunction::Sha256,
            KeyKind::EcdsaP256,
        )),
        _ => Err(Error::UnsupportedSignatureAlgorithm(name.to_string())),
    }
}

/// Generate a self-signed certificate per the configuration
fn generate_certificate(config: &CertificateConfig) -> Result<CertificateInfo> {
    let (alg, fingerprint_hash, key_kind) =
        resolve_signature_algorithm(&config.signature_algorithm)?;

    let key_pair = match key_kind {
        KeyKind::Rsa => {
            let mut rng = rand::thread_rng();
            let private_key = RsaPrivateKey::new(&mut rng, config.key_size)
                .map_err(|e| Error::Certificate(format!("RSA key generation failed: {}", e)))?;
            let pem = private_key
                .to_pkcs8_pem(LineEnding::LF)
                .map_err(|e| Error::Certificate(format!("PKCS#8 encoding failed: {}", e)))?;
            rcgen::KeyPair::from_pem(&pem)
                .map_err(|e| Error::Certificate(format!("Key import failed: {}", e)))?
        }
        KeyKind::EcdsaP256 => rcgen::KeyPair::generate(alg)
            .map_err(|e| Error::Certificate(format!("EC key generation failed: {}", e)))?,
    };

    let mut params = rcgen::CertificateParams::new(vec![config.common_name.clone()]);
    params.alg = alg;
    params.key_pair = Some(key_pair);

    let mut dn = rcgen::DistinguishedName::new();
    dn.push(rcgen::DnType::CommonName, config.common_name.clone());
    params.distinguished_name = dn;

    // Tolerate clock skew on the remote side; the fingerprint binding is
    // what actually authenticates the certificate
    let now = time::OffsetDateTime::now_utc();
    params.not_before = now - time::Duration::days(1);
    params.not_after = now + time::Duration::days(7);

    let certificate = rcgen::Certificate::from_params(params)
        .map_err(|e| Error::Certificate(format!("Certificate generation failed: {}", e)))?;

    let certificate_der = certificate
        .serialize_der()
        .map_err(|e| Error::Certificate(format!("DER serialization failed: {}", e)))?;
    let private_key_pem = certificate.serialize_private_key_pem();

    let local_fingerprint = compute_fingerprint(fingerprint_hash, &certificate_der);

    Ok(CertificateInfo {
        certificate_der,
        private_key_pem,
        local_fingerprint,
        fingerprint_hash,
        generated_at: Instant::now(),
    })
}
