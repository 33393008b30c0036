//! Primitive crypto capabilities the engine consumes.

use crate::crypto::signer::PrivateKey;
use crate::domain::error::EngineResult;
use crate::domain::types::{Certificate, HashAlgorithm};

pub trait HashService: Send + Sync {
    fn digest(&self, algorithm: HashAlgorithm, data: &[u8]) -> EngineResult<Vec<u8>>;
}

/// Sign and verify keyed by signature algorithm OID.
pub trait SignService: Send + Sync {
    fn sign(&self, algorithm: &str, key: &PrivateKey, data: &[u8]) -> EngineResult<Vec<u8>>;

    fn verify(
        &self,
        algorithm: &str,
        certificate: &Certificate,
        data: &[u8],
        signature: &[u8],
    ) -> EngineResult<bool>;

    /// Whether `issuer`'s public key verifies the signature on `certificate`.
    fn verify_certificate(&self, certificate: &Certificate, issuer: &Certificate) -> EngineResult<bool>;
}
