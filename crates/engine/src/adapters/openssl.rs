// crates/engine/src/adapters/openssl.rs
//! OpenSSL-backed hash and signature primitives.

use openssl::hash::{hash, MessageDigest};
use openssl::pkey::PKey;
use openssl::sign::{Signer, Verifier};
use openssl::x509::X509;

use crate::crypto::services::{HashService, SignService};
use crate::crypto::signer::PrivateKey;
use crate::domain::error::{EngineError, EngineResult};
use crate::domain::types::{Certificate, HashAlgorithm};

fn message_digest(algorithm: HashAlgorithm) -> MessageDigest {
  match algorithm {
    HashAlgorithm::Sha1 => MessageDigest::sha1(),
    HashAlgorithm::Sha256 => MessageDigest::sha256(),
    HashAlgorithm::Sha384 => MessageDigest::sha384(),
    HashAlgorithm::Sha512 => MessageDigest::sha512(),
  }
}

fn digest_for_signature(algorithm: &str) -> EngineResult<MessageDigest> {
  HashAlgorithm::from_signature_algorithm(algorithm)
    .map(message_digest)
    .ok_or_else(|| EngineError::Crypto(format!("unsupported signature algorithm {algorithm}")))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OpenSslHashService;

impl HashService for OpenSslHashService {
  fn digest(&self, algorithm: HashAlgorithm, data: &[u8]) -> EngineResult<Vec<u8>> {
    Ok(hash(message_digest(algorithm), data)?.to_vec())
  }
}

/// RSA PKCS#1 v1.5 and ECDSA through OpenSSL `EVP_DigestSign`/`EVP_DigestVerify`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenSslSignService;

impl SignService for OpenSslSignService {
  fn sign(&self, algorithm: &str, key: &PrivateKey, data: &[u8]) -> EngineResult<Vec<u8>> {
    let digest = digest_for_signature(algorithm)?;
    let pkey = PKey::private_key_from_pem(key.pem())?;
    let mut signer = Signer::new(digest, &pkey)?;
    signer.update(data)?;
    Ok(signer.sign_to_vec()?)
  }

  fn verify(&self, algorithm: &str, certificate: &Certificate, data: &[u8], signature: &[u8]) -> EngineResult<bool> {
    let public_key = X509::from_der(&certificate.der)?.public_key()?;
    let mut verifier = Verifier::new(digest_for_signature(algorithm)?, &public_key)?;
    verifier.update(data)?;
    Ok(verifier.verify(signature)?)
  }

  fn verify_certificate(&self, certificate: &Certificate, issuer: &Certificate) -> EngineResult<bool> {
    let issuer_key = X509::from_der(&issuer.der)?.public_key()?;
    Ok(X509::from_der(&certificate.der)?.verify(&issuer_key)?)
  }
}
