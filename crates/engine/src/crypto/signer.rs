//! Signer identity for signature creation.
//! Today supports local files or env variables (dev). KMS/HSM come next.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;
use zeroize::Zeroizing;

use crate::adapters::x509::decode_pem;
use crate::domain::error::{EngineError, EngineResult};
use crate::domain::types::Certificate;

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("Invalid signer URI scheme: expected 'local:' or 'env:'")]
    InvalidScheme,
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("No certificate found in signer PEM")]
    NoCertificate,
}

impl From<SignerError> for EngineError {
    fn from(e: SignerError) -> Self {
        EngineError::Config(e.to_string())
    }
}

/// PEM encoded private key. Wiped from memory on drop.
#[derive(Clone)]
pub struct PrivateKey {
    pem: Zeroizing<Vec<u8>>,
}

impl PrivateKey {
    pub fn from_pem(pem: impl Into<Vec<u8>>) -> Self {
        Self { pem: Zeroizing::new(pem.into()) }
    }

    pub fn pem(&self) -> &[u8] {
        &self.pem
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// Signer identity consumed by signature creation.
pub trait PrivateInformation: Send + Sync {
    fn private_key(&self) -> Option<&PrivateKey>;
    fn certificate(&self) -> Option<&Certificate>;
    /// Issuer certificates shipped alongside the signer certificate.
    fn chain(&self) -> &[Certificate] {
        &[]
    }
}

/// Key and certificate loaded from a [`SignerSource`].
#[derive(Debug, Clone)]
pub struct SignerIdentity {
    key: Option<PrivateKey>,
    certificate: Option<Certificate>,
    chain: Vec<Certificate>,
}

impl SignerIdentity {
    pub fn new(certificate: Option<Certificate>, key: Option<PrivateKey>) -> Self {
        Self { key, certificate, chain: Vec::new() }
    }

    pub fn with_chain(mut self, chain: Vec<Certificate>) -> Self {
        self.chain = chain;
        self
    }

    /// Build from PEM text: the first certificate is the signer, the rest its chain.
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> EngineResult<Self> {
        let mut certificates = decode_pem(cert_pem)?.into_iter();
        let signer = certificates.next().ok_or(SignerError::NoCertificate)?;
        Ok(Self {
            key: Some(PrivateKey::from_pem(key_pem.to_vec())),
            certificate: Some(signer),
            chain: certificates.collect(),
        })
    }
}

impl PrivateInformation for SignerIdentity {
    fn private_key(&self) -> Option<&PrivateKey> {
        self.key.as_ref()
    }

    fn certificate(&self) -> Option<&Certificate> {
        self.certificate.as_ref()
    }

    fn chain(&self) -> &[Certificate] {
        &self.chain
    }
}

/// Source for a signer keypair.
/// Format examples:
/// - local:/path/to/cert.pem,/path/to/private.pem
/// - env:CERT_VAR,KEY_VAR
#[derive(Debug, Clone)]
pub enum SignerSource {
    Local { cert_path: PathBuf, key_path: PathBuf },
    Env { cert_var: String, key_var: String },
}

impl FromStr for SignerSource {
    type Err = SignerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, value) = s.split_once(':').ok_or(SignerError::InvalidScheme)?;
        let parts: Vec<&str> = value.split(',').collect();
        if parts.len() != 2 {
            return Err(SignerError::InvalidScheme);
        }

        match scheme {
            "local" => Ok(SignerSource::Local {
                cert_path: PathBuf::from(parts[0]),
                key_path: PathBuf::from(parts[1]),
            }),
            "env" => Ok(SignerSource::Env {
                cert_var: parts[0].to_string(),
                key_var: parts[1].to_string(),
            }),
            _ => Err(SignerError::InvalidScheme),
        }
    }
}

impl SignerSource {
    /// Load the PEM material and decode the certificate chain.
    pub fn resolve(&self) -> EngineResult<SignerIdentity> {
        match self {
            SignerSource::Local { cert_path, key_path } => {
                let cert_pem = std::fs::read(cert_path)?;
                let key_pem = Zeroizing::new(std::fs::read(key_path)?);
                log::debug!("loaded signer from {}", cert_path.display());
                SignerIdentity::from_pem(&cert_pem, &key_pem)
            }
            SignerSource::Env { cert_var, key_var } => {
                let cert_pem = std::env::var(cert_var)
                    .map_err(|_| SignerError::EnvVarNotFound(cert_var.clone()))?;
                let key_pem = Zeroizing::new(
                    std::env::var(key_var).map_err(|_| SignerError::EnvVarNotFound(key_var.clone()))?,
                );
                SignerIdentity::from_pem(cert_pem.as_bytes(), key_pem.as_bytes())
            }
        }
    }
}
