use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::domain::error::EngineError;

/// All instants handled by the engine are UTC.
pub type Time = chrono::DateTime<chrono::Utc>;

/// Digest algorithms the engine knows how to name and select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    pub fn oid(self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "1.3.14.3.2.26",
            HashAlgorithm::Sha256 => "2.16.840.1.101.3.4.2.1",
            HashAlgorithm::Sha384 => "2.16.840.1.101.3.4.2.2",
            HashAlgorithm::Sha512 => "2.16.840.1.101.3.4.2.3",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
        }
    }

    /// Signature algorithm OID pairing this digest with the given public key algorithm.
    pub fn signature_algorithm_for(self, key_algorithm: &str) -> Option<&'static str> {
        match (key_algorithm, self) {
            (RSA_ENCRYPTION, HashAlgorithm::Sha1) => Some(signature_algorithms::SHA1_WITH_RSA),
            (RSA_ENCRYPTION, HashAlgorithm::Sha256) => Some(signature_algorithms::SHA256_WITH_RSA),
            (RSA_ENCRYPTION, HashAlgorithm::Sha384) => Some(signature_algorithms::SHA384_WITH_RSA),
            (RSA_ENCRYPTION, HashAlgorithm::Sha512) => Some(signature_algorithms::SHA512_WITH_RSA),
            (EC_PUBLIC_KEY, HashAlgorithm::Sha1) => Some(signature_algorithms::ECDSA_WITH_SHA1),
            (EC_PUBLIC_KEY, HashAlgorithm::Sha256) => Some(signature_algorithms::ECDSA_WITH_SHA256),
            (EC_PUBLIC_KEY, HashAlgorithm::Sha384) => Some(signature_algorithms::ECDSA_WITH_SHA384),
            (EC_PUBLIC_KEY, HashAlgorithm::Sha512) => Some(signature_algorithms::ECDSA_WITH_SHA512),
            _ => None,
        }
    }

    /// Digest used by a signature algorithm OID, if known.
    pub fn from_signature_algorithm(oid: &str) -> Option<Self> {
        SIGNATURE_ALGORITHMS.get(oid).map(|(_, hash)| *hash)
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "sha1" | "1.3.14.3.2.26" => Ok(HashAlgorithm::Sha1),
            "sha256" | "2.16.840.1.101.3.4.2.1" => Ok(HashAlgorithm::Sha256),
            "sha384" | "2.16.840.1.101.3.4.2.2" => Ok(HashAlgorithm::Sha384),
            "sha512" | "2.16.840.1.101.3.4.2.3" => Ok(HashAlgorithm::Sha512),
            other => Err(EngineError::Config(format!("unknown hash algorithm: {other}"))),
        }
    }
}

pub const RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
pub const EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";

/// Signature algorithm identifiers as carried in certificates and SignerInfos.
pub mod signature_algorithms {
    pub const SHA1_WITH_RSA: &str = "1.2.840.113549.1.1.5";
    pub const SHA256_WITH_RSA: &str = "1.2.840.113549.1.1.11";
    pub const SHA384_WITH_RSA: &str = "1.2.840.113549.1.1.12";
    pub const SHA512_WITH_RSA: &str = "1.2.840.113549.1.1.13";
    pub const ECDSA_WITH_SHA1: &str = "1.2.840.10045.4.1";
    pub const ECDSA_WITH_SHA256: &str = "1.2.840.10045.4.3.2";
    pub const ECDSA_WITH_SHA384: &str = "1.2.840.10045.4.3.3";
    pub const ECDSA_WITH_SHA512: &str = "1.2.840.10045.4.3.4";
}

static SIGNATURE_ALGORITHMS: Lazy<HashMap<&'static str, (&'static str, HashAlgorithm)>> = Lazy::new(|| {
    use signature_algorithms::*;
    HashMap::from([
        (SHA1_WITH_RSA, ("sha1WithRSAEncryption", HashAlgorithm::Sha1)),
        (SHA256_WITH_RSA, ("sha256WithRSAEncryption", HashAlgorithm::Sha256)),
        (SHA384_WITH_RSA, ("sha384WithRSAEncryption", HashAlgorithm::Sha384)),
        (SHA512_WITH_RSA, ("sha512WithRSAEncryption", HashAlgorithm::Sha512)),
        (ECDSA_WITH_SHA1, ("ecdsa-with-SHA1", HashAlgorithm::Sha1)),
        (ECDSA_WITH_SHA256, ("ecdsa-with-SHA256", HashAlgorithm::Sha256)),
        (ECDSA_WITH_SHA384, ("ecdsa-with-SHA384", HashAlgorithm::Sha384)),
        (ECDSA_WITH_SHA512, ("ecdsa-with-SHA512", HashAlgorithm::Sha512)),
    ])
});

/// Human readable name for a signature algorithm OID; falls back to the OID itself.
pub fn signature_algorithm_name(oid: &str) -> &str {
    SIGNATURE_ALGORITHMS.get(oid).map(|(name, _)| *name).unwrap_or(oid)
}

/// True when `candidate` names `oid` either by OID or by its registered name.
pub fn signature_algorithm_matches(candidate: &str, oid: &str) -> bool {
    candidate == oid || candidate.eq_ignore_ascii_case(signature_algorithm_name(oid))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_names_parse_case_insensitively() {
        assert_eq!("SHA-256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert_eq!("1.3.14.3.2.26".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha1);
        assert!("md5".parse::<HashAlgorithm>().is_err());
    }

    #[test]
    fn signature_algorithm_pairs_digest_with_key_type() {
        assert_eq!(
            HashAlgorithm::Sha256.signature_algorithm_for(EC_PUBLIC_KEY),
            Some(signature_algorithms::ECDSA_WITH_SHA256)
        );
        assert_eq!(
            HashAlgorithm::from_signature_algorithm(signature_algorithms::SHA512_WITH_RSA),
            Some(HashAlgorithm::Sha512)
        );
        assert!(signature_algorithm_matches("sha256WithRSAEncryption", signature_algorithms::SHA256_WITH_RSA));
    }
}
