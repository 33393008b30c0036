use serde::{Deserialize, Serialize};

use super::certificate::Certificate;
use super::core::{HashAlgorithm, Time};
use crate::domain::error::EngineResult;
use crate::domain::revocation::{RevocationData, RevocationSource};

/// Attribute identifiers (CMS / ETSI CAdES object identifiers).
pub mod ids {
    pub const CONTENT_TYPE: &str = "1.2.840.113549.1.9.3";
    pub const MESSAGE_DIGEST: &str = "1.2.840.113549.1.9.4";
    pub const SIGNING_TIME: &str = "1.2.840.113549.1.9.5";
    pub const COUNTER_SIGNATURE: &str = "1.2.840.113549.1.9.6";
    pub const CONTENT_HINT: &str = "1.2.840.113549.1.9.16.2.4";
    pub const SIGNING_CERTIFICATE: &str = "1.2.840.113549.1.9.16.2.12";
    pub const SIGNATURE_TIME_STAMP: &str = "1.2.840.113549.1.9.16.2.14";
    pub const SIGNATURE_POLICY_ID: &str = "1.2.840.113549.1.9.16.2.15";
    pub const SIGNER_LOCATION: &str = "1.2.840.113549.1.9.16.2.17";
    pub const SIGNER_ATTRIBUTES: &str = "1.2.840.113549.1.9.16.2.18";
    pub const CERTIFICATE_REFS: &str = "1.2.840.113549.1.9.16.2.21";
    pub const REVOCATION_REFS: &str = "1.2.840.113549.1.9.16.2.22";
    pub const CERTIFICATE_VALUES: &str = "1.2.840.113549.1.9.16.2.23";
    pub const REVOCATION_VALUES: &str = "1.2.840.113549.1.9.16.2.24";
    pub const ESC_TIME_STAMP: &str = "1.2.840.113549.1.9.16.2.25";
    pub const ATTR_CERTIFICATE_REFS: &str = "1.2.840.113549.1.9.16.2.44";
    pub const ATTR_REVOCATION_REFS: &str = "1.2.840.113549.1.9.16.2.45";
    pub const SIGNING_CERTIFICATE_V2: &str = "1.2.840.113549.1.9.16.2.47";
    pub const ARCHIVE_TIME_STAMP_V2: &str = "1.2.840.113549.1.9.16.2.48";

    /// CMS `id-data` content type.
    pub const ID_DATA: &str = "1.2.840.113549.1.7.1";
}

/// Reference to one certificate inside a signing-certificate or refs attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateReference {
    #[serde(with = "hex::serde")]
    pub digest: Vec<u8>,
    pub issuer: String,
    pub serial: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateReferences {
    pub algorithm: HashAlgorithm,
    pub references: Vec<CertificateReference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationReference {
    pub source: RevocationSource,
    pub issuer: String,
    pub produced_at: Time,
    pub algorithm: HashAlgorithm,
    #[serde(with = "hex::serde")]
    pub digest: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignerLocation {
    pub country: Option<String>,
    pub locality: Option<String>,
    pub postal_address: Vec<String>,
}

/// A time-stamp token as returned by a TSA, with the fields the engine reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeStampToken {
    pub gen_time: Time,
    pub algorithm: HashAlgorithm,
    #[serde(with = "hex::serde")]
    pub imprint: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub token: Vec<u8>,
    pub tsa: Option<String>,
    /// TSA signing certificate, when the token carries it.
    #[serde(skip)]
    pub certificate: Option<Certificate>,
}

/// Decoded attribute payload. Family adapters encode these to CMS/XML;
/// anything they do not decode is carried as `Encoded`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    ContentType(String),
    MessageDigest {
        algorithm: HashAlgorithm,
        #[serde(with = "hex::serde")]
        digest: Vec<u8>,
    },
    SigningTime(Time),
    CertificateReferences(CertificateReferences),
    PolicyIdentifier {
        oid: String,
        algorithm: HashAlgorithm,
        digest: Option<String>,
    },
    SignerLocation(SignerLocation),
    /// Claimed roles and hex DER attribute certificates.
    SignerAttributes {
        claimed: Vec<String>,
        certified: Vec<String>,
    },
    ContentHint {
        description: String,
        content_type: String,
    },
    CertificateValues(Vec<String>),
    RevocationValues(Vec<RevocationData>),
    RevocationReferences(Vec<RevocationReference>),
    TimeStamp(TimeStampToken),
    Encoded(#[serde(with = "hex::serde")] Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribute {
    pub identifier: String,
    pub is_signed: bool,
    pub is_unique: bool,
    pub value: AttributeValue,
}

impl Attribute {
    pub fn new(identifier: impl Into<String>, is_signed: bool, is_unique: bool, value: AttributeValue) -> Self {
        Self { identifier: identifier.into(), is_signed, is_unique, value }
    }

    /// Stable byte form used as hashing input for timestamp imprints.
    pub fn canonical_bytes(&self) -> EngineResult<Vec<u8>> {
        Ok(serde_json::to_vec(&(&self.identifier, &self.value))?)
    }

    pub fn signing_time(&self) -> Option<Time> {
        match &self.value {
            AttributeValue::SigningTime(t) => Some(*t),
            _ => None,
        }
    }

    pub fn time_stamp(&self) -> Option<&TimeStampToken> {
        match &self.value {
            AttributeValue::TimeStamp(token) => Some(token),
            _ => None,
        }
    }

    pub fn certificate_references(&self) -> Option<&CertificateReferences> {
        match &self.value {
            AttributeValue::CertificateReferences(refs) => Some(refs),
            _ => None,
        }
    }

    pub fn policy_oid(&self) -> Option<&str> {
        match &self.value {
            AttributeValue::PolicyIdentifier { oid, .. } => Some(oid),
            _ => None,
        }
    }
}
