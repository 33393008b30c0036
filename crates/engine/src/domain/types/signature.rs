use std::sync::Arc;

use super::attribute::{ids, Attribute, TimeStampToken};
use super::certificate::Certificate;
use super::core::Time;
use crate::domain::error::{EngineError, EngineResult};

/// What a signature covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignedContent {
    Attached(Vec<u8>),
    /// Content travels separately; the caller supplies it at verification time.
    Detached,
}

impl SignedContent {
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            SignedContent::Attached(data) => Some(data),
            SignedContent::Detached => None,
        }
    }
}

/// One signer's signature with its signed and unsigned attribute sequences.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    content: SignedContent,
    signed: Vec<Attribute>,
    unsigned: Vec<Attribute>,
    signature_value: Option<Vec<u8>>,
    pub signature_algorithm: Option<String>,
    /// Certificates shipped with the signature (CMS `certificates`, XML `KeyInfo`).
    pub certificates: Vec<Certificate>,
    pub counter_signatures: Vec<Signature>,
}

impl Signature {
    pub fn new(content: SignedContent) -> Self {
        Self {
            content,
            signed: Vec::new(),
            unsigned: Vec::new(),
            signature_value: None,
            signature_algorithm: None,
            certificates: Vec::new(),
            counter_signatures: Vec::new(),
        }
    }

    /// Rebuild a parsed signature whose value is already known.
    pub fn parsed(
        content: SignedContent,
        signed: Vec<Attribute>,
        unsigned: Vec<Attribute>,
        signature_value: Vec<u8>,
        signature_algorithm: impl Into<String>,
    ) -> Self {
        Self {
            content,
            signed,
            unsigned,
            signature_value: Some(signature_value),
            signature_algorithm: Some(signature_algorithm.into()),
            certificates: Vec::new(),
            counter_signatures: Vec::new(),
        }
    }

    pub fn content(&self) -> &SignedContent {
        &self.content
    }

    /// Identifiers in order: signed attributes first, then unsigned.
    pub fn attribute_identifiers(&self) -> Vec<&str> {
        self.signed
            .iter()
            .chain(self.unsigned.iter())
            .map(|a| a.identifier.as_str())
            .collect()
    }

    pub fn has_attribute(&self, identifier: &str) -> bool {
        self.attribute(identifier).is_some()
    }

    pub fn attribute(&self, identifier: &str) -> Option<&Attribute> {
        self.signed
            .iter()
            .chain(self.unsigned.iter())
            .find(|a| a.identifier == identifier)
    }

    pub fn signed_attributes(&self) -> &[Attribute] {
        &self.signed
    }

    pub fn unsigned_attributes(&self) -> &[Attribute] {
        &self.unsigned
    }

    /// Append an attribute to the signed or unsigned sequence.
    ///
    /// Fails without touching either sequence when the identifier is unique and
    /// already present, or when a signed attribute arrives after sealing.
    pub fn add_attribute(&mut self, attribute: Attribute) -> EngineResult<()> {
        if attribute.is_unique && self.has_attribute(&attribute.identifier) {
            return Err(EngineError::UniqueAttribute(attribute.identifier));
        }
        if attribute.is_signed {
            if self.is_sealed() {
                return Err(EngineError::SealedSignature(attribute.identifier));
            }
            self.signed.push(attribute);
        } else {
            self.unsigned.push(attribute);
        }
        Ok(())
    }

    pub fn is_sealed(&self) -> bool {
        self.signature_value.is_some()
    }

    /// Record the computed signature value; the signed attribute set is frozen afterwards.
    pub fn seal(&mut self, value: Vec<u8>, algorithm: impl Into<String>) -> EngineResult<()> {
        if self.is_sealed() {
            return Err(EngineError::Structural("signature value already computed".into()));
        }
        self.signature_value = Some(value);
        self.signature_algorithm = Some(algorithm.into());
        Ok(())
    }

    pub fn signature_value(&self) -> Option<&[u8]> {
        self.signature_value.as_deref()
    }

    /// Concatenated canonical bytes of the signed attributes, in insertion order.
    pub fn signed_attributes_bytes(&self) -> EngineResult<Vec<u8>> {
        let mut out = Vec::new();
        for attribute in &self.signed {
            out.extend(attribute.canonical_bytes()?);
        }
        Ok(out)
    }

    pub fn signing_time(&self) -> Option<Time> {
        self.attribute(ids::SIGNING_TIME).and_then(Attribute::signing_time)
    }

    pub fn signature_time_stamp(&self) -> Option<&TimeStampToken> {
        self.attribute(ids::SIGNATURE_TIME_STAMP).and_then(Attribute::time_stamp)
    }

    pub fn policy_oid(&self) -> Option<&str> {
        self.attribute(ids::SIGNATURE_POLICY_ID).and_then(Attribute::policy_oid)
    }

    /// Signing-certificate attribute, V2 preferred over V1.
    pub fn signing_certificate_attribute(&self) -> Option<&Attribute> {
        self.attribute(ids::SIGNING_CERTIFICATE_V2)
            .or_else(|| self.attribute(ids::SIGNING_CERTIFICATE))
    }
}

/// Signatures parsed from, or being written into, one container.
#[derive(Debug, Clone, Default)]
pub struct SignatureContainer {
    signatures: Vec<Signature>,
}

impl SignatureContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_signatures(signatures: Vec<Signature>) -> Self {
        Self { signatures }
    }

    pub fn push(&mut self, signature: Signature) {
        self.signatures.push(signature);
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    pub fn signature_mut(&mut self, index: usize) -> EngineResult<&mut Signature> {
        self.signatures
            .get_mut(index)
            .ok_or_else(|| EngineError::Structural(format!("no signature at index {index}")))
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Freeze the container for serialization.
    pub fn emit(self) -> EmittedContainer {
        EmittedContainer { signatures: self.signatures.into() }
    }
}

/// A container that has been handed to an encoder; read-only and cheap to share.
#[derive(Debug, Clone)]
pub struct EmittedContainer {
    signatures: Arc<[Signature]>,
}

impl EmittedContainer {
    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }
}
