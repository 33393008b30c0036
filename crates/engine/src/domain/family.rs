// crates/engine/src/domain/family.rs
//! Signature families: one parser/verifier per container format.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::error::EngineResult;
use crate::domain::types::{Certificate, Signature, SignatureContainer};

/// Families in selection priority order; the derived `Ord` is that order.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FamilyKind {
    Cms,
    Pades,
    Cades,
    Xades,
    Xml,
}

/// Policy OID arcs of the PAdES policies (ICP-Brasil AD-R*).
pub const PADES_POLICY_ARCS: &[&str] = &[
    "2.16.76.1.7.1.11",
    "2.16.76.1.7.1.12",
    "2.16.76.1.7.1.13",
    "2.16.76.1.7.1.14",
];

pub trait SignatureFamily: Send + Sync {
    fn kind(&self) -> FamilyKind;

    /// Cheap sniffing; must not fail on arbitrary input.
    fn supports(&self, bytes: &[u8], detached: Option<&[u8]>) -> bool;

    fn parse_signatures(&self, bytes: &[u8], detached: Option<&[u8]>) -> EngineResult<SignatureContainer>;

    fn signing_certificate(&self, signature: &Signature) -> EngineResult<Certificate>;

    /// Whether the signature value verifies with the signer key over the signed data.
    fn verify_signature_value(
        &self,
        signature: &Signature,
        signer: &Certificate,
        detached: Option<&[u8]>,
    ) -> EngineResult<bool>;
}

/// A family that only claims signatures made under a set of policy arcs.
///
/// Used for PAdES: the bytes inside a PDF signature dictionary are CMS, and
/// only the policy identifier tells the two apart.
pub struct PolicyScopedFamily {
    kind: FamilyKind,
    inner: Arc<dyn SignatureFamily>,
    arcs: Vec<String>,
}

impl PolicyScopedFamily {
    pub fn new(kind: FamilyKind, inner: Arc<dyn SignatureFamily>, arcs: &[&str]) -> Self {
        Self { kind, inner, arcs: arcs.iter().map(|a| a.to_string()).collect() }
    }

    pub fn pades(inner: Arc<dyn SignatureFamily>) -> Self {
        Self::new(FamilyKind::Pades, inner, PADES_POLICY_ARCS)
    }

    fn in_scope(&self, oid: &str) -> bool {
        self.arcs
            .iter()
            .any(|arc| oid == arc || oid.strip_prefix(arc.as_str()).map(|rest| rest.starts_with('.')).unwrap_or(false))
    }
}

impl SignatureFamily for PolicyScopedFamily {
    fn kind(&self) -> FamilyKind {
        self.kind
    }

    fn supports(&self, bytes: &[u8], detached: Option<&[u8]>) -> bool {
        if !self.inner.supports(bytes, detached) {
            return false;
        }
        match self.inner.parse_signatures(bytes, detached) {
            Ok(container) => {
                !container.is_empty()
                    && container
                        .signatures()
                        .iter()
                        .all(|s| s.policy_oid().map(|oid| self.in_scope(oid)).unwrap_or(false))
            }
            Err(_) => false,
        }
    }

    fn parse_signatures(&self, bytes: &[u8], detached: Option<&[u8]>) -> EngineResult<SignatureContainer> {
        self.inner.parse_signatures(bytes, detached)
    }

    fn signing_certificate(&self, signature: &Signature) -> EngineResult<Certificate> {
        self.inner.signing_certificate(signature)
    }

    fn verify_signature_value(
        &self,
        signature: &Signature,
        signer: &Certificate,
        detached: Option<&[u8]>,
    ) -> EngineResult<bool> {
        self.inner.verify_signature_value(signature, signer, detached)
    }
}

/// Families sorted by [`FamilyKind`] priority. Ties keep registration order.
#[derive(Clone, Default)]
pub struct FamilyList {
    families: Vec<Arc<dyn SignatureFamily>>,
}

impl FamilyList {
    pub fn new(mut families: Vec<Arc<dyn SignatureFamily>>) -> Self {
        families.sort_by_key(|f| f.kind());
        Self { families }
    }

    /// First family, in priority order, that claims the input.
    pub fn select(&self, bytes: &[u8], detached: Option<&[u8]>) -> Option<&Arc<dyn SignatureFamily>> {
        self.families.iter().find(|f| f.supports(bytes, detached))
    }

    pub fn kinds(&self) -> Vec<FamilyKind> {
        self.families.iter().map(|f| f.kind()).collect()
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }
}
