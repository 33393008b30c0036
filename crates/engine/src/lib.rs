// crates/engine/src/lib.rs

//! Public facade for the Que AdES engine.
//! Attribute dependency resolution, certification path validation and policy
//! conformance for CAdES/XAdES/PAdES signatures. Exposes a stable API and
//! re-exports the types front ends need.

pub mod adapters;
pub mod crypto;
pub mod domain;

use std::str::FromStr;

use domain::error::EngineResult;

// High-level helpers for the common paths.
// They wire the explicit collaborators together; nothing here holds state.

/// Build `identifier` on `signature`, creating missing prerequisites first.
pub fn build_attribute(
    catalog: &AttributeCatalog,
    ctx: CreationContext<'_>,
    signature: &mut Signature,
    identifier: &str,
) -> EngineResult<Attribute> {
    AttributeFactory::new(catalog, ctx).build(signature, identifier)
}

/// Verify every signature in `bytes` (a signature container or a PDF).
pub fn verify_signatures(selector: &VerifierSelector<'_>, bytes: &[u8], detached: Option<&[u8]>) -> Report {
    selector.verify(bytes, detached)
}

/// Load a JSON array of policies and, optionally, the list of accepted policies.
pub fn load_policies(policies_json: &str, lpa_json: Option<&str>) -> EngineResult<PolicyCatalogue> {
    let catalogue = PolicyCatalogue::from_json(policies_json)?;
    Ok(match lpa_json {
        Some(json) => catalogue.with_policy_list(PolicyList::from_json(json)?),
        None => catalogue,
    })
}

/// Trust anchors from every certificate in a PEM bundle.
pub fn trust_anchors_from_pem(pem: &[u8]) -> EngineResult<TrustAnchorSet> {
    Ok(TrustAnchorSet::from_certificates(adapters::x509::decode_pem(pem)?))
}

/// Resolve a signer URI (`local:cert.pem,key.pem` or `env:CERT_VAR,KEY_VAR`).
pub fn load_signer(uri: &str) -> EngineResult<SignerIdentity> {
    SignerSource::from_str(uri)?.resolve()
}

/// Path validator honouring the configured depth and persistence settings.
pub fn path_validator<'a>(
    config: &EngineConfig,
    collection: &'a dyn CertificateCollection,
    oracle: &'a dyn RevocationOracle,
    verifier: &'a dyn SignService,
) -> CertificationPathValidator<'a> {
    CertificationPathValidator::new(collection, oracle, verifier)
        .with_limits(config.limits())
        .with_persistence(config.persist_discovered_certificates)
}

// Re-exports for convenience
pub use adapters::memory::{InMemoryCertificateCollection, StaticRevocationOracle};
#[cfg(feature = "openssl")]
pub use adapters::openssl::{OpenSslHashService, OpenSslSignService};
pub use crypto::services::{HashService, SignService};
pub use crypto::signer::{PrivateInformation, PrivateKey, SignerIdentity, SignerSource};
pub use crypto::timestamper::{TimeStampAuthority, TimeStampService};
pub use domain::builder::{AttributeBuilder, AttributeFactory, CreationContext};
pub use domain::catalog::{AttributeCatalog, AttributeMeta};
pub use domain::conformance::{ConformanceReport, PolicyViolation, SignaturePolicyEngine};
pub use domain::creator::SignatureCreator;
pub use domain::error::{EngineError, PathError};
pub use domain::family::{FamilyKind, FamilyList, PolicyScopedFamily, SignatureFamily};
pub use domain::path::{CertificateChain, CertificateCollection, CertificationPathValidator, PathCache};
pub use domain::pdf::PdfInspector;
pub use domain::policy::{PolicyCatalogue, PolicyDocument, PolicyList, RevocationRequirement};
pub use domain::revocation::RevocationOracle;
pub use domain::selector::VerifierSelector;
pub use domain::types::{Attribute, Certificate, EngineConfig, Signature, TrustAnchorSet};
pub use domain::validation::{PathValidation, ValidationResult};
pub use domain::verify::{Report, SignatureReport, Verdict};
