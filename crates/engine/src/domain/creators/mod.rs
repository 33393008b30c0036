// crates/engine/src/domain/creators/mod.rs
//! Builders for the standard CAdES attributes.
//!
//! `signed` holds the attributes covered by the signature value,
//! `validation_data` the certificate and revocation material added after
//! sealing, `timestamps` everything that needs a TSA round trip.

mod signed;
mod timestamps;
mod validation_data;

pub use signed::{
  ContentHintBuilder, ContentTypeBuilder, MessageDigestBuilder, SignaturePolicyIdBuilder, SignerAttributesBuilder,
  SignerLocationBuilder, SigningCertificateBuilder, SigningTimeBuilder,
};
pub use timestamps::{ArchiveTimeStampBuilder, EscTimeStampBuilder, SignatureTimeStampBuilder};
pub use validation_data::{
  AttrCertificateRefsBuilder, AttrRevocationRefsBuilder, CertificateRefsBuilder, CertificateValuesBuilder,
  RevocationRefsBuilder, RevocationValuesBuilder,
};

use crate::domain::builder::CreationContext;
use crate::domain::types::{Certificate, CertificateReference, CertificateReferences, HashAlgorithm};
use crate::domain::error::EngineResult;

pub(crate) fn certificate_references<'c>(
  ctx: &CreationContext<'_>,
  algorithm: HashAlgorithm,
  certificates: impl IntoIterator<Item = &'c Certificate>,
) -> EngineResult<CertificateReferences> {
  let mut references = Vec::new();
  for cert in certificates {
    references.push(CertificateReference {
      digest: ctx.hasher.digest(algorithm, &cert.der)?,
      issuer: cert.issuer.clone(),
      serial: cert.serial.clone(),
    });
  }
  Ok(CertificateReferences { algorithm, references })
}
