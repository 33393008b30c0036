// crates/engine/src/domain/creators/validation_data.rs
//! Complete certificate/revocation references and values (CAdES-C and -XL material).

use crate::domain::builder::{AttributeBuilder, CreationContext};
use crate::domain::creators::certificate_references;
use crate::domain::error::{EngineError, EngineResult};
use crate::domain::path::CertificateChain;
use crate::domain::revocation::RevocationData;
use crate::domain::types::{ids, AttributeValue, Certificate, RevocationReference, Signature};

/// Every certificate of the signer path except the signer itself, anchor included.
fn path_without_signer(chain: &CertificateChain) -> Vec<&Certificate> {
  chain.with_anchor().into_iter().skip(1).collect()
}

/// Revocation data for each link of the signer path, without duplicates.
fn path_revocation_data(ctx: &CreationContext<'_>, chain: &CertificateChain) -> Vec<RevocationData> {
  let mut collected: Vec<RevocationData> = Vec::new();
  for (_, cert, issuer) in chain.links() {
    let lookup = ctx.revocation.revocation_status(cert, Some(issuer), ctx.now);
    match lookup.data {
      Some(data) if !collected.contains(&data) => collected.push(data),
      Some(_) => {}
      None => log::warn!("no revocation data for {} ({:?})", cert.subject, lookup.status),
    }
  }
  collected
}

fn revocation_references(ctx: &CreationContext<'_>, data: Vec<RevocationData>) -> EngineResult<Vec<RevocationReference>> {
  let algorithm = ctx.policy.hash_algorithm;
  let mut references = Vec::new();
  for data in data {
    references.push(RevocationReference {
      source: data.source,
      issuer: data.issuer.clone(),
      produced_at: data.this_update,
      algorithm,
      digest: ctx.hasher.digest(algorithm, &data.encoded)?,
    });
  }
  Ok(references)
}

fn attribute_certificates<'c>(ctx: &'c CreationContext<'_>, what: &str) -> EngineResult<&'c [Certificate]> {
  if ctx.attribute_certificates.is_empty() {
    return Err(EngineError::Config(format!("{what} requested but the signer holds no attribute certificates")));
  }
  Ok(&ctx.attribute_certificates)
}

pub struct CertificateRefsBuilder;

impl AttributeBuilder for CertificateRefsBuilder {
  fn identifier(&self) -> &'static str {
    ids::CERTIFICATE_REFS
  }

  fn build(&self, ctx: &CreationContext<'_>, _signature: &Signature) -> EngineResult<AttributeValue> {
    let chain = ctx.signer_chain()?;
    let references = certificate_references(ctx, ctx.policy.hash_algorithm, path_without_signer(&chain))?;
    Ok(AttributeValue::CertificateReferences(references))
  }
}

pub struct RevocationRefsBuilder;

impl AttributeBuilder for RevocationRefsBuilder {
  fn identifier(&self) -> &'static str {
    ids::REVOCATION_REFS
  }

  fn build(&self, ctx: &CreationContext<'_>, _signature: &Signature) -> EngineResult<AttributeValue> {
    let chain = ctx.signer_chain()?;
    let references = revocation_references(ctx, path_revocation_data(ctx, &chain))?;
    Ok(AttributeValue::RevocationReferences(references))
  }
}

/// References to the attribute certificates carried in the signer attributes.
pub struct AttrCertificateRefsBuilder;

impl AttributeBuilder for AttrCertificateRefsBuilder {
  fn identifier(&self) -> &'static str {
    ids::ATTR_CERTIFICATE_REFS
  }

  fn build(&self, ctx: &CreationContext<'_>, _signature: &Signature) -> EngineResult<AttributeValue> {
    let certificates = attribute_certificates(ctx, "attribute certificate references")?;
    let references = certificate_references(ctx, ctx.policy.hash_algorithm, certificates)?;
    Ok(AttributeValue::CertificateReferences(references))
  }
}

/// References to the revocation data of each attribute certificate.
pub struct AttrRevocationRefsBuilder;

impl AttributeBuilder for AttrRevocationRefsBuilder {
  fn identifier(&self) -> &'static str {
    ids::ATTR_REVOCATION_REFS
  }

  fn build(&self, ctx: &CreationContext<'_>, _signature: &Signature) -> EngineResult<AttributeValue> {
    let mut collected: Vec<RevocationData> = Vec::new();
    for cert in attribute_certificates(ctx, "attribute revocation references")? {
      let lookup = ctx.revocation.revocation_status(cert, None, ctx.now);
      match lookup.data {
        Some(data) if !collected.contains(&data) => collected.push(data),
        Some(_) => {}
        None => log::warn!("no revocation data for attribute certificate {} ({:?})", cert.subject, lookup.status),
      }
    }
    Ok(AttributeValue::RevocationReferences(revocation_references(ctx, collected)?))
  }
}

pub struct CertificateValuesBuilder;

impl AttributeBuilder for CertificateValuesBuilder {
  fn identifier(&self) -> &'static str {
    ids::CERTIFICATE_VALUES
  }

  fn build(&self, ctx: &CreationContext<'_>, _signature: &Signature) -> EngineResult<AttributeValue> {
    let chain = ctx.signer_chain()?;
    let values = path_without_signer(&chain).into_iter().map(|c| hex::encode(&c.der)).collect();
    Ok(AttributeValue::CertificateValues(values))
  }
}

pub struct RevocationValuesBuilder;

impl AttributeBuilder for RevocationValuesBuilder {
  fn identifier(&self) -> &'static str {
    ids::REVOCATION_VALUES
  }

  fn build(&self, ctx: &CreationContext<'_>, _signature: &Signature) -> EngineResult<AttributeValue> {
    let chain = ctx.signer_chain()?;
    Ok(AttributeValue::RevocationValues(path_revocation_data(ctx, &chain)))
  }
}
