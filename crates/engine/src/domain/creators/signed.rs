// crates/engine/src/domain/creators/signed.rs
use crate::domain::builder::{AttributeBuilder, CreationContext};
use crate::domain::creators::certificate_references;
use crate::domain::error::{EngineError, EngineResult};
use crate::domain::policy::CertInfoReq;
use crate::domain::types::{ids, AttributeValue, HashAlgorithm, Signature};

const DEFAULT_CONTENT_MIME: &str = "application/octet-stream";

pub struct ContentTypeBuilder;

impl AttributeBuilder for ContentTypeBuilder {
  fn identifier(&self) -> &'static str {
    ids::CONTENT_TYPE
  }

  fn build(&self, _ctx: &CreationContext<'_>, _signature: &Signature) -> EngineResult<AttributeValue> {
    Ok(AttributeValue::ContentType(ids::ID_DATA.to_string()))
  }
}

/// Digest of the signed content with the policy hash algorithm.
pub struct MessageDigestBuilder;

impl AttributeBuilder for MessageDigestBuilder {
  fn identifier(&self) -> &'static str {
    ids::MESSAGE_DIGEST
  }

  fn build(&self, ctx: &CreationContext<'_>, signature: &Signature) -> EngineResult<AttributeValue> {
    let algorithm = ctx.policy.hash_algorithm;
    let digest = ctx.hasher.digest(algorithm, ctx.signed_content(signature)?)?;
    Ok(AttributeValue::MessageDigest { algorithm, digest })
  }
}

pub struct SigningTimeBuilder;

impl AttributeBuilder for SigningTimeBuilder {
  fn identifier(&self) -> &'static str {
    ids::SIGNING_TIME
  }

  fn build(&self, ctx: &CreationContext<'_>, _signature: &Signature) -> EngineResult<AttributeValue> {
    Ok(AttributeValue::SigningTime(ctx.now))
  }
}

pub struct ContentHintBuilder;

impl AttributeBuilder for ContentHintBuilder {
  fn identifier(&self) -> &'static str {
    ids::CONTENT_HINT
  }

  fn build(&self, ctx: &CreationContext<'_>, _signature: &Signature) -> EngineResult<AttributeValue> {
    let content_type = ctx.content_type.clone().unwrap_or_else(|| DEFAULT_CONTENT_MIME.to_string());
    Ok(AttributeValue::ContentHint { description: "signed content".into(), content_type })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SigningCertificateVersion {
  V1,
  V2,
}

/// ESS signing-certificate attribute.
///
/// V1 always references with SHA-1. V2 uses the policy hash algorithm and
/// refuses SHA-1 outright.
pub struct SigningCertificateBuilder {
  version: SigningCertificateVersion,
}

impl SigningCertificateBuilder {
  pub fn v1() -> Self {
    Self { version: SigningCertificateVersion::V1 }
  }

  pub fn v2() -> Self {
    Self { version: SigningCertificateVersion::V2 }
  }

  fn algorithm(&self, ctx: &CreationContext<'_>) -> EngineResult<HashAlgorithm> {
    match self.version {
      SigningCertificateVersion::V1 => Ok(HashAlgorithm::Sha1),
      SigningCertificateVersion::V2 if ctx.policy.hash_algorithm == HashAlgorithm::Sha1 => {
        Err(EngineError::ForbiddenHashAlgorithm {
          attribute: "IdAaSigningCertificateV2".into(),
          algorithm: HashAlgorithm::Sha1.to_string(),
        })
      }
      SigningCertificateVersion::V2 => Ok(ctx.policy.hash_algorithm),
    }
  }
}

impl AttributeBuilder for SigningCertificateBuilder {
  fn identifier(&self) -> &'static str {
    match self.version {
      SigningCertificateVersion::V1 => ids::SIGNING_CERTIFICATE,
      SigningCertificateVersion::V2 => ids::SIGNING_CERTIFICATE_V2,
    }
  }

  fn build(&self, ctx: &CreationContext<'_>, _signature: &Signature) -> EngineResult<AttributeValue> {
    let algorithm = self.algorithm(ctx)?;
    let signer = ctx.signer_certificate()?;

    let references = if ctx.policy.mandated_certificate_info == CertInfoReq::FullPath {
      let chain = ctx.signer_chain()?;
      certificate_references(ctx, algorithm, chain.with_anchor())?
    } else {
      certificate_references(ctx, algorithm, [signer])?
    };
    Ok(AttributeValue::CertificateReferences(references))
  }
}

pub struct SignaturePolicyIdBuilder;

impl AttributeBuilder for SignaturePolicyIdBuilder {
  fn identifier(&self) -> &'static str {
    ids::SIGNATURE_POLICY_ID
  }

  fn build(&self, ctx: &CreationContext<'_>, _signature: &Signature) -> EngineResult<AttributeValue> {
    Ok(AttributeValue::PolicyIdentifier {
      oid: ctx.policy.id.clone(),
      algorithm: ctx.policy.hash_algorithm,
      digest: ctx.policy.policy_hash.clone(),
    })
  }
}

pub struct SignerLocationBuilder;

impl AttributeBuilder for SignerLocationBuilder {
  fn identifier(&self) -> &'static str {
    ids::SIGNER_LOCATION
  }

  fn build(&self, ctx: &CreationContext<'_>, _signature: &Signature) -> EngineResult<AttributeValue> {
    ctx
      .signer_location
      .clone()
      .map(AttributeValue::SignerLocation)
      .ok_or_else(|| EngineError::Config("signer location requested but none supplied".into()))
  }
}

/// Claimed roles and attribute certificates of the signer.
pub struct SignerAttributesBuilder;

impl AttributeBuilder for SignerAttributesBuilder {
  fn identifier(&self) -> &'static str {
    ids::SIGNER_ATTRIBUTES
  }

  fn build(&self, ctx: &CreationContext<'_>, _signature: &Signature) -> EngineResult<AttributeValue> {
    if ctx.claimed_roles.is_empty() && ctx.attribute_certificates.is_empty() {
      return Err(EngineError::Config(
        "signer attributes requested but no roles or attribute certificates supplied".into(),
      ));
    }
    Ok(AttributeValue::SignerAttributes {
      claimed: ctx.claimed_roles.clone(),
      certified: ctx.attribute_certificates.iter().map(|c| hex::encode(&c.der)).collect(),
    })
  }
}
