// crates/engine/src/domain/creator.rs
use crate::crypto::services::SignService;
use crate::domain::builder::AttributeFactory;
use crate::domain::error::{EngineError, EngineResult};
use crate::domain::types::{Signature, SignedContent};

/// Drives creation of one signature under the factory's policy.
///
/// Signed attributes are built first, the signature value is computed over
/// them, then the unsigned attributes are added.
pub struct SignatureCreator<'a> {
  factory: AttributeFactory<'a>,
  signer: &'a dyn SignService,
  optional: Vec<String>,
}

impl<'a> SignatureCreator<'a> {
  /// Starts with the optional attributes the policy lists.
  pub fn new(factory: AttributeFactory<'a>, signer: &'a dyn SignService) -> Self {
    let optional = factory.context().policy.optional_attributes.clone();
    Self { factory, signer, optional }
  }

  /// More attributes to add on top of the mandated ones when a builder exists.
  pub fn with_optional_attributes<I, S>(mut self, identifiers: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    for identifier in identifiers.into_iter().map(Into::into) {
      if !self.optional.contains(&identifier) {
        self.optional.push(identifier);
      }
    }
    self
  }

  pub fn factory(&self) -> &AttributeFactory<'a> {
    &self.factory
  }

  pub fn create(&self, content: SignedContent) -> EngineResult<Signature> {
    let mut signature = Signature::new(content);
    self.sign(&mut signature)?;
    Ok(signature)
  }

  pub fn sign(&self, signature: &mut Signature) -> EngineResult<()> {
    let ctx = self.factory.context();
    let key = ctx
      .identity
      .private_key()
      .ok_or(EngineError::MissingSignerIdentity("private key"))?;
    let certificate = ctx.signer_certificate()?;
    let policy = ctx.policy;

    for identifier in &policy.mandated_signed_attributes {
      if !signature.has_attribute(identifier) {
        self.factory.build(signature, identifier)?;
      }
    }
    self.build_optional(signature, true)?;

    let algorithm = policy
      .hash_algorithm
      .signature_algorithm_for(&certificate.public_key_algorithm)
      .ok_or_else(|| {
        EngineError::Config(format!(
          "no signature algorithm for key type {} with {}",
          certificate.public_key_algorithm, policy.hash_algorithm
        ))
      })?;
    let value = self.signer.sign(algorithm, key, &signature.signed_attributes_bytes()?)?;
    signature.seal(value, algorithm)?;
    log::debug!("signature sealed with {algorithm} for {}", certificate.subject);

    for cert in std::iter::once(certificate).chain(ctx.identity.chain()) {
      if !signature.certificates.contains(cert) {
        signature.certificates.push(cert.clone());
      }
    }

    for identifier in &policy.mandated_unsigned_attributes {
      if !signature.has_attribute(identifier) {
        self.factory.build(signature, identifier)?;
      }
    }
    self.build_optional(signature, false)
  }

  fn build_optional(&self, signature: &mut Signature, signed: bool) -> EngineResult<()> {
    let catalog = self.factory.catalog();
    for identifier in &self.optional {
      let Some(meta) = catalog.meta(identifier) else {
        log::warn!("optional attribute {identifier} is not in the catalog; skipped");
        continue;
      };
      if meta.is_signed != signed || signature.has_attribute(identifier) {
        continue;
      }
      if meta.builder().is_none() {
        log::warn!("no builder for optional attribute {}; skipped", meta.name);
        continue;
      }
      if let Err(e) = self.factory.build(signature, identifier) {
        if e.aborts_creation() {
          return Err(e);
        }
        log::warn!("optional attribute {} not added: {e}", meta.name);
      }
    }
    Ok(())
  }
}
