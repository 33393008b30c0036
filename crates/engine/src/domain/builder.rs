// crates/engine/src/domain/builder.rs
//! Recursive attribute construction.
//!
//! Each builder declares its prerequisites; [`AttributeFactory::build`] makes
//! sure they are present (building and appending them as unsigned attributes
//! when missing) before asking the builder for its own payload. The target
//! attribute is appended once, after every sub-build succeeded. Prerequisites
//! that were appended stay on the signature even if the target then fails.

use crate::crypto::services::HashService;
use crate::crypto::signer::PrivateInformation;
use crate::crypto::timestamper::TimeStampService;
use crate::domain::catalog::AttributeCatalog;
use crate::domain::error::{EngineError, EngineResult};
use crate::domain::path::{CertificateChain, CertificationPathValidator};
use crate::domain::policy::PolicyDocument;
use crate::domain::revocation::RevocationOracle;
use crate::domain::types::{
  Attribute, AttributeValue, Certificate, EngineConfig, HashAlgorithm, Signature, SignerLocation, Time, TrustAnchorSet,
};

/// One attribute construction strategy.
pub trait AttributeBuilder: Send + Sync {
  fn identifier(&self) -> &'static str;

  /// Attributes that must exist on the signature before this one is built, in order.
  fn prerequisites(&self) -> &'static [&'static str] {
    &[]
  }

  fn build(&self, ctx: &CreationContext<'_>, signature: &Signature) -> EngineResult<AttributeValue>;
}

/// Collaborators and inputs available to builders during one creation request.
pub struct CreationContext<'a> {
  pub policy: &'a PolicyDocument,
  pub identity: &'a dyn PrivateInformation,
  pub hasher: &'a dyn HashService,
  pub revocation: &'a dyn RevocationOracle,
  pub paths: &'a CertificationPathValidator<'a>,
  pub anchors: &'a TrustAnchorSet,
  pub time_stamps: Option<&'a dyn TimeStampService>,
  pub time_stamp_hash: HashAlgorithm,
  pub now: Time,
  /// MIME type of the signed content, used by the content hint.
  pub content_type: Option<String>,
  pub signer_location: Option<SignerLocation>,
  pub claimed_roles: Vec<String>,
  /// Attribute certificates held by the signer.
  pub attribute_certificates: Vec<Certificate>,
  /// Content of a detached signature; attached signatures carry their own.
  pub detached_content: Option<&'a [u8]>,
}

impl<'a> CreationContext<'a> {
  pub fn new(
    policy: &'a PolicyDocument,
    identity: &'a dyn PrivateInformation,
    hasher: &'a dyn HashService,
    revocation: &'a dyn RevocationOracle,
    paths: &'a CertificationPathValidator<'a>,
    anchors: &'a TrustAnchorSet,
  ) -> Self {
    Self {
      policy,
      identity,
      hasher,
      revocation,
      paths,
      anchors,
      time_stamps: None,
      time_stamp_hash: policy.hash_algorithm,
      now: chrono::Utc::now(),
      content_type: None,
      signer_location: None,
      claimed_roles: Vec::new(),
      attribute_certificates: Vec::new(),
      detached_content: None,
    }
  }

  pub fn with_time_stamps(mut self, service: &'a dyn TimeStampService, algorithm: HashAlgorithm) -> Self {
    self.time_stamps = Some(service);
    self.time_stamp_hash = algorithm;
    self
  }

  /// Apply engine-wide creation settings.
  pub fn with_config(mut self, config: &EngineConfig) -> Self {
    self.time_stamp_hash = config.time_stamp_hash_algorithm;
    self
  }

  pub fn with_now(mut self, now: Time) -> Self {
    self.now = now;
    self
  }

  pub fn with_content_type(mut self, mime: impl Into<String>) -> Self {
    self.content_type = Some(mime.into());
    self
  }

  pub fn with_signer_location(mut self, location: SignerLocation) -> Self {
    self.signer_location = Some(location);
    self
  }

  pub fn with_claimed_roles<I, S>(mut self, roles: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.claimed_roles = roles.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_attribute_certificates(mut self, certificates: Vec<Certificate>) -> Self {
    self.attribute_certificates = certificates;
    self
  }

  pub fn with_detached_content(mut self, content: &'a [u8]) -> Self {
    self.detached_content = Some(content);
    self
  }

  /// Bytes covered by the signature being built.
  pub fn signed_content<'s>(&'s self, signature: &'s Signature) -> EngineResult<&'s [u8]> {
    signature
      .content()
      .bytes()
      .or(self.detached_content)
      .ok_or_else(|| EngineError::Structural("detached signature built without its content".into()))
  }

  pub fn signer_certificate(&self) -> EngineResult<&Certificate> {
    self
      .identity
      .certificate()
      .ok_or(EngineError::MissingSignerIdentity("certificate"))
  }

  /// Chain of the signer certificate up to the configured anchors.
  pub fn signer_chain(&self) -> EngineResult<CertificateChain> {
    let signer = self.signer_certificate()?;
    Ok(self.paths.build_path(signer, self.anchors)?)
  }

  pub fn time_stamp_service(&self) -> EngineResult<&'a dyn TimeStampService> {
    self
      .time_stamps
      .ok_or_else(|| EngineError::TimeStampUnavailable("no timestamp service configured".into()))
  }
}

/// Entry point used by signing front ends.
pub struct AttributeFactory<'a> {
  catalog: &'a AttributeCatalog,
  ctx: CreationContext<'a>,
}

impl<'a> AttributeFactory<'a> {
  pub fn new(catalog: &'a AttributeCatalog, ctx: CreationContext<'a>) -> Self {
    Self { catalog, ctx }
  }

  pub fn catalog(&self) -> &'a AttributeCatalog {
    self.catalog
  }

  pub fn context(&self) -> &CreationContext<'a> {
    &self.ctx
  }

  /// Build `identifier`, filling in missing prerequisites first, and append it.
  ///
  /// Returns a copy of the appended attribute.
  pub fn build(&self, signature: &mut Signature, identifier: &str) -> EngineResult<Attribute> {
    let meta = self
      .catalog
      .meta(identifier)
      .ok_or_else(|| EngineError::NoBuilder(identifier.to_string()))?;
    let builder = meta
      .builder()
      .ok_or_else(|| EngineError::NoBuilder(identifier.to_string()))?;

    if meta.is_unique && signature.has_attribute(identifier) {
      return Err(EngineError::UniqueAttribute(identifier.to_string()));
    }
    if meta.is_signed && signature.is_sealed() {
      return Err(EngineError::SealedSignature(identifier.to_string()));
    }

    for prerequisite in builder.prerequisites() {
      if signature.has_attribute(prerequisite) {
        continue;
      }
      log::debug!(
        "building prerequisite {} for {}",
        self.catalog.name_of(prerequisite),
        meta.name
      );
      self
        .build(signature, prerequisite)
        .map_err(|e| EngineError::DependencyBuild {
          attribute: meta.name.clone(),
          prerequisite: self.catalog.name_of(prerequisite).to_string(),
          source: Box::new(e),
        })?;
    }

    let value = builder.build(&self.ctx, signature)?;
    let attribute = Attribute::new(meta.identifier.clone(), meta.is_signed, meta.is_unique, value);
    signature.add_attribute(attribute.clone())?;
    log::debug!("added {} attribute {}", if meta.is_signed { "signed" } else { "unsigned" }, meta.name);
    Ok(attribute)
  }
}
