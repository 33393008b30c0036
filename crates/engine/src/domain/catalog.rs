// crates/engine/src/domain/catalog.rs
//! Attribute registry: identifier -> metadata and builder.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::domain::builder::AttributeBuilder;
use crate::domain::creators;
use crate::domain::error::{EngineError, EngineResult};
use crate::domain::types::ids;

pub type BuilderHandle = Arc<dyn AttributeBuilder>;

#[derive(Clone)]
pub struct AttributeMeta {
  pub identifier: String,
  pub name: String,
  pub is_signed: bool,
  pub is_unique: bool,
  builder: Option<BuilderHandle>,
}

impl AttributeMeta {
  pub fn signed(identifier: impl Into<String>, name: impl Into<String>, is_unique: bool) -> Self {
    Self { identifier: identifier.into(), name: name.into(), is_signed: true, is_unique, builder: None }
  }

  pub fn unsigned(identifier: impl Into<String>, name: impl Into<String>, is_unique: bool) -> Self {
    Self { identifier: identifier.into(), name: name.into(), is_signed: false, is_unique, builder: None }
  }

  pub fn with_builder(mut self, builder: BuilderHandle) -> Self {
    self.builder = Some(builder);
    self
  }

  pub fn builder(&self) -> Option<&BuilderHandle> {
    self.builder.as_ref()
  }

  pub fn prerequisites(&self) -> &'static [&'static str] {
    self.builder.as_ref().map(|b| b.prerequisites()).unwrap_or(&[])
  }
}

impl fmt::Debug for AttributeMeta {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AttributeMeta")
      .field("identifier", &self.identifier)
      .field("name", &self.name)
      .field("is_signed", &self.is_signed)
      .field("is_unique", &self.is_unique)
      .field("has_builder", &self.builder.is_some())
      .finish()
  }
}

/// Immutable lookup table, built once and passed by reference.
#[derive(Debug, Clone, Default)]
pub struct AttributeCatalog {
  entries: HashMap<String, AttributeMeta>,
}

impl AttributeCatalog {
  pub fn empty() -> Self {
    Self::default()
  }

  /// CAdES attribute set with a builder for every attribute the engine can create.
  pub fn standard() -> EngineResult<Self> {
    let mut catalog = Self::empty();
    for meta in standard_entries() {
      catalog.entries.insert(meta.identifier.clone(), meta);
    }
    catalog.validate()?;
    Ok(catalog)
  }

  /// Builder registered for `identifier`, if any.
  pub fn class_for(&self, identifier: &str) -> Option<BuilderHandle> {
    self.entries.get(identifier).and_then(|m| m.builder.clone())
  }

  pub fn meta(&self, identifier: &str) -> Option<&AttributeMeta> {
    self.entries.get(identifier)
  }

  pub fn name_of<'a>(&'a self, identifier: &'a str) -> &'a str {
    self.entries.get(identifier).map(|m| m.name.as_str()).unwrap_or(identifier)
  }

  pub fn contains(&self, identifier: &str) -> bool {
    self.entries.contains_key(identifier)
  }

  /// Extension point. The catalog is left untouched when the new entry would
  /// break an invariant.
  pub fn register(&mut self, meta: AttributeMeta) -> EngineResult<()> {
    let previous = self.entries.insert(meta.identifier.clone(), meta.clone());
    if let Err(e) = self.validate() {
      match previous {
        Some(old) => self.entries.insert(meta.identifier.clone(), old),
        None => self.entries.remove(&meta.identifier),
      };
      return Err(e);
    }
    log::debug!("registered attribute {} ({})", meta.name, meta.identifier);
    Ok(())
  }

  /// Every prerequisite must be registered, unsigned, and the graph acyclic.
  pub fn validate(&self) -> EngineResult<()> {
    for meta in self.entries.values() {
      if let Some(builder) = &meta.builder {
        if builder.identifier() != meta.identifier {
          return Err(EngineError::Config(format!(
            "builder for {} is registered under {}",
            builder.identifier(),
            meta.identifier
          )));
        }
      }
      for prerequisite in meta.prerequisites() {
        let Some(pre) = self.entries.get(*prerequisite) else {
          return Err(EngineError::Config(format!(
            "{} requires unregistered attribute {}",
            meta.identifier, prerequisite
          )));
        };
        if pre.is_signed {
          return Err(EngineError::Config(format!(
            "{} requires signed attribute {}; prerequisites are appended unsigned",
            meta.identifier, prerequisite
          )));
        }
        if pre.builder.is_none() {
          return Err(EngineError::Config(format!(
            "{} requires {} which has no builder",
            meta.identifier, prerequisite
          )));
        }
      }
    }
    self.check_acyclic()
  }

  fn check_acyclic(&self) -> EngineResult<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
      Visiting,
      Done,
    }

    fn visit<'a>(
      catalog: &'a AttributeCatalog,
      id: &'a str,
      marks: &mut BTreeMap<&'a str, Mark>,
      stack: &mut Vec<&'a str>,
    ) -> EngineResult<()> {
      match marks.get(id) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => {
          stack.push(id);
          return Err(EngineError::Config(format!(
            "attribute prerequisite cycle: {}",
            stack.join(" -> ")
          )));
        }
        None => {}
      }
      marks.insert(id, Mark::Visiting);
      stack.push(id);
      if let Some(meta) = catalog.entries.get(id) {
        for prerequisite in meta.prerequisites() {
          visit(catalog, prerequisite, marks, stack)?;
        }
      }
      stack.pop();
      marks.insert(id, Mark::Done);
      Ok(())
    }

    let mut marks = BTreeMap::new();
    let mut ids: Vec<&str> = self.entries.keys().map(String::as_str).collect();
    ids.sort_unstable();
    for id in ids {
      visit(self, id, &mut marks, &mut Vec::new())?;
    }
    Ok(())
  }
}

fn standard_entries() -> Vec<AttributeMeta> {
  use creators::*;

  vec![
    AttributeMeta::signed(ids::CONTENT_TYPE, "IdContentType", true).with_builder(Arc::new(ContentTypeBuilder)),
    AttributeMeta::signed(ids::MESSAGE_DIGEST, "IdMessageDigest", true).with_builder(Arc::new(MessageDigestBuilder)),
    AttributeMeta::signed(ids::SIGNING_TIME, "IdSigningTime", true).with_builder(Arc::new(SigningTimeBuilder)),
    AttributeMeta::signed(ids::CONTENT_HINT, "IdAaContentHint", true).with_builder(Arc::new(ContentHintBuilder)),
    AttributeMeta::signed(ids::SIGNING_CERTIFICATE, "IdAaSigningCertificate", true)
      .with_builder(Arc::new(SigningCertificateBuilder::v1())),
    AttributeMeta::signed(ids::SIGNING_CERTIFICATE_V2, "IdAaSigningCertificateV2", true)
      .with_builder(Arc::new(SigningCertificateBuilder::v2())),
    AttributeMeta::signed(ids::SIGNATURE_POLICY_ID, "IdAaEtsSigPolicyId", true)
      .with_builder(Arc::new(SignaturePolicyIdBuilder)),
    AttributeMeta::signed(ids::SIGNER_LOCATION, "IdAaEtsSignerLocation", true)
      .with_builder(Arc::new(SignerLocationBuilder)),
    AttributeMeta::signed(ids::SIGNER_ATTRIBUTES, "IdAaEtsSignerAttr", true)
      .with_builder(Arc::new(SignerAttributesBuilder)),
    AttributeMeta::unsigned(ids::COUNTER_SIGNATURE, "IdCounterSignature", false),
    AttributeMeta::unsigned(ids::SIGNATURE_TIME_STAMP, "IdAaSignatureTimeStamp", false)
      .with_builder(Arc::new(SignatureTimeStampBuilder)),
    AttributeMeta::unsigned(ids::CERTIFICATE_REFS, "IdAaEtsCertificateRefs", true)
      .with_builder(Arc::new(CertificateRefsBuilder)),
    AttributeMeta::unsigned(ids::REVOCATION_REFS, "IdAaEtsRevocationRefs", true)
      .with_builder(Arc::new(RevocationRefsBuilder)),
    AttributeMeta::unsigned(ids::CERTIFICATE_VALUES, "IdAaEtsCertValues", true)
      .with_builder(Arc::new(CertificateValuesBuilder)),
    AttributeMeta::unsigned(ids::REVOCATION_VALUES, "IdAaEtsRevocationValues", true)
      .with_builder(Arc::new(RevocationValuesBuilder)),
    AttributeMeta::unsigned(ids::ESC_TIME_STAMP, "IdAaEtsEscTimeStamp", false)
      .with_builder(Arc::new(EscTimeStampBuilder)),
    AttributeMeta::unsigned(ids::ATTR_CERTIFICATE_REFS, "IdAaEtsAttrCertificateRefs", true)
      .with_builder(Arc::new(AttrCertificateRefsBuilder)),
    AttributeMeta::unsigned(ids::ATTR_REVOCATION_REFS, "IdAaEtsAttrRevocationRefs", true)
      .with_builder(Arc::new(AttrRevocationRefsBuilder)),
    AttributeMeta::unsigned(ids::ARCHIVE_TIME_STAMP_V2, "IdAaEtsArchiveTimeStampV2", false)
      .with_builder(Arc::new(ArchiveTimeStampBuilder)),
  ]
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::builder::CreationContext;
  use crate::domain::types::{AttributeValue, Signature};

  struct Looping {
    id: &'static str,
    pre: &'static [&'static str],
  }

  impl AttributeBuilder for Looping {
    fn identifier(&self) -> &'static str {
      self.id
    }
    fn prerequisites(&self) -> &'static [&'static str] {
      self.pre
    }
    fn build(&self, _: &CreationContext<'_>, _: &Signature) -> EngineResult<AttributeValue> {
      Ok(AttributeValue::Encoded(vec![]))
    }
  }

  #[test]
  fn standard_catalog_is_valid() {
    let catalog = AttributeCatalog::standard().unwrap();
    assert!(catalog.class_for(ids::ARCHIVE_TIME_STAMP_V2).is_some());
    assert!(catalog.class_for(ids::COUNTER_SIGNATURE).is_none());
    assert_eq!(catalog.name_of(ids::SIGNING_TIME), "IdSigningTime");
    assert_eq!(catalog.name_of("1.2.3.4"), "1.2.3.4");
  }

  #[test]
  fn cycle_is_rejected_and_catalog_left_unchanged() {
    let mut catalog = AttributeCatalog::empty();
    catalog
      .register(AttributeMeta::unsigned("1.1", "a", true).with_builder(Arc::new(Looping { id: "1.1", pre: &[] })))
      .unwrap();
    catalog
      .register(AttributeMeta::unsigned("1.2", "b", true).with_builder(Arc::new(Looping { id: "1.2", pre: &["1.1"] })))
      .unwrap();

    let err = catalog
      .register(AttributeMeta::unsigned("1.1", "a", true).with_builder(Arc::new(Looping { id: "1.1", pre: &["1.2"] })))
      .unwrap_err();
    assert!(err.to_string().contains("cycle"));
    assert!(catalog.meta("1.1").unwrap().prerequisites().is_empty());
  }

  #[test]
  fn unregistered_prerequisite_is_rejected() {
    let mut catalog = AttributeCatalog::empty();
    let err = catalog
      .register(AttributeMeta::unsigned("1.3", "c", true).with_builder(Arc::new(Looping { id: "1.3", pre: &["9.9"] })))
      .unwrap_err();
    assert!(err.to_string().contains("unregistered"));
    assert!(!catalog.contains("1.3"));
  }
}
