// crates/engine/src/domain/conformance.rs
//! Evaluation of a parsed signature against a signature policy.
//!
//! Every check runs; findings are collected into a [`ConformanceReport`]
//! instead of being returned as errors.

use std::fmt;

use thiserror::Error;

use crate::crypto::services::HashService;
use crate::domain::catalog::AttributeCatalog;
use crate::domain::path::CertificationPathValidator;
use crate::domain::policy::{CertInfoReq, PolicyDocument};
use crate::domain::types::{
  ids, signature_algorithm_name, Attribute, AttributeValue, Certificate, Signature, Time, TrustAnchorSet,
};
use crate::domain::validation::{PathValidation, ValidationResult};
use crate::domain::verify::{AttributeFinding, AttributeStatus, CertPathReport, TimeStampReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingReason {
  Absent,
  /// Present only in the unsigned set while the policy mandates it signed.
  Unsigned,
}

impl fmt::Display for MissingReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      MissingReason::Absent => f.write_str("absent"),
      MissingReason::Unsigned => f.write_str("present but not signed"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingAttribute {
  pub identifier: String,
  pub name: String,
  pub reason: MissingReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyViolation {
  #[error("mandated attribute {name} ({identifier}) is {reason}")]
  MissingAttribute { identifier: String, name: String, reason: MissingReason },

  #[error("signature algorithm {0} is not allowed by the policy")]
  AlgorithmNotAllowed(String),

  #[error("signature algorithm is unknown")]
  UnknownAlgorithm,

  #[error("signer key has {bits} bits, policy requires at least {minimum}")]
  KeyTooShort { bits: u32, minimum: u32 },

  #[error("signing time {at} is outside the policy signing period")]
  OutsideSigningPeriod { at: Time },

  #[error("signing certificate attribute references {found} certificate(s), policy requires {expected}")]
  CertificateInfo { expected: usize, found: usize },

  #[error("certification path {result:?}: {message}")]
  Path { result: ValidationResult, message: String },

  #[error("timestamp certificate {subject} path {result:?}: {message}")]
  TimeStampPath { subject: String, result: ValidationResult, message: String },
}

impl From<MissingAttribute> for PolicyViolation {
  fn from(m: MissingAttribute) -> Self {
    PolicyViolation::MissingAttribute { identifier: m.identifier, name: m.name, reason: m.reason }
  }
}

#[derive(Debug, Clone)]
pub struct ConformanceReport {
  pub policy_oid: String,
  /// Time reference used for the period and path checks.
  pub signing_time: Time,
  pub missing_mandated_attributes: Vec<MissingAttribute>,
  pub algorithm_violations: Vec<PolicyViolation>,
  pub period_violation: Option<PolicyViolation>,
  /// Wrong number of certificates referenced by the signing-certificate attribute.
  pub certificate_info_violation: Option<PolicyViolation>,
  pub path: PathValidation,
  pub attributes: Vec<AttributeFinding>,
  pub time_stamps: Vec<TimeStampReport>,
}

impl ConformanceReport {
  /// Identifiers of the missing mandated attributes, in policy order.
  pub fn missing_identifiers(&self) -> Vec<&str> {
    self.missing_mandated_attributes.iter().map(|m| m.identifier.as_str()).collect()
  }

  pub fn has_policy_violations(&self) -> bool {
    !self.missing_mandated_attributes.is_empty()
      || !self.algorithm_violations.is_empty()
      || self.period_violation.is_some()
      || self.certificate_info_violation.is_some()
  }

  pub fn is_conformant(&self) -> bool {
    !self.has_policy_violations() && self.path.is_valid()
  }

  /// All findings as violations, path outcome last.
  pub fn violations(&self) -> Vec<PolicyViolation> {
    let mut out: Vec<PolicyViolation> =
      self.missing_mandated_attributes.iter().cloned().map(PolicyViolation::from).collect();
    out.extend(self.algorithm_violations.iter().cloned());
    out.extend(self.period_violation.iter().cloned());
    out.extend(self.certificate_info_violation.iter().cloned());
    if !self.path.is_valid() {
      out.push(PolicyViolation::Path { result: self.path.result, message: self.path.message.clone() });
    }
    for stamp in &self.time_stamps {
      if let Some(path) = stamp.certificate_path.as_ref().filter(|p| p.result != ValidationResult::Valid) {
        out.push(PolicyViolation::TimeStampPath {
          subject: path.chain.first().cloned().unwrap_or_else(|| stamp.tsa.clone().unwrap_or_default()),
          result: path.result,
          message: path.message.clone(),
        });
      }
    }
    out
  }
}

pub struct SignaturePolicyEngine<'a> {
  catalog: &'a AttributeCatalog,
  paths: &'a CertificationPathValidator<'a>,
  hasher: &'a dyn HashService,
  anchors: Option<&'a TrustAnchorSet>,
  reference_time: Time,
}

impl<'a> SignaturePolicyEngine<'a> {
  pub fn new(catalog: &'a AttributeCatalog, paths: &'a CertificationPathValidator<'a>, hasher: &'a dyn HashService) -> Self {
    Self { catalog, paths, hasher, anchors: None, reference_time: chrono::Utc::now() }
  }

  /// Anchors used when the policy does not carry its own.
  pub fn with_trust_anchors(mut self, anchors: &'a TrustAnchorSet) -> Self {
    self.anchors = Some(anchors);
    self
  }

  pub fn with_reference_time(mut self, now: Time) -> Self {
    self.reference_time = now;
    self
  }

  pub fn paths(&self) -> &'a CertificationPathValidator<'a> {
    self.paths
  }

  pub fn catalog(&self) -> &'a AttributeCatalog {
    self.catalog
  }

  pub fn reference_time(&self) -> Time {
    self.reference_time
  }

  pub fn trust_anchors_for<'p>(&'p self, policy: &'p PolicyDocument) -> Option<&'p TrustAnchorSet> {
    policy.signing_trust_anchors.as_deref().or(self.anchors)
  }

  /// Signature timestamp time, else the signing-time attribute, else the reference clock.
  pub fn signing_time(&self, signature: &Signature) -> Time {
    signature
      .signature_time_stamp()
      .map(|t| t.gen_time)
      .or_else(|| signature.signing_time())
      .unwrap_or(self.reference_time)
  }

  pub fn conformance(&self, signature: &Signature, signer: &Certificate, policy: &PolicyDocument) -> ConformanceReport {
    self.evaluate(signature, signer, policy, true)
  }

  /// [`Self::conformance`] for nested and extracted signatures: the signer
  /// path is validated without writing to the collection or the path cache.
  pub fn conformance_no_save(
    &self,
    signature: &Signature,
    signer: &Certificate,
    policy: &PolicyDocument,
  ) -> ConformanceReport {
    self.evaluate(signature, signer, policy, false)
  }

  fn evaluate(&self, signature: &Signature, signer: &Certificate, policy: &PolicyDocument, persist: bool) -> ConformanceReport {
    let signing_time = self.signing_time(signature);
    let missing = self.missing_attributes(signature, policy);
    let algorithm_violations = self.algorithm_violations(signature, signer, policy);

    let period_violation = (!policy.signing_period.contains(signing_time))
      .then_some(PolicyViolation::OutsideSigningPeriod { at: signing_time });

    let empty = TrustAnchorSet::new(Vec::new());
    let anchors = self.trust_anchors_for(policy).unwrap_or(&empty);
    let path = if persist {
      self.paths.validate(signer, anchors, &policy.revocation_requirement, signing_time)
    } else {
      self.paths.validate_no_save(signer, anchors, &policy.revocation_requirement, signing_time)
    };

    let certificate_info_violation = self.certificate_info_violation(signature, policy, &path);

    let mut attributes = self.attribute_findings(signature, signer);
    attributes.extend(missing.iter().map(|m| AttributeFinding {
      identifier: m.identifier.clone(),
      name: m.name.clone(),
      signed: policy.mandated_signed_attributes.contains(&m.identifier),
      status: AttributeStatus::Missing,
      message: Some(m.reason.to_string()),
    }));

    let report = ConformanceReport {
      policy_oid: policy.id.clone(),
      signing_time,
      missing_mandated_attributes: missing,
      algorithm_violations,
      period_violation,
      certificate_info_violation,
      path,
      attributes,
      time_stamps: self.time_stamp_reports(signature, policy),
    };
    log::debug!(
      "conformance with {}: {} violation(s), path {:?}",
      policy.id,
      report.violations().len(),
      report.path.result
    );
    report
  }

  fn missing_attributes(&self, signature: &Signature, policy: &PolicyDocument) -> Vec<MissingAttribute> {
    let mut missing = Vec::new();
    for identifier in &policy.mandated_signed_attributes {
      let reason = match signature.attribute(identifier) {
        None => MissingReason::Absent,
        Some(a) if !a.is_signed => MissingReason::Unsigned,
        Some(_) => continue,
      };
      missing.push(self.missing(identifier, reason));
    }
    for identifier in &policy.mandated_unsigned_attributes {
      if !signature.has_attribute(identifier) {
        missing.push(self.missing(identifier, MissingReason::Absent));
      }
    }
    missing
  }

  fn missing(&self, identifier: &str, reason: MissingReason) -> MissingAttribute {
    MissingAttribute {
      identifier: identifier.to_string(),
      name: self.catalog.name_of(identifier).to_string(),
      reason,
    }
  }

  fn algorithm_violations(&self, signature: &Signature, signer: &Certificate, policy: &PolicyDocument) -> Vec<PolicyViolation> {
    let mut violations = Vec::new();
    match signature.signature_algorithm.as_deref() {
      None => violations.push(PolicyViolation::UnknownAlgorithm),
      Some(alg) if !policy.is_algorithm_allowed(alg) => {
        violations.push(PolicyViolation::AlgorithmNotAllowed(signature_algorithm_name(alg).to_string()))
      }
      Some(_) => {}
    }
    if signer.key_bits < policy.min_key_length {
      violations.push(PolicyViolation::KeyTooShort { bits: signer.key_bits, minimum: policy.min_key_length });
    }
    violations
  }

  fn certificate_info_violation(
    &self,
    signature: &Signature,
    policy: &PolicyDocument,
    path: &PathValidation,
  ) -> Option<PolicyViolation> {
    let expected = match policy.mandated_certificate_info {
      CertInfoReq::None => return None,
      CertInfoReq::SignerOnly => 1,
      // Without a chain the path failure already says why.
      CertInfoReq::FullPath => path.chain.as_ref()?.with_anchor().len(),
    };
    let found = signature
      .signing_certificate_attribute()
      .and_then(Attribute::certificate_references)
      .map(|refs| refs.references.len())
      .unwrap_or(0);
    (expected != found).then_some(PolicyViolation::CertificateInfo { expected, found })
  }

  fn attribute_findings(&self, signature: &Signature, signer: &Certificate) -> Vec<AttributeFinding> {
    signature
      .signed_attributes()
      .iter()
      .chain(signature.unsigned_attributes())
      .map(|attribute| {
        let (status, message) = if !self.catalog.contains(&attribute.identifier) {
          (AttributeStatus::Unrecognized, None)
        } else {
          match self.check_attribute(signature, signer, attribute) {
            Ok(()) => (AttributeStatus::Valid, None),
            Err(why) => (AttributeStatus::Invalid, Some(why)),
          }
        };
        AttributeFinding {
          identifier: attribute.identifier.clone(),
          name: self.catalog.name_of(&attribute.identifier).to_string(),
          signed: attribute.is_signed,
          status,
          message,
        }
      })
      .collect()
  }

  fn check_attribute(&self, signature: &Signature, signer: &Certificate, attribute: &Attribute) -> Result<(), String> {
    match (attribute.identifier.as_str(), &attribute.value) {
      (ids::SIGNING_CERTIFICATE | ids::SIGNING_CERTIFICATE_V2, AttributeValue::CertificateReferences(refs)) => {
        let first = refs.references.first().ok_or("no certificate referenced")?;
        let digest = self.hasher.digest(refs.algorithm, &signer.der).map_err(|e| e.to_string())?;
        if first.digest != digest || !first.serial.eq_ignore_ascii_case(&signer.serial) {
          return Err("first reference does not identify the signer certificate".into());
        }
        Ok(())
      }
      (ids::SIGNATURE_TIME_STAMP, AttributeValue::TimeStamp(token)) => {
        let value = signature.signature_value().ok_or("signature value missing")?;
        let digest = self.hasher.digest(token.algorithm, value).map_err(|e| e.to_string())?;
        if digest != token.imprint {
          return Err("timestamp imprint does not match the signature value".into());
        }
        Ok(())
      }
      _ => Ok(()),
    }
  }

  /// TSA certificates are validated at the token's generation time and never
  /// saved to the shared stores.
  fn time_stamp_path(&self, certificate: &Certificate, policy: &PolicyDocument, gen_time: Time) -> PathValidation {
    let empty = TrustAnchorSet::new(Vec::new());
    let anchors = policy
      .time_stamp_trust_anchors
      .as_deref()
      .or_else(|| self.trust_anchors_for(policy))
      .unwrap_or(&empty);
    self
      .paths
      .validate_no_save(certificate, anchors, &policy.time_stamp_revocation_requirement, gen_time)
  }

  fn time_stamp_reports(&self, signature: &Signature, policy: &PolicyDocument) -> Vec<TimeStampReport> {
    signature
      .unsigned_attributes()
      .iter()
      .filter_map(|attribute| {
        let token = attribute.time_stamp()?;
        let imprint_valid = if attribute.identifier == ids::SIGNATURE_TIME_STAMP {
          signature
            .signature_value()
            .and_then(|value| self.hasher.digest(token.algorithm, value).ok())
            .map(|digest| digest == token.imprint)
        } else {
          None
        };
        Some(TimeStampReport {
          identifier: attribute.identifier.clone(),
          name: self.catalog.name_of(&attribute.identifier).to_string(),
          gen_time: token.gen_time,
          algorithm: token.algorithm.to_string(),
          tsa: token.tsa.clone(),
          imprint_valid,
          certificate_path: token
            .certificate
            .as_ref()
            .map(|cert| CertPathReport::from_validation(&self.time_stamp_path(cert, policy, token.gen_time))),
        })
      })
      .collect()
  }
}
