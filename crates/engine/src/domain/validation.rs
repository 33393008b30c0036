// crates/engine/src/domain/validation.rs
use serde::Serialize;

use crate::domain::path::CertificateChain;
use crate::domain::revocation::RevocationSource;
use crate::domain::types::{Certificate, Time};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationResult {
  Valid,
  Invalid,
  CrlMissing,
  InvalidCrl,
  ValidationNotPossible,
}

/// Why a link of a certification path was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PathFailureReason {
  NoTrustAnchors,
  NoIssuer,
  UntrustedRoot,
  PathLoop,
  PathTooLong,
  BadSignature,
  Expired,
  NotYetValid,
  NotCa,
  KeyUsage,
  PathLength,
  PolicyNotAccepted,
  NameConstraints,
  Revoked,
  RevocationMissing,
  RevocationInvalid,
  RevocationDegraded,
  Cancelled,
}

/// What was checked for one link, for the report's validation data section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationData {
  pub subject: String,
  pub issuer: String,
  pub serial: String,
  pub not_before: Time,
  pub not_after: Time,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub revocation_source: Option<RevocationSource>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub revocation_this_update: Option<Time>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub revocation_next_update: Option<Time>,
  pub from_network: bool,
  pub result: ValidationResult,
}

impl ValidationData {
  pub(crate) fn for_certificate(cert: &Certificate) -> Self {
    Self {
      subject: cert.subject.clone(),
      issuer: cert.issuer.clone(),
      serial: cert.serial.clone(),
      not_before: cert.not_before,
      not_after: cert.not_after,
      revocation_source: None,
      revocation_this_update: None,
      revocation_next_update: None,
      from_network: false,
      result: ValidationResult::Valid,
    }
  }
}

/// Outcome of validating one certification path.
#[derive(Debug, Clone)]
pub struct PathValidation {
  pub result: ValidationResult,
  pub reason: Option<PathFailureReason>,
  pub message: String,
  /// First certificate, walking from the leaf, that failed a check.
  pub cert_with_error: Option<Certificate>,
  pub revocation_date: Option<Time>,
  pub time_reference: Time,
  pub chain: Option<CertificateChain>,
  pub validation_data: Vec<ValidationData>,
}

impl PathValidation {
  pub(crate) fn valid(chain: CertificateChain, at: Time, data: Vec<ValidationData>) -> Self {
    Self {
      result: ValidationResult::Valid,
      reason: None,
      message: "certification path is valid".into(),
      cert_with_error: None,
      revocation_date: None,
      time_reference: at,
      chain: Some(chain),
      validation_data: data,
    }
  }

  pub(crate) fn failed(
    result: ValidationResult,
    reason: PathFailureReason,
    message: impl Into<String>,
    cert_with_error: Option<Certificate>,
    at: Time,
  ) -> Self {
    Self {
      result,
      reason: Some(reason),
      message: message.into(),
      cert_with_error,
      revocation_date: None,
      time_reference: at,
      chain: None,
      validation_data: Vec::new(),
    }
  }

  pub(crate) fn with_chain(mut self, chain: CertificateChain, data: Vec<ValidationData>) -> Self {
    self.chain = Some(chain);
    self.validation_data = data;
    self
  }

  pub(crate) fn with_revocation_date(mut self, date: Time) -> Self {
    self.revocation_date = Some(date);
    self
  }

  pub fn is_valid(&self) -> bool {
    self.result == ValidationResult::Valid
  }
}
