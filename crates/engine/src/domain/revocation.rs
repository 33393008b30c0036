// crates/engine/src/domain/revocation.rs
use serde::{Deserialize, Serialize};

use crate::domain::types::{Certificate, Time};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevocationSource {
  Crl,
  Ocsp,
}

/// A CRL or OCSP response as the engine sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationData {
  pub source: RevocationSource,
  pub issuer: String,
  pub this_update: Time,
  pub next_update: Option<Time>,
  #[serde(with = "hex::serde")]
  pub encoded: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevocationStatus {
  Good,
  Revoked { revoked_at: Time, reason: Option<String> },
  /// Responder answered but does not know the certificate.
  Unknown,
  /// No CRL or OCSP data could be located.
  NotFound,
  /// Data was found but could not be parsed or its signature did not verify.
  Malformed(String),
  /// The lookup did not finish within its budget.
  TimedOut,
}

/// Answer of a [`RevocationOracle`] for one certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationLookup {
  pub status: RevocationStatus,
  pub data: Option<RevocationData>,
  pub from_network: bool,
}

impl RevocationLookup {
  pub fn good(data: RevocationData) -> Self {
    Self { status: RevocationStatus::Good, data: Some(data), from_network: false }
  }

  pub fn revoked(revoked_at: Time, data: RevocationData) -> Self {
    Self {
      status: RevocationStatus::Revoked { revoked_at, reason: None },
      data: Some(data),
      from_network: false,
    }
  }

  pub fn not_found() -> Self {
    Self { status: RevocationStatus::NotFound, data: None, from_network: false }
  }

  pub fn malformed(reason: impl Into<String>) -> Self {
    Self { status: RevocationStatus::Malformed(reason.into()), data: None, from_network: false }
  }

  pub fn timed_out() -> Self {
    Self { status: RevocationStatus::TimedOut, data: None, from_network: true }
  }

  pub fn from_network(mut self) -> Self {
    self.from_network = true;
    self
  }

  /// No usable data: either nothing was found or the lookup gave up.
  pub fn is_absent(&self) -> bool {
    matches!(
      self.status,
      RevocationStatus::NotFound | RevocationStatus::TimedOut | RevocationStatus::Unknown
    )
  }
}

/// CRL/OCSP derived revocation status for a certificate at a time reference.
pub trait RevocationOracle: Send + Sync {
  fn revocation_status(
    &self,
    certificate: &Certificate,
    issuer: Option<&Certificate>,
    at: Time,
  ) -> RevocationLookup;
}

/// Oracle that never has data; pairs with `RevocationLevel::None` policies.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRevocationData;

impl RevocationOracle for NoRevocationData {
  fn revocation_status(&self, _: &Certificate, _: Option<&Certificate>, _: Time) -> RevocationLookup {
    RevocationLookup::not_found()
  }
}
