// crates/engine/src/domain/error.rs
use thiserror::Error;

/// Failures of certification path construction.
///
/// These are recovered into a [`crate::domain::validation::PathValidation`]
/// by the validator; they only surface as errors from `build_path`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
  #[error("no trust anchors configured")]
  NoTrustAnchors,

  #[error("no issuer certificate found for {subject}")]
  NoIssuer { subject: String },

  #[error("chain ends at untrusted root {subject}")]
  UntrustedRoot { subject: String },

  #[error("certification path loops back to {subject}")]
  Loop { subject: String },

  #[error("certification path exceeds maximum depth {0}")]
  TooDeep(usize),

  #[error("path building cancelled")]
  Cancelled,
}

impl PathError {
  /// True when the failure means the signer sits outside every configured trust anchor.
  pub fn is_trust_domain_mismatch(&self) -> bool {
    !matches!(self, PathError::Cancelled | PathError::NoTrustAnchors)
  }
}

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("configuration: {0}")]
  Config(String),

  #[error(transparent)]
  Io(#[from] std::io::Error),

  #[error(transparent)]
  Json(#[from] serde_json::Error),

  #[error("feature not enabled: {0}")]
  Feature(&'static str),

  /// Malformed container or attribute encoding. Aborts one signature.
  #[error("structural: {0}")]
  Structural(String),

  #[error("attribute {0} is unique and already present")]
  UniqueAttribute(String),

  #[error("signature value already computed; cannot add signed attribute {0}")]
  SealedSignature(String),

  #[error("no builder available for attribute {0}")]
  NoBuilder(String),

  #[error("cannot build {attribute}: prerequisite {prerequisite} failed: {source}")]
  DependencyBuild {
    attribute: String,
    prerequisite: String,
    #[source]
    source: Box<EngineError>,
  },

  #[error("signer identity incomplete: missing {0}")]
  MissingSignerIdentity(&'static str),

  #[error("hash algorithm {algorithm} is not permitted for {attribute}")]
  ForbiddenHashAlgorithm { attribute: String, algorithm: String },

  #[error("timestamp service unavailable: {0}")]
  TimeStampUnavailable(String),

  #[error(transparent)]
  Path(#[from] PathError),

  #[error("signer {subject} is not under any configured trust anchor")]
  TrustDomainMismatch { subject: String },

  #[error("unknown signature policy: {0}")]
  UnknownPolicy(String),

  #[error("crypto: {0}")]
  Crypto(String),
}

impl EngineError {
  /// Innermost error of a chain of dependency build failures.
  pub fn root_cause(&self) -> &EngineError {
    match self {
      EngineError::DependencyBuild { source, .. } => source.root_cause(),
      other => other,
    }
  }

  /// Errors that must abort a whole signature creation rather than one attribute.
  pub fn aborts_creation(&self) -> bool {
    matches!(
      self.root_cause(),
      EngineError::MissingSignerIdentity(_) | EngineError::ForbiddenHashAlgorithm { .. }
    )
  }
}

#[cfg(feature = "openssl")]
impl From<openssl::error::ErrorStack> for EngineError {
  fn from(e: openssl::error::ErrorStack) -> Self {
    EngineError::Crypto(e.to_string())
  }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dependency_build_displays_chain() {
    let err = EngineError::DependencyBuild {
      attribute: "archive".into(),
      prerequisite: "values".into(),
      source: Box::new(EngineError::TimeStampUnavailable("connection refused".into())),
    };
    let msg = err.to_string();
    assert!(msg.contains("archive"));
    assert!(msg.contains("connection refused"));
    assert!(matches!(err.root_cause(), EngineError::TimeStampUnavailable(_)));
  }

  #[test]
  fn missing_identity_aborts_creation_through_wrapping() {
    let err = EngineError::DependencyBuild {
      attribute: "a".into(),
      prerequisite: "b".into(),
      source: Box::new(EngineError::MissingSignerIdentity("certificate")),
    };
    assert!(err.aborts_creation());
    assert!(!EngineError::TimeStampUnavailable("x".into()).aborts_creation());
  }

  #[test]
  fn cancelled_or_unanchored_path_is_not_a_trust_mismatch() {
    assert!(!PathError::Cancelled.is_trust_domain_mismatch());
    assert!(!PathError::NoTrustAnchors.is_trust_domain_mismatch());
    assert!(PathError::NoIssuer { subject: "CN=x".into() }.is_trust_domain_mismatch());
  }
}
