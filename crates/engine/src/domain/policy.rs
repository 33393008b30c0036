// crates/engine/src/domain/policy.rs
//! Signature policies, the policy catalogue and the list of accepted policies (LPA).

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::error::{EngineError, EngineResult};
use crate::domain::types::{signature_algorithm_matches, HashAlgorithm, Time, TrustAnchorSet};
use crate::domain::verify::{LpaStatus, PaReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationLevel {
  Mandatory,
  #[default]
  Optional,
  None,
}

/// How revocation data must be checked for each certificate of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RevocationRequirement {
  /// Level applied to the end-entity certificate.
  pub level: RevocationLevel,
  /// Level applied to CA certificates; defaults to `level`.
  #[serde(default)]
  pub ca_level: Option<RevocationLevel>,
  /// Oldest acceptable revocation data, measured from the time reference.
  #[serde(default)]
  pub max_age_secs: Option<u64>,
}

impl RevocationRequirement {
  pub fn mandatory() -> Self {
    Self { level: RevocationLevel::Mandatory, ..Default::default() }
  }

  pub fn optional() -> Self {
    Self { level: RevocationLevel::Optional, ..Default::default() }
  }

  pub fn none() -> Self {
    Self { level: RevocationLevel::None, ..Default::default() }
  }

  pub fn with_max_age(mut self, max_age: std::time::Duration) -> Self {
    self.max_age_secs = Some(max_age.as_secs());
    self
  }

  pub fn with_ca_level(mut self, level: RevocationLevel) -> Self {
    self.ca_level = Some(level);
    self
  }

  pub fn level_for(&self, end_certificate: bool) -> RevocationLevel {
    if end_certificate {
      self.level
    } else {
      self.ca_level.unwrap_or(self.level)
    }
  }

  pub fn max_age(&self) -> Option<chrono::Duration> {
    self
      .max_age_secs
      .and_then(|secs| i64::try_from(secs).ok())
      .map(chrono::Duration::seconds)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningPeriod {
  pub not_before: Time,
  #[serde(default)]
  pub not_after: Option<Time>,
}

impl SigningPeriod {
  pub fn contains(&self, at: Time) -> bool {
    self.not_before <= at && self.not_after.map(|end| at <= end).unwrap_or(true)
  }
}

/// Which certificates the signing-certificate attribute must reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertInfoReq {
  #[default]
  None,
  SignerOnly,
  FullPath,
}

/// A loaded signature policy. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDocument {
  /// Policy OID.
  pub id: String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub mandated_signed_attributes: Vec<String>,
  #[serde(default)]
  pub mandated_unsigned_attributes: Vec<String>,
  /// Attributes a creator may add when asked; never required for conformance.
  #[serde(default)]
  pub optional_attributes: Vec<String>,
  #[serde(default)]
  pub min_key_length: u32,
  /// Signature algorithm OIDs or names; empty allows any.
  #[serde(default)]
  pub allowed_algorithms: Vec<String>,
  pub signing_period: SigningPeriod,
  #[serde(default)]
  pub revocation_requirement: RevocationRequirement,
  #[serde(default)]
  pub time_stamp_revocation_requirement: RevocationRequirement,
  pub hash_algorithm: HashAlgorithm,
  #[serde(default)]
  pub mandated_certificate_info: CertInfoReq,
  /// Hex digest of the policy document, copied into the policy identifier attribute.
  #[serde(default)]
  pub policy_hash: Option<String>,
  #[serde(skip)]
  pub signing_trust_anchors: Option<Arc<TrustAnchorSet>>,
  #[serde(skip)]
  pub time_stamp_trust_anchors: Option<Arc<TrustAnchorSet>>,
}

impl PolicyDocument {
  pub fn from_json(json: &str) -> EngineResult<Self> {
    Ok(serde_json::from_str(json)?)
  }

  pub fn with_signing_trust_anchors(mut self, anchors: Arc<TrustAnchorSet>) -> Self {
    self.signing_trust_anchors = Some(anchors);
    self
  }

  pub fn with_time_stamp_trust_anchors(mut self, anchors: Arc<TrustAnchorSet>) -> Self {
    self.time_stamp_trust_anchors = Some(anchors);
    self
  }

  pub fn is_algorithm_allowed(&self, algorithm: &str) -> bool {
    self.allowed_algorithms.is_empty()
      || self
        .allowed_algorithms
        .iter()
        .any(|allowed| signature_algorithm_matches(allowed, algorithm))
  }

  pub fn mandates(&self, identifier: &str) -> bool {
    self.mandated_signed_attributes.iter().any(|id| id == identifier)
      || self.mandated_unsigned_attributes.iter().any(|id| id == identifier)
  }
}

/// Entry of the list of accepted policies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyListEntry {
  pub oid: String,
  pub signing_period: SigningPeriod,
  #[serde(default)]
  pub revoked_at: Option<Time>,
  #[serde(default)]
  pub uri: Option<String>,
}

/// List of accepted signature policies (LPA).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyList {
  pub version: u32,
  pub next_update: Time,
  /// Whether the list was fetched during this session rather than read from a local copy.
  #[serde(default)]
  pub online: bool,
  #[serde(default)]
  pub entries: Vec<PolicyListEntry>,
}

impl PolicyList {
  pub fn from_json(json: &str) -> EngineResult<Self> {
    Ok(serde_json::from_str(json)?)
  }

  pub fn status(&self, now: Time) -> LpaStatus {
    let expired = now > self.next_update;
    LpaStatus {
      version: self.version,
      next_update: self.next_update,
      valid: !expired,
      expired,
      online: self.online,
      message: expired.then(|| format!("policy list expired at {}", self.next_update)),
    }
  }

  pub fn policy_status(&self, oid: &str, now: Time) -> PaReport {
    let Some(entry) = self.entries.iter().find(|e| e.oid == oid) else {
      return PaReport {
        oid: oid.to_string(),
        valid: false,
        revoked: false,
        expired: false,
        period: None,
        error: Some("policy is not in the list of accepted policies".into()),
      };
    };
    let revoked = entry.revoked_at.map(|at| at <= now).unwrap_or(false);
    let expired = entry.signing_period.not_after.map(|end| now > end).unwrap_or(false);
    PaReport {
      oid: oid.to_string(),
      valid: !revoked && !expired,
      revoked,
      expired,
      period: Some(entry.signing_period),
      error: None,
    }
  }
}

/// Policies keyed by OID. Built once, then shared read-only.
#[derive(Debug, Clone, Default)]
pub struct PolicyCatalogue {
  policies: HashMap<String, Arc<PolicyDocument>>,
  policy_list: Option<PolicyList>,
}

impl PolicyCatalogue {
  pub fn new() -> Self {
    Self::default()
  }

  /// Load a JSON array of policy documents.
  pub fn from_json(json: &str) -> EngineResult<Self> {
    let docs: Vec<PolicyDocument> = serde_json::from_str(json)?;
    let mut catalogue = Self::new();
    for doc in docs {
      catalogue.insert(doc)?;
    }
    Ok(catalogue)
  }

  pub fn insert(&mut self, policy: PolicyDocument) -> EngineResult<()> {
    if self.policies.contains_key(&policy.id) {
      return Err(EngineError::Config(format!("duplicate policy {}", policy.id)));
    }
    log::debug!("loaded signature policy {}", policy.id);
    self.policies.insert(policy.id.clone(), Arc::new(policy));
    Ok(())
  }

  pub fn with_policy_list(mut self, list: PolicyList) -> Self {
    self.policy_list = Some(list);
    self
  }

  pub fn select(&self, oid: &str) -> EngineResult<Arc<PolicyDocument>> {
    self
      .policies
      .get(oid)
      .cloned()
      .ok_or_else(|| EngineError::UnknownPolicy(oid.to_string()))
  }

  pub fn policy_list(&self) -> Option<&PolicyList> {
    self.policy_list.as_ref()
  }

  pub fn len(&self) -> usize {
    self.policies.len()
  }

  pub fn is_empty(&self) -> bool {
    self.policies.is_empty()
  }
}
