// crates/engine/src/domain/path.rs
//! Certification path building and validation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::crypto::services::SignService;
use crate::domain::error::PathError;
use crate::domain::policy::{RevocationLevel, RevocationRequirement};
use crate::domain::revocation::{RevocationOracle, RevocationStatus};
use crate::domain::types::{Certificate, EngineDefaults, Time, TrustAnchor, TrustAnchorSet, ValidationLimits};
use crate::domain::validation::{PathFailureReason, PathValidation, ValidationData, ValidationResult};

/// How a caller identifies a certificate in a [`CertificateCollection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateSelector {
  Fingerprint(String),
  IssuerSerial { issuer: String, serial: String },
  SubjectKeyId(Vec<u8>),
  Subject(String),
}

impl CertificateSelector {
  pub fn matches(&self, cert: &Certificate) -> bool {
    match self {
      CertificateSelector::Fingerprint(fp) => cert.fingerprint().eq_ignore_ascii_case(fp),
      CertificateSelector::IssuerSerial { issuer, serial } => {
        &cert.issuer == issuer && cert.serial.eq_ignore_ascii_case(serial)
      }
      CertificateSelector::SubjectKeyId(ski) => cert.subject_key_id.as_ref() == Some(ski),
      CertificateSelector::Subject(subject) => &cert.subject == subject,
    }
  }
}

/// Certificate store consulted while walking a path.
///
/// Implementations must tolerate concurrent readers; `add_certificates` only
/// ever appends.
pub trait CertificateCollection: Send + Sync {
  fn certificate(&self, selector: &CertificateSelector) -> Option<Certificate>;
  /// Issuer of `cert`, matched by issuer name and authority key identifier.
  fn issuer_certificate(&self, cert: &Certificate) -> Option<Certificate>;
  fn add_certificates(&self, certificates: &[Certificate]);
}

/// Leaf-first chain ending at a trust anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateChain {
  certificates: Vec<Certificate>,
  anchor: TrustAnchor,
}

impl CertificateChain {
  pub fn new(certificates: Vec<Certificate>, anchor: TrustAnchor) -> Self {
    Self { certificates, anchor }
  }

  pub fn leaf(&self) -> Option<&Certificate> {
    self.certificates.first()
  }

  /// Certificates from the leaf up to, but excluding, the anchor unless the
  /// anchor certificate was itself found in the collection.
  pub fn certificates(&self) -> &[Certificate] {
    &self.certificates
  }

  pub fn anchor(&self) -> &TrustAnchor {
    &self.anchor
  }

  pub fn len(&self) -> usize {
    self.certificates.len()
  }

  pub fn is_empty(&self) -> bool {
    self.certificates.is_empty()
  }

  /// Every certificate of the path including the anchor, without duplicates.
  pub fn with_anchor(&self) -> Vec<&Certificate> {
    let mut all: Vec<&Certificate> = self.certificates.iter().collect();
    if !self.certificates.contains(&self.anchor.certificate) {
      all.push(&self.anchor.certificate);
    }
    all
  }

  /// `(certificate, issuer)` pairs to check, leaf first. The anchor itself is not a link.
  pub fn links(&self) -> impl Iterator<Item = (usize, &Certificate, &Certificate)> + '_ {
    self
      .certificates
      .iter()
      .enumerate()
      .take_while(move |(_, c)| *c != &self.anchor.certificate)
      .map(move |(i, c)| (i, c, self.certificates.get(i + 1).unwrap_or(&self.anchor.certificate)))
  }
}

/// Paths built by the saving variant, keyed by leaf and anchor-set fingerprint.
///
/// Append-only: the first chain stored for a key wins.
#[derive(Debug, Default)]
pub struct PathCache {
  entries: RwLock<HashMap<(String, String), Arc<CertificateChain>>>,
}

impl PathCache {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, leaf: &Certificate, anchors: &TrustAnchorSet) -> Option<Arc<CertificateChain>> {
    let key = (leaf.fingerprint(), anchors.fingerprint().to_string());
    let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
    entries.get(&key).cloned()
  }

  pub fn insert(&self, leaf: &Certificate, anchors: &TrustAnchorSet, chain: CertificateChain) -> Arc<CertificateChain> {
    let key = (leaf.fingerprint(), anchors.fingerprint().to_string());
    let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
    entries.entry(key).or_insert_with(|| Arc::new(chain)).clone()
  }

  pub fn len(&self) -> usize {
    self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

struct PathFailure {
  error: PathError,
  at: Option<Certificate>,
}

/// Builds and validates chains for one request.
///
/// Holds only borrowed collaborators; create one per request (or share it
/// read-only between threads, every method takes `&self`).
pub struct CertificationPathValidator<'a> {
  collection: &'a dyn CertificateCollection,
  oracle: &'a dyn RevocationOracle,
  verifier: &'a dyn SignService,
  cache: Option<&'a PathCache>,
  cancel: Option<&'a AtomicBool>,
  max_depth: usize,
  persist: bool,
}

impl<'a> CertificationPathValidator<'a> {
  pub fn new(
    collection: &'a dyn CertificateCollection,
    oracle: &'a dyn RevocationOracle,
    verifier: &'a dyn SignService,
  ) -> Self {
    Self {
      collection,
      oracle,
      verifier,
      cache: None,
      cancel: None,
      max_depth: EngineDefaults::MAX_PATH_DEPTH,
      persist: EngineDefaults::PERSIST_DISCOVERED_CERTIFICATES,
    }
  }

  /// When off, the saving variants behave like their `_no_save` counterparts.
  pub fn with_persistence(mut self, persist: bool) -> Self {
    self.persist = persist;
    self
  }

  pub fn with_cache(mut self, cache: &'a PathCache) -> Self {
    self.cache = Some(cache);
    self
  }

  pub fn with_cancellation(mut self, flag: &'a AtomicBool) -> Self {
    self.cancel = Some(flag);
    self
  }

  pub fn with_limits(mut self, limits: ValidationLimits) -> Self {
    self.max_depth = limits.max_path_depth;
    self
  }

  pub fn with_max_depth(mut self, depth: usize) -> Self {
    self.max_depth = depth;
    self
  }

  pub fn oracle(&self) -> &'a dyn RevocationOracle {
    self.oracle
  }

  /// Build a chain and remember it: discovered issuers go to the collection,
  /// the chain to the path cache.
  pub fn build_path(&self, leaf: &Certificate, anchors: &TrustAnchorSet) -> Result<CertificateChain, PathError> {
    if let Some(cached) = self.cache.and_then(|c| c.get(leaf, anchors)) {
      log::trace!("path cache hit for {}", leaf.subject);
      return Ok((*cached).clone());
    }
    let (chain, discovered) = self.walk(leaf, anchors).map_err(|f| f.error)?;
    self.save(leaf, anchors, &chain, &discovered);
    Ok(chain)
  }

  /// Same walk as [`Self::build_path`], writing nothing to shared stores.
  pub fn build_path_no_save(&self, leaf: &Certificate, anchors: &TrustAnchorSet) -> Result<CertificateChain, PathError> {
    self.walk(leaf, anchors).map(|(chain, _)| chain).map_err(|f| f.error)
  }

  /// Build a fresh path and validate every link at `at`.
  pub fn validate(
    &self,
    leaf: &Certificate,
    anchors: &TrustAnchorSet,
    requirement: &RevocationRequirement,
    at: Time,
  ) -> PathValidation {
    self.validate_inner(leaf, anchors, requirement, at, true)
  }

  /// [`Self::validate`] without touching the collection or the path cache.
  pub fn validate_no_save(
    &self,
    leaf: &Certificate,
    anchors: &TrustAnchorSet,
    requirement: &RevocationRequirement,
    at: Time,
  ) -> PathValidation {
    self.validate_inner(leaf, anchors, requirement, at, false)
  }

  fn validate_inner(
    &self,
    leaf: &Certificate,
    anchors: &TrustAnchorSet,
    requirement: &RevocationRequirement,
    at: Time,
    save: bool,
  ) -> PathValidation {
    let (chain, discovered) = match self.walk(leaf, anchors) {
      Ok(built) => built,
      Err(failure) => return Self::path_failure(failure, at),
    };
    let validation = self.check_chain(&chain, requirement, at);
    // Only chains that passed every check are worth remembering.
    if save && validation.is_valid() {
      self.save(leaf, anchors, &chain, &discovered);
    }
    log::debug!(
      "path for {} validated as {:?}: {}",
      leaf.subject,
      validation.result,
      validation.message
    );
    validation
  }

  fn save(&self, leaf: &Certificate, anchors: &TrustAnchorSet, chain: &CertificateChain, discovered: &[Certificate]) {
    if !self.persist {
      return;
    }
    if !discovered.is_empty() {
      self.collection.add_certificates(discovered);
    }
    if let Some(cache) = self.cache {
      cache.insert(leaf, anchors, chain.clone());
    }
  }

  fn cancelled(&self) -> bool {
    self.cancel.map(|f| f.load(Ordering::Relaxed)).unwrap_or(false)
  }

  fn walk(&self, leaf: &Certificate, anchors: &TrustAnchorSet) -> Result<(CertificateChain, Vec<Certificate>), PathFailure> {
    if anchors.is_empty() {
      return Err(PathFailure { error: PathError::NoTrustAnchors, at: None });
    }

    let mut certificates = vec![leaf.clone()];
    let mut discovered = Vec::new();
    loop {
      let current = certificates[certificates.len() - 1].clone();
      if self.cancelled() {
        return Err(PathFailure { error: PathError::Cancelled, at: Some(current) });
      }
      if let Some(anchor) = anchors.anchor_for(&current) {
        log::trace!("path for {} reached anchor {}", leaf.subject, anchor.certificate.subject);
        return Ok((CertificateChain::new(certificates, anchor.clone()), discovered));
      }
      if current.is_self_issued() {
        return Err(PathFailure {
          error: PathError::UntrustedRoot { subject: current.subject.clone() },
          at: Some(current),
        });
      }
      if certificates.len() >= self.max_depth {
        return Err(PathFailure { error: PathError::TooDeep(self.max_depth), at: Some(current) });
      }
      let Some(issuer) = self.collection.issuer_certificate(&current) else {
        return Err(PathFailure {
          error: PathError::NoIssuer { subject: current.subject.clone() },
          at: Some(current),
        });
      };
      if certificates.contains(&issuer) {
        return Err(PathFailure {
          error: PathError::Loop { subject: issuer.subject.clone() },
          at: Some(current),
        });
      }
      log::trace!("{} issued by {}", current.subject, issuer.subject);
      discovered.push(issuer.clone());
      certificates.push(issuer);
    }
  }

  fn path_failure(failure: PathFailure, at: Time) -> PathValidation {
    let (result, reason) = match failure.error {
      PathError::NoTrustAnchors => (ValidationResult::ValidationNotPossible, PathFailureReason::NoTrustAnchors),
      PathError::Cancelled => (ValidationResult::ValidationNotPossible, PathFailureReason::Cancelled),
      PathError::NoIssuer { .. } => (ValidationResult::Invalid, PathFailureReason::NoIssuer),
      PathError::UntrustedRoot { .. } => (ValidationResult::Invalid, PathFailureReason::UntrustedRoot),
      PathError::Loop { .. } => (ValidationResult::Invalid, PathFailureReason::PathLoop),
      PathError::TooDeep(_) => (ValidationResult::Invalid, PathFailureReason::PathTooLong),
    };
    PathValidation::failed(result, reason, failure.error.to_string(), failure.at, at)
  }

  fn check_chain(&self, chain: &CertificateChain, requirement: &RevocationRequirement, at: Time) -> PathValidation {
    let anchor = chain.anchor();
    let mut data = Vec::new();
    let mut degraded: Option<(Certificate, String)> = None;

    for (index, cert, issuer) in chain.links() {
      let mut entry = ValidationData::for_certificate(cert);
      let fail = |mut entry: ValidationData,
                  data: &mut Vec<ValidationData>,
                  result: ValidationResult,
                  reason: PathFailureReason,
                  message: String| {
        entry.result = result;
        data.push(entry);
        PathValidation::failed(result, reason, message, Some(cert.clone()), at)
          .with_chain(chain.clone(), std::mem::take(data))
      };

      if self.cancelled() {
        return fail(
          entry,
          &mut data,
          ValidationResult::ValidationNotPossible,
          PathFailureReason::Cancelled,
          "validation cancelled".into(),
        );
      }

      match self.verifier.verify_certificate(cert, issuer) {
        Ok(true) => {}
        Ok(false) => {
          return fail(
            entry,
            &mut data,
            ValidationResult::Invalid,
            PathFailureReason::BadSignature,
            format!("signature of {} does not verify with key of {}", cert.subject, issuer.subject),
          )
        }
        Err(e) => {
          return fail(
            entry,
            &mut data,
            ValidationResult::Invalid,
            PathFailureReason::BadSignature,
            format!("cannot verify signature of {}: {e}", cert.subject),
          )
        }
      }

      if at < cert.not_before {
        return fail(
          entry,
          &mut data,
          ValidationResult::Invalid,
          PathFailureReason::NotYetValid,
          format!("{} is not valid before {}", cert.subject, cert.not_before),
        );
      }
      if at > cert.not_after {
        return fail(
          entry,
          &mut data,
          ValidationResult::Invalid,
          PathFailureReason::Expired,
          format!("{} expired at {}", cert.subject, cert.not_after),
        );
      }

      if index > 0 {
        if !cert.is_ca() {
          return fail(
            entry,
            &mut data,
            ValidationResult::Invalid,
            PathFailureReason::NotCa,
            format!("{} is not a CA certificate", cert.subject),
          );
        }
        if !cert.can_sign_certificates() {
          return fail(
            entry,
            &mut data,
            ValidationResult::Invalid,
            PathFailureReason::KeyUsage,
            format!("key usage of {} does not permit certificate signing", cert.subject),
          );
        }
        // Intermediates below this CA, excluding the leaf.
        let below = (index - 1) as u32;
        if let Some(max) = cert.basic_constraints.and_then(|bc| bc.path_len) {
          if below > max {
            return fail(
              entry,
              &mut data,
              ValidationResult::Invalid,
              PathFailureReason::PathLength,
              format!("{} allows {max} intermediate certificates, found {below}", cert.subject),
            );
          }
        }
      }

      if !anchor.accepts_policies(cert) {
        return fail(
          entry,
          &mut data,
          ValidationResult::Invalid,
          PathFailureReason::PolicyNotAccepted,
          format!("{} asserts no policy accepted by the trust anchor", cert.subject),
        );
      }
      if !anchor.accepts_name(cert) {
        return fail(
          entry,
          &mut data,
          ValidationResult::Invalid,
          PathFailureReason::NameConstraints,
          format!("{} is outside the trust anchor name constraints", cert.subject),
        );
      }

      let level = requirement.level_for(index == 0);
      if level != RevocationLevel::None {
        let lookup = self.oracle.revocation_status(cert, Some(issuer), at);
        entry.from_network = lookup.from_network;
        if let Some(rev) = &lookup.data {
          entry.revocation_source = Some(rev.source);
          entry.revocation_this_update = Some(rev.this_update);
          entry.revocation_next_update = rev.next_update;
        }

        match &lookup.status {
          RevocationStatus::Revoked { revoked_at, reason } if *revoked_at <= at => {
            let reason = reason.as_deref().map(|r| format!(" ({r})")).unwrap_or_default();
            let revoked_at = *revoked_at;
            return fail(
              entry,
              &mut data,
              ValidationResult::Invalid,
              PathFailureReason::Revoked,
              format!("{} was revoked at {revoked_at}{reason}", cert.subject),
            )
            .with_revocation_date(revoked_at);
          }
          RevocationStatus::Revoked { revoked_at, .. } => {
            log::info!("{} revoked at {} after the time reference {}", cert.subject, revoked_at, at);
          }
          RevocationStatus::Malformed(why) => {
            return fail(
              entry,
              &mut data,
              ValidationResult::InvalidCrl,
              PathFailureReason::RevocationInvalid,
              format!("revocation data for {} is invalid: {why}", cert.subject),
            );
          }
          RevocationStatus::Good => {}
          RevocationStatus::NotFound | RevocationStatus::Unknown | RevocationStatus::TimedOut => {
            let what = if lookup.status == RevocationStatus::TimedOut {
              "revocation lookup timed out"
            } else {
              "no revocation data found"
            };
            if level == RevocationLevel::Mandatory {
              return fail(
                entry,
                &mut data,
                ValidationResult::CrlMissing,
                PathFailureReason::RevocationMissing,
                format!("{what} for {}", cert.subject),
              );
            }
            log::warn!("{what} for {}; revocation is optional", cert.subject);
            entry.result = ValidationResult::ValidationNotPossible;
            if degraded.is_none() {
              degraded = Some((cert.clone(), format!("{what} for {}", cert.subject)));
            }
          }
        }

        if let Some(rev) = &lookup.data {
          if let Some(next) = rev.next_update {
            if next < at {
              return fail(
                entry,
                &mut data,
                ValidationResult::InvalidCrl,
                PathFailureReason::RevocationInvalid,
                format!("revocation data for {} expired at {next}", cert.subject),
              );
            }
          }
          if let Some(max_age) = requirement.max_age() {
            if at - rev.this_update > max_age {
              return fail(
                entry,
                &mut data,
                ValidationResult::InvalidCrl,
                PathFailureReason::RevocationInvalid,
                format!("revocation data for {} is older than {}s", cert.subject, max_age.num_seconds()),
              );
            }
          }
        }
      }

      data.push(entry);
    }

    match degraded {
      Some((cert, message)) => PathValidation::failed(
        ValidationResult::ValidationNotPossible,
        PathFailureReason::RevocationDegraded,
        message,
        Some(cert),
        at,
      )
      .with_chain(chain.clone(), data),
      None => PathValidation::valid(chain.clone(), at, data),
    }
  }
}
