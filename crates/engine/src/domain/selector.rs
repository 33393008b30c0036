// crates/engine/src/domain/selector.rs
//! Verification entry point: family selection, PDF extraction and report aggregation.

use std::sync::Arc;

use crate::domain::conformance::SignaturePolicyEngine;
use crate::domain::error::{EngineError, EngineResult};
use crate::domain::family::{FamilyList, SignatureFamily};
use crate::domain::pdf::{apply_incremental_updates, PdfInspector};
use crate::domain::policy::{PolicyCatalogue, PolicyDocument};
use crate::domain::types::{EngineConfig, Signature, TrustAnchorSet};
use crate::domain::verify::{Report, SignatureReport};

/// Lifecycle of one input blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
  Unclassified,
  PdfExtraction,
  FamilySelected,
  Validated,
  Reported,
}

#[derive(Debug)]
struct Selection {
  state: SelectionState,
}

impl Selection {
  fn new() -> Self {
    Self { state: SelectionState::Unclassified }
  }

  fn advance(&mut self, next: SelectionState) {
    log::trace!("selection {:?} -> {:?}", self.state, next);
    self.state = next;
  }
}

pub struct VerifierSelector<'a> {
  families: FamilyList,
  engine: &'a SignaturePolicyEngine<'a>,
  policies: &'a PolicyCatalogue,
  pdf: Option<&'a dyn PdfInspector>,
  default_policy: Option<String>,
}

impl<'a> VerifierSelector<'a> {
  pub fn new(families: FamilyList, engine: &'a SignaturePolicyEngine<'a>, policies: &'a PolicyCatalogue) -> Self {
    Self { families, engine, policies, pdf: None, default_policy: None }
  }

  pub fn with_pdf_inspector(mut self, inspector: &'a dyn PdfInspector) -> Self {
    self.pdf = Some(inspector);
    self
  }

  /// Policy applied to signatures that do not name one.
  pub fn with_default_policy(mut self, oid: impl Into<String>) -> Self {
    self.default_policy = Some(oid.into());
    self
  }

  /// Take the default policy from the engine configuration, when it names one.
  pub fn with_config(self, config: &EngineConfig) -> Self {
    match &config.default_policy {
      Some(oid) => self.with_default_policy(oid.clone()),
      None => self,
    }
  }

  /// Verify every signature in `bytes` and aggregate the outcomes.
  ///
  /// Never fails: problems with one signature end up in that signature's report.
  pub fn verify(&self, bytes: &[u8], detached: Option<&[u8]>) -> Report {
    let now = self.engine.reference_time();
    let lpa = self.policies.policy_list().map(|list| list.status(now));
    let mut selection = Selection::new();

    let Some(pdf) = self.pdf.filter(|p| p.is_pdf(bytes)) else {
      let signatures = self.verify_blob(&mut selection, None, bytes, detached);
      selection.advance(SelectionState::Reported);
      return Report::new(now, false, signatures, lpa);
    };

    selection.advance(SelectionState::PdfExtraction);
    let entries = match pdf.signature_entries(bytes) {
      Ok(entries) => entries,
      Err(e) => {
        log::warn!("cannot extract PDF signatures: {e}");
        return Report::new(now, true, vec![SignatureReport::error(0, None, e.to_string())], lpa);
      }
    };
    let exceptions = pdf.modification_exceptions(bytes).unwrap_or_else(|e| {
      log::warn!("cannot inspect PDF modifications: {e}");
      Vec::new()
    });

    let mut signatures = Vec::new();
    for entry in &entries {
      if entry.is_time_stamp {
        log::debug!("skipping document timestamp entry {}", entry.index);
        continue;
      }
      let mut entry_selection = Selection::new();
      signatures.extend(self.verify_blob(
        &mut entry_selection,
        Some(entry.index),
        &entry.contents,
        Some(&entry.signed_content),
      ));
    }
    apply_incremental_updates(&entries, &exceptions, &mut signatures);
    selection.advance(SelectionState::Reported);
    Report::new(now, true, signatures, lpa)
  }

  /// `entry` is the PDF signature entry the bytes came from; every signature
  /// of that entry reports the entry index, standalone blobs report their position.
  fn verify_blob(
    &self,
    selection: &mut Selection,
    entry: Option<usize>,
    bytes: &[u8],
    detached: Option<&[u8]>,
  ) -> Vec<SignatureReport> {
    let index_of = |position: usize| entry.unwrap_or(position);
    let Some(family) = self.families.select(bytes, detached) else {
      return vec![SignatureReport::error(index_of(0), None, "no signature family recognises the input")];
    };
    selection.advance(SelectionState::FamilySelected);
    log::debug!("entry {:?} handled as {:?}", entry, family.kind());

    let container = match family.parse_signatures(bytes, detached) {
      Ok(container) => container,
      Err(e) => return vec![SignatureReport::error(index_of(0), Some(family.kind()), e.to_string())],
    };

    let nested = entry.is_some();
    let reports = container
      .signatures()
      .iter()
      .enumerate()
      .map(|(position, signature)| {
        self.verify_signature(index_of(position), family, signature, detached, nested).at_position(position)
      })
      .collect();
    selection.advance(SelectionState::Validated);
    reports
  }

  fn verify_signature(
    &self,
    index: usize,
    family: &Arc<dyn SignatureFamily>,
    signature: &Signature,
    detached: Option<&[u8]>,
    nested: bool,
  ) -> SignatureReport {
    let kind = family.kind();
    let signer = match family.signing_certificate(signature) {
      Ok(signer) => signer,
      Err(e) => return SignatureReport::error(index, Some(kind), e.to_string()),
    };
    let policy = match self.select_policy(signature) {
      Ok(policy) => policy,
      Err(e) => return SignatureReport::error(index, Some(kind), e.to_string()),
    };

    let empty = TrustAnchorSet::new(Vec::new());
    let anchors = self.engine.trust_anchors_for(&policy).unwrap_or(&empty);
    if let Err(e) = self.engine.paths().build_path_no_save(&signer, anchors) {
      if e.is_trust_domain_mismatch() {
        log::warn!("foreign signer {}: {e}", signer.subject);
        let mismatch = EngineError::TrustDomainMismatch { subject: signer.subject.clone() };
        return SignatureReport::foreign_signer(index, Some(kind), &signer, mismatch.to_string());
      }
    }

    // Extracted and nested signers are not added to the shared stores.
    let conformance = if nested {
      self.engine.conformance_no_save(signature, &signer, &policy)
    } else {
      self.engine.conformance(signature, &signer, &policy)
    };
    let value_valid = family.verify_signature_value(signature, &signer, detached).unwrap_or_else(|e| {
      log::warn!("signature value of {} not verifiable: {e}", signer.subject);
      false
    });

    let mut report = SignatureReport::from_conformance(index, kind, &signer, &conformance, value_valid);
    if let Some(list) = self.policies.policy_list() {
      report.set_policy_status(list.policy_status(&policy.id, self.engine.reference_time()));
    }
    for counter in &signature.counter_signatures {
      // A counter signature covers the value of the signature it counter-signs.
      let counter_report = self.verify_signature(index, family, counter, signature.signature_value(), true);
      report.push_counter_signature(counter_report);
    }
    report
  }

  fn select_policy(&self, signature: &Signature) -> EngineResult<Arc<PolicyDocument>> {
    let oid = signature
      .policy_oid()
      .or(self.default_policy.as_deref())
      .ok_or_else(|| EngineError::UnknownPolicy("signature names no policy and no default is set".into()))?;
    self.policies.select(oid)
  }
}
