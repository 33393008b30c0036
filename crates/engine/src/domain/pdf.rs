// crates/engine/src/domain/pdf.rs
//! PDF signature extraction seam and incremental-update aggregation.

use crate::domain::error::EngineResult;
use crate::domain::verify::{IncrementalUpdateStatus, SignatureReport};

/// One signature dictionary of a PDF, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfSignatureEntry {
  pub index: usize,
  /// Document timestamp (`/DocTimeStamp`) rather than a signer's signature.
  pub is_time_stamp: bool,
  /// Raw `/Contents` bytes.
  pub contents: Vec<u8>,
  /// Bytes covered by `/ByteRange`.
  pub signed_content: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModificationKind {
  /// The document was changed after the signature in a way that breaks it.
  IncrementalUpdate,
  /// A change was found whose effect on the signature cannot be decided.
  PossibleIncrementalUpdate,
}

/// Modification detected after the byte range of signature `signature_index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModificationException {
  pub signature_index: usize,
  pub kind: ModificationKind,
  pub description: String,
}

/// PDF parsing is done outside the engine; this is what it must provide.
pub trait PdfInspector: Send + Sync {
  fn is_pdf(&self, bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
  }

  fn signature_entries(&self, bytes: &[u8]) -> EngineResult<Vec<PdfSignatureEntry>>;

  fn modification_exceptions(&self, bytes: &[u8]) -> EngineResult<Vec<ModificationException>>;
}

/// Mark reports affected by modifications.
///
/// Entries are walked from the last signature to the first. A modification
/// found after signature *i* affects *i* and every earlier signature, never a
/// later one. An invalidating modification outranks an indeterminate one.
pub fn apply_incremental_updates(
  entries: &[PdfSignatureEntry],
  exceptions: &[ModificationException],
  reports: &mut [SignatureReport],
) {
  let mut invalidate = false;
  let mut indeterminate = false;

  for entry in entries.iter().rev() {
    for exception in exceptions.iter().filter(|e| e.signature_index == entry.index) {
      match exception.kind {
        ModificationKind::IncrementalUpdate => invalidate = true,
        ModificationKind::PossibleIncrementalUpdate => indeterminate = true,
      }
      log::info!("modification after signature {}: {}", entry.index, exception.description);
    }
    if entry.is_time_stamp {
      continue;
    }

    let status = if invalidate {
      IncrementalUpdateStatus::Invalid
    } else if indeterminate {
      IncrementalUpdateStatus::Indeterminate
    } else {
      continue;
    };
    for report in reports.iter_mut().filter(|r| r.index == entry.index) {
      report.set_incremental_update(status);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::types::Certificate;

  fn entry(index: usize, is_time_stamp: bool) -> PdfSignatureEntry {
    PdfSignatureEntry { index, is_time_stamp, contents: vec![], signed_content: vec![] }
  }

  fn report(index: usize) -> SignatureReport {
    let signer = Certificate { subject: format!("CN=Signer {index}"), ..Default::default() };
    SignatureReport::foreign_signer(index, None, &signer, "")
  }

  fn exception(signature_index: usize, kind: ModificationKind) -> ModificationException {
    ModificationException { signature_index, kind, description: "annotation added".into() }
  }

  #[test]
  fn modification_reaches_earlier_signatures_only() {
    let entries = vec![entry(0, false), entry(1, false), entry(2, false)];
    let mut reports = vec![report(0), report(1), report(2)];
    apply_incremental_updates(&entries, &[exception(1, ModificationKind::IncrementalUpdate)], &mut reports);

    assert_eq!(reports[0].incremental_update, IncrementalUpdateStatus::Invalid);
    assert_eq!(reports[1].incremental_update, IncrementalUpdateStatus::Invalid);
    assert_eq!(reports[2].incremental_update, IncrementalUpdateStatus::Unmodified);
  }

  #[test]
  fn invalidation_outranks_indeterminate() {
    let entries = vec![entry(0, false), entry(1, false)];
    let mut reports = vec![report(0), report(1)];
    let exceptions = vec![
      exception(1, ModificationKind::IncrementalUpdate),
      exception(0, ModificationKind::PossibleIncrementalUpdate),
    ];
    apply_incremental_updates(&entries, &exceptions, &mut reports);
    assert_eq!(reports[0].incremental_update, IncrementalUpdateStatus::Invalid);
    assert_eq!(reports[1].incremental_update, IncrementalUpdateStatus::Invalid);
  }

  #[test]
  fn time_stamp_entries_pass_flags_without_a_report() {
    let entries = vec![entry(0, false), entry(1, true)];
    let mut reports = vec![report(0)];
    apply_incremental_updates(&entries, &[exception(1, ModificationKind::PossibleIncrementalUpdate)], &mut reports);
    assert_eq!(reports[0].incremental_update, IncrementalUpdateStatus::Indeterminate);
  }

  #[test]
  fn default_is_pdf_sniffs_header() {
    struct Bare;
    impl PdfInspector for Bare {
      fn signature_entries(&self, _: &[u8]) -> EngineResult<Vec<PdfSignatureEntry>> {
        Ok(vec![])
      }
      fn modification_exceptions(&self, _: &[u8]) -> EngineResult<Vec<ModificationException>> {
        Ok(vec![])
      }
    }
    assert!(Bare.is_pdf(b"%PDF-1.7\n"));
    assert!(!Bare.is_pdf(b"0\x82"));
  }
}
