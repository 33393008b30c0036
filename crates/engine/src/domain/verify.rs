// crates/engine/src/domain/verify.rs
use serde::Serialize;

use crate::domain::conformance::ConformanceReport;
use crate::domain::error::EngineResult;
use crate::domain::family::FamilyKind;
use crate::domain::policy::SigningPeriod;
use crate::domain::types::{Certificate, Time};
use crate::domain::validation::{PathFailureReason, PathValidation, ValidationData, ValidationResult};

/// Outcome of one signature, and of a whole report (worst signature wins).
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verdict {
    Valid,
    Indeterminate,
    Invalid,
}

impl From<ValidationResult> for Verdict {
    fn from(result: ValidationResult) -> Self {
        match result {
            ValidationResult::Valid => Verdict::Valid,
            ValidationResult::Invalid => Verdict::Invalid,
            ValidationResult::CrlMissing
            | ValidationResult::InvalidCrl
            | ValidationResult::ValidationNotPossible => Verdict::Indeterminate,
        }
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttributeStatus {
    Valid,
    Invalid,
    Missing,
    /// Present but not in the attribute catalog.
    Unrecognized,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct AttributeFinding {
    pub identifier: String,
    pub name: String,
    pub signed: bool,
    pub status: AttributeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Effect of PDF modifications made after a signature's byte range.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum IncrementalUpdateStatus {
    #[default]
    Unmodified,
    Indeterminate,
    Invalid,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct TimeStampReport {
    pub identifier: String,
    pub name: String,
    pub gen_time: Time,
    pub algorithm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tsa: Option<String>,
    /// Whether the token imprint matches the data it claims to cover, when checked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imprint_valid: Option<bool>,
    /// Path of the TSA certificate at the token's generation time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_path: Option<CertPathReport>,
}

/// Serializable summary of a [`PathValidation`].
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct CertPathReport {
    pub result: ValidationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<PathFailureReason>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_with_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revocation_date: Option<Time>,
    pub time_reference: Time,
    /// Subjects from the leaf up to the trust anchor.
    pub chain: Vec<String>,
    pub validation_data: Vec<ValidationData>,
}

impl CertPathReport {
    pub fn from_validation(validation: &PathValidation) -> Self {
        Self {
            result: validation.result,
            reason: validation.reason,
            message: validation.message.clone(),
            cert_with_error: validation.cert_with_error.as_ref().map(|c| c.subject.clone()),
            revocation_date: validation.revocation_date,
            time_reference: validation.time_reference,
            chain: validation
                .chain
                .as_ref()
                .map(|chain| chain.with_anchor().into_iter().map(|c| c.subject.clone()).collect())
                .unwrap_or_default(),
            validation_data: validation.validation_data.clone(),
        }
    }
}

/// Freshness of the list of accepted policies used for a report.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct LpaStatus {
    pub version: u32,
    pub next_update: Time,
    pub valid: bool,
    pub expired: bool,
    pub online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Status of one signature policy in the list of accepted policies.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct PaReport {
    pub oid: String,
    pub valid: bool,
    pub revoked: bool,
    pub expired: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<SigningPeriod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct SignatureReport {
    /// Position of the signature in its container, or of the PDF signature entry.
    pub index: usize,
    /// Position inside the container the signature was parsed from.
    pub position: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<FamilyKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signer_subject: Option<String>,
    /// Signer outside every configured trust anchor; only the subject is reported.
    pub foreign_signer: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_oid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_time: Option<Time>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_value_valid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_path: Option<CertPathReport>,
    pub attributes: Vec<AttributeFinding>,
    pub time_stamps: Vec<TimeStampReport>,
    pub violations: Vec<String>,
    /// A violation other than the path outcome, which is weighed separately.
    #[serde(skip)]
    policy_violated: bool,
    pub incremental_update: IncrementalUpdateStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_status: Option<PaReport>,
    pub counter_signatures: Vec<SignatureReport>,
    pub errors: Vec<String>,
    pub verdict: Verdict,
}

impl SignatureReport {
    fn empty(index: usize) -> Self {
        Self {
            index,
            position: 0,
            family: None,
            signer_subject: None,
            foreign_signer: false,
            policy_oid: None,
            signing_time: None,
            signature_value_valid: None,
            cert_path: None,
            attributes: Vec::new(),
            time_stamps: Vec::new(),
            violations: Vec::new(),
            policy_violated: false,
            incremental_update: IncrementalUpdateStatus::Unmodified,
            policy_status: None,
            counter_signatures: Vec::new(),
            errors: Vec::new(),
            verdict: Verdict::Indeterminate,
        }
    }

    /// Partial report for a signer outside the trust domain.
    pub fn foreign_signer(index: usize, family: Option<FamilyKind>, signer: &Certificate, message: impl Into<String>) -> Self {
        let mut report = Self::empty(index);
        report.family = family;
        report.signer_subject = Some(signer.subject.clone());
        report.foreign_signer = true;
        report.errors.push(message.into());
        report.refresh_verdict();
        report
    }

    /// Report for an entry that could not be processed at all.
    pub fn error(index: usize, family: Option<FamilyKind>, message: impl Into<String>) -> Self {
        let mut report = Self::empty(index);
        report.family = family;
        report.errors.push(message.into());
        report.refresh_verdict();
        report
    }

    pub fn from_conformance(
        index: usize,
        family: FamilyKind,
        signer: &Certificate,
        conformance: &ConformanceReport,
        signature_value_valid: bool,
    ) -> Self {
        let mut report = Self::empty(index);
        report.family = Some(family);
        report.signer_subject = Some(signer.subject.clone());
        report.policy_oid = Some(conformance.policy_oid.clone());
        report.signing_time = Some(conformance.signing_time);
        report.signature_value_valid = Some(signature_value_valid);
        report.cert_path = Some(CertPathReport::from_validation(&conformance.path));
        report.attributes = conformance.attributes.clone();
        report.time_stamps = conformance.time_stamps.clone();
        report.violations = conformance.violations().iter().map(ToString::to_string).collect();
        report.policy_violated = conformance.has_policy_violations();
        if !signature_value_valid {
            report.errors.push("signature value does not verify".into());
        }
        report.refresh_verdict();
        report
    }

    pub fn at_position(mut self, position: usize) -> Self {
        self.position = position;
        self
    }

    pub fn set_incremental_update(&mut self, status: IncrementalUpdateStatus) {
        self.incremental_update = status;
        self.refresh_verdict();
    }

    pub fn set_policy_status(&mut self, status: PaReport) {
        self.policy_status = Some(status);
        self.refresh_verdict();
    }

    pub fn push_counter_signature(&mut self, report: SignatureReport) {
        self.counter_signatures.push(report);
        self.refresh_verdict();
    }

    fn refresh_verdict(&mut self) {
        let mut verdict = Verdict::Valid;
        if self.foreign_signer {
            verdict = Verdict::Indeterminate;
        }
        if self.signature_value_valid == Some(false)
            || self.attributes.iter().any(|a| a.status == AttributeStatus::Invalid)
        {
            verdict = Verdict::Invalid;
        }
        if self.policy_violated || (!self.foreign_signer && !self.errors.is_empty()) {
            verdict = Verdict::Invalid;
        }
        if let Some(path) = &self.cert_path {
            verdict = verdict.max(Verdict::from(path.result));
        }
        for path in self.time_stamps.iter().filter_map(|t| t.certificate_path.as_ref()) {
            verdict = verdict.max(Verdict::from(path.result));
        }
        verdict = verdict.max(match self.incremental_update {
            IncrementalUpdateStatus::Unmodified => Verdict::Valid,
            IncrementalUpdateStatus::Indeterminate => Verdict::Indeterminate,
            IncrementalUpdateStatus::Invalid => Verdict::Invalid,
        });
        if self.policy_status.as_ref().map(|p| !p.valid).unwrap_or(false) {
            verdict = verdict.max(Verdict::Indeterminate);
        }
        for counter in &self.counter_signatures {
            verdict = verdict.max(counter.verdict);
        }
        self.verdict = verdict;
    }
}

/// Aggregated verification outcome for one input blob.
#[derive(Debug, Serialize, Clone)]
pub struct Report {
    pub generated_at: Time,
    /// True when the signatures were extracted from a PDF container.
    pub pdf: bool,
    pub signatures: Vec<SignatureReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lpa: Option<LpaStatus>,
    pub verdict: Verdict,
}

impl Report {
    pub fn new(generated_at: Time, pdf: bool, signatures: Vec<SignatureReport>, lpa: Option<LpaStatus>) -> Self {
        let verdict = signatures
            .iter()
            .map(|s| s.verdict)
            .max()
            .unwrap_or(Verdict::Indeterminate);
        Self { generated_at, pdf, signatures, lpa, verdict }
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
