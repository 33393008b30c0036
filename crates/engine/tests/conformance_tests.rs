mod common;

use std::sync::Arc;

use que_ades as qa;

use common::{cert, signing_time_attr, FakeHasher, FakeSigner, Pki, POLICY_OID};
use qa::crypto::services::HashService;
use qa::domain::conformance::MissingReason;
use qa::domain::policy::{CertInfoReq, PolicyDocument};
use qa::domain::revocation::NoRevocationData;
use qa::domain::types::{
    ids, Attribute, AttributeValue, Certificate, CertificateReference, CertificateReferences, HashAlgorithm, Signature,
    SignedContent, TimeStampToken, TrustAnchorSet,
};
use qa::domain::verify::AttributeStatus;
use qa::{AttributeCatalog, CertificationPathValidator, PolicyViolation, SignaturePolicyEngine, ValidationResult};

fn signing_certificate_attr(certs: &[&Certificate]) -> Attribute {
    let references = certs
        .iter()
        .map(|c| CertificateReference {
            digest: FakeHasher.digest(HashAlgorithm::Sha256, &c.der).unwrap(),
            issuer: c.issuer.clone(),
            serial: c.serial.clone(),
        })
        .collect();
    Attribute::new(
        ids::SIGNING_CERTIFICATE_V2,
        true,
        true,
        AttributeValue::CertificateReferences(CertificateReferences { algorithm: HashAlgorithm::Sha256, references }),
    )
}

fn signature(signed: Vec<Attribute>, unsigned: Vec<Attribute>) -> Signature {
    Signature::parsed(SignedContent::Detached, signed, unsigned, vec![9; 32], common::SHA256_WITH_RSA)
}

/// Runs `f` with an engine anchored at the PKI root, revocation not required.
fn with_engine<R>(pki: &Pki, f: impl FnOnce(&SignaturePolicyEngine<'_>) -> R) -> R {
    common::init_logging();
    let catalog = AttributeCatalog::standard().unwrap();
    let collection = pki.collection();
    let verifier = FakeSigner::default();
    let paths = CertificationPathValidator::new(&collection, &NoRevocationData, &verifier);
    let anchors = pki.anchors();
    let engine = SignaturePolicyEngine::new(&catalog, &paths, &FakeHasher)
        .with_trust_anchors(&anchors)
        .with_reference_time(common::at());
    f(&engine)
}

fn no_revocation(mut policy: PolicyDocument) -> PolicyDocument {
    policy.revocation_requirement = qa::RevocationRequirement::none();
    policy
}

#[test]
fn missing_mandated_attribute_is_listed() {
    let pki = Pki::new("Scenario");
    let policy = common::policy(POLICY_OID, &[ids::SIGNING_CERTIFICATE, ids::SIGNING_TIME], &[]);
    let sig = signature(vec![signing_time_attr(common::at())], vec![]);

    let report = with_engine(&pki, |engine| engine.conformance(&sig, &pki.leaf, &policy));

    assert_eq!(report.missing_identifiers(), vec![ids::SIGNING_CERTIFICATE]);
    assert_eq!(report.missing_mandated_attributes[0].name, "IdAaSigningCertificate");
    assert_eq!(report.missing_mandated_attributes[0].reason, MissingReason::Absent);
    assert!(!report.is_conformant());
    let missing = report
        .attributes
        .iter()
        .find(|a| a.identifier == ids::SIGNING_CERTIFICATE)
        .unwrap();
    assert_eq!(missing.status, AttributeStatus::Missing);
}

#[test]
fn mandated_signed_attribute_in_unsigned_set_is_missing() {
    let pki = Pki::new("Placement");
    let policy = no_revocation(common::policy(POLICY_OID, &[ids::SIGNING_TIME], &[ids::CERTIFICATE_VALUES]));
    let unsigned_time = Attribute::new(ids::SIGNING_TIME, false, true, AttributeValue::SigningTime(common::at()));
    let sig = signature(vec![], vec![unsigned_time]);

    let report = with_engine(&pki, |engine| engine.conformance(&sig, &pki.leaf, &policy));
    let reasons: Vec<(&str, MissingReason)> = report
        .missing_mandated_attributes
        .iter()
        .map(|m| (m.identifier.as_str(), m.reason))
        .collect();
    assert_eq!(
        reasons,
        vec![(ids::SIGNING_TIME, MissingReason::Unsigned), (ids::CERTIFICATE_VALUES, MissingReason::Absent)]
    );
}

#[test]
fn every_check_runs_without_short_circuit() {
    let pki = Pki::new("AllChecks");
    let mut policy = common::policy(POLICY_OID, &[ids::SIGNING_CERTIFICATE_V2], &[]);
    policy.min_key_length = 4096;
    policy.allowed_algorithms = vec!["sha512WithRSAEncryption".into()];
    policy.signing_period.not_before = common::ts(1_800_000_000);
    policy.revocation_requirement = qa::RevocationRequirement::mandatory();
    let sig = signature(vec![signing_time_attr(common::at())], vec![]);

    let report = with_engine(&pki, |engine| engine.conformance(&sig, &pki.leaf, &policy));

    assert_eq!(report.missing_identifiers(), vec![ids::SIGNING_CERTIFICATE_V2]);
    assert!(report.algorithm_violations.contains(&PolicyViolation::AlgorithmNotAllowed("sha256WithRSAEncryption".into())));
    assert!(report.algorithm_violations.contains(&PolicyViolation::KeyTooShort { bits: 2048, minimum: 4096 }));
    assert_eq!(report.period_violation, Some(PolicyViolation::OutsideSigningPeriod { at: common::at() }));
    assert_eq!(report.path.result, ValidationResult::CrlMissing);

    let violations = report.violations();
    assert_eq!(violations.len(), 5);
    assert!(matches!(violations.last(), Some(PolicyViolation::Path { result: ValidationResult::CrlMissing, .. })));
}

#[test]
fn conformant_signature_passes() {
    let pki = Pki::new("Good");
    let mut policy = no_revocation(common::policy(POLICY_OID, &[ids::SIGNING_CERTIFICATE_V2, ids::SIGNING_TIME], &[]));
    policy.mandated_certificate_info = CertInfoReq::SignerOnly;
    let sig = signature(vec![signing_certificate_attr(&[&pki.leaf]), signing_time_attr(common::at())], vec![]);

    let report = with_engine(&pki, |engine| engine.conformance(&sig, &pki.leaf, &policy));
    assert!(report.is_conformant(), "{:?}", report.violations());
    assert!(report.attributes.iter().all(|a| a.status == AttributeStatus::Valid));
}

#[test]
fn certificate_info_requirement_counts_references() {
    let pki = Pki::new("CertInfo");
    let mut policy = no_revocation(common::policy(POLICY_OID, &[], &[]));
    policy.mandated_certificate_info = CertInfoReq::FullPath;
    let sig = signature(vec![signing_certificate_attr(&[&pki.leaf])], vec![]);

    let report = with_engine(&pki, |engine| engine.conformance(&sig, &pki.leaf, &policy));
    assert_eq!(report.certificate_info_violation, Some(PolicyViolation::CertificateInfo { expected: 3, found: 1 }));

    let full = signature(vec![signing_certificate_attr(&[&pki.leaf, &pki.inter, &pki.root])], vec![]);
    let report = with_engine(&pki, |engine| engine.conformance(&full, &pki.leaf, &policy));
    assert_eq!(report.certificate_info_violation, None);
}

#[test]
fn signing_certificate_for_another_key_is_invalid() {
    let pki = Pki::new("WrongCert");
    let policy = no_revocation(common::policy(POLICY_OID, &[], &[]));
    let impostor = cert("CN=Impostor", &pki.inter.subject, false);
    let sig = signature(vec![signing_certificate_attr(&[&impostor])], vec![]);

    let report = with_engine(&pki, |engine| engine.conformance(&sig, &pki.leaf, &policy));
    let finding = report
        .attributes
        .iter()
        .find(|a| a.identifier == ids::SIGNING_CERTIFICATE_V2)
        .unwrap();
    assert_eq!(finding.status, AttributeStatus::Invalid);
    assert!(finding.message.as_deref().unwrap().contains("does not identify the signer"));
}

#[test]
fn signature_time_stamp_sets_the_time_reference() {
    let pki = Pki::new("Stamped");
    let policy = no_revocation(common::policy(POLICY_OID, &[], &[]));
    let stamped_at = common::ts(1_650_000_000);
    let value = vec![9; 32];
    let token = TimeStampToken {
        gen_time: stamped_at,
        algorithm: HashAlgorithm::Sha256,
        imprint: FakeHasher.digest(HashAlgorithm::Sha256, &value).unwrap(),
        token: vec![],
        tsa: None,
        certificate: None,
    };
    let sig = signature(
        vec![signing_time_attr(common::at())],
        vec![Attribute::new(ids::SIGNATURE_TIME_STAMP, false, false, AttributeValue::TimeStamp(token))],
    );

    let report = with_engine(&pki, |engine| engine.conformance(&sig, &pki.leaf, &policy));
    assert_eq!(report.signing_time, stamped_at);
    assert_eq!(report.path.time_reference, stamped_at);
    assert_eq!(report.time_stamps.len(), 1);
    assert_eq!(report.time_stamps[0].imprint_valid, Some(true));
    assert!(report.time_stamps[0].certificate_path.is_none());

    let unstamped = signature(vec![], vec![]);
    let report = with_engine(&pki, |engine| engine.conformance(&unstamped, &pki.leaf, &policy));
    assert_eq!(report.signing_time, common::at());
}

#[test]
fn policy_anchors_take_precedence_over_session_anchors() {
    let pki = Pki::new("Session");
    let other = TrustAnchorSet::from_certificates(vec![cert("CN=Other Root", "CN=Other Root", true)]);
    let policy = no_revocation(common::policy(POLICY_OID, &[], &[])).with_signing_trust_anchors(Arc::new(other));
    let sig = signature(vec![], vec![]);

    let report = with_engine(&pki, |engine| engine.conformance(&sig, &pki.leaf, &policy));
    assert_eq!(report.path.result, ValidationResult::Invalid);
    assert!(report.path.message.contains("untrusted root") || report.path.message.contains("no issuer"));
}

#[test]
fn unknown_attributes_are_unrecognized_not_invalid() {
    let pki = Pki::new("Unknown");
    let policy = no_revocation(common::policy(POLICY_OID, &[], &[]));
    let exotic = Attribute::new("1.3.6.1.4.1.99999.1", true, false, AttributeValue::Encoded(vec![5]));
    let sig = signature(vec![exotic], vec![]);

    let report = with_engine(&pki, |engine| engine.conformance(&sig, &pki.leaf, &policy));
    assert_eq!(report.attributes[0].status, AttributeStatus::Unrecognized);
    assert!(report.is_conformant());
}

fn stamped_by(tsa: &Certificate, gen_time: qa::domain::types::Time) -> Signature {
    let value = vec![9; 32];
    let token = TimeStampToken {
        gen_time,
        algorithm: HashAlgorithm::Sha256,
        imprint: FakeHasher.digest(HashAlgorithm::Sha256, &value).unwrap(),
        token: vec![],
        tsa: Some(tsa.subject.clone()),
        certificate: Some(tsa.clone()),
    };
    signature(
        vec![signing_time_attr(common::at())],
        vec![Attribute::new(ids::SIGNATURE_TIME_STAMP, false, false, AttributeValue::TimeStamp(token))],
    )
}

#[test]
fn time_stamp_certificate_is_validated_against_its_own_anchors() {
    let pki = Pki::new("Signing");
    let tsa_root = cert("CN=TSA Root", "CN=TSA Root", true);
    let tsa = cert("CN=TSA Unit", "CN=TSA Root", false);
    let tsa_anchors = Arc::new(TrustAnchorSet::from_certificates(vec![tsa_root]));
    let mut policy = no_revocation(common::policy(POLICY_OID, &[], &[]));
    policy.time_stamp_revocation_requirement = qa::RevocationRequirement::none();
    let sig = stamped_by(&tsa, common::ts(1_650_000_000));

    // The signing anchors do not cover the TSA.
    let report = with_engine(&pki, |engine| engine.conformance(&sig, &pki.leaf, &policy));
    let path = report.time_stamps[0].certificate_path.as_ref().unwrap();
    assert_eq!(path.result, ValidationResult::Invalid);
    assert!(report
        .violations()
        .iter()
        .any(|v| matches!(v, PolicyViolation::TimeStampPath { result: ValidationResult::Invalid, .. })));

    let policy = policy.with_time_stamp_trust_anchors(tsa_anchors);
    let report = with_engine(&pki, |engine| engine.conformance(&sig, &pki.leaf, &policy));
    let path = report.time_stamps[0].certificate_path.as_ref().unwrap();
    assert_eq!(path.result, ValidationResult::Valid);
    assert_eq!(path.chain, vec!["CN=TSA Unit".to_string(), "CN=TSA Root".to_string()]);
    assert_eq!(path.time_reference, common::ts(1_650_000_000));
    assert!(report.is_conformant());
    assert!(report.violations().is_empty());
}

#[test]
fn time_stamp_certificate_follows_the_time_stamp_revocation_requirement() {
    let pki = Pki::new("Signing");
    let tsa = cert("CN=Signing TSA", &pki.inter.subject, false);
    let mut policy = no_revocation(common::policy(POLICY_OID, &[], &[]));
    policy.time_stamp_revocation_requirement = qa::RevocationRequirement::mandatory();
    let sig = stamped_by(&tsa, common::ts(1_650_000_000));

    // No TSA anchors: the signing anchors are used instead.
    let report = with_engine(&pki, |engine| engine.conformance(&sig, &pki.leaf, &policy));
    assert!(report.path.is_valid());
    let path = report.time_stamps[0].certificate_path.as_ref().unwrap();
    assert_eq!(path.result, ValidationResult::CrlMissing);

    let expired = stamped_by(&tsa, common::ts(1_900_000_000));
    policy.time_stamp_revocation_requirement = qa::RevocationRequirement::none();
    let report = with_engine(&pki, |engine| engine.conformance(&expired, &pki.leaf, &policy));
    assert_eq!(report.time_stamps[0].certificate_path.as_ref().unwrap().result, ValidationResult::Invalid);
}
