#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io::Write;

use chrono::{DateTime, Utc};
use rcgen::{BasicConstraints, Certificate as RcCertificate, CertificateParams, DnType, IsCa, KeyPair, KeyUsagePurpose};
use sha2::{Digest, Sha256, Sha384, Sha512};
use tempfile::TempDir;

use que_ades as qa;
use qa::crypto::services::{HashService, SignService};
use qa::crypto::signer::PrivateKey;
use qa::crypto::timestamper::TimeStampService;
use qa::domain::error::{EngineError, EngineResult};
use qa::domain::family::{FamilyKind, SignatureFamily};
use qa::domain::pdf::{ModificationException, PdfInspector, PdfSignatureEntry};
use qa::domain::policy::PolicyDocument;
use qa::domain::types::{
    ids, Attribute, AttributeValue, BasicConstraints as Bc, Certificate, HashAlgorithm, Signature, SignatureContainer,
    SignedContent, Time, TimeStampToken, RSA_ENCRYPTION,
};

pub const POLICY_OID: &str = "2.16.76.1.7.1.1.2.3";
pub const SHA256_WITH_RSA: &str = "1.2.840.113549.1.1.11";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn ts(secs: i64) -> Time {
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap()
}

/// Reference instant used by most tests (2023-11-14).
pub fn at() -> Time {
    ts(1_700_000_000)
}

/// sha2-backed hashing. SHA-1 is stood in for by truncated SHA-256.
pub struct FakeHasher;

impl HashService for FakeHasher {
    fn digest(&self, algorithm: HashAlgorithm, data: &[u8]) -> EngineResult<Vec<u8>> {
        Ok(match algorithm {
            HashAlgorithm::Sha1 => Sha256::digest(data)[..20].to_vec(),
            HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            HashAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
            HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        })
    }
}

/// "Signatures" are SHA-256 over algorithm and data; certificate signatures
/// verify when the issuer name matches, unless the subject is marked bad.
#[derive(Default)]
pub struct FakeSigner {
    bad_links: HashSet<String>,
}

impl FakeSigner {
    pub fn with_bad_link(subject: &str) -> Self {
        Self { bad_links: HashSet::from([subject.to_string()]) }
    }

    fn mac(algorithm: &str, data: &[u8]) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(algorithm.as_bytes());
        hasher.update(data);
        hasher.finalize().to_vec()
    }
}

impl SignService for FakeSigner {
    fn sign(&self, algorithm: &str, _key: &PrivateKey, data: &[u8]) -> EngineResult<Vec<u8>> {
        Ok(Self::mac(algorithm, data))
    }

    fn verify(&self, algorithm: &str, _certificate: &Certificate, data: &[u8], signature: &[u8]) -> EngineResult<bool> {
        Ok(Self::mac(algorithm, data) == signature)
    }

    fn verify_certificate(&self, certificate: &Certificate, issuer: &Certificate) -> EngineResult<bool> {
        Ok(certificate.issuer == issuer.subject && !self.bad_links.contains(&certificate.subject))
    }
}

/// TSA echoing the imprint back, or refusing every request.
pub struct FakeTsa {
    pub gen_time: Time,
    pub fail: bool,
    pub certificate: Option<Certificate>,
}

impl FakeTsa {
    pub fn ok() -> Self {
        Self { gen_time: at(), fail: false, certificate: None }
    }

    pub fn down() -> Self {
        Self { gen_time: at(), fail: true, certificate: None }
    }

    /// Tokens carry `certificate` as the TSA signing certificate.
    pub fn signed_by(certificate: Certificate) -> Self {
        Self { certificate: Some(certificate), ..Self::ok() }
    }
}

impl TimeStampService for FakeTsa {
    fn time_stamp(&self, digest: &[u8], algorithm: HashAlgorithm) -> EngineResult<TimeStampToken> {
        if self.fail {
            return Err(EngineError::TimeStampUnavailable("connection refused".into()));
        }
        Ok(TimeStampToken {
            gen_time: self.gen_time,
            algorithm,
            imprint: digest.to_vec(),
            token: b"token".to_vec(),
            tsa: Some("CN=Fake TSA".into()),
            certificate: self.certificate.clone(),
        })
    }
}

/// Certificate valid 2020-09-13 .. 2027-01-15 with a 2048-bit RSA key.
pub fn cert(subject: &str, issuer: &str, ca: bool) -> Certificate {
    Certificate {
        der: format!("{subject}<-{issuer}").into_bytes(),
        subject: subject.into(),
        issuer: issuer.into(),
        serial: format!("{:02X}", subject.len()),
        not_before: ts(1_600_000_000),
        not_after: ts(1_800_000_000),
        basic_constraints: ca.then_some(Bc { ca: true, path_len: None }),
        public_key_algorithm: RSA_ENCRYPTION.into(),
        key_bits: 2048,
        signature_algorithm: SHA256_WITH_RSA.into(),
        ..Default::default()
    }
}

/// Root -> intermediate -> leaf, all under one name prefix.
pub struct Pki {
    pub root: Certificate,
    pub inter: Certificate,
    pub leaf: Certificate,
}

impl Pki {
    pub fn new(name: &str) -> Self {
        let root_dn = format!("CN={name} Root");
        let inter_dn = format!("CN={name} CA");
        Self {
            root: cert(&root_dn, &root_dn, true),
            inter: cert(&inter_dn, &root_dn, true),
            leaf: cert(&format!("CN={name} Signer"), &inter_dn, false),
        }
    }

    pub fn anchors(&self) -> qa::TrustAnchorSet {
        qa::TrustAnchorSet::from_certificates(vec![self.root.clone()])
    }

    /// Store holding the intermediate only; the root comes from the anchors.
    pub fn collection(&self) -> qa::InMemoryCertificateCollection {
        qa::InMemoryCertificateCollection::new(vec![self.inter.clone()])
    }
}

/// Policy with the given mandated attributes, SHA-256 and optional revocation.
pub fn policy(id: &str, signed: &[&str], unsigned: &[&str]) -> PolicyDocument {
    let json = serde_json::json!({
        "id": id,
        "mandated_signed_attributes": signed,
        "mandated_unsigned_attributes": unsigned,
        "min_key_length": 2048,
        "allowed_algorithms": ["sha256WithRSAEncryption"],
        "signing_period": { "not_before": "2020-01-01T00:00:00Z" },
        "revocation_requirement": { "level": "optional" },
        "hash_algorithm": "sha256"
    });
    PolicyDocument::from_json(&json.to_string()).unwrap()
}

pub fn signing_time_attr(t: Time) -> Attribute {
    Attribute::new(ids::SIGNING_TIME, true, true, AttributeValue::SigningTime(t))
}

pub fn policy_id_attr(oid: &str) -> Attribute {
    Attribute::new(
        ids::SIGNATURE_POLICY_ID,
        true,
        true,
        AttributeValue::PolicyIdentifier { oid: oid.into(), algorithm: HashAlgorithm::Sha256, digest: None },
    )
}

/// Parsed signature whose value verifies under [`FakeSigner`], carrying `signer`.
pub fn parsed_signature(signed: Vec<Attribute>, signer: &Certificate) -> Signature {
    let unsealed = Signature::parsed(SignedContent::Detached, signed.clone(), vec![], vec![], SHA256_WITH_RSA);
    let bytes = unsealed.signed_attributes_bytes().unwrap();
    let value = FakeSigner::default()
        .sign(SHA256_WITH_RSA, &PrivateKey::from_pem(Vec::new()), &bytes)
        .unwrap();
    let mut signature = Signature::parsed(SignedContent::Detached, signed, vec![], value, SHA256_WITH_RSA);
    signature.certificates.push(signer.clone());
    signature
}

/// Family recognising inputs it was told about; anything starting with
/// `malformed` is claimed but fails to parse.
pub struct FakeFamily {
    kind: FamilyKind,
    containers: HashMap<Vec<u8>, Vec<Signature>>,
}

impl FakeFamily {
    pub fn new(kind: FamilyKind) -> Self {
        Self { kind, containers: HashMap::new() }
    }

    pub fn with_container(mut self, bytes: &[u8], signatures: Vec<Signature>) -> Self {
        self.containers.insert(bytes.to_vec(), signatures);
        self
    }
}

impl SignatureFamily for FakeFamily {
    fn kind(&self) -> FamilyKind {
        self.kind
    }

    fn supports(&self, bytes: &[u8], _detached: Option<&[u8]>) -> bool {
        self.containers.contains_key(bytes) || bytes.starts_with(b"malformed")
    }

    fn parse_signatures(&self, bytes: &[u8], _detached: Option<&[u8]>) -> EngineResult<SignatureContainer> {
        self.containers
            .get(bytes)
            .cloned()
            .map(SignatureContainer::with_signatures)
            .ok_or_else(|| EngineError::Structural("truncated SignerInfo".into()))
    }

    fn signing_certificate(&self, signature: &Signature) -> EngineResult<Certificate> {
        signature
            .certificates
            .first()
            .cloned()
            .ok_or_else(|| EngineError::Structural("signer certificate not shipped".into()))
    }

    fn verify_signature_value(&self, signature: &Signature, signer: &Certificate, _detached: Option<&[u8]>) -> EngineResult<bool> {
        let value = signature
            .signature_value()
            .ok_or_else(|| EngineError::Structural("no signature value".into()))?;
        let algorithm = signature.signature_algorithm.as_deref().unwrap_or_default();
        FakeSigner::default().verify(algorithm, signer, &signature.signed_attributes_bytes()?, value)
    }
}

pub struct FakePdf {
    pub entries: Vec<PdfSignatureEntry>,
    pub exceptions: Vec<ModificationException>,
}

impl PdfInspector for FakePdf {
    fn signature_entries(&self, _bytes: &[u8]) -> EngineResult<Vec<PdfSignatureEntry>> {
        Ok(self.entries.clone())
    }

    fn modification_exceptions(&self, _bytes: &[u8]) -> EngineResult<Vec<ModificationException>> {
        Ok(self.exceptions.clone())
    }
}

/// Self-signed ECDSA P-256 CA.
pub fn rcgen_ca(cn: &str) -> RcCertificate {
    let mut params = CertificateParams::new(vec![]);
    params.alg = &rcgen::PKCS_ECDSA_P256_SHA256;
    params.distinguished_name.push(DnType::CommonName, cn);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
    params.key_pair = Some(KeyPair::generate(&rcgen::PKCS_ECDSA_P256_SHA256).expect("keypair"));
    RcCertificate::from_params(params).expect("ca cert")
}

pub fn rcgen_leaf(cn: &str) -> RcCertificate {
    let mut params = CertificateParams::new(vec![]);
    params.alg = &rcgen::PKCS_ECDSA_P256_SHA256;
    params.distinguished_name.push(DnType::CommonName, cn);
    params.key_usages = vec![KeyUsagePurpose::DigitalSignature, KeyUsagePurpose::ContentCommitment];
    params.key_pair = Some(KeyPair::generate(&rcgen::PKCS_ECDSA_P256_SHA256).expect("keypair"));
    RcCertificate::from_params(params).expect("leaf cert")
}

/// Leaf certificate PEM (signed by a fresh CA) and its key PEM.
pub fn generate_signer_pem_pair() -> (String, String) {
    let ca = rcgen_ca("Que Test CA");
    let leaf = rcgen_leaf("Que Test Signer");
    let cert_pem = leaf.serialize_pem_with_signer(&ca).expect("leaf pem");
    let key_pem = leaf.serialize_private_key_pem();
    (cert_pem, key_pem)
}

/// Configure env vars with generated PEM data and return a signer URI for them.
pub fn setup_env_signer_vars() -> String {
    let (cert_pem, key_pem) = generate_signer_pem_pair();
    std::env::set_var("QA_TEST_CERT_PEM", cert_pem);
    std::env::set_var("QA_TEST_KEY_PEM", key_pem);
    "env:QA_TEST_CERT_PEM,QA_TEST_KEY_PEM".to_string()
}

/// Write PEM files to a temp dir and return (tempdir, signer URI).
pub fn setup_local_signer_files() -> (TempDir, String) {
    let (cert_pem, key_pem) = generate_signer_pem_pair();
    let dir = tempfile::tempdir().expect("tempdir");
    let cert_path = dir.path().join("cert.pem");
    let key_path = dir.path().join("key.pem");
    std::fs::File::create(&cert_path).and_then(|mut f| f.write_all(cert_pem.as_bytes())).expect("write cert");
    std::fs::File::create(&key_path).and_then(|mut f| f.write_all(key_pem.as_bytes())).expect("write key");
    let uri = format!("local:{},{}", cert_path.display(), key_path.display());
    (dir, uri)
}
