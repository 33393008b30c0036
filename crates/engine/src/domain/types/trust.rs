use sha2::{Digest, Sha256};

use super::certificate::Certificate;

/// `anyPolicy` (RFC 5280).
pub const ANY_POLICY: &str = "2.5.29.32.0";

/// Subtrees a trust anchor restricts its descendants to, expressed as DN suffixes
/// such as `O=Example,C=BR`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameConstraints {
    pub permitted: Vec<String>,
    pub excluded: Vec<String>,
}

impl NameConstraints {
    pub fn permits(&self, subject: &str) -> bool {
        let within = |base: &String| dn_within(subject, base);
        if self.excluded.iter().any(within) {
            return false;
        }
        self.permitted.is_empty() || self.permitted.iter().any(within)
    }
}

/// RDN-wise, case-insensitive suffix test: `CN=a,O=x,C=BR` is within `O=x,C=BR`.
fn dn_within(subject: &str, base: &str) -> bool {
    let rdns = |dn: &str| -> Vec<String> {
        dn.split(',')
            .map(|p| p.trim().to_ascii_lowercase())
            .filter(|p| !p.is_empty())
            .collect()
    };
    let subject = rdns(subject);
    let base = rdns(base);
    base.len() <= subject.len() && subject[subject.len() - base.len()..] == base[..]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustAnchor {
    pub certificate: Certificate,
    pub name_constraints: Option<NameConstraints>,
    /// Acceptable certificate policies; empty accepts any.
    pub policy_oids: Vec<String>,
}

impl TrustAnchor {
    pub fn new(certificate: Certificate) -> Self {
        Self { certificate, name_constraints: None, policy_oids: Vec::new() }
    }

    pub fn with_name_constraints(mut self, constraints: NameConstraints) -> Self {
        self.name_constraints = Some(constraints);
        self
    }

    pub fn with_policy_oids(mut self, oids: Vec<String>) -> Self {
        self.policy_oids = oids;
        self
    }

    /// True when `cert` is this anchor or was issued directly by it.
    pub fn terminates(&self, cert: &Certificate) -> bool {
        cert == &self.certificate || cert.is_issued_by(&self.certificate)
    }

    pub fn accepts_policies(&self, cert: &Certificate) -> bool {
        self.policy_oids.is_empty()
            || cert
                .policy_oids
                .iter()
                .any(|oid| oid == ANY_POLICY || self.policy_oids.contains(oid))
    }

    pub fn accepts_name(&self, cert: &Certificate) -> bool {
        self.name_constraints
            .as_ref()
            .map(|nc| nc.permits(&cert.subject))
            .unwrap_or(true)
    }
}

/// Immutable set of trust anchors for one validation session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustAnchorSet {
    anchors: Vec<TrustAnchor>,
    fingerprint: String,
}

impl TrustAnchorSet {
    pub fn new(anchors: Vec<TrustAnchor>) -> Self {
        let mut hasher = Sha256::new();
        for anchor in &anchors {
            hasher.update(&anchor.certificate.der);
        }
        let fingerprint = hex::encode_upper(hasher.finalize());
        Self { anchors, fingerprint }
    }

    pub fn from_certificates(certificates: Vec<Certificate>) -> Self {
        Self::new(certificates.into_iter().map(TrustAnchor::new).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrustAnchor> {
        self.anchors.iter()
    }

    /// Identity of the set's contents, used to key path caches.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Anchor that ends a chain at `cert`, preferring an exact certificate match.
    pub fn anchor_for(&self, cert: &Certificate) -> Option<&TrustAnchor> {
        self.anchors
            .iter()
            .find(|a| &a.certificate == cert)
            .or_else(|| self.anchors.iter().find(|a| a.terminates(cert)))
    }
}
