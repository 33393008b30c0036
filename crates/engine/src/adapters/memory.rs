// crates/engine/src/adapters/memory.rs
//! In-memory collaborators: a certificate store and a CRL-style revocation oracle.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::domain::path::{CertificateCollection, CertificateSelector};
use crate::domain::revocation::{RevocationData, RevocationLookup, RevocationOracle, RevocationStatus};
use crate::domain::types::{Certificate, Time};

/// Append-only certificate store. Readers share the lock; writers serialize.
#[derive(Debug, Default)]
pub struct InMemoryCertificateCollection {
  certificates: RwLock<Vec<Certificate>>,
}

impl InMemoryCertificateCollection {
  pub fn new(certificates: Vec<Certificate>) -> Self {
    let collection = Self::default();
    collection.add_certificates(&certificates);
    collection
  }

  pub fn len(&self) -> usize {
    self.certificates.read().unwrap_or_else(|e| e.into_inner()).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl CertificateCollection for InMemoryCertificateCollection {
  fn certificate(&self, selector: &CertificateSelector) -> Option<Certificate> {
    let certificates = self.certificates.read().unwrap_or_else(|e| e.into_inner());
    certificates.iter().find(|c| selector.matches(c)).cloned()
  }

  fn issuer_certificate(&self, cert: &Certificate) -> Option<Certificate> {
    let certificates = self.certificates.read().unwrap_or_else(|e| e.into_inner());
    certificates.iter().find(|c| *c != cert && cert.is_issued_by(c)).cloned()
  }

  fn add_certificates(&self, certificates: &[Certificate]) {
    let mut stored = self.certificates.write().unwrap_or_else(|e| e.into_inner());
    for cert in certificates {
      if !stored.contains(cert) {
        log::trace!("collection: added {}", cert.subject);
        stored.push(cert.clone());
      }
    }
  }
}

/// A CRL as the static oracle keeps it.
#[derive(Debug, Clone)]
struct StaticCrl {
  data: RevocationData,
  /// Upper-case hex serial -> revocation time.
  revoked: HashMap<String, Time>,
}

/// Revocation answers from CRLs loaded up front, keyed by issuer name.
///
/// Per-certificate overrides take precedence and let callers simulate
/// malformed data or timeouts.
#[derive(Debug, Default)]
pub struct StaticRevocationOracle {
  crls: HashMap<String, StaticCrl>,
  overrides: HashMap<(String, String), RevocationLookup>,
}

impl StaticRevocationOracle {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a CRL issued by `data.issuer` listing `revoked` (serial, revocation time) pairs.
  pub fn with_crl(mut self, data: RevocationData, revoked: Vec<(String, Time)>) -> Self {
    let revoked = revoked.into_iter().map(|(serial, at)| (serial.to_uppercase(), at)).collect();
    self.crls.insert(data.issuer.clone(), StaticCrl { data, revoked });
    self
  }

  pub fn with_lookup(mut self, cert: &Certificate, lookup: RevocationLookup) -> Self {
    self.overrides.insert((cert.issuer.clone(), cert.serial.to_uppercase()), lookup);
    self
  }
}

impl RevocationOracle for StaticRevocationOracle {
  fn revocation_status(&self, certificate: &Certificate, _issuer: Option<&Certificate>, _at: Time) -> RevocationLookup {
    let serial = certificate.serial.to_uppercase();
    if let Some(lookup) = self.overrides.get(&(certificate.issuer.clone(), serial.clone())) {
      return lookup.clone();
    }
    let Some(crl) = self.crls.get(&certificate.issuer) else {
      return RevocationLookup::not_found();
    };
    match crl.revoked.get(&serial) {
      Some(revoked_at) => RevocationLookup {
        status: RevocationStatus::Revoked { revoked_at: *revoked_at, reason: None },
        data: Some(crl.data.clone()),
        from_network: false,
      },
      None => RevocationLookup::good(crl.data.clone()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::revocation::RevocationSource;

  fn cert(subject: &str, issuer: &str, serial: &str) -> Certificate {
    Certificate {
      der: format!("{subject}|{serial}").into_bytes(),
      subject: subject.into(),
      issuer: issuer.into(),
      serial: serial.into(),
      ..Default::default()
    }
  }

  #[test]
  fn issuer_lookup_skips_self() {
    let root = cert("CN=Root", "CN=Root", "01");
    let leaf = cert("CN=Leaf", "CN=Root", "02");
    let store = InMemoryCertificateCollection::new(vec![root.clone(), leaf.clone()]);
    assert_eq!(store.issuer_certificate(&leaf), Some(root.clone()));
    assert_eq!(store.issuer_certificate(&root), None);
  }

  #[test]
  fn add_is_idempotent() {
    let root = cert("CN=Root", "CN=Root", "01");
    let store = InMemoryCertificateCollection::new(vec![root.clone()]);
    store.add_certificates(&[root.clone(), root]);
    assert_eq!(store.len(), 1);
  }

  #[test]
  fn crl_reports_listed_serials() {
    let now = chrono::Utc::now();
    let data = RevocationData {
      source: RevocationSource::Crl,
      issuer: "CN=Root".into(),
      this_update: now,
      next_update: None,
      encoded: vec![1, 2, 3],
    };
    let oracle = StaticRevocationOracle::new().with_crl(data, vec![("0a".into(), now)]);
    let revoked = oracle.revocation_status(&cert("CN=A", "CN=Root", "0A"), None, now);
    assert!(matches!(revoked.status, RevocationStatus::Revoked { .. }));
    let good = oracle.revocation_status(&cert("CN=B", "CN=Root", "0B"), None, now);
    assert_eq!(good.status, RevocationStatus::Good);
    let unknown = oracle.revocation_status(&cert("CN=C", "CN=Other", "0C"), None, now);
    assert_eq!(unknown.status, RevocationStatus::NotFound);
  }
}
