// crates/engine/src/adapters/x509.rs
//! X.509 decoding into the engine's [`Certificate`] view.

use chrono::DateTime;
use x509_parser::pem::Pem;
use x509_parser::prelude::*;
use x509_parser::public_key::PublicKey;

use crate::domain::error::{EngineError, EngineResult};
use crate::domain::types::{BasicConstraints, Certificate, KeyUsage, Time};

fn timestamp(secs: i64) -> EngineResult<Time> {
  DateTime::from_timestamp(secs, 0).ok_or_else(|| EngineError::Structural(format!("certificate time {secs} out of range")))
}

pub fn decode_certificate(der: &[u8]) -> EngineResult<Certificate> {
  let (_, parsed) = X509Certificate::from_der(der)
    .map_err(|e| EngineError::Structural(format!("x509 parse failed: {e:?}")))?;

  let mut basic_constraints = None;
  let mut key_usage = None;
  let mut subject_key_id = None;
  let mut authority_key_id = None;
  let mut policy_oids = Vec::new();
  for ext in parsed.extensions() {
    match ext.parsed_extension() {
      ParsedExtension::BasicConstraints(bc) => {
        basic_constraints = Some(BasicConstraints { ca: bc.ca, path_len: bc.path_len_constraint });
      }
      ParsedExtension::KeyUsage(ku) => {
        key_usage = Some(KeyUsage {
          digital_signature: ku.digital_signature(),
          non_repudiation: ku.non_repudiation(),
          key_cert_sign: ku.key_cert_sign(),
          crl_sign: ku.crl_sign(),
        });
      }
      ParsedExtension::SubjectKeyIdentifier(ski) => subject_key_id = Some(ski.0.to_vec()),
      ParsedExtension::AuthorityKeyIdentifier(aki) => {
        authority_key_id = aki.key_identifier.as_ref().map(|k| k.0.to_vec());
      }
      ParsedExtension::CertificatePolicies(policies) => {
        policy_oids.extend(policies.iter().map(|p| p.policy_id.to_id_string()));
      }
      _ => {}
    }
  }

  let key_bits = match parsed.public_key().parsed() {
    Ok(PublicKey::RSA(rsa)) => rsa.key_size() as u32,
    // Uncompressed point: 0x04 || X || Y.
    Ok(PublicKey::EC(point)) => (point.data().len().saturating_sub(1) / 2 * 8) as u32,
    _ => 0,
  };

  let validity = parsed.validity();
  Ok(Certificate {
    der: der.to_vec(),
    subject: parsed.subject().to_string(),
    issuer: parsed.issuer().to_string(),
    serial: hex::encode_upper(parsed.serial.to_bytes_be()),
    not_before: timestamp(validity.not_before.timestamp())?,
    not_after: timestamp(validity.not_after.timestamp())?,
    subject_key_id,
    authority_key_id,
    basic_constraints,
    key_usage,
    policy_oids,
    public_key_algorithm: parsed.tbs_certificate.subject_pki.algorithm.algorithm.to_id_string(),
    key_bits,
    signature_algorithm: parsed.signature_algorithm.algorithm.to_id_string(),
  })
}

/// Every `CERTIFICATE` block of a PEM buffer, in order. Other labels are skipped.
pub fn decode_pem(pem: &[u8]) -> EngineResult<Vec<Certificate>> {
  let mut certificates = Vec::new();
  for block in Pem::iter_from_buffer(pem) {
    let block = block.map_err(|e| EngineError::Structural(format!("PEM parse failed: {e:?}")))?;
    if block.label != "CERTIFICATE" {
      continue;
    }
    certificates.push(decode_certificate(&block.contents)?);
  }
  Ok(certificates)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn garbage_is_structural() {
    let err = decode_certificate(b"not a certificate").unwrap_err();
    assert!(matches!(err, EngineError::Structural(_)));
  }

  #[test]
  fn pem_without_certificates_is_empty() {
    assert!(decode_pem(b"").unwrap().is_empty());
  }
}
