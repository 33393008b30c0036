use std::fmt;

use sha2::{Digest, Sha256};

use super::core::Time;

/// `basicConstraints` extension content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BasicConstraints {
    pub ca: bool,
    pub path_len: Option<u32>,
}

/// The `keyUsage` bits the engine looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyUsage {
    pub digital_signature: bool,
    pub non_repudiation: bool,
    pub key_cert_sign: bool,
    pub crl_sign: bool,
}

/// Decoded view of an X.509 certificate.
///
/// `der` is the identity: two certificates are the same certificate when their
/// encodings are equal. The remaining fields are decoded once (see
/// [`crate::adapters::x509::decode_certificate`]) so the validator never
/// touches ASN.1.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Certificate {
    pub der: Vec<u8>,
    pub subject: String,
    pub issuer: String,
    /// Upper-case hex serial number.
    pub serial: String,
    pub not_before: Time,
    pub not_after: Time,
    pub subject_key_id: Option<Vec<u8>>,
    pub authority_key_id: Option<Vec<u8>>,
    pub basic_constraints: Option<BasicConstraints>,
    pub key_usage: Option<KeyUsage>,
    pub policy_oids: Vec<String>,
    pub public_key_algorithm: String,
    pub key_bits: u32,
    pub signature_algorithm: String,
}

impl Certificate {
    /// SHA-256 of the DER encoding, upper-case hex.
    pub fn fingerprint(&self) -> String {
        hex::encode_upper(Sha256::digest(&self.der))
    }

    pub fn is_self_issued(&self) -> bool {
        self.subject == self.issuer
    }

    pub fn is_ca(&self) -> bool {
        self.basic_constraints.map(|bc| bc.ca).unwrap_or(false)
    }

    /// Certificates without a keyUsage extension are not restricted.
    pub fn can_sign_certificates(&self) -> bool {
        self.key_usage.map(|ku| ku.key_cert_sign).unwrap_or(true)
    }

    pub fn is_valid_at(&self, at: Time) -> bool {
        self.not_before <= at && at <= self.not_after
    }

    /// Whether `issuer` plausibly issued this certificate (name and key identifier match).
    pub fn is_issued_by(&self, issuer: &Certificate) -> bool {
        if self.issuer != issuer.subject {
            return false;
        }
        match (&self.authority_key_id, &issuer.subject_key_id) {
            (Some(aki), Some(ski)) => aki == ski,
            _ => true,
        }
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject)
            .field("issuer", &self.issuer)
            .field("serial", &self.serial)
            .field("der_len", &self.der.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cert(subject: &str, issuer: &str) -> Certificate {
        Certificate {
            der: format!("{subject}|{issuer}").into_bytes(),
            subject: subject.into(),
            issuer: issuer.into(),
            ..Default::default()
        }
    }

    #[test]
    fn issuer_match_uses_key_identifiers_when_both_present() {
        let mut root = cert("CN=Root", "CN=Root");
        let mut leaf = cert("CN=Leaf", "CN=Root");
        assert!(leaf.is_issued_by(&root));

        root.subject_key_id = Some(vec![1, 2, 3]);
        leaf.authority_key_id = Some(vec![9, 9, 9]);
        assert!(!leaf.is_issued_by(&root));
    }

    #[test]
    fn missing_key_usage_does_not_restrict() {
        let mut ca = cert("CN=CA", "CN=CA");
        assert!(ca.can_sign_certificates());
        ca.key_usage = Some(KeyUsage { digital_signature: true, ..Default::default() });
        assert!(!ca.can_sign_certificates());
    }
}
