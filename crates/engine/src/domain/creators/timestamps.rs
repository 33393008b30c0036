// crates/engine/src/domain/creators/timestamps.rs
use crate::domain::builder::{AttributeBuilder, CreationContext};
use crate::domain::error::{EngineError, EngineResult};
use crate::domain::types::{ids, AttributeValue, Signature};

/// Hash `data` with the timestamp algorithm and ask the TSA for a token over it.
fn time_stamp_over(ctx: &CreationContext<'_>, label: &str, data: &[u8]) -> EngineResult<AttributeValue> {
  let service = ctx.time_stamp_service()?;
  let imprint = ctx.hasher.digest(ctx.time_stamp_hash, data)?;
  let token = service.time_stamp(&imprint, ctx.time_stamp_hash).map_err(|e| match e {
    EngineError::TimeStampUnavailable(_) => e,
    other => EngineError::TimeStampUnavailable(other.to_string()),
  })?;
  log::debug!("{label} token issued at {}", token.gen_time);
  Ok(AttributeValue::TimeStamp(token))
}

fn append_attribute(out: &mut Vec<u8>, signature: &Signature, identifier: &str) -> EngineResult<()> {
  let attribute = signature
    .attribute(identifier)
    .ok_or_else(|| EngineError::Structural(format!("attribute {identifier} missing from signature")))?;
  out.extend(attribute.canonical_bytes()?);
  Ok(())
}

/// Timestamp over the signature value (CAdES-T).
pub struct SignatureTimeStampBuilder;

impl AttributeBuilder for SignatureTimeStampBuilder {
  fn identifier(&self) -> &'static str {
    ids::SIGNATURE_TIME_STAMP
  }

  fn build(&self, ctx: &CreationContext<'_>, signature: &Signature) -> EngineResult<AttributeValue> {
    let value = signature
      .signature_value()
      .ok_or_else(|| EngineError::Structural("signature timestamp needs a computed signature value".into()))?;
    time_stamp_over(ctx, "signature timestamp", value)
  }
}

/// CAdES-C timestamp over the signature, its timestamp and the complete references.
pub struct EscTimeStampBuilder;

impl AttributeBuilder for EscTimeStampBuilder {
  fn identifier(&self) -> &'static str {
    ids::ESC_TIME_STAMP
  }

  fn prerequisites(&self) -> &'static [&'static str] {
    &[ids::CERTIFICATE_REFS, ids::REVOCATION_REFS, ids::SIGNATURE_TIME_STAMP]
  }

  fn build(&self, ctx: &CreationContext<'_>, signature: &Signature) -> EngineResult<AttributeValue> {
    let mut data = signature.signature_value().map(<[u8]>::to_vec).unwrap_or_default();
    append_attribute(&mut data, signature, ids::SIGNATURE_TIME_STAMP)?;
    append_attribute(&mut data, signature, ids::CERTIFICATE_REFS)?;
    append_attribute(&mut data, signature, ids::REVOCATION_REFS)?;
    time_stamp_over(ctx, "CAdES-C timestamp", &data)
  }
}

/// Archive timestamp v2: covers content, every signed attribute, the
/// signature value and every unsigned attribute present when it is built.
pub struct ArchiveTimeStampBuilder;

impl AttributeBuilder for ArchiveTimeStampBuilder {
  fn identifier(&self) -> &'static str {
    ids::ARCHIVE_TIME_STAMP_V2
  }

  fn prerequisites(&self) -> &'static [&'static str] {
    &[ids::CERTIFICATE_VALUES, ids::REVOCATION_VALUES]
  }

  fn build(&self, ctx: &CreationContext<'_>, signature: &Signature) -> EngineResult<AttributeValue> {
    let mut data = Vec::new();
    if let Some(content) = signature.content().bytes().or(ctx.detached_content) {
      data.extend_from_slice(content);
    }
    data.extend(signature.signed_attributes_bytes()?);
    if let Some(value) = signature.signature_value() {
      data.extend_from_slice(value);
    }
    for attribute in signature.unsigned_attributes() {
      data.extend(attribute.canonical_bytes()?);
    }
    time_stamp_over(ctx, "archive timestamp", &data)
  }
}
