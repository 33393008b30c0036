// crates/engine/src/adapters/runtime.rs
//! Synchronous, time-bounded access to network collaborators.
//!
//! Revocation and timestamp lookups are the only suspension points of the
//! engine. Sources return futures; the wrappers here block until they complete
//! and give up after the configured timeout.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::runtime::{Handle, RuntimeFlavor};

use crate::crypto::timestamper::TimeStampService;
use crate::domain::error::{EngineError, EngineResult};
use crate::domain::revocation::{RevocationLookup, RevocationOracle};
use crate::domain::types::{Certificate, HashAlgorithm, Time, TimeStampToken, ValidationLimits};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Drive a network future to completion from synchronous engine code.
///
/// A multi-thread runtime lends the calling worker; a current-thread runtime
/// cannot, so the future gets a private runtime on a scoped helper thread.
/// Outside any runtime a private one is built on the calling thread.
pub fn block_on_network<F, T>(fut: F) -> EngineResult<T>
where
  F: Future<Output = EngineResult<T>> + Send,
  T: Send,
{
  match Handle::try_current() {
    Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
      tokio::task::block_in_place(|| handle.block_on(fut))
    }
    Ok(_) => std::thread::scope(|scope| {
      scope
        .spawn(|| drive(fut))
        .join()
        .unwrap_or_else(|_| Err(EngineError::Config("network worker thread panicked".into())))
    }),
    Err(_) => drive(fut),
  }
}

fn drive<F, T>(fut: F) -> EngineResult<T>
where
  F: Future<Output = EngineResult<T>>,
{
  let rt = tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .map_err(|e| EngineError::Config(format!("cannot start network runtime: {e}")))?;
  rt.block_on(fut)
}

/// CRL/OCSP retrieval over the network.
pub trait NetworkRevocationSource: Send + Sync {
  fn fetch<'a>(
    &'a self,
    certificate: &'a Certificate,
    issuer: Option<&'a Certificate>,
    at: Time,
  ) -> BoxFuture<'a, RevocationLookup>;
}

/// Oracle over a network source; a lookup that exceeds the timeout is reported as timed out.
pub struct TimeoutRevocationOracle<S> {
  source: S,
  timeout: Duration,
}

impl<S: NetworkRevocationSource> TimeoutRevocationOracle<S> {
  pub fn new(source: S, limits: ValidationLimits) -> Self {
    Self { source, timeout: limits.network_timeout }
  }
}

impl<S: NetworkRevocationSource> RevocationOracle for TimeoutRevocationOracle<S> {
  fn revocation_status(&self, certificate: &Certificate, issuer: Option<&Certificate>, at: Time) -> RevocationLookup {
    let timeout = self.timeout;
    let lookup = block_on_network(async {
      Ok(tokio::time::timeout(timeout, self.source.fetch(certificate, issuer, at)).await.ok())
    });
    match lookup {
      Ok(Some(found)) => found.from_network(),
      Ok(None) => {
        log::warn!("revocation lookup for {} timed out after {:?}", certificate.subject, timeout);
        RevocationLookup::timed_out()
      }
      Err(e) => {
        log::warn!("revocation lookup for {} not run: {e}", certificate.subject);
        RevocationLookup::timed_out()
      }
    }
  }
}

/// TSA client returning futures.
pub trait NetworkTimeStampSource: Send + Sync {
  fn request<'a>(&'a self, digest: &'a [u8], algorithm: HashAlgorithm) -> BoxFuture<'a, EngineResult<TimeStampToken>>;
}

pub struct TimeoutTimeStampService<S> {
  source: S,
  timeout: Duration,
}

impl<S: NetworkTimeStampSource> TimeoutTimeStampService<S> {
  pub fn new(source: S, limits: ValidationLimits) -> Self {
    Self { source, timeout: limits.network_timeout }
  }
}

impl<S: NetworkTimeStampSource> TimeStampService for TimeoutTimeStampService<S> {
  fn time_stamp(&self, digest: &[u8], algorithm: HashAlgorithm) -> EngineResult<TimeStampToken> {
    let timeout = self.timeout;
    block_on_network(async {
      tokio::time::timeout(timeout, self.source.request(digest, algorithm))
        .await
        .map_err(|_| EngineError::TimeStampUnavailable(format!("no response within {:?}", timeout)))?
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::revocation::RevocationStatus;

  #[test]
  fn bridge_without_runtime() {
    let res: EngineResult<u8> = block_on_network(async { Ok(7) });
    assert_eq!(res.unwrap(), 7);
  }

  #[test]
  fn bridge_inside_multithread_runtime() {
    let rt = tokio::runtime::Builder::new_multi_thread().enable_all().build().unwrap();
    let res: EngineResult<u8> = rt.block_on(async { block_on_network(async { Ok(7) }) });
    assert_eq!(res.unwrap(), 7);
  }

  #[test]
  fn bridge_inside_current_thread_runtime() {
    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    let res: EngineResult<u8> = rt.block_on(async { block_on_network(async { Ok(7) }) });
    assert_eq!(res.unwrap(), 7);
  }

  struct Slow(Duration);

  impl NetworkRevocationSource for Slow {
    fn fetch<'a>(&'a self, _: &'a Certificate, _: Option<&'a Certificate>, _: Time) -> BoxFuture<'a, RevocationLookup> {
      let wait = self.0;
      Box::pin(async move {
        tokio::time::sleep(wait).await;
        RevocationLookup::not_found()
      })
    }
  }

  impl NetworkTimeStampSource for Slow {
    fn request<'a>(&'a self, _: &'a [u8], _: HashAlgorithm) -> BoxFuture<'a, EngineResult<TimeStampToken>> {
      let wait = self.0;
      Box::pin(async move {
        tokio::time::sleep(wait).await;
        Err(EngineError::TimeStampUnavailable("late".into()))
      })
    }
  }

  fn limits(ms: u64) -> ValidationLimits {
    ValidationLimits { network_timeout: Duration::from_millis(ms), ..ValidationLimits::defaults() }
  }

  #[test]
  fn slow_revocation_source_times_out() {
    let oracle = TimeoutRevocationOracle::new(Slow(Duration::from_secs(5)), limits(20));
    let lookup = oracle.revocation_status(&Certificate::default(), None, chrono::Utc::now());
    assert_eq!(lookup.status, RevocationStatus::TimedOut);
    assert!(lookup.from_network);
  }

  #[test]
  fn fast_revocation_source_is_marked_as_network() {
    let oracle = TimeoutRevocationOracle::new(Slow(Duration::from_millis(1)), limits(2_000));
    let lookup = oracle.revocation_status(&Certificate::default(), None, chrono::Utc::now());
    assert_eq!(lookup.status, RevocationStatus::NotFound);
    assert!(lookup.from_network);
  }

  #[tokio::test]
  async fn revocation_lookup_from_current_thread_runtime() {
    let oracle = TimeoutRevocationOracle::new(Slow(Duration::from_millis(1)), limits(2_000));
    let lookup = oracle.revocation_status(&Certificate::default(), None, chrono::Utc::now());
    assert_eq!(lookup.status, RevocationStatus::NotFound);

    let oracle = TimeoutRevocationOracle::new(Slow(Duration::from_secs(5)), limits(20));
    let lookup = oracle.revocation_status(&Certificate::default(), None, chrono::Utc::now());
    assert_eq!(lookup.status, RevocationStatus::TimedOut);
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
  async fn time_stamp_from_multithread_runtime() {
    let tsa = TimeoutTimeStampService::new(Slow(Duration::from_secs(5)), limits(20));
    let err = tsa.time_stamp(&[0u8; 32], HashAlgorithm::Sha256).unwrap_err();
    assert!(matches!(err, EngineError::TimeStampUnavailable(_)));
  }

  #[tokio::test]
  async fn time_stamp_from_current_thread_runtime() {
    let tsa = TimeoutTimeStampService::new(Slow(Duration::from_secs(5)), limits(20));
    let err = tsa.time_stamp(&[0u8; 32], HashAlgorithm::Sha256).unwrap_err();
    assert!(err.to_string().contains("no response within"));
  }

  #[test]
  fn slow_tsa_is_unavailable() {
    let tsa = TimeoutTimeStampService::new(Slow(Duration::from_secs(5)), limits(20));
    let err = tsa.time_stamp(&[0u8; 32], HashAlgorithm::Sha256).unwrap_err();
    assert!(err.to_string().contains("no response within"));
  }
}
