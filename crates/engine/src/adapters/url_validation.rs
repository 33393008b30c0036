// crates/engine/src/adapters/url_validation.rs
//! Guards for TSA, LPA and revocation endpoints configured from outside.

use std::net::{IpAddr, ToSocketAddrs};

use url::{Host, Url};

use crate::domain::error::{EngineError, EngineResult};

fn is_blocked(ip: IpAddr) -> bool {
  match ip {
    IpAddr::V4(v4) => {
      v4.is_private()
        || v4.is_loopback()
        || v4.is_link_local()
        || v4.is_broadcast()
        || v4.is_documentation()
        || v4.is_unspecified()
    }
    IpAddr::V6(v6) => {
      v6.is_loopback() || v6.is_unique_local() || v6.is_unicast_link_local() || v6.is_unspecified() || v6.is_multicast()
    }
  }
}

/// Accept only external https URLs (http with `allow_http` and the `http_urls` feature).
pub fn validate_external_http_url(url_str: &str, allow_http: bool) -> EngineResult<()> {
  let url = Url::parse(url_str).map_err(|_| EngineError::Config(format!("invalid URL: {url_str}")))?;
  match url.scheme() {
    "https" => {}
    "http" => {
      if !allow_http {
        return Err(EngineError::Config("HTTP URLs are not allowed".into()));
      }
      #[cfg(not(feature = "http_urls"))]
      return Err(EngineError::Feature("http_urls"));
    }
    other => return Err(EngineError::Config(format!("unsupported URL scheme: {other}"))),
  }

  let host = url.host().ok_or_else(|| EngineError::Config("URL missing host".into()))?;
  let literal = match host {
    Host::Ipv4(a) => Some(IpAddr::V4(a)),
    Host::Ipv6(a) => Some(IpAddr::V6(a)),
    Host::Domain(_) => None,
  };
  if literal.map(is_blocked).unwrap_or(false) {
    return Err(EngineError::Config("URL host is not allowed (private/link-local/loopback)".into()));
  }

  // Domains resolving to internal addresses are rejected too; resolution failures are not.
  if let (Some(domain), Some(port)) = (url.host_str(), url.port_or_known_default()) {
    if let Ok(addrs) = (domain, port).to_socket_addrs() {
      if addrs.map(|a| a.ip()).any(is_blocked) {
        return Err(EngineError::Config("URL resolves to a disallowed private/loopback address".into()));
      }
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_private_and_loopback_literals() {
    assert!(validate_external_http_url("https://127.0.0.1/tsa", false).is_err());
    assert!(validate_external_http_url("https://10.1.2.3/tsa", false).is_err());
    assert!(validate_external_http_url("https://[::1]/tsa", false).is_err());
  }

  #[test]
  fn rejects_plain_http_unless_allowed() {
    let err = validate_external_http_url("http://8.8.8.8/tsa", false).unwrap_err();
    assert!(err.to_string().contains("HTTP URLs are not allowed"));
  }

  #[test]
  fn rejects_other_schemes() {
    let err = validate_external_http_url("ftp://8.8.8.8/lpa", false).unwrap_err();
    assert!(err.to_string().contains("unsupported URL scheme"));
  }

  #[test]
  fn accepts_public_https_literal() {
    assert!(validate_external_http_url("https://8.8.8.8/tsa", false).is_ok());
  }
}
