//! Timestamp authority abstraction.

use std::str::FromStr;
use thiserror::Error;

use crate::adapters::url_validation::validate_external_http_url;
use crate::domain::error::EngineResult;
use crate::domain::types::{HashAlgorithm, TimeStampToken};

#[derive(Debug, Error)]
pub enum TimestamperError {
    #[error(
        "Invalid timestamper scheme: expected 'digicert' or 'custom:https://...'"
    )]
    InvalidScheme,
}

/// Issues time-stamp tokens over a message imprint.
///
/// Implementations talk to a TSA; the engine only needs the token bytes and
/// the generation time it asserts.
pub trait TimeStampService: Send + Sync {
    fn time_stamp(&self, digest: &[u8], algorithm: HashAlgorithm) -> EngineResult<TimeStampToken>;
}

/// Where time-stamp requests are sent.
#[derive(Debug, Clone)]
pub enum TimeStampAuthority {
    Digicert,
    Custom(String),
}

impl FromStr for TimeStampAuthority {
    type Err = TimestamperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "digicert" {
            Ok(TimeStampAuthority::Digicert)
        } else if let Some(url) = s.strip_prefix("custom:") {
            Ok(TimeStampAuthority::Custom(url.to_string()))
        } else {
            Err(TimestamperError::InvalidScheme)
        }
    }
}

impl TimeStampAuthority {
    pub fn resolve(&self) -> String {
        match self {
            TimeStampAuthority::Digicert => "https://timestamp.digicert.com".to_string(),
            TimeStampAuthority::Custom(url) => url.clone(),
        }
    }

    /// Resolved endpoint, rejected unless it is an external HTTPS URL.
    pub fn endpoint(&self, allow_http: bool) -> EngineResult<String> {
        let url = self.resolve();
        validate_external_http_url(&url, allow_http)?;
        Ok(url)
    }
}
