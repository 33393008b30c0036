use std::time::Duration;

use serde::Deserialize;

use super::core::HashAlgorithm;
use crate::adapters::url_validation::validate_external_http_url;
use crate::domain::error::{EngineError, EngineResult};

/// Centralized defaults for the signature engine.
/// All opinionated defaults should be defined here for consistency.
pub struct EngineDefaults;

impl EngineDefaults {
    // Security defaults
    pub const ALLOW_INSECURE_HTTP: bool = false; // Secure default: HTTPS only
    pub const PERSIST_DISCOVERED_CERTIFICATES: bool = true;

    // Path building
    pub const MAX_PATH_DEPTH: usize = 16;

    // Network collaborators (revocation, TSA, LPA)
    pub const NETWORK_TIMEOUT_MS: u64 = 10_000;

    // Creation defaults
    pub const TIME_STAMP_HASH_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;
}

/// Bounds applied to a single validation request.
#[derive(Debug, Clone, Copy)]
pub struct ValidationLimits {
    /// Max certificates walked from leaf to anchor.
    pub max_path_depth: usize,
    /// Per-call budget for revocation and timestamp lookups.
    pub network_timeout: Duration,
}

impl ValidationLimits {
    /// Opinionated production defaults.
    pub fn defaults() -> Self {
        Self {
            max_path_depth: EngineDefaults::MAX_PATH_DEPTH,
            network_timeout: Duration::from_millis(EngineDefaults::NETWORK_TIMEOUT_MS),
        }
    }
}

/// Engine configuration, usually read from JSON next to the policy files.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_path_depth: usize,
    pub network_timeout_ms: u64,
    /// Digest sent to the TSA; signature digests follow the policy.
    pub time_stamp_hash_algorithm: HashAlgorithm,
    /// Policy OID applied when a signature does not declare one.
    pub default_policy: Option<String>,
    /// Where the list of accepted policies (LPA) is published.
    pub lpa_url: Option<String>,
    pub allow_insecure_http: bool,
    pub persist_discovered_certificates: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::secure_default()
    }
}

impl EngineConfig {
    /// Secure opinionated defaults.
    pub fn secure_default() -> Self {
        Self {
            max_path_depth: EngineDefaults::MAX_PATH_DEPTH,
            network_timeout_ms: EngineDefaults::NETWORK_TIMEOUT_MS,
            time_stamp_hash_algorithm: EngineDefaults::TIME_STAMP_HASH_ALGORITHM,
            default_policy: None,
            lpa_url: None,
            allow_insecure_http: EngineDefaults::ALLOW_INSECURE_HTTP,
            persist_discovered_certificates: EngineDefaults::PERSIST_DISCOVERED_CERTIFICATES,
        }
    }

    pub fn from_json(json: &str) -> EngineResult<Self> {
        let cfg: EngineConfig = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.max_path_depth == 0 {
            return Err(EngineError::Config("max_path_depth must be at least 1".into()));
        }
        if self.network_timeout_ms == 0 {
            return Err(EngineError::Config("network_timeout_ms must be positive".into()));
        }
        if let Some(url) = &self.lpa_url {
            validate_external_http_url(url, self.allow_insecure_http)?;
        }
        Ok(())
    }

    pub fn limits(&self) -> ValidationLimits {
        ValidationLimits {
            max_path_depth: self.max_path_depth,
            network_timeout: Duration::from_millis(self.network_timeout_ms),
        }
    }
}
