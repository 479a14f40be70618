//! Client-wide tunables (§4.11 `SPEC_FULL.md`, component C11).
//!
//! Grounded on the teacher's `config` + `serde_yaml` + `toml` +
//! `humantime-serde` stack (all declared in the teacher's root
//! `Cargo.toml`) and on `smart-default`, used the same way the teacher uses
//! it for `Default`-with-overrides structs.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

use crate::error::{Result, SignalingError};

/// Sentinel used by [`ClientConfig::rest_retry_max_attempts`] to mean "retry
/// forever", mirroring the original SDK's `INFINITE_RETRY_COUNT_SENTINEL`.
pub const INFINITE_RETRY_COUNT_SENTINEL: u32 = 0;

/// Hard ceiling on concurrently active ICE server configs.
pub const MAX_ICE_CONFIG_COUNT: usize = 5;

/// Hard ceiling on URIs per ICE server config.
pub const MAX_ICE_URI_COUNT: usize = 5;

/// Hard ceiling on concurrently active streaming sessions, build-time
/// default.
pub const DEFAULT_MAX_SESSIONS: usize = 3;

#[derive(Debug, Clone, SmartDefault, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Bound on how long `connect()` blocks before giving up.
    #[default(Duration::from_secs(10))]
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Bound on how long cooperative shutdown is allowed to take.
    #[default(Duration::from_secs(5))]
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,

    /// Period of the session garbage-collection tick.
    #[default(Duration::from_secs(1))]
    #[serde(with = "humantime_serde")]
    pub session_cleanup_wait: Duration,

    /// Period after which a queue of candidates with no matching offer is
    /// dropped.
    #[default(Duration::from_secs(60))]
    #[serde(with = "humantime_serde")]
    pub pending_queue_ttl: Duration,

    /// Build-time ceiling on concurrently active peer sessions.
    #[default(DEFAULT_MAX_SESSIONS)]
    pub max_concurrent_sessions: usize,

    /// Ceiling on concurrently held ICE server configs, never above
    /// [`MAX_ICE_CONFIG_COUNT`].
    #[default(MAX_ICE_CONFIG_COUNT)]
    pub max_ice_config_count: usize,

    /// `None` after validation means "retry forever"; see
    /// [`INFINITE_RETRY_COUNT_SENTINEL`].
    #[default(Some(10))]
    pub rest_retry_max_attempts: Option<u32>,

    /// Base delay for REST transient-failure retries.
    #[default(Duration::from_millis(100))]
    #[serde(with = "humantime_serde")]
    pub rest_retry_base_delay: Duration,

    /// Base delay for state-machine step backoff (50 ms doubling per
    /// attempt).
    #[default(Duration::from_millis(50))]
    #[serde(with = "humantime_serde")]
    pub step_retry_base_delay: Duration,

    /// Cap on state-machine step backoff.
    #[default(Duration::from_secs(16))]
    #[serde(with = "humantime_serde")]
    pub step_retry_max_delay: Duration,

    /// How long before ICE TTL expiry the refresh timer fires.
    #[default(Duration::from_secs(30))]
    #[serde(with = "humantime_serde")]
    pub ice_refresh_grace: Duration,

    /// Clock-skew magnitude (in whole seconds) above which a correction is
    /// recorded; `spec.md` fixes this at 3 minutes.
    #[default(Duration::from_secs(180))]
    #[serde(with = "humantime_serde")]
    pub clock_skew_threshold: Duration,

    /// WSS application-level ping interval.
    #[default(Duration::from_secs(10))]
    #[serde(with = "humantime_serde")]
    pub ping_interval: Duration,

    /// EMA smoothing factor for API latency diagnostics.
    #[default(0.05)]
    pub latency_ema_alpha: f64,
}

impl ClientConfig {
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder(Self::default())
    }

    /// Loads and layers a config file (YAML or TOML, detected by
    /// extension) on top of the defaults, the way the teacher's server
    /// loads `config/medea.yml`.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SignalingError::InvalidArg(format!("cannot read config file: {e}")))?;
        let parsed = if path.extension().and_then(|e| e.to_str()) == Some("toml") {
            toml::from_str(&raw)
                .map_err(|e| SignalingError::InvalidArg(format!("invalid TOML config: {e}")))?
        } else {
            serde_yaml::from_str(&raw)
                .map_err(|e| SignalingError::InvalidArg(format!("invalid YAML config: {e}")))?
        };
        Self::validate(parsed)
    }

    fn validate(mut cfg: Self) -> Result<Self> {
        if cfg.max_ice_config_count > MAX_ICE_CONFIG_COUNT {
            cfg.max_ice_config_count = MAX_ICE_CONFIG_COUNT;
        }
        if cfg.max_concurrent_sessions == 0 {
            return Err(SignalingError::InvalidArg(
                "max_concurrent_sessions must be at least 1".into(),
            ));
        }
        Ok(cfg)
    }
}

/// Chained builder; mirrors the teacher's `ClientConfig::builder()` pattern
/// used across the pack's CLI/config-heavy crates.
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder(ClientConfig);

macro_rules! setter {
    ($name:ident: $ty:ty) => {
        #[must_use]
        pub fn $name(mut self, value: $ty) -> Self {
            self.0.$name = value;
            self
        }
    };
}

impl ClientConfigBuilder {
    setter!(connect_timeout: Duration);
    setter!(shutdown_timeout: Duration);
    setter!(session_cleanup_wait: Duration);
    setter!(pending_queue_ttl: Duration);
    setter!(max_concurrent_sessions: usize);
    setter!(rest_retry_max_attempts: Option<u32>);
    setter!(rest_retry_base_delay: Duration);
    setter!(step_retry_base_delay: Duration);
    setter!(step_retry_max_delay: Duration);
    setter!(ice_refresh_grace: Duration);
    setter!(clock_skew_threshold: Duration);
    setter!(ping_interval: Duration);
    setter!(latency_ema_alpha: f64);

    #[must_use]
    pub fn max_ice_config_count(mut self, value: usize) -> Self {
        self.0.max_ice_config_count = value.min(MAX_ICE_CONFIG_COUNT);
        self
    }

    pub fn build(self) -> Result<ClientConfig> {
        ClientConfig::validate(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.connect_timeout, Duration::from_secs(10));
        assert_eq!(cfg.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(cfg.max_concurrent_sessions, DEFAULT_MAX_SESSIONS);
        assert_eq!(cfg.max_ice_config_count, MAX_ICE_CONFIG_COUNT);
    }

    #[test]
    fn builder_clamps_ice_config_count() {
        let cfg = ClientConfig::builder().max_ice_config_count(99).build().unwrap();
        assert_eq!(cfg.max_ice_config_count, MAX_ICE_CONFIG_COUNT);
    }

    #[test]
    fn builder_rejects_zero_sessions() {
        let err = ClientConfig::builder().max_concurrent_sessions(0).build();
        assert!(err.is_err());
    }
}
