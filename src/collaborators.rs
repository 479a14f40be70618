//! External interfaces this crate consumes but does not implement (§6).
//!
//! Per `spec.md` these are board-support/AWS-SDK concerns: credentials,
//! a clock, and (added in `SPEC_FULL.md` §4.13) a cache store. TLS/HTTP and
//! the WebSocket transport are *not* abstracted behind a trait — see
//! `SPEC_FULL.md` §6 for why.

use async_trait::async_trait;

use crate::clock_skew::Ticks100Ns;
use crate::error::Result;

/// AWS credentials as handed back by a [`CredentialsProvider`].
#[derive(Debug, Clone)]
pub struct AwsCredentials {
    pub access_key: String,
    pub secret_key: String,
    pub session_token: Option<String>,
    /// Expiration, in 100-ns ticks since the Unix epoch.
    pub expiration: Ticks100Ns,
}

impl AwsCredentials {
    #[must_use]
    pub fn is_expired(&self, now: Ticks100Ns) -> bool {
        now >= self.expiration
    }
}

/// Supplies (and refreshes) AWS credentials used to sign REST and WSS
/// requests.
#[async_trait]
pub trait CredentialsProvider: Send + Sync {
    async fn fetch(&self, now: Ticks100Ns) -> Result<AwsCredentials>;
}

/// Monotonic/wall clock abstraction so tests can control time and embedded
/// targets can supply their own RTC.
pub trait ClockSource: Send + Sync {
    /// Current time, in 100-ns ticks since the Unix epoch.
    fn now(&self) -> Ticks100Ns;
}

/// [`ClockSource`] backed by the OS wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now(&self) -> Ticks100Ns {
        let dur = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        Ticks100Ns(dur.as_nanos() as i64 / 100)
    }
}

/// Static [`CredentialsProvider`] useful for tests and for devices
/// provisioned with long-lived credentials.
pub struct StaticCredentialsProvider(pub AwsCredentials);

#[async_trait]
impl CredentialsProvider for StaticCredentialsProvider {
    async fn fetch(&self, _now: Ticks100Ns) -> Result<AwsCredentials> {
        Ok(self.0.clone())
    }
}
