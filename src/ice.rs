//! ICE server config data model (§3: `IceConfigInfo`), shared by the REST
//! client (C5, `GetIceConfig`) and the message parser (C4, inline
//! `IceServerList`).

use std::time::Duration;

use serde_json::Value;

use crate::clock_skew::Ticks100Ns;
use crate::config::{MAX_ICE_CONFIG_COUNT, MAX_ICE_URI_COUNT};
use crate::error::{Result, SignalingError};

/// One TURN/STUN server credential set (`spec.md` §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceConfigInfo {
    pub username: String,
    pub password: String,
    /// TTL in 100-ns ticks.
    pub ttl: Ticks100Ns,
    pub uris: Vec<String>,
    /// When this config was retrieved; used with `ttl` to compute expiry.
    pub retrieved_at: Ticks100Ns,
}

impl IceConfigInfo {
    /// Validates invariants: `uris` non-empty and capped, `ttl > 0`.
    pub fn new(
        username: String,
        password: String,
        ttl: Ticks100Ns,
        uris: Vec<String>,
        retrieved_at: Ticks100Ns,
    ) -> Result<Self> {
        if uris.is_empty() {
            return Err(SignalingError::InvalidApiReturn(
                "ICE config has no URIs".into(),
            ));
        }
        if uris.len() > MAX_ICE_URI_COUNT {
            return Err(SignalingError::MaxIceUri);
        }
        if username.len() > 256 || password.len() > 256 {
            return Err(SignalingError::InvalidApiReturn(
                "ICE config username/password exceeds 256 characters".into(),
            ));
        }
        if ttl.0 <= 0 {
            return Err(SignalingError::InvalidApiReturn("ICE config TTL must be > 0".into()));
        }
        Ok(Self {
            username,
            password,
            ttl,
            uris,
            retrieved_at,
        })
    }

    /// Expiry = `retrieved_at + ttl - grace`; used by the state machine to
    /// schedule the refresh timer (`spec.md` §4.9).
    #[must_use]
    pub fn refresh_at(&self, grace: Duration) -> Ticks100Ns {
        let grace_ticks = (grace.as_nanos() / 100) as i64;
        self.retrieved_at + (self.ttl.0 - grace_ticks)
    }

    #[must_use]
    pub fn expires_at(&self) -> Ticks100Ns {
        self.retrieved_at + self.ttl.0
    }

    #[must_use]
    pub fn is_expired(&self, now: Ticks100Ns) -> bool {
        now >= self.expires_at()
    }
}

/// Raw shape of an ICE server entry as it appears on the wire, either in a
/// `GetIceConfig` REST response or an inline `IceServerList` (`spec.md`
/// §4.4, §6).
#[derive(Debug, Clone)]
pub struct IceServerInfoWire {
    pub username: String,
    pub password: String,
    pub ttl_secs: i64,
    pub uris: Vec<String>,
}

impl IceServerInfoWire {
    /// Best-effort parse from a `serde_json::Value`; returns `None` (rather
    /// than erroring the whole batch) on a malformed entry, so one bad
    /// server in a list does not drop the rest.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let username = obj.get("Username").and_then(Value::as_str)?.to_string();
        let password = obj.get("Password").and_then(Value::as_str)?.to_string();
        let ttl_secs = obj
            .get("Ttl")
            .and_then(Value::as_i64)
            .or_else(|| obj.get("Ttl").and_then(Value::as_str).and_then(|s| s.parse().ok()))?;
        let uris = obj
            .get("Uris")
            .and_then(Value::as_array)?
            .iter()
            .filter_map(Value::as_str)
            .take(MAX_ICE_URI_COUNT)
            .map(str::to_string)
            .collect();
        Some(Self {
            username,
            password,
            ttl_secs,
            uris,
        })
    }

    pub fn into_ice_config_info(self, retrieved_at: Ticks100Ns) -> Result<IceConfigInfo> {
        IceConfigInfo::new(
            self.username,
            self.password,
            Ticks100Ns(self.ttl_secs * 10_000_000),
            self.uris,
            retrieved_at,
        )
    }
}

/// A bounded collection of up to [`MAX_ICE_CONFIG_COUNT`] configs, as held
/// by the client aggregate.
#[derive(Debug, Clone, Default)]
pub struct IceConfigSet(Vec<IceConfigInfo>);

impl IceConfigSet {
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Replaces the set, truncating to `MAX_ICE_CONFIG_COUNT` entries;
    /// excess entries are dropped silently (`spec.md` §8 boundary
    /// behavior), never surfaced as an error.
    pub fn replace(&mut self, configs: Vec<IceConfigInfo>) {
        self.0 = configs.into_iter().take(MAX_ICE_CONFIG_COUNT).collect();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&IceConfigInfo> {
        self.0.get(index)
    }

    /// Earliest expiry across all held configs, used to schedule the
    /// refresh timer.
    #[must_use]
    pub fn earliest_refresh_at(&self, grace: Duration) -> Option<Ticks100Ns> {
        self.0.iter().map(|c| c.refresh_at(grace)).min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_uris() {
        let r = IceConfigInfo::new("u".into(), "p".into(), Ticks100Ns(10), vec![], Ticks100Ns(0));
        assert!(r.is_err());
    }

    #[test]
    fn rejects_zero_ttl() {
        let r = IceConfigInfo::new("u".into(), "p".into(), Ticks100Ns(0), vec!["turn:x".into()], Ticks100Ns(0));
        assert!(r.is_err());
    }

    #[test]
    fn set_truncates_to_max() {
        let mut set = IceConfigSet::new();
        let configs: Vec<_> = (0..MAX_ICE_CONFIG_COUNT + 2)
            .map(|i| {
                IceConfigInfo::new(
                    format!("u{i}"),
                    "p".into(),
                    Ticks100Ns(36_000_000_000),
                    vec!["turn:x".into()],
                    Ticks100Ns(0),
                )
                .unwrap()
            })
            .collect();
        set.replace(configs);
        assert_eq!(set.len(), MAX_ICE_CONFIG_COUNT);
    }
}
