//! Endpoint Cache (`SPEC_FULL.md` §4.13, component C13): persists the
//! last-known channel endpoints so a reconnecting client can skip
//! `DescribeChannel`/`GetEndpoint` when `ChannelInfo::cache_policy` is set.
//!
//! Entry shape is grounded on
//! `examples/original_source/src/source/Signaling/FileCache.h`'s
//! `SignalingFileCacheEntry` (role, creation timestamp, channel name/ARN,
//! region, HTTPS/WSS endpoints); this crate keeps the same fields but, per
//! the expanded spec's design rationale, stores them behind a trait rather
//! than the original's fixed-path flat file, since an embedded deployment
//! may prefer NVRAM, a KV store, or nothing at all.

use async_trait::async_trait;

use crate::channel_info::ChannelRole;
use crate::clock_skew::Ticks100Ns;
use crate::error::Result;

/// One cached endpoint record, mirroring `SignalingFileCacheEntry`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEndpointState {
    pub role: ChannelRole,
    pub created_at: Ticks100Ns,
    pub channel_name: String,
    pub channel_arn: String,
    pub region: String,
    pub https_endpoint: String,
    pub wss_endpoint: String,
}

/// Storage backend for [`CachedEndpointState`]. The default
/// [`NullEndpointCacheStore`] makes caching an opt-in feature with zero
/// footprint when `cache_policy` is unset.
#[async_trait]
pub trait EndpointCacheStore: Send + Sync {
    async fn load(&self, channel_name: &str) -> Result<Option<CachedEndpointState>>;
    async fn save(&self, entry: CachedEndpointState) -> Result<()>;
    async fn invalidate(&self, channel_name: &str) -> Result<()>;
}

/// No-op store used whenever `ChannelInfo::cache_policy` is `false`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEndpointCacheStore;

#[async_trait]
impl EndpointCacheStore for NullEndpointCacheStore {
    async fn load(&self, _channel_name: &str) -> Result<Option<CachedEndpointState>> {
        Ok(None)
    }

    async fn save(&self, _entry: CachedEndpointState) -> Result<()> {
        Ok(())
    }

    async fn invalidate(&self, _channel_name: &str) -> Result<()> {
        Ok(())
    }
}

/// In-memory store, mainly useful for tests and for single-process
/// deployments that want cache reuse across `disconnect()`/`connect()`
/// cycles but not across restarts.
#[derive(Debug, Default)]
pub struct InMemoryEndpointCacheStore(std::sync::Mutex<std::collections::HashMap<String, CachedEndpointState>>);

#[async_trait]
impl EndpointCacheStore for InMemoryEndpointCacheStore {
    async fn load(&self, channel_name: &str) -> Result<Option<CachedEndpointState>> {
        Ok(self.0.lock().unwrap().get(channel_name).cloned())
    }

    async fn save(&self, entry: CachedEndpointState) -> Result<()> {
        self.0.lock().unwrap().insert(entry.channel_name.clone(), entry);
        Ok(())
    }

    async fn invalidate(&self, channel_name: &str) -> Result<()> {
        self.0.lock().unwrap().remove(channel_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> CachedEndpointState {
        CachedEndpointState {
            role: ChannelRole::Master,
            created_at: Ticks100Ns(0),
            channel_name: "c".into(),
            channel_arn: "arn:1".into(),
            region: "us-west-2".into(),
            https_endpoint: "https://e".into(),
            wss_endpoint: "wss://e".into(),
        }
    }

    #[tokio::test]
    async fn null_store_never_returns_entries() {
        let store = NullEndpointCacheStore;
        store.save(entry()).await.unwrap();
        assert!(store.load("c").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn in_memory_store_round_trips() {
        let store = InMemoryEndpointCacheStore::default();
        store.save(entry()).await.unwrap();
        assert_eq!(store.load("c").await.unwrap(), Some(entry()));
        store.invalidate("c").await.unwrap();
        assert!(store.load("c").await.unwrap().is_none());
    }
}
