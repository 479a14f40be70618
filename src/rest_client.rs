//! REST Client (§4.5, component C5): the six control-plane calls.
//!
//! Request bodies follow the exact field names fixed by the original SDK
//! (`examples/original_source/src/source/Signaling/LwsApiCalls.h`'s
//! `*_PARAM_JSON_TEMPLATE` macros). The "one async method per call, bounded
//! retry, typed error" shape is grounded on
//! `examples/instrumentisto-medea/crates/medea-coturn-telnet-client/src/client.rs`.
//! `reqwest` is promoted from the teacher's dev-dependency to a real
//! dependency, since here it drives the actual control plane rather than
//! just test fixtures.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::channel_info::{ChannelInfo, ChannelRole};
use crate::clock_skew::{ClockSkewMap, EndpointKind, Ticks100Ns};
use crate::collaborators::AwsCredentials;
use crate::config::ClientConfig;
use crate::error::{Result, SignalingError};
use crate::ice::{IceConfigInfo, IceServerInfoWire};
use crate::signing::{sign, SignedRequest, SigningMode, UnsignedRequest};
use crate::state_machine::State;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Creating,
    Active,
    Updating,
    Deleting,
}

impl ChannelStatus {
    fn from_str(s: &str) -> Self {
        match s {
            "CREATING" => Self::Creating,
            "UPDATING" => Self::Updating,
            "DELETING" => Self::Deleting,
            _ => Self::Active,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignalingChannelDescription {
    pub channel_arn: String,
    pub channel_name: String,
    pub update_version: String,
    pub status: ChannelStatus,
    pub message_ttl_secs: u32,
}

#[derive(Debug, Clone, Default)]
pub struct Endpoints {
    pub https: Option<String>,
    pub wss: Option<String>,
    pub webrtc: Option<String>,
}

/// Pluggable HTTP transport so tests can point at `wiremock` without a real
/// network; production code uses [`ReqwestTransport`].
#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post(&self, req: SignedRequest) -> Result<(u16, BTreeMap<String, String>, Vec<u8>)>;
}

pub struct ReqwestTransport(pub reqwest::Client);

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self(reqwest::Client::new())
    }
}

#[async_trait::async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post(&self, req: SignedRequest) -> Result<(u16, BTreeMap<String, String>, Vec<u8>)> {
        let mut url = format!("https://{}{}", req.host, req.path);
        if !req.query.is_empty() {
            let qs: Vec<_> = req.query.iter().map(|(k, v)| format!("{k}={v}")).collect();
            url.push('?');
            url.push_str(&qs.join("&"));
        }
        let mut builder = self.0.post(url).body(req.body);
        for (k, v) in &req.headers {
            builder = builder.header(k.as_str(), v.as_str());
        }
        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = resp.bytes().await?.to_vec();
        Ok((status, headers, body))
    }
}

/// Implements the six control-plane calls of `spec.md` §4.5.
pub struct RestClient<T: HttpTransport> {
    transport: T,
    config: ClientConfig,
}

impl<T: HttpTransport> RestClient<T> {
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self { transport, config }
    }

    fn build_unsigned(host: &str, path: &str, body: Value) -> UnsignedRequest {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".into(), "application/json".into());
        headers.insert("accept".into(), "application/json".into());
        UnsignedRequest {
            method: "POST",
            host: host.to_string(),
            path: path.to_string(),
            headers,
            query: BTreeMap::new(),
            body: serde_json::to_vec(&body).unwrap_or_default(),
        }
    }

    /// Signs, sends, retries on transient 5xx, and records clock skew from
    /// the `Date` response header.
    async fn call(
        &self,
        channel_info: &ChannelInfo,
        credentials: &AwsCredentials,
        state: State,
        clock_skew: &mut ClockSkewMap,
        now: Ticks100Ns,
        path: &str,
        body: Value,
    ) -> Result<(u16, BTreeMap<String, String>, Vec<u8>)> {
        let host = channel_info
            .control_plane_url
            .trim_start_matches("https://")
            .to_string();
        let max_attempts = self.config.rest_retry_max_attempts.unwrap_or(u32::MAX);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let unsigned = Self::build_unsigned(&host, path, body.clone());
            let signed = sign(
                unsigned,
                credentials,
                &channel_info.region,
                EndpointKind::ControlPlane,
                state,
                clock_skew,
                now,
                SigningMode::Header,
            )?;
            let result = self.transport.post(signed).await;
            match result {
                Ok((status, headers, body_bytes)) => {
                    if let Some(date) = headers.get("date") {
                        if let Ok(server_time) = DateTime::parse_from_rfc2822(date) {
                            let server_now = Ticks100Ns::from_duration_since_epoch(
                                Duration::from_secs(server_time.with_timezone(&Utc).timestamp().max(0) as u64),
                            );
                            clock_skew.record(
                                EndpointKind::ControlPlane,
                                state,
                                now,
                                server_now,
                                self.config.clock_skew_threshold,
                            );
                        }
                    }
                    if (500..600).contains(&status) && attempt < max_attempts {
                        tokio::time::sleep(self.config.rest_retry_base_delay).await;
                        continue;
                    }
                    return Ok((status, headers, body_bytes));
                }
                Err(e) if attempt < max_attempts => {
                    tokio::time::sleep(self.config.rest_retry_base_delay).await;
                    let _ = e;
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn describe_channel(
        &self,
        channel_info: &ChannelInfo,
        credentials: &AwsCredentials,
        clock_skew: &mut ClockSkewMap,
        now: Ticks100Ns,
    ) -> Result<SignalingChannelDescription> {
        let body = if let Some(arn) = &channel_info.channel_arn {
            json!({ "ChannelARN": arn })
        } else {
            json!({ "ChannelName": channel_info.channel_name })
        };
        let (status, _, body_bytes) = self
            .call(
                channel_info,
                credentials,
                State::Describe,
                clock_skew,
                now,
                "/describeSignalingChannel",
                body,
            )
            .await?;
        if status == 404 {
            return Err(SignalingError::NotFound);
        }
        if status >= 400 {
            return Err(SignalingError::InvalidApiReturn(format!(
                "describeSignalingChannel returned HTTP {status}"
            )));
        }
        let value: Value = serde_json::from_slice(&body_bytes)?;
        let info = value
            .get("ChannelInfo")
            .ok_or_else(|| SignalingError::InvalidApiReturn("missing ChannelInfo".into()))?;
        let status_str = info
            .get("ChannelStatus")
            .and_then(Value::as_str)
            .unwrap_or("ACTIVE");
        let status = ChannelStatus::from_str(status_str);
        if status == ChannelStatus::Deleting {
            return Err(SignalingError::ChannelBeingDeleted);
        }
        Ok(SignalingChannelDescription {
            channel_arn: info.get("ChannelARN").and_then(Value::as_str).unwrap_or_default().into(),
            channel_name: info.get("ChannelName").and_then(Value::as_str).unwrap_or_default().into(),
            update_version: info.get("Version").and_then(Value::as_str).unwrap_or_default().into(),
            status,
            message_ttl_secs: info
                .get("SingleMasterConfiguration")
                .and_then(|c| c.get("MessageTtlSeconds"))
                .and_then(Value::as_u64)
                .unwrap_or(5) as u32,
        })
    }

    pub async fn create_channel(
        &self,
        channel_info: &ChannelInfo,
        credentials: &AwsCredentials,
        clock_skew: &mut ClockSkewMap,
        now: Ticks100Ns,
    ) -> Result<String> {
        let tags: Vec<Value> = channel_info
            .tags
            .iter()
            .map(|t| json!({ "Key": t.name, "Value": t.value }))
            .collect();
        let mut body = json!({
            "ChannelName": channel_info.channel_name,
            "ChannelType": "SINGLE_MASTER",
            "SingleMasterConfiguration": { "MessageTtlSeconds": channel_info.message_ttl_secs },
        });
        if !tags.is_empty() {
            body["Tags"] = Value::Array(tags);
        }
        let (status, _, body_bytes) = self
            .call(
                channel_info,
                credentials,
                State::Create,
                clock_skew,
                now,
                "/createSignalingChannel",
                body,
            )
            .await?;
        if status >= 400 {
            return Err(SignalingError::InvalidApiReturn(format!(
                "createSignalingChannel returned HTTP {status}"
            )));
        }
        let value: Value = serde_json::from_slice(&body_bytes)?;
        let arn = value.get("ChannelARN").and_then(Value::as_str).unwrap_or_default();
        if arn.is_empty() {
            return Err(SignalingError::NoArnReturned);
        }
        Ok(arn.to_string())
    }

    pub async fn get_endpoint(
        &self,
        channel_info: &ChannelInfo,
        channel_arn: &str,
        credentials: &AwsCredentials,
        clock_skew: &mut ClockSkewMap,
        now: Ticks100Ns,
    ) -> Result<Endpoints> {
        let role = match channel_info.role {
            ChannelRole::Master => "MASTER",
            ChannelRole::Viewer => "VIEWER",
        };
        let body = json!({
            "ChannelARN": channel_arn,
            "SingleMasterChannelEndpointConfiguration": {
                "Protocols": ["WSS", "HTTPS"],
                "Role": role,
            },
        });
        let (status, _, body_bytes) = self
            .call(
                channel_info,
                credentials,
                State::GetEndpoint,
                clock_skew,
                now,
                "/getSignalingChannelEndpoint",
                body,
            )
            .await?;
        if status >= 400 {
            return Err(SignalingError::InvalidApiReturn(format!(
                "getSignalingChannelEndpoint returned HTTP {status}"
            )));
        }
        let value: Value = serde_json::from_slice(&body_bytes)?;
        let list = value
            .get("ResourceEndpointList")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut endpoints = Endpoints::default();
        for entry in &list {
            let protocol = entry.get("Protocol").and_then(Value::as_str).unwrap_or_default();
            let endpoint = entry.get("ResourceEndpoint").and_then(Value::as_str).unwrap_or_default();
            // Design note resolution (`spec.md` §9): compare against the
            // three distinct schemes, no duplicated branch.
            match protocol {
                "WSS" => endpoints.wss = Some(endpoint.to_string()),
                "HTTPS" => endpoints.https = Some(endpoint.to_string()),
                "WEBRTC" => endpoints.webrtc = Some(endpoint.to_string()),
                _ => {}
            }
        }

        if endpoints.https.is_none() || endpoints.wss.is_none() {
            return Err(SignalingError::MissingEndpoints);
        }
        Ok(endpoints)
    }

    pub async fn get_ice_config(
        &self,
        channel_info: &ChannelInfo,
        channel_arn: &str,
        client_id: &str,
        credentials: &AwsCredentials,
        clock_skew: &mut ClockSkewMap,
        now: Ticks100Ns,
    ) -> Result<Vec<IceConfigInfo>> {
        let body = json!({
            "ChannelARN": channel_arn,
            "ClientId": client_id,
            "Service": "TURN",
        });
        // Transient failures here do not fail the overall state step
        // (`spec.md` §4.5); surface them to the caller so the state
        // machine can decide to continue without fresh ICE config.
        let (status, _, body_bytes) = self
            .call(
                channel_info,
                credentials,
                State::GetIceConfig,
                clock_skew,
                now,
                "/v1/get-ice-server-config",
                body,
            )
            .await?;
        if status >= 400 {
            return Err(SignalingError::InvalidApiReturn(format!(
                "get-ice-server-config returned HTTP {status}"
            )));
        }
        let value: Value = serde_json::from_slice(&body_bytes)?;
        let list = value
            .get("IceServerList")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let configs = list
            .iter()
            .take(5)
            .filter_map(IceServerInfoWire::from_json)
            .filter_map(|w| w.into_ice_config_info(now).ok())
            .collect();
        Ok(configs)
    }

    pub async fn delete_channel(
        &self,
        channel_info: &ChannelInfo,
        channel_arn: &str,
        update_version: &str,
        credentials: &AwsCredentials,
        clock_skew: &mut ClockSkewMap,
        now: Ticks100Ns,
    ) -> Result<()> {
        let body = json!({ "ChannelARN": channel_arn, "CurrentVersion": update_version });
        let (status, _, _) = self
            .call(
                channel_info,
                credentials,
                State::Delete,
                clock_skew,
                now,
                "/deleteSignalingChannel",
                body,
            )
            .await?;
        if status >= 400 {
            return Err(SignalingError::InvalidApiReturn(format!(
                "deleteSignalingChannel returned HTTP {status}"
            )));
        }
        Ok(())
    }

    pub async fn describe_media_storage_conf(
        &self,
        channel_info: &ChannelInfo,
        channel_arn: &str,
        credentials: &AwsCredentials,
        clock_skew: &mut ClockSkewMap,
        now: Ticks100Ns,
    ) -> Result<()> {
        let body = json!({ "ChannelARN": channel_arn });
        let (status, _, _) = self
            .call(
                channel_info,
                credentials,
                State::GetEndpoint,
                clock_skew,
                now,
                "/describeMediaStorageConfiguration",
                body,
            )
            .await?;
        if status >= 400 {
            return Err(SignalingError::InvalidApiReturn(format!(
                "describeMediaStorageConfiguration returned HTTP {status}"
            )));
        }
        Ok(())
    }

    pub async fn join_storage_session(
        &self,
        channel_info: &ChannelInfo,
        channel_arn: &str,
        client_id: Option<&str>,
        credentials: &AwsCredentials,
        clock_skew: &mut ClockSkewMap,
        now: Ticks100Ns,
    ) -> Result<()> {
        let body = match client_id {
            Some(id) => json!({ "channelArn": channel_arn, "clientId": id }),
            None => json!({ "channelArn": channel_arn }),
        };
        let (status, _, _) = self
            .call(
                channel_info,
                credentials,
                State::Connect,
                clock_skew,
                now,
                "/joinStorageSession",
                body,
            )
            .await?;
        if status >= 400 {
            return Err(SignalingError::InvalidApiReturn(format!(
                "joinStorageSession returned HTTP {status}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel_info::{ChannelInfo, RawChannelInfo};
    use crate::collaborators::AwsCredentials;

    fn channel_info() -> ChannelInfo {
        ChannelInfo::validate(RawChannelInfo {
            channel_name: Some("test-channel".into()),
            region: "us-west-2".into(),
            ..Default::default()
        })
        .unwrap()
    }

    fn credentials() -> AwsCredentials {
        AwsCredentials {
            access_key: "AKID".into(),
            secret_key: "secret".into(),
            session_token: None,
            expiration: Ticks100Ns(i64::MAX),
        }
    }

    struct StubTransport {
        status: u16,
        body: Value,
    }

    #[async_trait::async_trait]
    impl HttpTransport for StubTransport {
        async fn post(&self, _req: SignedRequest) -> Result<(u16, BTreeMap<String, String>, Vec<u8>)> {
            Ok((self.status, BTreeMap::new(), serde_json::to_vec(&self.body).unwrap()))
        }
    }

    #[tokio::test]
    async fn describe_channel_fails_when_deleting() {
        let transport = StubTransport {
            status: 200,
            body: json!({ "ChannelInfo": { "ChannelStatus": "DELETING", "ChannelARN": "arn:1", "ChannelName": "c" } }),
        };
        let client = RestClient::new(transport, ClientConfig::default());
        let mut skew = ClockSkewMap::new();
        let err = client
            .describe_channel(&channel_info(), &credentials(), &mut skew, Ticks100Ns(0))
            .await
            .unwrap_err();
        assert!(matches!(err, SignalingError::ChannelBeingDeleted));
    }

    #[tokio::test]
    async fn create_channel_fails_with_no_arn() {
        let transport = StubTransport {
            status: 200,
            body: json!({ "ChannelARN": "" }),
        };
        let client = RestClient::new(transport, ClientConfig::default());
        let mut skew = ClockSkewMap::new();
        let err = client
            .create_channel(&channel_info(), &credentials(), &mut skew, Ticks100Ns(0))
            .await
            .unwrap_err();
        assert!(matches!(err, SignalingError::NoArnReturned));
    }

    #[tokio::test]
    async fn get_endpoint_requires_https_and_wss() {
        let transport = StubTransport {
            status: 200,
            body: json!({ "ResourceEndpointList": [ { "Protocol": "HTTPS", "ResourceEndpoint": "https://e" } ] }),
        };
        let client = RestClient::new(transport, ClientConfig::default());
        let mut skew = ClockSkewMap::new();
        let err = client
            .get_endpoint(&channel_info(), "arn:1", &credentials(), &mut skew, Ticks100Ns(0))
            .await
            .unwrap_err();
        assert!(matches!(err, SignalingError::MissingEndpoints));
    }

    #[tokio::test]
    async fn get_endpoint_maps_three_distinct_protocols() {
        let transport = StubTransport {
            status: 200,
            body: json!({ "ResourceEndpointList": [
                { "Protocol": "HTTPS", "ResourceEndpoint": "https://e" },
                { "Protocol": "WSS", "ResourceEndpoint": "wss://e" },
                { "Protocol": "WEBRTC", "ResourceEndpoint": "webrtc://e" },
            ] }),
        };
        let client = RestClient::new(transport, ClientConfig::default());
        let mut skew = ClockSkewMap::new();
        let endpoints = client
            .get_endpoint(&channel_info(), "arn:1", &credentials(), &mut skew, Ticks100Ns(0))
            .await
            .unwrap();
        assert_eq!(endpoints.https.as_deref(), Some("https://e"));
        assert_eq!(endpoints.wss.as_deref(), Some("wss://e"));
        assert_eq!(endpoints.webrtc.as_deref(), Some("webrtc://e"));
    }

    #[tokio::test]
    async fn get_ice_config_caps_at_five_servers() {
        let servers: Vec<_> = (0..8)
            .map(|i| json!({ "Username": format!("u{i}"), "Password": "p", "Ttl": 3600, "Uris": ["turn:x"] }))
            .collect();
        let transport = StubTransport {
            status: 200,
            body: json!({ "IceServerList": servers }),
        };
        let client = RestClient::new(transport, ClientConfig::default());
        let mut skew = ClockSkewMap::new();
        let configs = client
            .get_ice_config(&channel_info(), "arn:1", "client-1", &credentials(), &mut skew, Ticks100Ns(0))
            .await
            .unwrap();
        assert_eq!(configs.len(), 5);
    }
}
