//! Message Parser (§4.4, component C4) and the outbound/inbound wire
//! shapes of §6.
//!
//! Grounded on `examples/instrumentisto-medea/proto/client-api/src/lib.rs`:
//! that file declares `ServerMsg`/`ClientMsg`/`Command`/`Event` as plain
//! enums serialized with `#[serde(tag = ..., content = ...)]`, the same
//! "one Rust enum per wire message family" idiom this module follows for
//! `MessageType` and the inbound/outbound message structs. Unlike the
//! teacher's strict enum, the spec's inbound JSON is tolerant (message type
//! may arrive under either of two keys, an `UNKNOWN` type falls back to a
//! substring scan), so parsing here is done by hand against a
//! `serde_json::Value` rather than via `#[derive(Deserialize)]` directly on
//! the enum.

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::MAX_ICE_CONFIG_COUNT;
use crate::error::{Result, SignalingError};
use crate::ice::IceServerInfoWire;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    Offer,
    Answer,
    IceCandidate,
    GoAway,
    ReconnectIceServer,
    StatusResponse,
    Unknown,
}

impl MessageType {
    fn wire_str(self) -> &'static str {
        match self {
            Self::Offer => "SDP_OFFER",
            Self::Answer => "SDP_ANSWER",
            Self::IceCandidate => "ICE_CANDIDATE",
            Self::GoAway => "GO_AWAY",
            Self::ReconnectIceServer => "RECONNECT_ICE_SERVER",
            Self::StatusResponse => "STATUS_RESPONSE",
            Self::Unknown => "UNKNOWN",
        }
    }

    fn from_wire_str(s: &str) -> Self {
        match s {
            "SDP_OFFER" | "OFFER" => Self::Offer,
            "SDP_ANSWER" | "ANSWER" => Self::Answer,
            "ICE_CANDIDATE" => Self::IceCandidate,
            "GO_AWAY" => Self::GoAway,
            "RECONNECT_ICE_SERVER" => Self::ReconnectIceServer,
            "STATUS_RESPONSE" => Self::StatusResponse,
            _ => Self::Unknown,
        }
    }
}

/// Outbound message a caller hands to the façade (`spec.md` §3, §6).
#[derive(Debug, Clone)]
pub struct SignalingMessage {
    pub version: u32,
    pub message_type: MessageType,
    pub recipient_peer_id: String,
    pub payload: Vec<u8>,
    pub correlation_id: Option<String>,
}

impl SignalingMessage {
    /// Serializes to the wire JSON shape documented in `spec.md` §6.
    pub fn to_wire_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        obj.insert(
            "action".into(),
            Value::String(self.message_type.wire_str().to_string()),
        );
        obj.insert(
            "RecipientClientId".into(),
            Value::String(self.recipient_peer_id.clone()),
        );
        obj.insert(
            "MessagePayload".into(),
            Value::String(base64::engine::general_purpose::STANDARD.encode(&self.payload)),
        );
        if let Some(cid) = &self.correlation_id {
            obj.insert("CorrelationId".into(), Value::String(cid.clone()));
        }
        Value::Object(obj)
    }
}

/// A message accepted from the wire, plus its sender/status envelope
/// (`spec.md` §3).
#[derive(Debug, Clone)]
pub struct ReceivedSignalingMessage {
    pub version: u32,
    pub message_type: MessageType,
    pub sender_peer_id: Option<String>,
    pub payload: Vec<u8>,
    pub correlation_id: Option<String>,
    pub status_code: Option<String>,
    pub error_type: Option<String>,
    pub description: Option<String>,
    /// Present only on `OFFER` frames (`spec.md` §4.4); replaces the
    /// client's current ICE config when non-empty.
    pub ice_server_list: Option<Vec<IceServerInfoWire>>,
}

fn str_field<'a>(obj: &'a serde_json::Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

/// Parses one complete, NUL-terminated-or-not JSON frame produced by
/// [`crate::data_buffer::DataBuffer`] into a [`ReceivedSignalingMessage`].
///
/// # Errors
///
/// [`SignalingError::InvalidApiReturn`] on malformed JSON or a
/// `messagePayload` that fails base64 decoding.
pub fn parse(frame: &[u8]) -> Result<ReceivedSignalingMessage> {
    let trimmed = match frame.iter().position(|&b| b == 0) {
        Some(idx) => &frame[..idx],
        None => frame,
    };
    let value: Value = serde_json::from_slice(trimmed)?;
    let obj = value
        .as_object()
        .ok_or_else(|| SignalingError::InvalidApiReturn("frame is not a JSON object".into()))?;

    let type_str = str_field(obj, "messageType")
        .or_else(|| str_field(obj, "action"))
        .unwrap_or("UNKNOWN");
    let mut message_type = MessageType::from_wire_str(type_str);

    let payload = match str_field(obj, "messagePayload").or_else(|| str_field(obj, "MessagePayload")) {
        Some(b64) => base64::engine::general_purpose::STANDARD
            .decode(b64)
            .map_err(|e| SignalingError::InvalidApiReturn(format!("bad base64 payload: {e}")))?,
        None => Vec::new(),
    };

    if message_type == MessageType::Unknown {
        message_type = fallback_scan(&payload, obj);
    }

    let sender_peer_id = str_field(obj, "senderClientId").map(str::to_string);

    let (correlation_id, error_type, status_code, description) =
        if let Some(status) = obj.get("statusResponse").and_then(Value::as_object) {
            (
                str_field(status, "correlationId").map(str::to_string),
                str_field(status, "errorType").map(str::to_string),
                str_field(status, "statusCode").map(str::to_string),
                str_field(status, "description").map(str::to_string),
            )
        } else {
            (
                str_field(obj, "CorrelationId").map(str::to_string),
                None,
                None,
                None,
            )
        };

    let ice_server_list = if message_type == MessageType::Offer {
        obj.get("IceServerList")
            .or_else(|| obj.get("iceServerList"))
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .take(MAX_ICE_CONFIG_COUNT)
                    .filter_map(IceServerInfoWire::from_json)
                    .collect()
            })
    } else {
        None
    };

    Ok(ReceivedSignalingMessage {
        version: 1,
        message_type,
        sender_peer_id,
        payload,
        correlation_id,
        status_code,
        error_type,
        description,
        ice_server_list,
    })
}

/// Textual fallback for frames whose explicit type is `UNKNOWN`
/// (`spec.md` §4.4): scan the payload for candidate/offer/answer
/// substrings, and the whole frame for `RECONNECT_ICE_SERVER`.
fn fallback_scan(payload: &[u8], whole_frame: &serde_json::Map<String, Value>) -> MessageType {
    let whole = serde_json::to_string(&Value::Object(whole_frame.clone())).unwrap_or_default();
    if whole.contains("RECONNECT_ICE_SERVER") {
        return MessageType::ReconnectIceServer;
    }
    let text = String::from_utf8_lossy(payload);
    if text.contains("candidate") {
        MessageType::IceCandidate
    } else if text.contains("offer") {
        MessageType::Offer
    } else if text.contains("answer") {
        MessageType::Answer
    } else {
        MessageType::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b64(s: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(s)
    }

    #[test]
    fn parses_offer_with_sender_and_payload() {
        let frame = format!(
            r#"{{"messageType":"SDP_OFFER","senderClientId":"peerA","messagePayload":"{}"}}"#,
            b64("v=0...")
        );
        let msg = parse(frame.as_bytes()).unwrap();
        assert_eq!(msg.message_type, MessageType::Offer);
        assert_eq!(msg.sender_peer_id.as_deref(), Some("peerA"));
        assert_eq!(msg.payload, b"v=0...");
    }

    #[test]
    fn action_field_is_equivalent_to_message_type() {
        let frame = format!(r#"{{"action":"ICE_CANDIDATE","messagePayload":"{}"}}"#, b64("x"));
        let msg = parse(frame.as_bytes()).unwrap();
        assert_eq!(msg.message_type, MessageType::IceCandidate);
    }

    #[test]
    fn status_response_envelope_is_extracted() {
        let frame = r#"{"messageType":"STATUS_RESPONSE","statusResponse":{"correlationId":"c1","errorType":"E","statusCode":"400","description":"bad"}}"#;
        let msg = parse(frame.as_bytes()).unwrap();
        assert_eq!(msg.correlation_id.as_deref(), Some("c1"));
        assert_eq!(msg.error_type.as_deref(), Some("E"));
        assert_eq!(msg.status_code.as_deref(), Some("400"));
        assert_eq!(msg.description.as_deref(), Some("bad"));
    }

    #[test]
    fn unknown_type_falls_back_to_substring_scan() {
        let frame = format!(
            r#"{{"messageType":"UNKNOWN","messagePayload":"{}"}}"#,
            b64("this payload has a candidate in it")
        );
        let msg = parse(frame.as_bytes()).unwrap();
        assert_eq!(msg.message_type, MessageType::IceCandidate);
    }

    #[test]
    fn reconnect_ice_server_detected_anywhere_in_frame() {
        let frame = r#"{"messageType":"UNKNOWN","note":"RECONNECT_ICE_SERVER"}"#;
        let msg = parse(frame.as_bytes()).unwrap();
        assert_eq!(msg.message_type, MessageType::ReconnectIceServer);
    }

    #[test]
    fn ice_server_list_only_honored_on_offer() {
        let frame = r#"{"messageType":"ICE_CANDIDATE","IceServerList":[{"Username":"u","Password":"p","Ttl":3600,"Uris":["turn:x"]}]}"#;
        let msg = parse(frame.as_bytes()).unwrap();
        assert!(msg.ice_server_list.is_none());
    }

    #[test]
    fn ice_server_list_capped_at_max() {
        let servers: Vec<_> = (0..MAX_ICE_CONFIG_COUNT + 3)
            .map(|i| format!(r#"{{"Username":"u{i}","Password":"p","Ttl":3600,"Uris":["turn:x"]}}"#))
            .collect();
        let frame = format!(
            r#"{{"messageType":"SDP_OFFER","IceServerList":[{}]}}"#,
            servers.join(",")
        );
        let msg = parse(frame.as_bytes()).unwrap();
        assert_eq!(msg.ice_server_list.unwrap().len(), MAX_ICE_CONFIG_COUNT);
    }

    #[test]
    fn malformed_json_is_invalid_api_return() {
        let err = parse(b"not json").unwrap_err();
        assert!(matches!(err, SignalingError::InvalidApiReturn(_)));
    }
}
