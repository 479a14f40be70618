//! Signaling and session-control core for a Kinesis-Video-Streams-style
//! WebRTC client.
//!
//! This crate owns the control-plane lifecycle (credential-gated REST calls,
//! a signed WebSocket data connection, and the twelve-state machine driving
//! both) that a WebRTC media stack sits on top of. It does not touch media:
//! no codecs, no `PeerConnection`, no SDP semantics beyond treating offers
//! and answers as opaque payloads.

#![forbid(unsafe_code)]

pub mod cache;
pub mod channel_info;
pub mod clock_skew;
pub mod collaborators;
pub mod config;
pub mod data_buffer;
pub mod error;
pub mod facade;
pub mod ice;
pub mod logging;
pub mod message;
pub mod metrics;
pub mod pending_queue;
pub mod rest_client;
pub mod session_router;
pub mod signing;
pub mod state_machine;
pub mod wss_client;

pub use cache::{CachedEndpointState, EndpointCacheStore, NullEndpointCacheStore};
pub use channel_info::{ChannelInfo, ChannelRole, ChannelType, RawChannelInfo, Tag};
pub use clock_skew::{ClockSkewMap, EndpointKind, Ticks100Ns};
pub use collaborators::{AwsCredentials, ClockSource, CredentialsProvider, StaticCredentialsProvider, SystemClock};
pub use config::ClientConfig;
pub use error::{Result, SignalingError};
pub use facade::{SignalingCallbacks, SignalingClient};
pub use ice::{IceConfigInfo, IceConfigSet, IceServerInfoWire};
pub use message::{MessageType, ReceivedSignalingMessage, SignalingMessage};
pub use metrics::{CallClass, MetricsSnapshot, SignalingMetrics};
pub use state_machine::State;
