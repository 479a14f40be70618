//! Error kinds shared by every component of the signaling core.
//!
//! Mirrors the flat error enum style used by
//! `medea-coturn-telnet-client::CoturnTelnetError`: one enum, `From` impls
//! for the handful of underlying error types we actually wrap, and a
//! hand-written `Display` so messages stay meaningful on an embedded
//! console.

use std::fmt;

/// Every public operation in this crate returns one of these instead of
/// panicking or throwing.
#[derive(Debug)]
pub enum SignalingError {
    /// A caller-supplied argument failed validation (`ChannelInfo`, tag
    /// limits, message sizes, ...).
    InvalidArg(String),

    /// A required argument was not provided.
    NullArg(&'static str),

    /// Allocation/growth past a hard cap (e.g. the 20 KiB reassembly
    /// buffer).
    NotEnoughMemory,

    /// An operation that requires an open WSS connection was attempted
    /// while disconnected.
    NotConnected,

    /// The WSS transport reported a failed or incomplete send.
    SendFailed(String),

    /// Credentials were present but have expired as of signing time.
    CredentialExpired,

    /// No credentials were available from the [`CredentialsProvider`].
    ///
    /// [`CredentialsProvider`]: crate::collaborators::CredentialsProvider
    NoCredentials,

    /// `DescribeChannel` returned a channel whose status is `DELETING`.
    ChannelBeingDeleted,

    /// `CreateChannel` succeeded but returned no ARN.
    NoArnReturned,

    /// `GetEndpoint` did not return both an HTTPS and a WSS endpoint.
    MissingEndpoints,

    /// More ICE server configs were returned than `MAX_ICE_CONFIG_COUNT`.
    MaxIceConfig,

    /// More URIs were present in an ICE server config than allowed.
    MaxIceUri,

    /// A REST or WSS response could not be parsed into the expected shape.
    InvalidApiReturn(String),

    /// A blocking wait exceeded its deadline.
    OperationTimedOut,

    /// The underlying WSS/TLS library reported a failure.
    TransportFailed(String),

    /// The WSS connection dropped and automatic reconnect should be
    /// attempted by the state machine.
    ReconnectFailed,

    /// The server sent a `GO_AWAY`; the current WSS must be replaced.
    GoAway,

    /// The server sent `RECONNECT_ICE_SERVER`; ICE config must be
    /// refreshed.
    ReconnectIce,

    /// A peer-facing operation was invalid given current session state
    /// (duplicate offer, answer with no pending session, session cap
    /// reached, ...).
    InvalidOperation(String),

    /// The requested session or resource does not exist.
    NotFound,

    /// The client (or one of its peers) has already reached a terminal
    /// `DELETED` state.
    Deleted,

    /// Catch-all for invariant violations that should never happen in
    /// correct code.
    InternalError(String),
}

impl fmt::Display for SignalingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArg(msg) => write!(f, "invalid argument: {msg}"),
            Self::NullArg(name) => write!(f, "missing required argument: {name}"),
            Self::NotEnoughMemory => write!(f, "buffer growth exceeded its cap"),
            Self::NotConnected => write!(f, "operation requires an open connection"),
            Self::SendFailed(msg) => write!(f, "send failed: {msg}"),
            Self::CredentialExpired => write!(f, "credentials expired"),
            Self::NoCredentials => write!(f, "no credentials available"),
            Self::ChannelBeingDeleted => write!(f, "channel is being deleted"),
            Self::NoArnReturned => write!(f, "CreateChannel returned no ARN"),
            Self::MissingEndpoints => write!(f, "GetEndpoint did not return HTTPS and WSS endpoints"),
            Self::MaxIceConfig => write!(f, "ICE config count exceeds the maximum"),
            Self::MaxIceUri => write!(f, "ICE server URI count exceeds the maximum"),
            Self::InvalidApiReturn(msg) => write!(f, "invalid API response: {msg}"),
            Self::OperationTimedOut => write!(f, "operation timed out"),
            Self::TransportFailed(msg) => write!(f, "transport failure: {msg}"),
            Self::ReconnectFailed => write!(f, "connection lost, reconnect required"),
            Self::GoAway => write!(f, "server requested GO_AWAY"),
            Self::ReconnectIce => write!(f, "server requested ICE server reconnect"),
            Self::InvalidOperation(msg) => write!(f, "invalid operation: {msg}"),
            Self::NotFound => write!(f, "not found"),
            Self::Deleted => write!(f, "client already deleted"),
            Self::InternalError(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for SignalingError {}

impl From<reqwest::Error> for SignalingError {
    fn from(e: reqwest::Error) -> Self {
        Self::TransportFailed(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SignalingError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::TransportFailed(e.to_string())
    }
}

impl From<serde_json::Error> for SignalingError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidApiReturn(e.to_string())
    }
}

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, SignalingError>;
