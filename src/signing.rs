//! Signing & Request (§4.2, component C2): AWS SigV4 header- and
//! query-parameter-based signing.
//!
//! No crate in the reference corpus implements SigV4, so this is hand
//! rolled on top of `hmac` + `sha2` + `hex`, all real crates already present
//! elsewhere in the retrieval pack (`examples/other_examples/manifests/*`).
//! The *shape* of the contract — a fallible pure function from an unsigned
//! request to a signed one — follows
//! `medea-coturn-telnet-client::CoturnTelnetConnection`'s single
//! responsibility, `Result`-returning step functions.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::clock_skew::{ClockSkewMap, EndpointKind, Ticks100Ns};
use crate::collaborators::AwsCredentials;
use crate::error::{Result, SignalingError};
use crate::state_machine::State;

type HmacSha256 = Hmac<Sha256>;

const SERVICE: &str = "kinesisvideo";
const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// An HTTP method plus enough of a request to sign: host, path, query
/// parameters, headers, and body.
#[derive(Debug, Clone)]
pub struct UnsignedRequest {
    pub method: &'static str,
    pub host: String,
    pub path: String,
    /// Pre-prune headers; `user-agent` is stripped before signing per
    /// `spec.md` §4.2.
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub method: &'static str,
    pub host: String,
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

/// Which part of the request carries the signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningMode {
    /// `Authorization` header, used for REST/JSON POSTs.
    Header,
    /// `X-Amz-*` query parameters, used for the WSS upgrade URL.
    Query,
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn signing_key(secret: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date_stamp.as_bytes());
    let k_region = hmac(&k_date, region.as_bytes());
    let k_service = hmac(&k_region, service.as_bytes());
    hmac(&k_service, b"aws4_request")
}

/// Signs `req` with SigV4, applying the clock-skew correction recorded for
/// `(endpoint, state)` before computing the timestamp.
///
/// # Errors
///
/// [`SignalingError::NoCredentials`] is never returned here (credentials are
/// supplied by the caller); [`SignalingError::CredentialExpired`] is
/// returned if `credentials.expiration` is at or before the corrected time.
pub fn sign(
    mut req: UnsignedRequest,
    credentials: &AwsCredentials,
    region: &str,
    endpoint: EndpointKind,
    state: State,
    clock_skew: &ClockSkewMap,
    now: Ticks100Ns,
    mode: SigningMode,
) -> Result<SignedRequest> {
    let corrected_now = clock_skew.corrected_now(endpoint, state, now);
    if credentials.is_expired(corrected_now) {
        return Err(SignalingError::CredentialExpired);
    }

    req.headers.remove("user-agent");
    req.headers.remove("Authorization");
    req.headers.insert("host".into(), req.host.clone());

    let dt: DateTime<Utc> = DateTime::from_timestamp(
        (corrected_now.0 / 10_000_000).max(0),
        0,
    )
    .unwrap_or_else(Utc::now);
    let amz_date = dt.format("%Y%m%dT%H%M%SZ").to_string();
    let date_stamp = dt.format("%Y%m%d").to_string();
    let credential_scope = format!("{date_stamp}/{region}/{SERVICE}/aws4_request");

    match mode {
        SigningMode::Header => {
            req.headers.insert("x-amz-date".into(), amz_date.clone());
            if let Some(token) = &credentials.session_token {
                req.headers.insert("x-amz-security-token".into(), token.clone());
            }

            let signed_headers: Vec<_> = req.headers.keys().map(String::as_str).collect();
            let signed_headers_joined = signed_headers.join(";");
            let canonical_headers: String = req
                .headers
                .iter()
                .map(|(k, v)| format!("{k}:{v}\n"))
                .collect();

            let canonical_query = canonical_query_string(&req.query);
            let payload_hash = sha256_hex(&req.body);
            let canonical_request = format!(
                "{}\n{}\n{}\n{}\n{}\n{}",
                req.method, req.path, canonical_query, canonical_headers, signed_headers_joined, payload_hash
            );
            let string_to_sign = format!(
                "{ALGORITHM}\n{amz_date}\n{credential_scope}\n{}",
                sha256_hex(canonical_request.as_bytes())
            );
            let key = signing_key(&credentials.secret_key, &date_stamp, region, SERVICE);
            let signature = hex::encode(hmac(&key, string_to_sign.as_bytes()));

            let authorization = format!(
                "{ALGORITHM} Credential={}/{credential_scope}, SignedHeaders={signed_headers_joined}, Signature={signature}",
                credentials.access_key
            );
            req.headers.insert("authorization".into(), authorization);
        }
        SigningMode::Query => {
            req.query.insert("X-Amz-Algorithm".into(), ALGORITHM.into());
            req.query.insert(
                "X-Amz-Credential".into(),
                format!("{}/{credential_scope}", credentials.access_key),
            );
            req.query.insert("X-Amz-Date".into(), amz_date);
            req.query.insert("X-Amz-Expires".into(), "299".into());
            let signed_headers = "host";
            req.query
                .insert("X-Amz-SignedHeaders".into(), signed_headers.into());
            if let Some(token) = &credentials.session_token {
                req.query
                    .insert("X-Amz-Security-Token".into(), token.clone());
            }

            let canonical_query = canonical_query_string(&req.query);
            let canonical_headers = format!("host:{}\n", req.host);
            let payload_hash = sha256_hex(b"");
            let canonical_request = format!(
                "{}\n{}\n{}\n{}\n{}\n{}",
                req.method, req.path, canonical_query, canonical_headers, signed_headers, payload_hash
            );
            let amz_date_for_sts = req.query["X-Amz-Date"].clone();
            let string_to_sign = format!(
                "{ALGORITHM}\n{amz_date_for_sts}\n{credential_scope}\n{}",
                sha256_hex(canonical_request.as_bytes())
            );
            let key = signing_key(&credentials.secret_key, &date_stamp, region, SERVICE);
            let signature = hex::encode(hmac(&key, string_to_sign.as_bytes()));
            req.query.insert("X-Amz-Signature".into(), signature);
        }
    }

    Ok(SignedRequest {
        method: req.method,
        host: req.host,
        path: req.path,
        headers: req.headers,
        query: req.query,
        body: req.body,
    })
}

fn canonical_query_string(query: &BTreeMap<String, String>) -> String {
    query
        .iter()
        .map(|(k, v)| format!("{}={}", uri_encode(k), uri_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn uri_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
