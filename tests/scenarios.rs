//! End-to-end scenarios spanning multiple components, grounded on the
//! behaviors enumerated in `spec.md` §8. Placed at the crate root `tests/`
//! directory the way `examples/instrumentisto-medea/tests/signalling.rs`
//! places its own cross-component scenarios.

use kvs_signaling_core::{
    message, AwsCredentials, ChannelRole, ClockSkewMap, EndpointKind, MessageType, SignalingError,
    State, Ticks100Ns,
};
use kvs_signaling_core::config::ClientConfig;
use kvs_signaling_core::ice::{IceConfigInfo, IceConfigSet};
use kvs_signaling_core::session_router::{RouteOutcome, SessionRouter};
use kvs_signaling_core::signing::{sign, SigningMode, UnsignedRequest};
use kvs_signaling_core::state_machine::{ice_refresh_deadline, next_state, StepResult, TransitionPolicy};
use std::collections::BTreeMap;
use std::time::Duration;

fn base64_payload(s: &str) -> String {
    use base64::Engine as _;
    base64::engine::general_purpose::STANDARD.encode(s)
}

fn creds(expiration: Ticks100Ns) -> AwsCredentials {
    AwsCredentials {
        access_key: "AKIDEXAMPLE".into(),
        secret_key: "wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY".into(),
        session_token: None,
        expiration,
    }
}

/// Scenario: a viewer's ICE_CANDIDATE for a peer arrives before that peer's
/// OFFER. It should be queued, then delivered to the new session the moment
/// the offer is routed (`spec.md` §4.7, §8).
#[test]
fn candidate_before_offer_is_queued_then_delivered() {
    let candidate_frame = format!(
        r#"{{"messageType":"ICE_CANDIDATE","senderClientId":"peerA","messagePayload":"{}"}}"#,
        base64_payload("candidate-blob")
    );
    let offer_frame = format!(
        r#"{{"messageType":"SDP_OFFER","senderClientId":"peerA","messagePayload":"{}"}}"#,
        base64_payload("offer-sdp")
    );

    let parsed_candidate = message::parse(candidate_frame.as_bytes()).unwrap();
    let parsed_offer = message::parse(offer_frame.as_bytes()).unwrap();

    let mut router = SessionRouter::new(ChannelRole::Master, 3);
    let queued = router.route(parsed_candidate, Ticks100Ns(0)).unwrap();
    assert_eq!(queued, RouteOutcome::Queued { peer_id: "peerA".into() });

    let routed = router.route(parsed_offer, Ticks100Ns(0)).unwrap();
    match routed {
        RouteOutcome::NewSession {
            peer_id,
            payload,
            drained_candidates,
        } => {
            assert_eq!(peer_id, "peerA");
            assert_eq!(payload, b"offer-sdp");
            assert_eq!(drained_candidates, vec![b"candidate-blob".to_vec()]);
        }
        other => panic!("expected NewSession, got {other:?}"),
    }
}

/// Scenario: the control-plane clock is 5 minutes ahead of the device
/// (`spec.md` §8). The recorded skew must correct the timestamp used to sign
/// subsequent requests to that `(endpoint, state)` pair.
#[test]
fn clock_skew_beyond_threshold_corrects_signed_requests() {
    let device_now = Ticks100Ns::from_duration_since_epoch(Duration::from_secs(1_700_000_000));
    let server_now = device_now + (5 * 60 * 10_000_000);

    let mut skew = ClockSkewMap::new();
    skew.record(
        EndpointKind::ControlPlane,
        State::Describe,
        device_now,
        server_now,
        Duration::from_secs(180),
    );

    let req = UnsignedRequest {
        method: "POST",
        host: "kinesisvideo.us-west-2.amazonaws.com".into(),
        path: "/describeSignalingChannel".into(),
        headers: BTreeMap::new(),
        query: BTreeMap::new(),
        body: b"{}".to_vec(),
    };
    let signed = sign(
        req,
        &creds(Ticks100Ns(i64::MAX)),
        "us-west-2",
        EndpointKind::ControlPlane,
        State::Describe,
        &skew,
        device_now,
        SigningMode::Header,
    )
    .unwrap();

    let corrected = skew.corrected_now(EndpointKind::ControlPlane, State::Describe, device_now);
    assert_eq!(corrected, server_now);
    // The signed request's x-amz-date must reflect the corrected (server)
    // time, not the device's unadjusted clock.
    let expected_date = chrono::DateTime::from_timestamp(server_now.0 / 10_000_000, 0)
        .unwrap()
        .format("%Y%m%dT%H%M%SZ")
        .to_string();
    assert_eq!(signed.headers["x-amz-date"], expected_date);
}

/// Scenario: the server sends `GO_AWAY` mid-session (`spec.md` §8). The
/// router must classify it, and the state machine must loop `CONNECTED`
/// back through `CONNECT` rather than tearing the client down.
#[test]
fn go_away_mid_session_triggers_reconnect_transition() {
    let frame = br#"{"messageType":"GO_AWAY"}"#;
    let parsed = message::parse(frame).unwrap();
    assert_eq!(parsed.message_type, MessageType::GoAway);

    let mut router = SessionRouter::new(ChannelRole::Viewer, 3);
    let outcome = router.route(parsed, Ticks100Ns(0)).unwrap();
    assert_eq!(outcome, RouteOutcome::GoAway);

    let policy = TransitionPolicy {
        continue_on_ready: true,
        reconnect: true,
        delete_requested: false,
    };
    let next = next_state(State::Connected, StepResult::GoAway, policy);
    assert_eq!(next, Some(State::Connect));
}

/// Scenario: ICE config TTLs are about to expire (`spec.md` §8, §9). The
/// refresh timer must fire `ice_refresh_grace` before the earliest expiry
/// across all held configs.
#[test]
fn ice_refresh_timer_schedules_before_earliest_ttl_expiry() {
    let config = ClientConfig::default();
    let retrieved_at = Ticks100Ns(0);

    let mut set = IceConfigSet::new();
    set.replace(vec![
        IceConfigInfo::new(
            "u1".into(),
            "p".into(),
            Ticks100Ns(3600 * 10_000_000), // 1 hour TTL
            vec!["turn:a".into()],
            retrieved_at,
        )
        .unwrap(),
        IceConfigInfo::new(
            "u2".into(),
            "p".into(),
            Ticks100Ns(60 * 10_000_000), // 1 minute TTL, earliest to expire
            vec!["turn:b".into()],
            retrieved_at,
        )
        .unwrap(),
    ]);

    let earliest_expiry = retrieved_at + (60 * 10_000_000);
    let expected_deadline = ice_refresh_deadline(earliest_expiry, config.ice_refresh_grace);

    let earliest_refresh = set.earliest_refresh_at(config.ice_refresh_grace).unwrap();
    assert_eq!(earliest_refresh, expected_deadline);
    assert!(earliest_refresh < earliest_expiry);
}

/// Scenario: the concurrent-session ceiling is reached while a pending
/// queue already holds a candidate for the rejected peer (`spec.md` §4.7,
/// §8). The offer must be rejected and the stale pending queue dropped, not
/// left to expire naturally.
#[test]
fn concurrent_session_cap_drops_pending_queue_for_rejected_peer() {
    let mut router = SessionRouter::new(ChannelRole::Master, 1);

    let first_offer = message::parse(
        format!(
            r#"{{"messageType":"SDP_OFFER","senderClientId":"peerA","messagePayload":"{}"}}"#,
            base64_payload("a")
        )
        .as_bytes(),
    )
    .unwrap();
    router.route(first_offer, Ticks100Ns(0)).unwrap();

    let second_candidate = message::parse(
        format!(
            r#"{{"messageType":"ICE_CANDIDATE","senderClientId":"peerB","messagePayload":"{}"}}"#,
            base64_payload("b")
        )
        .as_bytes(),
    )
    .unwrap();
    router.route(second_candidate, Ticks100Ns(0)).unwrap();

    let second_offer = message::parse(
        format!(
            r#"{{"messageType":"SDP_OFFER","senderClientId":"peerB","messagePayload":"{}"}}"#,
            base64_payload("c")
        )
        .as_bytes(),
    )
    .unwrap();
    let err = router.route(second_offer, Ticks100Ns(0)).unwrap_err();
    assert!(matches!(err, SignalingError::InvalidOperation(_)));
    assert!(router.pending_queues_mut().is_empty());
}
