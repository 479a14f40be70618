//! State Machine (§4.9, component C9): the twelve-state connection
//! lifecycle, its transition table, and retry/backoff around each step.
//!
//! The backoff shaping (50ms base, doubling, capped at 16s) is grounded on
//! `examples/instrumentisto-medea/jason/src/rpc/backoff_delayer.rs`'s
//! `BackoffDelayer`, which wraps `backoff::ExponentialBackoff` the same way;
//! this module keeps that wrapping idea but drives the sleep with
//! `tokio::time::sleep` directly instead of `backoff::future::Retry`, since
//! a state-machine step is not a single retryable future but a sequence of
//! distinct side effects (REST call, then transition) that the worker loop
//! in `facade.rs` drives step by step.

use std::time::Duration;

use backoff::{backoff::Backoff, ExponentialBackoff};

use crate::clock_skew::Ticks100Ns;
use crate::error::SignalingError;

/// The twelve lifecycle states fixed by `spec.md` §4.9. Kept as a plain,
/// `Copy` enum (no reactive cell) since the machine is driven by one owning
/// worker task rather than observed by many.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    New,
    GetToken,
    Describe,
    Create,
    GetEndpoint,
    GetIceConfig,
    Ready,
    Connect,
    Connected,
    Disconnected,
    Delete,
    Deleted,
}

impl State {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Deleted)
    }
}

/// Outcome of a single state-machine step, returned by the code that
/// executes a state's action (REST call, WSS connect, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    Ok,
    NotAuthorized,
    ChannelNotFound,
    ChannelBeingDeleted,
    TransientFailure,
    GoAway,
    ReconnectIceServer,
    TransportDropped,
}

/// Caller intent that influences a transition choice (`spec.md` §4.9):
/// whether a connect should immediately follow reaching `READY`, and
/// whether a disconnect should loop back to `GET_TOKEN` or go terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionPolicy {
    pub continue_on_ready: bool,
    pub reconnect: bool,
    /// Set by the caller's `delete()` while in `DESCRIBE`, handled as a
    /// fallback from that state (`spec.md` §4.9 transition table).
    pub delete_requested: bool,
}

/// Computes the next state given the current one, the result of executing
/// its action, and the caller's policy. Returns `None` when `current` is
/// already terminal, or when `result` names a condition this state never
/// produces (a worker bug, not a reachable runtime case).
#[must_use]
pub fn next_state(current: State, result: StepResult, policy: TransitionPolicy) -> Option<State> {
    if result == StepResult::NotAuthorized {
        return Some(State::GetToken);
    }
    match (current, result) {
        (State::New, StepResult::Ok) => Some(State::GetToken),
        (State::GetToken, StepResult::Ok) => Some(State::Describe),
        (State::Describe, StepResult::Ok) => Some(State::GetEndpoint),
        (State::Describe, StepResult::ChannelNotFound) => Some(State::Create),
        (State::Describe, StepResult::ChannelBeingDeleted) if policy.delete_requested => {
            Some(State::Delete)
        }
        (State::Describe, StepResult::TransientFailure) => Some(State::Describe),
        (State::Create, StepResult::Ok) => Some(State::Describe),
        (State::Create, StepResult::TransientFailure) => Some(State::Create),
        (State::GetEndpoint, StepResult::Ok) => Some(State::GetIceConfig),
        (State::GetEndpoint, StepResult::TransientFailure) => Some(State::GetEndpoint),
        (State::GetIceConfig, StepResult::Ok) => Some(State::Ready),
        (State::GetIceConfig, StepResult::TransientFailure) => Some(State::GetIceConfig),
        (State::Ready, StepResult::Ok) if policy.continue_on_ready => Some(State::Connect),
        (State::Ready, StepResult::Ok) => Some(State::Ready),
        (State::Connect, StepResult::Ok) => Some(State::Connected),
        (State::Connect, StepResult::TransientFailure) => Some(State::Connect),
        (State::Connected, StepResult::Ok) => Some(State::Connected),
        (State::Connected, StepResult::TransportDropped) => Some(State::Disconnected),
        (State::Connected, StepResult::ReconnectIceServer) => Some(State::GetIceConfig),
        (State::Connected, StepResult::GoAway) => Some(State::Connect),
        (State::Disconnected, _) if policy.reconnect => Some(State::GetToken),
        (State::Disconnected, _) => None,
        (State::Delete, StepResult::Ok) => Some(State::Deleted),
        (State::Delete, StepResult::TransientFailure) => Some(State::Delete),
        (State::Deleted, _) => None,
        _ => None,
    }
}

/// Whether a step's failing `result` should be retried in place (per
/// `spec.md` §4.9's retry policy) rather than treated as a transition.
#[must_use]
pub fn is_retryable(result: StepResult) -> bool {
    matches!(result, StepResult::TransientFailure)
}

/// Per-step exponential backoff: 50ms base, doubling, capped at 16s.
/// Grounded on `BackoffDelayer::new` in
/// `examples/instrumentisto-medea/jason/src/rpc/backoff_delayer.rs`.
pub struct StepBackoff {
    inner: ExponentialBackoff,
    attempts: u32,
    max_attempts: Option<u32>,
}

impl StepBackoff {
    #[must_use]
    pub fn new(base_delay: Duration, max_delay: Duration, max_attempts: Option<u32>) -> Self {
        let inner = ExponentialBackoff {
            current_interval: base_delay,
            initial_interval: base_delay,
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_interval: max_delay,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        };
        Self {
            inner,
            attempts: 0,
            max_attempts,
        }
    }

    /// Returns the delay before the next attempt, or an error if the
    /// configured attempt ceiling (0 means retry forever, per
    /// `INFINITE_RETRY_COUNT_SENTINEL`) has been reached.
    pub fn next_delay(&mut self) -> Result<Duration, SignalingError> {
        if let Some(max) = self.max_attempts {
            if max != crate::config::INFINITE_RETRY_COUNT_SENTINEL && self.attempts >= max {
                return Err(SignalingError::OperationTimedOut);
            }
        }
        self.attempts += 1;
        Ok(self.inner.next_backoff().unwrap_or(self.inner.max_interval))
    }

    pub fn reset(&mut self) {
        self.inner.reset();
        self.attempts = 0;
    }
}

/// When entering `READY`, the next `GET_ICE_CONFIG` refresh is scheduled
/// `ice_refresh_grace` before the earliest held ICE config's TTL expiry
/// (`spec.md` §4.9).
#[must_use]
pub fn ice_refresh_deadline(earliest_expiry: Ticks100Ns, grace: Duration) -> Ticks100Ns {
    let grace_ticks = (grace.as_nanos() / 100) as i64;
    earliest_expiry + (-grace_ticks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> TransitionPolicy {
        TransitionPolicy {
            continue_on_ready: true,
            reconnect: true,
            delete_requested: false,
        }
    }

    #[test]
    fn happy_path_reaches_connected() {
        let mut state = State::New;
        let steps = [
            StepResult::Ok, // -> GetToken
            StepResult::Ok, // -> Describe
            StepResult::Ok, // -> GetEndpoint
            StepResult::Ok, // -> GetIceConfig
            StepResult::Ok, // -> Ready
            StepResult::Ok, // -> Connect (continue_on_ready)
            StepResult::Ok, // -> Connected
        ];
        for step in steps {
            state = next_state(state, step, policy()).unwrap();
        }
        assert_eq!(state, State::Connected);
    }

    #[test]
    fn describe_not_found_goes_to_create_then_back_to_describe() {
        let mut state = State::Describe;
        state = next_state(state, StepResult::ChannelNotFound, policy()).unwrap();
        assert_eq!(state, State::Create);
        state = next_state(state, StepResult::Ok, policy()).unwrap();
        assert_eq!(state, State::Describe);
    }

    #[test]
    fn describe_being_deleted_goes_to_delete_only_if_requested() {
        let mut p = policy();
        p.delete_requested = true;
        assert_eq!(
            next_state(State::Describe, StepResult::ChannelBeingDeleted, p),
            Some(State::Delete)
        );
        p.delete_requested = false;
        assert_eq!(
            next_state(State::Describe, StepResult::ChannelBeingDeleted, p),
            None
        );
    }

    #[test]
    fn not_authorized_forces_get_token_from_any_state() {
        assert_eq!(
            next_state(State::GetIceConfig, StepResult::NotAuthorized, policy()),
            Some(State::GetToken)
        );
        assert_eq!(
            next_state(State::Connect, StepResult::NotAuthorized, policy()),
            Some(State::GetToken)
        );
    }

    #[test]
    fn connected_ok_self_loops_without_ending_the_worker() {
        assert_eq!(
            next_state(State::Connected, StepResult::Ok, policy()),
            Some(State::Connected)
        );
    }

    #[test]
    fn connected_reconnect_ice_server_goes_to_get_ice_config() {
        assert_eq!(
            next_state(State::Connected, StepResult::ReconnectIceServer, policy()),
            Some(State::GetIceConfig)
        );
    }

    #[test]
    fn connected_go_away_goes_to_connect() {
        assert_eq!(
            next_state(State::Connected, StepResult::GoAway, policy()),
            Some(State::Connect)
        );
    }

    #[test]
    fn disconnected_respects_reconnect_flag() {
        let mut p = policy();
        p.reconnect = true;
        assert_eq!(
            next_state(State::Disconnected, StepResult::TransportDropped, p),
            Some(State::GetToken)
        );
        p.reconnect = false;
        assert_eq!(next_state(State::Disconnected, StepResult::TransportDropped, p), None);
    }

    #[test]
    fn deleted_is_terminal() {
        assert!(State::Deleted.is_terminal());
        assert_eq!(next_state(State::Deleted, StepResult::Ok, policy()), None);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let mut backoff = StepBackoff::new(Duration::from_millis(50), Duration::from_secs(16), None);
        let d1 = backoff.next_delay().unwrap();
        let d2 = backoff.next_delay().unwrap();
        assert_eq!(d1, Duration::from_millis(50));
        assert_eq!(d2, Duration::from_millis(100));
    }

    #[test]
    fn backoff_respects_attempt_ceiling() {
        let mut backoff = StepBackoff::new(Duration::from_millis(50), Duration::from_secs(16), Some(2));
        backoff.next_delay().unwrap();
        backoff.next_delay().unwrap();
        assert!(backoff.next_delay().is_err());
    }

    #[test]
    fn infinite_sentinel_never_exhausts() {
        let mut backoff = StepBackoff::new(
            Duration::from_millis(50),
            Duration::from_secs(16),
            Some(crate::config::INFINITE_RETRY_COUNT_SENTINEL),
        );
        for _ in 0..100 {
            assert!(backoff.next_delay().is_ok());
        }
    }
}
