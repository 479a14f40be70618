//! Clock-skew map (§3, §4.2, §4.5) and the 100-ns tick type it is keyed and
//! valued in.
//!
//! Design note resolution (`spec.md` §9): keyed by `(EndpointKind, State)`
//! rather than by state-machine-state memory address, so the table is
//! deterministic across restarts.

use std::collections::HashMap;
use std::ops::{Add, Sub};
use std::time::Duration;

use crate::state_machine::State;

/// A signed duration expressed in 100-nanosecond ticks, AWS's native
/// timestamp resolution (`FILETIME`-style).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ticks100Ns(pub i64);

impl Ticks100Ns {
    #[must_use]
    pub fn from_duration_since_epoch(d: Duration) -> Self {
        Self((d.as_nanos() / 100) as i64)
    }

    #[must_use]
    pub fn as_duration(self) -> Duration {
        Duration::from_nanos((self.0.max(0) as u64) * 100)
    }
}

impl Add<i64> for Ticks100Ns {
    type Output = Self;
    fn add(self, rhs: i64) -> Self {
        Self(self.0 + rhs)
    }
}

impl Sub for Ticks100Ns {
    type Output = i64;
    fn sub(self, rhs: Self) -> i64 {
        self.0 - rhs.0
    }
}

/// Which endpoint class a signed request targets; REST calls to the control
/// plane and WSS calls to the data endpoint track skew independently
/// (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    ControlPlane,
    Data,
}

/// One clock-skew observation. The sign is carried directly by the `i64`
/// (positive = device ahead of server) rather than an explicit "MSB" flag,
/// since Rust has native signed integers; `spec.md`'s "MSB encodes direction"
/// phrasing describes the C `UINT64` representation this crate does not
/// need to reproduce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkewEntry {
    /// Device time minus server time, in 100-ns ticks.
    pub skew: i64,
}

impl SkewEntry {
    /// Applies this skew to `now`, returning the server-corrected time.
    #[must_use]
    pub fn correct(&self, now: Ticks100Ns) -> Ticks100Ns {
        Ticks100Ns(now.0 - self.skew)
    }
}

/// Per-`(endpoint, state)` table of recorded clock-skew corrections.
#[derive(Debug, Default)]
pub struct ClockSkewMap {
    entries: HashMap<(EndpointKind, State), SkewEntry>,
}

impl ClockSkewMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an observed `|server - device|` skew if it exceeds
    /// `threshold`; magnitudes within the threshold are ignored (`spec.md`
    /// §4.5, §8).
    pub fn record(
        &mut self,
        endpoint: EndpointKind,
        state: State,
        device_now: Ticks100Ns,
        server_now: Ticks100Ns,
        threshold: Duration,
    ) {
        let delta = server_now - device_now;
        let threshold_ticks = (threshold.as_nanos() / 100) as i64;
        if delta.abs() > threshold_ticks {
            self.entries
                .insert((endpoint, state), SkewEntry { skew: -delta });
        }
    }

    /// Looks up the recorded correction for `(endpoint, state)`, if any.
    #[must_use]
    pub fn get(&self, endpoint: EndpointKind, state: State) -> Option<SkewEntry> {
        self.entries.get(&(endpoint, state)).copied()
    }

    /// Applies the recorded correction (if any) to `now`.
    #[must_use]
    pub fn corrected_now(&self, endpoint: EndpointKind, state: State, now: Ticks100Ns) -> Ticks100Ns {
        self.get(endpoint, state).map_or(now, |e| e.correct(now))
    }

    /// Clears every recorded skew, as required at client teardown.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn within_threshold_is_ignored() {
        let mut map = ClockSkewMap::new();
        let device = Ticks100Ns(1_000_000_000);
        let server = device + (60 * 10_000_000); // 60s ahead, under 3 min
        map.record(
            EndpointKind::ControlPlane,
            State::GetToken,
            device,
            server,
            Duration::from_secs(180),
        );
        assert!(map.get(EndpointKind::ControlPlane, State::GetToken).is_none());
    }

    #[test]
    fn above_threshold_is_recorded_and_corrects() {
        let mut map = ClockSkewMap::new();
        let device = Ticks100Ns(1_000_000_000);
        let server = device + (5 * 60 * 10_000_000); // 5 min ahead
        map.record(
            EndpointKind::Data,
            State::Connect,
            device,
            server,
            Duration::from_secs(180),
        );
        let corrected = map.corrected_now(EndpointKind::Data, State::Connect, device);
        assert_eq!(corrected, server);
    }

    #[test]
    fn endpoints_track_independently() {
        let mut map = ClockSkewMap::new();
        let device = Ticks100Ns(0);
        let server = device + (10 * 60 * 10_000_000);
        map.record(
            EndpointKind::ControlPlane,
            State::GetToken,
            device,
            server,
            Duration::from_secs(180),
        );
        assert!(map.get(EndpointKind::Data, State::GetToken).is_none());
        assert!(map.get(EndpointKind::ControlPlane, State::GetToken).is_some());
    }
}
