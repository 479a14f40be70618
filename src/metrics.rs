//! Diagnostics (`SPEC_FULL.md` §4.12, component C12 half): atomic counters
//! plus an EMA for API latency, per `spec.md` §4.10 and its §9 design note
//! resolving "counters vs. locks" in favor of atomics — cheaper under the
//! message-router worker's hot path than a `Mutex<Stats>` would be.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Which REST/WSS call class a latency sample belongs to, used to keep a
/// separate EMA per class (`spec.md` §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallClass {
    DescribeChannel,
    CreateChannel,
    GetEndpoint,
    GetIceConfig,
    DeleteChannel,
    WssConnect,
}

const CALL_CLASSES: [CallClass; 6] = [
    CallClass::DescribeChannel,
    CallClass::CreateChannel,
    CallClass::GetEndpoint,
    CallClass::GetIceConfig,
    CallClass::DeleteChannel,
    CallClass::WssConnect,
];

fn class_index(class: CallClass) -> usize {
    CALL_CLASSES.iter().position(|c| *c == class).expect("exhaustive")
}

/// A snapshot of [`SignalingMetrics`] suitable for `getMetrics()` (`spec.md`
/// §4.10).
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub ice_refresh_count: u64,
    pub errors: u64,
    pub runtime_errors: u64,
    pub reconnects: u64,
    pub latency_ema_millis: [f64; 6],
}

/// Counters updated via atomic increments; never locked on the hot path.
#[derive(Debug, Default)]
pub struct SignalingMetrics {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    ice_refresh_count: AtomicU64,
    errors: AtomicU64,
    runtime_errors: AtomicU64,
    reconnects: AtomicU64,
    /// EMA state is the one piece of mutable floating-point state that
    /// cannot be expressed as a single atomic op; it's guarded by a plain
    /// mutex taken only when a call completes, not on every send/receive.
    latency_ema_millis: Mutex<[f64; 6]>,
    alpha: f64,
}

impl SignalingMetrics {
    #[must_use]
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            ..Self::default()
        }
    }

    pub fn record_message_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ice_refresh(&self) {
        self.ice_refresh_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_runtime_error(&self) {
        self.runtime_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Folds one latency sample into the EMA for `class`:
    /// `ema = alpha * sample + (1 - alpha) * ema`.
    pub fn record_latency(&self, class: CallClass, sample_millis: f64) {
        let idx = class_index(class);
        let mut ema = self.latency_ema_millis.lock().unwrap();
        ema[idx] = if ema[idx] == 0.0 {
            sample_millis
        } else {
            self.alpha * sample_millis + (1.0 - self.alpha) * ema[idx]
        };
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            ice_refresh_count: self.ice_refresh_count.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            runtime_errors: self.runtime_errors.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            latency_ema_millis: *self.latency_ema_millis.lock().unwrap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment_independently() {
        let metrics = SignalingMetrics::new(0.05);
        metrics.record_message_sent();
        metrics.record_message_sent();
        metrics.record_error();
        let snap = metrics.snapshot();
        assert_eq!(snap.messages_sent, 2);
        assert_eq!(snap.errors, 1);
        assert_eq!(snap.messages_received, 0);
    }

    #[test]
    fn first_latency_sample_seeds_ema() {
        let metrics = SignalingMetrics::new(0.05);
        metrics.record_latency(CallClass::DescribeChannel, 100.0);
        let snap = metrics.snapshot();
        assert_eq!(snap.latency_ema_millis[class_index(CallClass::DescribeChannel)], 100.0);
    }

    #[test]
    fn subsequent_samples_are_smoothed() {
        let metrics = SignalingMetrics::new(0.5);
        metrics.record_latency(CallClass::GetEndpoint, 100.0);
        metrics.record_latency(CallClass::GetEndpoint, 200.0);
        let snap = metrics.snapshot();
        assert_eq!(snap.latency_ema_millis[class_index(CallClass::GetEndpoint)], 150.0);
    }
}
