//! Pending-Message Queue (§4.7, component C7): holds inbound ICE candidates
//! that arrive before their peer's offer has been processed.
//!
//! Keyed by `CRC32(peerId)` per `spec.md` §4.7; `crc32c` is the same
//! checksum crate already pulled in by the retrieval pack's media/storage
//! manifests (not used by the teacher itself, which has no need for a
//! peer-hash queue).

use std::collections::HashMap;
use std::time::Duration;

use crate::clock_skew::Ticks100Ns;

fn peer_hash(peer_id: &str) -> u32 {
    crc32c::crc32c(peer_id.as_bytes())
}

#[derive(Debug, Clone)]
struct Queue {
    messages: Vec<Vec<u8>>,
    created_at: Ticks100Ns,
}

/// FIFO queues of pending messages, one per peer, expiring after 60s of
/// inactivity.
#[derive(Debug, Default)]
pub struct PendingQueues {
    queues: HashMap<u32, Queue>,
}

impl PendingQueues {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues `payload` (deep-copied, per `spec.md` §4.7) for `peer_id`,
    /// creating the queue if absent.
    pub fn enqueue(&mut self, peer_id: &str, payload: Vec<u8>, now: Ticks100Ns) {
        let hash = peer_hash(peer_id);
        self.queues
            .entry(hash)
            .or_insert_with(|| Queue {
                messages: Vec::new(),
                created_at: now,
            })
            .messages
            .push(payload);
    }

    /// Drains and removes the queue for `peer_id`, if any.
    pub fn drain(&mut self, peer_id: &str) -> Vec<Vec<u8>> {
        self.queues
            .remove(&peer_hash(peer_id))
            .map(|q| q.messages)
            .unwrap_or_default()
    }

    /// Drops the queue for `peer_id` outright, used when the
    /// concurrent-session ceiling is reached (`spec.md` §4.7).
    pub fn drop_queue(&mut self, peer_id: &str) {
        self.queues.remove(&peer_hash(peer_id));
    }

    /// Sweeps queues older than `ttl`, called by the session-GC worker
    /// (`spec.md` §5).
    pub fn sweep_expired(&mut self, now: Ticks100Ns, ttl: Duration) {
        let ttl_ticks = (ttl.as_nanos() / 100) as i64;
        self.queues.retain(|_, q| now - q.created_at <= ttl_ticks);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_then_drain_preserves_order() {
        let mut queues = PendingQueues::new();
        queues.enqueue("peerA", b"one".to_vec(), Ticks100Ns(0));
        queues.enqueue("peerA", b"two".to_vec(), Ticks100Ns(0));
        let drained = queues.drain("peerA");
        assert_eq!(drained, vec![b"one".to_vec(), b"two".to_vec()]);
        assert!(queues.drain("peerA").is_empty());
    }

    #[test]
    fn distinct_peers_do_not_collide() {
        let mut queues = PendingQueues::new();
        queues.enqueue("peerA", b"a".to_vec(), Ticks100Ns(0));
        queues.enqueue("peerB", b"b".to_vec(), Ticks100Ns(0));
        assert_eq!(queues.drain("peerA"), vec![b"a".to_vec()]);
        assert_eq!(queues.drain("peerB"), vec![b"b".to_vec()]);
    }

    #[test]
    fn sweep_removes_queues_older_than_ttl() {
        let mut queues = PendingQueues::new();
        queues.enqueue("peerA", b"a".to_vec(), Ticks100Ns(0));
        let sixty_one_secs = Ticks100Ns(61 * 10_000_000);
        queues.sweep_expired(sixty_one_secs, Duration::from_secs(60));
        assert!(queues.is_empty());
    }

    #[test]
    fn sweep_keeps_fresh_queues() {
        let mut queues = PendingQueues::new();
        queues.enqueue("peerA", b"a".to_vec(), Ticks100Ns(0));
        let thirty_secs = Ticks100Ns(30 * 10_000_000);
        queues.sweep_expired(thirty_secs, Duration::from_secs(60));
        assert_eq!(queues.len(), 1);
    }

    #[test]
    fn drop_queue_discards_without_draining() {
        let mut queues = PendingQueues::new();
        queues.enqueue("peerA", b"a".to_vec(), Ticks100Ns(0));
        queues.drop_queue("peerA");
        assert!(queues.drain("peerA").is_empty());
    }
}
