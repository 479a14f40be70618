//! Session Router (§4.8, component C8): per-peer session registry and
//! offer/answer/candidate dispatch.
//!
//! The "fixed-capacity array + peer-hash map" registry shape mirrors
//! `spec.md` §4.8 directly; there is no teacher analog for a signaling
//! session table, so this is grounded on the surrounding components it
//! composes: [`crate::pending_queue::PendingQueues`] (C7) and
//! [`crate::message`] (C4).

use std::collections::HashMap;

use crate::channel_info::ChannelRole;
use crate::error::{Result, SignalingError};
use crate::message::{MessageType, ReceivedSignalingMessage};
use crate::pending_queue::PendingQueues;

fn peer_hash(peer_id: &str) -> u32 {
    crc32c::crc32c(peer_id.as_bytes())
}

#[derive(Debug, Clone)]
pub struct PeerSession {
    pub peer_id: String,
    pub terminate: bool,
}

/// Outcome the router hands back to the state machine / façade so they can
/// react (e.g. re-enter `GET_ICE_CONFIG` on `RECONNECT_ICE_SERVER`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// An `OFFER` created a new session; payload and any drained pending
    /// messages are returned for the caller's offer handler to process.
    NewSession {
        peer_id: String,
        payload: Vec<u8>,
        drained_candidates: Vec<Vec<u8>>,
    },
    /// An `ANSWER` was routed to an existing session.
    Answer { peer_id: String, payload: Vec<u8> },
    /// An `ICE_CANDIDATE` was routed to an existing session.
    Candidate { peer_id: String, payload: Vec<u8> },
    /// A candidate arrived with no matching session yet; it was enqueued.
    Queued { peer_id: String },
    ReconnectIce,
    GoAway,
}

/// Maintains up to `max_sessions` concurrent peer sessions (`spec.md`
/// §4.8).
pub struct SessionRouter {
    role: ChannelRole,
    max_sessions: usize,
    sessions: Vec<PeerSession>,
    index: HashMap<u32, usize>,
    pending: PendingQueues,
}

impl SessionRouter {
    #[must_use]
    pub fn new(role: ChannelRole, max_sessions: usize) -> Self {
        Self {
            role,
            max_sessions,
            sessions: Vec::new(),
            index: HashMap::new(),
            pending: PendingQueues::new(),
        }
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn pending_queues_mut(&mut self) -> &mut PendingQueues {
        &mut self.pending
    }

    fn find(&self, peer_id: &str) -> Option<usize> {
        self.index.get(&peer_hash(peer_id)).copied()
    }

    /// Routes one inbound message per `spec.md` §4.8's decision table.
    ///
    /// # Errors
    ///
    /// [`SignalingError::InvalidOperation`] on a duplicate `OFFER` for a peer
    /// that already has a session, or an `ANSWER`/candidate with no sender.
    pub fn route(
        &mut self,
        msg: ReceivedSignalingMessage,
        now: crate::clock_skew::Ticks100Ns,
    ) -> Result<RouteOutcome> {
        match msg.message_type {
            MessageType::Offer => {
                let peer_id = msg
                    .sender_peer_id
                    .ok_or_else(|| SignalingError::InvalidOperation("OFFER missing sender".into()))?;
                if self.find(&peer_id).is_some() {
                    return Err(SignalingError::InvalidOperation(format!(
                        "session for peer {peer_id} already exists"
                    )));
                }
                if self.sessions.len() >= self.max_sessions {
                    self.pending.drop_queue(&peer_id);
                    return Err(SignalingError::InvalidOperation(
                        "concurrent session ceiling reached".into(),
                    ));
                }
                let idx = self.sessions.len();
                self.sessions.push(PeerSession {
                    peer_id: peer_id.clone(),
                    terminate: false,
                });
                self.index.insert(peer_hash(&peer_id), idx);
                let drained = self.pending.drain(&peer_id);
                Ok(RouteOutcome::NewSession {
                    peer_id,
                    payload: msg.payload,
                    drained_candidates: drained,
                })
            }
            MessageType::Answer => {
                // Viewer role: locate the single outgoing session (`spec.md`
                // §4.8); master role answers are routed by sender id same as
                // candidates.
                let peer_id = if self.role == ChannelRole::Viewer {
                    self.sessions
                        .first()
                        .map(|s| s.peer_id.clone())
                        .ok_or(SignalingError::NotFound)?
                } else {
                    msg.sender_peer_id
                        .ok_or_else(|| SignalingError::InvalidOperation("ANSWER missing sender".into()))?
                };
                if self.find(&peer_id).is_none() {
                    return Err(SignalingError::NotFound);
                }
                Ok(RouteOutcome::Answer {
                    peer_id,
                    payload: msg.payload,
                })
            }
            MessageType::IceCandidate => {
                let peer_id = msg
                    .sender_peer_id
                    .ok_or_else(|| SignalingError::InvalidOperation("ICE_CANDIDATE missing sender".into()))?;
                if self.find(&peer_id).is_some() {
                    Ok(RouteOutcome::Candidate {
                        peer_id,
                        payload: msg.payload,
                    })
                } else {
                    self.pending.enqueue(&peer_id, msg.payload, now);
                    Ok(RouteOutcome::Queued { peer_id })
                }
            }
            MessageType::ReconnectIceServer => Ok(RouteOutcome::ReconnectIce),
            MessageType::GoAway => Ok(RouteOutcome::GoAway),
            MessageType::StatusResponse | MessageType::Unknown => Err(SignalingError::InvalidApiReturn(
                "message type is not routable to a session".into(),
            )),
        }
    }

    /// Marks a session for teardown; actual removal happens in
    /// [`SessionRouter::collect_garbage`], matching the terminate-flag
    /// design in `spec.md` §4.8.
    pub fn terminate(&mut self, peer_id: &str) {
        if let Some(idx) = self.find(peer_id) {
            self.sessions[idx].terminate = true;
        }
    }

    /// Removes every session marked for termination, rebuilding the index.
    pub fn collect_garbage(&mut self) {
        if !self.sessions.iter().any(|s| s.terminate) {
            return;
        }
        self.sessions.retain(|s| !s.terminate);
        self.index.clear();
        for (idx, session) in self.sessions.iter().enumerate() {
            self.index.insert(peer_hash(&session.peer_id), idx);
        }
    }
}
