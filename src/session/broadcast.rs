//! Throttled, diffed snapshot publishing.
//!
//! Non-forced update requests within the throttle window coalesce into a
//! single firing; forced requests fire inline. The serialized snapshot is
//! cached under a small content fingerprint so bursts of updates that change
//! nothing visible reuse the previous payload bytes. A send still goes to
//! every active connection on every firing.

use super::{Outbound, Session};
use crate::protocol::{ParticipantInfo, ServerMessage, VotingSummary};
use crate::types::ConnectionId;

/// Cheap summary of snapshot-relevant state. Mutations invisible to it (card
/// effects, bans, voting progress) must mark the scheduler dirty instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    pub participants: usize,
    pub ready: usize,
    pub started: bool,
    pub round: u32,
}

#[derive(Default)]
pub struct BroadcastScheduler {
    /// A coalesced firing is pending; further non-forced requests are no-ops.
    pub scheduled: bool,
    dirty: bool,
    fingerprint: Option<Fingerprint>,
    cached: Option<String>,
}

impl BroadcastScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Return the payload for `fingerprint`, serializing via `build` only when
    /// the fingerprint changed or a handler marked the cache dirty.
    pub fn payload(
        &mut self,
        fingerprint: Fingerprint,
        build: impl FnOnce() -> Option<String>,
    ) -> Option<String> {
        let stale = self.dirty
            || self.cached.is_none()
            || self.fingerprint != Some(fingerprint);
        if stale {
            let json = build()?;
            self.fingerprint = Some(fingerprint);
            self.cached = Some(json);
            self.dirty = false;
        }
        self.cached.clone()
    }

    pub fn reset(&mut self) {
        self.dirty = false;
        self.fingerprint = None;
        self.cached = None;
    }
}

impl Session {
    /// Coalesced by default; `force` publishes immediately.
    pub(crate) fn request_update(&mut self, force: bool) {
        if force {
            self.flush_update();
            return;
        }
        if self.scheduler.scheduled {
            return;
        }
        self.scheduler.scheduled = true;

        let weak = self.self_ref.clone();
        let delay = self.config.update_throttle;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(session) = weak.upgrade() else {
                return;
            };
            let mut session = session.lock().await;
            session.scheduler.scheduled = false;
            session.flush_update();
        });
    }

    /// Assemble (or reuse) the snapshot payload and push it to the admin and
    /// every player/host connection.
    pub(crate) fn flush_update(&mut self) {
        let fingerprint = Fingerprint {
            participants: self.registry.participant_count(),
            ready: self.registry.ready_count(),
            started: self.game.started,
            round: self.game.current_round,
        };

        let snapshot = self.snapshot_message();
        let payload = self.scheduler.payload(fingerprint, || {
            match serde_json::to_string(&snapshot) {
                Ok(json) => Some(json),
                Err(e) => {
                    tracing::error!("failed to serialize snapshot: {}", e);
                    None
                }
            }
        });
        let Some(payload) = payload else { return };

        let targets: Vec<_> = self
            .registry
            .participants()
            .map(|p| p.id.clone())
            .chain(self.registry.admin().map(|a| a.id.clone()))
            .collect();
        for id in targets {
            self.send_raw(&id, payload.clone());
        }
    }

    /// Full roster + game + voting view sent to every connection.
    pub(crate) fn snapshot_message(&self) -> ServerMessage {
        let players: Vec<ParticipantInfo> = self
            .registry
            .participants()
            .map(|p| ParticipantInfo::from_participant(p, self.banned.contains(&p.id)))
            .collect();

        ServerMessage::PlayersUpdate {
            ready_count: self.registry.ready_count(),
            total_players: self.registry.participant_count(),
            regular_players: self.registry.players().len(),
            max_regular_players: self.config.max_players,
            host_connected: self.registry.host().is_some(),
            host_ready: self.registry.host().is_some_and(|h| h.ready),
            game_started: self.game.started,
            ready_to_start: self.game.ready_to_start,
            current_round: self.game.current_round,
            total_rounds: self.game.total_rounds,
            highlighted_player_id: self.highlighted.clone(),
            voting: VotingSummary {
                phase: self.voting.phase(),
                candidates: self.voting.candidates(),
                votes_cast: self.voting.votes_cast(),
            },
            players,
        }
    }

    /// Serialize and push one message to one connection. Delivery failures are
    /// logged and skipped; they never abort the caller.
    pub(crate) fn send_to(&self, id: &str, msg: &ServerMessage) {
        match serde_json::to_string(msg) {
            Ok(json) => self.send_raw(id, json),
            Err(e) => tracing::error!("failed to serialize message: {}", e),
        }
    }

    pub(crate) fn send_raw(&self, id: &str, json: String) {
        let Some(link) = self.links.get(id) else {
            return;
        };
        if link.send(Outbound::Text(json)).is_err() {
            tracing::warn!("dropping message for closing connection {}", id);
        }
    }

    /// Push a message to every participant (and the admin), optionally
    /// excluding the originator.
    pub(crate) fn broadcast(&self, msg: &ServerMessage, exclude: Option<&ConnectionId>) {
        let json = match serde_json::to_string(msg) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("failed to serialize broadcast: {}", e);
                return;
            }
        };
        let exclude = exclude.map(String::as_str);
        let targets = self
            .registry
            .participants()
            .map(|p| p.id.as_str())
            .chain(self.registry.admin().map(|a| a.id.as_str()));
        for id in targets {
            if Some(id) != exclude {
                self.send_raw(id, json.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(participants: usize, ready: usize) -> Fingerprint {
        Fingerprint {
            participants,
            ready,
            started: false,
            round: 0,
        }
    }

    #[test]
    fn reuses_cached_payload_for_unchanged_fingerprint() {
        let mut scheduler = BroadcastScheduler::new();
        let first = scheduler.payload(fp(2, 1), || Some("one".to_string()));
        assert_eq!(first.as_deref(), Some("one"));

        // Same fingerprint: builder must not run.
        let second = scheduler.payload(fp(2, 1), || panic!("should not serialize"));
        assert_eq!(second.as_deref(), Some("one"));
    }

    #[test]
    fn reserializes_when_fingerprint_changes() {
        let mut scheduler = BroadcastScheduler::new();
        scheduler.payload(fp(2, 1), || Some("one".to_string()));
        let updated = scheduler.payload(fp(3, 1), || Some("two".to_string()));
        assert_eq!(updated.as_deref(), Some("two"));
    }

    #[test]
    fn mark_dirty_forces_reserialization() {
        let mut scheduler = BroadcastScheduler::new();
        scheduler.payload(fp(2, 1), || Some("one".to_string()));
        scheduler.mark_dirty();
        let updated = scheduler.payload(fp(2, 1), || Some("two".to_string()));
        assert_eq!(updated.as_deref(), Some("two"));
    }
}
