//! The session aggregate.
//!
//! One [`Session`] holds the whole game: connection roster, dealt cards,
//! voting, reconnection snapshots and broadcast scheduling. All mutation goes
//! through a single `Mutex`, so handlers run one at a time and never observe a
//! half-applied message. Timer tasks (broadcast throttle, post-start notice)
//! re-enter through a `Weak` reference and are ignored if they outlive the
//! state they were scheduled for.

pub mod broadcast;
pub mod deck;
pub mod reconnect;
pub mod registry;
pub mod voting;

mod actions;
mod handlers;

use crate::catalog::CardCatalog;
use crate::config::SessionConfig;
use crate::media::MediaPlane;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::types::{ConnectionId, GameState, Role, VotingHistoryEntry};
use broadcast::BroadcastScheduler;
use chrono::Utc;
use deck::CardDeck;
use reconnect::{ReconnectionRecord, ReconnectionStore};
use registry::ConnectionRegistry;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, Mutex, MutexGuard};
use ulid::Ulid;
use voting::VotingEngine;

/// Frames pushed to a connection's outbound pump.
#[derive(Debug)]
pub enum Outbound {
    Text(String),
    Pong(Vec<u8>),
    Close,
}

pub type Link = mpsc::UnboundedSender<Outbound>;

pub struct Session {
    pub(crate) config: SessionConfig,
    pub(crate) registry: ConnectionRegistry,
    pub(crate) deck: CardDeck,
    pub(crate) reconnect: ReconnectionStore,
    pub(crate) voting: VotingEngine,
    pub(crate) scheduler: BroadcastScheduler,
    pub(crate) game: GameState,
    /// Eliminated/banned connection ids; cleared only by `reset_game`.
    pub(crate) banned: HashSet<ConnectionId>,
    pub(crate) highlighted: Option<ConnectionId>,
    pub(crate) voting_history: Vec<VotingHistoryEntry>,
    /// Outbound channels for every live connection, joined or not.
    pub(crate) links: HashMap<ConnectionId, Link>,
    pub(crate) media: Arc<dyn MediaPlane>,
    /// Backreference for timer tasks; empty until the handle wraps us.
    pub(crate) self_ref: Weak<Mutex<Session>>,
    /// Bumped on every hard reset so stale timers can tell they fired late.
    pub(crate) epoch: u64,
}

/// Cloneable entry point the transport layer holds.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<Mutex<Session>>,
}

impl SessionHandle {
    pub fn new(config: SessionConfig, catalog: CardCatalog, media: Arc<dyn MediaPlane>) -> Self {
        let session = Session {
            registry: ConnectionRegistry::new(config.max_players),
            deck: CardDeck::new(catalog),
            reconnect: ReconnectionStore::new(),
            voting: VotingEngine::new(),
            scheduler: BroadcastScheduler::new(),
            game: GameState::new(config.default_total_rounds),
            banned: HashSet::new(),
            highlighted: None,
            voting_history: Vec::new(),
            links: HashMap::new(),
            media,
            self_ref: Weak::new(),
            epoch: 0,
            config,
        };
        let inner = Arc::new(Mutex::new(session));
        if let Ok(mut guard) = inner.try_lock() {
            guard.self_ref = Arc::downgrade(&inner);
        }
        Self { inner }
    }

    /// Register a new connection and return its id. The welcome message is
    /// pushed before this returns.
    pub async fn connect(&self, link: Link) -> ConnectionId {
        self.inner.lock().await.connect(link)
    }

    pub async fn handle_message(&self, conn: &ConnectionId, msg: ClientMessage) {
        self.inner.lock().await.dispatch(conn, msg);
    }

    pub async fn disconnect(&self, conn: &ConnectionId) {
        self.inner.lock().await.on_disconnect(conn);
    }

    /// Direct push to one connection; used by the transport for frames the
    /// session never saw (parse failures).
    pub async fn send(&self, conn: &ConnectionId, msg: &ServerMessage) {
        self.inner.lock().await.send_to(conn, msg);
    }

    pub async fn lock(&self) -> MutexGuard<'_, Session> {
        self.inner.lock().await
    }
}

impl Session {
    pub(crate) fn connect(&mut self, link: Link) -> ConnectionId {
        let id = Ulid::new().to_string();
        self.links.insert(id.clone(), link);
        tracing::info!("connection {} opened ({} total)", id, self.links.len());
        self.send_to(&id, &ServerMessage::Welcome { your_id: id.clone() });
        self.request_update(true);
        id
    }

    pub(crate) fn on_disconnect(&mut self, conn: &ConnectionId) {
        self.links.remove(conn);
        let Some(participant) = self.registry.remove(conn) else {
            tracing::debug!("connection {} closed before joining", conn);
            return;
        };
        tracing::info!(
            "{} ({:?}) disconnected, {} participants left",
            participant.name,
            participant.role,
            self.registry.participant_count()
        );

        if participant.role == Role::Admin {
            return;
        }

        if self.game.started && !participant.name.is_empty() {
            // The ban moves into the snapshot; the connection id it was keyed
            // under is dead, the flag follows the nickname back in.
            let banned = self.banned.remove(&participant.id);
            self.reconnect.save(
                &participant.name,
                ReconnectionRecord {
                    characteristics: participant.characteristics.clone(),
                    ready: participant.ready,
                    role: participant.role,
                    mirror_camera: participant.mirror_camera,
                    banned,
                    disconnected_at: Utc::now().timestamp_millis(),
                },
            );
        }

        if participant.role == Role::Host {
            self.broadcast(&ServerMessage::HostLeft, None);
        }
        self.broadcast(
            &ServerMessage::PlayerLeft {
                player_id: participant.id.clone(),
                player_name: Some(participant.name.clone()),
            },
            None,
        );

        if self.highlighted.as_deref() == Some(participant.id.as_str()) {
            self.highlighted = None;
        }
        // Whatever the departed participant contributed to the open voting
        // cycle leaves with them.
        self.prune_voting_participant(&participant.id);
        self.check_all_ready();
        self.scheduler.mark_dirty();
        self.request_update(true);

        let media = Arc::clone(&self.media);
        tokio::spawn(async move {
            media.participant_left(&participant.id).await;
        });
    }

    /// Start when the host and at least one player are all ready; fall back to
    /// the lobby when a started game loses its ready host.
    pub(crate) fn check_all_ready(&mut self) {
        let host_ready = self.registry.host().is_some_and(|h| h.ready);
        if !host_ready {
            if self.game.started {
                tracing::info!("host gone or not ready, game returns to lobby");
                self.game.started = false;
                self.game.started_at = None;
            }
            return;
        }
        let everyone_ready = self.registry.participant_count() >= 2
            && self.registry.participants().all(|p| p.ready);
        if everyone_ready && !self.game.started {
            self.start_game();
        }
    }

    pub(crate) fn start_game(&mut self) {
        self.game.started = true;
        self.game.started_at = Some(Utc::now().timestamp_millis());
        self.game.current_round = 0;
        self.deck.deal_all(self.registry.participants_mut());
        tracing::info!(
            "game started with {} participants",
            self.registry.participant_count()
        );

        self.broadcast(&ServerMessage::GameStarted, None);
        self.scheduler.mark_dirty();
        self.request_update(true);

        // Delayed hint so everyone checks their media links once the game
        // screen has settled.
        let weak = self.self_ref.clone();
        let epoch = self.epoch;
        let delay = self.config.post_start_notice;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(session) = weak.upgrade() else {
                return;
            };
            let session = session.lock().await;
            if session.epoch != epoch || !session.game.started {
                return;
            }
            session.broadcast(
                &ServerMessage::GameMessage {
                    message: "If you cannot see or hear another player, refresh your connections."
                        .to_string(),
                },
                None,
            );
        });
    }

    /// Hard reset back to a fresh lobby, keeping connections but dropping all
    /// game progress, bans, votes and reconnection snapshots.
    pub(crate) fn reset_game(&mut self) {
        tracing::info!("session reset");
        self.game.reset();
        self.game.total_rounds = self.config.default_total_rounds;
        for participant in self.registry.participants_mut() {
            participant.ready = false;
            participant.characteristics = None;
            participant.muted = false;
            participant.immunity = false;
        }
        self.banned.clear();
        self.highlighted = None;
        self.voting.clear();
        self.voting_history.clear();
        self.reconnect.clear();
        self.deck.reset_all();
        self.scheduler.reset();
        self.epoch += 1;

        self.broadcast(&ServerMessage::GameReset, None);
        self.request_update(true);
    }

    /// Players who may cast votes: connected, not the host, not banned.
    pub(crate) fn eligible_voters(&self) -> HashSet<ConnectionId> {
        self.registry
            .players()
            .iter()
            .filter(|p| !self.banned.contains(&p.id))
            .map(|p| p.id.clone())
            .collect()
    }
}
