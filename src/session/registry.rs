//! Roster of connected participants: ordered players, at most one host, at
//! most one admin observer. Entries exist only while the connection is live;
//! disconnects remove them immediately, which is what frees a name for
//! reconnect.

use crate::error::{SessionError, SessionResult};
use crate::types::{ConnectionId, Participant, Role};

pub struct ConnectionRegistry {
    max_players: usize,
    players: Vec<Participant>,
    host: Option<Participant>,
    admin: Option<Participant>,
}

impl ConnectionRegistry {
    pub fn new(max_players: usize) -> Self {
        Self {
            max_players,
            players: Vec::new(),
            host: None,
            admin: None,
        }
    }

    /// Add an ordinary player. The capacity bound is bypassed once the game
    /// has started so reconnects and late observers can still get in.
    pub fn add_player(&mut self, participant: Participant, game_started: bool) -> SessionResult<()> {
        if self.find_by_name(&participant.name).is_some() {
            return Err(SessionError::validation("Nickname is already taken"));
        }
        if !game_started && self.players.len() >= self.max_players {
            return Err(SessionError::validation(format!(
                "Lobby is full (maximum {} players)",
                self.max_players
            )));
        }
        self.players.push(participant);
        Ok(())
    }

    pub fn promote_to_host(&mut self, participant: Participant) -> SessionResult<()> {
        if self.host.is_some() {
            return Err(SessionError::validation("A host is already connected"));
        }
        if self.find_by_name(&participant.name).is_some() {
            return Err(SessionError::validation("Nickname is already taken"));
        }
        self.host = Some(participant);
        Ok(())
    }

    pub fn promote_to_admin(&mut self, participant: Participant) -> SessionResult<()> {
        if self.admin.is_some() {
            return Err(SessionError::validation("An admin is already connected"));
        }
        self.admin = Some(participant);
        Ok(())
    }

    /// Remove by connection id, whichever slot it occupies.
    pub fn remove(&mut self, id: &ConnectionId) -> Option<Participant> {
        if let Some(pos) = self.players.iter().position(|p| p.id == *id) {
            return Some(self.players.remove(pos));
        }
        if self.host.as_ref().is_some_and(|h| h.id == *id) {
            return self.host.take();
        }
        if self.admin.as_ref().is_some_and(|a| a.id == *id) {
            return self.admin.take();
        }
        None
    }

    /// Case-insensitive lookup among players and host (the admin panel never
    /// carries a display name).
    pub fn find_by_name(&self, name: &str) -> Option<&Participant> {
        let lower = name.to_lowercase();
        self.participants().find(|p| p.name.to_lowercase() == lower)
    }

    pub fn find_by_id(&self, id: &ConnectionId) -> Option<&Participant> {
        self.participants().find(|p| p.id == *id)
    }

    pub fn find_by_id_mut(&mut self, id: &ConnectionId) -> Option<&mut Participant> {
        if let Some(pos) = self.players.iter().position(|p| p.id == *id) {
            return self.players.get_mut(pos);
        }
        self.host.as_mut().filter(|h| h.id == *id)
    }

    /// Players in roster order, then the host.
    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.players.iter().chain(self.host.iter())
    }

    pub fn participants_mut(&mut self) -> impl Iterator<Item = &mut Participant> {
        self.players.iter_mut().chain(self.host.iter_mut())
    }

    pub fn players(&self) -> &[Participant] {
        &self.players
    }

    pub fn host(&self) -> Option<&Participant> {
        self.host.as_ref()
    }

    pub fn admin(&self) -> Option<&Participant> {
        self.admin.as_ref()
    }

    pub fn participant_count(&self) -> usize {
        self.players.len() + usize::from(self.host.is_some())
    }

    pub fn ready_count(&self) -> usize {
        self.participants().filter(|p| p.ready).count()
    }

    pub fn is_host(&self, id: &ConnectionId) -> bool {
        self.host.as_ref().is_some_and(|h| h.id == *id)
    }

    pub fn is_admin(&self, id: &ConnectionId) -> bool {
        self.admin.as_ref().is_some_and(|a| a.id == *id)
    }
}
