//! Inbound message handling.
//!
//! `dispatch` routes every parsed client message to a handler; any handler
//! error becomes an `error` reply on the originating connection only and never
//! touches session state.

use super::Session;
use crate::error::{SessionError, SessionResult};
use crate::media::MediaPlane;
use crate::protocol::{
    ActionParameters, ActionType, CandidateInfo, ClientMessage, ServerMessage,
};
use crate::types::{
    Category, ConnectionId, Participant, Role, VotePhase, VoteResultEntry, VotingHistoryEntry,
};
use crate::session::voting::VoteDecision;
use chrono::Utc;
use std::sync::Arc;

impl Session {
    pub(crate) fn dispatch(&mut self, conn: &ConnectionId, msg: ClientMessage) {
        let result = match msg {
            ClientMessage::JoinAdminPanel => self.handle_join_admin(conn),
            ClientMessage::Join { name } => self.handle_join(conn, name),
            ClientMessage::SetReady { ready } => self.handle_set_ready(conn, ready),
            ClientMessage::GetLobbyState => self.handle_get_lobby_state(conn),
            ClientMessage::ChatMessage { message } => self.handle_chat(conn, message),
            ClientMessage::GetPlayerCards { player_id } => {
                self.handle_get_player_cards(conn, &player_id)
            }
            ClientMessage::RevealCharacteristic {
                player_id,
                characteristic_type,
            } => self.handle_reveal_characteristic(conn, &player_id, characteristic_type),
            ClientMessage::ExecuteActionCard {
                action_type,
                parameters,
            } => self.handle_execute_action(conn, action_type, &parameters),
            ClientMessage::ToggleBanPlayer { player_id } => {
                self.handle_toggle_ban(conn, &player_id)
            }
            ClientMessage::KickPlayer { player_id } => self.handle_kick(conn, &player_id),
            ClientMessage::SetMirrorCamera { mirror } => self.handle_set_mirror(conn, mirror),
            ClientMessage::GameReady => self.handle_game_ready(conn),
            ClientMessage::SetTotalRounds { total_rounds } => {
                self.handle_set_total_rounds(conn, total_rounds)
            }
            ClientMessage::ChangeRound { round } => self.handle_change_round(conn, round),
            ClientMessage::StartVotingSelection => self.handle_start_voting_selection(conn),
            ClientMessage::SetVotingCandidates { candidates } => {
                self.handle_set_voting_candidates(conn, candidates)
            }
            ClientMessage::ConfirmVotingCandidates => self.handle_confirm_candidates(conn),
            ClientMessage::CancelVoting => self.handle_cancel_voting(conn),
            ClientMessage::VoteToKick { target_player_id } => {
                self.handle_vote(conn, &target_player_id)
            }
            ClientMessage::TogglePlayerHighlight { player_id } => {
                self.handle_toggle_highlight(conn, &player_id)
            }
            ClientMessage::ResetGame => self.handle_reset_game(conn),
            ClientMessage::Signal { target_id, signal } => {
                self.handle_signal(conn, &target_id, signal)
            }
            ClientMessage::RefreshConnections => self.handle_refresh_connections(conn),
        };

        if let Err(err) = result {
            tracing::debug!("rejected message from {}: {}", conn, err);
            self.send_to(conn, &ServerMessage::error(err.code(), err.to_string()));
        }
    }

    fn require_host(&self, conn: &ConnectionId) -> SessionResult<()> {
        if self.registry.is_host(conn) {
            Ok(())
        } else {
            Err(SessionError::unauthorized("Only the host can do that"))
        }
    }

    fn require_host_or_admin(&self, conn: &ConnectionId) -> SessionResult<()> {
        if self.registry.is_host(conn) || self.registry.is_admin(conn) {
            Ok(())
        } else {
            Err(SessionError::unauthorized(
                "Only the host or admin can do that",
            ))
        }
    }

    fn handle_join_admin(&mut self, conn: &ConnectionId) -> SessionResult<()> {
        let admin = Participant::new(conn.clone(), String::new(), Role::Admin);
        self.registry.promote_to_admin(admin)?;
        tracing::info!("connection {} joined the admin panel", conn);
        self.send_to(
            conn,
            &ServerMessage::JoinedAsAdmin {
                id: conn.clone(),
                is_reconnecting: false,
            },
        );
        self.request_update(true);
        Ok(())
    }

    fn handle_join(&mut self, conn: &ConnectionId, name: String) -> SessionResult<()> {
        if self.registry.is_admin(conn) {
            return Err(SessionError::validation(
                "The admin panel cannot join as a player",
            ));
        }
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(SessionError::validation("Enter a nickname"));
        }
        if name.chars().count() > self.config.max_name_len {
            return Err(SessionError::validation(format!(
                "Nickname is longer than {} characters",
                self.config.max_name_len
            )));
        }

        // A joined participant sending join again is a rename.
        if let Some(current) = self.registry.find_by_id(conn) {
            if current.name.to_lowercase() == name.to_lowercase() {
                return Ok(());
            }
            if self.registry.find_by_name(&name).is_some() {
                return Err(SessionError::validation("Nickname is already taken"));
            }
            if let Some(participant) = self.registry.find_by_id_mut(conn) {
                tracing::info!("{} renamed to {}", participant.name, name);
                participant.name = name;
            }
            self.request_update(true);
            return Ok(());
        }

        // Any stale snapshot is consumed here; it only applies mid-game.
        let record = self.reconnect.take(&name);
        let record = if self.game.started { record } else { None };
        let is_reconnecting = record.is_some();

        let role = match &record {
            Some(record) => record.role,
            None if self.config.is_reserved_host_name(&name) => Role::Host,
            None => Role::Player,
        };
        let mut participant = Participant::new(conn.clone(), name.clone(), role);
        let mut restore_ban = false;
        if let Some(record) = record {
            if let Some(held) = &record.characteristics {
                self.deck.mark_used(held);
            }
            participant.characteristics = record.characteristics;
            participant.ready = record.ready;
            participant.mirror_camera = record.mirror_camera;
            restore_ban = record.banned;
        }

        match role {
            Role::Host => self.registry.promote_to_host(participant)?,
            _ => self.registry.add_player(participant, self.game.started)?,
        }
        if restore_ban {
            self.banned.insert(conn.clone());
        }
        tracing::info!(
            "{} joined as {:?}{}",
            name,
            role,
            if is_reconnecting { " (reconnected)" } else { "" }
        );

        let joined = match role {
            Role::Host => ServerMessage::JoinedAsHost {
                id: conn.clone(),
                is_reconnecting,
            },
            _ => ServerMessage::JoinedAsPlayer {
                id: conn.clone(),
                is_reconnecting,
            },
        };
        self.send_to(conn, &joined);
        self.broadcast(
            &ServerMessage::NewPlayerJoined {
                player_id: conn.clone(),
                player_name: name.clone(),
            },
            Some(conn),
        );

        // A reconnect can restore the last missing ready flag.
        self.check_all_ready();
        self.request_update(true);

        let media = Arc::clone(&self.media);
        let id = conn.clone();
        tokio::spawn(async move {
            media.participant_joined(&id, &name).await;
        });
        Ok(())
    }

    fn handle_set_ready(&mut self, conn: &ConnectionId, ready: bool) -> SessionResult<()> {
        let participant = self
            .registry
            .find_by_id_mut(conn)
            .ok_or_else(|| SessionError::phase("Set a nickname first"))?;
        participant.ready = ready;
        self.send_to(conn, &ServerMessage::ReadyStatus { ready });
        self.check_all_ready();
        self.request_update(true);
        Ok(())
    }

    fn handle_get_lobby_state(&mut self, conn: &ConnectionId) -> SessionResult<()> {
        // Participants get the broadcast below; a not-yet-joined connection
        // still deserves a direct copy.
        self.request_update(true);
        if self.registry.find_by_id(conn).is_none() && !self.registry.is_admin(conn) {
            let snapshot = self.snapshot_message();
            self.send_to(conn, &snapshot);
        }
        Ok(())
    }

    fn handle_chat(&mut self, conn: &ConnectionId, message: String) -> SessionResult<()> {
        let message = message.trim().to_string();
        if message.is_empty() {
            return Err(SessionError::validation("Message is empty"));
        }
        let sender = self
            .registry
            .find_by_id(conn)
            .ok_or_else(|| SessionError::phase("Set a nickname first"))?;
        let out = ServerMessage::ChatMessage {
            from: sender.id.clone(),
            from_name: sender.name.clone(),
            message,
            timestamp: Utc::now().timestamp_millis(),
        };
        self.broadcast(&out, Some(conn));
        Ok(())
    }

    fn handle_get_player_cards(
        &mut self,
        conn: &ConnectionId,
        player_id: &ConnectionId,
    ) -> SessionResult<()> {
        let privileged = self.registry.is_host(conn) || self.registry.is_admin(conn);
        if !privileged && conn != player_id {
            return Err(SessionError::unauthorized(
                "You can only view your own cards",
            ));
        }
        let target = self
            .registry
            .find_by_id(player_id)
            .ok_or_else(|| SessionError::not_found("Player not found"))?;
        let characteristics = target
            .characteristics
            .clone()
            .ok_or_else(|| SessionError::phase("Cards have not been dealt yet"))?;
        self.send_to(
            conn,
            &ServerMessage::PlayerCards {
                player_id: player_id.clone(),
                characteristics,
            },
        );
        Ok(())
    }

    fn handle_reveal_characteristic(
        &mut self,
        conn: &ConnectionId,
        player_id: &ConnectionId,
        category: Category,
    ) -> SessionResult<()> {
        let privileged = self.registry.is_host(conn) || self.registry.is_admin(conn);
        if !privileged && conn != player_id {
            return Err(SessionError::unauthorized(
                "You can only reveal your own characteristics",
            ));
        }
        let target = self
            .registry
            .find_by_id_mut(player_id)
            .ok_or_else(|| SessionError::not_found("Player not found"))?;
        let characteristics = target
            .characteristics
            .as_mut()
            .ok_or_else(|| SessionError::phase("Cards have not been dealt yet"))?;
        let card = characteristics
            .get_mut(&category)
            .ok_or_else(|| SessionError::not_found("Characteristic not found"))?;
        card.revealed = true;
        let card = card.clone();

        self.broadcast(
            &ServerMessage::CharacteristicRevealed {
                player_id: player_id.clone(),
                characteristic_type: category,
                card,
            },
            None,
        );
        self.scheduler.mark_dirty();
        self.request_update(true);
        Ok(())
    }

    fn handle_execute_action(
        &mut self,
        conn: &ConnectionId,
        action: ActionType,
        parameters: &ActionParameters,
    ) -> SessionResult<()> {
        self.require_host_or_admin(conn)?;
        if !self.game.started {
            return Err(SessionError::phase("Game has not started"));
        }
        self.execute_action(action, parameters)
    }

    fn handle_toggle_ban(
        &mut self,
        conn: &ConnectionId,
        player_id: &ConnectionId,
    ) -> SessionResult<()> {
        self.require_host_or_admin(conn)?;
        let target = self
            .registry
            .find_by_id(player_id)
            .ok_or_else(|| SessionError::not_found("Player not found"))?;
        if target.role == Role::Host {
            return Err(SessionError::validation("The host cannot be banned"));
        }

        let banned = if self.banned.remove(player_id) {
            false
        } else {
            self.banned.insert(player_id.clone());
            true
        };
        if banned && self.highlighted.as_ref() == Some(player_id) {
            self.highlighted = None;
        }
        tracing::info!("player {} ban toggled to {}", player_id, banned);

        self.broadcast(
            &ServerMessage::PlayerBanned {
                player_id: player_id.clone(),
                banned,
            },
            None,
        );
        // A ban pulls the player's ballot and candidacy out of the open cycle;
        // an unban only widens the expected voter set, nothing to drop.
        if banned {
            self.prune_voting_participant(player_id);
        } else {
            self.try_complete_voting();
        }
        self.scheduler.mark_dirty();
        self.request_update(true);
        Ok(())
    }

    fn handle_kick(&mut self, conn: &ConnectionId, player_id: &ConnectionId) -> SessionResult<()> {
        self.require_host_or_admin(conn)?;
        let target = self
            .registry
            .find_by_id(player_id)
            .ok_or_else(|| SessionError::not_found("Player not found"))?;
        if target.role != Role::Player {
            return Err(SessionError::validation("Only players can be kicked"));
        }

        let Some(removed) = self.registry.remove(player_id) else {
            return Err(SessionError::not_found("Player not found"));
        };
        // A kick is final; no reconnection snapshot survives it.
        self.reconnect.take(&removed.name);
        tracing::info!("{} was kicked", removed.name);

        self.broadcast(
            &ServerMessage::PlayerKicked {
                player_id: removed.id.clone(),
                player_name: removed.name.clone(),
            },
            None,
        );
        if let Some(link) = self.links.get(player_id) {
            let _ = link.send(super::Outbound::Close);
        }
        if self.highlighted.as_ref() == Some(player_id) {
            self.highlighted = None;
        }
        self.prune_voting_participant(player_id);
        self.check_all_ready();
        self.scheduler.mark_dirty();
        self.request_update(true);

        let media = Arc::clone(&self.media);
        tokio::spawn(async move {
            media.participant_left(&removed.id).await;
        });
        Ok(())
    }

    fn handle_set_mirror(&mut self, conn: &ConnectionId, mirror: bool) -> SessionResult<()> {
        let participant = self
            .registry
            .find_by_id_mut(conn)
            .ok_or_else(|| SessionError::phase("Set a nickname first"))?;
        participant.mirror_camera = mirror;
        self.scheduler.mark_dirty();
        self.request_update(false);
        Ok(())
    }

    fn handle_game_ready(&mut self, conn: &ConnectionId) -> SessionResult<()> {
        self.require_host_or_admin(conn)?;
        self.game.ready_to_start = true;
        self.broadcast(&ServerMessage::GameReady, None);
        self.scheduler.mark_dirty();
        self.request_update(true);
        Ok(())
    }

    fn handle_set_total_rounds(&mut self, conn: &ConnectionId, total: u32) -> SessionResult<()> {
        self.require_host_or_admin(conn)?;
        if total == 0 {
            return Err(SessionError::validation("Round count must be at least 1"));
        }
        self.game.total_rounds = total;
        if self.game.current_round > total {
            self.game.current_round = total;
        }
        self.broadcast(
            &ServerMessage::TotalRoundsChanged {
                total_rounds: total,
            },
            None,
        );
        self.scheduler.mark_dirty();
        self.request_update(true);
        Ok(())
    }

    fn handle_change_round(&mut self, conn: &ConnectionId, round: u32) -> SessionResult<()> {
        self.require_host_or_admin(conn)?;
        if !self.game.started {
            return Err(SessionError::phase("Game has not started"));
        }
        if round < 1 || round > self.game.total_rounds {
            return Err(SessionError::validation(format!(
                "Round must be between 1 and {}",
                self.game.total_rounds
            )));
        }
        self.game.current_round = round;
        self.highlighted = None;
        if self.voting.cancel().is_ok() {
            self.broadcast(&ServerMessage::VotingCancelled, None);
        }
        tracing::info!("round changed to {}", round);

        self.broadcast(
            &ServerMessage::RoundChanged {
                round,
                total_rounds: self.game.total_rounds,
            },
            None,
        );
        self.request_update(true);
        Ok(())
    }

    fn handle_start_voting_selection(&mut self, conn: &ConnectionId) -> SessionResult<()> {
        self.require_host(conn)?;
        if !self.game.started {
            return Err(SessionError::phase("Game has not started"));
        }
        let eligible = self.eligible_voters();
        self.voting.start_selection(eligible.len())?;
        self.scheduler.mark_dirty();
        self.request_update(true);
        Ok(())
    }

    fn handle_set_voting_candidates(
        &mut self,
        conn: &ConnectionId,
        candidates: Vec<ConnectionId>,
    ) -> SessionResult<()> {
        self.require_host(conn)?;
        let eligible = self.eligible_voters();
        self.voting
            .set_candidates(candidates, |id| eligible.contains(id))?;
        self.scheduler.mark_dirty();
        self.request_update(true);
        Ok(())
    }

    fn handle_confirm_candidates(&mut self, conn: &ConnectionId) -> SessionResult<()> {
        self.require_host(conn)?;
        self.voting.confirm_candidates()?;

        let candidates: Vec<CandidateInfo> = self
            .voting
            .candidates()
            .into_iter()
            .map(|id| CandidateInfo {
                name: self
                    .registry
                    .find_by_id(&id)
                    .map(|p| p.name.clone())
                    .unwrap_or_default(),
                id,
            })
            .collect();
        self.broadcast(&ServerMessage::VotingStarted { candidates }, None);
        // Degenerate cycles (nobody expected to vote) resolve immediately.
        self.try_complete_voting();
        self.scheduler.mark_dirty();
        self.request_update(true);
        Ok(())
    }

    fn handle_cancel_voting(&mut self, conn: &ConnectionId) -> SessionResult<()> {
        self.require_host(conn)?;
        self.voting.cancel()?;
        self.broadcast(&ServerMessage::VotingCancelled, None);
        self.scheduler.mark_dirty();
        self.request_update(true);
        Ok(())
    }

    fn handle_vote(&mut self, conn: &ConnectionId, target: &ConnectionId) -> SessionResult<()> {
        let voter = self
            .registry
            .find_by_id(conn)
            .ok_or_else(|| SessionError::phase("Set a nickname first"))?;
        if voter.role == Role::Host {
            return Err(SessionError::unauthorized("The host does not vote"));
        }
        if self.banned.contains(conn) {
            return Err(SessionError::unauthorized("Banned players cannot vote"));
        }
        self.voting.cast_vote(conn, target)?;
        self.try_complete_voting();
        self.scheduler.mark_dirty();
        self.request_update(true);
        Ok(())
    }

    fn handle_toggle_highlight(
        &mut self,
        conn: &ConnectionId,
        player_id: &ConnectionId,
    ) -> SessionResult<()> {
        self.require_host_or_admin(conn)?;
        if self.highlighted.as_ref() == Some(player_id) {
            self.highlighted = None;
        } else {
            if self.registry.find_by_id(player_id).is_none() {
                return Err(SessionError::not_found("Player not found"));
            }
            if self.banned.contains(player_id) {
                return Err(SessionError::validation(
                    "Banned players cannot be highlighted",
                ));
            }
            self.highlighted = Some(player_id.clone());
        }
        self.scheduler.mark_dirty();
        self.request_update(true);
        Ok(())
    }

    fn handle_reset_game(&mut self, conn: &ConnectionId) -> SessionResult<()> {
        self.require_host_or_admin(conn)?;
        self.reset_game();
        Ok(())
    }

    fn handle_signal(
        &mut self,
        conn: &ConnectionId,
        target_id: &ConnectionId,
        signal: serde_json::Value,
    ) -> SessionResult<()> {
        if !self.links.contains_key(target_id) {
            return Err(SessionError::not_found("Player is not online"));
        }
        let from_name = self
            .registry
            .find_by_id(conn)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        self.send_to(
            target_id,
            &ServerMessage::Signal {
                from_id: conn.clone(),
                from_name,
                signal,
                timestamp: Utc::now().timestamp_millis(),
            },
        );
        Ok(())
    }

    fn handle_refresh_connections(&mut self, conn: &ConnectionId) -> SessionResult<()> {
        self.registry
            .find_by_id(conn)
            .ok_or_else(|| SessionError::phase("Set a nickname first"))?;
        self.broadcast(
            &ServerMessage::RefreshConnectionsRequest { from: conn.clone() },
            Some(conn),
        );
        Ok(())
    }

    /// Scrub a departed or banned participant out of the open voting cycle,
    /// then re-check completion: the remaining voters may now all be in, or
    /// nobody may be left to vote for.
    pub(crate) fn prune_voting_participant(&mut self, id: &ConnectionId) {
        self.voting.remove_participant(id);
        if self.voting.phase() == VotePhase::Voting && self.voting.candidates().is_empty() {
            self.voting.clear();
            self.broadcast(&ServerMessage::VotingCancelled, None);
        }
        self.try_complete_voting();
    }

    /// Resolve the open voting cycle if every expected vote is in. Publishes
    /// the outcome, records it in the history and applies an elimination ban.
    pub(crate) fn try_complete_voting(&mut self) {
        let eligible = self.eligible_voters();
        let Some(outcome) = self.voting.complete_if_done(&eligible) else {
            return;
        };

        let results: Vec<VoteResultEntry> = outcome
            .tallies
            .iter()
            .map(|(id, votes)| VoteResultEntry {
                id: id.clone(),
                name: self
                    .registry
                    .find_by_id(id)
                    .map(|p| p.name.clone())
                    .unwrap_or_default(),
                votes: *votes,
            })
            .collect();
        self.voting_history.push(VotingHistoryEntry {
            timestamp: Utc::now().timestamp_millis(),
            results: results.clone(),
            candidates: outcome.tallies.iter().map(|(id, _)| id.clone()).collect(),
        });

        match outcome.decision {
            VoteDecision::NoElimination => {
                tracing::info!("voting finished with no votes cast");
                self.broadcast(
                    &ServerMessage::VotingCompleted {
                        results,
                        eliminated: None,
                    },
                    None,
                );
            }
            VoteDecision::Eliminated(id) => {
                tracing::info!("player {} eliminated by vote", id);
                self.banned.insert(id.clone());
                if self.highlighted.as_ref() == Some(&id) {
                    self.highlighted = None;
                }
                self.broadcast(
                    &ServerMessage::VotingCompleted {
                        results,
                        eliminated: Some(id),
                    },
                    None,
                );
            }
            VoteDecision::Tie(candidates) => {
                tracing::info!("voting tied between {} candidates", candidates.len());
                // The tie goes to the table, not the crowd: only host and
                // admin learn the split so they can rerun or decide.
                let tie = ServerMessage::VotingTie {
                    results,
                    candidates,
                };
                if let Some(host) = self.registry.host() {
                    let host_id = host.id.clone();
                    self.send_to(&host_id, &tie);
                }
                if let Some(admin) = self.registry.admin() {
                    let admin_id = admin.id.clone();
                    self.send_to(&admin_id, &tie);
                }
            }
        }
        self.scheduler.mark_dirty();
        self.request_update(true);
    }
}
