//! Elimination-vote sub-state-machine: the host nominates candidates, eligible
//! players vote, and the engine resolves the tally once everyone expected has
//! voted. Eligibility (connected, non-host, non-banned) is decided by the
//! session; this module owns phases, candidates and the tally.

use crate::error::{SessionError, SessionResult};
use crate::types::{ConnectionId, VotePhase};
use std::collections::{HashMap, HashSet};

/// A sole candidate's vote against themself is not expected and not counted.
/// Kept as an explicit policy switch because observed variants of this game
/// disagree on it.
pub const DISCOUNT_SOLE_CANDIDATE_SELF_VOTE: bool = true;

#[derive(Debug, Clone, PartialEq)]
pub enum VoteDecision {
    /// Nobody received a vote; no elimination.
    NoElimination,
    /// A unique top candidate; the session bans them automatically.
    Eliminated(ConnectionId),
    /// Multiple candidates tied at the top; resolution is left to the host.
    Tie(Vec<ConnectionId>),
}

#[derive(Debug, Clone)]
pub struct VoteOutcome {
    /// Tally per candidate, zeros included, in candidate-id order.
    pub tallies: Vec<(ConnectionId, u32)>,
    pub decision: VoteDecision,
}

#[derive(Default)]
pub struct VotingEngine {
    phase: VotePhase,
    candidates: HashSet<ConnectionId>,
    votes: HashMap<ConnectionId, ConnectionId>,
}

impl VotingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> VotePhase {
        self.phase
    }

    pub fn candidates(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.candidates.iter().cloned().collect();
        ids.sort();
        ids
    }

    pub fn votes_cast(&self) -> usize {
        self.votes.len()
    }

    pub fn start_selection(&mut self, eligible_count: usize) -> SessionResult<()> {
        if self.phase != VotePhase::None {
            return Err(SessionError::phase("Voting is already in progress"));
        }
        if eligible_count < 2 {
            return Err(SessionError::validation(
                "Need at least 2 eligible players to start voting",
            ));
        }
        self.clear();
        self.phase = VotePhase::Selecting;
        Ok(())
    }

    /// Replace the candidate set. `eligible` filters out ids the session does
    /// not accept (host, banned, not connected). The host may call this
    /// repeatedly while selecting.
    pub fn set_candidates(
        &mut self,
        ids: Vec<ConnectionId>,
        eligible: impl Fn(&ConnectionId) -> bool,
    ) -> SessionResult<()> {
        if self.phase != VotePhase::Selecting {
            return Err(SessionError::phase("Candidate selection is not active"));
        }
        self.candidates = ids.into_iter().filter(|id| eligible(id)).collect();
        Ok(())
    }

    pub fn confirm_candidates(&mut self) -> SessionResult<()> {
        if self.phase != VotePhase::Selecting {
            return Err(SessionError::phase("Candidate selection is not active"));
        }
        if self.candidates.is_empty() {
            return Err(SessionError::validation("No candidates selected"));
        }
        self.phase = VotePhase::Voting;
        Ok(())
    }

    pub fn cancel(&mut self) -> SessionResult<()> {
        if self.phase == VotePhase::None {
            return Err(SessionError::phase("No voting in progress"));
        }
        self.clear();
        Ok(())
    }

    pub fn cast_vote(&mut self, voter: &ConnectionId, target: &ConnectionId) -> SessionResult<()> {
        if self.phase != VotePhase::Voting {
            return Err(SessionError::phase("Voting is not open"));
        }
        if self.votes.contains_key(voter) {
            return Err(SessionError::validation("You have already voted"));
        }
        if !self.candidates.contains(target) {
            return Err(SessionError::validation("Target is not a candidate"));
        }
        self.votes.insert(voter.clone(), target.clone());
        Ok(())
    }

    /// Drop every trace of a departed or banned participant: their ballot,
    /// their candidacy, and any ballots cast for them (those voters may vote
    /// again). Keeps the ballot map restricted to live eligible voters.
    pub fn remove_participant(&mut self, id: &ConnectionId) {
        if self.phase == VotePhase::None {
            return;
        }
        self.votes.remove(id);
        if self.candidates.remove(id) {
            self.votes.retain(|_, target| target != id);
        }
    }

    /// Resolve the cycle once every expected voter has voted. With a sole
    /// candidate, that candidate is neither expected to vote nor counted if
    /// they did. Returns `None` while votes are still outstanding; on `Some`
    /// all voting substate is cleared.
    pub fn complete_if_done(&mut self, eligible_voters: &HashSet<ConnectionId>) -> Option<VoteOutcome> {
        if self.phase != VotePhase::Voting {
            return None;
        }

        let sole_candidate = if DISCOUNT_SOLE_CANDIDATE_SELF_VOTE && self.candidates.len() == 1 {
            self.candidates.iter().next().cloned()
        } else {
            None
        };

        let all_voted = eligible_voters
            .iter()
            .filter(|id| Some(*id) != sole_candidate.as_ref())
            .all(|id| self.votes.contains_key(id));
        if !all_voted {
            return None;
        }

        let mut effective: HashMap<&ConnectionId, u32> = HashMap::new();
        for (voter, target) in &self.votes {
            if sole_candidate.as_ref() == Some(target) && voter == target {
                continue;
            }
            *effective.entry(target).or_insert(0) += 1;
        }

        let mut tallies: Vec<(ConnectionId, u32)> = self
            .candidates
            .iter()
            .map(|id| (id.clone(), effective.get(id).copied().unwrap_or(0)))
            .collect();
        tallies.sort_by(|a, b| a.0.cmp(&b.0));

        let max = tallies.iter().map(|(_, n)| *n).max().unwrap_or(0);
        let decision = if max == 0 {
            VoteDecision::NoElimination
        } else {
            let top: Vec<_> = tallies
                .iter()
                .filter(|(_, n)| *n == max)
                .map(|(id, _)| id.clone())
                .collect();
            if top.len() == 1 {
                VoteDecision::Eliminated(top[0].clone())
            } else {
                VoteDecision::Tie(top)
            }
        };

        self.clear();
        Some(VoteOutcome { tallies, decision })
    }

    /// Drop all voting substate; used on cancel, resolution, round change and
    /// session reset.
    pub fn clear(&mut self) {
        self.phase = VotePhase::None;
        self.candidates.clear();
        self.votes.clear();
    }
}
