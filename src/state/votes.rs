//! Per-game, per-round vote tallies with at-most-once recording.

use std::collections::HashSet;

use dashmap::DashMap;
use uuid::Uuid;

use crate::state::game::PlayerId;

/// Which ballot a vote belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoundKind {
    /// Whole table approves or rejects the nominated team.
    Team,
    /// Mission team members decide whether the mission succeeds.
    Mission,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    Positive,
    Negative,
}

/// Result of casting a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// First vote of this player in the round; the tally changed.
    Recorded,
    /// Player had already voted; nothing changed.
    Duplicate,
}

/// Read-only copy of a round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteCounts {
    pub positive: u32,
    pub negative: u32,
    pub voters: HashSet<PlayerId>,
}

impl VoteCounts {
    /// Net tally: positive minus negative votes.
    pub fn tally(&self) -> i32 {
        self.positive as i32 - self.negative as i32
    }

    pub fn voted_count(&self) -> usize {
        self.voters.len()
    }
}

/// Ledger change requested by a state transition, applied once the new
/// session snapshot has been persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEffect {
    None,
    /// Open a fresh round of the given kind.
    Reset(RoundKind),
    /// Drop every round of the game.
    Clear,
}

#[derive(Debug, Default)]
struct Round {
    positive: u32,
    negative: u32,
    voters: HashSet<PlayerId>,
}

/// Vote storage shared by every session handled by the process.
#[derive(Debug, Default)]
pub struct VoteLedger {
    rounds: DashMap<(Uuid, RoundKind), Round>,
}

impl VoteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `player`'s vote unless they already voted this round.
    ///
    /// The duplicate check and the tally update happen under the same entry
    /// lock, so concurrent voters never lose or double-count a ballot.
    pub fn cast_vote(&self, game: Uuid, kind: RoundKind, player: &str, vote: Vote) -> VoteOutcome {
        let mut round = self.rounds.entry((game, kind)).or_default();
        if !round.voters.insert(player.to_owned()) {
            return VoteOutcome::Duplicate;
        }
        match vote {
            Vote::Positive => round.positive += 1,
            Vote::Negative => round.negative += 1,
        }
        VoteOutcome::Recorded
    }

    pub fn tally(&self, game: Uuid, kind: RoundKind) -> i32 {
        self.counts(game, kind).tally()
    }

    pub fn voted_count(&self, game: Uuid, kind: RoundKind) -> usize {
        self.rounds
            .get(&(game, kind))
            .map_or(0, |round| round.voters.len())
    }

    /// Snapshot of a round; empty when no vote was cast yet.
    pub fn counts(&self, game: Uuid, kind: RoundKind) -> VoteCounts {
        self.rounds
            .get(&(game, kind))
            .map(|round| VoteCounts {
                positive: round.positive,
                negative: round.negative,
                voters: round.voters.clone(),
            })
            .unwrap_or_default()
    }

    /// Start a fresh round, discarding any previous ballots.
    pub fn reset(&self, game: Uuid, kind: RoundKind) {
        self.rounds.insert((game, kind), Round::default());
    }

    /// Forget every round of a game.
    pub fn clear(&self, game: Uuid) {
        self.rounds.remove(&(game, RoundKind::Team));
        self.rounds.remove(&(game, RoundKind::Mission));
    }

    /// Games that currently hold at least one round.
    pub fn games(&self) -> Vec<Uuid> {
        let mut games: Vec<_> = self.rounds.iter().map(|entry| entry.key().0).collect();
        games.sort_unstable();
        games.dedup();
        games
    }

    pub fn apply(&self, game: Uuid, effect: LedgerEffect) {
        match effect {
            LedgerEffect::None => {}
            LedgerEffect::Reset(kind) => self.reset(game, kind),
            LedgerEffect::Clear => self.clear(game),
        }
    }
}
