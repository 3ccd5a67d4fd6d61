use std::{collections::HashSet, fmt};

use thiserror::Error;

use crate::state::{
    game::{Alignment, GameSession, MissionResult, PlayerId},
    rules::{self, GameRules, MISSIONS_TO_DECIDE},
    votes::{LedgerEffect, RoundKind, VoteCounts},
};

/// Reason recorded when the table rejects too many team nominations.
pub const REASON_TEAM_PICKING_EXHAUSTED: &str = "team picking attempts exhausted";
/// Reason recorded when the evil team sabotages enough missions.
pub const REASON_MISSIONS_FAILED: &str = "three missions failed";
/// Reason recorded when the assassin finds the protected player.
pub const REASON_PROTECTED_KILLED: &str = "the assassin killed the protected player";
/// Reason recorded when the assassin misses.
pub const REASON_PROTECTED_SURVIVED: &str =
    "all missions completed and the assassin missed the protected player";

/// Phases a session moves through, in play order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameState {
    /// Rosters accepted; no mission started yet.
    GameCreated,
    /// The leader chooses the mission team.
    MissionTeamPicking,
    /// Every player approves or rejects the nominated team.
    MissionTeamVoting,
    /// Mission team members vote for success or sabotage.
    MissionSuccessVoting,
    /// The mission outcome is recorded; the next advance decides what follows.
    MissionEnded,
    /// Three missions succeeded; the assassin may strike.
    PostMissionsActions,
    EvilTeamWon,
    VirtuousTeamWon,
}

impl GameState {
    pub fn is_terminal(self) -> bool {
        matches!(self, GameState::EvilTeamWon | GameState::VirtuousTeamWon)
    }

    /// Ballot accepted in this state, if any.
    pub fn voting_round(self) -> Option<RoundKind> {
        match self {
            GameState::MissionTeamVoting => Some(RoundKind::Team),
            GameState::MissionSuccessVoting => Some(RoundKind::Mission),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GameState::GameCreated => "GAME_CREATED",
            GameState::MissionTeamPicking => "MISSION_TEAM_PICKING",
            GameState::MissionTeamVoting => "MISSION_TEAM_VOTING",
            GameState::MissionSuccessVoting => "MISSION_SUCCESS_VOTING",
            GameState::MissionEnded => "MISSION_ENDED",
            GameState::PostMissionsActions => "POST_MISSIONS_ACTIONS",
            GameState::EvilTeamWon => "EVIL_TEAM_WON",
            GameState::VirtuousTeamWon => "VIRTUOUS_TEAM_WON",
        }
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Actions that change a session snapshot. Votes only touch the ledger and
/// go through [`GameStateMachine::authorize_vote`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// Move to the next phase using the stored snapshot and the ledger.
    Advance,
    /// The leader proposes the mission team.
    NominateTeam {
        leader: PlayerId,
        members: Vec<PlayerId>,
    },
    /// The evil team names its guess for the protected player.
    Assassinate { accuser: PlayerId, target: PlayerId },
}

impl GameEvent {
    fn action(&self) -> &'static str {
        match self {
            GameEvent::Advance => "advance",
            GameEvent::NominateTeam { .. } => "nominate team",
            GameEvent::Assassinate { .. } => "assassinate",
        }
    }
}

/// Rule checks that failed although the action is legal in the current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("team not assigned")]
    TeamNotAssigned,
    #[error("team not yet nominated")]
    TeamNotNominated,
    #[error("incomplete voting: {voted} of {required} votes cast")]
    IncompleteVoting { voted: usize, required: usize },
    #[error("player `{0}` is not the current leader")]
    NotLeader(PlayerId),
    #[error("mission {mission} needs a team of {expected}, got {actual}")]
    TeamSizeMismatch {
        mission: u8,
        expected: usize,
        actual: usize,
    },
    #[error("player `{0}` is not part of this game")]
    UnknownPlayer(PlayerId),
    #[error("player `{0}` is nominated more than once")]
    DuplicateMember(PlayerId),
    #[error("player `{0}` is not on the mission team")]
    NotOnMissionTeam(PlayerId),
    #[error("player `{0}` is not on the evil team")]
    NotEvil(PlayerId),
    #[error("no team size configured for mission {mission} with {players} players")]
    NoTeamSize { mission: u8, players: usize },
    #[error("no mission in progress")]
    NoMission,
}

/// Errors returned when planning an action against a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The action is not legal in the current state.
    #[error("{action} is not allowed while in {from}")]
    InvalidTransition { from: GameState, action: &'static str },
    /// The game already reached a terminal state.
    #[error("game already concluded")]
    Concluded { state: GameState },
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
}

/// A validated transition that has not been persisted yet.
///
/// The caller stores `session` first and applies `ledger` only after the
/// write succeeded, so a failed write leaves both untouched.
#[derive(Debug, Clone)]
pub struct Plan {
    pub from: GameState,
    pub to: GameState,
    pub event: GameEvent,
    /// Snapshot to persist.
    pub session: GameSession,
    pub ledger: LedgerEffect,
    /// False when the event was accepted but nothing needs to be written.
    pub changed: bool,
}

/// Pure planner for session transitions.
#[derive(Debug, Clone, Copy)]
pub struct GameStateMachine<'a> {
    rules: &'a GameRules,
}

impl<'a> GameStateMachine<'a> {
    pub fn new(rules: &'a GameRules) -> Self {
        Self { rules }
    }

    /// Validate `event` against `session` and compute the resulting snapshot.
    ///
    /// `counts` must hold the ledger round matching `session.state` (empty
    /// when the state has no ballot).
    pub fn plan(
        &self,
        session: &GameSession,
        event: GameEvent,
        counts: &VoteCounts,
    ) -> Result<Plan, TransitionError> {
        let mut next = session.clone();
        let ledger = match &event {
            GameEvent::Advance => self.advance(&mut next, counts)?,
            GameEvent::NominateTeam { leader, members } => {
                self.nominate(&mut next, leader, members)?
            }
            GameEvent::Assassinate { accuser, target } => {
                self.assassinate(&mut next, accuser, target)?
            }
        };

        let changed = next != *session || ledger != LedgerEffect::None;
        Ok(Plan {
            from: session.state,
            to: next.state,
            event,
            session: next,
            ledger,
            changed,
        })
    }

    /// Check that `player` may cast a ballot of `kind` right now.
    pub fn authorize_vote(
        &self,
        session: &GameSession,
        kind: RoundKind,
        player: &str,
    ) -> Result<(), TransitionError> {
        if session.state.is_terminal() {
            return Err(TransitionError::Concluded {
                state: session.state,
            });
        }
        if session.state.voting_round() != Some(kind) {
            let action = match kind {
                RoundKind::Team => "cast team vote",
                RoundKind::Mission => "cast mission vote",
            };
            return Err(TransitionError::InvalidTransition {
                from: session.state,
                action,
            });
        }
        if session.mission_team.is_empty() {
            return Err(PreconditionError::TeamNotNominated.into());
        }

        match kind {
            RoundKind::Team if session.player(player).is_none() => {
                Err(PreconditionError::UnknownPlayer(player.to_owned()).into())
            }
            RoundKind::Mission if !session.is_on_mission_team(player) => {
                Err(PreconditionError::NotOnMissionTeam(player.to_owned()).into())
            }
            _ => Ok(()),
        }
    }

    fn advance(
        &self,
        session: &mut GameSession,
        counts: &VoteCounts,
    ) -> Result<LedgerEffect, TransitionError> {
        match session.state {
            GameState::GameCreated => {
                session.mission_number = 1;
                session.team_picking_attempts = 0;
                session.state = GameState::MissionTeamPicking;
                Ok(LedgerEffect::None)
            }
            GameState::MissionTeamPicking => {
                if session.mission_team.is_empty() {
                    return Err(PreconditionError::TeamNotAssigned.into());
                }
                session.state = GameState::MissionTeamVoting;
                Ok(LedgerEffect::Reset(RoundKind::Team))
            }
            GameState::MissionTeamVoting => {
                let required = session.total_players();
                if counts.voted_count() != required {
                    return Err(PreconditionError::IncompleteVoting {
                        voted: counts.voted_count(),
                        required,
                    }
                    .into());
                }

                if counts.tally() > 0 {
                    session.state = GameState::MissionSuccessVoting;
                    return Ok(LedgerEffect::Reset(RoundKind::Mission));
                }

                session.team_picking_attempts += 1;
                if session.team_picking_attempts >= self.rules.max_team_picking_attempts {
                    session.state = GameState::EvilTeamWon;
                    session.endgame_reason = Some(REASON_TEAM_PICKING_EXHAUSTED.to_owned());
                    return Ok(LedgerEffect::Clear);
                }

                session.rotate_leader();
                session.mission_team.clear();
                session.state = GameState::MissionTeamPicking;
                Ok(LedgerEffect::Reset(RoundKind::Team))
            }
            GameState::MissionSuccessVoting => {
                let team_size = session.mission_team.len();
                if counts.voted_count() != team_size {
                    return Err(PreconditionError::IncompleteVoting {
                        voted: counts.voted_count(),
                        required: team_size,
                    }
                    .into());
                }

                let fail_votes = team_size.saturating_sub(counts.positive as usize);
                let threshold =
                    rules::fail_votes_required(session.mission_number, session.total_players());
                let result = MissionResult {
                    failed: fail_votes >= threshold,
                    positive_votes: (team_size - fail_votes) as u32,
                    negative_votes: fail_votes as u32,
                };
                session.last_mission_result = Some(result);
                session.mission_results.push(result);
                session.state = GameState::MissionEnded;
                Ok(LedgerEffect::Clear)
            }
            GameState::MissionEnded => {
                if session.failed_missions() >= MISSIONS_TO_DECIDE {
                    session.state = GameState::EvilTeamWon;
                    session.endgame_reason = Some(REASON_MISSIONS_FAILED.to_owned());
                } else if session.successful_missions() >= MISSIONS_TO_DECIDE {
                    session.state = GameState::PostMissionsActions;
                } else {
                    session.mission_number += 1;
                    session.team_picking_attempts = 0;
                    session.mission_team.clear();
                    session.rotate_leader();
                    session.state = GameState::MissionTeamPicking;
                }
                Ok(LedgerEffect::None)
            }
            GameState::PostMissionsActions | GameState::EvilTeamWon | GameState::VirtuousTeamWon => {
                Ok(LedgerEffect::None)
            }
        }
    }

    fn nominate(
        &self,
        session: &mut GameSession,
        leader: &str,
        members: &[PlayerId],
    ) -> Result<LedgerEffect, TransitionError> {
        self.require_state(session, GameState::MissionTeamPicking, "nominate team")?;

        if session.leader().id != leader {
            return Err(PreconditionError::NotLeader(leader.to_owned()).into());
        }

        let players = session.total_players();
        let expected = self
            .rules
            .mission_team_size(players, session.mission_number)
            .ok_or(PreconditionError::NoTeamSize {
                mission: session.mission_number,
                players,
            })?;
        if members.len() != expected {
            return Err(PreconditionError::TeamSizeMismatch {
                mission: session.mission_number,
                expected,
                actual: members.len(),
            }
            .into());
        }

        let mut seen = HashSet::new();
        for member in members {
            if session.player(member).is_none() {
                return Err(PreconditionError::UnknownPlayer(member.clone()).into());
            }
            if !seen.insert(member.as_str()) {
                return Err(PreconditionError::DuplicateMember(member.clone()).into());
            }
        }

        session.mission_team = members.to_vec();
        Ok(LedgerEffect::None)
    }

    fn assassinate(
        &self,
        session: &mut GameSession,
        accuser: &str,
        target: &str,
    ) -> Result<LedgerEffect, TransitionError> {
        self.require_state(session, GameState::PostMissionsActions, "assassinate")?;

        match session.player(accuser) {
            Some(player) if player.alignment == Alignment::Evil => {}
            Some(_) => return Err(PreconditionError::NotEvil(accuser.to_owned()).into()),
            None => return Err(PreconditionError::UnknownPlayer(accuser.to_owned()).into()),
        }
        let target = session
            .player(target)
            .ok_or_else(|| PreconditionError::UnknownPlayer(target.to_owned()))?;

        if self.rules.is_protected_role(&target.role) {
            session.state = GameState::EvilTeamWon;
            session.endgame_reason = Some(REASON_PROTECTED_KILLED.to_owned());
        } else {
            session.state = GameState::VirtuousTeamWon;
            session.endgame_reason = Some(REASON_PROTECTED_SURVIVED.to_owned());
        }
        Ok(LedgerEffect::Clear)
    }

    fn require_state(
        &self,
        session: &GameSession,
        expected: GameState,
        action: &'static str,
    ) -> Result<(), TransitionError> {
        if session.state.is_terminal() {
            return Err(TransitionError::Concluded {
                state: session.state,
            });
        }
        if session.state != expected {
            return Err(TransitionError::InvalidTransition {
                from: session.state,
                action,
            });
        }
        Ok(())
    }
}

impl Plan {
    /// Whether an assassination plan hit the protected player.
    pub fn protected_player_killed(&self) -> bool {
        matches!(self.event, GameEvent::Assassinate { .. }) && self.to == GameState::EvilTeamWon
    }

    pub fn action(&self) -> &'static str {
        self.event.action()
    }
}
