use std::{collections::HashSet, time::SystemTime};

use thiserror::Error;
use uuid::Uuid;

use crate::{
    dao::models::{
        AlignmentEntity, GameStateEntity, MissionResultEntity, PlayerEntity, SessionEntity,
    },
    state::{
        rules::{self, GameRules},
        state_machine::GameState,
    },
};

/// Opaque player identifier supplied by clients.
pub type PlayerId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Good,
    Evil,
}

/// Participant of a session. Immutable once the game starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// Free-form role name; the rules only look for the protected role.
    pub role: String,
    pub alignment: Alignment,
}

/// Rosters supplied at creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameConfig {
    pub good_team: Vec<Player>,
    pub evil_team: Vec<Player>,
}

impl GameConfig {
    pub fn total_players(&self) -> usize {
        self.good_team.len() + self.evil_team.len()
    }
}

/// Outcome of a completed mission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissionResult {
    pub failed: bool,
    pub positive_votes: u32,
    pub negative_votes: u32,
}

/// Rejections raised while building a session from client rosters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    #[error("teams are not balanced by the game rules ({good} good, {evil} evil)")]
    UnbalancedTeams { good: usize, evil: usize },
    #[error("no mission team sizes are configured for {players} players")]
    UnsupportedPlayerCount { players: usize },
    #[error("player id `{0}` appears more than once")]
    DuplicatePlayer(PlayerId),
    #[error("player ids must not be blank")]
    BlankPlayerId,
}

/// Inconsistencies found when rebuilding a session from storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionDecodeError {
    #[error("session `{game_id}` orders unknown player `{player_id}`")]
    UnknownPlayer { game_id: Uuid, player_id: PlayerId },
    #[error("session `{game_id}` leader index {index} is out of range")]
    LeaderOutOfRange { game_id: Uuid, index: usize },
}

/// Aggregated state for an in-progress or concluded match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSession {
    pub id: Uuid,
    pub state: GameState,
    pub config: GameConfig,
    /// Shuffled once at creation; the order defines leader rotation.
    pub all_players: Vec<Player>,
    pub current_leader_index: usize,
    /// 1..=5, 0 before the first mission.
    pub mission_number: u8,
    /// Failed team votes for the current mission.
    pub team_picking_attempts: u32,
    pub mission_team: Vec<PlayerId>,
    pub last_mission_result: Option<MissionResult>,
    pub mission_results: Vec<MissionResult>,
    /// Set exactly once, when a terminal state is reached.
    pub endgame_reason: Option<String>,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

impl GameSession {
    /// Validate the rosters and build a fresh session.
    ///
    /// The combined roster is shuffled once and the first leader drawn
    /// uniformly from it.
    pub fn new(config: GameConfig, rules: &GameRules) -> Result<Self, SetupError> {
        let good = config.good_team.len();
        let evil = config.evil_team.len();
        if !rules::validate_team_balance(good, evil) {
            return Err(SetupError::UnbalancedTeams { good, evil });
        }
        if !rules.supports_player_count(good + evil) {
            return Err(SetupError::UnsupportedPlayerCount {
                players: good + evil,
            });
        }

        let mut seen = HashSet::new();
        for player in config.good_team.iter().chain(&config.evil_team) {
            if player.id.trim().is_empty() {
                return Err(SetupError::BlankPlayerId);
            }
            if !seen.insert(player.id.as_str()) {
                return Err(SetupError::DuplicatePlayer(player.id.clone()));
            }
        }

        let mut all_players: Vec<Player> = config
            .evil_team
            .iter()
            .chain(&config.good_team)
            .cloned()
            .collect();
        rules::shuffle_players(&mut all_players);
        let current_leader_index = rules::select_initial_leader(&all_players).unwrap_or(0);

        let timestamp = SystemTime::now();
        Ok(Self {
            id: Uuid::new_v4(),
            state: GameState::GameCreated,
            config,
            all_players,
            current_leader_index,
            mission_number: 0,
            team_picking_attempts: 0,
            mission_team: Vec::new(),
            last_mission_result: None,
            mission_results: Vec::new(),
            endgame_reason: None,
            created_at: timestamp,
            updated_at: timestamp,
        })
    }

    pub fn total_players(&self) -> usize {
        self.all_players.len()
    }

    /// Player currently allowed to nominate a mission team.
    pub fn leader(&self) -> &Player {
        &self.all_players[self.current_leader_index]
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.all_players.iter().find(|player| player.id == id)
    }

    pub fn is_on_mission_team(&self, id: &str) -> bool {
        self.mission_team.iter().any(|member| member == id)
    }

    /// Pass leadership to the next player, wrapping past the end of the roster.
    pub fn rotate_leader(&mut self) {
        self.current_leader_index = (self.current_leader_index + 1) % self.all_players.len();
    }

    pub fn successful_missions(&self) -> usize {
        self.mission_results
            .iter()
            .filter(|result| !result.failed)
            .count()
    }

    pub fn failed_missions(&self) -> usize {
        self.mission_results
            .iter()
            .filter(|result| result.failed)
            .count()
    }
}

impl From<Alignment> for AlignmentEntity {
    fn from(value: Alignment) -> Self {
        match value {
            Alignment::Good => AlignmentEntity::Good,
            Alignment::Evil => AlignmentEntity::Evil,
        }
    }
}

impl From<AlignmentEntity> for Alignment {
    fn from(value: AlignmentEntity) -> Self {
        match value {
            AlignmentEntity::Good => Alignment::Good,
            AlignmentEntity::Evil => Alignment::Evil,
        }
    }
}

impl From<Player> for PlayerEntity {
    fn from(value: Player) -> Self {
        Self {
            id: value.id,
            name: value.name,
            role: value.role,
            alignment: value.alignment.into(),
        }
    }
}

impl From<PlayerEntity> for Player {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            role: value.role,
            alignment: value.alignment.into(),
        }
    }
}

impl From<MissionResult> for MissionResultEntity {
    fn from(value: MissionResult) -> Self {
        Self {
            failed: value.failed,
            positive_votes: value.positive_votes,
            negative_votes: value.negative_votes,
        }
    }
}

impl From<MissionResultEntity> for MissionResult {
    fn from(value: MissionResultEntity) -> Self {
        Self {
            failed: value.failed,
            positive_votes: value.positive_votes,
            negative_votes: value.negative_votes,
        }
    }
}

impl From<GameState> for GameStateEntity {
    fn from(value: GameState) -> Self {
        match value {
            GameState::GameCreated => GameStateEntity::GameCreated,
            GameState::MissionTeamPicking => GameStateEntity::MissionTeamPicking,
            GameState::MissionTeamVoting => GameStateEntity::MissionTeamVoting,
            GameState::MissionSuccessVoting => GameStateEntity::MissionSuccessVoting,
            GameState::MissionEnded => GameStateEntity::MissionEnded,
            GameState::PostMissionsActions => GameStateEntity::PostMissionsActions,
            GameState::EvilTeamWon => GameStateEntity::EvilTeamWon,
            GameState::VirtuousTeamWon => GameStateEntity::VirtuousTeamWon,
        }
    }
}

impl From<GameStateEntity> for GameState {
    fn from(value: GameStateEntity) -> Self {
        match value {
            GameStateEntity::GameCreated => GameState::GameCreated,
            GameStateEntity::MissionTeamPicking => GameState::MissionTeamPicking,
            GameStateEntity::MissionTeamVoting => GameState::MissionTeamVoting,
            GameStateEntity::MissionSuccessVoting => GameState::MissionSuccessVoting,
            GameStateEntity::MissionEnded => GameState::MissionEnded,
            GameStateEntity::PostMissionsActions => GameState::PostMissionsActions,
            GameStateEntity::EvilTeamWon => GameState::EvilTeamWon,
            GameStateEntity::VirtuousTeamWon => GameState::VirtuousTeamWon,
        }
    }
}

impl From<GameSession> for SessionEntity {
    fn from(value: GameSession) -> Self {
        Self {
            id: value.id,
            state: value.state.into(),
            good_team: value.config.good_team.into_iter().map(Into::into).collect(),
            evil_team: value.config.evil_team.into_iter().map(Into::into).collect(),
            player_order: value.all_players.into_iter().map(|player| player.id).collect(),
            current_leader_index: value.current_leader_index,
            mission_number: value.mission_number,
            team_picking_attempts: value.team_picking_attempts,
            mission_team: value.mission_team,
            last_mission_result: value.last_mission_result.map(Into::into),
            mission_results: value.mission_results.into_iter().map(Into::into).collect(),
            endgame_reason: value.endgame_reason,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl TryFrom<SessionEntity> for GameSession {
    type Error = SessionDecodeError;

    fn try_from(value: SessionEntity) -> Result<Self, Self::Error> {
        let config = GameConfig {
            good_team: value.good_team.into_iter().map(Into::into).collect(),
            evil_team: value.evil_team.into_iter().map(Into::into).collect(),
        };

        let all_players = value
            .player_order
            .into_iter()
            .map(|player_id| {
                config
                    .good_team
                    .iter()
                    .chain(&config.evil_team)
                    .find(|player| player.id == player_id)
                    .cloned()
                    .ok_or(SessionDecodeError::UnknownPlayer {
                        game_id: value.id,
                        player_id,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if value.current_leader_index >= all_players.len() {
            return Err(SessionDecodeError::LeaderOutOfRange {
                game_id: value.id,
                index: value.current_leader_index,
            });
        }

        Ok(Self {
            id: value.id,
            state: value.state.into(),
            config,
            all_players,
            current_leader_index: value.current_leader_index,
            mission_number: value.mission_number,
            team_picking_attempts: value.team_picking_attempts,
            mission_team: value.mission_team,
            last_mission_result: value.last_mission_result.map(Into::into),
            mission_results: value.mission_results.into_iter().map(Into::into).collect(),
            endgame_reason: value.endgame_reason,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn player(id: &str, role: &str, alignment: Alignment) -> Player {
        Player {
            id: id.to_owned(),
            name: id.to_uppercase(),
            role: role.to_owned(),
            alignment,
        }
    }

    /// Balanced roster with `good` good players (the first one is Merlin) and
    /// `evil` evil players (the first one is the assassin).
    pub fn config(good: usize, evil: usize) -> GameConfig {
        let good_team = (0..good)
            .map(|index| {
                let role = if index == 0 { "merlin" } else { "servant" };
                player(&format!("g{index}"), role, Alignment::Good)
            })
            .collect();
        let evil_team = (0..evil)
            .map(|index| {
                let role = if index == 0 { "assassin" } else { "minion" };
                player(&format!("e{index}"), role, Alignment::Evil)
            })
            .collect();
        GameConfig {
            good_team,
            evil_team,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{fixtures::config, *};

    #[test]
    fn new_session_contains_every_player_once() {
        let session = GameSession::new(config(3, 2), &GameRules::default()).unwrap();

        assert_eq!(session.state, GameState::GameCreated);
        assert_eq!(session.mission_number, 0);
        assert_eq!(session.total_players(), 5);
        assert!(session.current_leader_index < 5);

        let mut ids: Vec<_> = session.all_players.iter().map(|p| p.id.clone()).collect();
        ids.sort();
        assert_eq!(ids, vec!["e0", "e1", "g0", "g1", "g2"]);
    }

    #[test]
    fn unbalanced_rosters_are_rejected() {
        let err = GameSession::new(config(3, 3), &GameRules::default()).unwrap_err();
        assert_eq!(err, SetupError::UnbalancedTeams { good: 3, evil: 3 });

        let err = GameSession::new(config(2, 2), &GameRules::default()).unwrap_err();
        assert_eq!(err, SetupError::UnbalancedTeams { good: 2, evil: 2 });
    }

    #[test]
    fn every_legal_balance_creates_a_session() {
        for (good, evil) in [(3, 2), (4, 2), (4, 3), (5, 3), (6, 3), (6, 4)] {
            assert!(
                GameSession::new(config(good, evil), &GameRules::default()).is_ok(),
                "({good}, {evil})"
            );
        }
    }

    #[test]
    fn duplicate_player_ids_are_rejected() {
        let mut roster = config(3, 2);
        roster.evil_team[1].id = "g1".into();

        let err = GameSession::new(roster, &GameRules::default()).unwrap_err();
        assert_eq!(err, SetupError::DuplicatePlayer("g1".into()));
    }

    #[test]
    fn blank_player_ids_are_rejected() {
        let mut roster = config(3, 2);
        roster.good_team[2].id = "  ".into();

        let err = GameSession::new(roster, &GameRules::default()).unwrap_err();
        assert_eq!(err, SetupError::BlankPlayerId);
    }

    #[test]
    fn rotation_wraps_to_the_first_player() {
        let mut session = GameSession::new(config(3, 2), &GameRules::default()).unwrap();
        session.current_leader_index = 4;
        session.rotate_leader();
        assert_eq!(session.current_leader_index, 0);
        session.rotate_leader();
        assert_eq!(session.current_leader_index, 1);
    }

    #[test]
    fn entity_round_trip_preserves_order_and_history() {
        let mut session = GameSession::new(config(4, 3), &GameRules::default()).unwrap();
        session.state = GameState::MissionEnded;
        session.mission_number = 2;
        session.mission_team = vec!["g0".into(), "e1".into(), "g3".into()];
        let result = MissionResult {
            failed: true,
            positive_votes: 2,
            negative_votes: 1,
        };
        session.last_mission_result = Some(result);
        session.mission_results = vec![result];

        let entity: SessionEntity = session.clone().into();
        let restored = GameSession::try_from(entity).unwrap();

        assert_eq!(restored, session);
    }

    #[test]
    fn entity_with_unknown_player_is_rejected() {
        let session = GameSession::new(config(3, 2), &GameRules::default()).unwrap();
        let mut entity: SessionEntity = session.into();
        entity.player_order[0] = "ghost".into();

        assert!(matches!(
            GameSession::try_from(entity),
            Err(SessionDecodeError::UnknownPlayer { .. })
        ));
    }
}
