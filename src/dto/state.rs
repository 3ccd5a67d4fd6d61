use serde::Serialize;
use utoipa::ToSchema;

use crate::state::state_machine::GameState;

/// Session state exposed to clients.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisibleGameState {
    GameCreated,
    MissionTeamPicking,
    MissionTeamVoting,
    MissionSuccessVoting,
    MissionEnded,
    PostMissionsActions,
    EvilTeamWon,
    VirtuousTeamWon,
}

impl From<GameState> for VisibleGameState {
    fn from(value: GameState) -> Self {
        match value {
            GameState::GameCreated => VisibleGameState::GameCreated,
            GameState::MissionTeamPicking => VisibleGameState::MissionTeamPicking,
            GameState::MissionTeamVoting => VisibleGameState::MissionTeamVoting,
            GameState::MissionSuccessVoting => VisibleGameState::MissionSuccessVoting,
            GameState::MissionEnded => VisibleGameState::MissionEnded,
            GameState::PostMissionsActions => VisibleGameState::PostMissionsActions,
            GameState::EvilTeamWon => VisibleGameState::EvilTeamWon,
            GameState::VirtuousTeamWon => VisibleGameState::VirtuousTeamWon,
        }
    }
}
