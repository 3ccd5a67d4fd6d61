use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Side a player was enrolled on when the session was created.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentEntity {
    Good,
    Evil,
}

/// Player as persisted inside a session document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Opaque player identifier, unique within the session.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Free-form role name (e.g. "merlin", "assassin").
    pub role: String,
    /// Roster the player belongs to.
    pub alignment: AlignmentEntity,
}

/// Persisted state of the session state machine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStateEntity {
    GameCreated,
    MissionTeamPicking,
    MissionTeamVoting,
    MissionSuccessVoting,
    MissionEnded,
    PostMissionsActions,
    EvilTeamWon,
    VirtuousTeamWon,
}

/// Outcome of a completed mission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MissionResultEntity {
    pub failed: bool,
    pub positive_votes: u32,
    pub negative_votes: u32,
}

/// Aggregate session entity persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionEntity {
    /// Primary key of the session.
    pub id: Uuid,
    /// Current state machine state.
    pub state: GameStateEntity,
    /// Good-aligned roster as submitted at creation.
    pub good_team: Vec<PlayerEntity>,
    /// Evil-aligned roster as submitted at creation.
    pub evil_team: Vec<PlayerEntity>,
    /// Shuffled identifiers of every player, defining leader rotation.
    pub player_order: Vec<String>,
    /// Index into `player_order` of the current leader.
    pub current_leader_index: usize,
    /// Current mission number (0 before the first mission).
    pub mission_number: u8,
    /// Failed team votes for the current mission.
    pub team_picking_attempts: u32,
    /// Identifiers of the nominated mission team.
    pub mission_team: Vec<String>,
    /// Result of the latest completed mission.
    pub last_mission_result: Option<MissionResultEntity>,
    /// Every completed mission result, in order.
    #[serde(default)]
    pub mission_results: Vec<MissionResultEntity>,
    /// Why the game ended, once it has.
    pub endgame_reason: Option<String>,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last time the session entity was updated.
    pub updated_at: SystemTime,
}
