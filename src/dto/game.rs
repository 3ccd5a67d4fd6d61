use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{
    dto::{
        format_system_time,
        state::VisibleGameState,
        validation::{validate_player_id, validate_player_ids},
    },
    state::{
        game::{Alignment, GameConfig, GameSession, MissionResult, Player},
        votes::Vote,
    },
};

/// Payload used to create a new session from two rosters.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateSessionRequest {
    #[validate(nested)]
    pub good_team: Vec<PlayerInput>,
    #[validate(nested)]
    pub evil_team: Vec<PlayerInput>,
}

/// Player supplied at session creation.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PlayerInput {
    pub id: String,
    pub name: String,
    /// Free-form role, e.g. `merlin`, `assassin`, `servant`, `minion`.
    pub role: String,
}

impl Validate for PlayerInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_player_id(&self.id) {
            errors.add("id", e);
        }
        if self.name.trim().is_empty() {
            errors.add("name", validator::ValidationError::new("name_blank"));
        }
        if self.role.trim().is_empty() {
            errors.add("role", validator::ValidationError::new("role_blank"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl CreateSessionRequest {
    pub fn into_config(self) -> GameConfig {
        let build = |players: Vec<PlayerInput>, alignment| {
            players
                .into_iter()
                .map(|player| Player {
                    id: player.id,
                    name: player.name,
                    role: player.role,
                    alignment,
                })
                .collect()
        };
        GameConfig {
            good_team: build(self.good_team, Alignment::Good),
            evil_team: build(self.evil_team, Alignment::Evil),
        }
    }
}

/// The current leader proposes a mission team.
#[derive(Debug, Deserialize, ToSchema)]
pub struct NominateTeamRequest {
    pub leader_id: String,
    pub members: Vec<String>,
}

impl Validate for NominateTeamRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_player_id(&self.leader_id) {
            errors.add("leader_id", e);
        }
        if let Err(e) = validate_player_ids(&self.members) {
            errors.add("members", e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Ballot value sent by clients.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VoteValue {
    Positive,
    Negative,
}

impl From<VoteValue> for Vote {
    fn from(value: VoteValue) -> Self {
        match value {
            VoteValue::Positive => Vote::Positive,
            VoteValue::Negative => Vote::Negative,
        }
    }
}

/// A single team or mission ballot.
#[derive(Debug, Deserialize, ToSchema)]
pub struct VoteRequest {
    pub player_id: String,
    pub vote: VoteValue,
}

impl Validate for VoteRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_player_id(&self.player_id) {
            errors.add("player_id", e);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// The evil team names who it believes holds the protected role.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AssassinationRequest {
    pub accuser_id: String,
    pub target_id: String,
}

impl Validate for AssassinationRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_player_id(&self.accuser_id) {
            errors.add("accuser_id", e);
        }
        if let Err(e) = validate_player_id(&self.target_id) {
            errors.add("target_id", e);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Public projection of a player; roles stay hidden.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerSummary {
    pub id: String,
    pub name: String,
}

/// Player with its role, returned by the roster endpoints.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RosterPlayer {
    pub id: String,
    pub name: String,
    pub role: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TeamRosterResponse {
    pub players: Vec<RosterPlayer>,
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema, PartialEq, Eq)]
pub struct MissionResultSummary {
    pub failed: bool,
    pub positive_votes: u32,
    pub negative_votes: u32,
}

/// Public view of a session.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionView {
    pub id: Uuid,
    pub state: VisibleGameState,
    /// Seating order; leadership rotates through it.
    pub players: Vec<PlayerSummary>,
    pub current_leader_id: String,
    pub mission_number: u8,
    pub team_picking_attempts: u32,
    pub mission_team: Vec<String>,
    pub last_mission_result: Option<MissionResultSummary>,
    pub mission_results: Vec<MissionResultSummary>,
    pub successful_missions: usize,
    pub failed_missions: usize,
    pub endgame_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Mission currently being played.
#[derive(Debug, Serialize, ToSchema)]
pub struct PendingMissionResponse {
    pub mission_number: u8,
    pub team_size: usize,
    /// Negative mission votes needed to sabotage the mission.
    pub fail_votes_required: usize,
    pub leader_id: String,
    pub team_picking_attempts: u32,
    pub max_team_picking_attempts: u32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MissionTeamResponse {
    pub mission_number: u8,
    pub members: Vec<String>,
}

/// Outcome of a ballot. Repeated votes are accepted but not counted.
#[derive(Debug, Serialize, ToSchema)]
pub struct VoteResponse {
    /// False when the player had already voted in this round.
    pub recorded: bool,
    pub voted_count: usize,
    /// Ballots needed before the round can be closed.
    pub required: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssassinationResponse {
    pub session: SessionView,
    pub protected_player_killed: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionCountResponse {
    pub count: u64,
}

impl From<&Player> for PlayerSummary {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id.clone(),
            name: player.name.clone(),
        }
    }
}

impl From<Player> for RosterPlayer {
    fn from(player: Player) -> Self {
        Self {
            id: player.id,
            name: player.name,
            role: player.role,
        }
    }
}

impl From<MissionResult> for MissionResultSummary {
    fn from(result: MissionResult) -> Self {
        Self {
            failed: result.failed,
            positive_votes: result.positive_votes,
            negative_votes: result.negative_votes,
        }
    }
}

impl From<GameSession> for SessionView {
    fn from(session: GameSession) -> Self {
        let successful_missions = session.successful_missions();
        let failed_missions = session.failed_missions();
        let current_leader_id = session.leader().id.clone();

        Self {
            id: session.id,
            state: session.state.into(),
            players: session.all_players.iter().map(Into::into).collect(),
            current_leader_id,
            mission_number: session.mission_number,
            team_picking_attempts: session.team_picking_attempts,
            mission_team: session.mission_team,
            last_mission_result: session.last_mission_result.map(Into::into),
            mission_results: session.mission_results.into_iter().map(Into::into).collect(),
            successful_missions,
            failed_missions,
            endgame_reason: session.endgame_reason,
            created_at: format_system_time(session.created_at),
            updated_at: format_system_time(session.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(id: &str) -> PlayerInput {
        PlayerInput {
            id: id.into(),
            name: id.to_uppercase(),
            role: "servant".into(),
        }
    }

    #[test]
    fn nested_player_errors_fail_the_request() {
        let request = CreateSessionRequest {
            good_team: vec![input("a"), input(" ")],
            evil_team: vec![input("b")],
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn rosters_keep_their_alignment() {
        let request = CreateSessionRequest {
            good_team: vec![input("a"), input("b")],
            evil_team: vec![input("c")],
        };
        let config = request.into_config();
        assert!(config.good_team.iter().all(|p| p.alignment == Alignment::Good));
        assert_eq!(config.evil_team[0].alignment, Alignment::Evil);
    }

    #[test]
    fn nomination_rejects_repeated_members() {
        let request = NominateTeamRequest {
            leader_id: "a".into(),
            members: vec!["b".into(), "b".into()],
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("members"));
    }

    #[test]
    fn votes_deserialize_from_snake_case() {
        let request: VoteRequest =
            serde_json::from_str(r#"{"player_id":"a","vote":"negative"}"#).unwrap();
        assert_eq!(request.vote, VoteValue::Negative);
        assert!(request.validate().is_ok());
    }
}
