use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{GameStateEntity, MissionResultEntity, PlayerEntity, SessionEntity};

/// Session layout inside the `avalon_sessions` collection.
///
/// The identifier is stored in its hyphenated string form so that lookups by
/// `_id` do not depend on the driver's UUID representation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSessionDocument {
    #[serde(rename = "_id")]
    id: String,
    state: GameStateEntity,
    good_team: Vec<PlayerEntity>,
    evil_team: Vec<PlayerEntity>,
    player_order: Vec<String>,
    current_leader_index: u32,
    mission_number: u8,
    team_picking_attempts: u32,
    mission_team: Vec<String>,
    last_mission_result: Option<MissionResultEntity>,
    #[serde(default)]
    mission_results: Vec<MissionResultEntity>,
    endgame_reason: Option<String>,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<SessionEntity> for MongoSessionDocument {
    fn from(value: SessionEntity) -> Self {
        Self {
            id: value.id.to_string(),
            state: value.state,
            good_team: value.good_team,
            evil_team: value.evil_team,
            player_order: value.player_order,
            current_leader_index: value.current_leader_index as u32,
            mission_number: value.mission_number,
            team_picking_attempts: value.team_picking_attempts,
            mission_team: value.mission_team,
            last_mission_result: value.last_mission_result,
            mission_results: value.mission_results,
            endgame_reason: value.endgame_reason,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl TryFrom<MongoSessionDocument> for SessionEntity {
    type Error = uuid::Error;

    fn try_from(value: MongoSessionDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&value.id)?,
            state: value.state,
            good_team: value.good_team,
            evil_team: value.evil_team,
            player_order: value.player_order,
            current_leader_index: value.current_leader_index as usize,
            mission_number: value.mission_number,
            team_picking_attempts: value.team_picking_attempts,
            mission_team: value.mission_team,
            last_mission_result: value.last_mission_result,
            mission_results: value.mission_results,
            endgame_reason: value.endgame_reason,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        })
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use mongodb::bson;

    use super::*;

    fn entity(id: Uuid) -> SessionEntity {
        let now = SystemTime::now();
        SessionEntity {
            id,
            state: GameStateEntity::MissionEnded,
            good_team: Vec::new(),
            evil_team: Vec::new(),
            player_order: vec!["a".into(), "b".into()],
            current_leader_index: 1,
            mission_number: 2,
            team_picking_attempts: 0,
            mission_team: Vec::new(),
            last_mission_result: None,
            mission_results: Vec::new(),
            endgame_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn identifier_is_stored_as_a_string() {
        let id = Uuid::new_v4();
        let document = bson::serialize_to_document(&MongoSessionDocument::from(entity(id))).unwrap();

        assert_eq!(document.get_str("_id").unwrap(), id.to_string());
        assert_eq!(doc_id(id).get_str("_id").unwrap(), id.to_string());
    }

    #[test]
    fn malformed_identifier_is_rejected() {
        let mut document = MongoSessionDocument::from(entity(Uuid::new_v4()));
        document.id = "not-a-uuid".into();
        assert!(SessionEntity::try_from(document).is_err());
    }
}
