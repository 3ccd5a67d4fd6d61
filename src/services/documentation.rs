use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Avalon Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sessions::create_session,
        crate::routes::sessions::count_sessions,
        crate::routes::sessions::get_session,
        crate::routes::sessions::terminate_session,
        crate::routes::sessions::get_evil_team,
        crate::routes::sessions::get_good_team,
        crate::routes::sessions::advance,
        crate::routes::sessions::get_pending_mission,
        crate::routes::sessions::nominate_team,
        crate::routes::sessions::get_mission_team,
        crate::routes::sessions::cast_team_vote,
        crate::routes::sessions::cast_mission_vote,
        crate::routes::sessions::assassinate,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::state::VisibleGameState,
            crate::dto::game::CreateSessionRequest,
            crate::dto::game::PlayerInput,
            crate::dto::game::NominateTeamRequest,
            crate::dto::game::VoteRequest,
            crate::dto::game::VoteValue,
            crate::dto::game::AssassinationRequest,
            crate::dto::game::SessionView,
            crate::dto::game::PlayerSummary,
            crate::dto::game::RosterPlayer,
            crate::dto::game::TeamRosterResponse,
            crate::dto::game::MissionResultSummary,
            crate::dto::game::PendingMissionResponse,
            crate::dto::game::MissionTeamResponse,
            crate::dto::game::VoteResponse,
            crate::dto::game::AssassinationResponse,
            crate::dto::game::SessionCountResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sessions", description = "Session lifecycle and game actions"),
    )
)]
pub struct ApiDoc;
