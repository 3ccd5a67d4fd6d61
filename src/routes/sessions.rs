use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::game::{
        AssassinationRequest, AssassinationResponse, CreateSessionRequest, MissionTeamResponse,
        NominateTeamRequest, PendingMissionResponse, SessionCountResponse, SessionView,
        TeamRosterResponse, VoteRequest, VoteResponse,
    },
    error::AppError,
    services::game_service,
    state::SharedState,
};

/// Session lifecycle and in-game actions.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/count", get(count_sessions))
        .route(
            "/sessions/{id}",
            get(get_session).delete(terminate_session),
        )
        .route("/sessions/{id}/teams/evil", get(get_evil_team))
        .route("/sessions/{id}/teams/good", get(get_good_team))
        .route("/sessions/{id}/advance", post(advance))
        .route("/sessions/{id}/mission", get(get_pending_mission))
        .route(
            "/sessions/{id}/mission/team",
            get(get_mission_team).put(nominate_team),
        )
        .route("/sessions/{id}/votes/team", post(cast_team_vote))
        .route("/sessions/{id}/votes/mission", post(cast_mission_vote))
        .route("/sessions/{id}/assassination", post(assassinate))
}

/// Create a session from a good and an evil roster.
#[utoipa::path(
    post,
    path = "/sessions",
    tag = "sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created", body = SessionView),
        (status = 400, description = "Illegal team balance or malformed roster"),
        (status = 503, description = "Session store unavailable")
    )
)]
pub async fn create_session(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateSessionRequest>>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let view = game_service::create_session(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Number of live sessions.
#[utoipa::path(
    get,
    path = "/sessions/count",
    tag = "sessions",
    responses((status = 200, description = "Live session count", body = SessionCountResponse))
)]
pub async fn count_sessions(
    State(state): State<SharedState>,
) -> Result<Json<SessionCountResponse>, AppError> {
    Ok(Json(game_service::count_sessions(&state).await?))
}

/// Public view of a session; roles are not included.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Session found", body = SessionView),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(game_service::get_session(&state, id).await?))
}

/// Delete a session and its ballots.
#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = 204, description = "Session terminated"),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn terminate_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    game_service::terminate_session(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/sessions/{id}/teams/evil",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session identifier")),
    responses((status = 200, description = "Evil roster with roles", body = TeamRosterResponse))
)]
pub async fn get_evil_team(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TeamRosterResponse>, AppError> {
    Ok(Json(game_service::get_evil_team(&state, id).await?))
}

#[utoipa::path(
    get,
    path = "/sessions/{id}/teams/good",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session identifier")),
    responses((status = 200, description = "Good roster with roles", body = TeamRosterResponse))
)]
pub async fn get_good_team(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TeamRosterResponse>, AppError> {
    Ok(Json(game_service::get_good_team(&state, id).await?))
}

/// Move the session to its next phase.
#[utoipa::path(
    post,
    path = "/sessions/{id}/advance",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Session after the transition", body = SessionView),
        (status = 404, description = "Unknown session"),
        (status = 412, description = "Team missing or voting incomplete"),
        (status = 503, description = "Session store unavailable; nothing changed")
    )
)]
pub async fn advance(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(game_service::advance(&state, id).await?))
}

#[utoipa::path(
    get,
    path = "/sessions/{id}/mission",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Mission in progress", body = PendingMissionResponse),
        (status = 412, description = "No mission started yet")
    )
)]
pub async fn get_pending_mission(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PendingMissionResponse>, AppError> {
    Ok(Json(game_service::get_pending_mission(&state, id).await?))
}

/// Nominate the mission team. Only the current leader may call this.
#[utoipa::path(
    put,
    path = "/sessions/{id}/mission/team",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session identifier")),
    request_body = NominateTeamRequest,
    responses(
        (status = 200, description = "Team recorded", body = SessionView),
        (status = 409, description = "Not in team picking"),
        (status = 412, description = "Not the leader, wrong size or unknown player")
    )
)]
pub async fn nominate_team(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<NominateTeamRequest>>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(game_service::nominate_team(&state, id, payload).await?))
}

#[utoipa::path(
    get,
    path = "/sessions/{id}/mission/team",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Nominated team", body = MissionTeamResponse),
        (status = 412, description = "No mission started yet")
    )
)]
pub async fn get_mission_team(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MissionTeamResponse>, AppError> {
    Ok(Json(game_service::get_mission_team(&state, id).await?))
}

/// Approve or reject the nominated team.
#[utoipa::path(
    post,
    path = "/sessions/{id}/votes/team",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session identifier")),
    request_body = VoteRequest,
    responses(
        (status = 200, description = "Ballot processed", body = VoteResponse),
        (status = 409, description = "Not in team voting")
    )
)]
pub async fn cast_team_vote(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<VoteRequest>>,
) -> Result<Json<VoteResponse>, AppError> {
    Ok(Json(game_service::cast_team_vote(&state, id, payload).await?))
}

/// Vote for the success or the failure of the mission.
#[utoipa::path(
    post,
    path = "/sessions/{id}/votes/mission",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session identifier")),
    request_body = VoteRequest,
    responses(
        (status = 200, description = "Ballot processed", body = VoteResponse),
        (status = 409, description = "Not in mission voting"),
        (status = 412, description = "Voter is not on the mission team")
    )
)]
pub async fn cast_mission_vote(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<VoteRequest>>,
) -> Result<Json<VoteResponse>, AppError> {
    Ok(Json(
        game_service::cast_mission_vote(&state, id, payload).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/sessions/{id}/assassination",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session identifier")),
    request_body = AssassinationRequest,
    responses(
        (status = 200, description = "Game concluded", body = AssassinationResponse),
        (status = 409, description = "Missions not over or game already concluded"),
        (status = 412, description = "Accuser not evil or unknown target")
    )
)]
pub async fn assassinate(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<AssassinationRequest>>,
) -> Result<Json<AssassinationResponse>, AppError> {
    Ok(Json(game_service::assassinate(&state, id, payload).await?))
}
