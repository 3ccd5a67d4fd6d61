use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::session_store::SessionRepository,
    dto::game::{
        AssassinationRequest, AssassinationResponse, CreateSessionRequest, MissionTeamResponse,
        NominateTeamRequest, PendingMissionResponse, SessionCountResponse, SessionView,
        TeamRosterResponse, VoteRequest, VoteResponse,
    },
    error::ServiceError,
    state::{
        SharedState,
        game::GameSession,
        rules,
        state_machine::{GameEvent, Plan, PreconditionError},
        votes::{RoundKind, VoteOutcome},
    },
};

/// Validate the rosters and persist a brand-new session.
pub async fn create_session(
    state: &SharedState,
    request: CreateSessionRequest,
) -> Result<SessionView, ServiceError> {
    let session = GameSession::new(request.into_config(), state.rules())?;
    let store = state.require_session_store().await?;
    state
        .storage_call("put", store.put(session.clone().into()))
        .await?;

    info!(
        game_id = %session.id,
        players = session.total_players(),
        leader = %session.leader().id,
        "session created"
    );
    Ok(session.into())
}

/// Delete a session and forget its ballots.
pub async fn terminate_session(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    state
        .with_session_write(id, move || async move {
            let store = state.require_session_store().await?;
            let deleted = state.storage_call("delete", store.delete(id)).await?;
            if !deleted {
                return Err(not_found(id));
            }
            state.votes().clear(id);
            info!(game_id = %id, "session terminated");
            Ok(())
        })
        .await
}

pub async fn get_session(state: &SharedState, id: Uuid) -> Result<SessionView, ServiceError> {
    read_session(state, id).await.map(Into::into)
}

/// Evil roster with roles.
pub async fn get_evil_team(
    state: &SharedState,
    id: Uuid,
) -> Result<TeamRosterResponse, ServiceError> {
    let session = read_session(state, id).await?;
    Ok(TeamRosterResponse {
        players: session.config.evil_team.into_iter().map(Into::into).collect(),
    })
}

/// Good roster with roles.
pub async fn get_good_team(
    state: &SharedState,
    id: Uuid,
) -> Result<TeamRosterResponse, ServiceError> {
    let session = read_session(state, id).await?;
    Ok(TeamRosterResponse {
        players: session.config.good_team.into_iter().map(Into::into).collect(),
    })
}

/// Move the session to its next phase based on the stored snapshot and ballots.
pub async fn advance(state: &SharedState, id: Uuid) -> Result<SessionView, ServiceError> {
    let plan = run_event(state, id, GameEvent::Advance).await?;
    Ok(plan.session.into())
}

/// Mission currently being played, with its team size and sabotage threshold.
pub async fn get_pending_mission(
    state: &SharedState,
    id: Uuid,
) -> Result<PendingMissionResponse, ServiceError> {
    let session = read_session(state, id).await?;
    if session.mission_number == 0 {
        return Err(precondition(PreconditionError::NoMission));
    }

    let players = session.total_players();
    let team_size = state
        .rules()
        .mission_team_size(players, session.mission_number)
        .ok_or_else(|| {
            precondition(PreconditionError::NoTeamSize {
                mission: session.mission_number,
                players,
            })
        })?;

    Ok(PendingMissionResponse {
        mission_number: session.mission_number,
        team_size,
        fail_votes_required: rules::fail_votes_required(session.mission_number, players),
        leader_id: session.leader().id.clone(),
        team_picking_attempts: session.team_picking_attempts,
        max_team_picking_attempts: state.rules().max_team_picking_attempts,
    })
}

/// Record the leader's proposed team; a new nomination replaces the previous one.
pub async fn nominate_team(
    state: &SharedState,
    id: Uuid,
    request: NominateTeamRequest,
) -> Result<SessionView, ServiceError> {
    let event = GameEvent::NominateTeam {
        leader: request.leader_id,
        members: request.members,
    };
    let plan = run_event(state, id, event).await?;
    Ok(plan.session.into())
}

pub async fn get_mission_team(
    state: &SharedState,
    id: Uuid,
) -> Result<MissionTeamResponse, ServiceError> {
    let session = read_session(state, id).await?;
    if session.mission_number == 0 {
        return Err(precondition(PreconditionError::NoMission));
    }
    Ok(MissionTeamResponse {
        mission_number: session.mission_number,
        members: session.mission_team,
    })
}

pub async fn cast_team_vote(
    state: &SharedState,
    id: Uuid,
    request: VoteRequest,
) -> Result<VoteResponse, ServiceError> {
    cast_vote(state, id, RoundKind::Team, request).await
}

pub async fn cast_mission_vote(
    state: &SharedState,
    id: Uuid,
    request: VoteRequest,
) -> Result<VoteResponse, ServiceError> {
    cast_vote(state, id, RoundKind::Mission, request).await
}

/// Resolve the assassin's guess and conclude the game.
pub async fn assassinate(
    state: &SharedState,
    id: Uuid,
    request: AssassinationRequest,
) -> Result<AssassinationResponse, ServiceError> {
    let event = GameEvent::Assassinate {
        accuser: request.accuser_id,
        target: request.target_id,
    };
    let plan = run_event(state, id, event).await?;
    let protected_player_killed = plan.protected_player_killed();
    Ok(AssassinationResponse {
        session: plan.session.into(),
        protected_player_killed,
    })
}

pub async fn count_sessions(state: &SharedState) -> Result<SessionCountResponse, ServiceError> {
    let store = state.require_session_store().await?;
    let count = state.storage_call("count", store.count()).await?;
    Ok(SessionCountResponse { count })
}

async fn cast_vote(
    state: &SharedState,
    id: Uuid,
    kind: RoundKind,
    request: VoteRequest,
) -> Result<VoteResponse, ServiceError> {
    state
        .with_session_write(id, move || async move {
            let store = state.require_session_store().await?;
            let session = load_session(state, &store, id).await?;
            state
                .state_machine()
                .authorize_vote(&session, kind, &request.player_id)?;

            let outcome = state
                .votes()
                .cast_vote(id, kind, &request.player_id, request.vote.into());
            let voted_count = state.votes().voted_count(id, kind);
            let required = match kind {
                RoundKind::Team => session.total_players(),
                RoundKind::Mission => session.mission_team.len(),
            };

            debug!(
                game_id = %id,
                player_id = %request.player_id,
                round = ?kind,
                outcome = ?outcome,
                voted_count,
                required,
                "vote cast"
            );
            Ok(VoteResponse {
                recorded: outcome == VoteOutcome::Recorded,
                voted_count,
                required,
            })
        })
        .await
}

/// Plan `event` under the session's write gate, persist the new snapshot and
/// only then apply the ledger effect.
async fn run_event(state: &SharedState, id: Uuid, event: GameEvent) -> Result<Plan, ServiceError> {
    state
        .with_session_write(id, move || async move {
            let store = state.require_session_store().await?;
            let session = load_session(state, &store, id).await?;
            let counts = session
                .state
                .voting_round()
                .map(|kind| state.votes().counts(id, kind))
                .unwrap_or_default();

            let mut plan = state.state_machine().plan(&session, event, &counts)?;
            if !plan.changed {
                debug!(game_id = %id, state = %plan.from, action = plan.action(), "nothing to apply");
                return Ok(plan);
            }

            plan.session.updated_at = SystemTime::now();
            state
                .storage_call("put", store.put(plan.session.clone().into()))
                .await?;
            state.votes().apply(id, plan.ledger);

            if plan.from != plan.to {
                info!(
                    game_id = %id,
                    from = %plan.from,
                    to = %plan.to,
                    action = plan.action(),
                    mission = plan.session.mission_number,
                    "session state changed"
                );
            } else {
                debug!(game_id = %id, state = %plan.to, action = plan.action(), "session updated");
            }
            if plan.to.is_terminal() {
                info!(
                    game_id = %id,
                    state = %plan.to,
                    reason = plan.session.endgame_reason.as_deref().unwrap_or_default(),
                    "game concluded"
                );
            }
            Ok(plan)
        })
        .await
}

async fn read_session(state: &SharedState, id: Uuid) -> Result<GameSession, ServiceError> {
    state
        .with_session_read(id, move || async move {
            let store = state.require_session_store().await?;
            load_session(state, &store, id).await
        })
        .await
}

async fn load_session(
    state: &SharedState,
    store: &Arc<dyn SessionRepository>,
    id: Uuid,
) -> Result<GameSession, ServiceError> {
    let Some(entity) = state.storage_call("get", store.get(id)).await? else {
        // Expired or deleted behind our back; its ballots are orphans now.
        state.votes().clear(id);
        return Err(not_found(id));
    };
    Ok(GameSession::try_from(entity)?)
}

/// Drop the ballots of every game the store no longer knows about.
///
/// Sessions expire silently in both stores, so the ledger is reconciled
/// against the repository instead of waiting for a request on each game.
pub async fn purge_orphaned_ballots(state: &SharedState) -> Result<usize, ServiceError> {
    let store = state.require_session_store().await?;
    let mut purged = 0;

    for id in state.votes().games() {
        let store = Arc::clone(&store);
        let orphaned = state
            .with_session_write(id, move || async move {
                if state.storage_call("exists", store.exists(id)).await? {
                    return Ok(false);
                }
                state.votes().clear(id);
                Ok(true)
            })
            .await?;
        if orphaned {
            purged += 1;
        }
    }

    if purged > 0 {
        debug!(purged, "dropped ballots of expired sessions");
    }
    Ok(purged)
}

/// Periodically run [`purge_orphaned_ballots`]. The task stops once the state is dropped.
pub fn spawn_ballot_sweep(state: &SharedState, every: Duration) {
    let weak = Arc::downgrade(state);
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let Some(state) = weak.upgrade() else {
                break;
            };
            match purge_orphaned_ballots(&state).await {
                Ok(_) | Err(ServiceError::Degraded) => {}
                Err(err) => warn!(error = %err, "ballot sweep failed"),
            }
        }
    });
}

fn not_found(id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("session `{id}` not found"))
}

fn precondition(err: PreconditionError) -> ServiceError {
    ServiceError::PreconditionFailed(err.to_string())
}
