use std::{sync::Arc, time::Duration};

use avalon_back::{
    dao::session_store::MemorySessionStore,
    routes,
    state::{AppState, rules::GameRules},
};
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

fn app() -> Router {
    let state = AppState::with_session_store(
        Arc::new(MemorySessionStore::default()),
        GameRules::default(),
        Duration::from_secs(1),
    );
    routes::router(state)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn roster(prefix: &str, count: usize, special: &str, filler: &str) -> Value {
    (0..count)
        .map(|i| {
            json!({
                "id": format!("{prefix}{i}"),
                "name": format!("{}{i}", prefix.to_uppercase()),
                "role": if i == 0 { special } else { filler },
            })
        })
        .collect()
}

fn five_player_game() -> Value {
    json!({
        "good_team": roster("g", 3, "merlin", "servant"),
        "evil_team": roster("e", 2, "assassin", "minion"),
    })
}

async fn create(app: &Router) -> Value {
    let (status, view) = send(app, Method::POST, "/sessions", Some(five_player_game())).await;
    assert_eq!(status, StatusCode::CREATED);
    view
}

fn player_ids(view: &Value) -> Vec<String> {
    view["players"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap().to_owned())
        .collect()
}

/// Nominates the first seats, approves the team and votes the mission through.
async fn play_successful_mission(app: &Router, base: &str) -> Value {
    let (_, mission) = send(app, Method::GET, &format!("{base}/mission"), None).await;
    let team_size = mission["team_size"].as_u64().unwrap() as usize;

    let (_, view) = send(app, Method::GET, base, None).await;
    let players = player_ids(&view);
    let members: Vec<_> = players.iter().take(team_size).cloned().collect();

    let (status, _) = send(
        app,
        Method::PUT,
        &format!("{base}/mission/team"),
        Some(json!({ "leader_id": view["current_leader_id"], "members": members })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, view) = send(app, Method::POST, &format!("{base}/advance"), None).await;
    assert_eq!(view["state"], "MISSION_TEAM_VOTING");

    for player in &players {
        let (status, ballot) = send(
            app,
            Method::POST,
            &format!("{base}/votes/team"),
            Some(json!({ "player_id": player, "vote": "positive" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ballot["recorded"], true);
    }

    let (_, view) = send(app, Method::POST, &format!("{base}/advance"), None).await;
    assert_eq!(view["state"], "MISSION_SUCCESS_VOTING");

    for member in &members {
        let (status, _) = send(
            app,
            Method::POST,
            &format!("{base}/votes/mission"),
            Some(json!({ "player_id": member, "vote": "positive" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, view) = send(app, Method::POST, &format!("{base}/advance"), None).await;
    assert_eq!(view["state"], "MISSION_ENDED");
    assert_eq!(view["last_mission_result"]["failed"], false);

    let (_, view) = send(app, Method::POST, &format!("{base}/advance"), None).await;
    view
}

#[tokio::test]
async fn create_hides_roles() {
    let app = app();
    let view = create(&app).await;

    assert_eq!(view["state"], "GAME_CREATED");
    assert_eq!(view["mission_number"], 0);
    assert_eq!(view["players"].as_array().unwrap().len(), 5);
    assert!(view["players"][0].get("role").is_none());
    assert!(view["current_leader_id"].is_string());
}

#[tokio::test]
async fn unbalanced_or_malformed_rosters_are_rejected() {
    let app = app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/sessions",
        Some(json!({
            "good_team": roster("g", 3, "merlin", "servant"),
            "evil_team": roster("e", 3, "assassin", "minion"),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["retryable"], false);

    let mut blank = five_player_game();
    blank["good_team"][1]["id"] = json!("  ");
    let (status, _) = send(&app, Method::POST, "/sessions", Some(blank)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_sessions_are_not_found() {
    let app = app();
    let missing = uuid::Uuid::new_v4();

    let (status, _) = send(&app, Method::GET, &format!("/sessions/{missing}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::POST, &format!("/sessions/{missing}/advance"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::GET, "/sessions/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rule_violations_map_to_conflict_and_precondition_failed() {
    let app = app();
    let view = create(&app).await;
    let base = format!("/sessions/{}", view["id"].as_str().unwrap());

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("{base}/votes/team"),
        Some(json!({ "player_id": "g0", "vote": "positive" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, Method::GET, &format!("{base}/mission/team"), None).await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);

    let (_, view) = send(&app, Method::POST, &format!("{base}/advance"), None).await;
    assert_eq!(view["state"], "MISSION_TEAM_PICKING");

    let (status, _) = send(&app, Method::POST, &format!("{base}/advance"), None).await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);

    let leader = view["current_leader_id"].as_str().unwrap();
    let outsider = player_ids(&view)
        .into_iter()
        .find(|id| id != leader)
        .unwrap();
    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("{base}/mission/team"),
        Some(json!({ "leader_id": outsider, "members": ["g0", "g1"] })),
    )
    .await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("{base}/mission/team"),
        Some(json!({ "leader_id": leader, "members": ["g0", "g1", "g2", "e0"] })),
    )
    .await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
}

#[tokio::test]
async fn repeated_team_votes_are_not_counted() {
    let app = app();
    let view = create(&app).await;
    let base = format!("/sessions/{}", view["id"].as_str().unwrap());

    send(&app, Method::POST, &format!("{base}/advance"), None).await;
    let (_, view) = send(&app, Method::GET, &base, None).await;
    send(
        &app,
        Method::PUT,
        &format!("{base}/mission/team"),
        Some(json!({ "leader_id": view["current_leader_id"], "members": ["g0", "e0"] })),
    )
    .await;
    send(&app, Method::POST, &format!("{base}/advance"), None).await;

    let ballot = json!({ "player_id": "g1", "vote": "negative" });
    let (_, first) = send(&app, Method::POST, &format!("{base}/votes/team"), Some(ballot.clone())).await;
    let (_, second) = send(&app, Method::POST, &format!("{base}/votes/team"), Some(ballot)).await;

    assert_eq!(first["recorded"], true);
    assert_eq!(second["recorded"], false);
    assert_eq!(second["voted_count"], 1);
    assert_eq!(second["required"], 5);

    let (status, _) = send(&app, Method::POST, &format!("{base}/advance"), None).await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
}

#[tokio::test]
async fn full_game_ends_with_assassination() {
    let app = app();
    let view = create(&app).await;
    let base = format!("/sessions/{}", view["id"].as_str().unwrap());

    let (_, view) = send(&app, Method::POST, &format!("{base}/advance"), None).await;
    assert_eq!(view["mission_number"], 1);

    let view = play_successful_mission(&app, &base).await;
    assert_eq!(view["state"], "MISSION_TEAM_PICKING");
    assert_eq!(view["mission_number"], 2);
    let view = play_successful_mission(&app, &base).await;
    assert_eq!(view["mission_number"], 3);
    let view = play_successful_mission(&app, &base).await;
    assert_eq!(view["state"], "POST_MISSIONS_ACTIONS");
    assert_eq!(view["successful_missions"], 3);

    let (status, good) = send(&app, Method::GET, &format!("{base}/teams/good"), None).await;
    assert_eq!(status, StatusCode::OK);
    let merlin = good["players"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["role"] == "merlin")
        .unwrap()["id"]
        .clone();

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("{base}/assassination"),
        Some(json!({ "accuser_id": "g1", "target_id": merlin })),
    )
    .await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);

    let (status, outcome) = send(
        &app,
        Method::POST,
        &format!("{base}/assassination"),
        Some(json!({ "accuser_id": "e0", "target_id": merlin })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["protected_player_killed"], true);
    assert_eq!(outcome["session"]["state"], "EVIL_TEAM_WON");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("{base}/assassination"),
        Some(json!({ "accuser_id": "e0", "target_id": "g1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body["message"],
        "conflict: invalid state transition: game already concluded"
    );
}

#[tokio::test]
async fn terminate_removes_the_session() {
    let app = app();
    let view = create(&app).await;
    create(&app).await;
    let base = format!("/sessions/{}", view["id"].as_str().unwrap());

    let (_, count) = send(&app, Method::GET, "/sessions/count", None).await;
    assert_eq!(count["count"], 2);

    let (_, health) = send(&app, Method::GET, "/healthcheck", None).await;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["sessions"], 2);

    let (status, _) = send(&app, Method::DELETE, &base, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::DELETE, &base, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::GET, &base, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn degraded_mode_is_retryable() {
    let app = routes::router(AppState::new(GameRules::default(), Duration::from_secs(1)));

    let (status, body) = send(&app, Method::POST, "/sessions", Some(five_player_game())).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["retryable"], true);

    let (status, health) = send(&app, Method::GET, "/healthcheck", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "degraded");
}
