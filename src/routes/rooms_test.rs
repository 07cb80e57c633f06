use super::*;
use crate::services::broadcast;
use crate::state::test_helpers;
use crate::state::{ClientConn, Outbound};
use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};
use uuid::Uuid;

fn sock(last: u8) -> SocketAddr {
    SocketAddr::from(([10, 0, 0, last], 40_000))
}

async fn create_room_as(state: &AppState, addr: SocketAddr, name: &str) -> u32 {
    let response = create(
        State(state.clone()),
        ConnectInfo(addr),
        Json(CreateBody { name: Some(name.to_owned()) }),
    )
    .await
    .expect("create should succeed");
    response.0.room_id
}

fn join_body(name: &str, room_id: u32) -> JoinBody {
    JoinBody {
        name: Some(name.to_owned()),
        room_id: Some(serde_json::json!(room_id)),
    }
}

#[tokio::test]
async fn create_assigns_the_caller_as_admin() {
    let state = test_helpers::test_app_state();
    let room_id = create_room_as(&state, sock(1), "A").await;

    let query = |id: String| Query(std::collections::HashMap::from([("roomId".to_owned(), id)]));

    let yes = is_admin(State(state.clone()), ConnectInfo(sock(1)), query(room_id.to_string()))
        .await
        .unwrap();
    assert!(yes.0.is_admin);

    let no = is_admin(State(state.clone()), ConnectInfo(sock(2)), query(room_id.to_string()))
        .await
        .unwrap();
    assert!(!no.0.is_admin);
}

#[tokio::test]
async fn create_requires_a_name() {
    let state = test_helpers::test_app_state();
    let err = create(State(state), ConnectInfo(sock(1)), Json(CreateBody { name: None }))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));
}

#[tokio::test]
async fn is_admin_requires_a_valid_room_id() {
    let state = test_helpers::test_app_state();

    let err = is_admin(State(state.clone()), ConnectInfo(sock(1)), Query(std::collections::HashMap::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));

    let query = Query(std::collections::HashMap::from([("roomId".to_owned(), "nope".to_owned())]));
    let err = is_admin(State(state), ConnectInfo(sock(1)), query).await.unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));
}

#[tokio::test]
async fn join_reports_the_room_state_snapshot() {
    let state = test_helpers::test_app_state();
    let room_id = create_room_as(&state, sock(1), "A").await;

    let response = join(State(state.clone()), ConnectInfo(sock(2)), Json(join_body("B", room_id)))
        .await
        .unwrap();
    assert!(response.0.success);
    assert!(!response.0.is_admin);
    assert_eq!(response.0.name, "B");
    assert_eq!(response.0.room_state.status, RoomStatus::Setup);
    assert!(response.0.room_state.current_item.is_none());
}

#[tokio::test]
async fn join_requires_a_room_id() {
    let state = test_helpers::test_app_state();
    let body = JoinBody { name: Some("B".into()), room_id: None };
    let err = join(State(state), ConnectInfo(sock(2)), Json(body)).await.unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));
}

#[tokio::test]
async fn join_broadcasts_the_new_roster() {
    let state = test_helpers::test_app_state();
    let room_id = create_room_as(&state, sock(1), "A").await;

    let (tx, mut rx) = mpsc::channel(8);
    broadcast::register(
        &state,
        Uuid::new_v4(),
        ClientConn { room_id, role: "admin".into(), player_name: "A".into(), tx },
    )
    .await;

    join(State(state.clone()), ConnectInfo(sock(2)), Json(join_body("B", room_id)))
        .await
        .unwrap();

    let outbound = timeout(Duration::from_millis(200), rx.recv())
        .await
        .expect("broadcast timed out")
        .expect("channel closed");
    let Outbound::Event(event) = outbound else {
        panic!("expected a plain event");
    };
    assert_eq!(event.event, "user-joined");
    assert_eq!(event.get("name").and_then(serde_json::Value::as_str), Some("B"));
    assert_eq!(event.get("totalPlayers").and_then(serde_json::Value::as_u64), Some(2));
}

#[tokio::test]
async fn set_items_rejects_wrong_shapes_with_bad_request() {
    let state = test_helpers::test_app_state();
    let room_id = create_room_as(&state, sock(1), "A").await;
    let path = room_id.to_string();

    for body in [
        serde_json::json!({}),
        serde_json::json!({"items": "I1"}),
        serde_json::json!({"items": [1, 2]}),
        serde_json::json!({"items": ["ok", null]}),
    ] {
        let err = set_items(
            State(state.clone()),
            ConnectInfo(sock(1)),
            Path(path.clone()),
            Json(body),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}

#[tokio::test]
async fn set_items_is_admin_only() {
    let state = test_helpers::test_app_state();
    let room_id = create_room_as(&state, sock(1), "A").await;

    let err = set_items(
        State(state.clone()),
        ConnectInfo(sock(2)),
        Path(room_id.to_string()),
        Json(serde_json::json!({"items": ["I1"]})),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    set_items(
        State(state.clone()),
        ConnectInfo(sock(1)),
        Path(room_id.to_string()),
        Json(serde_json::json!({"items": ["I1"]})),
    )
    .await
    .unwrap();

    let items = get_items(State(state), Path(room_id.to_string())).await.unwrap();
    assert_eq!(items.0.items, ["I1"]);
}

#[tokio::test]
async fn reads_on_an_unknown_room_are_not_found() {
    let state = test_helpers::test_app_state();

    let err = get_items(State(state.clone()), Path("5".into())).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    let err = participants(State(state.clone()), Path("5".into())).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    let err = status(State(state), Path("5".into())).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn reads_reject_malformed_room_ids() {
    let state = test_helpers::test_app_state();
    let err = status(State(state), Path("-3".into())).await.unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));
}
