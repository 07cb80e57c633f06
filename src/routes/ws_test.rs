use super::*;
use crate::state::test_helpers;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::time::{Duration, timeout};
use tokio_tungstenite::tungstenite;

// =============================================================================
// HANDSHAKE PARSING
// =============================================================================

#[test]
fn parses_the_full_handshake_shape() {
    let handshake = parse_handshake(r#"{"roomId": 123456, "role": "player", "payload": {"name": "Bob"}}"#)
        .expect("handshake should parse");
    assert_eq!(handshake.room_id, 123_456);
    assert_eq!(handshake.role, "player");
    assert_eq!(handshake.name, "Bob");
}

#[test]
fn parses_a_string_room_id_in_the_object_shape() {
    let handshake = parse_handshake(r#"{"roomId": "42", "role": "admin", "payload": {"name": "A"}}"#)
        .expect("handshake should parse");
    assert_eq!(handshake.room_id, 42);
    assert_eq!(handshake.role, "admin");
}

#[test]
fn tolerates_missing_role_and_payload() {
    let handshake = parse_handshake(r#"{"roomId": 7}"#).expect("handshake should parse");
    assert_eq!(handshake.room_id, 7);
    assert!(handshake.role.is_empty());
    assert!(handshake.name.is_empty());
}

#[test]
fn parses_the_legacy_bare_room_id() {
    // Bare digits arrive as a JSON number; a quoted id as a JSON string.
    assert_eq!(parse_handshake("123").unwrap().room_id, 123);
    assert_eq!(parse_handshake("\"123\"").unwrap().room_id, 123);
    assert_eq!(parse_handshake(" 123 ").unwrap().room_id, 123);
}

#[test]
fn rejects_garbage_handshakes() {
    assert!(parse_handshake("").is_none());
    assert!(parse_handshake("hello").is_none());
    assert!(parse_handshake("[]").is_none());
    assert!(parse_handshake("0").is_none());
    assert!(parse_handshake(r#"{"role": "player"}"#).is_none());
    assert!(parse_handshake(r#"{"roomId": -3}"#).is_none());
}

// =============================================================================
// TAGGING
// =============================================================================

#[tokio::test]
async fn tagging_registers_the_connection() {
    let state = test_helpers::test_app_state();
    let client_id = Uuid::new_v4();
    let (tx, _rx) = mpsc::channel(8);
    let mut tagged = false;

    tag_connection(
        &state,
        client_id,
        &mut tagged,
        &tx,
        r#"{"roomId": 5, "role": "player", "payload": {"name": "B"}}"#,
    )
    .await;

    assert!(tagged);
    let clients = state.clients.read().await;
    let conn = clients.get(&client_id).expect("connection should be registered");
    assert_eq!(conn.room_id, 5);
    assert_eq!(conn.player_name, "B");
}

#[tokio::test]
async fn the_first_handshake_wins() {
    let state = test_helpers::test_app_state();
    let client_id = Uuid::new_v4();
    let (tx, _rx) = mpsc::channel(8);
    let mut tagged = false;

    tag_connection(&state, client_id, &mut tagged, &tx, "5").await;
    tag_connection(
        &state,
        client_id,
        &mut tagged,
        &tx,
        r#"{"roomId": 9, "role": "admin", "payload": {"name": "Spoof"}}"#,
    )
    .await;

    let clients = state.clients.read().await;
    let conn = clients.get(&client_id).expect("connection should stay registered");
    assert_eq!(conn.room_id, 5, "a second handshake must not retag the connection");
    assert!(conn.player_name.is_empty());
}

#[tokio::test]
async fn an_invalid_handshake_leaves_the_connection_untagged() {
    let state = test_helpers::test_app_state();
    let client_id = Uuid::new_v4();
    let (tx, _rx) = mpsc::channel(8);
    let mut tagged = false;

    tag_connection(&state, client_id, &mut tagged, &tx, "not a handshake").await;

    assert!(!tagged);
    assert!(state.clients.read().await.is_empty());
}

// =============================================================================
// LIVE SOCKET
// =============================================================================

async fn serve() -> (AppState, String) {
    let state = test_helpers::test_app_state();
    let app = crate::routes::app(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .expect("test server");
    });
    (state, format!("ws://{addr}/ws"))
}

async fn wait_for_registration(state: &AppState, count: usize) {
    for _ in 0..100 {
        if state.clients.read().await.len() == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("connection was not registered in time");
}

async fn next_text(
    ws: &mut (impl StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin),
) -> String {
    loop {
        let msg = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("socket receive timed out")
            .expect("socket closed")
            .expect("socket error");
        match msg {
            tungstenite::Message::Text(text) => return text.to_string(),
            tungstenite::Message::Ping(_) | tungstenite::Message::Pong(_) => {}
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

#[tokio::test]
async fn a_tagged_socket_receives_room_broadcasts() {
    let (state, url) = serve().await;
    let (mut ws, _) = tokio_tungstenite::connect_async(url.as_str()).await.expect("connect");

    ws.send(tungstenite::Message::Text(
        r#"{"roomId": 777, "role": "player", "payload": {"name": "B"}}"#.into(),
    ))
    .await
    .expect("handshake send");
    wait_for_registration(&state, 1).await;

    let event = GameEvent::named("user-joined").with_data("name", "C");
    broadcast::broadcast(&state, 777, &event).await;

    let text = next_text(&mut ws).await;
    assert!(text.contains(r#""event":"user-joined""#), "got: {text}");
    assert!(text.contains(r#""name":"C""#), "got: {text}");
}

#[tokio::test]
async fn broadcasts_do_not_cross_rooms() {
    let (state, url) = serve().await;
    let (mut ws, _) = tokio_tungstenite::connect_async(url.as_str()).await.expect("connect");

    ws.send(tungstenite::Message::Text("111".into())).await.expect("handshake send");
    wait_for_registration(&state, 1).await;

    broadcast::broadcast(&state, 222, &GameEvent::named("user-joined")).await;
    broadcast::broadcast(&state, 111, &GameEvent::named("cards-revealed")).await;

    // The first frame to arrive must be for this room, not the other one.
    let text = next_text(&mut ws).await;
    assert!(text.contains(r#""event":"cards-revealed""#), "got: {text}");
}

#[tokio::test]
async fn a_kicked_socket_gets_the_notice_and_then_the_close() {
    let (state, url) = serve().await;
    let (mut ws, _) = tokio_tungstenite::connect_async(url.as_str()).await.expect("connect");

    ws.send(tungstenite::Message::Text(
        r#"{"roomId": 31, "role": "player", "payload": {"name": "B"}}"#.into(),
    ))
    .await
    .expect("handshake send");
    wait_for_registration(&state, 1).await;

    broadcast::disconnect_user(&state, 31, "B").await;

    let text = next_text(&mut ws).await;
    assert!(text.contains(r#""event":"banned-by-admin""#), "got: {text}");

    // The server closes right after the notice.
    let end = timeout(Duration::from_secs(2), ws.next()).await.expect("close timed out");
    match end {
        None | Some(Ok(tungstenite::Message::Close(_))) | Some(Err(_)) => {}
        Some(Ok(other)) => panic!("expected close, got: {other:?}"),
    }
}

#[tokio::test]
async fn a_closed_socket_is_unregistered() {
    let (state, url) = serve().await;
    let (mut ws, _) = tokio_tungstenite::connect_async(url.as_str()).await.expect("connect");

    ws.send(tungstenite::Message::Text("444".into())).await.expect("handshake send");
    wait_for_registration(&state, 1).await;

    ws.close(None).await.expect("close");
    wait_for_registration(&state, 0).await;
}
