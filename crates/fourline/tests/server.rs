//! Integration tests for the Fourline server: full WebSocket round
//! trips from connect to game over.

use std::time::Duration;

use fourline::prelude::*;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a server on a random port and returns the address.
async fn start_server(timings: RoomTimings) -> String {
    let server = FourlineServerBuilder::new()
        .bind("127.0.0.1:0")
        .timings(timings)
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

/// Timings long enough that no timer fires mid-test.
fn slow() -> RoomTimings {
    RoomTimings {
        expiry: Duration::from_secs(60),
        naming: Duration::from_secs(60),
    }
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send(ws: &mut ClientWs, command: &Value) {
    ws.send(Message::Text(command.to_string().into()))
        .await
        .expect("send command");
}

/// Receives the next JSON event, skipping non-text frames.
async fn next_event(ws: &mut ClientWs) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for event")
            .expect("connection closed")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).expect("valid json event");
        }
    }
}

/// Skips unrelated events (lobby pushes, mostly) until `kind` arrives.
async fn wait_for(ws: &mut ClientWs, kind: &str) -> Value {
    for _ in 0..32 {
        let event = next_event(ws).await;
        if event["type"] == kind {
            return event;
        }
    }
    panic!("no {kind} event within 32 events");
}

/// Waits for an `activeRooms` push listing exactly `len` rooms.
async fn wait_for_lobby(ws: &mut ClientWs, len: usize) -> Value {
    for _ in 0..32 {
        let event = wait_for(ws, "activeRooms").await;
        if event["rooms"].as_array().map(Vec::len) == Some(len) {
            return event;
        }
    }
    panic!("no activeRooms push with {len} rooms");
}

/// Consumes the welcome event and returns the assigned player id.
async fn welcome(ws: &mut ClientWs) -> u64 {
    let event = wait_for(ws, "welcome").await;
    event["playerId"].as_u64().expect("numeric player id")
}

/// Connects two clients and seats them in a fresh room.
async fn create_and_join(addr: &str) -> (ClientWs, u64, ClientWs, u64, String) {
    let mut c1 = connect(addr).await;
    let p1 = welcome(&mut c1).await;
    send(&mut c1, &json!({"type": "createRoom"})).await;
    let created = wait_for(&mut c1, "roomCreated").await;
    let code = created["room"].as_str().expect("room code").to_string();

    let mut c2 = connect(addr).await;
    let p2 = welcome(&mut c2).await;
    send(&mut c2, &json!({"type": "joinRoom", "room": code})).await;
    wait_for(&mut c2, "joinRoom").await;
    wait_for(&mut c1, "playerJoined").await;

    (c1, p1, c2, p2, code)
}

/// Names both players and waits for game start on both connections.
async fn start_game(c1: &mut ClientWs, c2: &mut ClientWs, code: &str) {
    send(c1, &json!({"type": "setPlayerName", "name": "alice", "room": code}))
        .await;
    send(c2, &json!({"type": "setPlayerName", "name": "bob", "room": code}))
        .await;
    wait_for(c1, "gameStart").await;
    wait_for(c2, "gameStart").await;
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_welcome_then_lobby_snapshot() {
    let addr = start_server(slow()).await;
    let mut ws = connect(&addr).await;

    let first = next_event(&mut ws).await;
    assert_eq!(first["type"], "welcome");
    assert!(first["playerId"].as_u64().is_some());

    let second = next_event(&mut ws).await;
    assert_eq!(second["type"], "activeRooms");
    assert_eq!(second["rooms"], json!([]));
}

#[tokio::test]
async fn test_create_room_acks_and_appears_in_lobby() {
    let addr = start_server(slow()).await;
    let mut c1 = connect(&addr).await;
    welcome(&mut c1).await;

    send(&mut c1, &json!({"type": "createRoom"})).await;
    let created = wait_for(&mut c1, "roomCreated").await;
    let code = created["room"].as_str().expect("room code");
    assert_eq!(code.len(), 6);

    // A later connection sees the room in its lobby snapshot.
    let mut c2 = connect(&addr).await;
    welcome(&mut c2).await;
    let lobby = wait_for_lobby(&mut c2, 1).await;
    assert_eq!(lobby["rooms"][0]["room"], code);
    assert_eq!(lobby["rooms"][0]["playerCount"], 1);
    assert!(lobby["rooms"][0]["createdAt"].as_u64().is_some());
}

#[tokio::test]
async fn test_join_unknown_room_is_join_error() {
    let addr = start_server(slow()).await;
    let mut ws = connect(&addr).await;
    welcome(&mut ws).await;

    send(&mut ws, &json!({"type": "joinRoom", "room": "zzzzzz"})).await;
    let err = wait_for(&mut ws, "joinError").await;
    assert!(err["message"].as_str().expect("message").contains("not found"));
}

#[tokio::test]
async fn test_third_player_cannot_join() {
    let addr = start_server(slow()).await;
    let (_c1, _p1, _c2, _p2, code) = create_and_join(&addr).await;

    let mut c3 = connect(&addr).await;
    welcome(&mut c3).await;
    send(&mut c3, &json!({"type": "joinRoom", "room": code})).await;
    let err = wait_for(&mut c3, "joinError").await;
    assert!(err["message"].as_str().expect("message").contains("full"));
}

#[tokio::test]
async fn test_game_start_carries_names_creator_first() {
    let addr = start_server(slow()).await;
    let (mut c1, p1, mut c2, p2, code) = create_and_join(&addr).await;

    // Joiner names first; the creator must still come first in the event.
    send(
        &mut c2,
        &json!({"type": "setPlayerName", "name": "bob", "room": code}),
    )
    .await;
    send(
        &mut c1,
        &json!({"type": "setPlayerName", "name": "alice", "room": code}),
    )
    .await;

    for ws in [&mut c1, &mut c2] {
        let start = wait_for(ws, "gameStart").await;
        assert_eq!(start["player1"].as_u64(), Some(p1));
        assert_eq!(start["player2"].as_u64(), Some(p2));
        assert_eq!(start["names"], json!(["alice", "bob"]));
    }
}

#[tokio::test]
async fn test_moves_broadcast_and_vertical_win() {
    let addr = start_server(slow()).await;
    let (mut c1, p1, mut c2, _p2, code) = create_and_join(&addr).await;
    start_game(&mut c1, &mut c2, &code).await;

    let drop = |player: u64, column: usize| {
        json!({
            "type": "makeMove",
            "room": code,
            "column": column,
            "playerId": player,
        })
    };

    send(&mut c1, &drop(p1, 0)).await;
    let first = wait_for(&mut c2, "moveMade").await;
    assert_eq!(first["row"], 5);
    assert_eq!(first["column"], 0);
    assert_eq!(first["playerId"].as_u64(), Some(p1));
    assert_eq!(first["playerName"], "alice");

    // Three more in column 0 complete a vertical four.
    for _ in 0..3 {
        send(&mut c1, &drop(p1, 0)).await;
    }
    for _ in 0..3 {
        wait_for(&mut c2, "moveMade").await;
    }

    let won = wait_for(&mut c2, "gameWon").await;
    assert_eq!(won["winner"].as_u64(), Some(p1));
    let won = wait_for(&mut c1, "gameWon").await;
    assert_eq!(won["winner"].as_u64(), Some(p1));
}

#[tokio::test]
async fn test_out_of_range_column_is_rejected() {
    let addr = start_server(slow()).await;
    let (mut c1, p1, mut c2, _p2, code) = create_and_join(&addr).await;
    start_game(&mut c1, &mut c2, &code).await;

    send(
        &mut c1,
        &json!({
            "type": "makeMove",
            "room": code,
            "column": 9,
            "playerId": p1,
        }),
    )
    .await;
    let rejected = wait_for(&mut c1, "rejected").await;
    assert!(
        rejected["message"]
            .as_str()
            .expect("message")
            .contains("out of range")
    );
}

#[tokio::test]
async fn test_move_before_game_start_is_rejected() {
    let addr = start_server(slow()).await;
    let (mut c1, p1, _c2, _p2, code) = create_and_join(&addr).await;

    send(
        &mut c1,
        &json!({
            "type": "makeMove",
            "room": code,
            "column": 0,
            "playerId": p1,
        }),
    )
    .await;
    let rejected = wait_for(&mut c1, "rejected").await;
    assert!(
        rejected["message"]
            .as_str()
            .expect("message")
            .contains("not in progress")
    );
}

#[tokio::test]
async fn test_leave_room_notifies_opponent() {
    let addr = start_server(slow()).await;
    let (mut c1, _p1, mut c2, p2, code) = create_and_join(&addr).await;

    send(&mut c2, &json!({"type": "leaveRoom", "room": code})).await;

    let left = wait_for(&mut c1, "playerLeft").await;
    assert_eq!(left["departedId"].as_u64(), Some(p2));
    assert!(
        left["message"]
            .as_str()
            .expect("message")
            .contains("left the game")
    );
}

#[tokio::test]
async fn test_disconnect_notifies_opponent() {
    let addr = start_server(slow()).await;
    let (mut c1, _p1, mut c2, p2, code) = create_and_join(&addr).await;
    start_game(&mut c1, &mut c2, &code).await;

    drop(c2);

    let left = wait_for(&mut c1, "playerLeft").await;
    assert_eq!(left["departedId"].as_u64(), Some(p2));
    assert!(
        left["message"]
            .as_str()
            .expect("message")
            .contains("disconnected")
    );
}

#[tokio::test]
async fn test_room_expires_and_leaves_the_lobby() {
    let addr = start_server(RoomTimings {
        expiry: Duration::from_millis(100),
        naming: Duration::from_secs(60),
    })
    .await;
    let mut ws = connect(&addr).await;
    welcome(&mut ws).await;

    send(&mut ws, &json!({"type": "createRoom"})).await;
    wait_for(&mut ws, "roomCreated").await;
    wait_for(&mut ws, "roomExpired").await;

    // The janitor reclaims the room and republishes an empty lobby.
    wait_for_lobby(&mut ws, 0).await;
}

#[tokio::test]
async fn test_garbage_input_is_rejected_to_sender_only() {
    let addr = start_server(slow()).await;
    let mut ws = connect(&addr).await;
    welcome(&mut ws).await;

    let mut bystander = connect(&addr).await;
    welcome(&mut bystander).await;

    ws.send(Message::Text("not json".into())).await.expect("send");
    let rejected = wait_for(&mut ws, "rejected").await;
    assert!(
        rejected["message"]
            .as_str()
            .expect("message")
            .contains("invalid command")
    );

    // An unknown command type is a decode failure too.
    ws.send(Message::Text(r#"{"type": "warpDrive"}"#.into()))
        .await
        .expect("send");
    wait_for(&mut ws, "rejected").await;

    // The connection survives and still takes commands.
    send(&mut ws, &json!({"type": "createRoom"})).await;
    wait_for(&mut ws, "roomCreated").await;

    // The other connection only ever saw lobby traffic.
    loop {
        let event = next_event(&mut bystander).await;
        if event["type"] == "activeRooms" {
            if event["rooms"].as_array().map(Vec::len) == Some(1) {
                break;
            }
            continue;
        }
        panic!("bystander received {event:?}");
    }
}

#[tokio::test]
async fn test_player_cannot_hold_two_rooms() {
    let addr = start_server(slow()).await;
    let mut ws = connect(&addr).await;
    welcome(&mut ws).await;

    send(&mut ws, &json!({"type": "createRoom"})).await;
    wait_for(&mut ws, "roomCreated").await;

    send(&mut ws, &json!({"type": "createRoom"})).await;
    let rejected = wait_for(&mut ws, "rejected").await;
    assert!(
        rejected["message"]
            .as_str()
            .expect("message")
            .contains("already in room")
    );
}
