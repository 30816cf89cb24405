use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use wolfsignal::{server, AppState, Config};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_server(config: Config) -> (SocketAddr, AppState) {
    let state = AppState::new(config);
    let app = server::router(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

async fn connect(addr: SocketAddr, query: &str) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}/ws?{query}"))
        .await
        .expect("websocket handshake failed");
    ws
}

/// Next text frame as JSON, skipping keepalives.
async fn next_json(ws: &mut Client) -> Value {
    loop {
        let frame = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("websocket error");
        match frame {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

async fn send_json(ws: &mut Client, value: Value) {
    ws.send(Message::Text(value.to_string())).await.unwrap();
}

#[tokio::test]
async fn test_two_peer_negotiation() {
    let (addr, state) = spawn_server(Config::default()).await;

    // U1 connects without a room and gets a fresh one.
    let mut u1 = connect(addr, "user_id=U1").await;
    let created = next_json(&mut u1).await;
    assert_eq!(created["type"], "room_created");
    let room_id = created["data"]["room_id"].as_str().unwrap().to_string();
    assert_eq!(room_id.len(), 6);
    let info = next_json(&mut u1).await;
    assert_eq!(info["type"], "room_info");
    assert_eq!(info["data"], json!([]));

    // U2 joins it.
    let mut u2 = connect(addr, &format!("user_id=U2&room_id={room_id}")).await;
    let info = next_json(&mut u2).await;
    assert_eq!(info["type"], "room_info");
    assert_eq!(info["data"], json!(["U1"]));

    let joined = next_json(&mut u1).await;
    assert_eq!(joined["type"], "user_joined");
    assert_eq!(joined["from"], "U2");

    // Offer from U2 to U1, with a forged sender.
    send_json(
        &mut u2,
        json!({ "type": "offer", "from": "U9", "to": "U1", "data": { "sdp": "..." } }),
    )
    .await;
    let offer = next_json(&mut u1).await;
    assert_eq!(offer["type"], "offer");
    assert_eq!(offer["from"], "U2");
    assert_eq!(offer["to"], "U1");
    assert_eq!(offer["data"], json!({ "sdp": "..." }));

    // U1 leaves.
    u1.close(None).await.unwrap();
    let left = next_json(&mut u2).await;
    assert_eq!(left["type"], "user_left");
    assert_eq!(left["from"], "U1");

    let room = state.registry.get(&room_id).await.unwrap();
    assert_eq!(room.other_members("").await, vec!["U2"]);
}

#[tokio::test]
async fn test_fifth_participant_is_turned_away() {
    let (addr, state) = spawn_server(Config::default()).await;

    let mut members = Vec::new();
    for id in ["A", "B", "C", "D"] {
        let mut ws = connect(addr, &format!("user_id={id}&room_id=full")).await;
        let info = next_json(&mut ws).await;
        assert_eq!(info["type"], "room_info");
        members.push(ws);
    }

    let mut late = connect(addr, "user_id=E&room_id=full").await;
    let notice = next_json(&mut late).await;
    assert_eq!(notice["type"], "room_full");

    let closing = timeout(Duration::from_secs(5), late.next()).await.unwrap();
    assert!(matches!(closing, Some(Ok(Message::Close(_))) | Some(Err(_)) | None));

    let room = state.registry.get("full").await.unwrap();
    assert_eq!(room.len().await, 4);
    assert!(!room.contains("E").await);
}

#[tokio::test]
async fn test_broadcast_and_unknown_target() {
    let (addr, _state) = spawn_server(Config::default()).await;

    let mut a = connect(addr, "user_id=A&room_id=r").await;
    next_json(&mut a).await;
    let mut b = connect(addr, "user_id=B&room_id=r").await;
    next_json(&mut b).await;
    assert_eq!(next_json(&mut a).await["type"], "user_joined");
    let mut c = connect(addr, "user_id=C&room_id=r").await;
    next_json(&mut c).await;
    assert_eq!(next_json(&mut a).await["type"], "user_joined");
    assert_eq!(next_json(&mut b).await["type"], "user_joined");

    send_json(&mut a, json!({ "type": "ice_candidate", "data": { "candidate": "x" } })).await;
    for peer in [&mut b, &mut c] {
        let msg = next_json(peer).await;
        assert_eq!(msg["type"], "ice_candidate");
        assert_eq!(msg["from"], "A");
    }

    send_json(&mut a, json!({ "type": "offer", "to": "ghost" })).await;
    let reply = next_json(&mut a).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["data"]["message"], "target user not in room");

    send_json(&mut b, json!({ "type": "ping-b" })).await;
    // A saw nothing of its own broadcast, only B's.
    let msg = next_json(&mut a).await;
    assert_eq!(msg["type"], "ping-b");
    assert_eq!(msg["from"], "B");
}

#[tokio::test]
async fn test_duplicate_participant_is_rejected() {
    let (addr, _state) = spawn_server(Config::default()).await;

    let mut first = connect(addr, "user_id=A&room_id=dup").await;
    next_json(&mut first).await;

    let mut second = connect(addr, "user_id=A&room_id=dup").await;
    let notice = next_json(&mut second).await;
    assert_eq!(notice["type"], "error");
}

#[tokio::test]
async fn test_empty_room_is_removed_after_last_leave() {
    let (addr, state) = spawn_server(Config::default()).await;

    let mut solo = connect(addr, "user_id=solo&room_id=lonely").await;
    next_json(&mut solo).await;
    assert!(state.registry.get("lonely").await.is_some());

    solo.close(None).await.unwrap();
    drop(solo);

    let gone = timeout(Duration::from_secs(5), async {
        while state.registry.get("lonely").await.is_some() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(gone.is_ok());
}
