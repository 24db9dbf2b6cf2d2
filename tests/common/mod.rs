//! In-process room server: replays a room's history on connect, then
//! forwards whatever is pushed to that room.
#![allow(dead_code)]

use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract::{ws::{Message, WebSocket, WebSocketUpgrade}, Extension, Query},
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, watch, RwLock};

use ride_chat::{ChatConfig, ChatMessage, RoomView};

pub const CLOSE: &str = "__close__";

pub type Tx = broadcast::Sender<String>;

/* ------------ per room ------------ */
#[derive(Default)]
pub struct RoomState {
    pub tx:       Option<Tx>,
    pub history:  Option<String>,    // raw frame sent on connect
    pub received: Vec<String>,       // raw frames from clients
}
pub type RoomMap = Arc<RwLock<HashMap<String, RoomState>>>;

#[derive(Deserialize)]
struct WsQuery { #[serde(rename = "roomId")] room_id: String }

#[derive(Clone)]
pub struct TestServer {
    pub addr:  SocketAddr,
    pub rooms: RoomMap,
    pub echo:  bool,
}

impl TestServer {
    pub async fn start(echo: bool) -> Self {
        let rooms = RoomMap::default();
        let app = Router::new()
            .route("/ws", get(ws_handler))
            .layer(Extension(rooms.clone()))
            .layer(Extension(Echo(echo)));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        Self { addr, rooms, echo }
    }

    pub fn config(&self) -> ChatConfig {
        ChatConfig::try_from(format!("http://{}", self.addr).as_str()).unwrap()
    }

    pub async fn set_history(&self, room: &str, raw: impl Into<String>) {
        self.rooms.write().await.entry(room.into()).or_default().history = Some(raw.into());
    }

    /// Push a raw frame to everyone in `room`.
    pub async fn push(&self, room: &str, raw: impl Into<String>) {
        let tx = room_tx(&self.rooms, room).await;
        tx.send(raw.into()).ok();
    }

    pub async fn received(&self, room: &str) -> Vec<String> {
        self.rooms.read().await.get(room).map(|r| r.received.clone()).unwrap_or_default()
    }
}

#[derive(Clone, Copy)]
struct Echo(bool);

async fn room_tx(rooms: &RoomMap, room: &str) -> Tx {
    let mut m = rooms.write().await;
    let st = m.entry(room.to_string()).or_default();
    st.tx.get_or_insert_with(|| broadcast::channel(100).0).clone()
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(q): Query<WsQuery>,
    Extension(rooms): Extension<RoomMap>,
    Extension(echo): Extension<Echo>,
) -> impl IntoResponse {
    let tx = room_tx(&rooms, &q.room_id).await;
    ws.on_upgrade(move |s| user_ws(s, q.room_id, tx, rooms, echo.0))
}

/* ---------------- per user ---------------- */
async fn user_ws(sock: WebSocket, room: String, tx: Tx, rooms: RoomMap, echo: bool) {
    let mut rx = tx.subscribe();
    let (mut sink, mut stream) = sock.split();

    let history = rooms.read().await.get(&room).and_then(|r| r.history.clone());
    if let Some(h) = history {
        if sink.send(Message::Text(h)).await.is_err() { return; }
    }

    loop {
        tokio::select! {
            out = rx.recv() => match out {
                Ok(raw) if raw == CLOSE => { let _ = sink.close().await; break; }
                Ok(raw) => { if sink.send(Message::Text(raw)).await.is_err() { break; } }
                Err(_) => break,
            },
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(raw))) => {
                    rooms.write().await.entry(room.clone()).or_default().received.push(raw.clone());
                    if echo { tx.send(raw).ok(); }
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

pub fn msg(user: &str, content: &str, room: &str, ts: &str) -> ChatMessage {
    ChatMessage {
        username:  user.into(),
        content:   content.into(),
        room_id:   room.into(),
        timestamp: ts.into(),
        sender_picture: None,
        sender_id: None,
    }
}

/// Wait until the view satisfies `f`, or panic after a few seconds.
pub async fn wait_until(feed: &mut watch::Receiver<RoomView>, f: impl FnMut(&RoomView) -> bool) -> RoomView {
    tokio::time::timeout(Duration::from_secs(5), feed.wait_for(f))
        .await
        .expect("timed out waiting for room view")
        .expect("session dropped")
        .clone()
}

/// Wait until the server has recorded `n` frames from clients in `room`.
pub async fn wait_received(server: &TestServer, room: &str, n: usize) -> Vec<String> {
    for _ in 0..100 {
        let got = server.received(room).await;
        if got.len() >= n { return got; }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("server never received {n} frames in {room}");
}
