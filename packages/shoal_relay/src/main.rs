//! `shoal-relay`: development relay for the shoal chat protocol.
//!
//! Fans chat posts out to every connection in the same room, applies renames
//! silently, and retains the latest skin record per identity hash so each
//! new connection starts from one bulk snapshot. The production relay is a
//! separate deployment; this one exists for local development and tests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use clap::Parser;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shoal-relay")]
#[command(about = "Development relay for the shoal chat protocol")]
struct Cli {
    /// Bind address.
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: SocketAddr,
}

/// Per-room broadcast channel plus the retained skin table.
struct Room {
    tx: broadcast::Sender<String>,
    skins: HashMap<String, (String, String)>,
}

impl Room {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self {
            tx,
            skins: HashMap::new(),
        }
    }

    /// Merge one update into the retained table. Empty slots never erase
    /// what an earlier update established.
    fn merge_skin(&mut self, h: &str, s1: Option<&str>, s2: Option<&str>) {
        let slot = self.skins.entry(h.to_string()).or_default();
        if let Some(v) = s1.map(str::trim).filter(|v| !v.is_empty()) {
            slot.0 = v.to_string();
        }
        if let Some(v) = s2.map(str::trim).filter(|v| !v.is_empty()) {
            slot.1 = v.to_string();
        }
    }

    /// Retained skins as one bulk frame, replayed to joining connections.
    fn bulk_frame(&self) -> Option<String> {
        if self.skins.is_empty() {
            return None;
        }
        let data: Vec<Value> = self
            .skins
            .iter()
            .map(|(h, (s1, s2))| json!([h, s1, s2]))
            .collect();
        Some(json!({"t": "skin", "op": "bulk", "data": data}).to_string())
    }
}

type Rooms = Arc<Mutex<HashMap<String, Room>>>;

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    State(rooms): State<Rooms>,
) -> impl IntoResponse {
    let room = params
        .get("room")
        .cloned()
        .unwrap_or_else(|| "global".to_string());
    ws.on_upgrade(move |socket| handle_socket(socket, room, rooms))
}

async fn handle_socket(socket: WebSocket, room_name: String, rooms: Rooms) {
    let (room_tx, bulk) = {
        let mut rooms = rooms.lock().await;
        let room = rooms.entry(room_name.clone()).or_insert_with(Room::new);
        (room.tx.clone(), room.bulk_frame())
    };
    let mut room_rx = room_tx.subscribe();
    let (mut sink, mut source) = socket.split();

    if let Some(frame) = bulk {
        if sink.send(Message::Text(frame.into())).await.is_err() {
            return;
        }
    }

    // Connections stay anonymous until they rename.
    let mut name = {
        use rand::Rng;
        format!("guest-{:04x}", rand::rng().random::<u16>())
    };
    info!(room = %room_name, "connection joined");

    loop {
        tokio::select! {
            forwarded = room_rx.recv() => match forwarded {
                Ok(frame) => {
                    if sink.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "slow consumer lagged behind the room feed");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            msg = source.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => {
                        debug!(%err, "socket error");
                        break;
                    }
                };
                let Ok(value) = serde_json::from_str::<Value>(text.as_str()) else {
                    debug!("discarding malformed frame");
                    continue;
                };
                handle_frame(&value, &mut name, &room_name, &rooms, &room_tx).await;
            }
        }
    }
    info!(room = %room_name, user = %name, "connection left");
}

async fn handle_frame(
    value: &Value,
    name: &mut String,
    room_name: &str,
    rooms: &Rooms,
    room_tx: &broadcast::Sender<String>,
) {
    if value.get("t").and_then(Value::as_str) == Some("skin") {
        // Retain for bulk replay, then fan the frame out verbatim. Unknown
        // ops pass through untouched; clients skip what they don't know.
        if value.get("op").and_then(Value::as_str) == Some("update") {
            if let Some(h) = value
                .get("h")
                .and_then(Value::as_str)
                .filter(|h| !h.is_empty())
            {
                let mut rooms = rooms.lock().await;
                if let Some(room) = rooms.get_mut(room_name) {
                    room.merge_skin(
                        h,
                        value.get("s1").and_then(Value::as_str),
                        value.get("s2").and_then(Value::as_str),
                    );
                }
            }
            let _ = room_tx.send(value.to_string());
        }
        return;
    }
    match value.get("type").and_then(Value::as_str) {
        Some("say") => {
            let text = value.get("text").and_then(Value::as_str).unwrap_or_default();
            let _ = room_tx.send(json!({"type": "msg", "from": name, "text": text}).to_string());
        }
        Some("rename") => {
            if let Some(n) = value
                .get("name")
                .and_then(Value::as_str)
                .filter(|n| !n.is_empty())
            {
                debug!(from = %name, to = %n, "rename");
                *name = n.to_string();
            }
        }
        _ => {}
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let rooms: Rooms = Arc::new(Mutex::new(HashMap::new()));
    let app = Router::new()
        .route("/chat", get(ws_handler))
        .with_state(rooms);

    let listener = tokio::net::TcpListener::bind(cli.listen)
        .await
        .context("binding listen address")?;
    info!(listen = %cli.listen, "shoal-relay up");
    axum::serve(listener, app).await.context("serving")?;
    Ok(())
}
