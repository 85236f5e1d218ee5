//! WebSocket integration.
//!
//! Responsibilities:
//! - Upgrade HTTP -> WS
//! - Register the socket in the hub as a `ChannelConnection`
//! - Bind `?user=` (trusted, no auth) and join `?groups=a,b`
//! - Pump outbound payloads to the socket
//! - Lifecycle: ping + idle timeout, then `close_connection` on exit
//!
//! Inbound frames carry no protocol here; they only count as activity.

use std::net::SocketAddr;

use axum::{
    extract::{ws::Message, ws::WebSocket, ws::WebSocketUpgrade, ConnectInfo, Query, State},
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};
use tracing::Instrument;

use roomcast_core::error::{Result, RoomcastError};
use roomcast_core::ConnectionId;

use crate::app_state::AppState;
use crate::realtime::{split_groups, ChannelConnection, ConnHandle, Payload};

#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub groups: Option<String>,
}

fn connected_json(id: &ConnectionId) -> String {
    json!({
        "type": "connected",
        "connection_id": id,
    })
    .to_string()
}

pub async fn ws_upgrade(
    State(app): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
    Query(q): Query<WsQuery>,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = run_session(app, q, remote, socket).await {
            tracing::warn!(%remote, code = e.code().as_str(), error = %e, "session ended with error");
        }
    })
}

async fn run_session(app: AppState, q: WsQuery, remote: SocketAddr, socket: WebSocket) -> Result<()> {
    let hub = app.hub();
    let (conn, out_rx) = ChannelConnection::channel(app.cfg().gateway.outbound_queue);
    let handle: ConnHandle = conn;

    let data = json!({ "remote": remote.to_string(), "user": q.user });
    let id = hub.add_connection(&handle, Some(data));

    if let Some(user) = q.user.as_deref() {
        hub.bind_identity(user, id);
    }
    if let Some(groups) = q.groups.as_deref() {
        for group in split_groups(groups) {
            hub.join_group(group, id);
        }
    }

    app.metrics().ws_active_sessions.inc(&[]);
    let span = tracing::info_span!("ws_session", conn = %id, %remote);
    let result = pump(&app, id, out_rx, socket).instrument(span).await;

    hub.close_connection(&handle);
    app.metrics().ws_active_sessions.dec(&[]);
    result
}

async fn pump(app: &AppState, id: ConnectionId, mut out_rx: mpsc::Receiver<Payload>, socket: WebSocket) -> Result<()> {
    let (mut ws_tx, mut ws_rx) = socket.split();

    ws_tx
        .send(Message::Text(connected_json(&id)))
        .await
        .map_err(|e| RoomcastError::Internal(format!("ws send failed: {e}")))?;

    let gw = &app.cfg().gateway;
    let idle_timeout = Duration::from_millis(gw.idle_timeout_ms);
    let mut ping_tick = tokio::time::interval(Duration::from_millis(gw.ping_interval_ms));
    ping_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut last_activity = Instant::now();

    loop {
        tokio::select! {
            // outbound writer
            maybe_out = out_rx.recv() => {
                let Some(payload) = maybe_out else { break; };
                if ws_tx.send(payload.to_ws_message()).await.is_err() {
                    break;
                }
            }

            // inbound reader
            incoming = ws_rx.next() => {
                let Some(Ok(msg)) = incoming else { break; };
                last_activity = Instant::now();
                match msg {
                    Message::Ping(v) => {
                        if ws_tx.send(Message::Pong(v)).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }

            _ = ping_tick.tick() => {
                if ws_tx.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }

            // idle timeout
            _ = tokio::time::sleep(Duration::from_millis(250)) => {
                if last_activity.elapsed() >= idle_timeout {
                    tracing::info!("idle timeout");
                    break;
                }
            }
        }
    }

    Ok(())
}
