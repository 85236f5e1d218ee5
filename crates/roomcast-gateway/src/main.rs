//! roomcast reference gateway.
//!
//! - WebSocket endpoint: /v1/ws?user=...&groups=a,b
//! - /healthz, /metrics
//! - Config: `ROOMCAST_CONFIG` (default `roomcast.yaml`)

use std::net::SocketAddr;

use tracing_subscriber::{fmt, EnvFilter};

use roomcast_core::error::{Result, RoomcastError};
use roomcast_gateway::{app_state, config, router};

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::var("ROOMCAST_CONFIG").unwrap_or_else(|_| "roomcast.yaml".to_string());
    let cfg = config::load_from_file(&path)?;
    let listen: SocketAddr = cfg
        .gateway
        .listen
        .parse()
        .map_err(|e| RoomcastError::BadRequest(format!("gateway.listen must be a valid SocketAddr: {e}")))?;

    let state = app_state::AppState::new(cfg);
    let app = router::build_router(state);

    tracing::info!(%listen, "roomcast-gateway starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| RoomcastError::Internal(format!("bind failed: {e}")))?;

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(|e| RoomcastError::Internal(format!("server failed: {e}")))
}
