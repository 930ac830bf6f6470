//! Session lifecycle endpoints.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::{gateway_error, ApiError};
use crate::ssh::client::ConnectParams;
use crate::AppState;

/// Request body for `POST /api/connect`.
#[derive(Deserialize)]
pub struct ConnectRequest {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
}

fn default_port() -> u16 {
    22
}

/// `POST /api/connect` — establish a session, replacing any existing one.
///
/// # Error codes
///
/// | HTTP | Code                | Meaning                         |
/// |------|---------------------|---------------------------------|
/// | 401  | `AUTH_FAILED`       | Server rejected the credentials |
/// | 502  | `CONNECTION_FAILED` | Dial or handshake failure       |
/// | 504  | `CONNECT_TIMEOUT`   | Connect attempt timed out       |
pub async fn connect(
    State(state): State<AppState>,
    Json(payload): Json<ConnectRequest>,
) -> Result<Json<Value>, ApiError> {
    let params = ConnectParams {
        host: payload.host,
        port: payload.port,
        user: payload.username,
        password: payload.password,
    };

    state
        .sessions
        .connect(&params, &state.config.ssh)
        .await
        .map_err(|e| gateway_error(&e))?;

    info!("Session established with {}:{}", params.host, params.port);
    Ok(Json(json!({
        "ok": true,
        "host": params.host,
        "port": params.port,
        "username": params.user,
    })))
}

/// `POST /api/disconnect` — tear down the session. Succeeds when nothing is
/// connected.
pub async fn disconnect(State(state): State<AppState>) -> Json<Value> {
    state.sessions.disconnect().await;
    Json(json!({"ok": true}))
}
