//! One-shot remote command execution.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{bad_request, gateway_error, ApiError};
use crate::ssh::exec::run_command;
use crate::AppState;

/// Request body for `POST /api/exec`.
#[derive(Deserialize)]
pub struct ExecRequest {
    pub command: String,
}

/// `POST /api/exec` — run a command on the remote and capture its output.
///
/// A nonzero exit status is a successful response with that status in
/// `exit_code`; only transport and channel failures produce an error body.
pub async fn exec(
    State(state): State<AppState>,
    Json(payload): Json<ExecRequest>,
) -> Result<Json<Value>, ApiError> {
    if payload.command.trim().is_empty() {
        return Err(bad_request("Command must not be empty", "EMPTY_COMMAND"));
    }

    let pair = state
        .sessions
        .checkout()
        .await
        .map_err(|e| gateway_error(&e))?;

    let result = run_command(&pair.handle, &payload.command)
        .await
        .map_err(|e| gateway_error(&e))?;

    Ok(Json(json!({
        "output": result.output,
        "exit_code": result.exit_code,
    })))
}
