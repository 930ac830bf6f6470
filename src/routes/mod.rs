//! HTTP route handlers.
//!
//! ```text
//! health.rs   — GET  /api/health
//! session.rs  — POST /api/connect, POST /api/disconnect
//! files.rs    — remote file operations (list, read, write, rename, mkdir,
//!               exists, delete, download, upload)
//! archive.rs  — GET  /api/files/archive (streamed tar.gz)
//! exec.rs     — POST /api/exec
//! info.rs     — GET  /api/info, GET /api/disks
//! ```
//!
//! Every error response carries `{"error": <message>, "code": <CODE>}`.

pub mod archive;
pub mod exec;
pub mod files;
pub mod health;
pub mod info;
pub mod session;

use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::ssh::GatewayError;

/// The error half of every handler's `Result`.
pub type ApiError = (StatusCode, Json<Value>);

/// Map a gateway error onto an HTTP status and JSON error body.
pub fn gateway_error(err: &GatewayError) -> ApiError {
    let status = match err {
        GatewayError::ConnectionFailed(_) => StatusCode::BAD_GATEWAY,
        GatewayError::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
        GatewayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        GatewayError::NotConnected => StatusCode::BAD_REQUEST,
        GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
        GatewayError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        GatewayError::Remote(_) | GatewayError::Channel(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(json!({"error": err.to_string(), "code": err.code()})),
    )
}

/// 400 with an explicit code, for request-shape problems.
pub fn bad_request(message: &str, code: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": message, "code": code})),
    )
}
