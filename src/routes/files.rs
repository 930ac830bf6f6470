//! Remote file operation endpoints.
//!
//! - `GET    /api/files?path=...`        — list a directory
//! - `DELETE /api/files?path=...`        — delete a file or directory tree
//! - `GET    /api/files/read?path=...`   — read a file (base64 for binary)
//! - `PUT    /api/files`                 — write a file
//! - `POST   /api/files/rename`          — rename or move
//! - `POST   /api/files/mkdir`           — create a directory
//! - `GET    /api/files/exists?path=...` — existence check
//! - `GET    /api/files/download?path=...` — stream a file's raw bytes
//! - `POST   /api/files/upload?path=...` — multipart upload into a directory
//!
//! ## Path validation
//!
//! Remote paths must be absolute and must not contain `..` components or null
//! bytes. Beyond that the gateway imposes no containment: the remote server's
//! own permissions are the boundary.
//!
//! ## Size limits
//!
//! `read` is capped at `server.max_file_size` (default 5 MB); `download`
//! streams without a cap. Binary reads are returned base64-encoded.

use axum::body::Body;
use axum::extract::{Multipart, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::info;

use super::{bad_request, gateway_error, ApiError};
use crate::sftp::path::{base_name, ensure_dir, ensure_parents, join_remote, normalize};
use crate::sftp::remove::remove_path;
use crate::sftp::RemoteFs;
use crate::AppState;

/// Query parameter shared by the path-addressed endpoints.
#[derive(Deserialize)]
pub struct PathQuery {
    pub path: String,
}

/// JSON response for a successful file read.
#[derive(Serialize)]
pub struct FileReadResponse {
    pub path: String,
    /// File contents — UTF-8 text, or base64 if binary (see `encoding`).
    pub content: String,
    pub size: u64,
    /// Last-modified time as a Unix timestamp (seconds since epoch).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
    /// `"base64"` for binary files, absent for UTF-8 text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

/// Request body for `PUT /api/files`.
#[derive(Deserialize)]
pub struct FileWriteRequest {
    pub path: String,
    /// File contents — UTF-8 text, or base64 if `encoding` is `"base64"`.
    pub content: String,
    /// Create parent directories if they don't exist (default `false`).
    #[serde(default)]
    pub create_dirs: bool,
    /// Set to `"base64"` if `content` is base64-encoded binary.
    pub encoding: Option<String>,
}

/// Request body for `POST /api/files/rename`.
#[derive(Deserialize)]
pub struct RenameRequest {
    pub old_path: String,
    pub new_path: String,
}

/// Validate and normalize a remote path: absolute, no `..`, no null bytes.
pub(crate) fn validate_path(path: &str) -> Result<String, ApiError> {
    let normalized = normalize(path);
    if !normalized.starts_with('/') {
        return Err(bad_request("Path must be absolute", "INVALID_PATH"));
    }
    if normalized.contains('\0') {
        return Err(bad_request("Path contains null bytes", "INVALID_PATH"));
    }
    if normalized.split('/').any(|c| c == "..") {
        return Err(bad_request("Path traversal (..) not allowed", "INVALID_PATH"));
    }
    Ok(normalized)
}

/// `GET /api/files` — list a remote directory.
pub async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> Result<Json<Value>, ApiError> {
    let path = validate_path(&query.path)?;
    let sftp = state
        .sessions
        .checkout_sftp()
        .await
        .map_err(|e| gateway_error(&e))?;

    let entries = sftp.list_dir(&path).await.map_err(|e| gateway_error(&e))?;
    Ok(Json(json!({"path": path, "entries": entries})))
}

/// `DELETE /api/files` — delete a file, or a directory tree bottom-up.
///
/// Partial failure leaves already-deleted children gone; nothing is rolled
/// back.
pub async fn delete_path(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> Result<Json<Value>, ApiError> {
    let path = validate_path(&query.path)?;
    let sftp = state
        .sessions
        .checkout_sftp()
        .await
        .map_err(|e| gateway_error(&e))?;

    remove_path(sftp.as_ref(), &path)
        .await
        .map_err(|e| gateway_error(&e))?;

    info!("Deleted {}", path);
    Ok(Json(json!({"ok": true, "path": path})))
}

/// `GET /api/files/read` — read a file, returning UTF-8 text or base64 for
/// binary.
///
/// # Error codes
///
/// | HTTP | Code                | Meaning                          |
/// |------|---------------------|----------------------------------|
/// | 400  | `INVALID_PATH`      | Path is relative, has `..`, etc. |
/// | 403  | `PERMISSION_DENIED` | Remote refused the read          |
/// | 404  | `NOT_FOUND`         | File does not exist              |
/// | 500  | `REMOTE_IO`         | Directory, too large, other I/O  |
pub async fn read_file(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> Result<Json<Value>, ApiError> {
    let path = validate_path(&query.path)?;
    let sftp = state
        .sessions
        .checkout_sftp()
        .await
        .map_err(|e| gateway_error(&e))?;

    let stat = sftp.stat(&path).await.map_err(|e| gateway_error(&e))?;
    let bytes = sftp
        .read_capped(&path, state.config.server.max_file_size)
        .await
        .map_err(|e| gateway_error(&e))?;

    let modified = stat.modified.map(|m| m.to_string());
    let size = bytes.len() as u64;

    // UTF-8 text goes through as-is; binary falls back to base64.
    let response = if std::str::from_utf8(&bytes).is_ok() {
        // SAFETY: we just validated UTF-8 above.
        let text = unsafe { String::from_utf8_unchecked(bytes) };
        FileReadResponse {
            path,
            content: text,
            size,
            modified,
            encoding: None,
        }
    } else {
        use base64::Engine;
        FileReadResponse {
            path,
            content: base64::engine::general_purpose::STANDARD.encode(&bytes),
            size,
            modified,
            encoding: Some("base64".to_string()),
        }
    };
    Ok(Json(serde_json::to_value(response).unwrap_or(Value::Null)))
}

/// `PUT /api/files` — create or overwrite a remote file.
pub async fn put_file(
    State(state): State<AppState>,
    Json(payload): Json<FileWriteRequest>,
) -> Result<Json<Value>, ApiError> {
    let path = validate_path(&payload.path)?;

    let bytes = if payload.encoding.as_deref() == Some("base64") {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD
            .decode(&payload.content)
            .map_err(|e| bad_request(&format!("Invalid base64: {e}"), "INVALID_CONTENT"))?
    } else {
        payload.content.into_bytes()
    };

    let sftp = state
        .sessions
        .checkout_sftp()
        .await
        .map_err(|e| gateway_error(&e))?;

    if payload.create_dirs {
        if let Some((parent, _)) = path.rsplit_once('/') {
            if !parent.is_empty() {
                ensure_parents(&sftp, "/", parent).await;
            }
        }
    }

    sftp.write_all(&path, &bytes)
        .await
        .map_err(|e| gateway_error(&e))?;

    info!("Wrote {} bytes to {}", bytes.len(), path);
    Ok(Json(json!({"ok": true, "path": path, "size": bytes.len()})))
}

/// `POST /api/files/rename` — rename or move within the remote filesystem.
pub async fn rename(
    State(state): State<AppState>,
    Json(payload): Json<RenameRequest>,
) -> Result<Json<Value>, ApiError> {
    let old_path = validate_path(&payload.old_path)?;
    let new_path = validate_path(&payload.new_path)?;
    let sftp = state
        .sessions
        .checkout_sftp()
        .await
        .map_err(|e| gateway_error(&e))?;

    sftp.rename(&old_path, &new_path)
        .await
        .map_err(|e| gateway_error(&e))?;
    Ok(Json(json!({"ok": true, "old_path": old_path, "new_path": new_path})))
}

/// `POST /api/files/mkdir` — create a directory. A path that already exists
/// as a directory succeeds.
pub async fn mkdir(
    State(state): State<AppState>,
    Json(payload): Json<PathQuery>,
) -> Result<Json<Value>, ApiError> {
    let path = validate_path(&payload.path)?;
    let sftp = state
        .sessions
        .checkout_sftp()
        .await
        .map_err(|e| gateway_error(&e))?;

    ensure_dir(&sftp, &path)
        .await
        .map_err(|e| gateway_error(&e))?;
    Ok(Json(json!({"ok": true, "path": path})))
}

/// `GET /api/files/exists` — existence check, never an error for a missing
/// path.
pub async fn exists(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> Result<Json<Value>, ApiError> {
    let path = validate_path(&query.path)?;
    let sftp = state
        .sessions
        .checkout_sftp()
        .await
        .map_err(|e| gateway_error(&e))?;

    let exists = sftp.exists(&path).await;
    Ok(Json(json!({"path": path, "exists": exists})))
}

/// `GET /api/files/download` — stream a file's raw bytes, uncapped.
pub async fn download(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> Result<Response, ApiError> {
    let path = validate_path(&query.path)?;
    let sftp = state
        .sessions
        .checkout_sftp()
        .await
        .map_err(|e| gateway_error(&e))?;

    let stat = sftp.stat(&path).await.map_err(|e| gateway_error(&e))?;
    if stat.is_dir {
        return Err(bad_request(
            "Path is a directory, use the archive endpoint",
            "IS_DIRECTORY",
        ));
    }

    let file = sftp.open_read(&path).await.map_err(|e| gateway_error(&e))?;
    let filename = base_name(&path).to_string();

    let headers = [
        (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        (header::CONTENT_LENGTH, stat.size.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        ),
    ];
    Ok((headers, Body::from_stream(ReaderStream::new(file))).into_response())
}

/// `POST /api/files/upload?path=...` — multipart upload into a remote
/// directory.
///
/// File names may carry relative subpaths; missing intermediate directories
/// are created on the way. Each part streams straight to the remote without
/// buffering the whole file.
pub async fn upload(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let dest = validate_path(&query.path)?;
    let sftp = state
        .sessions
        .checkout_sftp()
        .await
        .map_err(|e| gateway_error(&e))?;

    let mut uploaded = Vec::new();
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(&format!("Malformed multipart body: {e}"), "INVALID_CONTENT"))?
    {
        let Some(raw_name) = field.file_name().map(normalize) else {
            continue;
        };
        let rel = raw_name.trim_start_matches('/');
        if rel.is_empty() || rel.split('/').any(|c| c == "..") {
            return Err(bad_request("Invalid file name in upload", "INVALID_PATH"));
        }

        if let Some((subdir, _)) = rel.rsplit_once('/') {
            ensure_parents(&sftp, &dest, subdir).await;
        }

        let remote = join_remote(&dest, rel);
        let mut file = sftp
            .create_write(&remote)
            .await
            .map_err(|e| gateway_error(&e))?;

        while let Some(chunk) = field.chunk().await.map_err(|e| {
            bad_request(&format!("Upload stream failed: {e}"), "INVALID_CONTENT")
        })? {
            file.write_all(&chunk)
                .await
                .map_err(|e| gateway_error(&crate::ssh::GatewayError::Remote(e.to_string())))?;
        }
        file.flush()
            .await
            .map_err(|e| gateway_error(&crate::ssh::GatewayError::Remote(e.to_string())))?;

        info!("Uploaded {}", remote);
        uploaded.push(rel.to_string());
    }

    if uploaded.is_empty() {
        return Err(bad_request("No file fields in upload", "INVALID_CONTENT"));
    }
    Ok(Json(json!({"ok": true, "path": dest, "uploaded": uploaded})))
}
