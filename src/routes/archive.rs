//! Streamed directory archive endpoint.

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;

use super::files::validate_path;
use super::{bad_request, gateway_error, ApiError};
use crate::sftp::archive::spawn_archive;
use crate::sftp::path::{base_name, parse_exclude};
use crate::sftp::RemoteFs;
use crate::AppState;

/// Query parameters for `GET /api/files/archive`.
#[derive(Deserialize)]
pub struct ArchiveQuery {
    /// Remote directory to archive.
    pub path: String,
    /// Comma-separated directory names to exclude, on top of the built-in
    /// skip set.
    #[serde(default)]
    pub exclude: String,
}

/// `GET /api/files/archive` — stream a directory tree as gzipped tar.
///
/// The response starts as soon as the first entries are walked, so a failure
/// deep in the tree can no longer change the status code; the stream ends
/// short instead and the error is logged server-side.
pub async fn archive(
    State(state): State<AppState>,
    Query(query): Query<ArchiveQuery>,
) -> Result<Response, ApiError> {
    let path = validate_path(&query.path)?;
    let sftp = state
        .sessions
        .checkout_sftp()
        .await
        .map_err(|e| gateway_error(&e))?;

    // Fail with a proper status before the stream starts.
    let stat = sftp.stat(&path).await.map_err(|e| gateway_error(&e))?;
    if !stat.is_dir {
        return Err(bad_request("Path is not a directory", "NOT_A_DIRECTORY"));
    }

    let exclude = parse_exclude(&query.exclude);
    let rx = spawn_archive(sftp, path.clone(), exclude);

    let stem = match base_name(&path) {
        "" => "archive",
        name => name,
    };
    let headers = [
        (header::CONTENT_TYPE, "application/gzip".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{stem}.tar.gz\""),
        ),
    ];
    Ok((headers, Body::from_stream(ReceiverStream::new(rx))).into_response())
}
