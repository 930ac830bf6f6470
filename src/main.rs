#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # sshgw
//!
//! HTTP gateway to one SSH/SFTP session.
//!
//! sshgw exposes a REST API that lets a browser-based client manage files,
//! run commands, and query system facts on a remote machine over SSH. The
//! gateway holds at most one session at a time; a new connect replaces the
//! previous one.
//!
//! ## API surface
//!
//! | Method | Path                  | Description                           |
//! |--------|-----------------------|---------------------------------------|
//! | GET    | `/api/health`         | Liveness probe + session status       |
//! | POST   | `/api/connect`        | Open a session (host/user/password)   |
//! | POST   | `/api/disconnect`     | Close the session                     |
//! | GET    | `/api/files`          | List a remote directory               |
//! | DELETE | `/api/files`          | Delete a file or directory tree       |
//! | GET    | `/api/files/read`     | Read a file (base64 for binary)       |
//! | PUT    | `/api/files`          | Write a file                          |
//! | POST   | `/api/files/rename`   | Rename or move                        |
//! | POST   | `/api/files/mkdir`    | Create a directory                    |
//! | GET    | `/api/files/exists`   | Existence check                       |
//! | GET    | `/api/files/download` | Stream a file's raw bytes             |
//! | POST   | `/api/files/upload`   | Multipart upload into a directory     |
//! | GET    | `/api/files/archive`  | Stream a directory tree as tar.gz     |
//! | POST   | `/api/exec`           | One-shot remote command execution     |
//! | GET    | `/api/info`           | Remote system facts                   |
//! | GET    | `/api/disks`          | Remote mounted filesystems            |

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use sshgw::{routes, AppState, Config};

/// HTTP gateway to one SSH/SFTP session.
#[derive(Parser)]
#[command(name = "sshgw", version)]
struct Cli {
    /// Path to TOML config file.
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref());

    // Initialize tracing
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone());
    tracing_subscriber::fmt().with_env_filter(log_filter).init();

    info!("sshgw v{} starting", env!("CARGO_PKG_VERSION"));
    info!("Listening on {}", config.server.listen);

    let state = AppState::new(config);

    // Browser clients are served from a different origin; Content-Disposition
    // must be exposed for downloads to keep their filenames.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([
            axum::http::header::CONTENT_DISPOSITION,
            axum::http::header::CONTENT_LENGTH,
        ]);

    let app = Router::new()
        .route("/api/health", get(routes::health::health))
        .route("/api/connect", post(routes::session::connect))
        .route("/api/disconnect", post(routes::session::disconnect))
        .route(
            "/api/files",
            get(routes::files::list_files)
                .put(routes::files::put_file)
                .delete(routes::files::delete_path),
        )
        .route("/api/files/read", get(routes::files::read_file))
        .route("/api/files/rename", post(routes::files::rename))
        .route("/api/files/mkdir", post(routes::files::mkdir))
        .route("/api/files/exists", get(routes::files::exists))
        .route("/api/files/download", get(routes::files::download))
        .route(
            "/api/files/upload",
            post(routes::files::upload).layer(DefaultBodyLimit::disable()),
        )
        .route("/api/files/archive", get(routes::archive::archive))
        .route("/api/exec", post(routes::exec::exec))
        .route("/api/info", get(routes::info::info))
        .route("/api/disks", get(routes::info::disks))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let listener = TcpListener::bind(&state.config.server.listen)
        .await
        .expect("Failed to bind");

    info!("Server ready");

    // Graceful shutdown
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("Failed to register SIGTERM");
            tokio::select! {
                _ = ctrl_c => info!("Received SIGINT"),
                _ = sigterm.recv() => info!("Received SIGTERM"),
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
            info!("Received SIGINT");
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .expect("Server error");

    info!("Shutting down...");
    state.sessions.disconnect().await;
    info!("Goodbye");
}
