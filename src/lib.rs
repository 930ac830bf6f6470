#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]

//! sshgw library — building blocks of the SSH/SFTP gateway.
//!
//! - `ssh` — transport connection, session store, remote command execution
//! - `sftp` — remote filesystem handle, path policy, tree archiver, remover
//! - `routes` — REST API route handlers
//! - `config` — configuration loading
//! - `state` — shared application state

pub mod config;
pub mod routes;
pub mod sftp;
pub mod ssh;
pub mod state;

// Re-export key types at crate root for convenience.
pub use config::Config;
pub use ssh::store::SessionStore;
pub use state::AppState;
