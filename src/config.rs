//! Configuration loading and defaults.
//!
//! Configuration is resolved in order of precedence (highest wins):
//!
//! 1. **Environment variables** — `SSHGW_LISTEN`
//! 2. **Config file** — path via `--config <path>`, or `sshgw.toml` in CWD
//! 3. **Compiled defaults** — see each field's default value below
//!
//! The TOML file mirrors the struct hierarchy:
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:8899"
//! max_file_size = 5242880  # 5 MB cap for whole-file read/write
//!
//! [ssh]
//! connect_timeout_secs = 10
//! keepalive_interval_secs = 30
//!
//! [logging]
//! level = "info"
//! ```

use serde::Deserialize;
use std::path::Path;

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ssh: SshConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server and resource-limit settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind (default `0.0.0.0:8899`).
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Maximum file size in bytes for whole-file read/write (default 5 MB).
    /// Streamed download, upload and archive endpoints are not capped.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,
}

/// SSH transport settings. Credentials are per-request, never configured.
#[derive(Debug, Clone, Deserialize)]
pub struct SshConfig {
    /// Timeout for the initial TCP + handshake + auth sequence (default 10s).
    /// Individual remote operations after connect are not time-bounded.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Transport keepalive interval in seconds (default 30, 0 disables).
    #[serde(default = "default_keepalive_interval_secs")]
    pub keepalive_interval_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter level (default `info`). Overridden by `RUST_LOG` env var.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_listen() -> String {
    "0.0.0.0:8899".to_string()
}
fn default_max_file_size() -> usize {
    5 * 1024 * 1024 // 5 MB
}
fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_keepalive_interval_secs() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_file_size: default_max_file_size(),
        }
    }
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            keepalive_interval_secs: default_keepalive_interval_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration with the precedence chain: env vars > file > defaults.
    ///
    /// If `path` is `Some`, reads that file (panics on failure). Otherwise looks
    /// for `sshgw.toml` in the current directory, falling back to compiled defaults.
    pub fn load(path: Option<&str>) -> Self {
        let mut config = if let Some(p) = path {
            let content = std::fs::read_to_string(p)
                .unwrap_or_else(|e| panic!("Failed to read config file {p}: {e}"));
            toml::from_str(&content)
                .unwrap_or_else(|e| panic!("Failed to parse config file {p}: {e}"))
        } else if Path::new("sshgw.toml").exists() {
            let content = std::fs::read_to_string("sshgw.toml").expect("Failed to read sshgw.toml");
            toml::from_str(&content).expect("Failed to parse sshgw.toml")
        } else {
            Config {
                server: ServerConfig::default(),
                ssh: SshConfig::default(),
                logging: LoggingConfig::default(),
            }
        };

        // Env var overrides
        if let Ok(listen) = std::env::var("SSHGW_LISTEN") {
            config.server.listen = listen;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_for_empty_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:8899");
        assert_eq!(config.server.max_file_size, 5 * 1024 * 1024);
        assert_eq!(config.ssh.connect_timeout_secs, 10);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            listen = "127.0.0.1:9000"

            [ssh]
            connect_timeout_secs = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:9000");
        assert_eq!(config.server.max_file_size, 5 * 1024 * 1024);
        assert_eq!(config.ssh.connect_timeout_secs, 3);
        assert_eq!(config.ssh.keepalive_interval_secs, 30);
    }
}
