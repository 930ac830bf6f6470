//! SSH transport connection using russh.

use std::net::ToSocketAddrs;
use std::sync::Arc;
use std::time::Duration;

use russh::client;
use russh::keys::PublicKey;
use tracing::{debug, info};

use super::error::GatewayError;
use crate::config::SshConfig;

/// Credentials and endpoint for one connect attempt.
#[derive(Debug, Clone)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

/// Open and authenticate a new SSH transport.
///
/// The whole sequence (resolve, dial, handshake, password auth) is bounded by
/// `ssh.connect_timeout_secs`. Remote operations on the returned handle are
/// not time-bounded.
pub async fn connect_transport(
    params: &ConnectParams,
    config: &SshConfig,
) -> Result<client::Handle<GatewayHandler>, GatewayError> {
    let addr = format!("{}:{}", params.host, params.port);
    info!("Connecting to SSH server at {}", addr);

    let socket_addr = addr
        .to_socket_addrs()
        .map_err(|e| GatewayError::ConnectionFailed(format!("Failed to resolve {addr}: {e}")))?
        .next()
        .ok_or_else(|| GatewayError::ConnectionFailed(format!("No address found for {addr}")))?;

    let keepalive = config.keepalive_interval_secs;
    let ssh_config = client::Config {
        inactivity_timeout: None,
        keepalive_interval: (keepalive > 0).then(|| Duration::from_secs(keepalive)),
        keepalive_max: 3,
        ..Default::default()
    };

    let timeout_secs = config.connect_timeout_secs;
    let mut handle = tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        client::connect(Arc::new(ssh_config), socket_addr, GatewayHandler),
    )
    .await
    .map_err(|_| GatewayError::Timeout(timeout_secs))?
    .map_err(|e| GatewayError::ConnectionFailed(e.to_string()))?;

    debug!("SSH handshake completed for {}", addr);

    let authenticated = tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        handle.authenticate_password(&params.user, &params.password),
    )
    .await
    .map_err(|_| GatewayError::Timeout(timeout_secs))?
    .map_err(|e| GatewayError::AuthenticationFailed(e.to_string()))?;

    if !authenticated.success() {
        return Err(GatewayError::AuthenticationFailed(
            "Password rejected by server".to_string(),
        ));
    }

    info!("SSH authentication successful for {}@{}", params.user, addr);
    Ok(handle)
}

/// Client handler for russh callbacks.
///
/// Host keys are accepted without verification. The gateway connects to hosts
/// its operator names explicitly and holds no known-hosts state, so this is a
/// trust-on-first-use-equivalent exposure the operator accepts.
pub struct GatewayHandler;

impl client::Handler for GatewayHandler {
    type Error = GatewayError;

    async fn check_server_key(
        &mut self,
        _server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}
