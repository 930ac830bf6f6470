//! Single-session store.
//!
//! The gateway serves exactly one remote machine at a time: a guarded cell
//! holds either nothing or one connected pair (SSH transport + SFTP handle).
//! A successful connect atomically replaces whatever was there before.
//!
//! The lock is held only to swap or clone the pair, never across remote I/O.
//! Checkouts hand back `Arc` clones, so in-flight operations on a replaced
//! session run to completion against the old transport while new requests see
//! the new one.

use std::sync::Arc;

use russh::client;
use russh::Disconnect;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::client::{connect_transport, ConnectParams, GatewayHandler};
use super::error::GatewayError;
use crate::config::SshConfig;
use crate::sftp::SftpHandle;

/// One connected session: the SSH transport and the SFTP handle derived
/// from it. Both are shared by `Arc` so checkouts are cheap.
#[derive(Clone)]
pub struct SessionPair {
    pub handle: Arc<client::Handle<GatewayHandler>>,
    pub sftp: Arc<SftpHandle>,
}

/// Guarded cell holding the active session, if any.
pub struct SessionStore {
    current: Mutex<Option<SessionPair>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    /// Establish a new session, replacing any existing one.
    ///
    /// The old session (if any) is torn down before the new transport is
    /// dialed. If the transport connects but the SFTP subsystem cannot be
    /// derived, the transport is released and the store is left empty; a
    /// session is never stored half-formed.
    pub async fn connect(
        &self,
        params: &ConnectParams,
        config: &SshConfig,
    ) -> Result<(), GatewayError> {
        let mut guard = self.current.lock().await;

        if let Some(old) = guard.take() {
            info!("Replacing existing session");
            teardown(&old).await;
        }

        let handle = connect_transport(params, config).await?;

        let sftp = match SftpHandle::open(&handle).await {
            Ok(sftp) => sftp,
            Err(e) => {
                let _ = handle
                    .disconnect(Disconnect::ByApplication, "SFTP setup failed", "en")
                    .await;
                return Err(e);
            }
        };

        *guard = Some(SessionPair {
            handle: Arc::new(handle),
            sftp: Arc::new(sftp),
        });
        Ok(())
    }

    /// Clone the active session out of the store.
    pub async fn checkout(&self) -> Result<SessionPair, GatewayError> {
        self.current
            .lock()
            .await
            .clone()
            .ok_or(GatewayError::NotConnected)
    }

    /// Clone the active SFTP handle out of the store.
    pub async fn checkout_sftp(&self) -> Result<Arc<SftpHandle>, GatewayError> {
        Ok(self.checkout().await?.sftp)
    }

    pub async fn is_connected(&self) -> bool {
        self.current.lock().await.is_some()
    }

    /// Tear down the active session. Idempotent: succeeds when no session
    /// exists.
    pub async fn disconnect(&self) {
        let taken = self.current.lock().await.take();
        if let Some(pair) = taken {
            teardown(&pair).await;
            info!("Session closed");
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Best-effort transport shutdown. Dropping the pair closes the SFTP channel;
/// the explicit disconnect tells the server why.
async fn teardown(pair: &SessionPair) {
    if let Err(e) = pair
        .handle
        .disconnect(Disconnect::ByApplication, "Session closed by gateway", "en")
        .await
    {
        warn!("Error during SSH disconnect: {}", e);
    }
}
