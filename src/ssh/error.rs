//! Gateway error types.
//!
//! One enum covers the whole data plane so route handlers can map each
//! variant to an HTTP status in a single place:
//!
//! | Variant            | Meaning                                        |
//! |--------------------|------------------------------------------------|
//! | `ConnectionFailed` | dial / handshake failure on connect            |
//! | `AuthenticationFailed` | server rejected the credentials            |
//! | `Timeout`          | the bounded connect attempt expired            |
//! | `NotConnected`     | data-plane call with no live session           |
//! | `NotFound`         | remote path does not exist                     |
//! | `PermissionDenied` | remote refused the operation                   |
//! | `Remote`           | any other remote I/O failure                   |
//! | `Channel`          | exec/SFTP channel could not be opened or used  |

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("SSH connection failed: {0}")]
    ConnectionFailed(String),

    #[error("SSH authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Connection timed out after {0}s")]
    Timeout(u64),

    #[error("Not connected")]
    NotConnected,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Remote I/O error: {0}")]
    Remote(String),

    #[error("Channel error: {0}")]
    Channel(String),
}

impl GatewayError {
    /// Machine-readable error code included in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConnectionFailed(_) => "CONNECTION_FAILED",
            Self::AuthenticationFailed(_) => "AUTH_FAILED",
            Self::Timeout(_) => "CONNECT_TIMEOUT",
            Self::NotConnected => "NOT_CONNECTED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::PermissionDenied(_) => "PERMISSION_DENIED",
            Self::Remote(_) => "REMOTE_IO",
            Self::Channel(_) => "CHANNEL_ERROR",
        }
    }
}

impl From<russh::Error> for GatewayError {
    fn from(err: russh::Error) -> Self {
        GatewayError::ConnectionFailed(err.to_string())
    }
}
