//! SFTP session wrapper.
//!
//! `SftpHandle` owns the file-transfer handle derived from the SSH transport
//! and exposes the filesystem-style operations the routes need. Remote
//! failures are classified into the gateway error taxonomy by message
//! inspection (the SFTP status text is the only portable signal across
//! server implementations).
//!
//! The tree walkers (archiver, remover) consume the narrower [`RemoteFs`]
//! trait instead of `SftpHandle` directly, so tests can drive them against an
//! in-memory filesystem.

use async_trait::async_trait;
use russh::client;
use russh_sftp::client::error::Error as SftpError;
use russh_sftp::client::fs::File;
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::OpenFlags;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use crate::ssh::client::GatewayHandler;
use crate::ssh::error::GatewayError;

/// One directory-listing entry, as reported by the remote. Ephemeral:
/// re-fetched on every listing request, never cached.
#[derive(Debug, Clone, Serialize)]
pub struct RemoteEntry {
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
    /// Modification time as Unix seconds, when the server reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<u64>,
}

/// Stat result for a single remote path.
#[derive(Debug, Clone, Copy)]
pub struct RemoteStat {
    pub size: u64,
    pub is_dir: bool,
    pub modified: Option<u64>,
}

/// Minimal remote-filesystem capability consumed by the tree walkers.
///
/// Every call is fallible and every failure is propagated, never swallowed;
/// recursion depth is bounded only by the remote tree itself.
#[async_trait]
pub trait RemoteFs: Send + Sync {
    type File: AsyncRead + Send + Unpin;

    async fn list_dir(&self, path: &str) -> Result<Vec<RemoteEntry>, GatewayError>;
    async fn stat(&self, path: &str) -> Result<RemoteStat, GatewayError>;
    async fn open_read(&self, path: &str) -> Result<Self::File, GatewayError>;
    async fn remove_file(&self, path: &str) -> Result<(), GatewayError>;
    async fn remove_dir(&self, path: &str) -> Result<(), GatewayError>;
    async fn create_dir(&self, path: &str) -> Result<(), GatewayError>;
}

/// File-transfer handle derived from the SSH transport.
pub struct SftpHandle {
    sftp: SftpSession,
}

impl SftpHandle {
    /// Derive a file-transfer handle from an authenticated transport by
    /// opening a dedicated channel and requesting the `sftp` subsystem.
    pub async fn open(handle: &client::Handle<GatewayHandler>) -> Result<Self, GatewayError> {
        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| GatewayError::Channel(format!("Failed to open SFTP channel: {e}")))?;

        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| GatewayError::Channel(format!("SFTP subsystem unavailable: {e}")))?;

        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| GatewayError::Channel(format!("SFTP session failed: {e}")))?;

        debug!("SFTP subsystem opened");
        Ok(Self { sftp })
    }

    /// True when `path` exists on the remote, regardless of its type.
    pub async fn exists(&self, path: &str) -> bool {
        self.sftp.metadata(path).await.is_ok()
    }

    /// Read a whole file into memory, refusing files larger than `max_size`.
    pub async fn read_capped(&self, path: &str, max_size: usize) -> Result<Vec<u8>, GatewayError> {
        read_capped(self, path, max_size).await
    }

    /// Create or truncate a remote file and write `content` to it.
    pub async fn write_all(&self, path: &str, content: &[u8]) -> Result<(), GatewayError> {
        let mut file = self
            .sftp
            .open_with_flags(
                path,
                OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE,
            )
            .await
            .map_err(|e| map_sftp_error(&e, path))?;

        file.write_all(content)
            .await
            .map_err(|e| GatewayError::Remote(format!("Failed to write {path}: {e}")))?;
        file.flush()
            .await
            .map_err(|e| GatewayError::Remote(format!("Failed to flush {path}: {e}")))?;
        Ok(())
    }

    /// Create or truncate a remote file for incremental writing (uploads).
    pub async fn create_write(&self, path: &str) -> Result<File, GatewayError> {
        self.sftp
            .open_with_flags(
                path,
                OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE,
            )
            .await
            .map_err(|e| map_sftp_error(&e, path))
    }

    pub async fn rename(&self, old_path: &str, new_path: &str) -> Result<(), GatewayError> {
        self.sftp
            .rename(old_path, new_path)
            .await
            .map_err(|e| map_sftp_error(&e, old_path))
    }
}

#[async_trait]
impl RemoteFs for SftpHandle {
    type File = File;

    async fn list_dir(&self, path: &str) -> Result<Vec<RemoteEntry>, GatewayError> {
        let read_dir = self
            .sftp
            .read_dir(path)
            .await
            .map_err(|e| map_sftp_error(&e, path))?;

        let mut entries = Vec::new();
        for entry in read_dir {
            let name = entry.file_name();
            if name == "." || name == ".." {
                continue;
            }
            let metadata = entry.metadata();
            entries.push(RemoteEntry {
                name,
                size: metadata.size.unwrap_or(0),
                is_dir: metadata.is_dir(),
                modified: metadata.mtime.map(u64::from),
            });
        }
        Ok(entries)
    }

    async fn stat(&self, path: &str) -> Result<RemoteStat, GatewayError> {
        let metadata = self
            .sftp
            .metadata(path)
            .await
            .map_err(|e| map_sftp_error(&e, path))?;
        Ok(RemoteStat {
            size: metadata.size.unwrap_or(0),
            is_dir: metadata.is_dir(),
            modified: metadata.mtime.map(u64::from),
        })
    }

    async fn open_read(&self, path: &str) -> Result<File, GatewayError> {
        self.sftp
            .open(path)
            .await
            .map_err(|e| map_sftp_error(&e, path))
    }

    async fn remove_file(&self, path: &str) -> Result<(), GatewayError> {
        self.sftp
            .remove_file(path)
            .await
            .map_err(|e| map_sftp_error(&e, path))
    }

    async fn remove_dir(&self, path: &str) -> Result<(), GatewayError> {
        self.sftp
            .remove_dir(path)
            .await
            .map_err(|e| map_sftp_error(&e, path))
    }

    async fn create_dir(&self, path: &str) -> Result<(), GatewayError> {
        self.sftp
            .create_dir(path)
            .await
            .map_err(|e| map_sftp_error(&e, path))
    }
}

/// Read a whole remote file into memory, refusing directories and files
/// larger than `max_size`. The cap is checked against the stat size before
/// any bytes move.
pub async fn read_capped<F: RemoteFs>(
    fs: &F,
    path: &str,
    max_size: usize,
) -> Result<Vec<u8>, GatewayError> {
    let stat = fs.stat(path).await?;
    if stat.is_dir {
        return Err(GatewayError::Remote(format!("{path} is a directory")));
    }
    if stat.size as usize > max_size {
        return Err(GatewayError::Remote(format!(
            "File too large ({} bytes, max {max_size})",
            stat.size
        )));
    }

    let mut file = fs.open_read(path).await?;
    let mut buf = Vec::with_capacity(stat.size as usize);
    file.read_to_end(&mut buf)
        .await
        .map_err(|e| GatewayError::Remote(format!("Failed to read {path}: {e}")))?;
    Ok(buf)
}

/// Classify an SFTP error by its status text.
fn map_sftp_error(err: &SftpError, path: &str) -> GatewayError {
    let text = err.to_string();
    if text.contains("No such file") || text.contains("not found") {
        GatewayError::NotFound(path.to_string())
    } else if text.contains("Permission denied") {
        GatewayError::PermissionDenied(path.to_string())
    } else {
        GatewayError::Remote(format!("{path}: {text}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sftp::testfs::FakeFs;

    const CAP: usize = 64;

    #[tokio::test]
    async fn round_trips_content_at_and_near_the_ceiling() {
        let fs = FakeFs::new();

        let exact: Vec<u8> = (0..CAP).map(|i| (i % 251) as u8).collect();
        fs.add_file("/exact.bin", &exact);
        assert_eq!(read_capped(&fs, "/exact.bin", CAP).await.unwrap(), exact);

        let under = vec![7u8; CAP - 1];
        fs.add_file("/under.bin", &under);
        assert_eq!(read_capped(&fs, "/under.bin", CAP).await.unwrap(), under);
    }

    #[tokio::test]
    async fn refuses_files_over_the_ceiling() {
        let fs = FakeFs::new();
        let big = vec![0u8; CAP + 1];
        fs.add_file("/big.bin", &big);

        let err = read_capped(&fs, "/big.bin", CAP).await.unwrap_err();
        assert!(matches!(err, GatewayError::Remote(_)));
        assert!(err.to_string().contains("too large"));
    }

    #[tokio::test]
    async fn refuses_directories_and_missing_paths() {
        let fs = FakeFs::new();
        fs.add_dir("/d");

        assert!(matches!(
            read_capped(&fs, "/d", CAP).await,
            Err(GatewayError::Remote(_))
        ));
        assert!(matches!(
            read_capped(&fs, "/ghost", CAP).await,
            Err(GatewayError::NotFound(_))
        ));
    }
}
