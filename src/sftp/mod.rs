//! Remote filesystem layer built on the SFTP subsystem.
//!
//! `handle` wraps the raw SFTP session and classifies remote errors; `path`
//! holds the pure path-policy helpers; `archive` and `remove` implement the
//! two tree walks (streamed tar.gz production and post-order deletion) over
//! the `RemoteFs` capability so they can be exercised against an in-memory
//! filesystem in tests.

pub mod archive;
pub mod handle;
pub mod path;
pub mod remove;

#[cfg(test)]
pub(crate) mod testfs;

pub use handle::{RemoteEntry, RemoteFs, RemoteStat, SftpHandle};
