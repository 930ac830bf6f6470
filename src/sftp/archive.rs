//! Streaming tar.gz production for remote directory trees.
//!
//! Three stages run concurrently, connected by bounded channels:
//!
//!   walker (async)  -> ArchiveItem  -> encoder (blocking) -> Bytes -> HTTP body
//!
//! The walker does a pre-order depth-first traversal over `RemoteFs`, emitting
//! a marker for every subdirectory (so empty directories survive) and
//! streaming each file's bytes in chunks. Entry paths are relative to the
//! archived root. The encoder runs `tar` + `flate2` on a
//! blocking thread, bridged to the async side by `ChunkWriter` and
//! `ChannelReader`.
//!
//! Entry sizes come from the directory listing. A file that yields fewer
//! bytes than listed aborts the archive; a file that grew is truncated to
//! the listed size so the tar header stays honest. Failures mid-stream
//! cannot be reported over HTTP anymore, so the stream ends short and the
//! error is logged.

use std::future::Future;
use std::io::{Read, Write};
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::handle::RemoteFs;
use super::path::{join_remote, should_skip};
use crate::ssh::error::GatewayError;

const CHUNK: usize = 32 * 1024;

/// One unit of work handed from the walker to the encoder.
pub enum ArchiveItem {
    Dir {
        path: String,
        mtime: Option<u64>,
    },
    File {
        path: String,
        size: u64,
        mtime: Option<u64>,
        chunks: mpsc::Receiver<Vec<u8>>,
    },
    /// The walk failed; the encoder aborts without finalizing the stream.
    Fail(String),
}

/// Start archiving `root` and return the compressed byte stream.
///
/// `root` must be a directory. Directories named in `exclude` (or in the
/// built-in skip set) are left out along with their contents.
pub fn spawn_archive<F>(
    fs: Arc<F>,
    root: String,
    exclude: Vec<String>,
) -> mpsc::Receiver<Result<Bytes, std::io::Error>>
where
    F: RemoteFs + 'static,
{
    let (bytes_tx, bytes_rx) = mpsc::channel(8);
    let (item_tx, item_rx) = mpsc::channel(64);

    tokio::spawn(async move {
        if let Err(e) = walk_tree(fs.as_ref(), &root, &exclude, &item_tx).await {
            warn!("Archive walk of {} failed: {}", root, e);
            let _ = item_tx.send(ArchiveItem::Fail(e.to_string())).await;
        }
    });

    let err_tx = bytes_tx.clone();
    tokio::task::spawn_blocking(move || {
        if let Err(e) = encode_archive(item_rx, ChunkWriter::new(bytes_tx)) {
            warn!("Archive encoding failed: {}", e);
            let _ = err_tx.blocking_send(Err(e));
        }
    });

    bytes_rx
}

/// Walk the tree rooted at `root`, emitting archive items. Entry names are
/// relative to `root` itself; the root gets no marker of its own.
async fn walk_tree<F: RemoteFs>(
    fs: &F,
    root: &str,
    exclude: &[String],
    items: &mpsc::Sender<ArchiveItem>,
) -> Result<(), GatewayError> {
    let stat = fs.stat(root).await?;
    if !stat.is_dir {
        return Err(GatewayError::Remote(format!("{root} is not a directory")));
    }
    walk_children(fs, root, "", exclude, items).await
}

/// Process one directory's entries in listing order. `archive_prefix` is the
/// directory's own entry path, empty for the archived root.
fn walk_children<'a, F: RemoteFs>(
    fs: &'a F,
    remote: &'a str,
    archive_prefix: &'a str,
    exclude: &'a [String],
    items: &'a mpsc::Sender<ArchiveItem>,
) -> Pin<Box<dyn Future<Output = Result<(), GatewayError>> + Send + 'a>> {
    Box::pin(async move {
        for entry in fs.list_dir(remote).await? {
            let child_remote = join_remote(remote, &entry.name);
            let child_archive = if archive_prefix.is_empty() {
                entry.name.clone()
            } else {
                format!("{archive_prefix}/{}", entry.name)
            };

            if entry.is_dir {
                if should_skip(&entry.name, exclude) {
                    debug!("Skipping directory {}", child_remote);
                    continue;
                }
                items
                    .send(ArchiveItem::Dir {
                        path: child_archive.clone(),
                        mtime: entry.modified,
                    })
                    .await
                    .map_err(|_| consumer_gone())?;
                walk_children(fs, &child_remote, &child_archive, exclude, items).await?;
            } else {
                let (chunk_tx, chunk_rx) = mpsc::channel(8);
                items
                    .send(ArchiveItem::File {
                        path: child_archive,
                        size: entry.size,
                        mtime: entry.modified,
                        chunks: chunk_rx,
                    })
                    .await
                    .map_err(|_| consumer_gone())?;
                stream_file(fs, &child_remote, entry.size, &chunk_tx).await?;
            }
        }
        Ok(())
    })
}

/// Read exactly `size` bytes of a remote file into the chunk channel.
async fn stream_file<F: RemoteFs>(
    fs: &F,
    remote: &str,
    size: u64,
    chunks: &mpsc::Sender<Vec<u8>>,
) -> Result<(), GatewayError> {
    let mut file = fs.open_read(remote).await?;
    let mut buf = vec![0u8; CHUNK];
    let mut remaining = size;

    while remaining > 0 {
        let want = usize::try_from(remaining.min(CHUNK as u64)).unwrap_or(CHUNK);
        let n = file
            .read(&mut buf[..want])
            .await
            .map_err(|e| GatewayError::Remote(format!("Failed to read {remote}: {e}")))?;
        if n == 0 {
            return Err(GatewayError::Remote(format!(
                "{remote} ended {remaining} bytes short of its listed size"
            )));
        }
        remaining -= n as u64;
        chunks
            .send(buf[..n].to_vec())
            .await
            .map_err(|_| consumer_gone())?;
    }
    Ok(())
}

fn consumer_gone() -> GatewayError {
    GatewayError::Channel("archive consumer went away".to_string())
}

/// Drain archive items into a gzipped tar stream. Runs on a blocking thread.
fn encode_archive(
    mut items: mpsc::Receiver<ArchiveItem>,
    out: ChunkWriter,
) -> Result<(), std::io::Error> {
    let encoder = GzEncoder::new(out, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    while let Some(item) = items.blocking_recv() {
        match item {
            ArchiveItem::Dir { path, mtime } => {
                let mut header = tar::Header::new_gnu();
                header.set_entry_type(tar::EntryType::Directory);
                header.set_size(0);
                header.set_mode(0o755);
                header.set_mtime(mtime.unwrap_or(0));
                builder.append_data(&mut header, format!("{path}/"), std::io::empty())?;
            }
            ArchiveItem::File {
                path,
                size,
                mtime,
                chunks,
            } => {
                let mut header = tar::Header::new_gnu();
                header.set_entry_type(tar::EntryType::Regular);
                header.set_size(size);
                header.set_mode(0o644);
                header.set_mtime(mtime.unwrap_or(0));
                let reader = ChannelReader::new(chunks, size);
                builder.append_data(&mut header, path, reader)?;
            }
            ArchiveItem::Fail(msg) => {
                return Err(std::io::Error::other(msg));
            }
        }
    }

    builder.into_inner()?.finish()?;
    Ok(())
}

/// `Write` half of the blocking/async bridge: compressed output bytes go to
/// the HTTP body channel.
pub struct ChunkWriter {
    tx: mpsc::Sender<Result<Bytes, std::io::Error>>,
}

impl ChunkWriter {
    fn new(tx: mpsc::Sender<Result<Bytes, std::io::Error>>) -> Self {
        Self { tx }
    }
}

impl Write for ChunkWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.tx
            .blocking_send(Ok(Bytes::copy_from_slice(buf)))
            .map_err(|_| std::io::Error::from(std::io::ErrorKind::BrokenPipe))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// `Read` half of the bridge: file chunks from the walker, with a hard stop
/// at the size promised in the tar header. A channel that closes early
/// surfaces as `UnexpectedEof` and poisons the archive.
struct ChannelReader {
    rx: mpsc::Receiver<Vec<u8>>,
    pending: Vec<u8>,
    offset: usize,
    remaining: u64,
}

impl ChannelReader {
    fn new(rx: mpsc::Receiver<Vec<u8>>, size: u64) -> Self {
        Self {
            rx,
            pending: Vec::new(),
            offset: 0,
            remaining: size,
        }
    }
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }
        if self.offset >= self.pending.len() {
            match self.rx.blocking_recv() {
                Some(chunk) => {
                    self.pending = chunk;
                    self.offset = 0;
                }
                None => return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof)),
            }
        }
        let available = &self.pending[self.offset..];
        let n = available
            .len()
            .min(buf.len())
            .min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        buf[..n].copy_from_slice(&available[..n]);
        self.offset += n;
        self.remaining -= n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Cursor;

    use async_trait::async_trait;
    use flate2::read::GzDecoder;

    use super::*;
    use crate::sftp::handle::{RemoteEntry, RemoteStat};
    use crate::sftp::testfs::FakeFs;

    async fn collect(mut rx: mpsc::Receiver<Result<Bytes, std::io::Error>>) -> (Vec<u8>, bool) {
        let mut raw = Vec::new();
        let mut failed = false;
        while let Some(chunk) = rx.recv().await {
            match chunk {
                Ok(bytes) => raw.extend_from_slice(&bytes),
                Err(_) => failed = true,
            }
        }
        (raw, failed)
    }

    fn unpack(raw: &[u8]) -> (Vec<(String, bool)>, HashMap<String, Vec<u8>>) {
        let mut archive = tar::Archive::new(GzDecoder::new(Cursor::new(raw)));
        let mut names = Vec::new();
        let mut contents = HashMap::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            let is_dir = entry.header().entry_type().is_dir();
            let name = entry
                .path()
                .unwrap()
                .to_string_lossy()
                .trim_end_matches('/')
                .to_string();
            let mut buf = Vec::new();
            entry.read_to_end(&mut buf).unwrap();
            contents.insert(name.clone(), buf);
            names.push((name, is_dir));
        }
        (names, contents)
    }

    #[tokio::test]
    async fn archive_preserves_tree_and_empty_dirs() {
        let fs = Arc::new(FakeFs::new());
        fs.add_dir("/data");
        fs.add_dir("/data/a");
        fs.add_file("/data/a/b.txt", b"hello");
        fs.add_dir("/data/c");

        let rx = spawn_archive(fs, "/data".to_string(), Vec::new());
        let (raw, failed) = collect(rx).await;
        assert!(!failed);

        let (names, contents) = unpack(&raw);
        assert_eq!(names.len(), 3);
        assert!(names.contains(&("a".to_string(), true)));
        assert!(names.contains(&("c".to_string(), true)));
        assert_eq!(contents["a/b.txt"], b"hello");
        // Parent marker comes before its contents.
        let pos = |n: &str| names.iter().position(|(x, _)| x == n).unwrap();
        assert!(pos("a") < pos("a/b.txt"));
    }

    #[tokio::test]
    async fn excluded_and_builtin_skip_dirs_are_left_out() {
        let fs = Arc::new(FakeFs::new());
        fs.add_dir("/data");
        fs.add_file("/data/keep.txt", b"keep");
        fs.add_dir("/data/node_modules");
        fs.add_file("/data/node_modules/x.js", b"junk");
        fs.add_dir("/data/skipme");
        fs.add_file("/data/skipme/y.txt", b"junk");

        let rx = spawn_archive(fs, "/data".to_string(), vec!["skipme".to_string()]);
        let (raw, failed) = collect(rx).await;
        assert!(!failed);

        let (names, contents) = unpack(&raw);
        assert!(contents.contains_key("keep.txt"));
        assert!(!names.iter().any(|(n, _)| n.contains("node_modules")));
        assert!(!names.iter().any(|(n, _)| n.contains("skipme")));
    }

    #[tokio::test]
    async fn archiving_a_file_fails() {
        let fs = Arc::new(FakeFs::new());
        fs.add_file("/a.txt", b"x");

        let rx = spawn_archive(fs, "/a.txt".to_string(), Vec::new());
        let (raw, failed) = collect(rx).await;
        assert!(failed);
        assert!(raw.is_empty());
    }

    /// Wrapper that inflates listed file sizes, simulating a remote file that
    /// shrank between listing and read.
    struct ShortFs(FakeFs);

    #[async_trait]
    impl RemoteFs for ShortFs {
        type File = Cursor<Vec<u8>>;

        async fn list_dir(&self, path: &str) -> Result<Vec<RemoteEntry>, GatewayError> {
            let mut entries = self.0.list_dir(path).await?;
            for entry in &mut entries {
                if !entry.is_dir {
                    entry.size += 5;
                }
            }
            Ok(entries)
        }

        async fn stat(&self, path: &str) -> Result<RemoteStat, GatewayError> {
            self.0.stat(path).await
        }

        async fn open_read(&self, path: &str) -> Result<Self::File, GatewayError> {
            self.0.open_read(path).await
        }

        async fn remove_file(&self, path: &str) -> Result<(), GatewayError> {
            self.0.remove_file(path).await
        }

        async fn remove_dir(&self, path: &str) -> Result<(), GatewayError> {
            self.0.remove_dir(path).await
        }

        async fn create_dir(&self, path: &str) -> Result<(), GatewayError> {
            self.0.create_dir(path).await
        }
    }

    #[tokio::test]
    async fn short_read_aborts_the_archive() {
        let inner = FakeFs::new();
        inner.add_dir("/data");
        inner.add_file("/data/shrunk.txt", b"abc");

        let rx = spawn_archive(Arc::new(ShortFs(inner)), "/data".to_string(), Vec::new());
        let (_, failed) = collect(rx).await;
        assert!(failed);
    }
}
