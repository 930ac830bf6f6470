//! Recursive deletion of remote paths.
//!
//! SFTP has no recursive delete, so directories are cleared bottom-up:
//! every child is removed before its parent, and the first failure anywhere
//! in the tree aborts the walk, leaving whatever was already deleted gone.
//! The operation is not atomic and makes no attempt to roll back.

use std::future::Future;
use std::pin::Pin;

use tracing::debug;

use super::handle::RemoteFs;
use super::path::join_remote;
use crate::ssh::error::GatewayError;

/// Remove `path`, whatever it is.
///
/// Files are removed directly. When the direct removal fails and the path
/// turns out to be a directory, an empty-directory removal is tried first and
/// the recursive walk only runs if that fails too. When the path is a file
/// after all (or does not exist), the original removal error is returned.
pub async fn remove_path<F: RemoteFs>(fs: &F, path: &str) -> Result<(), GatewayError> {
    let original = match fs.remove_file(path).await {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };

    let stat = match fs.stat(path).await {
        Ok(stat) => stat,
        Err(_) => return Err(original),
    };
    if !stat.is_dir {
        return Err(original);
    }

    if fs.remove_dir(path).await.is_ok() {
        return Ok(());
    }

    debug!("Recursively removing directory {}", path);
    remove_dir_recursive(fs, path).await
}

/// Post-order removal of a directory tree. The directory itself is removed
/// last, after every child has been deleted.
fn remove_dir_recursive<'a, F: RemoteFs>(
    fs: &'a F,
    path: &'a str,
) -> Pin<Box<dyn Future<Output = Result<(), GatewayError>> + Send + 'a>> {
    Box::pin(async move {
        for entry in fs.list_dir(path).await? {
            let child = join_remote(path, &entry.name);
            if entry.is_dir {
                // Empty directories fall to the direct removal.
                if fs.remove_dir(&child).await.is_err() {
                    remove_dir_recursive(fs, &child).await?;
                }
            } else {
                fs.remove_file(&child).await?;
            }
        }
        fs.remove_dir(path).await
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sftp::testfs::FakeFs;

    #[tokio::test]
    async fn removes_plain_file_directly() {
        let fs = FakeFs::new();
        fs.add_file("/a.txt", b"x");

        remove_path(&fs, "/a.txt").await.unwrap();
        assert!(!fs.contains("/a.txt"));
        assert_eq!(fs.removal_log(), vec!["/a.txt"]);
    }

    #[tokio::test]
    async fn removes_empty_directory_without_recursing() {
        let fs = FakeFs::new();
        fs.add_dir("/empty");

        remove_path(&fs, "/empty").await.unwrap();
        assert!(!fs.contains("/empty"));
    }

    #[tokio::test]
    async fn removes_nested_tree_children_first() {
        let fs = FakeFs::new();
        fs.add_dir("/proj");
        fs.add_file("/proj/a.txt", b"a");
        fs.add_dir("/proj/sub");
        fs.add_file("/proj/sub/b.txt", b"b");
        fs.add_dir("/proj/sub/deep");

        remove_path(&fs, "/proj").await.unwrap();
        assert!(!fs.contains("/proj"));

        let log = fs.removal_log();
        let pos = |p: &str| log.iter().position(|x| x == p).unwrap();
        assert!(pos("/proj/a.txt") < pos("/proj"));
        assert!(pos("/proj/sub/b.txt") < pos("/proj/sub"));
        assert!(pos("/proj/sub/deep") < pos("/proj/sub"));
        assert!(pos("/proj/sub") < pos("/proj"));
        assert_eq!(log.last().unwrap(), "/proj");
    }

    #[tokio::test]
    async fn missing_path_returns_original_error() {
        let fs = FakeFs::new();
        let err = remove_path(&fs, "/ghost").await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }
}
