//! Remote path policy.
//!
//! Remote paths are plain strings in the remote machine's own namespace; the
//! gateway never maps them onto its local filesystem. Normalization is
//! limited to separator hygiene (backslashes become slashes, duplicate
//! slashes collapse). There is no containment check: the session's
//! credentials are the authorization boundary, and the remote server enforces
//! its own permissions.

use tracing::debug;

use super::handle::{RemoteFs, SftpHandle};
use crate::ssh::error::GatewayError;

/// Directory names skipped during archiving in addition to any
/// request-supplied exclusions.
pub const SKIP_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "__pycache__",
    ".cache",
    "vendor",
    ".next",
    "dist",
];

/// Join a relative path onto a remote directory path. The relative part is
/// normalized too, so backslash-separated client paths join cleanly.
pub fn join_remote(base: &str, name: &str) -> String {
    let base = normalize(base);
    let name = normalize(name);
    let name = name.trim_start_matches('/');
    if base.is_empty() || base == "/" {
        format!("/{name}")
    } else {
        format!("{}/{name}", base.trim_end_matches('/'))
    }
}

/// Normalize separators: backslashes to slashes, duplicate slashes collapsed.
/// A trailing slash is kept only for the root itself.
pub fn normalize(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_slash = false;
    for c in path.chars() {
        let c = if c == '\\' { '/' } else { c };
        if c == '/' {
            if !prev_slash {
                out.push('/');
            }
            prev_slash = true;
        } else {
            out.push(c);
            prev_slash = false;
        }
    }
    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

/// Last path component of a normalized remote path. Returns the path itself
/// when it has no separator.
pub fn base_name(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or(path)
}

/// Whether a directory named `name` should be skipped during an archive walk.
pub fn should_skip(name: &str, exclude: &[String]) -> bool {
    SKIP_DIRS.contains(&name) || exclude.iter().any(|e| e == name)
}

/// Parse a comma-separated exclusion list, dropping empty segments.
pub fn parse_exclude(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Create `path` as a directory, treating "already exists as a directory" as
/// success.
pub async fn ensure_dir(sftp: &SftpHandle, path: &str) -> Result<(), GatewayError> {
    match sftp.create_dir(path).await {
        Ok(()) => Ok(()),
        Err(e) => match sftp.stat(path).await {
            Ok(stat) if stat.is_dir => Ok(()),
            _ => Err(e),
        },
    }
}

/// Create every directory along a relative subpath under `base`, best effort.
///
/// Upload archives carry their own tree structure; a component that already
/// exists is fine, and a component that cannot be created will surface as an
/// error when the file inside it is opened.
pub async fn ensure_parents(sftp: &SftpHandle, base: &str, rel_dir: &str) {
    let mut current = normalize(base);
    for component in normalize(rel_dir).split('/').filter(|c| !c.is_empty()) {
        current = join_remote(&current, component);
        if let Err(e) = ensure_dir(sftp, &current).await {
            debug!("mkdir {} skipped: {}", current, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_handles_root_and_trailing_slash() {
        assert_eq!(join_remote("/", "etc"), "/etc");
        assert_eq!(join_remote("/home/user/", "docs"), "/home/user/docs");
        assert_eq!(join_remote("/home/user", "docs"), "/home/user/docs");
    }

    #[test]
    fn join_normalizes_relative_separators() {
        assert_eq!(join_remote("/up", "a\\b.txt"), "/up/a/b.txt");
    }

    #[test]
    fn normalize_collapses_and_converts_separators() {
        assert_eq!(normalize("C:\\data\\logs"), "C:/data/logs");
        assert_eq!(normalize("/a//b///c/"), "/a/b/c");
        assert_eq!(normalize("/"), "/");
    }

    #[test]
    fn base_name_takes_last_component() {
        assert_eq!(base_name("/home/user/file.txt"), "file.txt");
        assert_eq!(base_name("/home/user/dir/"), "dir");
        assert_eq!(base_name("file.txt"), "file.txt");
    }

    #[test]
    fn skip_covers_builtins_and_request_excludes() {
        let exclude = vec!["target".to_string()];
        assert!(should_skip("node_modules", &exclude));
        assert!(should_skip(".git", &exclude));
        assert!(should_skip("target", &exclude));
        assert!(!should_skip("src", &exclude));
    }

    #[test]
    fn parse_exclude_drops_empty_segments() {
        assert_eq!(
            parse_exclude("target, .venv,,logs"),
            vec!["target", ".venv", "logs"]
        );
        assert!(parse_exclude("").is_empty());
    }
}
