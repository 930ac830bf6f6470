//! In-memory `RemoteFs` used by the tree-walk tests.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Mutex;

use async_trait::async_trait;

use super::handle::{RemoteEntry, RemoteFs, RemoteStat};
use crate::ssh::error::GatewayError;

#[derive(Clone)]
pub enum FakeNode {
    Dir,
    File(Vec<u8>),
}

/// Flat path map standing in for a remote filesystem. Records every removal
/// so tests can assert ordering.
pub struct FakeFs {
    nodes: Mutex<BTreeMap<String, FakeNode>>,
    pub removals: Mutex<Vec<String>>,
}

impl FakeFs {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), FakeNode::Dir);
        Self {
            nodes: Mutex::new(nodes),
            removals: Mutex::new(Vec::new()),
        }
    }

    pub fn add_dir(&self, path: &str) {
        self.nodes
            .lock()
            .unwrap()
            .insert(path.to_string(), FakeNode::Dir);
    }

    pub fn add_file(&self, path: &str, content: &[u8]) {
        self.nodes
            .lock()
            .unwrap()
            .insert(path.to_string(), FakeNode::File(content.to_vec()));
    }

    pub fn contains(&self, path: &str) -> bool {
        self.nodes.lock().unwrap().contains_key(path)
    }

    pub fn removal_log(&self) -> Vec<String> {
        self.removals.lock().unwrap().clone()
    }

    fn children_of(&self, path: &str) -> Vec<(String, FakeNode)> {
        let prefix = if path == "/" {
            "/".to_string()
        } else {
            format!("{path}/")
        };
        self.nodes
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(k, v)| {
                let rest = k.strip_prefix(&prefix)?;
                if rest.is_empty() || rest.contains('/') {
                    None
                } else {
                    Some((rest.to_string(), v.clone()))
                }
            })
            .collect()
    }
}

#[async_trait]
impl RemoteFs for FakeFs {
    type File = Cursor<Vec<u8>>;

    async fn list_dir(&self, path: &str) -> Result<Vec<RemoteEntry>, GatewayError> {
        match self.nodes.lock().unwrap().get(path) {
            Some(FakeNode::Dir) => {}
            Some(FakeNode::File(_)) => {
                return Err(GatewayError::Remote(format!("{path} is not a directory")))
            }
            None => return Err(GatewayError::NotFound(path.to_string())),
        }
        Ok(self
            .children_of(path)
            .into_iter()
            .map(|(name, node)| match node {
                FakeNode::Dir => RemoteEntry {
                    name,
                    size: 0,
                    is_dir: true,
                    modified: None,
                },
                FakeNode::File(content) => RemoteEntry {
                    name,
                    size: content.len() as u64,
                    is_dir: false,
                    modified: None,
                },
            })
            .collect())
    }

    async fn stat(&self, path: &str) -> Result<RemoteStat, GatewayError> {
        match self.nodes.lock().unwrap().get(path) {
            Some(FakeNode::Dir) => Ok(RemoteStat {
                size: 0,
                is_dir: true,
                modified: None,
            }),
            Some(FakeNode::File(content)) => Ok(RemoteStat {
                size: content.len() as u64,
                is_dir: false,
                modified: None,
            }),
            None => Err(GatewayError::NotFound(path.to_string())),
        }
    }

    async fn open_read(&self, path: &str) -> Result<Self::File, GatewayError> {
        match self.nodes.lock().unwrap().get(path) {
            Some(FakeNode::File(content)) => Ok(Cursor::new(content.clone())),
            Some(FakeNode::Dir) => {
                Err(GatewayError::Remote(format!("{path} is a directory")))
            }
            None => Err(GatewayError::NotFound(path.to_string())),
        }
    }

    async fn remove_file(&self, path: &str) -> Result<(), GatewayError> {
        let mut nodes = self.nodes.lock().unwrap();
        match nodes.get(path) {
            Some(FakeNode::File(_)) => {
                nodes.remove(path);
                self.removals.lock().unwrap().push(path.to_string());
                Ok(())
            }
            Some(FakeNode::Dir) => {
                Err(GatewayError::Remote(format!("{path} is a directory")))
            }
            None => Err(GatewayError::NotFound(path.to_string())),
        }
    }

    async fn remove_dir(&self, path: &str) -> Result<(), GatewayError> {
        match self.nodes.lock().unwrap().get(path) {
            Some(FakeNode::Dir) => {}
            Some(FakeNode::File(_)) => {
                return Err(GatewayError::Remote(format!("{path} is not a directory")))
            }
            None => return Err(GatewayError::NotFound(path.to_string())),
        }
        if !self.children_of(path).is_empty() {
            return Err(GatewayError::Remote(format!("{path} is not empty")));
        }
        self.nodes.lock().unwrap().remove(path);
        self.removals.lock().unwrap().push(path.to_string());
        Ok(())
    }

    async fn create_dir(&self, path: &str) -> Result<(), GatewayError> {
        let mut nodes = self.nodes.lock().unwrap();
        if nodes.contains_key(path) {
            return Err(GatewayError::Remote(format!("{path} already exists")));
        }
        nodes.insert(path.to_string(), FakeNode::Dir);
        Ok(())
    }
}
