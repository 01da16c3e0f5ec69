#![deny(missing_docs)]
//! Filesystem-backed implementation of `agentkit_core::state::StateStore`.
//!
//! Each namespace maps to a nested subdirectory under the root, one level
//! per segment. Keys are URL-encoded and stored as `.json` files within the
//! namespace directory. Provides true persistence across process restarts.

use agentkit_core::{AgentError, ErrorKind, SearchResult, StateStore};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Filesystem-backed state store.
///
/// Directory layout:
/// ```text
/// root/
///   <namespace-segment>/
///     <namespace-segment>/
///       <url-encoded-key>.json
/// ```
///
/// Suitable for development, single-machine deployments, and cases where
/// data must survive process restarts without a database.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Create a new filesystem store rooted at the given directory.
    ///
    /// The directory is created lazily on first write.
    pub fn new(root: &Path) -> Self {
        Self { root: root.to_path_buf() }
    }

    fn namespace_dir(&self, namespace: &[String]) -> PathBuf {
        let mut dir = self.root.clone();
        for segment in namespace {
            dir.push(key_to_filename_component(segment));
        }
        dir
    }
}

/// Encode a namespace segment or key into a filesystem-safe string.
fn key_to_filename_component(key: &str) -> String {
    let mut encoded = String::new();
    for ch in key.chars() {
        match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => encoded.push(ch),
            _ => {
                for byte in ch.to_string().as_bytes() {
                    encoded.push_str(&format!("%{byte:02X}"));
                }
            }
        }
    }
    encoded
}

fn key_to_filename(key: &str) -> String {
    format!("{}.json", key_to_filename_component(key))
}

/// Decode a filename back to a key.
fn filename_to_key(filename: &str) -> Option<String> {
    let name = filename.strip_suffix(".json")?;
    let mut result = Vec::new();
    let bytes = name.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok()?;
            let byte = u8::from_str_radix(hex, 16).ok()?;
            result.push(byte);
            i += 3;
        } else {
            result.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(result).ok()
}

fn io_err(operation: &str, e: std::io::Error) -> AgentError {
    AgentError::new(ErrorKind::Internal, "fs_store", operation, e.to_string())
}

fn serde_err(operation: &str, e: serde_json::Error) -> AgentError {
    AgentError::new(ErrorKind::Internal, "fs_store", operation, e.to_string())
}

#[async_trait]
impl StateStore for FsStore {
    async fn get(&self, namespace: &[String], key: &str) -> Result<Option<serde_json::Value>, AgentError> {
        let path = self.namespace_dir(namespace).join(key_to_filename(key));
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                let value: serde_json::Value = serde_json::from_str(&contents).map_err(|e| serde_err("get", e))?;
                Ok(Some(value))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err("get", e)),
        }
    }

    async fn put(&self, namespace: &[String], key: &str, value: serde_json::Value) -> Result<(), AgentError> {
        let dir = self.namespace_dir(namespace);
        tokio::fs::create_dir_all(&dir).await.map_err(|e| io_err("put", e))?;

        let path = dir.join(key_to_filename(key));
        let contents = serde_json::to_string_pretty(&value).map_err(|e| serde_err("put", e))?;
        tokio::fs::write(&path, contents).await.map_err(|e| io_err("put", e))?;
        Ok(())
    }

    async fn delete(&self, namespace: &[String], key: &str) -> Result<(), AgentError> {
        let path = self.namespace_dir(namespace).join(key_to_filename(key));
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err("delete", e)),
        }
    }

    async fn list(&self, namespace: &[String]) -> Result<Vec<String>, AgentError> {
        let dir = self.namespace_dir(namespace);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(io_err("list", e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| io_err("list", e))? {
            if let Some(filename) = entry.file_name().to_str() {
                if let Some(key) = filename_to_key(filename) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn search(
        &self,
        _namespace: &[String],
        _query: &str,
        _limit: usize,
    ) -> Result<Vec<SearchResult>, AgentError> {
        Ok(vec![])
    }
}
