#![deny(missing_docs)]
//! In-memory implementation of `agentkit_core::state::StateStore`.
//!
//! Uses a `HashMap` behind a `tokio::sync::RwLock` for concurrent access.
//! Namespaces are joined into a single composite-key prefix, giving full
//! namespace isolation without a nested map per segment. Search always
//! returns empty — no semantic search support in the in-memory backend.

use agentkit_core::{AgentError, SearchResult, StateStore};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory state store backed by a `HashMap` behind a `RwLock`.
///
/// Suitable for testing, prototyping, and single-process use cases where
/// persistence across restarts is not required.
pub struct MemoryStore {
    data: RwLock<HashMap<String, serde_json::Value>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self { data: RwLock::new(HashMap::new()) }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Join a namespace's segments into a stable prefix. `\0` can't appear in a
/// namespace segment in practice (they're derived from ids), so it's safe
/// as the separator between the prefix and the key.
fn namespace_prefix(namespace: &[String]) -> String {
    namespace.join("/")
}

fn composite_key(namespace: &[String], key: &str) -> String {
    format!("{}\0{key}", namespace_prefix(namespace))
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, namespace: &[String], key: &str) -> Result<Option<serde_json::Value>, AgentError> {
        let ck = composite_key(namespace, key);
        let data = self.data.read().await;
        Ok(data.get(&ck).cloned())
    }

    async fn put(&self, namespace: &[String], key: &str, value: serde_json::Value) -> Result<(), AgentError> {
        let ck = composite_key(namespace, key);
        let mut data = self.data.write().await;
        data.insert(ck, value);
        Ok(())
    }

    async fn delete(&self, namespace: &[String], key: &str) -> Result<(), AgentError> {
        let ck = composite_key(namespace, key);
        let mut data = self.data.write().await;
        data.remove(&ck);
        Ok(())
    }

    async fn list(&self, namespace: &[String]) -> Result<Vec<String>, AgentError> {
        let prefix = format!("{}\0", namespace_prefix(namespace));
        let data = self.data.read().await;
        let mut keys: Vec<String> =
            data.keys().filter_map(|ck| ck.strip_prefix(&prefix).map(String::from)).collect();
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
