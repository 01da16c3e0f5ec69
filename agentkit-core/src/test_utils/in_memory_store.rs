//! InMemoryStore — HashMap-backed StateStore for testing.

use crate::error::{AgentError, ErrorKind};
use crate::state::{SearchResult, StateStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory state store backed by a `HashMap` behind a `RwLock`.
pub struct InMemoryStore {
    data: RwLock<HashMap<(Vec<String>, String), serde_json::Value>>,
}

impl InMemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self { data: RwLock::new(HashMap::new()) }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_err(operation: &str, e: impl std::fmt::Display) -> AgentError {
    AgentError::new(ErrorKind::Internal, "in_memory_store", operation, format!("lock poisoned: {e}"))
}

#[async_trait]
impl StateStore for InMemoryStore {
    async fn get(&self, namespace: &[String], key: &str) -> Result<Option<serde_json::Value>, AgentError> {
        let data = self.data.read().map_err(|e| lock_err("get", e))?;
        Ok(data.get(&(namespace.to_vec(), key.to_owned())).cloned())
    }

    async fn put(&self, namespace: &[String], key: &str, value: serde_json::Value) -> Result<(), AgentError> {
        let mut data = self.data.write().map_err(|e| lock_err("put", e))?;
        data.insert((namespace.to_vec(), key.to_owned()), value);
        Ok(())
    }

    async fn delete(&self, namespace: &[String], key: &str) -> Result<(), AgentError> {
        let mut data = self.data.write().map_err(|e| lock_err("delete", e))?;
        data.remove(&(namespace.to_vec(), key.to_owned()));
        Ok(())
    }

    async fn list(&self, namespace: &[String]) -> Result<Vec<String>, AgentError> {
        let data = self.data.read().map_err(|e| lock_err("list", e))?;
        let mut keys: Vec<String> = data
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn search(&self, _namespace: &[String], _query: &str, _limit: usize) -> Result<Vec<SearchResult>, AgentError> {
        Ok(vec![])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_roundtrip() {
        let store = InMemoryStore::new();
        let ns = vec!["workflow-1".to_string(), "agent-a".to_string()];
        store.put(&ns, "count", serde_json::json!(3)).await.unwrap();
        assert_eq!(store.get(&ns, "count").await.unwrap(), Some(serde_json::json!(3)));
    }

    #[tokio::test]
    async fn namespaces_are_isolated() {
        let store = InMemoryStore::new();
        let a = vec!["a".to_string()];
        let b = vec!["b".to_string()];
        store.put(&a, "k", serde_json::json!(1)).await.unwrap();
        assert_eq!(store.get(&b, "k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_is_noop_on_missing_key() {
        let store = InMemoryStore::new();
        let ns = vec!["ns".to_string()];
        assert!(store.delete(&ns, "missing").await.is_ok());
    }

    #[tokio::test]
    async fn list_returns_sorted_keys() {
        let store = InMemoryStore::new();
        let ns = vec!["ns".to_string()];
        store.put(&ns, "b", serde_json::json!(1)).await.unwrap();
        store.put(&ns, "a", serde_json::json!(2)).await.unwrap();
        assert_eq!(store.list(&ns).await.unwrap(), vec!["a".to_string(), "b".to_string()]);
    }
}
