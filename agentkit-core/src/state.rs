//! The Store protocol — hierarchical KV persistence across agent invocations.
//!
//! `namespace` is an ordered tuple of strings (`["workflow-1", "agent-a"]`),
//! not the `Scope` enum used by [`crate::effect::Effect`] — the store itself
//! doesn't need to know what a namespace segment *means* (session vs.
//! workflow vs. agent), only that namespaces nest. [`crate::effect::Scope`]
//! converts to a namespace via [`crate::effect::Scope::namespace`] for
//! callers that still want to address state by the higher-level vocabulary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::AgentError;

/// Thread-safe, string-keyed scratch space scoped to one agent invocation.
///
/// Distinct from [`StateStore`]: `AgentState` is ephemeral (lives only for
/// the duration of one [`crate::runnable::Runnable::invoke`] call, shared
/// across its tool calls) while a `StateStore` persists across invocations.
/// A tool reading a value another tool in the same invocation just wrote
/// goes through `AgentState`, not the store.
#[derive(Debug, Default)]
pub struct AgentState {
    values: RwLock<HashMap<String, serde_json::Value>>,
}

impl AgentState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a value by key.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.values.read().expect("AgentState lock poisoned").get(key).cloned()
    }

    /// Write a value, creating or overwriting the key.
    pub fn set(&self, key: impl Into<String>, value: serde_json::Value) {
        self.values.write().expect("AgentState lock poisoned").insert(key.into(), value);
    }

    /// Remove a key. No-op if absent.
    pub fn delete(&self, key: &str) {
        self.values.write().expect("AgentState lock poisoned").remove(key);
    }

    /// A point-in-time copy of every key/value currently held.
    pub fn snapshot(&self) -> HashMap<String, serde_json::Value> {
        self.values.read().expect("AgentState lock poisoned").clone()
    }
}

/// Hierarchical key/value store.
///
/// Implementations: in-memory (testing, ephemeral), filesystem (durable,
/// single-machine), and external backends (Redis, Postgres) that implement
/// the same contract out of tree.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read a value by key within a namespace. `None` if absent.
    async fn get(&self, namespace: &[String], key: &str) -> Result<Option<serde_json::Value>, AgentError>;

    /// Write a value. Creates or overwrites.
    async fn put(&self, namespace: &[String], key: &str, value: serde_json::Value) -> Result<(), AgentError>;

    /// Delete a value. No-op if the key doesn't exist.
    async fn delete(&self, namespace: &[String], key: &str) -> Result<(), AgentError>;

    /// List keys under a namespace in lexicographic order.
    async fn list(&self, namespace: &[String]) -> Result<Vec<String>, AgentError>;

    /// Semantic search within a namespace. Implementations without search
    /// support return an empty vec, not an error.
    async fn search(&self, namespace: &[String], query: &str, limit: usize) -> Result<Vec<SearchResult>, AgentError>;
}

/// A search result from a state store query.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The key that matched.
    pub key: String,
    /// Relevance score (higher is more relevant).
    pub score: f64,
    /// Preview/snippet of the matched content, if the backend provides one.
    pub snippet: Option<String>,
}

impl SearchResult {
    /// Create a new search result.
    pub fn new(key: impl Into<String>, score: f64) -> Self {
        Self { key: key.into(), score, snippet: None }
    }
}

/// Read-only view of state, handed to an agent during context assembly.
/// The agent can read but cannot write directly — writes are declared as
/// [`crate::effect::Effect::WriteMemory`] in its output and executed by the
/// calling layer. This enforces the read/write asymmetry at the type level.
#[async_trait]
pub trait StateReader: Send + Sync {
    /// Read a value by key within a namespace.
    async fn get(&self, namespace: &[String], key: &str) -> Result<Option<serde_json::Value>, AgentError>;

    /// List keys under a namespace.
    async fn list(&self, namespace: &[String]) -> Result<Vec<String>, AgentError>;

    /// Semantic search within a namespace.
    async fn search(&self, namespace: &[String], query: &str, limit: usize) -> Result<Vec<SearchResult>, AgentError>;
}

/// Blanket implementation: every `StateStore` is a `StateReader`.
#[async_trait]
impl<T: StateStore> StateReader for T {
    async fn get(&self, namespace: &[String], key: &str) -> Result<Option<serde_json::Value>, AgentError> {
        StateStore::get(self, namespace, key).await
    }

    async fn list(&self, namespace: &[String]) -> Result<Vec<String>, AgentError> {
        StateStore::list(self, namespace).await
    }

    async fn search(&self, namespace: &[String], query: &str, limit: usize) -> Result<Vec<SearchResult>, AgentError> {
        StateStore::search(self, namespace, query, limit).await
    }
}

/// A document, used only by the store/vector-store contracts — not produced
/// or consumed by the core itself.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Document identifier.
    pub id: String,
    /// Document content.
    pub content: String,
    /// Arbitrary metadata.
    pub metadata: serde_json::Value,
    /// Similarity score, when returned from a search.
    pub score: Option<f64>,
}

/// A vector store: embeddings in, ranked documents out. Contract only — no
/// concrete backend ships with this workspace.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Add documents with their precomputed vectors.
    async fn add(&self, docs: Vec<Document>, vectors: Vec<Vec<f32>>) -> Result<(), AgentError>;

    /// Search by vector, returning at most `top_k` documents ranked by score.
    async fn search(&self, vector: Vec<f32>, top_k: usize) -> Result<Vec<Document>, AgentError>;

    /// Delete documents by id.
    async fn delete(&self, ids: Vec<String>) -> Result<(), AgentError>;

    /// Replace existing documents in place.
    async fn update(&self, docs: Vec<Document>) -> Result<(), AgentError>;
}
