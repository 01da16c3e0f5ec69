//! Session-scoped conversation memory.
//!
//! [`Memory`] is the narrow contract an agent executor needs for
//! conversation continuity: append an exchange, read recent history, clear
//! a session. It is deliberately smaller than [`crate::state::StateStore`] —
//! memory is a view over *one* well-known shape of state (an ordered list
//! of turns per session), while the store is arbitrary namespaced KV.
//! [`StoreMemory`] bridges the two, so any store backend doubles as a
//! memory backend without its own implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::duration::DurationMs;
use crate::effect::Scope;
use crate::error::AgentError;
use crate::id::SessionId;
use crate::state::StateStore;

/// One conversation turn: who said it and what was said.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Speaker role (`"user"`, `"assistant"`, `"system"`, …).
    pub role: String,
    /// The turn's content.
    pub content: String,
    /// When the turn was recorded.
    pub timestamp: DurationMs,
}

impl MemoryEntry {
    /// Construct an entry stamped with the current time.
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self { role: role.into(), content: content.into(), timestamp: DurationMs::now() }
    }
}

/// Session conversation history.
///
/// Implementations may trim old turns (by count or token estimate); callers
/// must treat `history` as "the retained window," not a full transcript.
#[async_trait]
pub trait Memory: Send + Sync {
    /// Append one turn to a session's history.
    async fn append(&self, session_id: &SessionId, entry: MemoryEntry) -> Result<(), AgentError>;

    /// Read a session's retained history, oldest first. `limit` caps the
    /// result to the most recent `limit` turns.
    async fn history(&self, session_id: &SessionId, limit: Option<usize>) -> Result<Vec<MemoryEntry>, AgentError>;

    /// Drop a session's history entirely.
    async fn clear(&self, session_id: &SessionId) -> Result<(), AgentError>;
}

const HISTORY_KEY: &str = "history";

/// [`Memory`] backed by any [`StateStore`]: each session's history lives as
/// one JSON array under that session's namespace.
///
/// `append` is read-modify-write on that array, so two executors appending
/// to the *same session* concurrently can lose a turn; sessions are
/// conversation-scoped and conversations are sequential, so this trade
/// keeps every store backend usable without a compare-and-swap primitive.
pub struct StoreMemory {
    store: Arc<dyn StateStore>,
    max_turns: Option<usize>,
}

impl StoreMemory {
    /// Build a memory view over `store`, retaining unlimited turns.
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store, max_turns: None }
    }

    /// Retain only the most recent `max_turns` turns per session; older
    /// turns are dropped on append.
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    fn namespace(session_id: &SessionId) -> Vec<String> {
        Scope::Session(session_id.clone()).namespace()
    }

    async fn read_entries(&self, session_id: &SessionId) -> Result<Vec<MemoryEntry>, AgentError> {
        let namespace = Self::namespace(session_id);
        match self.store.get(&namespace, HISTORY_KEY).await? {
            Some(value) => serde_json::from_value(value).map_err(|e| {
                AgentError::new(
                    crate::error::ErrorKind::Internal,
                    "store_memory",
                    "history",
                    format!("stored history is not a valid entry array: {e}"),
                )
            }),
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl Memory for StoreMemory {
    async fn append(&self, session_id: &SessionId, entry: MemoryEntry) -> Result<(), AgentError> {
        let mut entries = self.read_entries(session_id).await?;
        entries.push(entry);
        if let Some(max) = self.max_turns {
            if entries.len() > max {
                entries.drain(..entries.len() - max);
            }
        }
        let value = serde_json::to_value(&entries).map_err(|e| {
            AgentError::new(crate::error::ErrorKind::Internal, "store_memory", "append", e.to_string())
        })?;
        self.store.put(&Self::namespace(session_id), HISTORY_KEY, value).await
    }

    async fn history(&self, session_id: &SessionId, limit: Option<usize>) -> Result<Vec<MemoryEntry>, AgentError> {
        let mut entries = self.read_entries(session_id).await?;
        if let Some(limit) = limit {
            if entries.len() > limit {
                entries.drain(..entries.len() - limit);
            }
        }
        Ok(entries)
    }

    async fn clear(&self, session_id: &SessionId) -> Result<(), AgentError> {
        self.store.delete(&Self::namespace(session_id), HISTORY_KEY).await
    }
}
