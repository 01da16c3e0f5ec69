//! # agentkit-core — protocol traits for the agent-orchestration core
//!
//! Defines the boundary types every other crate in this workspace builds
//! on: the [`Runnable`](runnable::Runnable) substrate, the dispatch
//! contract agents are reached through, the state/store protocol,
//! intervention hooks used inside the ReAct loop, the effect system agents
//! use to declare side-effects without executing them, and the unified
//! [`AgentError`](error::AgentError) taxonomy every other crate's errors
//! fold into.
//!
//! ## Design principle
//!
//! Every trait here is operation-defined, not mechanism-defined.
//! [`Runnable::invoke`] means "run this stage once" — not "make an HTTP
//! call" or "spawn a subprocess." That's what makes implementations
//! swappable: an in-process agent loop, a durable-workflow-backed one, and
//! a test double all implement the same trait.
//!
//! ## Dependency note
//!
//! This crate leans on `serde_json::Value` for extension data (metadata,
//! tool arguments, custom payloads). JSON is the universal interchange
//! format for agentic systems; the alternative (a generic `T: Serialize`)
//! would complicate trait-object safety for no practical benefit.

#![deny(missing_docs)]

pub mod content;
pub mod duration;
pub mod effect;
pub mod error;
pub mod hook;
pub mod id;
pub mod lifecycle;
pub mod memory;
pub mod orchestrator;
pub mod runnable;
pub mod state;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use content::{Content, ContentBlock};
pub use duration::DurationMs;
pub use effect::{Effect, LogLevel, Scope, SignalPayload};
pub use error::{AgentError, ErrorKind, HookError};
pub use hook::{Hook, HookAction, HookContext, HookPipeline, HookPoint};
pub use id::{AgentId, MessageId, ScopeId, SessionId, TaskId, WorkflowId};
pub use lifecycle::{BudgetDecision, BudgetEvent, CompactionEvent, EventSource, ObservableEvent};
pub use memory::{Memory, MemoryEntry, StoreMemory};
pub use orchestrator::{Dispatcher, QueryPayload};
pub use runnable::{
    Agent, AgentInput, AgentOutput, AgentStatus, Piped, ReasoningStep, RunContext, Runnable,
    StreamChunk, TokenUsage, ToolCall, TriggerType, DEFAULT_STREAM_BUFFER,
};
pub use state::{AgentState, Document, SearchResult, StateReader, StateStore, VectorStore};
