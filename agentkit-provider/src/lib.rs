#![deny(missing_docs)]
//! LLM provider boundary — request/response types, the [`Provider`] trait
//! agents call through, and context-window compaction strategies.
//!
//! This crate defines the LLM client contract: a provider turns a
//! [`CompletionRequest`] (messages, system prompt, sampling params) into a
//! [`Completion`] (text, finish reason, usage, cost). It does not run a
//! ReAct loop itself — that's `agentkit-react`, which composes a
//! `Provider` with an output parser and a tool registry.
//!
//! Key traits defined here:
//! - [`Provider`] — LLM client interface (not object-safe, uses RPITIT)
//! - [`ContextStrategy`] — context window management

pub mod context;
pub mod provider;
pub mod types;

// Re-exports
pub use context::{ContextStrategy, NoCompaction};
pub use provider::{Provider, ProviderError};
pub use types::*;
