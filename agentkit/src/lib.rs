#![deny(missing_docs)]
//! # agentkit — umbrella crate
//!
//! Provides a single import surface for the agentkit workspace. Re-exports
//! the protocol crate and key implementations behind feature flags, plus a
//! `prelude` for the happy path.

#[cfg(feature = "aggregator")]
pub use agentkit_aggregator;
#[cfg(feature = "bus")]
pub use agentkit_bus;
#[cfg(feature = "core")]
pub use agentkit_context;
#[cfg(feature = "core")]
pub use agentkit_core;
#[cfg(feature = "dispatch")]
pub use agentkit_dispatch;
#[cfg(feature = "hooks")]
pub use agentkit_hooks;
#[cfg(feature = "observability")]
pub use agentkit_observability;
#[cfg(feature = "core")]
pub use agentkit_parser;
#[cfg(feature = "core")]
pub use agentkit_provider;
#[cfg(feature = "react")]
pub use agentkit_react;
#[cfg(feature = "router")]
pub use agentkit_router;
#[cfg(feature = "state-fs")]
pub use agentkit_store_fs;
#[cfg(feature = "state-memory")]
pub use agentkit_store_memory;
#[cfg(feature = "supervisor")]
pub use agentkit_supervisor;
#[cfg(feature = "core")]
pub use agentkit_tool;

/// Happy-path imports for composing agent systems.
pub mod prelude {
    #[cfg(feature = "core")]
    pub use agentkit_core::{
        Agent, AgentError, AgentId, AgentInput, AgentOutput, AgentState, AgentStatus, Dispatcher,
        Effect, ErrorKind, Hook, HookAction, HookContext, HookPoint, Memory, MemoryEntry,
        RunContext, Runnable, Scope, SessionId, StateReader, StateStore, StoreMemory, StreamChunk,
        WorkflowId,
    };

    #[cfg(feature = "core")]
    pub use agentkit_tool::{ToolDyn, ToolError, ToolInput, ToolOutput, ToolRegistry, ToolRuntime};

    #[cfg(feature = "core")]
    pub use agentkit_parser::{parse_react_output, ParsedOutput};

    #[cfg(feature = "core")]
    pub use agentkit_provider::{ChatMessage, Completion, CompletionRequest, Provider, ProviderError};

    #[cfg(feature = "core")]
    pub use agentkit_context::SlidingWindow;

    #[cfg(feature = "hooks")]
    pub use agentkit_hooks::{Callback, CallbackEvent, CallbackManager, WithCallbacks};

    #[cfg(feature = "react")]
    pub use agentkit_react::{AgentExecutor, AgentExecutorConfig, ReactAgent, ReactConfig};

    #[cfg(feature = "router")]
    pub use agentkit_router::{AgentProfile, Router};

    #[cfg(feature = "aggregator")]
    pub use agentkit_aggregator::{Aggregator, SourceResult};

    #[cfg(feature = "supervisor")]
    pub use agentkit_supervisor::{Supervisor, SupervisorConfig, Task};

    #[cfg(feature = "dispatch")]
    pub use agentkit_dispatch::LocalDispatcher;

    #[cfg(feature = "bus")]
    pub use agentkit_bus::{Bus, SessionManager};

    #[cfg(feature = "observability")]
    pub use agentkit_observability::WithObservability;

    #[cfg(feature = "state-memory")]
    pub use agentkit_store_memory::MemoryStore;

    #[cfg(feature = "state-fs")]
    pub use agentkit_store_fs::FsStore;
}
