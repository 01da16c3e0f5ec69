//! Unified error type shared by every protocol boundary.
//!
//! Each domain (agent execution, orchestration, state, hooks, parsing,
//! routing, the message bus) used to carry its own `thiserror` enum. That
//! split made sense stage-by-stage but made it impossible to answer "what
//! kind of failure was this" uniformly across the system — retry policies,
//! aggregation, and the message bus all need to classify an error the same
//! way regardless of which layer raised it. [`AgentError`] keeps the
//! ergonomics of domain-specific constructors (`AgentError::tool(...)`,
//! `AgentError::llm_timeout(...)`) while carrying one [`ErrorKind`] plus
//! component/operation/context bookkeeping that every caller can match on.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// The classification every [`AgentError`] carries. Kinds group failures by
/// how a caller should react to them (retry, fail fast, surface to the
/// user) rather than by which module raised them.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad or missing configuration (e.g. an empty API key where one is required).
    InvalidConfig,
    /// Caller supplied malformed data (empty task, bad tool arguments).
    InvalidInput,
    /// The LLM request could not be constructed or sent.
    LlmRequest,
    /// The LLM responded but the response was unusable.
    LlmResponse,
    /// The LLM call exceeded its deadline.
    LlmTimeout,
    /// The LLM provider signaled a rate limit.
    LlmRateLimit,
    /// An agent invocation failed during execution.
    AgentExecution,
    /// An agent could not be initialized.
    AgentInitialization,
    /// The referenced agent does not exist.
    AgentNotFound,
    /// A tool invocation failed.
    ToolExecution,
    /// The referenced tool does not exist.
    ToolNotFound,
    /// The output parser could not classify the model's text.
    ParseError,
    /// A multi-agent bus peer could not be registered.
    MultiagentRegistration,
    /// A multi-agent bus message could not be delivered.
    MultiagentMessage,
    /// Consensus aggregation could not reach a defined result.
    MultiagentConsensus,
    /// A cancellation-aware operation exceeded its deadline.
    ContextTimeout,
    /// A cancellation-aware operation was canceled by its caller.
    ContextCanceled,
    /// Catch-all for failures that don't fit another kind.
    Internal,
}

impl ErrorKind {
    /// Whether a failure of this kind is worth retrying by default.
    ///
    /// Rate-limit and transient/timeout failures are retryable; auth,
    /// config, and input errors are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::LlmRateLimit
                | ErrorKind::LlmTimeout
                | ErrorKind::ToolExecution
                | ErrorKind::ContextTimeout
        )
    }

    fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidConfig => "invalid_config",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::LlmRequest => "llm_request",
            ErrorKind::LlmResponse => "llm_response",
            ErrorKind::LlmTimeout => "llm_timeout",
            ErrorKind::LlmRateLimit => "llm_rate_limit",
            ErrorKind::AgentExecution => "agent_execution",
            ErrorKind::AgentInitialization => "agent_initialization",
            ErrorKind::AgentNotFound => "agent_not_found",
            ErrorKind::ToolExecution => "tool_execution",
            ErrorKind::ToolNotFound => "tool_not_found",
            ErrorKind::ParseError => "parse_error",
            ErrorKind::MultiagentRegistration => "multiagent_registration",
            ErrorKind::MultiagentMessage => "multiagent_message",
            ErrorKind::MultiagentConsensus => "multiagent_consensus",
            ErrorKind::ContextTimeout => "context_timeout",
            ErrorKind::ContextCanceled => "context_canceled",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured error carrying everything downstream policy (retry,
/// aggregation, observability) needs: what kind of failure, where it came
/// from, what it was doing, any structured context, and the wrapped cause.
#[derive(Debug, Clone, Error)]
#[error("{component}.{operation}: {message}")]
pub struct AgentError {
    /// The error's classification.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
    /// The crate/module that raised the error (e.g. "react_loop", "tool_registry").
    pub component: String,
    /// The operation in progress when the error occurred (e.g. "execute", "dispatch").
    pub operation: String,
    /// Structured key/value context (tool name, agent id, session id, …).
    pub context: BTreeMap<String, serde_json::Value>,
    /// The wrapped cause, if any. Preserves the chain via `source()`.
    #[source]
    pub cause: Option<std::sync::Arc<dyn std::error::Error + Send + Sync>>,
}

impl AgentError {
    /// Construct a new error with the required fields.
    pub fn new(
        kind: ErrorKind,
        component: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            component: component.into(),
            operation: operation.into(),
            context: BTreeMap::new(),
            cause: None,
        }
    }

    /// Attach a structured context entry.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Attach the underlying cause, preserving the chain.
    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(std::sync::Arc::new(cause));
        self
    }

    /// Whether this error is worth retrying, per its kind.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Shorthand constructor: a tool-boundary failure.
    pub fn tool(operation: impl Into<String>, tool: impl Into<String>, message: impl Into<String>) -> Self {
        let tool = tool.into();
        Self::new(ErrorKind::ToolExecution, "tool_runtime", operation, message)
            .with_context("tool", serde_json::Value::String(tool))
    }

    /// Shorthand constructor: the named tool does not exist.
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        let tool = tool.into();
        Self::new(
            ErrorKind::ToolNotFound,
            "tool_registry",
            "lookup",
            format!("tool not found: {tool}"),
        )
        .with_context("tool", serde_json::Value::String(tool))
    }

    /// Shorthand constructor: an LLM boundary failure of the given sub-kind.
    pub fn llm(kind: ErrorKind, message: impl Into<String>) -> Self {
        debug_assert!(matches!(
            kind,
            ErrorKind::LlmRequest | ErrorKind::LlmResponse | ErrorKind::LlmTimeout | ErrorKind::LlmRateLimit
        ));
        Self::new(kind, "llm_client", "complete", message)
    }

    /// Shorthand constructor: the output parser could not classify the text.
    pub fn parse(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self::new(ErrorKind::ParseError, "output_parser", "parse", reason)
            .with_context("raw", serde_json::Value::String(raw))
    }

    /// Shorthand constructor: the named agent does not exist.
    pub fn agent_not_found(agent: impl Into<String>) -> Self {
        let agent = agent.into();
        Self::new(
            ErrorKind::AgentNotFound,
            "orchestrator",
            "dispatch",
            format!("agent not found: {agent}"),
        )
        .with_context("agent", serde_json::Value::String(agent))
    }

    /// Shorthand constructor: a deadline was exceeded.
    pub fn timeout(component: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::new(ErrorKind::ContextTimeout, component, operation, "deadline exceeded")
    }

    /// Shorthand constructor: the caller canceled the operation.
    pub fn canceled(component: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::new(ErrorKind::ContextCanceled, component, operation, "canceled")
    }

    /// Shorthand constructor: invalid configuration.
    pub fn invalid_config(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidConfig, component, "configure", message)
    }

    /// Shorthand constructor: invalid caller input.
    pub fn invalid_input(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, component, "validate", message)
    }
}

/// Hook/callback handler errors. Logged by the dispatching loop but do not
/// by themselves halt an in-flight agent invocation (only `HookAction::Halt`
/// does that) — the *callback manager* (as opposed to intervention hooks)
/// does propagate the first one to its caller.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum HookError {
    /// The hook or callback handler failed.
    #[error("hook failed: {0}")]
    Failed(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl From<HookError> for AgentError {
    fn from(e: HookError) -> Self {
        AgentError::new(ErrorKind::Internal, "hooks", "dispatch", e.to_string())
    }
}
