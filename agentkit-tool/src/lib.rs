#![deny(missing_docs)]
//! Tool registry and per-call runtime.
//!
//! Defines the [`ToolDyn`] trait for object-safe tool abstraction, the
//! [`ToolRegistry`] that names and looks up tools, and [`ToolRuntime`], the
//! per-call bundle an executor attaches to every tool invocation. Any tool
//! source (local function, MCP server, HTTP endpoint) implements [`ToolDyn`].

pub mod builtin;
pub mod middleware;

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

use agentkit_core::{AgentState, RunContext, StateStore};

/// Errors from tool operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ToolError {
    /// The requested tool was not found in the registry.
    #[error("tool not found: {0}")]
    NotFound(String),

    /// Tool execution failed.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// The input provided to the tool was invalid.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Registration rejected because the name is already bound.
    #[error("tool already registered: {0}")]
    DuplicateName(String),

    /// A rate limiter rejected the call; retry after the given duration.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited {
        /// How long the caller should wait before retrying.
        retry_after_ms: u64,
    },

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Input handed to a tool at call time.
///
/// `runtime` is `None` only for tools invoked outside an agent loop (e.g.
/// direct unit tests of a tool in isolation).
#[derive(Clone)]
pub struct ToolInput {
    /// Call arguments, keyed by parameter name.
    pub args: serde_json::Map<String, serde_json::Value>,
    /// Per-call runtime bundle. See [`ToolRuntime`].
    pub runtime: Option<ToolRuntime>,
}

impl ToolInput {
    /// Build a `ToolInput` with no runtime attached.
    pub fn new(args: serde_json::Map<String, serde_json::Value>) -> Self {
        Self { args, runtime: None }
    }

    /// Attach a runtime bundle, as the executor does on every invocation.
    pub fn with_runtime(mut self, runtime: ToolRuntime) -> Self {
        self.runtime = Some(runtime);
        self
    }
}

/// Result of a tool call.
///
/// `success = false` iff `error` is non-empty — this invariant is enforced
/// by the constructors, not by callers setting the fields directly.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolOutput {
    /// The tool's return value. `Value::Null` on failure.
    pub result: serde_json::Value,
    /// Whether the call succeeded.
    pub success: bool,
    /// Failure reason. Empty iff `success`.
    pub error: String,
    /// Arbitrary metadata (latency breakdown, cache hit, etc.).
    pub metadata: serde_json::Value,
}

impl ToolOutput {
    /// A successful result.
    pub fn ok(result: serde_json::Value) -> Self {
        Self { result, success: true, error: String::new(), metadata: serde_json::Value::Null }
    }

    /// A failed result. `reason` must be non-empty.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self { result: serde_json::Value::Null, success: false, error: reason.into(), metadata: serde_json::Value::Null }
    }

    /// Attach metadata to this output.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

impl From<Result<serde_json::Value, ToolError>> for ToolOutput {
    fn from(result: Result<serde_json::Value, ToolError>) -> Self {
        match result {
            Ok(value) => ToolOutput::ok(value),
            Err(e) => ToolOutput::failed(e.to_string()),
        }
    }
}

/// Per-call scoped bundle attached to every tool invocation.
///
/// Created fresh by the executor at tool-call start and dropped at return;
/// a tool that stashes a clone past the call it was given for is holding an
/// illegal reference — `state` and `store` outlive the call, but the
/// `ToolRuntime` value itself does not.
#[derive(Clone)]
pub struct ToolRuntime {
    /// Unique identifier for this specific call, for tracing and caching.
    pub call_id: String,
    /// Scratch space shared by every tool call within the same invocation.
    pub state: Arc<AgentState>,
    /// Persistent key/value store. The runtime borrows it; it does not own it.
    pub store: Arc<dyn StateStore>,
    /// Emit a stream event for user-visible progress. Errors propagate to
    /// the caller as a tool failure.
    pub stream_writer: Arc<dyn Fn(serde_json::Value) -> Result<(), agentkit_core::AgentError> + Send + Sync>,
    /// Cancellation/deadline handle, observed at every suspension point.
    pub ctx: RunContext,
}

impl ToolRuntime {
    /// Build a runtime bundle for one call.
    pub fn new(
        call_id: impl Into<String>,
        state: Arc<AgentState>,
        store: Arc<dyn StateStore>,
        stream_writer: Arc<dyn Fn(serde_json::Value) -> Result<(), agentkit_core::AgentError> + Send + Sync>,
        ctx: RunContext,
    ) -> Self {
        Self { call_id: call_id.into(), state, store, stream_writer, ctx }
    }
}

/// Object-safe trait for tool implementations.
///
/// Any tool source (local function, MCP server, HTTP endpoint) implements
/// this trait. Tools are stored as `Arc<dyn ToolDyn>` in [`ToolRegistry`].
pub trait ToolDyn: Send + Sync {
    /// The tool's unique name.
    fn name(&self) -> &str;

    /// Human-readable description of what the tool does.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's input parameters.
    fn input_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given input.
    fn call(&self, input: ToolInput) -> Pin<Box<dyn Future<Output = ToolOutput> + Send + '_>>;
}

/// Registry of tools available to an agent.
///
/// Case-sensitive name to tool mapping. Registration fails if the name is
/// already bound — callers that want to replace a tool must remove it
/// first. [`ToolRegistry::iter`] returns tools in stable alphabetical order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn ToolDyn>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { tools: BTreeMap::new() }
    }

    /// Register a tool. Fails if a tool with the same name is already bound.
    pub fn register(&mut self, tool: Arc<dyn ToolDyn>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::DuplicateName(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolDyn>> {
        self.tools.get(name)
    }

    /// Iterate over all registered tools in alphabetical order by name.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ToolDyn>> {
        self.tools.values()
    }

    /// Tool names in alphabetical order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentkit_core::test_utils::InMemoryStore;
    use serde_json::json;

    fn _assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn tool_dyn_is_object_safe() {
        _assert_send_sync::<Arc<dyn ToolDyn>>();
    }

    #[test]
    fn tool_error_display() {
        assert_eq!(ToolError::NotFound("bash".into()).to_string(), "tool not found: bash");
        assert_eq!(ToolError::DuplicateName("bash".into()).to_string(), "tool already registered: bash");
    }

    #[test]
    fn tool_output_invariant_holds_via_constructors() {
        let ok = ToolOutput::ok(json!(1));
        assert!(ok.success && ok.error.is_empty());

        let failed = ToolOutput::failed("boom");
        assert!(!failed.success && !failed.error.is_empty());
    }

    struct EchoTool;

    impl ToolDyn for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes input back"
        }
        fn input_schema(&self) -> serde_json::Value {
            json!({"type": "object"})
        }
        fn call(&self, input: ToolInput) -> Pin<Box<dyn Future<Output = ToolOutput> + Send + '_>> {
            Box::pin(async move { ToolOutput::ok(json!({"echoed": input.args})) })
        }
    }

    struct FailTool;

    impl ToolDyn for FailTool {
        fn name(&self) -> &str {
            "fail"
        }
        fn description(&self) -> &str {
            "Always fails"
        }
        fn input_schema(&self) -> serde_json::Value {
            json!({"type": "object"})
        }
        fn call(&self, _input: ToolInput) -> Pin<Box<dyn Future<Output = ToolOutput> + Send + '_>> {
            Box::pin(async { ToolOutput::failed("always fails") })
        }
    }

    fn test_runtime() -> ToolRuntime {
        ToolRuntime::new(
            "call-1",
            Arc::new(AgentState::new()),
            Arc::new(InMemoryStore::new()),
            Arc::new(|_event| Ok(())),
            RunContext::new(),
        )
    }

    #[test]
    fn registry_add_and_get() {
        let mut reg = ToolRegistry::new();
        assert!(reg.is_empty());

        reg.register(Arc::new(EchoTool)).unwrap();
        assert_eq!(reg.len(), 1);
        assert!(reg.get("echo").is_some());
        assert!(reg.get("nonexistent").is_none());
    }

    #[test]
    fn registry_duplicate_registration_fails() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool)).unwrap();
        assert_eq!(reg.len(), 1);

        let err = reg.register(Arc::new(EchoTool)).unwrap_err();
        assert!(matches!(err, ToolError::DuplicateName(name) if name == "echo"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn registry_names_are_alphabetical() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(FailTool)).unwrap();
        reg.register(Arc::new(EchoTool)).unwrap();

        assert_eq!(reg.names(), vec!["echo", "fail"]);
    }

    #[tokio::test]
    async fn registry_call_tool_with_runtime() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool)).unwrap();

        let tool = reg.get("echo").unwrap();
        let mut args = serde_json::Map::new();
        args.insert("msg".into(), json!("hello"));
        let input = ToolInput::new(args).with_runtime(test_runtime());
        let output = tool.call(input).await;
        assert!(output.success);
        assert_eq!(output.result, json!({"echoed": {"msg": "hello"}}));
    }

    #[tokio::test]
    async fn registry_call_failing_tool() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(FailTool)).unwrap();

        let tool = reg.get("fail").unwrap();
        let output = tool.call(ToolInput::new(serde_json::Map::new())).await;
        assert!(!output.success);
        assert_eq!(output.error, "always fails");
    }
}
