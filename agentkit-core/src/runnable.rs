//! The Runnable substrate — a uniform execute/stream/batch/pipe surface any
//! stage (agent, tool, parser, chain) implements.
//!
//! A single required method, atomic from the caller's perspective —
//! implementations decide internally
//! how many model calls, tool uses, or sub-steps happen. `stream`/`batch`
//! get useful defaults so most implementations only write `invoke`; `pipe`
//! is functional composition. `with_callbacks`/`with_config` return a new
//! decorated view rather than mutating `self` — concrete decorators
//! (`WithCallbacks` in `agentkit-hooks`, config overlays in `agentkit-react`)
//! live in the crates that own the thing being decorated, to avoid circular
//! dependencies back into this crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio_util::sync::CancellationToken;

use crate::duration::DurationMs;
use crate::effect::Effect;
use crate::error::AgentError;
use crate::id::SessionId;

impl DurationMs {
    /// Milliseconds since the Unix epoch, for use as a timestamp rather
    /// than a duration. Saturates to [`DurationMs::ZERO`] on clock error.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self::from_millis(millis)
    }
}

/// Cancellation and deadline context threaded through every suspension
/// point: LLM calls, tool calls, channel sends, store/memory I/O, and
/// rate-limiter waits. Honoring it is a suspension point's responsibility,
/// not this struct's — `RunContext` only carries the signal.
#[derive(Debug, Clone)]
pub struct RunContext {
    cancellation: CancellationToken,
    deadline: Option<Instant>,
}

impl RunContext {
    /// A context with no deadline, cancellable only via its token.
    pub fn new() -> Self {
        Self { cancellation: CancellationToken::new(), deadline: None }
    }

    /// Derive a child context with an additional deadline `timeout` from now.
    /// The tighter of any existing deadline and the new one wins.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = Some(match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        });
        Self { cancellation: self.cancellation.child_token(), deadline }
    }

    /// Whether the context has been canceled.
    pub fn is_canceled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Whether the deadline, if any, has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Cancel this context and every context derived from it.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Resolve to an error if canceled or expired, else `Ok(())`.
    pub fn check(&self, component: &str, operation: &str) -> Result<(), AgentError> {
        if self.is_canceled() {
            Err(AgentError::canceled(component, operation))
        } else if self.is_expired() {
            Err(AgentError::timeout(component, operation))
        } else {
            Ok(())
        }
    }

    /// Race a future against cancellation/deadline, honoring whichever
    /// happens first.
    pub async fn race<F, T>(&self, component: &str, operation: &str, fut: F) -> Result<T, AgentError>
    where
        F: std::future::Future<Output = T>,
    {
        if let Some(deadline) = self.deadline {
            tokio::select! {
                _ = self.cancellation.cancelled() => Err(AgentError::canceled(component, operation)),
                _ = tokio::time::sleep_until(deadline.into()) => Err(AgentError::timeout(component, operation)),
                out = fut => Ok(out),
            }
        } else {
            tokio::select! {
                _ = self.cancellation.cancelled() => Err(AgentError::canceled(component, operation)),
                out = fut => Ok(out),
            }
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

/// One chunk of an incremental result. The producer closes its channel on
/// completion or cancellation; exactly one chunk carries `done = true`, or
/// exactly one chunk carries an error — never both paths on the same stream.
#[derive(Debug, Clone)]
pub struct StreamChunk<T> {
    /// The chunk's payload, absent on the error path.
    pub data: Option<T>,
    /// The terminal error, absent on the success path.
    pub error: Option<AgentError>,
    /// Whether this is the terminal chunk.
    pub done: bool,
}

impl<T> StreamChunk<T> {
    /// A non-terminal data chunk.
    pub fn data(value: T) -> Self {
        Self { data: Some(value), error: None, done: false }
    }

    /// The terminal success chunk.
    pub fn done(value: T) -> Self {
        Self { data: Some(value), error: None, done: true }
    }

    /// The terminal error chunk.
    pub fn err(error: AgentError) -> Self {
        Self { data: None, error: Some(error), done: true }
    }
}

/// Default bound on a stage's stream channel. A slow consumer stalls the
/// producer rather than the producer growing an unbounded backlog; producers
/// must still honor `ctx` cancellation rather than blocking forever on a
/// full channel.
pub const DEFAULT_STREAM_BUFFER: usize = 16;

/// Uniform execution contract for any stage: agent, tool, parser, chain.
///
/// Object-safe for a fixed `(Input, Output)` pair (`dyn Runnable<Input = X,
/// Output = Y>`); `pipe` requires `Self: Sized` since it returns a new
/// concrete composite type, so it is only available on concrete stages, not
/// through a trait object — the same restriction `Iterator::chain` has.
#[async_trait]
pub trait Runnable: Send + Sync {
    /// This stage's input type.
    type Input: Send + 'static;
    /// This stage's output type.
    type Output: Send + 'static;

    /// Synchronous single execution. The suspension points inside MUST
    /// observe `ctx` cancellation.
    async fn invoke(&self, ctx: &RunContext, input: Self::Input) -> Result<Self::Output, AgentError>;

    /// Incremental execution. Default: invoke once and emit a single
    /// terminal chunk. Implementations that can genuinely stream override
    /// this to emit intermediate chunks first.
    async fn stream(&self, ctx: &RunContext, input: Self::Input) -> tokio::sync::mpsc::Receiver<StreamChunk<Self::Output>> {
        let (tx, rx) = tokio::sync::mpsc::channel(DEFAULT_STREAM_BUFFER);
        let chunk = match self.invoke(ctx, input).await {
            Ok(out) => StreamChunk::done(out),
            Err(e) => StreamChunk::err(e),
        };
        let _ = tx.send(chunk).await;
        rx
    }

    /// Batch execution. Default: invoke in order; implementations may
    /// parallelize internally if doing so is safe for their semantics.
    async fn batch(&self, ctx: &RunContext, inputs: Vec<Self::Input>) -> Result<Vec<Self::Output>, AgentError> {
        let mut out = Vec::with_capacity(inputs.len());
        for input in inputs {
            out.push(self.invoke(ctx, input).await?);
        }
        Ok(out)
    }

    /// Functional composition: `self.pipe(next).invoke(x) == next.invoke(self.invoke(x))`.
    fn pipe<N>(self, next: N) -> Piped<Self, N>
    where
        Self: Sized,
        N: Runnable<Input = Self::Output>,
    {
        Piped { first: self, second: next }
    }
}

/// The composite stage produced by [`Runnable::pipe`].
pub struct Piped<A, B> {
    first: A,
    second: B,
}

#[async_trait]
impl<A, B> Runnable for Piped<A, B>
where
    A: Runnable,
    B: Runnable<Input = A::Output>,
{
    type Input = A::Input;
    type Output = B::Output;

    async fn invoke(&self, ctx: &RunContext, input: Self::Input) -> Result<Self::Output, AgentError> {
        let mid = self.first.invoke(ctx, input).await?;
        self.second.invoke(ctx, mid).await
    }
}

/// What triggers an agent invocation. Informs context assembly — a
/// scheduled trigger means reconstructing everything from state, while a
/// user message carries conversation context naturally.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// Human sent a message.
    User,
    /// Another agent or the supervisor assigned a task.
    Task,
    /// Signal from another workflow/agent.
    Signal,
    /// Cron/schedule triggered.
    Schedule,
    /// System event (file change, webhook, etc).
    SystemEvent,
    /// Future trigger types.
    Custom(String),
}

/// Input to an agent invocation. Immutable after construction; `task` must
/// be non-empty for a real (non-test) agent.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInput {
    /// The task description driving this invocation.
    pub task: String,
    /// Caller-supplied context (arbitrary key/value).
    #[serde(default)]
    pub context: serde_json::Map<String, serde_json::Value>,
    /// Session for conversation continuity. `None` means stateless.
    pub session_id: Option<SessionId>,
    /// What caused this invocation to start.
    #[serde(default = "default_trigger")]
    pub trigger: TriggerType,
    /// When this input was constructed.
    pub timestamp: DurationMs,
}

fn default_trigger() -> TriggerType {
    TriggerType::User
}

impl AgentInput {
    /// Construct a new `AgentInput` for the given task, triggered by a user
    /// message, with no session and no extra context.
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            context: serde_json::Map::new(),
            session_id: None,
            trigger: TriggerType::User,
            timestamp: DurationMs::now(),
        }
    }

    /// Attach a session id for conversation continuity.
    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Attach a context key/value pair.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// The terminal status of an agent invocation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// The agent produced a final answer.
    Success,
    /// The agent could not produce a usable result.
    Failed,
    /// The agent produced a best-effort result but didn't reach completion
    /// (step budget exhausted, some sub-tasks failed, …).
    Partial,
}

/// One (thought, action?, observation?) record from one ReAct loop
/// iteration. `index` is dense and monotonically increasing within one
/// invocation.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningStep {
    /// Position of this step within the invocation; 0, 1, 2, … with no gaps.
    pub index: u32,
    /// The model's stated reasoning for this step.
    pub thought: String,
    /// The tool the model chose to invoke, if any.
    pub action: Option<String>,
    /// The parsed input to that tool, if any.
    pub action_input: Option<serde_json::Value>,
    /// The observation fed back into the next step, if any.
    pub observation: Option<String>,
    /// When this step occurred.
    pub timestamp: DurationMs,
}

impl ReasoningStep {
    /// Construct a thought-only step (no action taken yet).
    pub fn thought(index: u32, thought: impl Into<String>) -> Self {
        Self {
            index,
            thought: thought.into(),
            action: None,
            action_input: None,
            observation: None,
            timestamp: DurationMs::now(),
        }
    }

    /// Construct a step that took an action and recorded its observation.
    pub fn action(
        index: u32,
        thought: impl Into<String>,
        action: impl Into<String>,
        action_input: serde_json::Value,
        observation: impl Into<String>,
    ) -> Self {
        Self {
            index,
            thought: thought.into(),
            action: Some(action.into()),
            action_input: Some(action_input),
            observation: Some(observation.into()),
            timestamp: DurationMs::now(),
        }
    }
}

/// Record of one tool invocation. `success == false` iff `error` is
/// non-empty.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the invoked tool.
    pub tool_name: String,
    /// Arguments passed to the tool.
    pub args: serde_json::Map<String, serde_json::Value>,
    /// The tool's result, if it succeeded.
    pub result: Option<serde_json::Value>,
    /// Whether the call succeeded.
    pub success: bool,
    /// The error message, non-empty iff `!success`.
    pub error: String,
    /// Wall-clock duration of the call.
    pub duration: DurationMs,
    /// When the call was made.
    pub timestamp: DurationMs,
}

impl ToolCall {
    /// Record a tool call that succeeded.
    pub fn success(
        tool_name: impl Into<String>,
        args: serde_json::Map<String, serde_json::Value>,
        result: serde_json::Value,
        duration: DurationMs,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            args,
            result: Some(result),
            success: true,
            error: String::new(),
            duration,
            timestamp: DurationMs::now(),
        }
    }

    /// Record a tool call that failed. `error` must be non-empty.
    pub fn failed(
        tool_name: impl Into<String>,
        args: serde_json::Map<String, serde_json::Value>,
        error: impl Into<String>,
        duration: DurationMs,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            args,
            result: None,
            success: false,
            error: error.into(),
            duration,
            timestamp: DurationMs::now(),
        }
    }
}

/// Token accounting for one invocation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt.
    pub input_tokens: u64,
    /// Tokens generated by the model.
    pub output_tokens: u64,
}

/// Output from an agent invocation.
/// `status == Success` implies `result.is_some()`.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutput {
    /// The produced result. Always present when `status == Success`.
    pub result: Option<serde_json::Value>,
    /// Terminal status of the invocation.
    pub status: AgentStatus,
    /// Human-readable summary; always non-empty.
    pub message: String,
    /// The full reasoning trace, dense indices starting at 0.
    pub reasoning_steps: Vec<ReasoningStep>,
    /// Every tool call made during the invocation.
    pub tool_calls: Vec<ToolCall>,
    /// Token accounting, if the backing model reports it.
    pub token_usage: Option<TokenUsage>,
    /// Wall-clock duration of the invocation. Always `>=` the sum of every
    /// tool call's duration.
    pub latency: DurationMs,
    /// When the invocation completed.
    pub timestamp: DurationMs,
    /// Opaque metadata (error kind on failure, intermediate steps when
    /// `return_intermediate_steps` is set, routing/aggregation provenance).
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Side-effects this invocation wants the calling layer to execute.
    #[serde(default)]
    pub effects: Vec<Effect>,
}

impl AgentOutput {
    /// A successful output. `result` must be provided — a success with no
    /// result is a contract violation downstream consumers may reject.
    pub fn success(result: serde_json::Value, message: impl Into<String>) -> Self {
        Self::new(Some(result), AgentStatus::Success, message)
    }

    /// A failed output; `result` is absent.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(None, AgentStatus::Failed, message)
    }

    /// A partial (best-effort) output.
    pub fn partial(result: Option<serde_json::Value>, message: impl Into<String>) -> Self {
        Self::new(result, AgentStatus::Partial, message)
    }

    /// Attach metadata, replacing whatever was there.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    fn new(result: Option<serde_json::Value>, status: AgentStatus, message: impl Into<String>) -> Self {
        Self {
            result,
            status,
            message: message.into(),
            reasoning_steps: Vec::new(),
            tool_calls: Vec::new(),
            token_usage: None,
            latency: DurationMs::ZERO,
            timestamp: DurationMs::now(),
            metadata: serde_json::Value::Null,
            effects: Vec::new(),
        }
    }
}

/// Marker trait: a [`Runnable`] whose input/output are the standard agent
/// data model. An agent is atomic from the outside; everything inside
/// (model calls, tool uses, context strategy) is the implementation's
/// concern.
pub trait Agent: Runnable<Input = AgentInput, Output = AgentOutput> {}

impl<T> Agent for T where T: Runnable<Input = AgentInput, Output = AgentOutput> {}
