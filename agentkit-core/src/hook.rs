//! Intervention hooks — observation and control inside the ReAct loop's
//! inner cycle.
//!
//! This is distinct from the callback manager in `agentkit-hooks`:
//! callbacks are pure fan-out observers with no say in what happens next.
//! `Hook`s sit closer to the loop and can halt it, skip a tool call, or
//! rewrite a tool's input/output.

use crate::{content::Content, error::HookError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Where in the ReAct loop's inner cycle a hook fires.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPoint {
    /// Before each model inference call.
    PreInference,
    /// After the model responds, before tool execution.
    PostInference,
    /// Before each tool is executed.
    PreToolUse,
    /// After each tool completes, before its result enters context.
    PostToolUse,
    /// At each exit-condition check (step/cost/time budget).
    ExitCheck,
}

/// What context is available to a hook at its firing point. Read-only —
/// hooks observe and decide; mutation happens via `HookAction::Modify*`.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookContext {
    /// Current hook point.
    pub point: HookPoint,
    /// Current tool being called (only at Pre/PostToolUse).
    pub tool_name: Option<String>,
    /// Tool input (only at PreToolUse).
    pub tool_input: Option<serde_json::Value>,
    /// Tool result (only at PostToolUse).
    pub tool_result: Option<String>,
    /// Model response (only at PostInference).
    pub model_output: Option<Content>,
    /// Running count of tokens used.
    pub tokens_used: u64,
    /// Running cost in USD.
    pub cost: rust_decimal::Decimal,
    /// Number of loop iterations completed so far.
    pub steps_completed: u32,
    /// Time elapsed since the invocation started.
    pub elapsed: crate::duration::DurationMs,
}

impl HookContext {
    /// Create a new `HookContext` with only the hook point set.
    pub fn new(point: HookPoint) -> Self {
        Self {
            point,
            tool_name: None,
            tool_input: None,
            tool_result: None,
            model_output: None,
            tokens_used: 0,
            cost: rust_decimal::Decimal::ZERO,
            steps_completed: 0,
            elapsed: crate::duration::DurationMs::ZERO,
        }
    }
}

/// What a hook decides to do.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum HookAction {
    /// Continue normally.
    Continue,
    /// Halt the invocation; it finishes with `AgentStatus::Failed`.
    Halt {
        /// Reason for halting.
        reason: String,
    },
    /// Skip this tool call (only valid at `PreToolUse`). The tool is not
    /// executed; a synthetic "skipped by policy" observation is used
    /// instead.
    SkipTool {
        /// Reason for skipping.
        reason: String,
    },
    /// Replace the tool input before execution (only at `PreToolUse`).
    ModifyToolInput {
        /// The replacement tool input.
        new_input: serde_json::Value,
    },
    /// Replace the tool output (only at `PostToolUse`) — e.g. redacting
    /// secrets before the result enters context.
    ModifyToolOutput {
        /// The replacement output.
        new_output: serde_json::Value,
    },
}

/// A hook that can observe and intervene in the ReAct loop's inner cycle.
///
/// Registered externally (by the agent executor or supervisor); the loop
/// calls registered hooks at the points they subscribe to without knowing
/// who's watching. Hook handlers should complete quickly — an LLM-based
/// guardrail that calls a model on every tool use adds latency to every
/// tool call; that cost is the hook author's responsibility.
#[async_trait]
pub trait Hook: Send + Sync {
    /// Which points this hook fires at.
    fn points(&self) -> &[HookPoint];

    /// Called at each registered hook point. Returning an error does NOT
    /// halt the loop — it's logged and treated as `Continue`. Use
    /// `HookAction::Halt` to halt.
    async fn on_event(&self, ctx: &HookContext) -> Result<HookAction, HookError>;
}

/// Dispatches [`HookContext`] events to an ordered pipeline of intervention
/// [`Hook`]s.
///
/// Hooks fire in registration order and the pipeline short-circuits on the
/// first non-`Continue` action — a `Halt`, `SkipTool`, `ModifyToolInput`, or
/// `ModifyToolOutput` from one hook preempts every hook after it. This is
/// deliberately the opposite of the callback manager's (`agentkit-hooks`)
/// best-effort-iterate-all contract: intervention hooks decide what happens
/// next, so only one decision can win per dispatch. A handler error is
/// logged and treated as `Continue` — an intervention hook crashing
/// shouldn't halt the loop it was meant to observe.
pub struct HookPipeline {
    hooks: Vec<std::sync::Arc<dyn Hook>>,
}

impl HookPipeline {
    /// Create a new empty pipeline.
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Add a hook to the end of the pipeline.
    pub fn add(&mut self, hook: std::sync::Arc<dyn Hook>) {
        self.hooks.push(hook);
    }

    /// Dispatch an event through the pipeline, returning the first
    /// non-`Continue` action, or `Continue` if every hook passed through.
    pub async fn dispatch(&self, ctx: &HookContext) -> HookAction {
        for hook in &self.hooks {
            if !hook.points().contains(&ctx.point) {
                continue;
            }
            match hook.on_event(ctx).await {
                Ok(HookAction::Continue) => continue,
                Ok(action) => return action,
                Err(_) => continue,
            }
        }
        HookAction::Continue
    }
}

impl Default for HookPipeline {
    fn default() -> Self {
        Self::new()
    }
}
