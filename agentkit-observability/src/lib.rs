//! Observability wrapper — decorates any agent-shaped `Runnable` with
//! `tracing` spans, a concurrent-execution gauge, and per-tool-call child
//! events.
//!
//! Distinct from `agentkit_hooks::WithCallbacks`: that crate fans events
//! out to caller-registered `Callback` handlers for arbitrary backends;
//! this crate emits `tracing` spans/events directly, with no intermediate
//! fan-out, and is meant to sit closest to the wire.

use agentkit_core::{AgentError, AgentInput, AgentOutput, AgentStatus, RunContext, Runnable};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{LazyLock, Mutex};
use tracing::Instrument;

/// Process-wide count of invocations currently in flight through any
/// [`WithObservability`] wrapper. A real metrics backend would export this
/// as a gauge directly; tests and ad hoc diagnostics read it via
/// [`concurrent_invocations`].
static CONCURRENT_INVOCATIONS: AtomicI64 = AtomicI64::new(0);

/// Current value of the concurrent-execution gauge.
pub fn concurrent_invocations() -> i64 {
    CONCURRENT_INVOCATIONS.load(Ordering::Relaxed)
}

/// Per-component count of invocations that returned `Err`, keyed by the
/// wrapper's `component` name. A real metrics backend would export these as
/// labeled counters; tests and ad hoc diagnostics read them via
/// [`error_count`].
static ERROR_COUNTS: LazyLock<Mutex<HashMap<String, u64>>> = LazyLock::new(|| Mutex::new(HashMap::new()));

/// Current error count for `component`.
pub fn error_count(component: &str) -> u64 {
    ERROR_COUNTS.lock().expect("error counter lock poisoned").get(component).copied().unwrap_or(0)
}

fn record_error(component: &str) {
    let mut counts = ERROR_COUNTS.lock().expect("error counter lock poisoned");
    *counts.entry(component.to_string()).or_insert(0) += 1;
}

struct GaugeGuard;

impl GaugeGuard {
    fn enter() -> Self {
        CONCURRENT_INVOCATIONS.fetch_add(1, Ordering::Relaxed);
        Self
    }
}

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        CONCURRENT_INVOCATIONS.fetch_sub(1, Ordering::Relaxed);
    }
}

const TASK_SUMMARY_MAX: usize = 80;

fn summarize(task: &str) -> String {
    if task.len() <= TASK_SUMMARY_MAX {
        task.to_string()
    } else {
        let mut truncated = task.chars().take(TASK_SUMMARY_MAX).collect::<String>();
        truncated.push('…');
        truncated
    }
}

/// Wraps any `Runnable<Input = AgentInput, Output = AgentOutput>` so every
/// `invoke` starts a span carrying `{component, task_summary, session_id}`,
/// tracks the concurrent-execution gauge for its duration, and — on
/// return — records status, duration, tool-call count, and one child event
/// per tool call. On error, records the error on the span and increments a
/// per-component error counter.
///
/// `stream`/`batch` delegate straight through to the wrapped stage,
/// uninstrumented — wrapping those here would just re-wrap each element
/// through `invoke` anyway.
pub struct WithObservability<R> {
    inner: R,
    component: String,
}

impl<R> WithObservability<R> {
    /// Wrap `inner`, naming it `component` in span attributes.
    pub fn new(inner: R, component: impl Into<String>) -> Self {
        Self { inner, component: component.into() }
    }
}

#[async_trait]
impl<R> Runnable for WithObservability<R>
where
    R: Runnable<Input = AgentInput, Output = AgentOutput>,
{
    type Input = AgentInput;
    type Output = AgentOutput;

    async fn invoke(&self, ctx: &RunContext, input: Self::Input) -> Result<Self::Output, AgentError> {
        let task_summary = summarize(&input.task);
        let session_id = input.session_id.as_ref().map(|s| s.to_string()).unwrap_or_default();

        let span = tracing::info_span!(
            "agent.invoke",
            component = %self.component,
            task_summary = %task_summary,
            session_id = %session_id,
        );

        let _guard = GaugeGuard::enter();
        let result = self.inner.invoke(ctx, input).instrument(span.clone()).await;

        match &result {
            Ok(output) => {
                span.in_scope(|| {
                    tracing::debug!(
                        status = ?output.status,
                        duration_ms = output.latency.as_millis(),
                        tool_calls = output.tool_calls.len(),
                        "agent.invoke complete"
                    );
                    for call in &output.tool_calls {
                        tracing::debug!(
                            tool = %call.tool_name,
                            success = call.success,
                            duration_ms = call.duration.as_millis(),
                            "agent.tool_call"
                        );
                    }
                });
                if output.status == AgentStatus::Failed {
                    span.in_scope(|| {
                        tracing::warn!(component = %self.component, message = %output.message, "agent.invoke failed status");
                    });
                }
            }
            Err(err) => {
                record_error(&self.component);
                span.in_scope(|| {
                    tracing::error!(component = %self.component, error = %err, kind = ?err.kind, "agent.invoke error");
                });
            }
        }

        result
    }

    async fn stream(
        &self,
        ctx: &RunContext,
        input: Self::Input,
    ) -> tokio::sync::mpsc::Receiver<agentkit_core::StreamChunk<Self::Output>> {
        self.inner.stream(ctx, input).await
    }

    async fn batch(&self, ctx: &RunContext, inputs: Vec<Self::Input>) -> Result<Vec<Self::Output>, AgentError> {
        self.inner.batch(ctx, inputs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentkit_core::test_utils::EchoAgent;
    use agentkit_core::{ErrorKind, RunContext};

    struct FailingAgent;

    #[async_trait]
    impl Runnable for FailingAgent {
        type Input = AgentInput;
        type Output = AgentOutput;

        async fn invoke(&self, _ctx: &RunContext, _input: AgentInput) -> Result<AgentOutput, AgentError> {
            Err(AgentError::new(ErrorKind::AgentExecution, "failing_agent", "invoke", "boom"))
        }
    }

    #[tokio::test]
    async fn errors_increment_the_component_error_counter() {
        let wrapped = WithObservability::new(FailingAgent, "error-counter-test");
        let before = error_count("error-counter-test");

        let err = wrapped.invoke(&RunContext::new(), AgentInput::new("fail")).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::AgentExecution);
        assert_eq!(error_count("error-counter-test"), before + 1);
    }

    #[tokio::test]
    async fn successful_invokes_do_not_touch_the_error_counter() {
        let wrapped = WithObservability::new(EchoAgent, "success-counter-test");
        let before = error_count("success-counter-test");
        wrapped.invoke(&RunContext::new(), AgentInput::new("ok")).await.unwrap();
        assert_eq!(error_count("success-counter-test"), before);
    }

    #[tokio::test]
    async fn gauge_returns_to_zero_after_invoke() {
        let wrapped = WithObservability::new(EchoAgent, "echo");
        let ctx = RunContext::new();
        let before = concurrent_invocations();
        let out = wrapped.invoke(&ctx, AgentInput::new("hello")).await.unwrap();
        assert_eq!(out.status, AgentStatus::Success);
        assert_eq!(concurrent_invocations(), before);
    }

    #[tokio::test]
    async fn long_task_is_truncated_in_summary() {
        let task = "x".repeat(200);
        assert!(summarize(&task).chars().count() <= TASK_SUMMARY_MAX + 1);
    }

    #[tokio::test]
    async fn short_task_is_not_truncated() {
        assert_eq!(summarize("hello"), "hello");
    }
}
