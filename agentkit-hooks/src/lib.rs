//! Callback manager — fan-out lifecycle observers for an agent run.
//!
//! This is distinct from `agentkit_core::hook::Hook`: hooks sit inside the
//! ReAct loop and can halt it or rewrite a tool call; callbacks only
//! observe. Every registered callback runs on every dispatched event
//! (best-effort — a failing or slow handler doesn't stop its siblings from
//! running), and the first handler error encountered is returned to the
//! caller once the fan-out completes.

#![deny(missing_docs)]

use agentkit_core::{AgentError, DurationMs, RunContext, Runnable};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Soft per-handler timeout. A handler that blows past this is treated as
/// failed for that dispatch, but does not block the remaining handlers —
/// they still run, just without waiting on this one any longer.
pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Named lifecycle events a callback can observe.
///
/// Each variant carries just enough context for a logging or metrics
/// handler to act without reaching back into the run; handlers that need
/// more should correlate via `run_id` across events rather than have every
/// variant carry the world.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub enum CallbackEvent {
    /// A run has started.
    OnStart {
        /// Identifies the run across its other events.
        run_id: String,
        /// Opaque input summary (e.g. the task string).
        input: Value,
    },
    /// A run finished successfully.
    OnEnd {
        /// Identifies the run across its other events.
        run_id: String,
        /// Opaque output summary.
        output: Value,
        /// Total wall-clock duration of the run.
        duration: DurationMs,
    },
    /// A run failed.
    OnError {
        /// Identifies the run across its other events.
        run_id: String,
        /// Human-readable error message.
        error: String,
    },
    /// An agent took a reasoning or action step.
    OnAgentAction {
        /// Identifies the run across its other events.
        run_id: String,
        /// Which step index this is.
        step: u32,
        /// Summary of the action taken.
        action: Value,
    },
    /// An LLM call started.
    OnLlmStart {
        /// Identifies the run across its other events.
        run_id: String,
        /// Model identifier.
        model: String,
    },
    /// An LLM call completed.
    OnLlmEnd {
        /// Identifies the run across its other events.
        run_id: String,
        /// Total tokens used by the call.
        tokens: u64,
    },
    /// An LLM call failed.
    OnLlmError {
        /// Identifies the run across its other events.
        run_id: String,
        /// Human-readable error message.
        error: String,
    },
    /// A tool call started.
    OnToolStart {
        /// Identifies the run across its other events.
        run_id: String,
        /// Tool name.
        tool: String,
        /// Tool input.
        input: Value,
    },
    /// A tool call completed.
    OnToolEnd {
        /// Identifies the run across its other events.
        run_id: String,
        /// Tool name.
        tool: String,
        /// Tool output.
        output: Value,
    },
    /// A tool call failed.
    OnToolError {
        /// Identifies the run across its other events.
        run_id: String,
        /// Tool name.
        tool: String,
        /// Human-readable error message.
        error: String,
    },
    /// A composed chain/pipeline of runnables started.
    OnChainStart {
        /// Identifies the run across its other events.
        run_id: String,
        /// Chain or component name.
        name: String,
    },
    /// A composed chain/pipeline of runnables finished.
    OnChainEnd {
        /// Identifies the run across its other events.
        run_id: String,
        /// Chain or component name.
        name: String,
    },
    /// A composed chain/pipeline of runnables failed.
    OnChainError {
        /// Identifies the run across its other events.
        run_id: String,
        /// Chain or component name.
        name: String,
        /// Human-readable error message.
        error: String,
    },
}

/// A lifecycle observer. Implementors should return quickly; a handler
/// that regularly exceeds [`CALLBACK_TIMEOUT`] will have its errors
/// surfaced to callers on every dispatch.
#[async_trait]
pub trait Callback: Send + Sync {
    /// Called for every dispatched event, regardless of variant. Handlers
    /// that only care about a subset of events should match and no-op on
    /// the rest.
    async fn on_event(&self, event: &CallbackEvent) -> Result<(), AgentError>;
}

/// Fan-out dispatcher for [`Callback`] handlers.
///
/// Unlike `agentkit_core::hook::HookPipeline`, dispatch never short-circuits:
/// every registered handler runs on every event. If one or more handlers
/// error (or time out), the manager still runs the rest, then returns the
/// first error encountered back to the caller.
#[derive(Default)]
pub struct CallbackManager {
    handlers: Vec<Arc<dyn Callback>>,
}

impl CallbackManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self { handlers: Vec::new() }
    }

    /// Register a handler.
    pub fn register(&mut self, handler: Arc<dyn Callback>) {
        self.handlers.push(handler);
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether any handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Dispatch an event to every registered handler, applying
    /// [`CALLBACK_TIMEOUT`] to each. Runs all handlers even after one
    /// fails, then returns the first failure (by registration order) to
    /// the caller — or `Ok(())` if all handlers succeeded.
    pub async fn dispatch(&self, event: &CallbackEvent) -> Result<(), AgentError> {
        let mut first_error = None;
        for handler in &self.handlers {
            let result = match tokio::time::timeout(CALLBACK_TIMEOUT, handler.on_event(event)).await {
                Ok(result) => result,
                Err(_) => Err(AgentError::timeout("callback_manager", "dispatch")),
            };
            if let Err(err) = result {
                tracing::warn!(error = %err, "callback handler failed");
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Wraps any [`Runnable`] so every invocation dispatches `OnStart`/`OnEnd`/
/// `OnError` to a [`CallbackManager`], without the wrapped stage knowing
/// observers exist. Use this when a stage only needs lifecycle visibility;
/// `agentkit-react`'s `AgentExecutor` composes its own dispatch inline
/// instead, since it already owns a run's memory and timeout handling.
pub struct WithCallbacks<R> {
    inner: R,
    callbacks: CallbackManager,
    name: String,
}

impl<R> WithCallbacks<R> {
    /// Wrap `inner`, identifying it as `name` in `OnChainStart`/`OnChainEnd`
    /// style logs (the `run_id` passed to event constructors is generated
    /// per invocation from `name` and the current timestamp).
    pub fn new(inner: R, name: impl Into<String>) -> Self {
        Self { inner, callbacks: CallbackManager::new(), name: name.into() }
    }

    /// Register a lifecycle observer.
    pub fn with_callback(mut self, callback: Arc<dyn Callback>) -> Self {
        self.callbacks.register(callback);
        self
    }
}

#[async_trait]
impl<R> Runnable for WithCallbacks<R>
where
    R: Runnable,
    R::Input: serde::Serialize + Clone,
    R::Output: serde::Serialize,
{
    type Input = R::Input;
    type Output = R::Output;

    async fn invoke(&self, ctx: &RunContext, input: Self::Input) -> Result<Self::Output, AgentError> {
        let start = std::time::Instant::now();
        let run_id = format!("{}-{}", self.name, DurationMs::now().as_millis());
        let input_summary = serde_json::to_value(&input).unwrap_or(Value::Null);
        let _ = self.callbacks.dispatch(&CallbackEvent::OnStart { run_id: run_id.clone(), input: input_summary }).await;

        match self.inner.invoke(ctx, input).await {
            Ok(output) => {
                let output_summary = serde_json::to_value(&output).unwrap_or(Value::Null);
                let _ = self
                    .callbacks
                    .dispatch(&CallbackEvent::OnEnd {
                        run_id,
                        output: output_summary,
                        duration: DurationMs::from(start.elapsed()),
                    })
                    .await;
                Ok(output)
            }
            Err(err) => {
                let _ = self.callbacks.dispatch(&CallbackEvent::OnError { run_id, error: err.message.clone() }).await;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct CountingCallback {
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Callback for CountingCallback {
        async fn on_event(&self, _event: &CallbackEvent) -> Result<(), AgentError> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingCallback {
        label: &'static str,
    }

    #[async_trait]
    impl Callback for FailingCallback {
        async fn on_event(&self, _event: &CallbackEvent) -> Result<(), AgentError> {
            Err(AgentError::invalid_input("test_callback", self.label))
        }
    }

    struct RecordingCallback {
        log: Arc<Mutex<Vec<&'static str>>>,
        label: &'static str,
    }

    #[async_trait]
    impl Callback for RecordingCallback {
        async fn on_event(&self, _event: &CallbackEvent) -> Result<(), AgentError> {
            self.log.lock().unwrap().push(self.label);
            Ok(())
        }
    }

    fn start_event() -> CallbackEvent {
        CallbackEvent::OnStart { run_id: "r1".into(), input: Value::Null }
    }

    #[tokio::test]
    async fn empty_manager_dispatches_ok() {
        let manager = CallbackManager::new();
        assert!(manager.dispatch(&start_event()).await.is_ok());
    }

    #[tokio::test]
    async fn every_handler_runs_regardless_of_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = CallbackManager::new();
        manager.register(Arc::new(RecordingCallback { log: log.clone(), label: "a" }));
        manager.register(Arc::new(RecordingCallback { log: log.clone(), label: "b" }));
        manager.register(Arc::new(RecordingCallback { log: log.clone(), label: "c" }));

        manager.dispatch(&start_event()).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn a_failing_handler_does_not_stop_the_rest() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut manager = CallbackManager::new();
        manager.register(Arc::new(FailingCallback { label: "first fails" }));
        manager.register(Arc::new(CountingCallback { count: count.clone() }));
        manager.register(Arc::new(CountingCallback { count: count.clone() }));

        let result = manager.dispatch(&start_event()).await;

        assert!(result.is_err());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn the_first_error_by_registration_order_is_returned() {
        let mut manager = CallbackManager::new();
        manager.register(Arc::new(FailingCallback { label: "first" }));
        manager.register(Arc::new(FailingCallback { label: "second" }));

        let err = manager.dispatch(&start_event()).await.unwrap_err();
        assert!(err.to_string().contains("first"));
    }

    #[tokio::test]
    async fn a_successful_dispatch_returns_ok() {
        let mut manager = CallbackManager::new();
        manager.register(Arc::new(CountingCallback { count: Arc::new(AtomicUsize::new(0)) }));
        assert!(manager.dispatch(&start_event()).await.is_ok());
    }

    struct Echo;

    #[async_trait]
    impl Runnable for Echo {
        type Input = String;
        type Output = String;

        async fn invoke(&self, _ctx: &RunContext, input: String) -> Result<String, AgentError> {
            Ok(input)
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl Runnable for AlwaysFails {
        type Input = String;
        type Output = String;

        async fn invoke(&self, _ctx: &RunContext, _input: String) -> Result<String, AgentError> {
            Err(AgentError::invalid_input("always_fails", "nope"))
        }
    }

    #[tokio::test]
    async fn with_callbacks_fires_on_start_and_on_end_around_a_successful_invoke() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let runnable = WithCallbacks::new(Echo, "echo")
            .with_callback(Arc::new(RecordingCallback { log: log.clone(), label: "observed" }));

        let out = runnable.invoke(&RunContext::new(), "hi".to_string()).await.unwrap();

        assert_eq!(out, "hi");
        assert_eq!(*log.lock().unwrap(), vec!["observed", "observed"]);
    }

    #[tokio::test]
    async fn with_callbacks_fires_on_error_and_still_propagates_the_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let runnable = WithCallbacks::new(AlwaysFails, "always_fails")
            .with_callback(Arc::new(RecordingCallback { log: log.clone(), label: "observed" }));

        let err = runnable.invoke(&RunContext::new(), "hi".to_string()).await.unwrap_err();

        assert!(err.to_string().contains("nope"));
        assert_eq!(*log.lock().unwrap(), vec!["observed", "observed"]);
    }

    #[tokio::test]
    async fn with_callbacks_does_not_block_the_wrapped_stage_when_no_observers_registered() {
        let runnable = WithCallbacks::new(Echo, "echo");
        assert_eq!(runnable.invoke(&RunContext::new(), "x".to_string()).await.unwrap(), "x");
    }
}
