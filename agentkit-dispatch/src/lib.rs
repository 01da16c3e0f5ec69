#![deny(missing_docs)]
//! In-process [`Dispatcher`] implementation.
//!
//! Dispatches to registered agents via `HashMap<AgentId, Arc<dyn Agent>>`.
//! Concurrent dispatch uses `tokio::spawn`. No durability — agents that fail
//! are not retried and `signal`/`query` are no-ops, since `LocalDispatcher`
//! doesn't track running workflows.
//!
//! `LocalDispatcher` also owns effect interpretation: after an agent
//! invocation returns, its declared [`Effect`]s (`WriteMemory`,
//! `DeleteMemory`, `Delegate`, `Handoff`, `Signal`) are executed against a
//! state backend and, for `Delegate`/`Handoff`, turned into follow-up
//! dispatches on this same dispatcher. This is the "glue" that proves the
//! effect vocabulary is executable without forcing a workflow DSL.

use agentkit_core::{
    Agent, AgentError, AgentId, AgentInput, AgentOutput, Dispatcher, Effect, ErrorKind,
    QueryPayload, RunContext, SignalPayload, StateStore, WorkflowId,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// In-process dispatcher that routes invocations to registered agents.
///
/// Uses `Arc<dyn Agent>` for true concurrent dispatch via `tokio::spawn`.
/// No durability, no workflow tracking. Suitable for development, testing,
/// and single-process deployments.
pub struct LocalDispatcher {
    agents: HashMap<String, Arc<dyn Agent<Input = AgentInput, Output = AgentOutput>>>,
}

impl LocalDispatcher {
    /// Create a new empty dispatcher.
    pub fn new() -> Self {
        Self { agents: HashMap::new() }
    }

    /// Register an agent under the given id, replacing any prior
    /// registration for that id.
    pub fn register(&mut self, id: AgentId, agent: Arc<dyn Agent<Input = AgentInput, Output = AgentOutput>>) {
        self.agents.insert(id.to_string(), agent);
    }
}

impl Default for LocalDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Dispatcher for LocalDispatcher {
    async fn dispatch(&self, agent: &AgentId, input: AgentInput) -> Result<AgentOutput, AgentError> {
        let op = self.agents.get(agent.as_str()).ok_or_else(|| AgentError::agent_not_found(agent.to_string()))?;
        op.invoke(&RunContext::new(), input).await
    }

    async fn dispatch_many(&self, tasks: Vec<(AgentId, AgentInput)>) -> Vec<Result<AgentOutput, AgentError>> {
        let mut handles = Vec::with_capacity(tasks.len());

        for (agent_id, input) in tasks {
            match self.agents.get(agent_id.as_str()) {
                Some(op) => {
                    let op = Arc::clone(op);
                    handles.push(tokio::spawn(async move { op.invoke(&RunContext::new(), input).await }));
                }
                None => {
                    let name = agent_id.to_string();
                    handles.push(tokio::spawn(async move { Err(AgentError::agent_not_found(name)) }));
                }
            }
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => results.push(Err(AgentError::new(
                    ErrorKind::Internal,
                    "local_dispatcher",
                    "dispatch_many",
                    format!("dispatch task panicked: {e}"),
                ))),
            }
        }

        results
    }

    async fn signal(&self, _target: &WorkflowId, _signal: SignalPayload) -> Result<(), AgentError> {
        // LocalDispatcher doesn't track running workflows — accept and discard.
        Ok(())
    }

    async fn query(&self, _target: &WorkflowId, _query: QueryPayload) -> Result<serde_json::Value, AgentError> {
        // LocalDispatcher doesn't track running workflows — return null.
        Ok(serde_json::Value::Null)
    }
}

/// An observable event emitted while interpreting an invocation's effects.
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    /// An agent was dispatched.
    Dispatched {
        /// Agent id that was dispatched.
        agent: AgentId,
    },
    /// A memory write was executed.
    MemoryWritten {
        /// State key written.
        key: String,
    },
    /// A memory delete was executed.
    MemoryDeleted {
        /// State key deleted.
        key: String,
    },
    /// A delegate task was enqueued for follow-up dispatch.
    DelegateEnqueued {
        /// Agent id enqueued.
        agent: AgentId,
    },
    /// A handoff task was enqueued for follow-up dispatch.
    HandoffEnqueued {
        /// Agent id enqueued.
        agent: AgentId,
    },
    /// A signal was sent.
    Signaled {
        /// Workflow id signaled.
        target: WorkflowId,
        /// Signal type sent.
        signal_type: String,
    },
}

/// Trace of one orchestrated run: the initial dispatch plus any followups
/// spawned by `Delegate`/`Handoff` effects.
#[derive(Debug, Clone, Default)]
pub struct ExecutionTrace {
    /// Outputs in dispatch order (first element is the initial dispatch output).
    pub outputs: Vec<AgentOutput>,
    /// Events recorded while interpreting effects.
    pub events: Vec<ExecutionEvent>,
}

impl ExecutionTrace {
    /// Create an empty trace.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Drives a dispatcher to completion: dispatch an agent, interpret the
/// effects it declares, and follow `Delegate`/`Handoff` chains until the
/// work queue drains or a safety bound is hit.
pub struct EffectRunner<D: Dispatcher + ?Sized> {
    dispatcher: Arc<D>,
    state: Arc<dyn StateStore>,
    max_followups: usize,
}

impl<D: Dispatcher + ?Sized> EffectRunner<D> {
    /// Create a new effect runner over the given dispatcher and state backend.
    pub fn new(dispatcher: Arc<D>, state: Arc<dyn StateStore>) -> Self {
        Self { dispatcher, state, max_followups: 128 }
    }

    /// Set a safety bound on the number of follow-up dispatches this runner
    /// will execute before giving up.
    pub fn with_max_followups(mut self, max_followups: usize) -> Self {
        self.max_followups = max_followups;
        self
    }

    /// Dispatch `agent` and interpret its effects (and any effects from
    /// follow-up dispatches) until the work queue is empty.
    pub async fn run(&self, agent: AgentId, input: AgentInput) -> Result<ExecutionTrace, AgentError> {
        let mut trace = ExecutionTrace::new();
        let mut queue: Vec<(AgentId, AgentInput)> = vec![(agent, input)];
        let mut followups_executed = 0usize;

        while let Some((agent_id, agent_input)) = queue.pop() {
            trace.events.push(ExecutionEvent::Dispatched { agent: agent_id.clone() });
            let output = self.dispatcher.dispatch(&agent_id, agent_input).await?;

            let mut followups: Vec<(AgentId, AgentInput)> = vec![];
            for effect in &output.effects {
                if let Effect::Signal { target, payload } = effect {
                    self.dispatcher.signal(target, payload.clone()).await?;
                }
                self.execute_effect(effect, &mut followups, &mut trace).await?;
            }

            trace.outputs.push(output);

            if !followups.is_empty() {
                followups_executed = followups_executed.saturating_add(followups.len());
                if followups_executed > self.max_followups {
                    return Err(AgentError::new(
                        ErrorKind::Internal,
                        "effect_runner",
                        "run",
                        format!("followup dispatch count exceeded max_followups={}", self.max_followups),
                    ));
                }
                queue.extend(followups);
            }
        }

        Ok(trace)
    }

    async fn execute_effect(
        &self,
        effect: &Effect,
        followups: &mut Vec<(AgentId, AgentInput)>,
        trace: &mut ExecutionTrace,
    ) -> Result<(), AgentError> {
        match effect {
            Effect::WriteMemory { scope, key, value } => {
                self.state.put(&scope.namespace(), key, value.clone()).await?;
                trace.events.push(ExecutionEvent::MemoryWritten { key: key.clone() });
            }
            Effect::DeleteMemory { scope, key } => {
                self.state.delete(&scope.namespace(), key).await?;
                trace.events.push(ExecutionEvent::MemoryDeleted { key: key.clone() });
            }
            Effect::Signal { target, payload } => {
                trace.events.push(ExecutionEvent::Signaled {
                    target: target.clone(),
                    signal_type: payload.signal_type.clone(),
                });
                // Already sent to the dispatcher by the caller; this only records it.
            }
            Effect::Delegate { agent, input } => {
                followups.push((agent.clone(), input.as_ref().clone()));
                trace.events.push(ExecutionEvent::DelegateEnqueued { agent: agent.clone() });
            }
            Effect::Handoff { agent, state } => {
                let input = AgentInput::new(state.to_string());
                followups.push((agent.clone(), input));
                trace.events.push(ExecutionEvent::HandoffEnqueued { agent: agent.clone() });
            }
            Effect::Log { .. } | Effect::Custom { .. } => {
                tracing::debug!(?effect, "effect runner ignoring non-actionable effect");
            }
            _ => {
                // `Effect` is non_exhaustive; ignore forward-compatible variants by default.
            }
        }
        Ok(())
    }
}
