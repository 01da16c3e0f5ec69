//! LocalOrchestrator — in-process dispatcher with a HashMap of agents.

use crate::effect::SignalPayload;
use crate::error::{AgentError, ErrorKind};
use crate::id::{AgentId, WorkflowId};
use crate::orchestrator::{Dispatcher, QueryPayload};
use crate::runnable::{AgentInput, AgentOutput, RunContext, Runnable};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// In-process dispatcher that routes agent invocations to registered agents.
/// Uses `Arc<dyn Runnable<...>>` so `dispatch_many` can run every task
/// concurrently via `tokio::spawn`.
pub struct LocalOrchestrator {
    agents: HashMap<String, Arc<dyn Runnable<Input = AgentInput, Output = AgentOutput>>>,
}

impl LocalOrchestrator {
    /// Create a new empty dispatcher.
    pub fn new() -> Self {
        Self { agents: HashMap::new() }
    }

    /// Register an agent under the given id.
    pub fn register(&mut self, id: AgentId, agent: Arc<dyn Runnable<Input = AgentInput, Output = AgentOutput>>) {
        self.agents.insert(id.to_string(), agent);
    }
}

impl Default for LocalOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Dispatcher for LocalOrchestrator {
    async fn dispatch(&self, agent: &AgentId, input: AgentInput) -> Result<AgentOutput, AgentError> {
        let agent_impl = self
            .agents
            .get(agent.as_str())
            .ok_or_else(|| AgentError::agent_not_found(agent.to_string()))?;
        agent_impl.invoke(&RunContext::new(), input).await
    }

    async fn dispatch_many(&self, tasks: Vec<(AgentId, AgentInput)>) -> Vec<Result<AgentOutput, AgentError>> {
        let mut handles = Vec::with_capacity(tasks.len());

        for (agent_id, input) in tasks {
            match self.agents.get(agent_id.as_str()) {
                Some(agent_impl) => {
                    let agent_impl = Arc::clone(agent_impl);
                    handles.push(tokio::spawn(async move { agent_impl.invoke(&RunContext::new(), input).await }));
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
                    "local_orchestrator",
                    "dispatch_many",
                    format!("task panicked: {e}"),
                ))),
            }
        }

        results
    }

    async fn signal(&self, _target: &WorkflowId, _signal: SignalPayload) -> Result<(), AgentError> {
        Ok(())
    }

    async fn query(&self, _target: &WorkflowId, _query: QueryPayload) -> Result<serde_json::Value, AgentError> {
        Ok(serde_json::Value::Null)
    }
}
