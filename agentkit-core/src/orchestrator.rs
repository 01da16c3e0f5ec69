//! The dispatch contract — how a caller reaches an agent by id without
//! knowing whether the call is a function call or a network hop.

use crate::{error::AgentError, id::*, runnable::AgentInput, runnable::AgentOutput};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Dispatches agent invocations by id. Implementations: in-process
/// (`agentkit-dispatch`), or any remote/durable transport a caller plugs
/// in — calling code never knows which is behind the trait.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Dispatch a single invocation to the named agent.
    async fn dispatch(&self, agent: &AgentId, input: AgentInput) -> Result<AgentOutput, AgentError>;

    /// Dispatch several invocations concurrently. Returns results in the
    /// same order as the input tasks; individual tasks may fail
    /// independently.
    async fn dispatch_many(&self, tasks: Vec<(AgentId, AgentInput)>) -> Vec<Result<AgentOutput, AgentError>>;

    /// Fire-and-forget signal to a running workflow. Returns `Ok(())` once
    /// the signal is accepted, not once it's processed.
    async fn signal(&self, target: &WorkflowId, signal: crate::effect::SignalPayload) -> Result<(), AgentError>;

    /// Read-only query of a running workflow's state. Schema depends on the
    /// workflow.
    async fn query(&self, target: &WorkflowId, query: QueryPayload) -> Result<serde_json::Value, AgentError>;
}

/// Payload for querying a running workflow.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryPayload {
    /// The type of query to execute.
    pub query_type: String,
    /// Query parameters.
    pub params: serde_json::Value,
}

impl QueryPayload {
    /// Create a new query payload.
    pub fn new(query_type: impl Into<String>, params: serde_json::Value) -> Self {
        Self { query_type: query_type.into(), params }
    }
}
