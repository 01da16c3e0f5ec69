//! EchoAgent — returns the input task as the output, verbatim.

use crate::error::AgentError;
use crate::runnable::{AgentInput, AgentOutput, RunContext, Runnable};
use async_trait::async_trait;

/// An agent that echoes its task back as a successful result. Used for
/// testing dispatch, supervisor, and hook wiring without a real model.
pub struct EchoAgent;

#[async_trait]
impl Runnable for EchoAgent {
    type Input = AgentInput;
    type Output = AgentOutput;

    async fn invoke(&self, _ctx: &RunContext, input: AgentInput) -> Result<AgentOutput, AgentError> {
        Ok(AgentOutput::success(serde_json::Value::String(input.task.clone()), "echoed"))
    }
}
