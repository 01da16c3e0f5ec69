//! Supervisor fan-out: decompose a task list, route each task to a worker
//! through a router, and merge the per-task results.
//!
//! Everything runs in-process with plain `Runnable` worker agents — no API
//! keys, no network.
//!
//! Run with:
//!
//! ```sh
//! cargo run --example supervisor_fanout -p agentkit --features full
//! ```

use std::sync::Arc;

use agentkit::agentkit_aggregator::MergeAggregator;
use agentkit::agentkit_router::RoundRobinRouter;
use agentkit::agentkit_supervisor::{Decomposer, Task};
use agentkit::prelude::*;
use agentkit::agentkit_core::TaskId;
use async_trait::async_trait;

/// A worker that "performs" its task by describing what it did.
struct Worker {
    name: &'static str,
}

#[async_trait]
impl Runnable for Worker {
    type Input = AgentInput;
    type Output = AgentOutput;

    async fn invoke(&self, _ctx: &RunContext, input: AgentInput) -> Result<AgentOutput, AgentError> {
        let report = format!("[{}] completed: {}", self.name, input.task);
        Ok(AgentOutput::success(serde_json::Value::String(report), "done"))
    }
}

/// A fixed three-task breakdown with one dependency edge, standing in for
/// an LLM-driven decomposer.
struct ResearchDecomposer;

#[async_trait]
impl Decomposer for ResearchDecomposer {
    async fn decompose(&self, _ctx: &RunContext, input: &AgentInput) -> Result<Vec<Task>, AgentError> {
        Ok(vec![
            Task::new("gather-a", format!("gather sources for: {}", input.task)),
            Task::new("gather-b", format!("gather counterpoints for: {}", input.task)),
            Task::new("summarize", format!("summarize findings for: {}", input.task))
                .with_dependencies(vec![TaskId::new("gather-a"), TaskId::new("gather-b")])
                .with_priority(2),
        ])
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Two workers behind an in-process dispatcher.
    let mut dispatcher = LocalDispatcher::new();
    dispatcher.register(AgentId::new("worker-1"), Arc::new(Worker { name: "worker-1" }));
    dispatcher.register(AgentId::new("worker-2"), Arc::new(Worker { name: "worker-2" }));

    // 2. Supervisor: round-robin routing, merge aggregation.
    let supervisor = Supervisor::new(
        Arc::new(dispatcher),
        Arc::new(RoundRobinRouter::new()),
        Arc::new(MergeAggregator),
        vec![AgentProfile::new("worker-1", vec![]), AgentProfile::new("worker-2", vec![])],
    )
    .with_decomposer(Arc::new(ResearchDecomposer));

    // 3. One invoke: plan → two wavefronts → merged output.
    let ctx = RunContext::new();
    let output = supervisor.invoke(&ctx, AgentInput::new("the history of the fountain pen")).await?;

    println!("status: {:?}", output.status);
    println!("sources: {}", output.metadata["sources"]);
    println!("---\n{}", output.result.unwrap_or_default());

    let metrics = supervisor.metrics();
    println!("---\ntasks: {} completed, {} failed", metrics.completed, metrics.failed);

    Ok(())
}
