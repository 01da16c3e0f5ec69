//! End-to-end agent: a provider, a tool registry, session memory, and the
//! executor, wired through the ReAct loop.
//!
//! The provider here is scripted so the example runs without an API key —
//! swap `ScriptedProvider` for a real `Provider` implementation to talk to
//! an actual model.
//!
//! Run with:
//!
//! ```sh
//! cargo run --example full_agent -p agentkit --features full
//! ```

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use agentkit::prelude::*;

// ---------------------------------------------------------------------------
// A scripted provider standing in for a real model backend
// ---------------------------------------------------------------------------

struct ScriptedProvider {
    responses: Mutex<VecDeque<String>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<&str>) -> Self {
        Self { responses: Mutex::new(responses.into_iter().map(str::to_string).collect()) }
    }
}

impl Provider for ScriptedProvider {
    fn complete(
        &self,
        _request: CompletionRequest,
    ) -> impl Future<Output = Result<Completion, ProviderError>> + Send {
        let text = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "Final Answer: (script exhausted)".to_string());
        async move { Ok(Completion::text(text, "scripted-model")) }
    }

    fn provider(&self) -> &str {
        "scripted"
    }
}

// ---------------------------------------------------------------------------
// A simple calculator tool for the agent to use
// ---------------------------------------------------------------------------

struct CalculatorTool;

impl ToolDyn for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluates a product of two integers, e.g. {\"a\": 15, \"b\": 7}"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "a": {"type": "integer"},
                "b": {"type": "integer"}
            },
            "required": ["a", "b"]
        })
    }

    fn call(&self, input: ToolInput) -> Pin<Box<dyn Future<Output = ToolOutput> + Send + '_>> {
        Box::pin(async move {
            let a = input.args.get("a").and_then(|v| v.as_i64());
            let b = input.args.get("b").and_then(|v| v.as_i64());
            match (a, b) {
                (Some(a), Some(b)) => ToolOutput::ok(serde_json::json!(a * b)),
                _ => ToolOutput::failed("expected integer fields \"a\" and \"b\""),
            }
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Script the model: one tool call, then a final answer.
    let provider = ScriptedProvider::new(vec![
        "Thought: I should multiply these.\nAction: calculator\nAction Input: {\"a\": 15, \"b\": 7}",
        "Thought: The tool answered.\nFinal Answer: 15 * 7 = 105",
    ]);

    // 2. Register the tool.
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(CalculatorTool))?;

    // 3. Build the ReAct loop over a shared in-memory store.
    let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
    let config = ReactConfig {
        system_prompt: "You are a careful arithmetic assistant.".to_string(),
        ..ReactConfig::default()
    };
    let agent = ReactAgent::new(provider, tools, config, store.clone());

    // 4. Wrap it with session memory and run a task.
    let memory: Arc<dyn Memory> = Arc::new(StoreMemory::new(store.clone()));
    let executor = AgentExecutor::new(agent, store).with_memory(memory.clone());

    let ctx = RunContext::new();
    let session = SessionId::new("demo-session");
    let output = executor
        .invoke(&ctx, AgentInput::new("What is 15 * 7?").with_session(session.clone()))
        .await?;

    println!("status:  {:?}", output.status);
    println!("answer:  {}", output.result.unwrap_or_default());
    println!("steps:   {}", output.reasoning_steps.len());
    println!("tools:   {}", output.tool_calls.len());

    // 5. The exchange was written back to session memory.
    for entry in memory.history(&session, None).await? {
        println!("memory:  [{}] {}", entry.role, entry.content);
    }

    Ok(())
}
