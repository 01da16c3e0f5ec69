//! Example: testing agents with mock providers and tools.
//!
//! Demonstrates patterns for unit testing agents without real API calls.
//! No API key needed — everything is mocked.
//!
//! Run with: `cargo run --example testing_agents -p agentkit --features full`

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use agentkit::prelude::*;

// --- Mock provider: returns pre-configured responses ---

struct MockProvider {
    responses: Mutex<VecDeque<String>>,
}

impl MockProvider {
    fn with_responses(responses: Vec<&str>) -> Self {
        Self { responses: Mutex::new(responses.into_iter().map(str::to_string).collect()) }
    }
}

impl Provider for MockProvider {
    fn complete(
        &self,
        _request: CompletionRequest,
    ) -> impl Future<Output = Result<Completion, ProviderError>> + Send {
        let text = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("mock provider ran out of scripted responses");
        async move { Ok(Completion::text(text, "mock-model")) }
    }

    fn provider(&self) -> &str {
        "mock"
    }
}

// --- Recording tool: captures the arguments it was called with ---

struct RecordingTool {
    calls: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl ToolDyn for RecordingTool {
    fn name(&self) -> &str {
        "lookup"
    }

    fn description(&self) -> &str {
        "Records its arguments and returns a canned value"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }

    fn call(&self, input: ToolInput) -> Pin<Box<dyn Future<Output = ToolOutput> + Send + '_>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(serde_json::Value::Object(input.args.clone()));
            ToolOutput::ok(serde_json::json!("canned lookup result"))
        })
    }
}

fn agent(provider: MockProvider, tools: ToolRegistry) -> ReactAgent<MockProvider> {
    ReactAgent::new(provider, tools, ReactConfig::default(), Arc::new(MemoryStore::new()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = RunContext::new();

    // Pattern 1: a pure-reasoning run — script a final answer, assert on it.
    {
        let provider = MockProvider::with_responses(vec!["Thought: easy\nFinal Answer: four"]);
        let output = agent(provider, ToolRegistry::new()).invoke(&ctx, AgentInput::new("2+2?")).await?;
        assert_eq!(output.status, AgentStatus::Success);
        assert_eq!(output.result, Some(serde_json::json!("four")));
        println!("pattern 1 ok: scripted final answer");
    }

    // Pattern 2: capture tool calls — the recording tool exposes what the
    // loop actually sent it.
    {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(RecordingTool { calls: calls.clone() }))?;

        let provider = MockProvider::with_responses(vec![
            "Thought: look this up\nAction: lookup\nAction Input: {\"q\": \"fountain pens\"}",
            "Thought: got it\nFinal Answer: found",
        ]);
        let output = agent(provider, tools).invoke(&ctx, AgentInput::new("research")).await?;

        assert_eq!(output.tool_calls.len(), 1);
        assert_eq!(calls.lock().unwrap()[0]["q"], "fountain pens");
        println!("pattern 2 ok: tool call captured");
    }

    // Pattern 3: drive the failure path — a step budget of 1 forces a
    // partial result without scripting an ending.
    {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(RecordingTool { calls: Arc::new(Mutex::new(Vec::new())) }))?;

        let provider = MockProvider::with_responses(vec![
            "Thought: stalling\nAction: lookup\nAction Input: {}",
        ]);
        let mut config = ReactConfig::default();
        config.max_steps = 1;
        let react = ReactAgent::new(provider, tools, config, Arc::new(MemoryStore::new()));
        let output = react.invoke(&ctx, AgentInput::new("never finishes")).await?;

        assert_eq!(output.status, AgentStatus::Partial);
        println!("pattern 3 ok: step budget produced a partial result");
    }

    println!("all patterns passed");
    Ok(())
}
