//! Composition integration tests.
//!
//! Each test swaps exactly one collaborator — provider, state backend, or
//! agent implementation — and shows the rest of the wiring unchanged, using
//! mocks throughout so no test needs an API key.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};

use agentkit::prelude::*;
use agentkit_core::test_utils::EchoAgent;
use async_trait::async_trait;

// --- Mock Provider ---

struct MockProvider {
    responses: Mutex<VecDeque<String>>,
}

impl MockProvider {
    fn new(responses: Vec<&str>) -> Self {
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
            .unwrap_or_else(|| "Final Answer: (exhausted)".to_string());
        async move { Ok(Completion::text(text, "mock-model")) }
    }

    fn provider(&self) -> &str {
        "mock"
    }
}

fn react_agent(provider: MockProvider, store: Arc<dyn StateStore>) -> ReactAgent<MockProvider> {
    ReactAgent::new(provider, ToolRegistry::new(), ReactConfig::default(), store)
}

// --- Provider swap: same loop, different scripted backend ---

#[tokio::test]
async fn provider_swap_same_loop_different_backend() {
    let ctx = RunContext::new();
    let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());

    let terse = react_agent(MockProvider::new(vec!["Final Answer: yes"]), store.clone());
    let verbose = react_agent(
        MockProvider::new(vec!["Thought: let me reason about this at length.\nFinal Answer: certainly yes"]),
        store,
    );

    let a = terse.invoke(&ctx, AgentInput::new("ready?")).await.unwrap();
    let b = verbose.invoke(&ctx, AgentInput::new("ready?")).await.unwrap();

    assert_eq!(a.status, AgentStatus::Success);
    assert_eq!(b.status, AgentStatus::Success);
    assert_eq!(a.result, Some(serde_json::json!("yes")));
    assert_eq!(b.result, Some(serde_json::json!("certainly yes")));
}

// --- State swap: same executor wiring over memory vs filesystem ---

async fn run_with_store(store: Arc<dyn StateStore>) -> AgentOutput {
    let memory: Arc<dyn Memory> = Arc::new(StoreMemory::new(store.clone()));
    let agent = react_agent(MockProvider::new(vec!["Final Answer: stored"]), store.clone());
    let executor = AgentExecutor::new(agent, store).with_memory(memory);

    executor
        .invoke(&RunContext::new(), AgentInput::new("remember this").with_session(SessionId::new("swap")))
        .await
        .unwrap()
}

#[tokio::test]
async fn state_swap_memory_and_fs_behave_identically() {
    let dir = tempfile::tempdir().unwrap();

    let mem_store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
    let fs_store: Arc<dyn StateStore> = Arc::new(FsStore::new(dir.path()));

    let from_memory = run_with_store(mem_store.clone()).await;
    let from_fs = run_with_store(fs_store.clone()).await;

    assert_eq!(from_memory.result, from_fs.result);

    let namespace = Scope::Session(SessionId::new("swap")).namespace();
    for store in [mem_store, fs_store] {
        assert_eq!(store.get(&namespace, "last_output").await.unwrap(), Some(serde_json::json!("stored")));
    }
}

// --- Agent swap: the executor doesn't care what it wraps ---

#[tokio::test]
async fn agent_swap_executor_wraps_any_agent() {
    let ctx = RunContext::new();
    let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());

    let echo_out = AgentExecutor::new(EchoAgent, store.clone())
        .invoke(&ctx, AgentInput::new("same input"))
        .await
        .unwrap();

    let react = react_agent(MockProvider::new(vec!["Final Answer: same input"]), store.clone());
    let react_out = AgentExecutor::new(react, store).invoke(&ctx, AgentInput::new("same input")).await.unwrap();

    assert_eq!(echo_out.result, react_out.result);
}

// --- Pipe: agent into a post-processing stage ---

struct ExtractAnswer;

#[async_trait]
impl Runnable for ExtractAnswer {
    type Input = AgentOutput;
    type Output = String;

    async fn invoke(&self, _ctx: &RunContext, input: AgentOutput) -> Result<String, AgentError> {
        match input.result {
            Some(serde_json::Value::String(s)) => Ok(s),
            Some(other) => Ok(other.to_string()),
            None => Ok(input.message),
        }
    }
}

#[tokio::test]
async fn pipe_composes_an_agent_with_a_postprocessor() {
    let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
    let pipeline = react_agent(MockProvider::new(vec!["Final Answer: piped"]), store).pipe(ExtractAnswer);

    let out = pipeline.invoke(&RunContext::new(), AgentInput::new("go")).await.unwrap();
    assert_eq!(out, "piped");
}

// --- Decorators: observability over callbacks over the agent ---

struct CountingCallback {
    events: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Callback for CountingCallback {
    async fn on_event(&self, event: &CallbackEvent) -> Result<(), AgentError> {
        let label = match event {
            CallbackEvent::OnStart { .. } => "start",
            CallbackEvent::OnEnd { .. } => "end",
            CallbackEvent::OnError { .. } => "error",
            _ => "other",
        };
        self.events.lock().unwrap().push(label.to_string());
        Ok(())
    }
}

#[tokio::test]
async fn decorators_stack_without_changing_the_result() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let observed = WithObservability::new(
        WithCallbacks::new(EchoAgent, "echo").with_callback(Arc::new(CountingCallback { events: events.clone() })),
        "echo",
    );

    let out = observed.invoke(&RunContext::new(), AgentInput::new("layered")).await.unwrap();

    assert_eq!(out.result, Some(serde_json::json!("layered")));
    assert_eq!(*events.lock().unwrap(), vec!["start", "end"]);
}

// --- Bus: pub/sub plus a session transcript in one flow ---

#[tokio::test]
async fn bus_and_session_manager_record_a_conversation() {
    use agentkit::agentkit_bus::Message;

    let bus = Bus::new();
    let sessions = SessionManager::new();
    let ctx = RunContext::new();

    let planner = AgentId::new("planner");
    let workers = [AgentId::new("worker-1"), AgentId::new("worker-2")];
    let session = sessions.create(vec![planner.clone(), workers[0].clone(), workers[1].clone()]);

    for worker in &workers {
        let msg = Message::new(planner.clone(), serde_json::json!({"assignment": worker.to_string()}));
        sessions.add_message(&session, msg.clone()).unwrap();
        bus.send(&ctx, worker, msg).await.unwrap();
    }

    for worker in &workers {
        let received = bus.receive(&ctx, worker).await.unwrap();
        assert_eq!(received.payload["assignment"], worker.to_string());
    }

    sessions.close(&session).unwrap();
    assert_eq!(sessions.get(&session).unwrap().messages.len(), 2);
}
