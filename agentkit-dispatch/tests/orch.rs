use agentkit_core::test_utils::EchoAgent;
use agentkit_core::{
    AgentError, AgentId, AgentInput, AgentOutput, AgentStatus, Dispatcher, ErrorKind, QueryPayload,
    RunContext, Runnable, SignalPayload, WorkflowId,
};
use agentkit_dispatch::LocalDispatcher;
use std::sync::Arc;

// --- Single dispatch ---

#[tokio::test]
async fn dispatch_to_registered_agent() {
    let mut dispatcher = LocalDispatcher::new();
    dispatcher.register(AgentId::new("echo"), Arc::new(EchoAgent));

    let output = dispatcher.dispatch(&AgentId::new("echo"), AgentInput::new("hello")).await.unwrap();
    assert_eq!(output.status, AgentStatus::Success);
    assert_eq!(output.result, Some(serde_json::json!("hello")));
}

#[tokio::test]
async fn dispatch_agent_not_found() {
    let dispatcher = LocalDispatcher::new();

    let err = dispatcher.dispatch(&AgentId::new("missing"), AgentInput::new("fail")).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::AgentNotFound);
    assert!(err.to_string().contains("missing"));
}

// --- Error propagation ---

struct FailingAgent;

#[async_trait::async_trait]
impl Runnable for FailingAgent {
    type Input = AgentInput;
    type Output = AgentOutput;

    async fn invoke(&self, _ctx: &RunContext, _input: AgentInput) -> Result<AgentOutput, AgentError> {
        Err(AgentError::new(ErrorKind::AgentExecution, "failing_agent", "invoke", "always fails"))
    }
}

#[tokio::test]
async fn dispatch_propagates_agent_error() {
    let mut dispatcher = LocalDispatcher::new();
    dispatcher.register(AgentId::new("fail"), Arc::new(FailingAgent));

    let err = dispatcher.dispatch(&AgentId::new("fail"), AgentInput::new("boom")).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::AgentExecution);
    assert!(err.to_string().contains("always fails"));
}

// --- Dispatch many ---

#[tokio::test]
async fn dispatch_many_preserves_input_order() {
    let mut dispatcher = LocalDispatcher::new();
    dispatcher.register(AgentId::new("a"), Arc::new(EchoAgent));
    dispatcher.register(AgentId::new("b"), Arc::new(EchoAgent));

    let results = dispatcher
        .dispatch_many(vec![
            (AgentId::new("a"), AgentInput::new("msg-a")),
            (AgentId::new("b"), AgentInput::new("msg-b")),
        ])
        .await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].as_ref().unwrap().result, Some(serde_json::json!("msg-a")));
    assert_eq!(results[1].as_ref().unwrap().result, Some(serde_json::json!("msg-b")));
}

#[tokio::test]
async fn dispatch_many_isolates_per_task_failures() {
    let mut dispatcher = LocalDispatcher::new();
    dispatcher.register(AgentId::new("ok"), Arc::new(EchoAgent));
    dispatcher.register(AgentId::new("fail"), Arc::new(FailingAgent));
    // "ghost" is not registered

    let results = dispatcher
        .dispatch_many(vec![
            (AgentId::new("ok"), AgentInput::new("fine")),
            (AgentId::new("fail"), AgentInput::new("boom")),
            (AgentId::new("ghost"), AgentInput::new("nobody home")),
        ])
        .await;

    assert!(results[0].is_ok());
    assert_eq!(results[1].as_ref().unwrap_err().kind, ErrorKind::AgentExecution);
    assert_eq!(results[2].as_ref().unwrap_err().kind, ErrorKind::AgentNotFound);
}

// --- Signal and query ---

#[tokio::test]
async fn signal_accepted() {
    let dispatcher = LocalDispatcher::new();
    let signal = SignalPayload::new("cancel", serde_json::json!({"reason": "user request"}));

    dispatcher.signal(&WorkflowId::new("wf-1"), signal).await.unwrap();
}

#[tokio::test]
async fn query_returns_null() {
    let dispatcher = LocalDispatcher::new();
    let query = QueryPayload::new("status", serde_json::json!({}));

    let answer = dispatcher.query(&WorkflowId::new("wf-1"), query).await.unwrap();
    assert_eq!(answer, serde_json::Value::Null);
}

// --- Object safety ---

#[tokio::test]
async fn usable_as_dyn_dispatcher() {
    let mut dispatcher = LocalDispatcher::new();
    dispatcher.register(AgentId::new("echo"), Arc::new(EchoAgent));

    let dispatcher: Box<dyn Dispatcher> = Box::new(dispatcher);
    let output = dispatcher.dispatch(&AgentId::new("echo"), AgentInput::new("dyn")).await.unwrap();
    assert_eq!(output.result, Some(serde_json::json!("dyn")));
}

#[tokio::test]
async fn usable_as_arc_dyn_dispatcher() {
    let mut dispatcher = LocalDispatcher::new();
    dispatcher.register(AgentId::new("echo"), Arc::new(EchoAgent));

    let dispatcher: Arc<dyn Dispatcher> = Arc::new(dispatcher);
    let output = dispatcher.dispatch(&AgentId::new("echo"), AgentInput::new("arc")).await.unwrap();
    assert_eq!(output.result, Some(serde_json::json!("arc")));
}
