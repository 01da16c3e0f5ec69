//! Integration tests — in-memory test doubles prove the traits compose.
//! Run with: cargo test --features test-utils --test phase2

#![cfg(feature = "test-utils")]

use agentkit_core::test_utils::{EchoAgent, InMemoryStore, LocalOrchestrator, LoggingHook};
use agentkit_core::*;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// EchoAgent
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn echo_agent_returns_input_as_output() {
    let agent = EchoAgent;
    let ctx = RunContext::new();
    let output = agent.invoke(&ctx, AgentInput::new("hello echo")).await.unwrap();
    assert_eq!(output.result, Some(json!("hello echo")));
    assert_eq!(output.status, AgentStatus::Success);
}

#[tokio::test]
async fn echo_agent_is_usable_as_dyn_agent() {
    let agent: Box<dyn Runnable<Input = AgentInput, Output = AgentOutput>> = Box::new(EchoAgent);
    let ctx = RunContext::new();
    let output = agent.invoke(&ctx, AgentInput::new("dynamic dispatch")).await.unwrap();
    assert_eq!(output.result, Some(json!("dynamic dispatch")));
}

#[tokio::test]
async fn echo_agent_default_stream_emits_one_terminal_chunk() {
    let agent = EchoAgent;
    let ctx = RunContext::new();
    let mut rx = agent.stream(&ctx, AgentInput::new("streamed")).await;
    let chunk = rx.recv().await.unwrap();
    assert!(chunk.done);
    assert!(chunk.error.is_none());
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn echo_agent_batch_runs_in_order() {
    let agent = EchoAgent;
    let ctx = RunContext::new();
    let outputs = agent.batch(&ctx, vec![AgentInput::new("a"), AgentInput::new("b")]).await.unwrap();
    assert_eq!(outputs[0].result, Some(json!("a")));
    assert_eq!(outputs[1].result, Some(json!("b")));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// InMemoryStore
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn as_store(s: &InMemoryStore) -> &dyn StateStore {
    s
}

#[tokio::test]
async fn in_memory_store_write_then_read() {
    let store = InMemoryStore::new();
    let ns = Scope::Global.namespace();
    let s = as_store(&store);
    s.put(&ns, "key1", json!("value1")).await.unwrap();
    assert_eq!(s.get(&ns, "key1").await.unwrap(), Some(json!("value1")));
}

#[tokio::test]
async fn in_memory_store_read_missing_returns_none() {
    let store = InMemoryStore::new();
    let ns = Scope::Global.namespace();
    assert_eq!(as_store(&store).get(&ns, "nonexistent").await.unwrap(), None);
}

#[tokio::test]
async fn in_memory_store_delete() {
    let store = InMemoryStore::new();
    let ns = Scope::Global.namespace();
    let s = as_store(&store);
    s.put(&ns, "key1", json!("value1")).await.unwrap();
    s.delete(&ns, "key1").await.unwrap();
    assert_eq!(s.get(&ns, "key1").await.unwrap(), None);
}

#[tokio::test]
async fn in_memory_store_scopes_are_isolated() {
    let store = InMemoryStore::new();
    let s1 = Scope::Session(SessionId::new("s1")).namespace();
    let s2 = Scope::Session(SessionId::new("s2")).namespace();
    let s = as_store(&store);

    s.put(&s1, "key", json!("from s1")).await.unwrap();
    s.put(&s2, "key", json!("from s2")).await.unwrap();

    assert_eq!(s.get(&s1, "key").await.unwrap(), Some(json!("from s1")));
    assert_eq!(s.get(&s2, "key").await.unwrap(), Some(json!("from s2")));
}

#[tokio::test]
async fn in_memory_store_overwrite() {
    let store = InMemoryStore::new();
    let ns = Scope::Global.namespace();
    let s = as_store(&store);
    s.put(&ns, "key", json!("v1")).await.unwrap();
    s.put(&ns, "key", json!("v2")).await.unwrap();
    assert_eq!(s.get(&ns, "key").await.unwrap(), Some(json!("v2")));
}

#[tokio::test]
async fn in_memory_store_search_returns_empty() {
    let store = InMemoryStore::new();
    let ns = Scope::Global.namespace();
    let results = as_store(&store).search(&ns, "anything", 10).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn in_memory_store_is_usable_as_dyn_state_store() {
    let store: Box<dyn StateStore> = Box::new(InMemoryStore::new());
    let ns = Scope::Global.namespace();
    store.put(&ns, "k", json!("v")).await.unwrap();
    assert_eq!(store.get(&ns, "k").await.unwrap(), Some(json!("v")));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// StoreMemory
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn memory_over(store: InMemoryStore) -> StoreMemory {
    StoreMemory::new(Arc::new(store))
}

#[tokio::test]
async fn store_memory_append_then_history_round_trips() {
    let memory = memory_over(InMemoryStore::new());
    let session = SessionId::new("s1");

    memory.append(&session, MemoryEntry::new("user", "hello")).await.unwrap();
    memory.append(&session, MemoryEntry::new("assistant", "hi there")).await.unwrap();

    let history = memory.history(&session, None).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, "user");
    assert_eq!(history[1].content, "hi there");
}

#[tokio::test]
async fn store_memory_history_limit_keeps_most_recent_turns() {
    let memory = memory_over(InMemoryStore::new());
    let session = SessionId::new("s1");

    for i in 0..5 {
        memory.append(&session, MemoryEntry::new("user", format!("turn {i}"))).await.unwrap();
    }

    let history = memory.history(&session, Some(2)).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].content, "turn 3");
    assert_eq!(history[1].content, "turn 4");
}

#[tokio::test]
async fn store_memory_max_turns_trims_on_append() {
    let memory = memory_over(InMemoryStore::new()).with_max_turns(3);
    let session = SessionId::new("s1");

    for i in 0..5 {
        memory.append(&session, MemoryEntry::new("user", format!("turn {i}"))).await.unwrap();
    }

    let history = memory.history(&session, None).await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].content, "turn 2");
}

#[tokio::test]
async fn store_memory_clear_drops_the_session() {
    let memory = memory_over(InMemoryStore::new());
    let session = SessionId::new("s1");

    memory.append(&session, MemoryEntry::new("user", "hello")).await.unwrap();
    memory.clear(&session).await.unwrap();

    assert!(memory.history(&session, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn store_memory_sessions_are_isolated() {
    let memory = memory_over(InMemoryStore::new());
    let s1 = SessionId::new("s1");
    let s2 = SessionId::new("s2");

    memory.append(&s1, MemoryEntry::new("user", "only in s1")).await.unwrap();

    assert_eq!(memory.history(&s1, None).await.unwrap().len(), 1);
    assert!(memory.history(&s2, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn store_memory_is_usable_as_dyn_memory() {
    let memory: Box<dyn Memory> = Box::new(memory_over(InMemoryStore::new()));
    let session = SessionId::new("s1");
    memory.append(&session, MemoryEntry::new("user", "dyn")).await.unwrap();
    assert_eq!(memory.history(&session, None).await.unwrap().len(), 1);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LoggingHook
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn logging_hook_registers_all_points() {
    let hook = LoggingHook::new();
    let points = hook.points();
    assert!(points.contains(&HookPoint::PreInference));
    assert!(points.contains(&HookPoint::PostInference));
    assert!(points.contains(&HookPoint::PreToolUse));
    assert!(points.contains(&HookPoint::PostToolUse));
    assert!(points.contains(&HookPoint::ExitCheck));
}

#[tokio::test]
async fn logging_hook_returns_continue_at_every_point() {
    let hook = LoggingHook::new();
    for point in [HookPoint::PreInference, HookPoint::PostInference, HookPoint::PreToolUse, HookPoint::PostToolUse, HookPoint::ExitCheck] {
        let ctx = HookContext::new(point);
        let action = hook.on_event(&ctx).await.unwrap();
        assert!(matches!(action, HookAction::Continue));
    }
}

#[tokio::test]
async fn logging_hook_records_events() {
    let hook = LoggingHook::new();
    let mut ctx = HookContext::new(HookPoint::PreInference);
    ctx.tokens_used = 100;
    ctx.cost = Decimal::new(5, 3);
    ctx.steps_completed = 1;
    ctx.elapsed = DurationMs::from_secs(1);
    hook.on_event(&ctx).await.unwrap();
    let events = hook.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].point, HookPoint::PreInference);
    assert_eq!(events[0].steps_completed, 1);
}

#[tokio::test]
async fn logging_hook_is_usable_as_dyn_hook() {
    let hook: Box<dyn Hook> = Box::new(LoggingHook::new());
    assert_eq!(hook.points().len(), 5);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LocalOrchestrator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn local_orchestrator_dispatch_to_echo() {
    let mut orch = LocalOrchestrator::new();
    orch.register(AgentId::new("echo"), Arc::new(EchoAgent));
    let output = orch.dispatch(&AgentId::new("echo"), AgentInput::new("dispatch test")).await.unwrap();
    assert_eq!(output.result, Some(json!("dispatch test")));
}

#[tokio::test]
async fn local_orchestrator_dispatch_agent_not_found() {
    let orch = LocalOrchestrator::new();
    let result = orch.dispatch(&AgentId::new("missing"), AgentInput::new("nobody home")).await;
    assert!(result.is_err());
    assert_eq!(result.unwrap_err().kind, ErrorKind::AgentNotFound);
}

#[tokio::test]
async fn local_orchestrator_dispatch_many_concurrent() {
    let mut orch = LocalOrchestrator::new();
    orch.register(AgentId::new("a"), Arc::new(EchoAgent));
    orch.register(AgentId::new("b"), Arc::new(EchoAgent));

    let tasks = vec![(AgentId::new("a"), AgentInput::new("msg-a")), (AgentId::new("b"), AgentInput::new("msg-b"))];
    let results = orch.dispatch_many(tasks).await;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].as_ref().unwrap().result, Some(json!("msg-a")));
    assert_eq!(results[1].as_ref().unwrap().result, Some(json!("msg-b")));
}

#[tokio::test]
async fn local_orchestrator_dispatch_many_partial_failure() {
    let mut orch = LocalOrchestrator::new();
    orch.register(AgentId::new("a"), Arc::new(EchoAgent));

    let tasks = vec![(AgentId::new("a"), AgentInput::new("ok")), (AgentId::new("b"), AgentInput::new("fail"))];
    let results = orch.dispatch_many(tasks).await;
    assert!(results[0].is_ok());
    assert!(results[1].is_err());
}

#[tokio::test]
async fn local_orchestrator_is_usable_as_dyn_dispatcher() {
    let mut orch = LocalOrchestrator::new();
    orch.register(AgentId::new("echo"), Arc::new(EchoAgent));
    let orch: Box<dyn Dispatcher> = Box::new(orch);
    let output = orch.dispatch(&AgentId::new("echo"), AgentInput::new("dyn")).await.unwrap();
    assert_eq!(output.result, Some(json!("dyn")));
}

#[tokio::test]
async fn orchestrator_signal_accepted() {
    let orch = LocalOrchestrator::new();
    let wf = WorkflowId::new("wf-1");
    let signal = SignalPayload::new("cancel", json!({"reason": "user request"}));
    assert!(orch.signal(&wf, signal).await.is_ok());
}

#[tokio::test]
async fn orchestrator_query_returns_null() {
    let orch = LocalOrchestrator::new();
    let wf = WorkflowId::new("wf-1");
    let query = QueryPayload::new("status", json!({}));
    assert_eq!(orch.query(&wf, query).await.unwrap(), serde_json::Value::Null);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Integration: compose dispatcher + state store + hook
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn integration_compose_dispatcher_store_and_hook() {
    let mut orch = LocalOrchestrator::new();
    orch.register(AgentId::new("agent-a"), Arc::new(EchoAgent));
    orch.register(AgentId::new("agent-b"), Arc::new(EchoAgent));

    let store = InMemoryStore::new();
    let s = as_store(&store);
    let hook = LoggingHook::new();

    let tasks = vec![(AgentId::new("agent-a"), AgentInput::new("task for A")), (AgentId::new("agent-b"), AgentInput::new("task for B"))];
    let results = orch.dispatch_many(tasks).await;

    assert_eq!(results.len(), 2);
    let output_a = results[0].as_ref().unwrap();
    let output_b = results[1].as_ref().unwrap();
    assert_eq!(output_a.result, Some(json!("task for A")));
    assert_eq!(output_b.result, Some(json!("task for B")));

    let ns = Scope::Workflow(WorkflowId::new("wf-integration")).namespace();
    s.put(&ns, "result/agent-a", json!({"message": "task for A"})).await.unwrap();
    s.put(&ns, "result/agent-b", json!({"message": "task for B"})).await.unwrap();

    let keys = s.list(&ns).await.unwrap();
    assert_eq!(keys, vec!["result/agent-a", "result/agent-b"]);

    let mut ctx = HookContext::new(HookPoint::PostInference);
    ctx.tokens_used = 100;
    ctx.cost = Decimal::new(5, 3);
    ctx.steps_completed = 1;
    ctx.elapsed = DurationMs::from_millis(500);
    let action = hook.on_event(&ctx).await.unwrap();
    assert!(matches!(action, HookAction::Continue));

    let mut ctx2 = HookContext::new(HookPoint::PostInference);
    ctx2.tokens_used = 200;
    ctx2.steps_completed = 2;
    hook.on_event(&ctx2).await.unwrap();

    let events = hook.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].tokens_used, 100);
    assert_eq!(events[1].tokens_used, 200);
}
