//! Integration tests for middleware ordering and composition.

use agentkit_tool::middleware::{MiddlewareStack, Next, RateLimiter, ResponseCache, ToolMiddleware};
use agentkit_tool::{ToolDyn, ToolInput, ToolOutput};
use serde_json::json;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct NoopTool;

impl ToolDyn for NoopTool {
    fn name(&self) -> &str {
        "noop"
    }
    fn description(&self) -> &str {
        "does nothing"
    }
    fn input_schema(&self) -> serde_json::Value {
        json!({})
    }
    fn call(&self, _input: ToolInput) -> Pin<Box<dyn Future<Output = ToolOutput> + Send + '_>> {
        Box::pin(async { ToolOutput::ok(json!("ok")) })
    }
}

/// Records its own position in the chain each time it runs.
struct OrderRecorder {
    label: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl ToolMiddleware for OrderRecorder {
    fn process<'a>(&'a self, input: ToolInput, next: Next<'a>) -> Pin<Box<dyn Future<Output = ToolOutput> + Send + 'a>> {
        Box::pin(async move {
            self.log.lock().unwrap().push(self.label);
            next.run(input).await
        })
    }
}

#[tokio::test]
async fn middleware_runs_in_registration_order_outermost_first() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let stack = MiddlewareStack::new(Arc::new(NoopTool))
        .layer(Arc::new(OrderRecorder { label: "first", log: log.clone() }))
        .layer(Arc::new(OrderRecorder { label: "second", log: log.clone() }));

    stack.call(ToolInput::new(serde_json::Map::new())).await;

    assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
}

#[tokio::test]
async fn middleware_stack_composes_rate_limiter_and_cache() {
    let calls = Arc::new(AtomicUsize::new(0));
    struct CountingTool(Arc<AtomicUsize>);
    impl ToolDyn for CountingTool {
        fn name(&self) -> &str {
            "counting"
        }
        fn description(&self) -> &str {
            ""
        }
        fn input_schema(&self) -> serde_json::Value {
            json!({})
        }
        fn call(&self, _input: ToolInput) -> Pin<Box<dyn Future<Output = ToolOutput> + Send + '_>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { ToolOutput::ok(json!("v")) })
        }
    }

    let stack = MiddlewareStack::new(Arc::new(CountingTool(calls.clone())))
        .layer(Arc::new(ResponseCache::new(4, Duration::from_secs(30))))
        .layer(Arc::new(RateLimiter::new(10.0, 10.0)));

    let mut args = serde_json::Map::new();
    args.insert("k".into(), json!("v"));

    for _ in 0..3 {
        let output = stack.call(ToolInput::new(args.clone())).await;
        assert!(output.success);
    }

    // Every call after the first is served from cache, so the underlying
    // tool only runs once.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
