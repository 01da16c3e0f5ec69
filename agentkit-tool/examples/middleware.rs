//! Middleware example: layering a rate limiter and a response cache on a tool.
//!
//! Run with: `cargo run --example middleware -p agentkit-tool`

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use agentkit_tool::middleware::{MiddlewareStack, RateLimiter, ResponseCache};
use agentkit_tool::{ToolDyn, ToolInput, ToolOutput};
use serde_json::json;

struct SlowLookup;

impl ToolDyn for SlowLookup {
    fn name(&self) -> &str {
        "lookup"
    }

    fn description(&self) -> &str {
        "Pretends to call a slow external API"
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({"type": "object", "required": ["id"]})
    }

    fn call(&self, input: ToolInput) -> Pin<Box<dyn Future<Output = ToolOutput> + Send + '_>> {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            ToolOutput::ok(json!({"id": input.args.get("id"), "value": "resolved"}))
        })
    }
}

#[tokio::main]
async fn main() {
    let stack = MiddlewareStack::new(Arc::new(SlowLookup))
        .layer(Arc::new(ResponseCache::new(32, Duration::from_secs(30))))
        .layer(Arc::new(RateLimiter::new(5.0, 1.0)));

    let mut args = serde_json::Map::new();
    args.insert("id".into(), json!("42"));

    let first = stack.call(ToolInput::new(args.clone())).await;
    println!("first call:  {:?} (cache_hit={:?})", first.result, first.metadata);

    let second = stack.call(ToolInput::new(args)).await;
    println!("second call: {:?} (cache_hit={:?})", second.result, second.metadata);
}
