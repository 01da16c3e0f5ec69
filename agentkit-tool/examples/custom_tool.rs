//! Example: define a tool by hand, register it, and execute it.
//!
//! Run with: `cargo run --example custom_tool -p agentkit-tool`

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use agentkit_tool::{ToolDyn, ToolInput, ToolOutput, ToolRegistry};
use serde_json::json;

struct Calculator;

impl ToolDyn for Calculator {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluates a simple `a OP b` arithmetic expression"
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "required": ["a", "op", "b"],
            "properties": {
                "a": {"type": "number"},
                "op": {"type": "string"},
                "b": {"type": "number"}
            }
        })
    }

    fn call(&self, input: ToolInput) -> Pin<Box<dyn Future<Output = ToolOutput> + Send + '_>> {
        Box::pin(async move {
            let a = input.args.get("a").and_then(|v| v.as_f64());
            let b = input.args.get("b").and_then(|v| v.as_f64());
            let op = input.args.get("op").and_then(|v| v.as_str());

            let (Some(a), Some(op), Some(b)) = (a, op, b) else {
                return ToolOutput::failed("missing a, op, or b");
            };

            let result = match op {
                "+" => a + b,
                "-" => a - b,
                "*" => a * b,
                "/" if b != 0.0 => a / b,
                "/" => return ToolOutput::failed("division by zero"),
                other => return ToolOutput::failed(format!("unsupported operator: {other}")),
            };

            ToolOutput::ok(json!({"result": result}))
        })
    }
}

#[tokio::main]
async fn main() {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(Calculator)).expect("first registration always succeeds");

    let tool = registry.get("calculator").expect("just registered");
    let mut args = serde_json::Map::new();
    args.insert("a".into(), json!(3));
    args.insert("op".into(), json!("*"));
    args.insert("b".into(), json!(4));

    let output = tool.call(ToolInput::new(args)).await;
    println!("{} => {:?}", tool.name(), output.result);
}
