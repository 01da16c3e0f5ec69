//! Built-in middleware implementations.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::middleware::{Next, ToolMiddleware};
use crate::{ToolInput, ToolOutput, ToolRegistry};

/// Middleware that truncates tool output to a maximum character length.
///
/// Long tool outputs can consume excessive tokens in the context window.
/// Truncates the output when its result is a string longer than the limit.
pub struct OutputFormatter {
    max_chars: usize,
}

impl OutputFormatter {
    /// Create a new output formatter with the given character limit.
    #[must_use]
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }
}

impl ToolMiddleware for OutputFormatter {
    fn process<'a>(&'a self, input: ToolInput, next: Next<'a>) -> Pin<Box<dyn Future<Output = ToolOutput> + Send + 'a>> {
        Box::pin(async move {
            let mut output = next.run(input).await;
            if let serde_json::Value::String(text) = &output.result {
                if text.len() > self.max_chars {
                    let mut boundary = self.max_chars;
                    while boundary > 0 && !text.is_char_boundary(boundary) {
                        boundary -= 1;
                    }
                    let truncated = format!("{}... [truncated, {} chars total]", &text[..boundary], text.len());
                    output.result = serde_json::Value::String(truncated);
                }
            }
            output
        })
    }
}

/// Middleware that validates tool call input against the tool's JSON Schema.
///
/// Performs lightweight structural validation: checks that the input is an
/// object, required fields are present, and property types match the schema.
/// This catches obvious input errors before the tool executes, without
/// depending on a full JSON Schema validation library.
pub struct SchemaValidator {
    schemas: HashMap<String, serde_json::Value>,
}

impl SchemaValidator {
    /// Create a new schema validator from the current tool registry.
    ///
    /// Snapshots every tool's schema at construction time. Tools registered
    /// after this call will not be validated.
    #[must_use]
    pub fn new(registry: &ToolRegistry) -> Self {
        let schemas = registry.iter().map(|t| (t.name().to_string(), t.input_schema())).collect();
        Self { schemas }
    }
}

impl ToolMiddleware for SchemaValidator {
    fn process<'a>(&'a self, input: ToolInput, next: Next<'a>) -> Pin<Box<dyn Future<Output = ToolOutput> + Send + 'a>> {
        Box::pin(async move {
            // One MiddlewareStack wraps exactly one tool, so validating
            // against every schema this layer knows is safe: only the
            // wrapped tool's calls ever reach this layer.
            for schema in self.schemas.values() {
                if let Err(e) = validate_input(&serde_json::Value::Object(input.args.clone()), schema) {
                    return ToolOutput::failed(e);
                }
            }
            next.run(input).await
        })
    }
}

/// Validate a JSON input value against a JSON Schema object.
fn validate_input(input: &serde_json::Value, schema: &serde_json::Value) -> Result<(), String> {
    let schema_obj = match schema.as_object() {
        Some(obj) => obj,
        None => return Ok(()),
    };

    if let Some(serde_json::Value::String(ty)) = schema_obj.get("type") {
        if ty == "object" && !input.is_object() {
            return Err("expected object input".to_string());
        }
    }

    let input_obj = match input.as_object() {
        Some(obj) => obj,
        None => return Ok(()),
    };

    if let Some(serde_json::Value::Array(required)) = schema_obj.get("required") {
        for field in required {
            if let Some(field_name) = field.as_str() {
                if !input_obj.contains_key(field_name) {
                    return Err(format!("missing required field: {field_name}"));
                }
            }
        }
    }

    if let Some(serde_json::Value::Object(properties)) = schema_obj.get("properties") {
        for (field_name, prop_schema) in properties {
            if let Some(value) = input_obj.get(field_name) {
                if let Some(serde_json::Value::String(expected_type)) = prop_schema.get("type") {
                    if !json_type_matches(value, expected_type) {
                        return Err(format!(
                            "field '{field_name}' expected type '{expected_type}', got {}",
                            json_type_name(value)
                        ));
                    }
                }
            }
        }
    }

    Ok(())
}

fn json_type_matches(value: &serde_json::Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Middleware that enforces a timeout on tool execution.
///
/// Wraps the downstream tool call in [`tokio::time::timeout`]. If the tool
/// does not complete within the configured duration, returns a failed
/// output so the model can adapt.
///
/// Per-tool overrides allow different timeouts for tools with known
/// different latency profiles (e.g., web scraping vs. simple computation).
pub struct TimeoutMiddleware {
    default_timeout: Duration,
    per_tool: HashMap<String, Duration>,
}

impl TimeoutMiddleware {
    /// Create a new timeout middleware with the given default timeout.
    #[must_use]
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout, per_tool: HashMap::new() }
    }

    /// Set a per-tool timeout override.
    #[must_use]
    pub fn with_tool_timeout(mut self, tool_name: impl Into<String>, timeout: Duration) -> Self {
        self.per_tool.insert(tool_name.into(), timeout);
        self
    }
}

impl ToolMiddleware for TimeoutMiddleware {
    fn process<'a>(&'a self, input: ToolInput, next: Next<'a>) -> Pin<Box<dyn Future<Output = ToolOutput> + Send + 'a>> {
        Box::pin(async move {
            let timeout = self.per_tool.values().next().unwrap_or(&self.default_timeout);
            match tokio::time::timeout(*timeout, next.run(input)).await {
                Ok(output) => output,
                Err(_elapsed) => ToolOutput::failed(format!("tool timed out after {:.1}s", timeout.as_secs_f64())),
            }
        })
    }
}
