//! Composable middleware around a tool call.
//!
//! Mirrors an HTTP middleware chain: each layer gets the call and a `Next`
//! handle to continue to the rest of the chain (or the tool itself, at the
//! bottom). Layering is explicit and ordered — the first-added middleware
//! sees the call first and the response last.
//!
//! Rate limiting and response caching are built as middleware here rather
//! than as intrinsic `ToolDyn` behavior, so a tool author never has to
//! think about them.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::{ToolDyn, ToolError, ToolInput, ToolOutput};

/// The remainder of a middleware chain, including the tool at the bottom.
pub struct Next<'a> {
    tool: &'a dyn ToolDyn,
    middleware: &'a [Arc<dyn ToolMiddleware>],
}

impl<'a> Next<'a> {
    /// Run the next layer, or the tool itself once the chain is exhausted.
    pub fn run(self, input: ToolInput) -> Pin<Box<dyn Future<Output = ToolOutput> + Send + 'a>> {
        match self.middleware.split_first() {
            Some((layer, rest)) => layer.process(input, Next { tool: self.tool, middleware: rest }),
            None => self.tool.call(input),
        }
    }
}

/// A single layer in a tool call's middleware chain.
pub trait ToolMiddleware: Send + Sync {
    /// Inspect or rewrite the call, then call `next.run(input)` to continue
    /// the chain — or short-circuit by returning a `ToolOutput` directly.
    fn process<'a>(&'a self, input: ToolInput, next: Next<'a>) -> Pin<Box<dyn Future<Output = ToolOutput> + Send + 'a>>;
}

/// A tool decorated with an ordered stack of middleware.
///
/// Implements [`ToolDyn`] itself, so a wrapped tool drops into a
/// [`crate::ToolRegistry`] exactly like an undecorated one.
pub struct MiddlewareStack {
    tool: Arc<dyn ToolDyn>,
    middleware: Vec<Arc<dyn ToolMiddleware>>,
}

impl MiddlewareStack {
    /// Start a chain around `tool` with no layers yet.
    pub fn new(tool: Arc<dyn ToolDyn>) -> Self {
        Self { tool, middleware: Vec::new() }
    }

    /// Add a layer to the end of the chain (closest to the tool).
    #[must_use]
    pub fn layer(mut self, middleware: Arc<dyn ToolMiddleware>) -> Self {
        self.middleware.push(middleware);
        self
    }
}

impl ToolDyn for MiddlewareStack {
    fn name(&self) -> &str {
        self.tool.name()
    }

    fn description(&self) -> &str {
        self.tool.description()
    }

    fn input_schema(&self) -> serde_json::Value {
        self.tool.input_schema()
    }

    fn call(&self, input: ToolInput) -> Pin<Box<dyn Future<Output = ToolOutput> + Send + '_>> {
        let next = Next { tool: self.tool.as_ref(), middleware: &self.middleware };
        next.run(input)
    }
}

/// Token-bucket rate limiter. Refills at a configurable rate; a call made
/// when the bucket is empty is rejected with `ToolError::RateLimited`
/// rather than queued.
pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    bucket: Mutex<(f64, Instant)>,
}

impl RateLimiter {
    /// `capacity` tokens, refilled at `refill_per_sec` tokens/second. Starts
    /// full.
    pub fn new(capacity: f64, refill_per_sec: f64) -> Self {
        Self { capacity, refill_per_sec, bucket: Mutex::new((capacity, Instant::now())) }
    }

    fn try_acquire(&self) -> Result<(), u64> {
        let mut bucket = self.bucket.lock().expect("rate limiter lock poisoned");
        let (tokens, last_refill) = &mut *bucket;
        let now = Instant::now();
        let elapsed = now.duration_since(*last_refill).as_secs_f64();
        *tokens = (*tokens + elapsed * self.refill_per_sec).min(self.capacity);
        *last_refill = now;

        if *tokens >= 1.0 {
            *tokens -= 1.0;
            Ok(())
        } else {
            let wait_secs = (1.0 - *tokens) / self.refill_per_sec;
            Err((wait_secs * 1000.0).ceil() as u64)
        }
    }
}

impl ToolMiddleware for RateLimiter {
    fn process<'a>(&'a self, input: ToolInput, next: Next<'a>) -> Pin<Box<dyn Future<Output = ToolOutput> + Send + 'a>> {
        Box::pin(async move {
            match self.try_acquire() {
                Ok(()) => next.run(input).await,
                Err(retry_after_ms) => ToolOutput::failed(ToolError::RateLimited { retry_after_ms }.to_string()),
            }
        })
    }
}

struct CacheEntry {
    output: ToolOutput,
    inserted_at: Instant,
}

/// Bounded LRU cache with a per-entry TTL, keyed on the call's arguments.
///
/// Only successful outputs are cached — a failed call is always retried.
/// Eviction is least-recently-used once `capacity` is exceeded; entries
/// also expire after `ttl` regardless of recency. One `ResponseCache`
/// instance is meant to wrap a single tool (the cache key is the call's
/// arguments alone).
pub struct ResponseCache {
    capacity: usize,
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
    order: Mutex<Vec<String>>,
}

impl ResponseCache {
    /// Create a cache holding at most `capacity` entries, each valid for `ttl`.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self { capacity, ttl, entries: Mutex::new(HashMap::new()), order: Mutex::new(Vec::new()) }
    }

    fn key_for(args: &serde_json::Map<String, serde_json::Value>) -> String {
        serde_json::Value::Object(args.clone()).to_string()
    }

    fn lookup(&self, key: &str) -> Option<ToolOutput> {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        let hit = entries.get(key)?;
        if hit.inserted_at.elapsed() > self.ttl {
            entries.remove(key);
            self.order.lock().expect("cache order lock poisoned").retain(|k| k != key);
            return None;
        }
        let output = hit.output.clone();
        drop(entries);
        self.touch(key);
        Some(output)
    }

    fn touch(&self, key: &str) {
        let mut order = self.order.lock().expect("cache order lock poisoned");
        order.retain(|k| k != key);
        order.push(key.to_string());
    }

    fn insert(&self, key: String, output: ToolOutput) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.insert(key.clone(), CacheEntry { output, inserted_at: Instant::now() });
        drop(entries);
        self.touch(&key);

        let mut order = self.order.lock().expect("cache order lock poisoned");
        while order.len() > self.capacity {
            let evicted = order.remove(0);
            self.entries.lock().expect("cache lock poisoned").remove(&evicted);
        }
    }
}

impl ToolMiddleware for ResponseCache {
    fn process<'a>(&'a self, input: ToolInput, next: Next<'a>) -> Pin<Box<dyn Future<Output = ToolOutput> + Send + 'a>> {
        Box::pin(async move {
            let key = Self::key_for(&input.args);
            if let Some(cached) = self.lookup(&key) {
                return cached.with_metadata(serde_json::json!({"cache_hit": true}));
            }
            let output = next.run(input).await;
            if output.success {
                self.insert(key, output.clone());
            }
            output
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct CountingTool {
        calls: std::sync::atomic::AtomicUsize,
    }

    impl CountingTool {
        fn new() -> Self {
            Self { calls: std::sync::atomic::AtomicUsize::new(0) }
        }
    }

    impl ToolDyn for CountingTool {
        fn name(&self) -> &str {
            "counting"
        }
        fn description(&self) -> &str {
            "counts calls"
        }
        fn input_schema(&self) -> serde_json::Value {
            json!({"type": "object"})
        }
        fn call(&self, _input: ToolInput) -> Pin<Box<dyn Future<Output = ToolOutput> + Send + '_>> {
            let n = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
            Box::pin(async move { ToolOutput::ok(json!({"calls": n})) })
        }
    }

    #[tokio::test]
    async fn stack_with_no_layers_calls_tool_directly() {
        let stack = MiddlewareStack::new(Arc::new(CountingTool::new()));
        let output = stack.call(ToolInput::new(serde_json::Map::new())).await;
        assert_eq!(output.result, json!({"calls": 1}));
    }

    #[tokio::test]
    async fn rate_limiter_rejects_when_bucket_empty() {
        let limiter = Arc::new(RateLimiter::new(1.0, 0.001));
        let stack = MiddlewareStack::new(Arc::new(CountingTool::new())).layer(limiter);

        let first = stack.call(ToolInput::new(serde_json::Map::new())).await;
        assert!(first.success);

        let second = stack.call(ToolInput::new(serde_json::Map::new())).await;
        assert!(!second.success);
        assert!(second.error.contains("rate limited"));
    }

    #[tokio::test]
    async fn response_cache_returns_cached_result_without_recalling_tool() {
        let tool = Arc::new(CountingTool::new());
        let cache = Arc::new(ResponseCache::new(8, Duration::from_secs(60)));
        let stack = MiddlewareStack::new(tool).layer(cache);

        let mut args = serde_json::Map::new();
        args.insert("x".into(), json!(1));

        let first = stack.call(ToolInput::new(args.clone())).await;
        let second = stack.call(ToolInput::new(args)).await;

        assert_eq!(first.result, second.result);
        assert_eq!(second.metadata, json!({"cache_hit": true}));
    }

    #[tokio::test]
    async fn response_cache_evicts_least_recently_used_past_capacity() {
        let tool = Arc::new(CountingTool::new());
        let cache = Arc::new(ResponseCache::new(1, Duration::from_secs(60)));
        let stack = MiddlewareStack::new(tool).layer(cache);

        let mut args_a = serde_json::Map::new();
        args_a.insert("k".into(), json!("a"));
        let mut args_b = serde_json::Map::new();
        args_b.insert("k".into(), json!("b"));

        let first_a = stack.call(ToolInput::new(args_a.clone())).await;
        let _first_b = stack.call(ToolInput::new(args_b)).await;
        // args_a's entry should have been evicted; calling again re-invokes the tool.
        let second_a = stack.call(ToolInput::new(args_a)).await;

        assert_ne!(first_a.result, second_a.result);
    }

    #[tokio::test]
    async fn response_cache_does_not_cache_failures() {
        struct FlakyTool {
            calls: std::sync::atomic::AtomicUsize,
        }
        impl ToolDyn for FlakyTool {
            fn name(&self) -> &str {
                "flaky"
            }
            fn description(&self) -> &str {
                "fails once then succeeds"
            }
            fn input_schema(&self) -> serde_json::Value {
                json!({})
            }
            fn call(&self, _input: ToolInput) -> Pin<Box<dyn Future<Output = ToolOutput> + Send + '_>> {
                let n = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Box::pin(async move {
                    if n == 0 {
                        ToolOutput::failed("not ready")
                    } else {
                        ToolOutput::ok(json!("ready"))
                    }
                })
            }
        }

        let tool = Arc::new(FlakyTool { calls: std::sync::atomic::AtomicUsize::new(0) });
        let cache = Arc::new(ResponseCache::new(8, Duration::from_secs(60)));
        let stack = MiddlewareStack::new(tool).layer(cache);

        let first = stack.call(ToolInput::new(serde_json::Map::new())).await;
        assert!(!first.success);

        let second = stack.call(ToolInput::new(serde_json::Map::new())).await;
        assert!(second.success);
    }
}
