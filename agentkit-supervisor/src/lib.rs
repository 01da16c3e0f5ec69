#![deny(missing_docs)]
//! Supervisor — decomposes a composite task, plans it into dependency
//! wavefronts, dispatches each wavefront's tasks concurrently through a
//! router, retries per-task failures per [`RetryPolicy`], and aggregates
//! per-task outputs into one [`AgentOutput`].
//!
//! Grounded on the dispatcher's concurrent-dispatch idiom (`tokio::spawn` per
//! task, `JoinHandle`s collected back in order) for wavefront execution, and
//! on the bounded work-queue idiom (a hard ceiling on follow-up iterations)
//! for this crate's `max_concurrency` semaphore and `max_retries` backoff
//! loop. Decompose/Plan are new: `ExecutionPlan` implements the wavefront
//! grouping the data model calls for, grounded directly on that model rather
//! than on any one collaborator crate.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Semaphore;

use agentkit_aggregator::{Aggregator, SourceResult};
use agentkit_core::{
    AgentError, AgentId, AgentInput, AgentOutput, AgentStatus, Dispatcher, DurationMs, ErrorKind,
    RunContext, Runnable, TaskId,
};
use agentkit_provider::{ChatMessage, CompletionRequest, Provider};
use agentkit_router::{AgentProfile, Router};

/// One unit of work inside a supervised run. Dependencies reference sibling
/// tasks by id; the dependency graph must be acyclic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique within one `ExecutionPlan`.
    pub id: TaskId,
    /// Caller-defined classification, informational only.
    pub task_type: String,
    /// What the routed sub-agent should do.
    pub description: String,
    /// Used by `Merge`'s weighting and `Hierarchical`'s default grouping key.
    pub priority: i32,
    /// Task ids that must complete before this one is dispatched.
    pub dependencies: Vec<TaskId>,
    /// Opaque caller metadata, passed through untouched.
    #[serde(default)]
    pub metadata: Value,
}

impl Task {
    /// Construct a task with default type `"generic"`, priority 0, and no
    /// dependencies.
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(id.into()),
            task_type: "generic".to_string(),
            description: description.into(),
            priority: 0,
            dependencies: Vec::new(),
            metadata: Value::Null,
        }
    }

    /// Override priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Override the task type.
    pub fn with_type(mut self, task_type: impl Into<String>) -> Self {
        self.task_type = task_type.into();
        self
    }

    /// Attach dependency edges.
    pub fn with_dependencies(mut self, dependencies: Vec<TaskId>) -> Self {
        self.dependencies = dependencies;
        self
    }
}

/// A task list topologically grouped into wavefronts: every task in
/// `groups[i]` has its dependencies satisfied by `⋃ groups[0..i]`.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    /// Every task in the plan, in the order the caller supplied them.
    pub tasks: Vec<Task>,
    /// Wavefronts: `groups[i]` dispatches concurrently once `groups[0..i]`
    /// have all completed.
    pub groups: Vec<Vec<TaskId>>,
}

impl ExecutionPlan {
    /// Topologically sort `tasks` into wavefronts. Fails if a task names an
    /// unknown dependency, or if the dependency graph has a cycle.
    pub fn plan(tasks: Vec<Task>) -> Result<Self, AgentError> {
        let known: HashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        for task in &tasks {
            for dep in &task.dependencies {
                if !known.contains(dep.as_str()) {
                    return Err(AgentError::invalid_input(
                        "supervisor_plan",
                        format!("task {} depends on unknown task {}", task.id, dep),
                    ));
                }
            }
        }

        let mut remaining: Vec<&Task> = tasks.iter().collect();
        let mut completed: HashSet<&str> = HashSet::new();
        let mut groups: Vec<Vec<TaskId>> = Vec::new();

        while !remaining.is_empty() {
            let (ready, not_ready): (Vec<&Task>, Vec<&Task>) =
                remaining.into_iter().partition(|t| t.dependencies.iter().all(|d| completed.contains(d.as_str())));

            if ready.is_empty() {
                return Err(AgentError::invalid_input("supervisor_plan", "task dependency graph contains a cycle"));
            }

            let mut group = Vec::with_capacity(ready.len());
            for t in &ready {
                completed.insert(t.id.as_str());
                group.push(t.id.clone());
            }
            groups.push(group);
            remaining = not_ready;
        }

        Ok(Self { tasks, groups })
    }
}

/// Splits an [`AgentInput`] into one or more [`Task`]s.
#[async_trait]
pub trait Decomposer: Send + Sync {
    /// Produce the task list to plan and execute. Returning a single task
    /// wrapping the whole input is always a valid answer.
    async fn decompose(&self, ctx: &RunContext, input: &AgentInput) -> Result<Vec<Task>, AgentError>;
}

/// Always wraps the whole input in a single task. The supervisor's default
/// decomposer, and sufficient for any caller that never marks input composite.
#[derive(Debug, Default)]
pub struct SingleTaskDecomposer;

#[async_trait]
impl Decomposer for SingleTaskDecomposer {
    async fn decompose(&self, _ctx: &RunContext, input: &AgentInput) -> Result<Vec<Task>, AgentError> {
        Ok(vec![Task::new("task-0", input.task.clone())])
    }
}

/// Asks an LLM to split a composite task into a dependency-annotated task
/// list. Falls back to [`SingleTaskDecomposer`]'s single-task answer when the
/// input isn't marked composite (`context.composite == true`), so it's safe
/// to install as the supervisor's only decomposer even for simple inputs.
pub struct LlmDecomposer<P: Provider> {
    provider: P,
    model: String,
}

impl<P: Provider> LlmDecomposer<P> {
    /// Build a decomposer that asks `model` for the task list.
    pub fn new(provider: P, model: impl Into<String>) -> Self {
        Self { provider, model: model.into() }
    }
}

#[derive(Debug, Deserialize)]
struct RawTask {
    id: String,
    description: String,
    #[serde(default)]
    priority: i32,
    #[serde(default)]
    dependencies: Vec<String>,
}

fn parse_task_list(text: &str) -> Result<Vec<Task>, AgentError> {
    let trimmed = text.trim();
    let candidate = match serde_json::from_str::<Vec<RawTask>>(trimmed) {
        Ok(raw) => raw,
        Err(_) => {
            let start = trimmed.find('[');
            let end = trimmed.rfind(']');
            let (Some(start), Some(end)) = (start, end) else {
                return Err(AgentError::parse("decomposition response was not a JSON array", text));
            };
            serde_json::from_str::<Vec<RawTask>>(&trimmed[start..=end])
                .map_err(|e| AgentError::parse(format!("decomposition JSON array was malformed: {e}"), text))?
        }
    };

    Ok(candidate
        .into_iter()
        .map(|raw| Task::new(raw.id, raw.description).with_priority(raw.priority).with_dependencies(raw.dependencies.into_iter().map(TaskId::new).collect()))
        .collect())
}

#[async_trait]
impl<P: Provider + Send + Sync> Decomposer for LlmDecomposer<P> {
    async fn decompose(&self, ctx: &RunContext, input: &AgentInput) -> Result<Vec<Task>, AgentError> {
        let is_composite = input.context.get("composite").and_then(Value::as_bool).unwrap_or(false);
        if !is_composite {
            return Ok(vec![Task::new("task-0", input.task.clone())]);
        }

        let prompt = format!(
            "Split the following task into an ordered JSON array of subtasks. Each \
             element must be an object with \"id\", \"description\", \"priority\" \
             (integer), and \"dependencies\" (array of earlier ids). Respond with \
             JSON only, no prose.\n\nTask: {}",
            input.task
        );
        let request = CompletionRequest::new(vec![ChatMessage::user(prompt)])
            .with_model(self.model.clone())
            .with_system("You decompose tasks into dependency-ordered subtasks.")
            .with_max_tokens(1024)
            .with_temperature(0.0);

        let response = match ctx.race("supervisor_decompose", "complete", self.provider.complete(request)).await {
            Err(ctx_err) => return Err(ctx_err),
            Ok(Err(provider_err)) => return Err(AgentError::llm(ErrorKind::LlmRequest, provider_err.to_string())),
            Ok(Ok(resp)) => resp,
        };

        parse_task_list(&response.content)
    }
}

/// Per-task retry policy: retryable errors retry with exponential backoff,
/// up to `max_retries` attempts after the first failure.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum retry attempts after the first failure.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Multiplier applied to the delay after each retry.
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 2, base_delay: Duration::from_millis(200), backoff_factor: 2.0 }
    }
}

impl RetryPolicy {
    /// The delay to sleep before attempt number `attempt` (0-indexed: the
    /// delay before the first retry is `delay_for(0)`).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.powi(attempt as i32);
        Duration::from_secs_f64(self.base_delay.as_secs_f64() * factor)
    }
}

/// Tunable knobs for one [`Supervisor`].
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Counting-semaphore bound on simultaneously-executing tasks per wavefront.
    pub max_concurrency: usize,
    /// Deadline applied to each sub-agent dispatch, if any.
    pub sub_agent_timeout: Option<Duration>,
    /// Retry policy applied to retryable per-task failures.
    pub retry_policy: RetryPolicy,
    /// If set, a task's (post-retry) failure skips every task not yet
    /// started rather than letting sibling wavefronts continue.
    pub fail_fast: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self { max_concurrency: 4, sub_agent_timeout: None, retry_policy: RetryPolicy::default(), fail_fast: false }
    }
}

/// Atomically updated counters for one supervisor instance.
#[derive(Debug, Default)]
pub struct SupervisorMetrics {
    total_tasks: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
    aggregate_latency_ms: AtomicU64,
    per_agent: Mutex<HashMap<String, u64>>,
}

impl SupervisorMetrics {
    fn record_dispatch(&self, agent_name: &str) {
        let mut per_agent = self.per_agent.lock().expect("per_agent mutex poisoned");
        *per_agent.entry(agent_name.to_string()).or_insert(0) += 1;
    }

    /// Take a serializable point-in-time snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_tasks: self.total_tasks.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            aggregate_latency: DurationMs::from_millis(self.aggregate_latency_ms.load(Ordering::Relaxed)),
            per_agent_counters: self.per_agent.lock().expect("per_agent mutex poisoned").clone(),
        }
    }
}

/// Point-in-time, serializable view of [`SupervisorMetrics`].
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Tasks planned across every `invoke` this supervisor has run.
    pub total_tasks: u64,
    /// Tasks that reached a successful dispatch.
    pub completed: u64,
    /// Tasks that exhausted their retries (or hit a non-retryable error).
    pub failed: u64,
    /// Retry attempts issued across every task.
    pub retried: u64,
    /// Cumulative wall-clock time spent in the aggregation step.
    pub aggregate_latency: DurationMs,
    /// Dispatch counts keyed by the agent name the router chose.
    pub per_agent_counters: HashMap<String, u64>,
}

/// Decomposes, plans, dispatches, and aggregates a (possibly composite) task.
///
/// Router, aggregator, and decomposer are trait objects: the supervisor
/// itself stays a concrete, non-generic type so it composes with
/// `tokio::spawn`-based wavefront execution without `'static` generic-bound
/// friction, mirroring the dispatcher's own `Arc<dyn Dispatcher>` style of
/// composing collaborators.
pub struct Supervisor {
    dispatcher: Arc<dyn Dispatcher>,
    decomposer: Arc<dyn Decomposer>,
    router: Arc<dyn Router>,
    aggregator: Arc<dyn Aggregator>,
    agents: Arc<Vec<AgentProfile>>,
    config: SupervisorConfig,
    metrics: Arc<SupervisorMetrics>,
}

impl Supervisor {
    /// Build a supervisor over the given dispatcher, router, aggregator, and
    /// agent catalog. Defaults to [`SingleTaskDecomposer`] and
    /// [`SupervisorConfig::default`].
    pub fn new(
        dispatcher: Arc<dyn Dispatcher>,
        router: Arc<dyn Router>,
        aggregator: Arc<dyn Aggregator>,
        agents: Vec<AgentProfile>,
    ) -> Self {
        Self {
            dispatcher,
            decomposer: Arc::new(SingleTaskDecomposer),
            router,
            aggregator,
            agents: Arc::new(agents),
            config: SupervisorConfig::default(),
            metrics: Arc::new(SupervisorMetrics::default()),
        }
    }

    /// Override the decomposer (e.g. to install an [`LlmDecomposer`]).
    pub fn with_decomposer(mut self, decomposer: Arc<dyn Decomposer>) -> Self {
        self.decomposer = decomposer;
        self
    }

    /// Override the default config.
    pub fn with_config(mut self, config: SupervisorConfig) -> Self {
        self.config = config;
        self
    }

    /// Read the current metrics snapshot.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

async fn execute_task(
    ctx: &RunContext,
    dispatcher: Arc<dyn Dispatcher>,
    router: Arc<dyn Router>,
    agents: Arc<Vec<AgentProfile>>,
    metrics: Arc<SupervisorMetrics>,
    retry_policy: RetryPolicy,
    sub_agent_timeout: Option<Duration>,
    original_task: String,
    task: Task,
) -> SourceResult {
    let mut attempt = 0u32;

    loop {
        let agent_name = match router.route(ctx, &task.description, &agents).await {
            Ok(name) => name,
            Err(err) => {
                let output = AgentOutput::failed(err.message.clone())
                    .with_metadata(serde_json::json!({"error_kind": err.kind.to_string()}));
                return SourceResult::new(task.id.clone(), output, 0.0, task.priority);
            }
        };

        metrics.record_dispatch(&agent_name);

        let input = AgentInput::new(task.description.clone())
            .with_context("original_task", Value::String(original_task.clone()))
            .with_context("task_id", Value::String(task.id.to_string()));

        let child_ctx = match sub_agent_timeout {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx.clone(),
        };

        let outcome = match child_ctx
            .race("supervisor_execute", "dispatch", dispatcher.dispatch(&AgentId::new(agent_name), input))
            .await
        {
            Err(ctx_err) => Err(ctx_err),
            Ok(inner) => inner,
        };

        match outcome {
            Ok(output) => {
                metrics.completed.fetch_add(1, Ordering::Relaxed);
                let confidence = output
                    .metadata
                    .get("confidence")
                    .and_then(Value::as_f64)
                    .unwrap_or(if output.status == AgentStatus::Success { 1.0 } else { 0.5 });
                return SourceResult::new(task.id.clone(), output, confidence, task.priority);
            }
            Err(err) => {
                if err.is_retryable() && attempt < retry_policy.max_retries {
                    metrics.retried.fetch_add(1, Ordering::Relaxed);
                    let delay = retry_policy.delay_for(attempt);
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                    continue;
                }
                metrics.failed.fetch_add(1, Ordering::Relaxed);
                let output = AgentOutput::failed(err.message.clone())
                    .with_metadata(serde_json::json!({"error_kind": err.kind.to_string()}));
                return SourceResult::new(task.id.clone(), output, 0.0, task.priority);
            }
        }
    }
}

#[async_trait]
impl Runnable for Supervisor {
    type Input = AgentInput;
    type Output = AgentOutput;

    async fn invoke(&self, ctx: &RunContext, input: AgentInput) -> Result<AgentOutput, AgentError> {
        let start = std::time::Instant::now();
        let original_task = input.task.clone();

        let tasks = self.decomposer.decompose(ctx, &input).await?;
        let plan = ExecutionPlan::plan(tasks)?;
        self.metrics.total_tasks.fetch_add(plan.tasks.len() as u64, Ordering::Relaxed);

        let by_id: HashMap<String, Task> = plan.tasks.iter().map(|t| (t.id.as_str().to_string(), t.clone())).collect();

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let aborted = Arc::new(AtomicBool::new(false));
        let mut all_results: Vec<SourceResult> = Vec::new();

        for group in &plan.groups {
            let mut handles = Vec::with_capacity(group.len());

            for task_id in group {
                let task = by_id.get(task_id.as_str()).cloned().expect("plan only lists tasks it was built from");

                if aborted.load(Ordering::Relaxed) {
                    all_results.push(SourceResult::new(
                        task.id.clone(),
                        AgentOutput::failed("skipped: a sibling task failed under fail_fast"),
                        0.0,
                        task.priority,
                    ));
                    continue;
                }

                let dispatcher = self.dispatcher.clone();
                let router = self.router.clone();
                let agents = self.agents.clone();
                let metrics = self.metrics.clone();
                let retry_policy = self.config.retry_policy.clone();
                let sub_agent_timeout = self.config.sub_agent_timeout;
                let fail_fast = self.config.fail_fast;
                let original_task = original_task.clone();
                let ctx = ctx.clone();
                let semaphore = semaphore.clone();
                let aborted = aborted.clone();

                handles.push(tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.expect("semaphore is never closed");
                    let result =
                        execute_task(&ctx, dispatcher, router, agents, metrics, retry_policy, sub_agent_timeout, original_task, task)
                            .await;
                    if fail_fast && !matches!(result.output.status, AgentStatus::Success | AgentStatus::Partial) {
                        aborted.store(true, Ordering::Relaxed);
                    }
                    result
                }));
            }

            for handle in handles {
                match handle.await {
                    Ok(result) => all_results.push(result),
                    Err(join_err) => all_results.push(SourceResult::new(
                        TaskId::new("unknown"),
                        AgentOutput::failed(format!("task panicked: {join_err}")),
                        0.0,
                        0,
                    )),
                }
            }
        }

        let mut output = self.aggregator.aggregate(ctx, &all_results).await?;
        output.latency = DurationMs::from(start.elapsed());
        self.metrics.aggregate_latency_ms.fetch_add(output.latency.as_millis(), Ordering::Relaxed);
        Ok(output)
    }
}
