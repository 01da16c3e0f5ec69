#![deny(missing_docs)]
//! ReAct reasoning loop and agent executor.
//!
//! [`ReactAgent`] runs a bounded Thought/Action/Observation cycle: assemble
//! a prompt from the system instructions plus a tool catalog, call the
//! model, classify its text with [`agentkit_parser::parse_react_output`],
//! execute the chosen tool (or record an effect for the calling layer),
//! feed the observation back, and repeat until a final answer, a step
//! budget, or a hook halts it. [`AgentExecutor`] wraps any [`Agent`] with
//! memory injection, an execution deadline, and failure isolation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rust_decimal::Decimal;

use agentkit_core::{
    AgentError, AgentInput, AgentOutput, AgentState, DurationMs, Effect, ErrorKind,
    Hook, HookAction, HookContext, HookPipeline, HookPoint, Memory, MemoryEntry, ReasoningStep,
    RunContext, Runnable, Scope, SessionId, SignalPayload, StateStore, StreamChunk, TokenUsage,
    ToolCall, WorkflowId, AgentId, Content, DEFAULT_STREAM_BUFFER,
};
use agentkit_hooks::{Callback, CallbackEvent, CallbackManager};
use agentkit_parser::{parse_react_output, ParsedOutput};
use agentkit_provider::{ChatMessage, CompletionRequest, Provider, ProviderError};
use agentkit_tool::{ToolInput, ToolRegistry, ToolRuntime};

/// Tool names handled as declared [`Effect`]s instead of being looked up in
/// the [`ToolRegistry`] — the loop never executes them itself, it just
/// records the effect and tells the model it was accepted.
const EFFECT_TOOL_NAMES: &[&str] = &["write_memory", "delete_memory", "delegate", "handoff", "signal"];

/// Static configuration for a [`ReactAgent`].
pub struct ReactConfig {
    /// Base system prompt. The tool catalog and output-format instructions
    /// are appended after this.
    pub system_prompt: String,
    /// Model identifier to request. `None` lets the provider pick its default.
    pub default_model: Option<String>,
    /// Max output tokens per model call.
    pub max_tokens: u32,
    /// Max Thought/Action/Observation iterations before stopping with
    /// `AgentStatus::Partial`.
    pub max_steps: u32,
    /// If any of these substrings appear in a model response, the loop
    /// stops there: the text before the first match is taken as the final
    /// answer instead of being parsed for an action. Guards against a
    /// model rambling past its turn.
    pub early_stop_patterns: Vec<String>,
    /// When a response doesn't parse as either a final answer or an
    /// action, feed an error observation back and let the model retry
    /// rather than failing the whole invocation immediately.
    pub handle_parsing_errors: bool,
}

impl Default for ReactConfig {
    fn default() -> Self {
        Self {
            system_prompt: String::new(),
            default_model: None,
            max_tokens: 4096,
            max_steps: 10,
            early_stop_patterns: Vec::new(),
            handle_parsing_errors: true,
        }
    }
}

fn extract_thought(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let boundary = lines.iter().position(|line| {
        let trimmed = line.trim_start();
        trimmed.starts_with("Action:") || trimmed.starts_with("Final Answer:")
    });
    match boundary {
        Some(idx) => lines[..idx].join("\n").trim().to_string(),
        None => text.trim().to_string(),
    }
}

/// `early_stop_patterns` force a response to be read as final: if any
/// pattern appears in the text, the prefix before the first match becomes
/// the final answer (honoring a `Final Answer:` label inside that prefix
/// when present) instead of going through the action parser at all.
fn apply_early_stop(text: &str, patterns: &[String]) -> Option<ParsedOutput> {
    const FINAL_ANSWER_LABEL: &str = "Final Answer:";
    for pattern in patterns {
        if pattern.is_empty() {
            continue;
        }
        if let Some(idx) = text.find(pattern.as_str()) {
            let prefix = text[..idx].trim();
            let answer = match prefix.rfind(FINAL_ANSWER_LABEL) {
                Some(pos) => prefix[pos + FINAL_ANSWER_LABEL.len()..].trim(),
                None => prefix,
            };
            return Some(ParsedOutput::FinalAnswer { text: answer.to_string() });
        }
    }
    None
}

fn llm_error(e: ProviderError) -> AgentError {
    let kind = match &e {
        ProviderError::RateLimited => ErrorKind::LlmRateLimit,
        ProviderError::Timeout => ErrorKind::LlmTimeout,
        ProviderError::Request(_) => ErrorKind::LlmRequest,
        _ => ErrorKind::LlmResponse,
    };
    AgentError::llm(kind, e.to_string())
}

/// Turn a model-supplied action input into the declared [`Effect`] for one
/// of the [`EFFECT_TOOL_NAMES`]. `Err` carries a human-readable reason when
/// the input is missing fields the effect requires.
fn try_as_effect(tool_name: &str, action_input: &serde_json::Value, session: Option<&SessionId>) -> Result<Effect, String> {
    let obj = action_input
        .as_object()
        .ok_or_else(|| format!("{tool_name} requires a JSON object input"))?;
    let field = |name: &str| -> Result<String, String> {
        obj.get(name)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| format!("{tool_name} input missing required field \"{name}\""))
    };
    let default_scope = || session.cloned().map(Scope::Session).unwrap_or(Scope::Global);

    match tool_name {
        "write_memory" => {
            let key = field("key")?;
            let value = obj.get("value").cloned().unwrap_or(serde_json::Value::Null);
            Ok(Effect::WriteMemory { scope: default_scope(), key, value })
        }
        "delete_memory" => {
            let key = field("key")?;
            Ok(Effect::DeleteMemory { scope: default_scope(), key })
        }
        "delegate" => {
            let agent = field("agent")?;
            let task = field("task")?;
            Ok(Effect::Delegate { agent: AgentId::new(agent), input: Box::new(AgentInput::new(task)) })
        }
        "handoff" => {
            let agent = field("agent")?;
            let state = obj.get("state").cloned().unwrap_or(serde_json::Value::Null);
            Ok(Effect::Handoff { agent: AgentId::new(agent), state })
        }
        "signal" => {
            let target = field("target")?;
            let signal_type = field("signal_type")?;
            let data = obj.get("data").cloned().unwrap_or(serde_json::Value::Null);
            Ok(Effect::Signal { target: WorkflowId::new(target), payload: SignalPayload::new(signal_type, data) })
        }
        other => Err(format!("unrecognized effect tool: {other}")),
    }
}

/// Model + tools + memory in a bounded Thought/Action/Observation cycle.
/// Generic over [`Provider`] so callers choose the backend;
/// `ReactAgent<P>` itself implements the object-safe [`Runnable`] boundary
/// that `Provider` deliberately doesn't.
pub struct ReactAgent<P: Provider> {
    provider: P,
    tools: ToolRegistry,
    config: ReactConfig,
    hooks: HookPipeline,
    store: Arc<dyn StateStore>,
}

impl<P: Provider> ReactAgent<P> {
    /// Build a new loop over the given provider, tool registry, and memory
    /// store. Starts with an empty hook pipeline; chain [`Self::with_hook`]
    /// to register intervention hooks.
    pub fn new(provider: P, tools: ToolRegistry, config: ReactConfig, store: Arc<dyn StateStore>) -> Self {
        Self { provider, tools, config, hooks: HookPipeline::new(), store }
    }

    /// Register an intervention hook at the end of the pipeline.
    pub fn with_hook(mut self, hook: Arc<dyn Hook>) -> Self {
        self.hooks.add(hook);
        self
    }

    fn known_tool_names(&self) -> Vec<&str> {
        let mut names = self.tools.names();
        names.extend_from_slice(EFFECT_TOOL_NAMES);
        names
    }

    fn tool_catalog(&self) -> String {
        if self.tools.is_empty() {
            return String::new();
        }
        let mut catalog = String::from("Available tools:\n");
        for tool in self.tools.iter() {
            catalog.push_str(&format!(
                "- {}: {} (input schema: {})\n",
                tool.name(),
                tool.description(),
                tool.input_schema()
            ));
        }
        catalog
    }

    fn system_prompt(&self) -> String {
        format!(
            "{}\n\n{}\nRespond with either:\n\
             Thought: <reasoning>\nAction: <tool name>\nAction Input: <JSON or text>\n\
             or:\n\
             Thought: <reasoning>\nFinal Answer: <answer>\n",
            self.config.system_prompt,
            self.tool_catalog(),
        )
    }

    async fn fire_hook(&self, ctx: &HookContext) -> HookAction {
        self.hooks.dispatch(ctx).await
    }

    fn halted_output(reason: &str, reasoning_steps: Vec<ReasoningStep>, tool_calls: Vec<ToolCall>, latency: DurationMs) -> AgentOutput {
        let mut output = AgentOutput::failed(format!("halted by hook: {reason}"));
        output.reasoning_steps = reasoning_steps;
        output.tool_calls = tool_calls;
        output.latency = latency;
        output.metadata = serde_json::json!({"exit_reason": "halted", "reason": reason});
        output
    }
}

#[async_trait]
impl<P: Provider> Runnable for ReactAgent<P> {
    type Input = AgentInput;
    type Output = AgentOutput;

    async fn invoke(&self, ctx: &RunContext, input: AgentInput) -> Result<AgentOutput, AgentError> {
        let start = Instant::now();
        let known_tools = self.known_tool_names();

        let mut messages = vec![ChatMessage::user(input.task.clone())];
        let mut reasoning_steps = Vec::new();
        let mut tool_calls = Vec::new();
        let mut effects = Vec::new();
        let mut total_usage = TokenUsage::default();
        let mut cost = Decimal::ZERO;

        let tool_state = Arc::new(AgentState::new());

        for step in 0..self.config.max_steps {
            let elapsed = DurationMs::from(start.elapsed());
            let mut hook_ctx = HookContext::new(HookPoint::PreInference);
            hook_ctx.tokens_used = total_usage.input_tokens + total_usage.output_tokens;
            hook_ctx.cost = cost;
            hook_ctx.steps_completed = step;
            hook_ctx.elapsed = elapsed;
            if let HookAction::Halt { reason } = self.fire_hook(&hook_ctx).await {
                return Ok(Self::halted_output(&reason, reasoning_steps, tool_calls, DurationMs::from(start.elapsed())));
            }

            let mut request = CompletionRequest::new(messages.clone())
                .with_system(self.system_prompt())
                .with_max_tokens(self.config.max_tokens);
            if let Some(model) = &self.config.default_model {
                request = request.with_model(model.clone());
            }

            let response = ctx
                .race("react_loop", "complete", self.provider.complete(request))
                .await?
                .map_err(llm_error)?;

            total_usage.input_tokens += response.usage.input_tokens;
            total_usage.output_tokens += response.usage.output_tokens;
            cost += response.cost.unwrap_or(Decimal::ZERO);

            let raw_text = response.content;

            let mut post_ctx = HookContext::new(HookPoint::PostInference);
            post_ctx.tokens_used = total_usage.input_tokens + total_usage.output_tokens;
            post_ctx.cost = cost;
            post_ctx.steps_completed = step;
            post_ctx.elapsed = DurationMs::from(start.elapsed());
            post_ctx.model_output = Some(Content::text(raw_text.clone()));
            if let HookAction::Halt { reason } = self.fire_hook(&post_ctx).await {
                return Ok(Self::halted_output(&reason, reasoning_steps, tool_calls, DurationMs::from(start.elapsed())));
            }

            let parsed = match apply_early_stop(&raw_text, &self.config.early_stop_patterns) {
                Some(forced) => forced,
                None => parse_react_output(&raw_text, &known_tools),
            };

            match parsed {
                ParsedOutput::FinalAnswer { text } => {
                    reasoning_steps.push(ReasoningStep::thought(step, text.clone()));
                    let mut output = AgentOutput::success(serde_json::Value::String(text.clone()), text);
                    output.reasoning_steps = reasoning_steps;
                    output.tool_calls = tool_calls;
                    output.token_usage = Some(total_usage);
                    output.latency = DurationMs::from(start.elapsed());
                    output.metadata = serde_json::json!({"exit_reason": "final_answer", "steps": step + 1});
                    output.effects = effects;
                    return Ok(output);
                }

                ParsedOutput::Action { tool_name, action_input } => {
                    let thought = extract_thought(&raw_text);
                    let to_args = |value: &serde_json::Value| {
                        value.as_object().cloned().unwrap_or_else(|| {
                            let mut map = serde_json::Map::new();
                            map.insert("input".to_string(), value.clone());
                            map
                        })
                    };
                    let args = to_args(&action_input);

                    let mut pre_tool = HookContext::new(HookPoint::PreToolUse);
                    pre_tool.tool_name = Some(tool_name.clone());
                    pre_tool.tool_input = Some(action_input.clone());
                    pre_tool.tokens_used = total_usage.input_tokens + total_usage.output_tokens;
                    pre_tool.cost = cost;
                    pre_tool.steps_completed = step;
                    pre_tool.elapsed = DurationMs::from(start.elapsed());

                    let (observation, effective_input) = match self.fire_hook(&pre_tool).await {
                        HookAction::Halt { reason } => {
                            return Ok(Self::halted_output(&reason, reasoning_steps, tool_calls, DurationMs::from(start.elapsed())));
                        }
                        HookAction::SkipTool { reason } => {
                            let observation = format!("skipped by policy: {reason}");
                            tool_calls.push(ToolCall::failed(tool_name.clone(), args.clone(), &observation, DurationMs::ZERO));
                            (observation, None)
                        }
                        HookAction::ModifyToolInput { new_input } => (String::new(), Some(new_input)),
                        HookAction::Continue | HookAction::ModifyToolOutput { .. } => (String::new(), None),
                        _ => (String::new(), None),
                    };

                    let effective_action_input = effective_input.unwrap_or_else(|| action_input.clone());
                    let args = to_args(&effective_action_input);

                    let observation = if observation.is_empty() {
                        if EFFECT_TOOL_NAMES.contains(&tool_name.as_str()) {
                            match try_as_effect(&tool_name, &effective_action_input, input.session_id.as_ref()) {
                                Ok(effect) => {
                                    effects.push(effect);
                                    let result = serde_json::json!({"effect": "recorded"});
                                    tool_calls.push(ToolCall::success(tool_name.clone(), args.clone(), result, DurationMs::ZERO));
                                    "effect recorded".to_string()
                                }
                                Err(reason) => {
                                    tool_calls.push(ToolCall::failed(tool_name.clone(), args.clone(), &reason, DurationMs::ZERO));
                                    format!("error: {reason}")
                                }
                            }
                        } else {
                            match self.tools.get(&tool_name) {
                                Some(tool) => {
                                    let call_start = Instant::now();
                                    let runtime = ToolRuntime::new(
                                        format!("step-{step}"),
                                        Arc::clone(&tool_state),
                                        Arc::clone(&self.store),
                                        Arc::new(|_event| Ok(())),
                                        ctx.clone(),
                                    );
                                    let tool_input = ToolInput::new(args.clone()).with_runtime(runtime);
                                    let call_result = ctx.race("react_loop", "tool_call", tool.call(tool_input)).await?;
                                    let duration = DurationMs::from(call_start.elapsed());
                                    if call_result.success {
                                        tool_calls.push(ToolCall::success(tool_name.clone(), args.clone(), call_result.result.clone(), duration));
                                        call_result.result.to_string()
                                    } else {
                                        tool_calls.push(ToolCall::failed(tool_name.clone(), args.clone(), call_result.error.clone(), duration));
                                        format!("error: {}", call_result.error)
                                    }
                                }
                                None => {
                                    let reason = format!("tool not found: {tool_name}");
                                    tool_calls.push(ToolCall::failed(tool_name.clone(), args.clone(), &reason, DurationMs::ZERO));
                                    format!("error: {reason}")
                                }
                            }
                        }
                    } else {
                        observation
                    };

                    let observation = {
                        let mut post_tool = HookContext::new(HookPoint::PostToolUse);
                        post_tool.tool_name = Some(tool_name.clone());
                        post_tool.tool_result = Some(observation.clone());
                        post_tool.tokens_used = total_usage.input_tokens + total_usage.output_tokens;
                        post_tool.cost = cost;
                        post_tool.steps_completed = step;
                        post_tool.elapsed = DurationMs::from(start.elapsed());
                        match self.fire_hook(&post_tool).await {
                            HookAction::Halt { reason } => {
                                return Ok(Self::halted_output(&reason, reasoning_steps, tool_calls, DurationMs::from(start.elapsed())));
                            }
                            HookAction::ModifyToolOutput { new_output } => new_output.to_string(),
                            _ => observation,
                        }
                    };

                    reasoning_steps.push(ReasoningStep::action(step, thought, tool_name, action_input, observation.clone()));
                    messages.push(ChatMessage::assistant(raw_text.clone()));
                    messages.push(ChatMessage::user(format!("Observation: {observation}")));
                }

                ParsedOutput::ParseError { reason, raw } => {
                    if self.config.handle_parsing_errors {
                        reasoning_steps.push(ReasoningStep::thought(step, extract_thought(&raw)));
                        messages.push(ChatMessage::assistant(raw_text.clone()));
                        messages.push(ChatMessage::user(format!(
                            "Observation: your response could not be parsed ({reason}). \
                             Respond with either \"Final Answer: ...\" or an \"Action:\"/\"Action Input:\" pair."
                        )));
                    } else {
                        reasoning_steps.push(ReasoningStep::thought(step, extract_thought(&raw)));
                        let mut output = AgentOutput::failed(format!("unparseable model output: {reason}"));
                        output.reasoning_steps = reasoning_steps;
                        output.tool_calls = tool_calls;
                        output.token_usage = Some(total_usage);
                        output.latency = DurationMs::from(start.elapsed());
                        output.metadata = serde_json::json!({"exit_reason": "parse_error", "reason": reason, "raw": raw});
                        return Ok(output);
                    }
                }
            }

            let mut exit_ctx = HookContext::new(HookPoint::ExitCheck);
            exit_ctx.tokens_used = total_usage.input_tokens + total_usage.output_tokens;
            exit_ctx.cost = cost;
            exit_ctx.steps_completed = step + 1;
            exit_ctx.elapsed = DurationMs::from(start.elapsed());
            if let HookAction::Halt { reason } = self.fire_hook(&exit_ctx).await {
                return Ok(Self::halted_output(&reason, reasoning_steps, tool_calls, DurationMs::from(start.elapsed())));
            }
        }

        let mut output = AgentOutput::partial(None, "step budget exhausted before a final answer");
        output.reasoning_steps = reasoning_steps;
        output.tool_calls = tool_calls;
        output.token_usage = Some(total_usage);
        output.latency = DurationMs::from(start.elapsed());
        output.metadata = serde_json::json!({"exit_reason": "max_steps_reached", "steps": self.config.max_steps});
        output.effects = effects;
        Ok(output)
    }
}

/// Configuration for [`AgentExecutor`].
pub struct AgentExecutorConfig {
    /// Hard wall-clock budget for one invocation. `None` means no deadline
    /// beyond whatever the caller's [`RunContext`] already carries.
    pub max_execution_time: Option<Duration>,
    /// If `true`, a wrapped agent's error (or a deadline/cancellation) is
    /// propagated to the caller as `Err`. If `false` (the default), it's
    /// turned into a `Failed` [`AgentOutput`] so one agent's failure
    /// doesn't automatically fail whoever invoked the executor.
    pub propagate_errors: bool,
    /// Attach `reasoning_steps` to `metadata.intermediate_steps` on the
    /// returned output.
    pub return_intermediate_steps: bool,
}

impl Default for AgentExecutorConfig {
    fn default() -> Self {
        Self { max_execution_time: None, propagate_errors: false, return_intermediate_steps: false }
    }
}

/// Wraps any [`agentkit_core::Agent`] with memory injection, an execution
/// deadline, and failure isolation. The wrapped agent stays unaware of
/// persistence or timeouts — those are this type's job.
pub struct AgentExecutor<A: agentkit_core::Agent> {
    agent: A,
    store: Arc<dyn StateStore>,
    memory: Option<Arc<dyn Memory>>,
    config: AgentExecutorConfig,
    callbacks: CallbackManager,
}

impl<A: agentkit_core::Agent> AgentExecutor<A> {
    /// Wrap `agent`, reading/writing session state through `store`.
    pub fn new(agent: A, store: Arc<dyn StateStore>) -> Self {
        Self {
            agent,
            store,
            memory: None,
            config: AgentExecutorConfig::default(),
            callbacks: CallbackManager::default(),
        }
    }

    /// Attach conversation memory. With this set, invocations carrying a
    /// `session_id` get the session's prior turns injected into
    /// `context.history`, and each successful exchange (task + answer) is
    /// appended back after the run.
    pub fn with_memory(mut self, memory: Arc<dyn Memory>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Replace the default configuration.
    pub fn with_config(mut self, config: AgentExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a lifecycle observer. Every invocation dispatches
    /// `OnStart`/`OnEnd`/`OnError` to every registered callback; a callback
    /// failing or timing out never affects the agent's own result.
    pub fn with_callback(mut self, callback: Arc<dyn Callback>) -> Self {
        self.callbacks.register(callback);
        self
    }

    /// Convenience entry point: run a task and return its result as a
    /// string, falling back to the output message when the result isn't a
    /// JSON string.
    pub async fn run(&self, task: impl Into<String>) -> Result<String, AgentError> {
        let output = self.invoke(&RunContext::new(), AgentInput::new(task)).await?;
        Ok(match &output.result {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => output.message,
        })
    }

    async fn load_memory(&self, session: &SessionId) -> serde_json::Map<String, serde_json::Value> {
        let namespace = Scope::Session(session.clone()).namespace();
        let mut memory = serde_json::Map::new();
        let Ok(keys) = self.store.list(&namespace).await else { return memory };
        for key in keys {
            if let Ok(Some(value)) = self.store.get(&namespace, &key).await {
                memory.insert(key, value);
            }
        }
        memory
    }
}

#[async_trait]
impl<A: agentkit_core::Agent> Runnable for AgentExecutor<A> {
    type Input = AgentInput;
    type Output = AgentOutput;

    async fn invoke(&self, ctx: &RunContext, mut input: AgentInput) -> Result<AgentOutput, AgentError> {
        let start = Instant::now();
        let run_id = format!("{}-{}", input.session_id.as_ref().map(|s| s.to_string()).unwrap_or_else(|| "run".to_string()), DurationMs::now().as_millis());

        let _ = self
            .callbacks
            .dispatch(&CallbackEvent::OnStart { run_id: run_id.clone(), input: serde_json::Value::String(input.task.clone()) })
            .await;

        if let Some(session) = input.session_id.clone() {
            let memory = self.load_memory(&session).await;
            if !memory.is_empty() {
                input.context.insert("memory".to_string(), serde_json::Value::Object(memory));
            }
            if let Some(conversation) = &self.memory {
                match conversation.history(&session, None).await {
                    Ok(history) if !history.is_empty() => {
                        let turns = serde_json::to_value(&history).unwrap_or(serde_json::Value::Null);
                        input.context.insert("history".to_string(), turns);
                    }
                    Ok(_) => {}
                    Err(err) => tracing::warn!(error = %err, "failed to load session history"),
                }
            }
        }

        let child_ctx = match self.config.max_execution_time {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx.clone(),
        };

        let raced = child_ctx.race("agent_executor", "invoke", self.agent.invoke(&child_ctx, input.clone())).await;
        let mut output = match raced {
            Err(ctx_err) => {
                let _ = self
                    .callbacks
                    .dispatch(&CallbackEvent::OnError { run_id: run_id.clone(), error: ctx_err.message.clone() })
                    .await;
                if self.config.propagate_errors {
                    return Err(ctx_err);
                }
                AgentOutput::failed(ctx_err.message.clone())
                    .with_metadata(serde_json::json!({"error_kind": ctx_err.kind.to_string()}))
            }
            Ok(Err(agent_err)) => {
                let _ = self
                    .callbacks
                    .dispatch(&CallbackEvent::OnError { run_id: run_id.clone(), error: agent_err.message.clone() })
                    .await;
                if self.config.propagate_errors {
                    return Err(agent_err);
                }
                AgentOutput::failed(agent_err.message.clone())
                    .with_metadata(serde_json::json!({"error_kind": agent_err.kind.to_string()}))
            }
            Ok(Ok(out)) => out,
        };

        output.latency = DurationMs::from(start.elapsed());

        let _ = self
            .callbacks
            .dispatch(&CallbackEvent::OnEnd {
                run_id: run_id.clone(),
                output: output.result.clone().unwrap_or(serde_json::Value::Null),
                duration: output.latency,
            })
            .await;

        if let Some(session) = &input.session_id {
            if let Some(result) = &output.result {
                let namespace = Scope::Session(session.clone()).namespace();
                let _ = self.store.put(&namespace, "last_output", result.clone()).await;

                if let Some(conversation) = &self.memory {
                    let answer = match result {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    if let Err(err) = conversation.append(session, MemoryEntry::new("user", input.task.clone())).await {
                        tracing::warn!(error = %err, "failed to record user turn");
                    } else if let Err(err) = conversation.append(session, MemoryEntry::new("assistant", answer)).await {
                        tracing::warn!(error = %err, "failed to record assistant turn");
                    }
                }
            }
        }

        if self.config.return_intermediate_steps {
            let mut meta = match std::mem::take(&mut output.metadata) {
                serde_json::Value::Object(map) => map,
                _ => serde_json::Map::new(),
            };
            meta.insert(
                "intermediate_steps".to_string(),
                serde_json::to_value(&output.reasoning_steps).unwrap_or(serde_json::Value::Null),
            );
            output.metadata = serde_json::Value::Object(meta);
        }

        Ok(output)
    }

    async fn stream(&self, ctx: &RunContext, input: AgentInput) -> tokio::sync::mpsc::Receiver<StreamChunk<AgentOutput>> {
        let (tx, rx) = tokio::sync::mpsc::channel(DEFAULT_STREAM_BUFFER);
        match self.invoke(ctx, input).await {
            Ok(output) => {
                for step in &output.reasoning_steps {
                    let mut partial = AgentOutput::partial(None, step.thought.clone());
                    partial.reasoning_steps = vec![step.clone()];
                    if tx.send(StreamChunk::data(partial)).await.is_err() {
                        return rx;
                    }
                }
                let _ = tx.send(StreamChunk::done(output)).await;
            }
            Err(e) => {
                let _ = tx.send(StreamChunk::err(e)).await;
            }
        }
        rx
    }
}
