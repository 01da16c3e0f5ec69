#![deny(missing_docs)]
//! Router family — picks a sub-agent for a sub-task.
//!
//! `agentkit_core::Dispatcher` reaches an agent once a caller has named
//! one; the routers here are the step before that, turning "some agent
//! should do this" into a name the dispatcher can be handed.
//!
//! Every strategy implements [`Router`]; none of them may return an agent
//! outside the `available_agents` slice they were called with, and all of
//! them fail fast rather than block when no agent qualifies.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use rand::seq::SliceRandom;

use agentkit_core::{AgentError, RunContext};
use agentkit_provider::{ChatMessage, CompletionRequest, Provider};

/// What a router picks among: an agent's name, the capability tags it
/// advertises, its concurrency capacity, and a caller-maintained performance
/// score in `[0.0, 1.0]` (`CapabilityRouter`'s tie-breaker; `LlmRouter` keeps
/// its own EMA score internally instead of reading this field).
#[derive(Debug, Clone)]
pub struct AgentProfile {
    /// Unique name within the catalog passed to `route`.
    pub name: String,
    /// Capability tags this agent advertises (matched by `CapabilityRouter`).
    pub capabilities: Vec<String>,
    /// Maximum concurrent in-flight tasks (`LoadBalancingRouter`).
    pub capacity: u32,
    /// Historical performance score, caller-maintained.
    pub score: f64,
}

impl AgentProfile {
    /// Construct a profile with default capacity (1) and score (0.5).
    pub fn new(name: impl Into<String>, capabilities: Vec<String>) -> Self {
        Self { name: name.into(), capabilities, capacity: 1, score: 0.5 }
    }

    /// Override capacity.
    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    /// Override score.
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }
}

/// A decision function from `(task, available agents)` to a chosen agent.
///
/// Implementations must never return a name absent from `available_agents`,
/// and must fail rather than block when none qualify — the one exception is
/// `LlmRouter`, which may wait on the LLM call it makes before falling back.
#[async_trait]
pub trait Router: Send + Sync {
    /// Pick one agent from `available_agents` for `task`.
    async fn route(&self, ctx: &RunContext, task: &str, available_agents: &[AgentProfile]) -> Result<String, AgentError>;
}

fn no_agent_available() -> AgentError {
    AgentError::agent_not_found("no agent available to route to")
}

/// Rule-based routing: an ordered `(predicate, agent_name, priority)` list.
/// The first matching rule (highest priority first) whose agent is present
/// in `available_agents` wins.
pub struct Rule {
    /// Returns whether this rule applies to `task`.
    pub predicate: Box<dyn Fn(&str) -> bool + Send + Sync>,
    /// The agent this rule routes to when it matches.
    pub agent_name: String,
    /// Higher priority rules are tried first.
    pub priority: i32,
}

/// Picks the first matching rule, by descending priority.
pub struct RuleBasedRouter {
    rules: Vec<Rule>,
}

impl RuleBasedRouter {
    /// Build a router from `rules`, sorting them by descending priority.
    pub fn new(mut rules: Vec<Rule>) -> Self {
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self { rules }
    }
}

#[async_trait]
impl Router for RuleBasedRouter {
    async fn route(&self, _ctx: &RunContext, task: &str, available_agents: &[AgentProfile]) -> Result<String, AgentError> {
        self.rules
            .iter()
            .find(|rule| (rule.predicate)(task) && available_agents.iter().any(|a| a.name == rule.agent_name))
            .map(|rule| rule.agent_name.clone())
            .ok_or_else(no_agent_available)
    }
}

/// Atomic counter mod N over `available_agents`, in slice order.
#[derive(Default)]
pub struct RoundRobinRouter {
    counter: AtomicUsize,
}

impl RoundRobinRouter {
    /// Create a router starting at index 0.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Router for RoundRobinRouter {
    async fn route(&self, _ctx: &RunContext, _task: &str, available_agents: &[AgentProfile]) -> Result<String, AgentError> {
        if available_agents.is_empty() {
            return Err(no_agent_available());
        }
        let idx = self.counter.fetch_add(1, Ordering::Relaxed) % available_agents.len();
        Ok(available_agents[idx].name.clone())
    }
}

/// Matches a fixed set of required capability tags against each agent's
/// advertised capabilities; among agents advertising all of them, picks the
/// highest `score`.
pub struct CapabilityRouter {
    required: Vec<String>,
}

impl CapabilityRouter {
    /// Route only to agents advertising every tag in `required`.
    pub fn new(required: Vec<String>) -> Self {
        Self { required }
    }
}

#[async_trait]
impl Router for CapabilityRouter {
    async fn route(&self, _ctx: &RunContext, _task: &str, available_agents: &[AgentProfile]) -> Result<String, AgentError> {
        available_agents
            .iter()
            .filter(|a| self.required.iter().all(|cap| a.capabilities.iter().any(|c| c == cap)))
            .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))
            .map(|a| a.name.clone())
            .ok_or_else(no_agent_available)
    }
}

/// Picks the agent with the lowest current in-flight count still under its
/// own capacity; fails when every agent is saturated.
///
/// `route` only picks — it doesn't itself track occupancy across calls,
/// since the caller (typically the Supervisor) owns the task's actual
/// lifetime. Call [`LoadBalancingRouter::acquire`] around the dispatched
/// work to have the count rise and fall with it; the returned guard
/// decrements on drop on every exit path, including panics.
#[derive(Default)]
pub struct LoadBalancingRouter {
    in_flight: Mutex<HashMap<String, u32>>,
}

impl LoadBalancingRouter {
    /// Create a router with every agent starting at zero in-flight.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a load slot for `agent`, incrementing its in-flight count.
    pub fn acquire(&self, agent: impl Into<String>) -> LoadGuard<'_> {
        let agent = agent.into();
        *self.in_flight.lock().unwrap().entry(agent.clone()).or_insert(0) += 1;
        LoadGuard { router: self, agent }
    }

    fn count_of(&self, name: &str) -> u32 {
        self.in_flight.lock().unwrap().get(name).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Router for LoadBalancingRouter {
    async fn route(&self, _ctx: &RunContext, _task: &str, available_agents: &[AgentProfile]) -> Result<String, AgentError> {
        available_agents
            .iter()
            .filter(|a| self.count_of(&a.name) < a.capacity.max(1))
            .min_by_key(|a| self.count_of(&a.name))
            .map(|a| a.name.clone())
            .ok_or_else(|| AgentError::agent_not_found("every agent is at capacity"))
    }
}

/// RAII load slot acquired from [`LoadBalancingRouter::acquire`]. Decrements
/// the agent's in-flight count when dropped.
pub struct LoadGuard<'a> {
    router: &'a LoadBalancingRouter,
    agent: String,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        if let Some(count) = self.router.in_flight.lock().unwrap().get_mut(&self.agent) {
            *count = count.saturating_sub(1);
        }
    }
}

/// Cryptographically-random selection among `available_agents`.
#[derive(Default)]
pub struct RandomRouter;

#[async_trait]
impl Router for RandomRouter {
    async fn route(&self, _ctx: &RunContext, _task: &str, available_agents: &[AgentProfile]) -> Result<String, AgentError> {
        available_agents.choose(&mut rand::thread_rng()).map(|a| a.name.clone()).ok_or_else(no_agent_available)
    }
}

/// Asks an LLM to pick an agent from a text catalog, falling back to another
/// strategy on LLM failure or an unparseable answer. Maintains an
/// exponential-moving-average success score per agent name, used only as a
/// tie-breaker when the model's answer matches more than one catalog entry
/// (e.g. one agent's name is a substring of another's).
pub struct LlmRouter<P: Provider> {
    provider: P,
    model: String,
    fallback: Box<dyn Router>,
    scores: Mutex<HashMap<String, f64>>,
    ema_alpha: f64,
}

impl<P: Provider> LlmRouter<P> {
    /// Build a router that asks `provider` (requesting `model`), falling
    /// back to `fallback` on any LLM failure.
    pub fn new(provider: P, model: impl Into<String>, fallback: Box<dyn Router>) -> Self {
        Self { provider, model: model.into(), fallback, scores: Mutex::new(HashMap::new()), ema_alpha: 0.3 }
    }

    /// Override the EMA smoothing factor (default 0.3).
    pub fn with_ema_alpha(mut self, ema_alpha: f64) -> Self {
        self.ema_alpha = ema_alpha;
        self
    }

    /// Record whether a previous routing decision to `agent_name` turned out
    /// well, updating its EMA score for future tie-breaks.
    pub fn record_outcome(&self, agent_name: &str, success: bool) {
        let sample = if success { 1.0 } else { 0.0 };
        let mut scores = self.scores.lock().unwrap();
        scores
            .entry(agent_name.to_string())
            .and_modify(|score| *score = self.ema_alpha * sample + (1.0 - self.ema_alpha) * *score)
            .or_insert(sample);
    }

    fn score_of(&self, name: &str) -> f64 {
        self.scores.lock().unwrap().get(name).copied().unwrap_or(0.5)
    }
}

#[async_trait]
impl<P: Provider> Router for LlmRouter<P> {
    async fn route(&self, ctx: &RunContext, task: &str, available_agents: &[AgentProfile]) -> Result<String, AgentError> {
        if available_agents.is_empty() {
            return Err(no_agent_available());
        }

        let catalog = available_agents
            .iter()
            .map(|a| format!("- {} (capabilities: {})", a.name, a.capabilities.join(", ")))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt =
            format!("Task: {task}\n\nAvailable agents:\n{catalog}\n\nReply with exactly one agent name from the list above, nothing else.");

        let request = CompletionRequest::new(vec![ChatMessage::user(prompt)])
            .with_model(self.model.clone())
            .with_system("You are a routing function. Answer with only the chosen agent's name.")
            .with_max_tokens(64)
            .with_temperature(0.0);

        let response = match ctx.race("llm_router", "route", self.provider.complete(request)).await {
            Ok(Ok(response)) => response,
            _ => return self.fallback.route(ctx, task, available_agents).await,
        };

        let answer = response.content;
        let mut matches: Vec<&AgentProfile> = available_agents.iter().filter(|a| answer.contains(a.name.as_str())).collect();
        if matches.is_empty() {
            return self.fallback.route(ctx, task, available_agents).await;
        }
        matches.sort_by(|a, b| self.score_of(&b.name).partial_cmp(&self.score_of(&a.name)).unwrap_or(std::cmp::Ordering::Equal));
        Ok(matches[0].name.clone())
    }
}

/// Runs N sub-routers and takes a majority vote among the agents they pick;
/// on a tie, falls back to the first sub-router's own choice.
pub struct HybridRouter {
    sub_routers: Vec<Box<dyn Router>>,
}

impl HybridRouter {
    /// Build a router over `sub_routers`, voted in the given order.
    pub fn new(sub_routers: Vec<Box<dyn Router>>) -> Self {
        Self { sub_routers }
    }
}

#[async_trait]
impl Router for HybridRouter {
    async fn route(&self, ctx: &RunContext, task: &str, available_agents: &[AgentProfile]) -> Result<String, AgentError> {
        if self.sub_routers.is_empty() {
            return Err(AgentError::invalid_config("hybrid_router", "no sub-routers configured"));
        }

        let mut votes = Vec::with_capacity(self.sub_routers.len());
        for router in &self.sub_routers {
            if let Ok(choice) = router.route(ctx, task, available_agents).await {
                votes.push(choice);
            }
        }
        let Some(first_vote) = votes.first().cloned() else {
            return Err(no_agent_available());
        };

        let mut tally: HashMap<&str, usize> = HashMap::new();
        for vote in &votes {
            *tally.entry(vote.as_str()).or_insert(0) += 1;
        }
        let max_count = *tally.values().max().unwrap_or(&0);
        let winners: Vec<&str> = tally.iter().filter(|(_, count)| **count == max_count).map(|(name, _)| *name).collect();

        if winners.len() == 1 {
            Ok(winners[0].to_string())
        } else {
            Ok(first_vote)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentkit_provider::{Completion, ProviderError};
    use std::sync::Mutex as StdMutex;

    fn profiles() -> Vec<AgentProfile> {
        vec![
            AgentProfile::new("alpha", vec!["search".to_string()]),
            AgentProfile::new("beta", vec!["math".to_string()]),
            AgentProfile::new("gamma", vec!["search".to_string(), "math".to_string()]),
        ]
    }

    #[tokio::test]
    async fn round_robin_cycles_through_available_agents_in_order() {
        let router = RoundRobinRouter::new();
        let ctx = RunContext::new();
        let first = router.route(&ctx, "t", &profiles()).await.unwrap();
        let second = router.route(&ctx, "t", &profiles()).await.unwrap();
        let third = router.route(&ctx, "t", &profiles()).await.unwrap();
        let fourth = router.route(&ctx, "t", &profiles()).await.unwrap();
        assert_eq!([first, second, third, fourth], ["alpha", "beta", "gamma", "alpha"]);
    }

    #[tokio::test]
    async fn round_robin_fails_on_an_empty_catalog() {
        let router = RoundRobinRouter::new();
        assert!(router.route(&RunContext::new(), "t", &[]).await.is_err());
    }

    #[tokio::test]
    async fn rule_based_picks_highest_priority_match() {
        let router = RuleBasedRouter::new(vec![
            Rule { predicate: Box::new(|t| t.contains("math")), agent_name: "beta".into(), priority: 1 },
            Rule { predicate: Box::new(|t| t.contains("math")), agent_name: "gamma".into(), priority: 5 },
        ]);
        let picked = router.route(&RunContext::new(), "solve this math problem", &profiles()).await.unwrap();
        assert_eq!(picked, "gamma");
    }

    #[tokio::test]
    async fn rule_based_skips_a_match_whose_agent_is_unavailable() {
        let router = RuleBasedRouter::new(vec![Rule {
            predicate: Box::new(|_| true),
            agent_name: "missing".into(),
            priority: 0,
        }]);
        assert!(router.route(&RunContext::new(), "t", &profiles()).await.is_err());
    }

    #[tokio::test]
    async fn capability_router_picks_highest_score_among_matches() {
        let agents = vec![
            AgentProfile::new("a", vec!["search".to_string()]).with_score(0.2),
            AgentProfile::new("b", vec!["search".to_string()]).with_score(0.9),
        ];
        let router = CapabilityRouter::new(vec!["search".to_string()]);
        assert_eq!(router.route(&RunContext::new(), "t", &agents).await.unwrap(), "b");
    }

    #[tokio::test]
    async fn capability_router_fails_when_no_agent_advertises_the_tag() {
        let router = CapabilityRouter::new(vec!["translation".to_string()]);
        assert!(router.route(&RunContext::new(), "t", &profiles()).await.is_err());
    }

    #[tokio::test]
    async fn load_balancing_picks_the_least_loaded_agent_under_capacity() {
        let agents = vec![AgentProfile::new("a", vec![]).with_capacity(2), AgentProfile::new("b", vec![]).with_capacity(2)];
        let router = LoadBalancingRouter::new();
        let _hold_a = router.acquire("a");
        let picked = router.route(&RunContext::new(), "t", &agents).await.unwrap();
        assert_eq!(picked, "b");
    }

    #[tokio::test]
    async fn load_balancing_fails_when_every_agent_is_saturated() {
        let agents = vec![AgentProfile::new("a", vec![]).with_capacity(1)];
        let router = LoadBalancingRouter::new();
        let _hold = router.acquire("a");
        assert!(router.route(&RunContext::new(), "t", &agents).await.is_err());
    }

    #[tokio::test]
    async fn load_guard_releases_capacity_on_drop() {
        let agents = vec![AgentProfile::new("a", vec![]).with_capacity(1)];
        let router = LoadBalancingRouter::new();
        {
            let _hold = router.acquire("a");
            assert!(router.route(&RunContext::new(), "t", &agents).await.is_err());
        }
        assert_eq!(router.route(&RunContext::new(), "t", &agents).await.unwrap(), "a");
    }

    #[tokio::test]
    async fn random_router_always_returns_a_member_of_the_catalog() {
        let router = RandomRouter;
        let agents = profiles();
        for _ in 0..20 {
            let picked = router.route(&RunContext::new(), "t", &agents).await.unwrap();
            assert!(agents.iter().any(|a| a.name == picked));
        }
    }

    struct FixedRouter(&'static str);

    #[async_trait]
    impl Router for FixedRouter {
        async fn route(&self, _ctx: &RunContext, _task: &str, _available_agents: &[AgentProfile]) -> Result<String, AgentError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingRouter;

    #[async_trait]
    impl Router for FailingRouter {
        async fn route(&self, _ctx: &RunContext, _task: &str, _available_agents: &[AgentProfile]) -> Result<String, AgentError> {
            Err(no_agent_available())
        }
    }

    #[tokio::test]
    async fn hybrid_router_takes_the_majority_vote() {
        let router = HybridRouter::new(vec![
            Box::new(FixedRouter("alpha")),
            Box::new(FixedRouter("alpha")),
            Box::new(FixedRouter("beta")),
        ]);
        assert_eq!(router.route(&RunContext::new(), "t", &profiles()).await.unwrap(), "alpha");
    }

    #[tokio::test]
    async fn hybrid_router_falls_back_to_the_first_sub_router_on_a_tie() {
        let router = HybridRouter::new(vec![Box::new(FixedRouter("alpha")), Box::new(FixedRouter("beta"))]);
        assert_eq!(router.route(&RunContext::new(), "t", &profiles()).await.unwrap(), "alpha");
    }

    #[tokio::test]
    async fn hybrid_router_ignores_sub_routers_that_fail() {
        let router = HybridRouter::new(vec![Box::new(FailingRouter), Box::new(FixedRouter("gamma"))]);
        assert_eq!(router.route(&RunContext::new(), "t", &profiles()).await.unwrap(), "gamma");
    }

    struct MockProvider {
        response: StdMutex<Option<String>>,
    }

    impl Provider for MockProvider {
        fn complete(&self, _request: CompletionRequest) -> impl std::future::Future<Output = Result<Completion, ProviderError>> + Send {
            let response = self.response.lock().unwrap().take();
            async move {
                match response {
                    Some(text) => Ok(Completion::text(text, "mock")),
                    None => Err(ProviderError::Request("no scripted response".to_string())),
                }
            }
        }

        fn provider(&self) -> &str {
            "mock"
        }
    }

    #[tokio::test]
    async fn llm_router_picks_the_agent_the_model_names() {
        let provider = MockProvider { response: StdMutex::new(Some("I'll use beta for this.".to_string())) };
        let router = LlmRouter::new(provider, "mock-model", Box::new(RoundRobinRouter::new()));
        assert_eq!(router.route(&RunContext::new(), "t", &profiles()).await.unwrap(), "beta");
    }

    #[tokio::test]
    async fn llm_router_falls_back_when_the_provider_errors() {
        let provider = MockProvider { response: StdMutex::new(None) };
        let router = LlmRouter::new(provider, "mock-model", Box::new(FixedRouter("gamma")));
        assert_eq!(router.route(&RunContext::new(), "t", &profiles()).await.unwrap(), "gamma");
    }

    #[tokio::test]
    async fn llm_router_falls_back_when_the_answer_names_no_known_agent() {
        let provider = MockProvider { response: StdMutex::new(Some("I recommend delta.".to_string())) };
        let router = LlmRouter::new(provider, "mock-model", Box::new(FixedRouter("gamma")));
        assert_eq!(router.route(&RunContext::new(), "t", &profiles()).await.unwrap(), "gamma");
    }

    #[tokio::test]
    async fn llm_router_tie_break_uses_the_higher_ema_score() {
        let provider = MockProvider { response: StdMutex::new(Some("alpha or gamma, either is fine".to_string())) };
        let router = LlmRouter::new(provider, "mock-model", Box::new(RoundRobinRouter::new()));
        router.record_outcome("gamma", true);
        router.record_outcome("alpha", false);
        assert_eq!(router.route(&RunContext::new(), "t", &profiles()).await.unwrap(), "gamma");
    }
}
