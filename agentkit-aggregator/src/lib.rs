#![deny(missing_docs)]
//! Aggregator — combines per-task sub-agent outputs into the one
//! [`AgentOutput`] the supervisor hands back to its own caller.
//!
//! Aggregated outputs record provenance in metadata (`sources`,
//! `source_confidence`) rather than growing new top-level fields, so an
//! aggregated output and a plain agent output stay interchangeable.
//!
//! Confidence is a caller-supplied `f64` in `[0.0, 1.0]`; this crate doesn't
//! derive it. The unit interval is used throughout, matching
//! `AgentProfile::score` in `agentkit-router`.

use std::collections::HashMap;

use async_trait::async_trait;

use agentkit_core::{AgentError, AgentOutput, AgentStatus, DurationMs, RunContext, TaskId};

/// One sub-agent's contribution to an aggregation: its output plus the
/// bookkeeping the four strategies need (confidence, priority, completion
/// time) that `AgentOutput` itself doesn't carry.
#[derive(Debug, Clone)]
pub struct SourceResult {
    /// The task this result answers.
    pub task_id: TaskId,
    /// The sub-agent's raw output.
    pub output: AgentOutput,
    /// Confidence in `[0.0, 1.0]`.
    pub confidence: f64,
    /// The originating task's priority (Merge's weight, Hierarchical's
    /// default grouping key).
    pub priority: i32,
    /// When this result completed, for Best's earliest-completion tie-break.
    pub completed_at: DurationMs,
}

impl SourceResult {
    /// Construct a result with the given confidence and priority.
    pub fn new(task_id: TaskId, output: AgentOutput, confidence: f64, priority: i32) -> Self {
        let completed_at = output.timestamp;
        Self { task_id, output, confidence, priority, completed_at }
    }

    fn text(&self) -> String {
        match &self.output.result {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => self.output.message.clone(),
        }
    }

    fn succeeded(&self) -> bool {
        matches!(self.output.status, AgentStatus::Success | AgentStatus::Partial)
    }
}

/// Combines a set of [`SourceResult`]s into a single [`AgentOutput`].
#[async_trait]
pub trait Aggregator: Send + Sync {
    /// Aggregate `results` (may be empty) into one output.
    async fn aggregate(&self, ctx: &RunContext, results: &[SourceResult]) -> Result<AgentOutput, AgentError>;
}

fn sources_metadata(strategy: &str, sources: &[&SourceResult]) -> serde_json::Value {
    let ids: Vec<serde_json::Value> = sources.iter().map(|r| serde_json::Value::String(r.task_id.to_string())).collect();
    let mut confidence = serde_json::Map::new();
    for r in sources {
        confidence.insert(r.task_id.to_string(), serde_json::json!(r.confidence));
    }
    serde_json::json!({
        "strategy": strategy,
        "sources": ids,
        "source_confidence": confidence,
    })
}

/// Concatenates every successful result in task order; confidence is the
/// weighted mean of per-result confidences, weighted by task priority.
#[derive(Default)]
pub struct MergeAggregator;

#[async_trait]
impl Aggregator for MergeAggregator {
    async fn aggregate(&self, _ctx: &RunContext, results: &[SourceResult]) -> Result<AgentOutput, AgentError> {
        let successes: Vec<&SourceResult> = results.iter().filter(|r| r.succeeded()).collect();
        if successes.is_empty() {
            return Ok(AgentOutput::failed("no successful results to merge"));
        }

        let merged_text = successes.iter().map(|r| r.text()).collect::<Vec<_>>().join("\n\n");
        let confidence = weighted_mean_confidence(&successes);

        let mut output = AgentOutput::success(serde_json::Value::String(merged_text), format!("merged {} results", successes.len()));
        output.metadata = sources_metadata("merge", &successes);
        output.metadata["confidence"] = serde_json::json!(confidence);
        Ok(output)
    }
}

fn weighted_mean_confidence(results: &[&SourceResult]) -> f64 {
    let total_weight: f64 = results.iter().map(|r| r.priority.max(1) as f64).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }
    results.iter().map(|r| r.confidence * r.priority.max(1) as f64).sum::<f64>() / total_weight
}

/// Selects the single result with the highest confidence; ties broken by
/// earliest completion.
#[derive(Default)]
pub struct BestAggregator;

#[async_trait]
impl Aggregator for BestAggregator {
    async fn aggregate(&self, _ctx: &RunContext, results: &[SourceResult]) -> Result<AgentOutput, AgentError> {
        let best = results
            .iter()
            .filter(|r| r.succeeded())
            .max_by(|a, b| {
                a.confidence
                    .partial_cmp(&b.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| b.completed_at.as_millis().cmp(&a.completed_at.as_millis()))
            });

        let Some(best) = best else {
            return Ok(AgentOutput::failed("no successful results to select from"));
        };

        let mut output = AgentOutput::success(
            best.output.result.clone().unwrap_or_else(|| serde_json::Value::String(best.text())),
            best.output.message.clone(),
        );
        output.metadata = sources_metadata("best", &[best]);
        output.metadata["confidence"] = serde_json::json!(best.confidence);
        Ok(output)
    }
}

/// Groups semantically-equivalent results and picks the majority group,
/// falling back to the top-ranked group (by summed confidence) when no
/// group reaches a majority.
pub struct ConsensusAggregator {
    equivalent: Box<dyn Fn(&SourceResult, &SourceResult) -> bool + Send + Sync>,
}

impl Default for ConsensusAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsensusAggregator {
    /// Build a consensus aggregator using normalized string equality
    /// (trimmed, lowercased) as the equivalence predicate.
    pub fn new() -> Self {
        Self { equivalent: Box::new(|a, b| normalize(&a.text()) == normalize(&b.text())) }
    }

    /// Build a consensus aggregator using a caller-supplied equivalence
    /// predicate instead of string equality.
    pub fn with_equivalence(equivalent: impl Fn(&SourceResult, &SourceResult) -> bool + Send + Sync + 'static) -> Self {
        Self { equivalent: Box::new(equivalent) }
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_ascii_lowercase()
}

#[async_trait]
impl Aggregator for ConsensusAggregator {
    async fn aggregate(&self, _ctx: &RunContext, results: &[SourceResult]) -> Result<AgentOutput, AgentError> {
        let successes: Vec<&SourceResult> = results.iter().filter(|r| r.succeeded()).collect();
        if successes.is_empty() {
            return Ok(AgentOutput::failed("no successful results to reach consensus over"));
        }

        let mut groups: Vec<Vec<&SourceResult>> = Vec::new();
        for &result in &successes {
            match groups.iter_mut().find(|group| (self.equivalent)(group[0], result)) {
                Some(group) => group.push(result),
                None => groups.push(vec![result]),
            }
        }

        groups.sort_by(|a, b| {
            let score_a: f64 = a.iter().map(|r| r.confidence).sum();
            let score_b: f64 = b.iter().map(|r| r.confidence).sum();
            score_b.partial_cmp(&score_a).unwrap_or(std::cmp::Ordering::Equal)
        });

        let winner = &groups[0];
        let has_majority = winner.len() * 2 > successes.len();

        let mut output = AgentOutput::success(serde_json::Value::String(winner[0].text()), format!("consensus across {} of {} results", winner.len(), successes.len()));
        if !has_majority {
            output.status = AgentStatus::Partial;
        }
        output.metadata = sources_metadata("consensus", winner);
        output.metadata["confidence"] = serde_json::json!(weighted_mean_confidence(winner));
        output.metadata["has_majority"] = serde_json::json!(has_majority);
        Ok(output)
    }
}

/// Groups results by a caller-supplied key (defaulting to task priority),
/// merges within each group, then merges the group results together in
/// ascending key order.
pub struct HierarchicalAggregator {
    group_key: Box<dyn Fn(&SourceResult) -> String + Send + Sync>,
}

impl Default for HierarchicalAggregator {
    fn default() -> Self {
        Self::new(|r| r.priority.to_string())
    }
}

impl HierarchicalAggregator {
    /// Group by the result of `group_key`, merging within then across groups
    /// in ascending key order.
    pub fn new(group_key: impl Fn(&SourceResult) -> String + Send + Sync + 'static) -> Self {
        Self { group_key: Box::new(group_key) }
    }
}

#[async_trait]
impl Aggregator for HierarchicalAggregator {
    async fn aggregate(&self, ctx: &RunContext, results: &[SourceResult]) -> Result<AgentOutput, AgentError> {
        let successes: Vec<&SourceResult> = results.iter().filter(|r| r.succeeded()).collect();
        if successes.is_empty() {
            return Ok(AgentOutput::failed("no successful results to merge"));
        }

        let mut groups: HashMap<String, Vec<&SourceResult>> = HashMap::new();
        for &result in &successes {
            groups.entry((self.group_key)(result)).or_default().push(result);
        }

        let mut keys: Vec<String> = groups.keys().cloned().collect();
        keys.sort();

        let merger = MergeAggregator;
        let mut section_texts = Vec::with_capacity(keys.len());
        let mut total_confidence = 0.0;
        let mut total_weight = 0.0;

        for key in &keys {
            let members = groups.remove(key).unwrap_or_default();
            let owned: Vec<SourceResult> = members.into_iter().cloned().collect();
            let merged = merger.aggregate(ctx, &owned).await?;
            let weight = owned.iter().map(|r| r.priority.max(1) as f64).sum::<f64>();
            let confidence = merged.metadata.get("confidence").and_then(|v| v.as_f64()).unwrap_or(0.0);
            total_confidence += confidence * weight;
            total_weight += weight;
            let text = match &merged.result {
                Some(serde_json::Value::String(s)) => s.clone(),
                _ => merged.message.clone(),
            };
            section_texts.push(format!("[{key}]\n{text}"));
        }

        let combined_confidence = if total_weight > 0.0 { total_confidence / total_weight } else { 0.0 };
        let mut output = AgentOutput::success(
            serde_json::Value::String(section_texts.join("\n\n")),
            format!("merged {} groups across {} results", keys.len(), successes.len()),
        );
        output.metadata = sources_metadata("hierarchical", &successes);
        output.metadata["confidence"] = serde_json::json!(combined_confidence);
        output.metadata["groups"] = serde_json::json!(keys);
        Ok(output)
    }
}
