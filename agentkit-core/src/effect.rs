//! Effect system — side-effects declared by an agent for the calling layer
//! to execute.

use crate::id::*;
use crate::runnable::AgentInput;
use serde::{Deserialize, Serialize};

/// A side-effect declared by an agent invocation. NOT executed by the agent
/// itself — the calling layer (agent executor, supervisor, test harness)
/// decides when and how to execute it.
///
/// This is the key composability mechanism: an agent running in-process has
/// its effects executed by a simple loop; an agent running under a durable
/// workflow engine has its effects serialized into workflow history; an
/// agent under test has its effects captured for assertions. The agent
/// itself never differs.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    /// Write a value to persistent state.
    WriteMemory {
        /// The scope to write into.
        scope: Scope,
        /// The key to write.
        key: String,
        /// The value to store.
        value: serde_json::Value,
    },

    /// Delete a value from persistent state.
    DeleteMemory {
        /// The scope to delete from.
        scope: Scope,
        /// The key to delete.
        key: String,
    },

    /// Send a fire-and-forget signal to another agent or workflow.
    Signal {
        /// The target workflow to signal.
        target: WorkflowId,
        /// The signal payload.
        payload: SignalPayload,
    },

    /// Request that the supervisor dispatch another agent. This is how
    /// delegation works — the agent doesn't call the other agent directly,
    /// it asks the calling layer to do it.
    Delegate {
        /// The agent to delegate to.
        agent: AgentId,
        /// The input to send to the delegated agent.
        input: Box<AgentInput>,
    },

    /// Hand off the conversation to another agent. Unlike `Delegate`, the
    /// current invocation is done — the next agent takes over.
    Handoff {
        /// The agent to hand off to.
        agent: AgentId,
        /// State to pass to the next agent. Not the full conversation —
        /// whatever the current agent thinks the next agent needs.
        state: serde_json::Value,
    },

    /// Emit a log/trace event for observers and telemetry to consume.
    Log {
        /// Severity level.
        level: LogLevel,
        /// Log message.
        message: String,
        /// Optional structured data.
        data: Option<serde_json::Value>,
    },

    /// Future effect types. Named string + arbitrary payload, for
    /// domain-specific effects that aren't general enough for a named
    /// variant yet.
    Custom {
        /// The custom effect type identifier.
        effect_type: String,
        /// Arbitrary payload.
        data: serde_json::Value,
    },
}

/// Where state lives. Scopes are hierarchical — a session scope is
/// narrower than a workflow scope, which is narrower than global.
///
/// `Scope` is the vocabulary `Effect`s and callers speak; [`Scope::namespace`]
/// lowers it to the ordered string tuple the [`crate::state::StateStore`]
/// trait actually keys on.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Per-conversation.
    Session(SessionId),
    /// Per-workflow-execution.
    Workflow(WorkflowId),
    /// Per-agent within a workflow.
    Agent {
        /// The workflow this agent belongs to.
        workflow: WorkflowId,
        /// The agent within the workflow.
        agent: AgentId,
    },
    /// Shared across all workflows.
    Global,
    /// Future scopes.
    Custom(String),
}

impl Scope {
    /// Lower this scope to the ordered namespace segments a `StateStore`
    /// keys on.
    pub fn namespace(&self) -> Vec<String> {
        match self {
            Scope::Session(id) => vec!["session".to_string(), id.to_string()],
            Scope::Workflow(id) => vec!["workflow".to_string(), id.to_string()],
            Scope::Agent { workflow, agent } => {
                vec!["workflow".to_string(), workflow.to_string(), "agent".to_string(), agent.to_string()]
            }
            Scope::Global => vec!["global".to_string()],
            Scope::Custom(s) => vec!["custom".to_string(), s.clone()],
        }
    }
}

/// Payload for inter-agent/workflow signals.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalPayload {
    /// The type of signal being sent.
    pub signal_type: String,
    /// Signal data.
    pub data: serde_json::Value,
}

impl SignalPayload {
    /// Create a new signal payload.
    pub fn new(signal_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self { signal_type: signal_type.into(), data }
    }
}

/// Log severity levels.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Finest-grained tracing.
    Trace,
    /// Debug-level detail.
    Debug,
    /// Informational messages.
    Info,
    /// Warnings.
    Warn,
    /// Errors.
    Error,
}
