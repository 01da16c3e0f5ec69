//! Test doubles for the protocol traits.
//!
//! Available behind the `test-utils` feature flag. These are minimal
//! implementations that prove the trait APIs are usable without a real
//! model, tool, or store behind them.

mod echo_agent;
mod in_memory_store;
mod local_orchestrator;
mod logging_hook;

pub use echo_agent::EchoAgent;
pub use in_memory_store::InMemoryStore;
pub use local_orchestrator::LocalOrchestrator;
pub use logging_hook::{LoggingHook, RecordedEvent};
