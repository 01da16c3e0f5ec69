//! The [`Provider`] trait agents call through.
//!
//! `Provider` uses RPITIT (return-position `impl Trait` in traits) and is
//! intentionally NOT object-safe. The object-safe boundary is
//! `agentkit_core::Runnable` — `agentkit-react`'s `ReactAgent<P: Provider>`
//! implements `Runnable` and is what gets type-erased, not `Provider`.

use crate::types::{ChatMessage, Completion, CompletionRequest};
use std::future::Future;
use thiserror::Error;

/// LLM boundary failures, classified by how a caller should react.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider signaled a rate limit.
    #[error("rate limited")]
    RateLimited,

    /// The call exceeded its deadline.
    #[error("timed out")]
    Timeout,

    /// The request could not be constructed or sent (network, transport).
    #[error("request failed: {0}")]
    Request(String),

    /// The provider responded, but the response was unusable.
    #[error("unusable response: {0}")]
    Response(String),

    /// Anything the other kinds don't cover.
    #[error("{0}")]
    Unknown(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ProviderError {
    /// Whether retrying this request might succeed: rate limits, timeouts,
    /// and transport failures are transient; an unusable response or an
    /// unclassified failure is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited | ProviderError::Timeout | ProviderError::Request(_)
        )
    }
}

/// An LLM backend: a [`CompletionRequest`] in, a [`Completion`] out.
///
/// Provider-native features (server-side truncation, caching, thinking
/// budgets) are the implementation's business, configured through
/// `CompletionRequest.extra`. Only `complete` is required; the other
/// methods have defaults that fit a stub or single-backend deployment.
pub trait Provider: Send + Sync {
    /// Send one completion request.
    fn complete(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<Completion, ProviderError>> + Send;

    /// Convenience: complete a bare message list with backend defaults for
    /// everything else.
    fn chat(
        &self,
        messages: Vec<ChatMessage>,
    ) -> impl Future<Output = Result<Completion, ProviderError>> + Send {
        async move { self.complete(CompletionRequest::new(messages)).await }
    }

    /// Stable tag naming the backend ("anthropic", "openai", "mock", …),
    /// for logs and per-provider metrics.
    fn provider(&self) -> &str {
        "unknown"
    }

    /// Whether the backend is currently usable (configured, reachable).
    /// Callers may skip or fail fast on an unavailable provider.
    fn is_available(&self) -> bool {
        true
    }
}
