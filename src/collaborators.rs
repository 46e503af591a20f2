//! Narrow capability interface for the out-of-scope LLM/context
//! collaborator: a plain trait object rather than a dynamic/reflection-based
//! lookup.
//!
//! A real provider (prompt rendering, remote model invocation, shell
//! history scraping) is explicitly out of scope; only the seam is
//! implemented here, plus two deterministic stand-ins used for hermetic
//! bring-up and tests.

use async_trait::async_trait;

use crate::dto::SuggestionRequest;
use crate::error::Result;

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: &SuggestionRequest) -> Result<Vec<String>>;
}

/// Deterministic stand-in used for hermetic tests and first-run bring-up
/// before a real provider is wired in. Mirrors the orchestrator's offline
/// fallback heuristics so that behavior is predictable end to end.
pub struct StaticFallbackProvider;

#[async_trait]
impl CompletionProvider for StaticFallbackProvider {
    async fn complete(&self, request: &SuggestionRequest) -> Result<Vec<String>> {
        Ok(crate::orchestrator::offline_fallback(&request.user_input))
    }
}

/// Always returns nothing — used to exercise the facade's
/// `source = error` / empty-result paths without a real collaborator.
pub struct NullProvider;

#[async_trait]
impl CompletionProvider for NullProvider {
    async fn complete(&self, _request: &SuggestionRequest) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}
