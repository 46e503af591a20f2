//! Service facade: implements the RPC surface by consulting the cache and,
//! on a miss, the out-of-scope completion collaborator.

use std::sync::Arc;
use std::time::Instant;

use tracing::warn;

use crate::cache::PrefixCache;
use crate::collaborators::CompletionProvider;
use crate::dto::{ServiceStatus, Source, SuggestionRequest, SuggestionResponse};

pub struct ServiceFacade {
    cache: Arc<PrefixCache>,
    provider: Arc<dyn CompletionProvider>,
    max_returned: usize,
    started_at: Instant,
}

impl ServiceFacade {
    pub fn new(cache: Arc<PrefixCache>, provider: Arc<dyn CompletionProvider>, max_returned: usize) -> Self {
        Self {
            cache,
            provider,
            max_returned,
            started_at: Instant::now(),
        }
    }

    /// Hot path: should resolve in low single-digit milliseconds when
    /// served from cache. Cache hit first; on miss, consult the
    /// collaborator and backfill the cache with whatever it returns.
    pub async fn get_suggestions(&self, request: SuggestionRequest) -> SuggestionResponse {
        let cap = request.max_suggestions.min(self.max_returned);

        let cached = self.cache.get(&request.user_input);
        if !cached.is_empty() {
            return SuggestionResponse {
                suggestions: cached.into_iter().take(cap).collect(),
                source: Source::Cache,
                confidence: 1.0,
                warning: None,
            };
        }

        match self.provider.complete(&request).await {
            Ok(suggestions) => {
                for suggestion in &suggestions {
                    self.cache.put(suggestion);
                }
                SuggestionResponse {
                    suggestions: suggestions.into_iter().take(cap).collect(),
                    source: Source::Llm,
                    confidence: if cap > 0 { 0.5 } else { 0.0 },
                    warning: None,
                }
            }
            Err(err) => {
                warn!(error = %err, "completion provider failed");
                SuggestionResponse {
                    suggestions: Vec::new(),
                    source: Source::Error,
                    confidence: 0.0,
                    warning: Some(err.to_string()),
                }
            }
        }
    }

    pub fn ping(&self) -> bool {
        true
    }

    pub fn get_status(&self) -> ServiceStatus {
        ServiceStatus {
            is_running: true,
            uptime_seconds: self.started_at.elapsed().as_secs(),
        }
    }

    /// Fire-and-forget pre-warm: insert a completion into the cache
    /// without returning it to the caller.
    pub async fn trigger_cache_refresh(&self, request: SuggestionRequest) {
        if let Ok(suggestions) = self.provider.complete(&request).await {
            for suggestion in suggestions {
                self.cache.put(&suggestion);
            }
        }
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{NullProvider, StaticFallbackProvider};
    use crate::cache::CacheConfig;

    fn request(input: &str) -> SuggestionRequest {
        SuggestionRequest {
            user_input: input.to_string(),
            working_dir: "/tmp".to_string(),
            max_suggestions: 5,
        }
    }

    #[tokio::test]
    async fn cache_hit_short_circuits_the_collaborator() {
        let cache = Arc::new(PrefixCache::new(CacheConfig::default()));
        cache.put("git status");
        let facade = ServiceFacade::new(cache, Arc::new(NullProvider), 5);

        let response = facade.get_suggestions(request("git")).await;
        assert_eq!(response.source, Source::Cache);
        assert_eq!(response.suggestions, vec!["git status".to_string()]);
    }

    #[tokio::test]
    async fn miss_consults_collaborator_and_backfills_cache() {
        let cache = Arc::new(PrefixCache::new(CacheConfig::default()));
        let facade = ServiceFacade::new(cache.clone(), Arc::new(StaticFallbackProvider), 5);

        let response = facade.get_suggestions(request("Get-Service")).await;
        assert_eq!(response.source, Source::Llm);
        assert!(!response.suggestions.is_empty());

        // Backfilled: a second identical query is now served from cache.
        let second = facade.get_suggestions(request("Get-Service")).await;
        assert_eq!(second.source, Source::Cache);
    }

    #[tokio::test]
    async fn ping_and_status_report_liveness() {
        let cache = Arc::new(PrefixCache::new(CacheConfig::default()));
        let facade = ServiceFacade::new(cache, Arc::new(NullProvider), 5);
        assert!(facade.ping());
        assert!(facade.get_status().is_running);
    }

    #[tokio::test]
    async fn clear_cache_empties_the_bucket_store() {
        let cache = Arc::new(PrefixCache::new(CacheConfig::default()));
        cache.put("git status");
        let facade = ServiceFacade::new(cache.clone(), Arc::new(NullProvider), 5);
        facade.clear_cache();
        assert_eq!(cache.bucket_count(), 0);
    }
}
