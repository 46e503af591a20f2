//! Background expiry sweeper: an owned task started at construction and
//! cancelled at teardown, rather than a global event bus every cache
//! shares.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::prefix_cache::PrefixCache;

/// Owns the sweeper's background task. Dropping or calling `shutdown` stops
/// it; the sweeper never outlives the cache that spawned it.
pub struct Sweeper {
    cancel: CancellationToken,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl Sweeper {
    pub fn spawn(cache: Arc<PrefixCache>, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let child = cancel.child_token();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                tokio::select! {
                    _ = child.cancelled() => {
                        debug!("cache sweeper shutting down");
                        return;
                    }
                    _ = ticker.tick() => {
                        cache.sweep_expired();
                    }
                }
            }
        });
        Self {
            cancel,
            handle: Some(handle),
        }
    }

    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::prefix_cache::CacheConfig;

    #[tokio::test]
    async fn sweeper_removes_expired_entries() {
        let cache = Arc::new(PrefixCache::new(CacheConfig {
            default_ttl: Duration::from_millis(20),
            ..CacheConfig::default()
        }));
        cache.put("ls");
        let sweeper = Sweeper::spawn(cache.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(cache.bucket_count(), 0);
        sweeper.shutdown().await;
    }
}
