//! Plugin-side request orchestrator: synchronous facade with a hard
//! wall-clock deadline, degrading to a deterministic offline fallback. This
//! is the one place in the system allowed to catch-and-convert errors
//! instead of propagating them — its public API never raises.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::{Connectable, RpcClient};
use crate::dto::SuggestionRequest;

const WARM_QUEUE_CAPACITY: usize = 16;
const WARM_FRESHNESS_WINDOW: Duration = Duration::from_millis(250);

/// Deterministic offline fallback. Order matters: the first matching rule
/// wins, so `"Get-Process"` takes the `Get-` branch rather than the
/// `"process"` branch.
pub fn offline_fallback(user_input: &str) -> Vec<String> {
    let trimmed = user_input.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if trimmed.starts_with("Get-") {
        vec![
            format!("{trimmed} | Format-Table"),
            format!("{trimmed} | Select-Object -First 10"),
        ]
    } else if trimmed.to_lowercase().contains("process") {
        vec!["Get-Process | Sort-Object CPU -Descending".to_string()]
    } else if trimmed.to_lowercase().contains("docker") {
        vec!["docker ps -a".to_string()]
    } else {
        vec![format!("{trimmed} -?")]
    }
}

/// One fire-and-forget prefetch request, timestamped so the supervisor can
/// discard anything older than `WARM_FRESHNESS_WINDOW` before issuing it —
/// a bounded queue instead of an untracked task per keystroke.
struct WarmJob {
    request: SuggestionRequest,
    enqueued_at: tokio::time::Instant,
}

pub struct PluginOrchestrator<S> {
    client: Arc<RpcClient<S>>,
    deadline: Duration,
    warm_tx: mpsc::Sender<WarmJob>,
}

impl<S> PluginOrchestrator<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + Connectable + 'static,
{
    pub fn new(client: Arc<RpcClient<S>>, deadline: Duration) -> Self {
        let (warm_tx, mut warm_rx) = mpsc::channel::<WarmJob>(WARM_QUEUE_CAPACITY);
        let warm_client = client.clone();
        tokio::spawn(async move {
            while let Some(job) = warm_rx.recv().await {
                if job.enqueued_at.elapsed() > WARM_FRESHNESS_WINDOW {
                    debug!("discarding stale warm request");
                    continue;
                }
                let cancel = CancellationToken::new();
                let _ = warm_client.call(job.request, &cancel).await;
            }
        });
        Self {
            client,
            deadline,
            warm_tx,
        }
    }

    /// Never throws. Returns a possibly-empty suggestion list.
    pub async fn get_suggestions(&self, user_input: &str, working_dir: &str) -> Vec<String> {
        let trimmed = user_input.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }

        let request = SuggestionRequest {
            user_input: trimmed.to_string(),
            working_dir: working_dir.to_string(),
            max_suggestions: 5,
        };

        let cancel = CancellationToken::new();
        let response = tokio::time::timeout(self.deadline, self.client.call(request, &cancel))
            .await
            .unwrap_or_else(|_| crate::dto::SuggestionResponse::empty_fallback("orchestrator deadline"));

        if response.suggestions.is_empty() {
            offline_fallback(trimmed)
        } else {
            response.suggestions
        }
    }

    /// Fire-and-forget prefetch. Drops the job silently if the queue is
    /// full rather than blocking the keystroke that triggered it.
    pub fn warm(&self, user_input: &str, working_dir: &str) {
        let trimmed = user_input.trim();
        if trimmed.is_empty() {
            return;
        }
        let job = WarmJob {
            request: SuggestionRequest {
                user_input: trimmed.to_string(),
                working_dir: working_dir.to_string(),
                max_suggestions: 5,
            },
            enqueued_at: tokio::time::Instant::now(),
        };
        if self.warm_tx.try_send(job).is_err() {
            debug!("warm queue full, dropping prefetch request");
        }
    }
}
