//! RPC client: lazy connect, single persistent connection reused across
//! calls, reconnect on any error, per-call deadline. Every failure kind
//! collapses to an empty `SuggestionResponse` — the client never returns
//! an error to its caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, BufReader, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::dto::{SuggestionRequest, SuggestionResponse};
use crate::error::{PredictorError, Result};
use crate::transport::{self, read_frame, write_frame, RpcId, RpcRequest, RpcResponse};

struct Connection<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
}

/// Reusable RPC client bound to one endpoint. `S` is the concrete duplex
/// stream type (normally `interprocess`'s tokio `Stream`); generic so tests
/// can swap in an in-memory duplex pipe.
pub struct RpcClient<S> {
    endpoint_name: String,
    connect_timeout: Duration,
    call_timeout: Duration,
    conn: Mutex<Option<Connection<S>>>,
    next_id: AtomicU64,
}

impl<S> RpcClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(endpoint_name: impl Into<String>, connect_timeout: Duration, call_timeout: Duration) -> Self {
        Self {
            endpoint_name: endpoint_name.into(),
            connect_timeout,
            call_timeout,
            conn: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Per-call deadline = `min(TIMEOUT_MS, caller-supplied)`. Never
    /// returns `Err`: every failure kind is converted to a fallback
    /// `SuggestionResponse` here.
    pub async fn call(
        &self,
        request: SuggestionRequest,
        cancel: &CancellationToken,
    ) -> SuggestionResponse
    where
        S: Connectable,
    {
        let outcome = tokio::select! {
            res = self.do_call(&request) => res,
            _ = tokio::time::sleep(self.call_timeout) => Err(PredictorError::RequestTimedOut(self.call_timeout)),
            _ = cancel.cancelled() => Err(PredictorError::RequestCancelled),
        };

        match outcome {
            Ok(response) => response,
            Err(PredictorError::RequestCancelled) => SuggestionResponse::cancelled(),
            Err(err) => {
                warn!(error = %err, "rpc call failed, tearing down connection");
                self.reset().await;
                SuggestionResponse::empty_fallback(err.to_string())
            }
        }
    }

    async fn do_call(&self, request: &SuggestionRequest) -> Result<SuggestionResponse>
    where
        S: Connectable,
    {
        self.ensure_connected().await?;
        let id = RpcId::Number(self.next_id.fetch_add(1, Ordering::Relaxed));
        let params = serde_json::to_value(request)
            .map_err(|e| PredictorError::InvalidRequest(e.to_string()))?;
        let rpc_request = RpcRequest::new(id.clone(), "get_suggestions", params);

        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(PredictorError::ConnectionUnavailable(
            "no connection".to_string(),
        ))?;

        write_frame(&mut conn.writer, &rpc_request).await?;
        let response: RpcResponse = read_frame(&mut conn.reader)
            .await?
            .ok_or(PredictorError::PeerDisconnected)?;
        drop(guard);

        match response.error {
            Some(e) => Err(PredictorError::InvalidRequest(e.message)),
            None => {
                let result: Value = response.result.unwrap_or(Value::Null);
                serde_json::from_value(result)
                    .map_err(|e| PredictorError::MalformedFrame(e.to_string()))
            }
        }
    }

    async fn ensure_connected(&self) -> Result<()>
    where
        S: Connectable,
    {
        let mut guard = self.conn.lock().await;
        if guard.is_some() {
            return Ok(());
        }
        let stream = S::connect(&self.endpoint_name, self.connect_timeout).await?;
        let (read_half, writer) = tokio::io::split(stream);
        *guard = Some(Connection {
            reader: BufReader::new(read_half),
            writer,
        });
        Ok(())
    }

    /// Idempotent: tearing down an already-empty connection is a no-op.
    pub async fn reset(&self) {
        let mut guard = self.conn.lock().await;
        *guard = None;
    }

    pub async fn dispose(&self) {
        self.reset().await;
    }
}

/// Indirection so the client can be constructed against either the real
/// `interprocess` stream or an in-memory duplex pipe in tests, without the
/// client itself knowing how to dial an endpoint.
#[async_trait::async_trait]
pub trait Connectable: Sized {
    async fn connect(endpoint_name: &str, timeout: Duration) -> Result<Self>;
}

#[async_trait::async_trait]
impl Connectable for interprocess::local_socket::tokio::Stream {
    async fn connect(endpoint_name: &str, timeout: Duration) -> Result<Self> {
        transport::connect(endpoint_name, timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::DuplexStream;

    #[async_trait::async_trait]
    impl Connectable for DuplexStream {
        async fn connect(_endpoint_name: &str, _timeout: Duration) -> Result<Self> {
            // Tests wire up the duplex pair directly; connect() is never
            // called through this path.
            Err(PredictorError::ConnectionUnavailable(
                "test stream is pre-wired".to_string(),
            ))
        }
    }

    fn request(input: &str) -> SuggestionRequest {
        SuggestionRequest {
            user_input: input.to_string(),
            working_dir: "/tmp".to_string(),
            max_suggestions: 5,
        }
    }

    #[tokio::test]
    async fn call_without_connection_falls_back_to_empty() {
        let client: RpcClient<DuplexStream> =
            RpcClient::new("test.endpoint", Duration::from_millis(50), Duration::from_millis(50));
        let cancel = CancellationToken::new();
        let response = client.call(request("git"), &cancel).await;
        assert!(response.suggestions.is_empty());
        assert_eq!(response.source, crate::dto::Source::Fallback);
    }

    #[tokio::test]
    async fn deadline_is_respected_when_server_never_responds() {
        // Wire up a real duplex pair so `do_call` gets past `ensure_connected`
        // and blocks on `read_frame` — the peer half is held open but never
        // writes anything back.
        let (client_half, _server_half) = tokio::io::duplex(256);
        let (read_half, write_half) = tokio::io::split(client_half);
        let client: RpcClient<DuplexStream> = RpcClient::new(
            "test.endpoint",
            Duration::from_millis(10),
            Duration::from_millis(15),
        );
        *client.conn.lock().await = Some(Connection {
            reader: BufReader::new(read_half),
            writer: write_half,
        });

        let cancel = CancellationToken::new();
        let started = std::time::Instant::now();
        let response = client.call(request("git"), &cancel).await;
        assert!(started.elapsed() < Duration::from_millis(200));
        assert!(response.suggestions.is_empty());
        assert_eq!(response.source, crate::dto::Source::Fallback);
    }

    #[tokio::test]
    async fn cancellation_yields_cancelled_source() {
        let client: RpcClient<DuplexStream> =
            RpcClient::new("test.endpoint", Duration::from_millis(50), Duration::from_secs(5));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let response = client.call(request("git"), &cancel).await;
        assert_eq!(response.source, crate::dto::Source::Cancelled);
    }
}
