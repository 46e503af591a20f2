//! RPC server loop: a single-connection-at-a-time acceptor. State machine
//! `Idle -> Listening -> Connected -> Serving -> Disconnected -> Idle` —
//! spawn a read loop, tear it down cleanly on EOF or error, and let the
//! outer loop reopen a fresh endpoint instance.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::facade::ServiceFacade;
use crate::transport::{error_codes, read_frame, write_frame, PipeListener, RpcRequest, RpcResponse};

const BACKOFF_ON_ERROR: Duration = Duration::from_secs(1);

/// Runs the accept loop until `cancel` fires. Returns once the listener has
/// been told to shut down; each connection is served to completion (or
/// disconnection) before the next `accept` is issued, enforcing the
/// single-client policy.
pub async fn run(
    endpoint_name: &str,
    facade: Arc<ServiceFacade>,
    cancel: CancellationToken,
) -> crate::error::Result<()> {
    info!(endpoint = endpoint_name, "server listening");
    loop {
        if cancel.is_cancelled() {
            return Ok(());
        }

        let listener = match PipeListener::bind(endpoint_name) {
            Ok(listener) => listener,
            Err(err) => {
                error!(error = %err, "failed to bind endpoint, retrying");
                tokio::select! {
                    _ = tokio::time::sleep(BACKOFF_ON_ERROR) => continue,
                    _ = cancel.cancelled() => return Ok(()),
                }
            }
        };

        let stream = tokio::select! {
            accepted = listener.accept() => accepted,
            _ = cancel.cancelled() => return Ok(()),
        };

        match stream {
            Ok(stream) => {
                info!("client connected");
                serve_connection(stream, facade.clone(), cancel.clone()).await;
                info!("client disconnected");
            }
            Err(err) => {
                warn!(error = %err, "accept failed, backing off");
                tokio::select! {
                    _ = tokio::time::sleep(BACKOFF_ON_ERROR) => {}
                    _ = cancel.cancelled() => return Ok(()),
                }
            }
        }
    }
}

async fn serve_connection<S>(stream: S, facade: Arc<ServiceFacade>, cancel: CancellationToken)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut reader = BufReader::new(read_half);

    loop {
        let frame = tokio::select! {
            frame = read_frame::<_, RpcRequest>(&mut reader) => frame,
            _ = cancel.cancelled() => return,
        };

        let request = match frame {
            Ok(Some(request)) => request,
            Ok(None) => return, // peer disconnected cleanly
            Err(err) => {
                warn!(error = %err, "malformed frame, tearing down connection");
                return;
            }
        };

        let response = dispatch(&facade, &request).await;
        if let Err(err) = write_frame(&mut write_half, &response).await {
            warn!(error = %err, "write failed, tearing down connection");
            return;
        }
    }
}

async fn dispatch(facade: &ServiceFacade, request: &RpcRequest) -> RpcResponse {
    match request.method.as_str() {
        "get_suggestions" => match serde_json::from_value(request.params.clone()) {
            Ok(params) => {
                let response = facade.get_suggestions(params).await;
                RpcResponse::ok(request.id.clone(), serde_json::to_value(response).unwrap())
            }
            Err(err) => RpcResponse::err(
                request.id.clone(),
                error_codes::INVALID_PARAMS,
                format!("invalid SuggestionRequest: {err}"),
            ),
        },
        "ping" => RpcResponse::ok(request.id.clone(), Value::Bool(facade.ping())),
        "get_status" => {
            let status = facade.get_status();
            RpcResponse::ok(request.id.clone(), serde_json::to_value(status).unwrap())
        }
        "trigger_cache_refresh" => match serde_json::from_value(request.params.clone()) {
            Ok(params) => {
                facade.trigger_cache_refresh(params).await;
                RpcResponse::ok(request.id.clone(), Value::Null)
            }
            Err(err) => RpcResponse::err(
                request.id.clone(),
                error_codes::INVALID_PARAMS,
                format!("invalid SuggestionRequest: {err}"),
            ),
        },
        "clear_cache" => {
            facade.clear_cache();
            RpcResponse::ok(request.id.clone(), Value::Null)
        }
        other => RpcResponse::err(
            request.id.clone(),
            error_codes::METHOD_NOT_FOUND,
            format!("unknown method '{other}'"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, PrefixCache};
    use crate::collaborators::NullProvider;
    use crate::dto::SuggestionRequest;
    use crate::transport::{RpcId, RpcRequest};

    fn facade() -> Arc<ServiceFacade> {
        let cache = Arc::new(PrefixCache::new(CacheConfig::default()));
        cache.put("git status");
        Arc::new(ServiceFacade::new(cache, Arc::new(NullProvider), 5))
    }

    #[tokio::test]
    async fn dispatch_get_suggestions_hits_cache() {
        let facade = facade();
        let params = serde_json::to_value(SuggestionRequest {
            user_input: "git".to_string(),
            working_dir: "/tmp".to_string(),
            max_suggestions: 5,
        })
        .unwrap();
        let request = RpcRequest::new(RpcId::Number(1), "get_suggestions", params);
        let response = dispatch(&facade, &request).await;
        assert!(response.error.is_none());
        let body: crate::dto::SuggestionResponse =
            serde_json::from_value(response.result.unwrap()).unwrap();
        assert_eq!(body.suggestions, vec!["git status".to_string()]);
    }

    #[tokio::test]
    async fn dispatch_unknown_method_returns_method_not_found() {
        let facade = facade();
        let request = RpcRequest::new(RpcId::Number(1), "not_a_method", Value::Null);
        let response = dispatch(&facade, &request).await;
        let error = response.error.expect("expected an error response");
        assert_eq!(error.code, error_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn dispatch_ping_returns_true() {
        let facade = facade();
        let request = RpcRequest::new(RpcId::Number(1), "ping", Value::Null);
        let response = dispatch(&facade, &request).await;
        assert_eq!(response.result, Some(Value::Bool(true)));
    }

    #[tokio::test]
    async fn serve_connection_round_trips_over_an_in_memory_duplex_pipe() {
        let facade = facade();
        let (client_half, server_half) = tokio::io::duplex(4096);
        let cancel = CancellationToken::new();

        let server_cancel = cancel.clone();
        let server_task = tokio::spawn(serve_connection(server_half, facade, server_cancel));

        let (client_read, mut client_write) = tokio::io::split(client_half);
        let mut client_reader = BufReader::new(client_read);

        let params = serde_json::to_value(SuggestionRequest {
            user_input: "git".to_string(),
            working_dir: "/tmp".to_string(),
            max_suggestions: 5,
        })
        .unwrap();
        let request = RpcRequest::new(RpcId::Number(1), "get_suggestions", params);
        write_frame(&mut client_write, &request).await.unwrap();

        let response: RpcResponse = read_frame(&mut client_reader).await.unwrap().unwrap();
        let body: crate::dto::SuggestionResponse =
            serde_json::from_value(response.result.unwrap()).unwrap();
        assert_eq!(body.suggestions, vec!["git status".to_string()]);

        cancel.cancel();
        drop(client_write);
        let _ = server_task.await;
    }
}
