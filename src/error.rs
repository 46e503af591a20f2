//! Error taxonomy shared by the cache, transport, server, client, and
//! orchestrator. One variant per externally-observable failure kind; never
//! surfaced past the orchestrator boundary (see `orchestrator.rs`).

use thiserror::Error;

/// Library-wide error type. Library code returns `Result<T, PredictorError>`;
/// only the binary entrypoint and CLI subcommands use `anyhow`.
#[derive(Debug, Error)]
pub enum PredictorError {
    #[error("connection unavailable: {0}")]
    ConnectionUnavailable(String),

    #[error("request timed out after {0:?}")]
    RequestTimedOut(std::time::Duration),

    #[error("request cancelled")]
    RequestCancelled,

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("peer disconnected")]
    PeerDisconnected,

    #[error("internal cache error: {0}")]
    InternalCacheError(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, PredictorError>;
