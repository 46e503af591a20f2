//! Local duplex byte stream: a named pipe on Windows, a Unix domain socket
//! everywhere else, both restricted to the owning user. `interprocess`'s
//! `tokio`-feature API gives us an `AsyncRead + AsyncWrite` stream that
//! plugs directly into the line-delimited reader in `framing.rs`.

use std::time::Duration;

use interprocess::local_socket::{
    tokio::{prelude::*, Listener, Stream},
    GenericNamespaced, ListenerOptions, ToNsName,
};
#[cfg(unix)]
use interprocess::os::unix::local_socket::ListenerOptionsExt;

use crate::error::{PredictorError, Result};

/// Resolve a logical endpoint name (e.g.
/// `LLMEmpoweredCommandPredictor.SuggestionService`) to the OS-specific
/// namespaced socket name `interprocess` expects.
fn ns_name(endpoint_name: &str) -> Result<interprocess::local_socket::Name<'static>> {
    endpoint_name
        .to_ns_name::<GenericNamespaced>()
        .map_err(|e| PredictorError::Config(format!("invalid endpoint name: {e}")))
}

/// Server-side acceptor. Only one simultaneous client is supported — the
/// caller is responsible for not calling `accept` again until the previous
/// connection's `Stream` is dropped.
pub struct PipeListener {
    inner: Listener,
}

impl PipeListener {
    pub fn bind(endpoint_name: &str) -> Result<Self> {
        let name = ns_name(endpoint_name)?;
        let mut opts = ListenerOptions::new().name(name);
        #[cfg(unix)]
        {
            // Owner read/write/execute only. Left unset, the socket would
            // fall back to the process umask, which can be looser than
            // this service wants to rely on.
            opts = opts.mode(0o600);
        }
        let inner = opts
            .create_tokio()
            .map_err(|e| PredictorError::ConnectionUnavailable(e.to_string()))?;
        Ok(Self { inner })
    }

    pub async fn accept(&self) -> Result<Stream> {
        self.inner
            .accept()
            .await
            .map_err(|e| PredictorError::ConnectionUnavailable(e.to_string()))
    }
}

/// Client-side connect with a bounded deadline.
pub async fn connect(endpoint_name: &str, connect_timeout: Duration) -> Result<Stream> {
    let name = ns_name(endpoint_name)?;
    tokio::time::timeout(connect_timeout, Stream::connect(name))
        .await
        .map_err(|_| PredictorError::RequestTimedOut(connect_timeout))?
        .map_err(|e| PredictorError::ConnectionUnavailable(e.to_string()))
}
