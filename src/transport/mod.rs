//! Bidirectional JSON-RPC transport over a local duplex byte stream.

mod framing;
mod pipe;

pub use framing::{error_codes, read_frame, write_frame, RpcError, RpcId, RpcRequest, RpcResponse};
pub use pipe::{connect, PipeListener};
