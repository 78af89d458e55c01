//! Transport-level error types.

use thiserror::Error;

use crate::request::JsonRpcError;

/// Errors that can occur during an RPC exchange.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connection refused, reset, TLS, ...).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The node answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// JSON-RPC protocol-level error returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// Response body could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
}

impl TransportError {
    /// Returns `true` if the node itself reported the error in the JSON-RPC
    /// envelope, as opposed to the exchange failing.
    pub fn is_execution_error(&self) -> bool {
        matches!(self, Self::Rpc(_))
    }
}
