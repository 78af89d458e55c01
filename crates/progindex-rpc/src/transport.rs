//! The `RpcTransport` trait: the seam between the pipeline and the network.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;
use crate::request::{JsonRpcRequest, JsonRpcResponse};

/// The async trait every RPC transport implements.
///
/// Object-safe: the pipeline holds transports as `&dyn RpcTransport`, and
/// tests substitute scripted implementations.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Send a single JSON-RPC request and return the response envelope.
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError>;

    /// Return the transport's endpoint URL.
    fn url(&self) -> &str;

    /// Call a method and return its `result`, turning an error envelope into
    /// [`TransportError::Rpc`].
    async fn call(
        &self,
        id: u64,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Value, TransportError> {
        let req = JsonRpcRequest::new(id, method, params);
        let resp = self.send(req).await?;
        resp.into_result().map_err(TransportError::Rpc)
    }
}
