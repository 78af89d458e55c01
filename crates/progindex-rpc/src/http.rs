//! HTTP JSON-RPC client backed by `reqwest`.
//!
//! One POST per request, no retries: a failed exchange is reported to the
//! caller as-is.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::request::{JsonRpcRequest, JsonRpcResponse};
use crate::transport::RpcTransport;

/// Configuration for `HttpRpcClient`.
#[derive(Debug, Clone, Default)]
pub struct HttpClientConfig {
    /// Per-request timeout. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
}

impl HttpClientConfig {
    /// Build a `reqwest::Client` that can be shared by every endpoint.
    pub fn build_client(&self) -> Result<reqwest::Client, TransportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }
        builder
            .build()
            .map_err(|e| TransportError::Http(format!("build client: {e}")))
    }
}

/// HTTP JSON-RPC client for a single endpoint.
#[derive(Debug, Clone)]
pub struct HttpRpcClient {
    url: String,
    http: reqwest::Client,
}

impl HttpRpcClient {
    /// Create a new client for the given JSON-RPC endpoint URL.
    pub fn new(url: impl Into<String>, config: &HttpClientConfig) -> Result<Self, TransportError> {
        Ok(Self::with_client(url, config.build_client()?))
    }

    /// Create a client reusing an existing connection pool.
    pub fn with_client(url: impl Into<String>, http: reqwest::Client) -> Self {
        Self { url: url.into(), http }
    }
}

#[async_trait]
impl RpcTransport for HttpRpcClient {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        tracing::trace!(url = %self.url, method = %req.method, id = %req.id, "rpc request");

        let resp = self
            .http
            .post(&self.url)
            .json(&req)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| TransportError::Http(format!("read body: {e}")))?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(serde_json::from_slice::<JsonRpcResponse>(&body)?)
    }

    fn url(&self) -> &str {
        &self.url
    }
}
