//! progindex-rpc: JSON-RPC 2.0 transport for progindex.
//!
//! - [`RpcTransport`]: the async trait the fetcher and prober talk to
//! - [`JsonRpcRequest`] / [`JsonRpcResponse`]: wire types
//! - [`TransportError`]: structured error type
//! - [`HttpRpcClient`]: `reqwest`-backed implementation

pub mod error;
pub mod http;
pub mod request;
pub mod transport;

pub use error::TransportError;
pub use http::{HttpClientConfig, HttpRpcClient};
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use transport::RpcTransport;
