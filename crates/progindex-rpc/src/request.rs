//! JSON-RPC 2.0 wire types.
//!
//! Requests are only ever written and responses only ever read, so each side
//! derives just the direction it needs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSON-RPC 2.0 request with a numeric id.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub method: String,
    pub params: Vec<Value>,
    pub id: u64,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
            params,
            id,
        }
    }
}

/// The error object of a failed call.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// A JSON-RPC 2.0 response.
///
/// `id` is `None` when the node could not attribute the reply to a request
/// (it answers parse errors with `"id": null`).
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// A successful response carrying `result`.
    pub fn ok(id: u64, result: Value) -> Self {
        Self {
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    /// Unwrap the result value or return the error envelope.
    ///
    /// A missing `result` without an error is returned as `Value::Null`.
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        if let Some(err) = self.error {
            Err(err)
        } else {
            Ok(self.result.unwrap_or(Value::Null))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn request_serialization() {
        let req = JsonRpcRequest::new(1, "eth_getLogs", vec![json!({"fromBlock": "0x1"})]);
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(
            body,
            json!({
                "jsonrpc": "2.0",
                "method": "eth_getLogs",
                "params": [{"fromBlock": "0x1"}],
                "id": 1
            })
        );
    }

    #[test]
    fn response_into_result_ok() {
        let resp = JsonRpcResponse::ok(1, Value::String("0x12345".into()));
        assert_eq!(resp.into_result().unwrap(), Value::String("0x12345".into()));
    }

    #[test]
    fn response_error_envelope() {
        let raw = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32005,"message":"too many results"}}"#;
        let resp: JsonRpcResponse = serde_json::from_str(raw).unwrap();
        let err = resp.into_result().unwrap_err();
        assert_eq!(err.code, -32005);
        assert_eq!(err.message, "too many results");
    }

    #[test]
    fn response_with_null_id() {
        let raw = r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32700,"message":"parse error"}}"#;
        let resp: JsonRpcResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.id, None);
        assert!(resp.into_result().is_err());
    }

    #[test]
    fn response_tolerates_missing_fields() {
        let resp: JsonRpcResponse = serde_json::from_str(r#"{"result":[]}"#).unwrap();
        assert_eq!(resp.id, None);
        assert_eq!(resp.into_result().unwrap(), Value::Array(vec![]));
    }
}
