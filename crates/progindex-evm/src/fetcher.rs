//! EVM log fetcher.
//!
//! One `eth_getLogs` exchange per window, scoped to the ArbWasm precompile
//! and the `ProgramActivated` topic. Failures are never retried here.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use progindex_core::error::IndexerError;
use progindex_core::types::{BlockNumber, Chain, ChainId, DeploymentRecord, RangeRequest};
use progindex_rpc::{HttpClientConfig, HttpRpcClient, RpcTransport, TransportError};

use crate::decoder::{self, ARBWASM_ADDRESS, PROGRAM_ACTIVATED_TOPIC};
use crate::prober;

/// A raw EVM log as returned by `eth_getLogs`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    #[serde(rename = "blockNumber")]
    pub block_number: String,
    #[serde(rename = "blockHash")]
    pub block_hash: String,
    #[serde(rename = "transactionHash")]
    pub transaction_hash: String,
    #[serde(rename = "logIndex", default)]
    pub log_index: Option<String>,
}

/// Where the pipeline gets heights and activations from.
///
/// [`RpcActivationSource`] talks JSON-RPC; tests script their own.
#[async_trait]
pub trait ActivationSource: Send + Sync {
    /// Height used as the chain's pagination ceiling for this run.
    async fn block_height(&self, chain: &Chain) -> Result<BlockNumber, IndexerError>;

    /// Every activation in the request's window.
    async fn activations(&self, req: &RangeRequest) -> Result<Vec<DeploymentRecord>, IndexerError>;
}

/// The `eth_getLogs` filter object for `[from, until]`.
pub fn logs_filter(from: BlockNumber, until: BlockNumber) -> Value {
    json!({
        "fromBlock": decoder::to_quantity(from),
        "toBlock": decoder::to_quantity(until),
        "topics": [PROGRAM_ACTIVATED_TOPIC],
        "address": ARBWASM_ADDRESS,
    })
}

/// Map a transport failure onto the pipeline's error taxonomy: error
/// envelopes are protocol errors, everything else is a transport error.
pub(crate) fn rpc_error(chain_id: ChainId, e: TransportError) -> IndexerError {
    if e.is_execution_error() {
        IndexerError::Protocol {
            chain_id,
            reason: e.to_string(),
        }
    } else {
        IndexerError::Rpc(format!("chain {chain_id}: {e}"))
    }
}

/// Fetch the raw `ProgramActivated` logs in `[from, until]`.
pub async fn get_logs(
    transport: &dyn RpcTransport,
    chain_id: ChainId,
    from: BlockNumber,
    until: BlockNumber,
) -> Result<Vec<RawLog>, IndexerError> {
    let result = transport
        .call(1, "eth_getLogs", vec![logs_filter(from, until)])
        .await
        .map_err(|e| rpc_error(chain_id, e))?;
    if result.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(result)
        .map_err(|e| IndexerError::Rpc(format!("chain {chain_id}: malformed logs: {e}")))
}

/// Fetch and decode every activation in `[from, until]`.
pub async fn fetch_activations(
    transport: &dyn RpcTransport,
    chain_id: ChainId,
    from: BlockNumber,
    until: BlockNumber,
) -> Result<Vec<DeploymentRecord>, IndexerError> {
    let logs = get_logs(transport, chain_id, from, until).await?;
    logs.iter().map(|log| decoder::decode_log(chain_id, log)).collect()
}

/// JSON-RPC backed [`ActivationSource`]. Every endpoint shares one HTTP
/// connection pool.
#[derive(Debug, Clone)]
pub struct RpcActivationSource {
    http: reqwest::Client,
}

impl RpcActivationSource {
    pub fn new(config: &HttpClientConfig) -> Result<Self, IndexerError> {
        let http = config
            .build_client()
            .map_err(|e| IndexerError::Rpc(e.to_string()))?;
        Ok(Self { http })
    }

    fn client(&self, url: &str) -> HttpRpcClient {
        HttpRpcClient::with_client(url, self.http.clone())
    }
}

#[async_trait]
impl ActivationSource for RpcActivationSource {
    async fn block_height(&self, chain: &Chain) -> Result<BlockNumber, IndexerError> {
        prober::latest_height(&self.client(&chain.rpc), chain.chain_id).await
    }

    async fn activations(&self, req: &RangeRequest) -> Result<Vec<DeploymentRecord>, IndexerError> {
        fetch_activations(&self.client(&req.rpc), req.chain_id, req.from, req.until).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use progindex_rpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};

    use super::*;

    /// Replies to every request with a canned response and records requests.
    pub(crate) struct CannedTransport {
        reply: Result<JsonRpcResponse, String>,
        pub(crate) seen: Mutex<Vec<JsonRpcRequest>>,
    }

    impl CannedTransport {
        pub(crate) fn result(result: Value) -> Self {
            Self {
                reply: Ok(JsonRpcResponse::ok(1, result)),
                seen: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn rpc_error(code: i64, message: &str) -> Self {
            Self {
                reply: Ok(JsonRpcResponse {
                    id: Some(1),
                    result: None,
                    error: Some(JsonRpcError {
                        code,
                        message: message.into(),
                        data: None,
                    }),
                }),
                seen: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn unreachable() -> Self {
            Self {
                reply: Err("connection refused".into()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RpcTransport for CannedTransport {
        async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
            self.seen.lock().unwrap().push(req);
            self.reply.clone().map_err(TransportError::Http)
        }

        fn url(&self) -> &str {
            "canned://"
        }
    }

    fn activation_log(tx: &str) -> Value {
        let mut data = String::from("0x");
        data.push_str(&"aa".repeat(32));
        data.push_str(&format!("{:0>64}", "bb".repeat(20)));
        data.push_str(&format!("{:064x}", 123_456_789u64));
        data.push_str(&format!("{:064x}", 1u16));
        json!({
            "address": ARBWASM_ADDRESS,
            "topics": [PROGRAM_ACTIVATED_TOPIC, format!("0x{}", "cc".repeat(32))],
            "data": data,
            "blockNumber": "0x3e8",
            "blockHash": "0xbh",
            "transactionHash": tx,
            "logIndex": "0x0",
            "removed": false
        })
    }

    #[test]
    fn filter_uses_hex_bounds_topic_and_precompile() {
        let f = logs_filter(1000, 5500);
        assert_eq!(f["fromBlock"], "0x3e8");
        assert_eq!(f["toBlock"], "0x157c");
        assert_eq!(f["topics"][0], PROGRAM_ACTIVATED_TOPIC);
        assert_eq!(f["address"], ARBWASM_ADDRESS);
    }

    #[tokio::test]
    async fn fetch_decodes_every_log() {
        let transport =
            CannedTransport::result(json!([activation_log("0xt1"), activation_log("0xt2")]));
        let records = fetch_activations(&transport, 42161, 1000, 6000).await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].transaction_hash, "0xt1");
        assert_eq!(records[1].block_number, 1000);
        assert_eq!(records[1].data_fee, "123456789");

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method, "eth_getLogs");
        assert_eq!(seen[0].params[0]["toBlock"], "0x1770");
    }

    #[tokio::test]
    async fn empty_result_is_not_an_error() {
        let transport = CannedTransport::result(json!([]));
        assert!(fetch_activations(&transport, 1, 0, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn error_envelope_is_a_protocol_error() {
        let transport = CannedTransport::rpc_error(-32005, "block range too large");
        let err = fetch_activations(&transport, 7, 0, 10).await.unwrap_err();
        assert!(matches!(err, IndexerError::Protocol { chain_id: 7, .. }));
    }

    #[tokio::test]
    async fn transport_failure_is_an_rpc_error() {
        let transport = CannedTransport::unreachable();
        let err = fetch_activations(&transport, 7, 0, 10).await.unwrap_err();
        assert!(matches!(err, IndexerError::Rpc(_)));
    }

    #[tokio::test]
    async fn one_bad_log_fails_the_window() {
        let mut bad = activation_log("0xt2");
        bad["data"] = json!("0x00");
        let transport = CannedTransport::result(json!([activation_log("0xt1"), bad]));
        let err = fetch_activations(&transport, 1, 0, 10).await.unwrap_err();
        assert!(matches!(err, IndexerError::Decode(_)));
    }
}
