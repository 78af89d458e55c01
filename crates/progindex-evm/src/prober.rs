//! Block height prober.
//!
//! Each chain's ceiling is probed once per run, concurrently, with
//! `eth_getBlockByNumber("latest", true)`. The height is the highest
//! `blockNumber` among the returned transactions.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::json;

use progindex_core::error::IndexerError;
use progindex_core::registry::ChainRegistry;
use progindex_core::types::{BlockNumber, ChainId};
use progindex_rpc::RpcTransport;

use crate::decoder::parse_quantity;
use crate::fetcher::{rpc_error, ActivationSource};

#[derive(Debug, Deserialize)]
struct LatestBlock {
    #[serde(default)]
    transactions: Vec<BlockTransaction>,
}

#[derive(Debug, Deserialize)]
struct BlockTransaction {
    #[serde(rename = "blockNumber")]
    block_number: Option<String>,
}

/// Probe the height of one chain.
pub async fn latest_height(
    transport: &dyn RpcTransport,
    chain_id: ChainId,
) -> Result<BlockNumber, IndexerError> {
    let result = transport
        .call(1, "eth_getBlockByNumber", vec![json!("latest"), json!(true)])
        .await
        .map_err(|e| rpc_error(chain_id, e))?;

    if result.is_null() {
        return Err(IndexerError::Protocol {
            chain_id,
            reason: "latest block is null".into(),
        });
    }

    let block: LatestBlock = serde_json::from_value(result)
        .map_err(|e| IndexerError::Rpc(format!("chain {chain_id}: malformed block: {e}")))?;

    let mut height = None;
    for tx in &block.transactions {
        if let Some(n) = &tx.block_number {
            let n = parse_quantity(n)?;
            height = Some(height.map_or(n, |h: BlockNumber| h.max(n)));
        }
    }

    height.ok_or_else(|| IndexerError::Protocol {
        chain_id,
        reason: "latest block has no transactions".into(),
    })
}

/// Probe every registered chain concurrently and gather the heights.
///
/// The first failure fails the whole probe.
pub async fn probe_heights(
    source: &dyn ActivationSource,
    registry: &ChainRegistry,
) -> Result<HashMap<ChainId, BlockNumber>, IndexerError> {
    let probes = registry.chains().iter().map(|chain| async move {
        let height = source.block_height(chain).await?;
        tracing::info!(chain_id = chain.chain_id, chain = %chain.name, height, "height probed");
        Ok::<_, IndexerError>((chain.chain_id, height))
    });
    let heights = futures::future::try_join_all(probes).await?;
    Ok(heights.into_iter().collect())
}
