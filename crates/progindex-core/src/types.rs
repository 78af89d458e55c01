//! Shared types for the ingestion pipeline.

use serde::{Deserialize, Serialize};

/// EVM chain identifier (EIP-155).
pub type ChainId = u64;

/// A block height. JSON-RPC quantities for every supported chain fit in 64 bits.
pub type BlockNumber = u64;

// ─── Chain ────────────────────────────────────────────────────────────────────

/// A chain descriptor loaded once from the chain table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    /// Human readable name (e.g. `"Arbitrum One"`).
    pub name: String,
    /// Display URL for the chain.
    pub website: String,
    /// JSON-RPC endpoint.
    pub rpc: String,
    /// Block to start from when no checkpoint has been stored yet.
    pub start_block: BlockNumber,
    /// EIP-155 chain id.
    pub chain_id: ChainId,
}

// ─── RangeRequest ─────────────────────────────────────────────────────────────

/// One window of blocks handed to exactly one worker.
///
/// `from` is inclusive; `until` becomes the chain's checkpoint once the
/// window has been committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeRequest {
    pub chain_id: ChainId,
    pub rpc: String,
    pub from: BlockNumber,
    pub until: BlockNumber,
}

// ─── CompletionSignal ─────────────────────────────────────────────────────────

/// Sent by a worker once a window is fully persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionSignal {
    pub chain_id: ChainId,
    /// The `until` bound of the committed window.
    pub until: BlockNumber,
}

// ─── DeploymentRecord ─────────────────────────────────────────────────────────

/// One decoded `ProgramActivated` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub chain_id: ChainId,
    pub block_number: BlockNumber,
    /// Block hash (`0x…`).
    pub block_hash: String,
    /// Transaction hash (`0x…`).
    pub transaction_hash: String,
    /// Activated program address, lowercase `0x…`.
    pub contract_address: String,
    /// Code hash from the indexed topic (`0x…`).
    pub code_hash: String,
    /// Module hash (`0x…`, 32 bytes).
    pub module_hash: String,
    /// Data fee in wei as base-10 text (`uint256`).
    pub data_fee: String,
    /// Stylus version.
    pub version: u16,
}

impl DeploymentRecord {
    /// The key the store deduplicates on.
    pub fn natural_key(&self) -> (ChainId, &str, &str) {
        (self.chain_id, &self.transaction_hash, &self.contract_address)
    }
}
