//! Error types for the ingestion pipeline.

use thiserror::Error;

use crate::types::{BlockNumber, ChainId};

/// Errors that can occur while ingesting program activations.
///
/// Every variant is fatal for the run. Resumption relies on the checkpoint
/// left by the last successful commit, not on in-process retries.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Protocol error for chain {chain_id}: {reason}")]
    Protocol { chain_id: ChainId, reason: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("No ceiling probed for chain {chain_id}")]
    MissingCeiling { chain_id: ChainId },

    #[error("Unexpected completion for chain {chain_id} at block {until}")]
    UnexpectedCompletion { chain_id: ChainId, until: BlockNumber },

    #[error("Pipeline aborted: {reason}")]
    Aborted { reason: String },
}

impl IndexerError {
    /// Returns `true` if the error came from the persistent store.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns `true` if the error came from talking to a chain's RPC node.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Rpc(_) | Self::Protocol { .. })
    }
}
