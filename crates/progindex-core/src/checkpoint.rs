//! Checkpoint persistence: the store trait every backend implements, and the
//! resume-point resolution done once at startup.
//!
//! A checkpoint is the last block up to which a chain's activations are known
//! to be committed. It is only ever written together with the records of the
//! window that advanced it (see [`IngestStore::commit`]).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::IndexerError;
use crate::registry::ChainRegistry;
use crate::types::{BlockNumber, ChainId, DeploymentRecord};

/// A deployment as read back from the store for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDeployment {
    /// Store-assigned row id.
    pub id: i64,
    pub inserted_at: DateTime<Utc>,
    #[serde(flatten)]
    pub record: DeploymentRecord,
}

/// Trait for the persistent store behind the pipeline.
///
/// Implementations include `InMemoryStore` and `PostgresStore`.
#[async_trait]
pub trait IngestStore: Send + Sync {
    /// Read every stored checkpoint.
    async fn load_checkpoints(&self) -> Result<HashMap<ChainId, BlockNumber>, IndexerError>;

    /// Atomically advance `chain_id`'s checkpoint to `until` and insert
    /// `records`. Either everything is visible afterwards or nothing is.
    /// A stored checkpoint is never lowered.
    async fn commit(
        &self,
        chain_id: ChainId,
        until: BlockNumber,
        records: &[DeploymentRecord],
    ) -> Result<(), IndexerError>;

    /// Read the deployments, deduplicated by
    /// `(chain id, transaction hash, contract address)`, oldest first.
    async fn unique_deployments(&self) -> Result<Vec<StoredDeployment>, IndexerError>;
}

/// Resolve the block each chain resumes from: the stored checkpoint if there
/// is one, else the chain's configured start block.
///
/// Checkpoints for chains missing from the registry are ignored.
pub fn resume_points(
    registry: &ChainRegistry,
    stored: &HashMap<ChainId, BlockNumber>,
) -> HashMap<ChainId, BlockNumber> {
    registry
        .chains()
        .iter()
        .map(|c| {
            let cursor = stored.get(&c.chain_id).copied().unwrap_or(c.start_block);
            (c.chain_id, cursor)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chain;

    fn chain(chain_id: ChainId, start_block: BlockNumber) -> Chain {
        Chain {
            name: format!("chain-{chain_id}"),
            website: String::new(),
            rpc: format!("http://rpc-{chain_id}"),
            start_block,
            chain_id,
        }
    }

    #[test]
    fn stored_checkpoint_wins_over_start_block() {
        let reg = ChainRegistry::new(vec![chain(1, 100), chain(2, 200)]).unwrap();
        let stored = HashMap::from([(2, 9_000)]);
        let cursors = resume_points(&reg, &stored);
        assert_eq!(cursors[&1], 100);
        assert_eq!(cursors[&2], 9_000);
    }

    #[test]
    fn unknown_chains_are_ignored() {
        let reg = ChainRegistry::new(vec![chain(1, 100)]).unwrap();
        let stored = HashMap::from([(99, 5)]);
        let cursors = resume_points(&reg, &stored);
        assert_eq!(cursors.len(), 1);
        assert!(!cursors.contains_key(&99));
    }
}
