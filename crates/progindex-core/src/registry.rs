//! The chain registry, loaded once from a tab-separated table.
//!
//! Columns: `name`, `website`, `rpc`, `start block` (base 10), `chain id`.
//! The first row is a header and is skipped.

use std::collections::HashSet;
use std::path::Path;

use crate::error::IndexerError;
use crate::types::{Chain, ChainId};

const COLUMNS: usize = 5;

/// Immutable set of chains to ingest, built once at startup and passed by
/// reference to the prober, coordinator and worker pool.
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    chains: Vec<Chain>,
}

impl ChainRegistry {
    /// Build a registry, rejecting duplicate chain ids.
    pub fn new(chains: Vec<Chain>) -> Result<Self, IndexerError> {
        let mut seen = HashSet::with_capacity(chains.len());
        for chain in &chains {
            if !seen.insert(chain.chain_id) {
                return Err(IndexerError::Config(format!(
                    "duplicate chain id {} ({})",
                    chain.chain_id, chain.name
                )));
            }
        }
        Ok(Self { chains })
    }

    /// Parse the tab-separated chain table.
    pub fn from_tsv(data: &str) -> Result<Self, IndexerError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .from_reader(data.as_bytes());

        let mut chains = Vec::new();
        for (i, record) in reader.records().enumerate() {
            // +2: one for the header, one for 1-based line numbers
            let line = i + 2;
            let record =
                record.map_err(|e| IndexerError::Config(format!("chains line {line}: {e}")))?;
            if record.len() < COLUMNS {
                return Err(IndexerError::Config(format!(
                    "chains line {line}: expected {COLUMNS} columns, got {}",
                    record.len()
                )));
            }
            let start_block = record[3].trim().parse().map_err(|e| {
                IndexerError::Config(format!(
                    "chains line {line}: start block {:?}: {e}",
                    &record[3]
                ))
            })?;
            let chain_id = record[4].trim().parse().map_err(|e| {
                IndexerError::Config(format!("chains line {line}: chain id {:?}: {e}", &record[4]))
            })?;
            chains.push(Chain {
                name: record[0].to_string(),
                website: record[1].to_string(),
                rpc: record[2].to_string(),
                start_block,
                chain_id,
            });
        }
        tracing::debug!(chains = chains.len(), "chain table parsed");
        Self::new(chains)
    }

    /// Read and parse a chain table from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, IndexerError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .map_err(|e| IndexerError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_tsv(&data)
    }

    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    pub fn get(&self, chain_id: ChainId) -> Option<&Chain> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}
