//! Fluent builder API for creating an [`Ingestor`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use progindex_core::registry::ChainRegistry;
//! use progindex_evm::{IngestorBuilder, RpcActivationSource};
//! use progindex_rpc::HttpClientConfig;
//! use progindex_storage::InMemoryStore;
//!
//! # async fn run() -> Result<(), progindex_core::IndexerError> {
//! let registry = ChainRegistry::from_path("chains.tsv")?;
//! let ingestor = IngestorBuilder::new()
//!     .registry(registry)
//!     .source(Arc::new(RpcActivationSource::new(&HttpClientConfig::default())?))
//!     .store(Arc::new(InMemoryStore::new()))
//!     .window_size(5_000)
//!     .workers(16)
//!     .build()?;
//! ingestor.run().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use progindex_core::checkpoint::IngestStore;
use progindex_core::error::IndexerError;
use progindex_core::indexer::IngestConfig;
use progindex_core::registry::ChainRegistry;

use crate::fetcher::ActivationSource;
use crate::ingest::Ingestor;

/// Fluent builder for [`Ingestor`].
#[derive(Default)]
pub struct IngestorBuilder {
    config: IngestConfig,
    registry: Option<ChainRegistry>,
    source: Option<Arc<dyn ActivationSource>>,
    store: Option<Arc<dyn IngestStore>>,
}

impl IngestorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the chains to index.
    pub fn registry(mut self, registry: ChainRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set where heights and activations come from.
    pub fn source(mut self, source: Arc<dyn ActivationSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the checkpoint and record store.
    pub fn store(mut self, store: Arc<dyn IngestStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the number of blocks per `eth_getLogs` window.
    pub fn window_size(mut self, size: u64) -> Self {
        self.config.window_size = size;
        self
    }

    /// Set the number of concurrent workers.
    pub fn workers(mut self, n: usize) -> Self {
        self.config.workers = n;
        self
    }

    /// Build the `IngestConfig` alone.
    pub fn build_config(self) -> IngestConfig {
        self.config
    }

    /// Build the [`Ingestor`]. Registry, source and store are required.
    pub fn build(self) -> Result<Ingestor, IndexerError> {
        if self.config.window_size == 0 {
            return Err(IndexerError::Config("window size must be positive".into()));
        }
        if self.config.workers == 0 {
            return Err(IndexerError::Config("worker count must be positive".into()));
        }
        let registry = self
            .registry
            .ok_or_else(|| IndexerError::Config("no chain registry configured".into()))?;
        let source = self
            .source
            .ok_or_else(|| IndexerError::Config("no activation source configured".into()))?;
        let store = self
            .store
            .ok_or_else(|| IndexerError::Config("no store configured".into()))?;
        Ok(Ingestor::new(registry, source, store, self.config))
    }
}
