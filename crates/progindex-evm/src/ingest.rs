//! The ingest loop: one coordinating task plus the worker pool.
//!
//! ```text
//! load checkpoints ─► probe heights ─► Coordinator::new
//!                                         │ seed (spawned task)
//!                                         ▼
//!                    request queue ─► workers ─► report queue ─► Coordinator::complete
//!                          ▲                                           │
//!                          └───────────── next window ─────────────────┘
//! ```
//!
//! The request queue is bounded at the chain count. Each chain has at most
//! one window queued or in flight, so sends on it never wait for long. The
//! report queue is unbounded.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use progindex_core::checkpoint::{resume_points, IngestStore};
use progindex_core::coordinator::Coordinator;
use progindex_core::error::IndexerError;
use progindex_core::indexer::IngestConfig;
use progindex_core::registry::ChainRegistry;
use progindex_core::types::{BlockNumber, ChainId, RangeRequest};

use crate::fetcher::ActivationSource;
use crate::prober::probe_heights;
use crate::worker::{WorkerPool, WorkerReport};

/// Totals for one completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Chains in the registry.
    pub chains: usize,
    /// Chains that had nothing to do at startup.
    pub already_complete: usize,
    /// Windows committed this run.
    pub windows: u64,
    /// Records committed this run, before read-time deduplication.
    pub records: u64,
    /// Checkpoint of every chain when the run ended.
    pub checkpoints: BTreeMap<ChainId, BlockNumber>,
}

/// Drives every configured chain from its checkpoint to its probed ceiling.
pub struct Ingestor {
    registry: ChainRegistry,
    source: Arc<dyn ActivationSource>,
    store: Arc<dyn IngestStore>,
    config: IngestConfig,
}

impl Ingestor {
    pub fn new(
        registry: ChainRegistry,
        source: Arc<dyn ActivationSource>,
        store: Arc<dyn IngestStore>,
        config: IngestConfig,
    ) -> Self {
        Self {
            registry,
            source,
            store,
            config,
        }
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Run until every chain reaches its ceiling, or until the first error.
    ///
    /// On error, windows committed before it stay committed; the next run
    /// resumes from their checkpoints.
    pub async fn run(&self) -> Result<RunSummary, IndexerError> {
        if self.config.workers == 0 {
            return Err(IndexerError::Config("worker count must be positive".into()));
        }

        let stored = self.store.load_checkpoints().await?;
        let cursors = resume_points(&self.registry, &stored);
        let ceilings = probe_heights(self.source.as_ref(), &self.registry).await?;
        let mut coord =
            Coordinator::new(&self.registry, &cursors, &ceilings, self.config.window_size)?;

        let mut summary = RunSummary {
            chains: self.registry.len(),
            already_complete: self.registry.len() - coord.remaining(),
            ..RunSummary::default()
        };

        tracing::info!(
            chains = summary.chains,
            pending = coord.remaining(),
            workers = self.config.workers,
            window_size = self.config.window_size,
            "ingestion starting"
        );

        if !coord.is_done() {
            self.drive(&mut coord, &mut summary).await?;
        }

        for chain in self.registry.chains() {
            if let Some(cursor) = coord.cursor(chain.chain_id) {
                summary.checkpoints.insert(chain.chain_id, cursor);
            }
        }

        tracing::info!(
            chains = summary.chains,
            windows = summary.windows,
            records = summary.records,
            "ingestion complete"
        );
        Ok(summary)
    }

    async fn drive(
        &self,
        coord: &mut Coordinator,
        summary: &mut RunSummary,
    ) -> Result<(), IndexerError> {
        let (request_tx, request_rx) = mpsc::channel::<RangeRequest>(self.registry.len().max(1));
        let (report_tx, mut report_rx) = mpsc::unbounded_channel::<WorkerReport>();

        let pool = WorkerPool::spawn(
            self.config.workers,
            request_rx,
            self.source.clone(),
            self.store.clone(),
            report_tx,
        );

        let seed = coord.seed();
        let seed_tx = request_tx.clone();
        let seeder = tokio::spawn(async move {
            for req in seed {
                if seed_tx.send(req).await.is_err() {
                    return Err(IndexerError::Aborted {
                        reason: "request queue closed while seeding".into(),
                    });
                }
            }
            Ok(())
        });

        let outcome = drive_loop(coord, &request_tx, &mut report_rx, summary).await;
        drop(request_tx);

        match outcome {
            Ok(()) => {
                seeder.await.map_err(|e| IndexerError::Aborted {
                    reason: format!("seeding task: {e}"),
                })??;
                pool.join().await;
                Ok(())
            }
            Err(e) => {
                seeder.abort();
                pool.abort();
                Err(e)
            }
        }
    }
}

async fn drive_loop(
    coord: &mut Coordinator,
    requests: &mpsc::Sender<RangeRequest>,
    reports: &mut mpsc::UnboundedReceiver<WorkerReport>,
    summary: &mut RunSummary,
) -> Result<(), IndexerError> {
    while !coord.is_done() {
        match reports.recv().await {
            Some(WorkerReport::Committed { signal, records }) => {
                summary.windows += 1;
                summary.records += records as u64;
                if let Some(next) = coord.complete(signal)? {
                    requests.send(next).await.map_err(|_| IndexerError::Aborted {
                        reason: "request queue closed".into(),
                    })?;
                }
            }
            Some(WorkerReport::Failed { chain_id, error }) => {
                tracing::error!(chain_id, %error, "window failed, stopping run");
                return Err(error);
            }
            None => {
                return Err(IndexerError::Aborted {
                    reason: "every worker exited before the run finished".into(),
                });
            }
        }
    }
    Ok(())
}
