//! Worker pool.
//!
//! A fixed number of tasks draw [`RangeRequest`]s from one shared queue. Per
//! request a worker fetches the window's activations, commits them together
//! with the new checkpoint, and reports back. Errors are reported, never
//! retried: the ingest loop ends the run on the first one.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use progindex_core::checkpoint::IngestStore;
use progindex_core::error::IndexerError;
use progindex_core::types::{ChainId, CompletionSignal, RangeRequest};

use crate::fetcher::ActivationSource;

/// What a worker sends back after handling one request.
#[derive(Debug)]
pub enum WorkerReport {
    /// The window's records and checkpoint are durably committed.
    Committed {
        signal: CompletionSignal,
        records: usize,
    },
    /// The window failed; nothing from it was committed.
    Failed { chain_id: ChainId, error: IndexerError },
}

/// Fetch, decode and commit one window. Returns the number of records stored.
pub async fn process_range(
    source: &dyn ActivationSource,
    store: &dyn IngestStore,
    req: &RangeRequest,
) -> Result<usize, IndexerError> {
    let records = source.activations(req).await?;
    store.commit(req.chain_id, req.until, &records).await?;
    Ok(records.len())
}

/// Handles to the spawned workers.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers sharing `requests`. Each worker holds a clone of
    /// `reports`; the channel closes once every worker has exited.
    pub fn spawn(
        size: usize,
        requests: mpsc::Receiver<RangeRequest>,
        source: Arc<dyn ActivationSource>,
        store: Arc<dyn IngestStore>,
        reports: mpsc::UnboundedSender<WorkerReport>,
    ) -> Self {
        let requests = Arc::new(Mutex::new(requests));
        let handles = (0..size.max(1))
            .map(|worker| {
                tokio::spawn(worker_loop(
                    worker,
                    requests.clone(),
                    source.clone(),
                    store.clone(),
                    reports.clone(),
                ))
            })
            .collect();
        Self { handles }
    }

    /// Wait for every worker to exit. Workers exit once the request queue is
    /// closed and drained.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "worker task ended abnormally");
            }
        }
    }

    /// Stop every worker without waiting for in-flight windows.
    pub fn abort(&self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

async fn worker_loop(
    worker: usize,
    requests: Arc<Mutex<mpsc::Receiver<RangeRequest>>>,
    source: Arc<dyn ActivationSource>,
    store: Arc<dyn IngestStore>,
    reports: mpsc::UnboundedSender<WorkerReport>,
) {
    loop {
        let next = requests.lock().await.recv().await;
        let Some(req) = next else { break };

        tracing::debug!(
            worker,
            chain_id = req.chain_id,
            from = req.from,
            until = req.until,
            "window started"
        );

        // A panicking window is reported like any other failure so the
        // ingest loop never waits on a signal that cannot arrive.
        let outcome = AssertUnwindSafe(process_range(source.as_ref(), store.as_ref(), &req))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                Err(IndexerError::Aborted {
                    reason: format!("worker {worker} panicked on chain {}", req.chain_id),
                })
            });

        let report = match outcome {
            Ok(records) => {
                tracing::info!(
                    worker,
                    chain_id = req.chain_id,
                    from = req.from,
                    until = req.until,
                    records,
                    "window committed"
                );
                WorkerReport::Committed {
                    signal: CompletionSignal {
                        chain_id: req.chain_id,
                        until: req.until,
                    },
                    records,
                }
            }
            Err(error) => {
                tracing::warn!(
                    worker,
                    chain_id = req.chain_id,
                    from = req.from,
                    until = req.until,
                    %error,
                    "window failed"
                );
                WorkerReport::Failed {
                    chain_id: req.chain_id,
                    error,
                }
            }
        };

        if reports.send(report).is_err() {
            // The ingest loop is gone; nobody is left to act on results.
            break;
        }
    }
    tracing::debug!(worker, "worker exiting");
}
