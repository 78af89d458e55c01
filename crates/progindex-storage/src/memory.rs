//! In-memory storage backend.
//!
//! Keeps checkpoints and activation rows in RAM with the same commit
//! semantics as the PostgreSQL backend. Useful for tests and dry runs.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use progindex_core::checkpoint::{IngestStore, StoredDeployment};
use progindex_core::error::IndexerError;
use progindex_core::types::{BlockNumber, ChainId, DeploymentRecord};

/// One successful commit, in commit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitEntry {
    pub chain_id: ChainId,
    pub until: BlockNumber,
    pub records: usize,
}

#[derive(Default)]
struct State {
    checkpoints: HashMap<ChainId, BlockNumber>,
    rows: Vec<StoredDeployment>,
    next_id: i64,
    commits: Vec<CommitEntry>,
    /// Fail the next commit once this many rows have been staged.
    fail_after: Option<usize>,
}

/// In-memory [`IngestStore`].
///
/// All data is lost when the process exits.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds the given checkpoints.
    pub fn with_checkpoints(checkpoints: impl IntoIterator<Item = (ChainId, BlockNumber)>) -> Self {
        let store = Self::default();
        if let Ok(mut state) = store.state.lock() {
            state.checkpoints.extend(checkpoints);
        }
        store
    }

    /// Make the next commit fail after staging `n` rows. Nothing from that
    /// commit becomes visible.
    pub fn fail_next_commit_after(&self, n: usize) -> Result<(), IndexerError> {
        self.lock()?.fail_after = Some(n);
        Ok(())
    }

    /// Current checkpoint of a chain.
    pub fn checkpoint(&self, chain_id: ChainId) -> Result<Option<BlockNumber>, IndexerError> {
        Ok(self.lock()?.checkpoints.get(&chain_id).copied())
    }

    /// Every stored row, duplicates included.
    pub fn rows(&self) -> Result<Vec<StoredDeployment>, IndexerError> {
        Ok(self.lock()?.rows.clone())
    }

    /// Successful commits in the order they happened.
    pub fn commits(&self) -> Result<Vec<CommitEntry>, IndexerError> {
        Ok(self.lock()?.commits.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, IndexerError> {
        self.state
            .lock()
            .map_err(|_| IndexerError::Storage("in-memory store lock poisoned".into()))
    }
}

#[async_trait]
impl IngestStore for InMemoryStore {
    async fn load_checkpoints(&self) -> Result<HashMap<ChainId, BlockNumber>, IndexerError> {
        Ok(self.lock()?.checkpoints.clone())
    }

    async fn commit(
        &self,
        chain_id: ChainId,
        until: BlockNumber,
        records: &[DeploymentRecord],
    ) -> Result<(), IndexerError> {
        let mut state = self.lock()?;
        let fail_after = state.fail_after.take();

        // Stage everything first; only a fully staged commit is applied.
        let mut staged = Vec::with_capacity(records.len());
        let mut next_id = state.next_id;
        for record in records {
            if fail_after == Some(staged.len()) {
                return Err(IndexerError::Storage(format!(
                    "injected failure after {} of {} inserts",
                    staged.len(),
                    records.len()
                )));
            }
            next_id += 1;
            staged.push(StoredDeployment {
                id: next_id,
                inserted_at: Utc::now(),
                record: record.clone(),
            });
        }
        if fail_after.is_some_and(|n| n >= records.len()) {
            return Err(IndexerError::Storage("injected failure before commit".into()));
        }

        let checkpoint = state.checkpoints.entry(chain_id).or_insert(until);
        *checkpoint = (*checkpoint).max(until);
        state.next_id = next_id;
        state.rows.extend(staged);
        state.commits.push(CommitEntry {
            chain_id,
            until,
            records: records.len(),
        });
        Ok(())
    }

    async fn unique_deployments(&self) -> Result<Vec<StoredDeployment>, IndexerError> {
        let state = self.lock()?;
        let mut seen = HashSet::new();
        Ok(state
            .rows
            .iter()
            .filter(|row| {
                let (chain_id, tx, addr) = row.record.natural_key();
                seen.insert((chain_id, tx.to_owned(), addr.to_owned()))
            })
            .cloned()
            .collect())
    }
}
