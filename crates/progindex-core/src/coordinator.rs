//! Pagination coordinator: turns each chain's cursor and ceiling into a
//! sequence of contiguous, non-overlapping range requests.
//!
//! The coordinator is a plain state machine: it never touches channels or the
//! network. The ingest loop feeds it [`CompletionSignal`]s and forwards the
//! [`RangeRequest`]s it returns to the worker pool.
//!
//! Per chain: `Pending → InFlight → (InFlight)* → Completed`. At most one
//! window per chain is outstanding, and a window's `until` never exceeds the
//! ceiling probed at startup.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info};

use crate::error::IndexerError;
use crate::indexer::ChainPhase;
use crate::registry::ChainRegistry;
use crate::types::{BlockNumber, ChainId, CompletionSignal, RangeRequest};

#[derive(Debug, Clone)]
struct ChainCursor {
    rpc: String,
    /// Last committed block (exclusive lower bound of the next window).
    cursor: BlockNumber,
    /// Ceiling probed once for this run.
    ceiling: BlockNumber,
    phase: ChainPhase,
    /// `until` of the outstanding window, if any.
    in_flight: Option<BlockNumber>,
}

/// Per-chain pagination state for one run.
#[derive(Debug)]
pub struct Coordinator {
    window_size: u64,
    chains: BTreeMap<ChainId, ChainCursor>,
}

impl Coordinator {
    /// Build the coordinator from resume points and probed ceilings.
    ///
    /// Chains without a resume point start from their configured start
    /// block. A chain already at or past its ceiling starts `Completed`.
    pub fn new(
        registry: &ChainRegistry,
        cursors: &HashMap<ChainId, BlockNumber>,
        ceilings: &HashMap<ChainId, BlockNumber>,
        window_size: u64,
    ) -> Result<Self, IndexerError> {
        if window_size == 0 {
            return Err(IndexerError::Config("window size must be positive".into()));
        }

        let mut chains = BTreeMap::new();
        for chain in registry.chains() {
            let ceiling = *ceilings
                .get(&chain.chain_id)
                .ok_or(IndexerError::MissingCeiling { chain_id: chain.chain_id })?;
            let cursor = cursors.get(&chain.chain_id).copied().unwrap_or(chain.start_block);
            let phase = if cursor >= ceiling {
                info!(chain_id = chain.chain_id, cursor, ceiling, "chain already caught up");
                ChainPhase::Completed
            } else {
                ChainPhase::Pending
            };
            chains.insert(
                chain.chain_id,
                ChainCursor {
                    rpc: chain.rpc.clone(),
                    cursor,
                    ceiling,
                    phase,
                    in_flight: None,
                },
            );
        }

        Ok(Self { window_size, chains })
    }

    /// Issue the first window of every pending chain.
    pub fn seed(&mut self) -> Vec<RangeRequest> {
        let pending: Vec<ChainId> = self
            .chains
            .iter()
            .filter(|(_, c)| c.phase == ChainPhase::Pending)
            .map(|(id, _)| *id)
            .collect();
        pending.into_iter().filter_map(|id| self.issue(id)).collect()
    }

    /// Record a committed window and return the chain's next window, or
    /// `None` once the chain has reached its ceiling.
    pub fn complete(
        &mut self,
        signal: CompletionSignal,
    ) -> Result<Option<RangeRequest>, IndexerError> {
        let state = match self.chains.get_mut(&signal.chain_id) {
            Some(s) if s.phase == ChainPhase::InFlight && s.in_flight == Some(signal.until) => s,
            _ => {
                return Err(IndexerError::UnexpectedCompletion {
                    chain_id: signal.chain_id,
                    until: signal.until,
                })
            }
        };

        state.cursor = signal.until;
        state.in_flight = None;

        if state.cursor >= state.ceiling {
            state.phase = ChainPhase::Completed;
            info!(chain_id = signal.chain_id, at = state.cursor, "chain complete");
            return Ok(None);
        }

        state.phase = ChainPhase::Pending;
        Ok(self.issue(signal.chain_id))
    }

    /// Returns `true` once every chain is `Completed`.
    pub fn is_done(&self) -> bool {
        self.chains.values().all(|c| c.phase == ChainPhase::Completed)
    }

    /// Number of chains not yet `Completed`.
    pub fn remaining(&self) -> usize {
        self.chains
            .values()
            .filter(|c| c.phase != ChainPhase::Completed)
            .count()
    }

    pub fn phase(&self, chain_id: ChainId) -> Option<ChainPhase> {
        self.chains.get(&chain_id).map(|c| c.phase)
    }

    /// Last committed block for a chain.
    pub fn cursor(&self, chain_id: ChainId) -> Option<BlockNumber> {
        self.chains.get(&chain_id).map(|c| c.cursor)
    }

    fn issue(&mut self, chain_id: ChainId) -> Option<RangeRequest> {
        let state = self.chains.get_mut(&chain_id)?;
        if state.phase != ChainPhase::Pending {
            return None;
        }
        let until = state.cursor.saturating_add(self.window_size).min(state.ceiling);
        state.phase = ChainPhase::InFlight;
        state.in_flight = Some(until);
        debug!(chain_id, from = state.cursor, until, "window issued");
        Some(RangeRequest {
            chain_id,
            rpc: state.rpc.clone(),
            from: state.cursor,
            until,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chain;

    fn registry(chains: &[(ChainId, BlockNumber)]) -> ChainRegistry {
        ChainRegistry::new(
            chains
                .iter()
                .map(|&(chain_id, start_block)| Chain {
                    name: format!("chain-{chain_id}"),
                    website: String::new(),
                    rpc: format!("http://rpc-{chain_id}"),
                    start_block,
                    chain_id,
                })
                .collect(),
        )
        .unwrap()
    }

    fn done(req: &RangeRequest) -> CompletionSignal {
        CompletionSignal {
            chain_id: req.chain_id,
            until: req.until,
        }
    }

    #[test]
    fn window_capped_at_ceiling() {
        let reg = registry(&[(1, 1000)]);
        let ceilings = HashMap::from([(1, 5500)]);
        let mut coord = Coordinator::new(&reg, &HashMap::new(), &ceilings, 5000).unwrap();

        let seeded = coord.seed();
        assert_eq!(seeded.len(), 1);
        assert_eq!((seeded[0].from, seeded[0].until), (1000, 5500));
        assert_eq!(coord.phase(1), Some(ChainPhase::InFlight));

        let next = coord.complete(done(&seeded[0])).unwrap();
        assert!(next.is_none());
        assert_eq!(coord.phase(1), Some(ChainPhase::Completed));
        assert!(coord.is_done());
    }

    #[test]
    fn windows_are_contiguous_up_to_ceiling() {
        let reg = registry(&[(1, 0)]);
        let ceilings = HashMap::from([(1, 12_345)]);
        let mut coord = Coordinator::new(&reg, &HashMap::new(), &ceilings, 5000).unwrap();

        let mut windows = Vec::new();
        let mut next = coord.seed().pop();
        while let Some(req) = next {
            windows.push((req.from, req.until));
            next = coord.complete(done(&req)).unwrap();
        }

        assert_eq!(windows, vec![(0, 5000), (5000, 10_000), (10_000, 12_345)]);
        assert_eq!(coord.cursor(1), Some(12_345));
        assert!(coord.is_done());
    }

    #[test]
    fn stored_cursor_overrides_start_block() {
        let reg = registry(&[(1, 0)]);
        let cursors = HashMap::from([(1, 7_000)]);
        let ceilings = HashMap::from([(1, 20_000)]);
        let mut coord = Coordinator::new(&reg, &cursors, &ceilings, 5000).unwrap();
        let seeded = coord.seed();
        assert_eq!((seeded[0].from, seeded[0].until), (7_000, 12_000));
    }

    #[test]
    fn caught_up_chain_starts_completed() {
        let reg = registry(&[(1, 900), (2, 0)]);
        let ceilings = HashMap::from([(1, 900), (2, 10)]);
        let mut coord = Coordinator::new(&reg, &HashMap::new(), &ceilings, 5000).unwrap();
        assert_eq!(coord.phase(1), Some(ChainPhase::Completed));
        assert_eq!(coord.remaining(), 1);

        let seeded = coord.seed();
        assert_eq!(seeded.len(), 1);
        assert_eq!(seeded[0].chain_id, 2);
    }

    #[test]
    fn only_one_window_in_flight_per_chain() {
        let reg = registry(&[(1, 0)]);
        let ceilings = HashMap::from([(1, 100_000)]);
        let mut coord = Coordinator::new(&reg, &HashMap::new(), &ceilings, 5000).unwrap();
        assert_eq!(coord.seed().len(), 1);
        // Re-seeding while in flight issues nothing.
        assert!(coord.seed().is_empty());
    }

    #[test]
    fn rejects_unexpected_completions() {
        let reg = registry(&[(1, 0)]);
        let ceilings = HashMap::from([(1, 100_000)]);
        let mut coord = Coordinator::new(&reg, &HashMap::new(), &ceilings, 5000).unwrap();

        // Nothing in flight yet.
        let err = coord
            .complete(CompletionSignal { chain_id: 1, until: 5000 })
            .unwrap_err();
        assert!(matches!(err, IndexerError::UnexpectedCompletion { chain_id: 1, .. }));

        let req = coord.seed().pop().unwrap();
        // Wrong bound.
        assert!(coord
            .complete(CompletionSignal { chain_id: 1, until: req.until + 1 })
            .is_err());
        // Unknown chain.
        assert!(coord
            .complete(CompletionSignal { chain_id: 2, until: req.until })
            .is_err());
        // The real one still goes through.
        assert!(coord.complete(done(&req)).unwrap().is_some());
    }

    #[test]
    fn missing_ceiling_is_an_error() {
        let reg = registry(&[(1, 0)]);
        let err = Coordinator::new(&reg, &HashMap::new(), &HashMap::new(), 5000).unwrap_err();
        assert!(matches!(err, IndexerError::MissingCeiling { chain_id: 1 }));
    }

    #[test]
    fn zero_window_rejected() {
        let reg = registry(&[(1, 0)]);
        let ceilings = HashMap::from([(1, 10)]);
        assert!(Coordinator::new(&reg, &HashMap::new(), &ceilings, 0).is_err());
    }

    #[test]
    fn chains_progress_independently() {
        let reg = registry(&[(1, 0), (2, 0)]);
        let ceilings = HashMap::from([(1, 10), (2, 25)]);
        let mut coord = Coordinator::new(&reg, &HashMap::new(), &ceilings, 10).unwrap();
        let seeded = coord.seed();
        assert_eq!(seeded.len(), 2);

        // Chain 2 finishes its first window before chain 1.
        let second = coord.complete(done(&seeded[1])).unwrap().unwrap();
        assert_eq!((second.chain_id, second.from, second.until), (2, 10, 20));
        assert!(coord.complete(done(&seeded[0])).unwrap().is_none());
        assert_eq!(coord.remaining(), 1);

        let third = coord.complete(done(&second)).unwrap().unwrap();
        assert_eq!((third.from, third.until), (20, 25));
        assert!(coord.complete(done(&third)).unwrap().is_none());
        assert!(coord.is_done());
    }
}
