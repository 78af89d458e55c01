//! Ingestion configuration and per-chain state types.

use serde::{Deserialize, Serialize};

/// Blocks requested per `eth_getLogs` window unless configured otherwise.
pub const DEFAULT_WINDOW_SIZE: u64 = 5_000;

/// Workers spawned per available CPU unless configured otherwise.
pub const WORKERS_PER_CPU: usize = 5;

/// Runtime knobs for one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Number of blocks per range request. Fixed for the whole run.
    pub window_size: u64,
    /// Number of concurrent workers. A throughput knob only: each chain has
    /// at most one window in flight.
    pub workers: usize,
}

impl IngestConfig {
    /// Default worker count: available parallelism times [`WORKERS_PER_CPU`].
    pub fn default_workers() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            * WORKERS_PER_CPU
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            workers: Self::default_workers(),
        }
    }
}

/// Pagination state of a single chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainPhase {
    /// Cursor below the ceiling, no window outstanding.
    Pending,
    /// A window has been handed to a worker and not yet committed.
    InFlight,
    /// Cursor reached the ceiling; nothing more to request this run.
    Completed,
}

impl std::fmt::Display for ChainPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InFlight => write!(f, "in-flight"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = IngestConfig::default();
        assert_eq!(cfg.window_size, 5_000);
        assert!(cfg.workers >= WORKERS_PER_CPU);
        assert_eq!(cfg.workers % WORKERS_PER_CPU, 0);
    }

    #[test]
    fn phase_display() {
        assert_eq!(ChainPhase::InFlight.to_string(), "in-flight");
        assert_eq!(ChainPhase::Completed.to_string(), "completed");
    }
}
