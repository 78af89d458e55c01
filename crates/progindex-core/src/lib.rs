//! progindex-core: foundation for the resumable program-activation indexer.
//!
//! # Architecture
//!
//! ```text
//! ChainRegistry ──► Coordinator ──RangeRequest──► worker pool (progindex-evm)
//!                      ▲                              │ fetch + decode
//!                      │                              ▼
//!                      └──────CompletionSignal──── IngestStore::commit
//! ```
//!
//! This crate holds the pieces with no I/O of their own: shared types, the
//! chain registry, the store trait, and the pagination coordinator.

pub mod checkpoint;
pub mod coordinator;
pub mod error;
pub mod indexer;
pub mod registry;
pub mod types;

pub use checkpoint::{resume_points, IngestStore, StoredDeployment};
pub use coordinator::Coordinator;
pub use error::IndexerError;
pub use indexer::{ChainPhase, IngestConfig};
pub use registry::ChainRegistry;
pub use types::{BlockNumber, Chain, ChainId, CompletionSignal, DeploymentRecord, RangeRequest};
