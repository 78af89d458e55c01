//! progindex-evm: `ProgramActivated` decoder, log fetcher, height prober,
//! worker pool and ingest loop.

pub mod builder;
pub mod decoder;
pub mod fetcher;
pub mod ingest;
pub mod prober;
pub mod worker;

pub use builder::IngestorBuilder;
pub use decoder::{
    decode_log, decode_payload, ProgramActivated, ARBWASM_ADDRESS, PROGRAM_ACTIVATED_TOPIC,
};
pub use fetcher::{fetch_activations, ActivationSource, RawLog, RpcActivationSource};
pub use ingest::{Ingestor, RunSummary};
pub use prober::{latest_height, probe_heights};
pub use worker::{process_range, WorkerPool, WorkerReport};
