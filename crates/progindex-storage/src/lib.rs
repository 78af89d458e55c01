//! progindex-storage: storage backends for progindex.
//!
//! Backends:
//! - [`memory`]: in-memory (dev/testing, no persistence)
//! - `postgres`: PostgreSQL via `sqlx` (`postgres` feature)

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::{CommitEntry, InMemoryStore};

#[cfg(feature = "postgres")]
pub use postgres::{PostgresOptions, PostgresStore};
