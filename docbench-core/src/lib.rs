//! Core building blocks for docbench: deterministic document synthesis, key
//! space bookkeeping, weighted operation sequencing and run configuration.
//!
//! Everything here is single-purpose and store-agnostic; the `docbench`
//! crate owns the threads, the queues and the storage adapters.

pub mod config;
pub mod docgen;
pub mod error;
pub mod keyspace;
pub mod payload;
pub mod sequence;
pub mod tables;

pub use config::{Phase, WorkloadConfig};
pub use docgen::{generate, keyed_string, Address, Document, SIZE_OVERHEAD};
pub use error::WorkloadError;
pub use keyspace::{format_key, KeySpace};
pub use payload::{KvPayload, QueryArg, QueryKind, QueryPayload};
pub use sequence::{Mix, OpKind, OpSequence};
