//! Workload driver for docbench: storage adapters, payload pipeline,
//! execution engine and reporting.

pub mod adapters;
pub mod engine;
pub mod pipeline;
pub mod report;
pub mod store;

use docbench_core::WorkloadError;

// ────────────────────────────────────────────────────────────────────────────────
// Error type
// ────────────────────────────────────────────────────────────────────────────────

pub type BenchResult<T> = std::result::Result<T, BenchError>;

#[derive(Debug)]
pub enum BenchError {
    Io(std::io::Error),
    Store(String),
    Workload(WorkloadError),
}

impl std::fmt::Display for BenchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BenchError::Io(e) => write!(f, "IO error: {}", e),
            BenchError::Store(s) => write!(f, "store error: {}", s),
            BenchError::Workload(e) => write!(f, "workload error: {}", e),
        }
    }
}

impl std::error::Error for BenchError {}

impl From<std::io::Error> for BenchError {
    fn from(e: std::io::Error) -> Self {
        BenchError::Io(e)
    }
}

impl From<WorkloadError> for BenchError {
    fn from(e: WorkloadError) -> Self {
        BenchError::Workload(e)
    }
}
