//! Storage capability surface every backend adapter implements.

use docbench_core::{Document, QueryArg, QueryKind};

use crate::BenchResult;

/// A document store under benchmark.
///
/// Workers share one adapter across threads, so implementations bring their
/// own interior mutability or connection pooling. Any `Err` counts as a
/// single failed operation and never stops the run.
pub trait DocStore: Send + Sync {
    fn name(&self) -> &str;

    // ── key-value ops ──
    fn create(&self, key: &str, doc: &Document) -> BenchResult<()>;
    fn read(&self, key: &str) -> BenchResult<Option<Document>>;
    fn update(&self, key: &str, doc: &Document) -> BenchResult<()>;
    fn delete(&self, key: &str) -> BenchResult<()>;

    // ── secondary-index query ──
    /// Count the documents whose [`QueryKind::field`] equals `arg`.
    fn query(&self, kind: QueryKind, arg: &QueryArg) -> BenchResult<u64>;
}
