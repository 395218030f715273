//! Run orchestration: worker pool, lifecycle and result aggregation.
//!
//! The engine wires one producer thread to a pool of store workers over the
//! bounded payload queues, runs the configured phase to completion, then
//! merges per-worker latency histograms into a single [`RunStats`].

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{never, select, Receiver};
use hdrhistogram::Histogram;
use serde::Serialize;
use tracing::{info, warn};

use docbench_core::{KeySpace, KvPayload, Phase, QueryPayload, WorkloadConfig};

use crate::pipeline;
use crate::report;
use crate::store::DocStore;
use crate::{BenchError, BenchResult};

// ────────────────────────────────────────────────────────────────────────────────
// Lifecycle state
// ────────────────────────────────────────────────────────────────────────────────

/// Externally observable run lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle = 0,
    Running = 1,
    Draining = 2,
    Stopped = 3,
}

struct StateCell(AtomicU8);

impl StateCell {
    fn new() -> Self {
        Self(AtomicU8::new(EngineState::Idle as u8))
    }

    fn set(&self, state: EngineState) {
        self.0.store(state as u8, Ordering::Relaxed);
    }

    fn get(&self) -> EngineState {
        match self.0.load(Ordering::Relaxed) {
            0 => EngineState::Idle,
            1 => EngineState::Running,
            2 => EngineState::Draining,
            _ => EngineState::Stopped,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────────
// Shared counters
// ────────────────────────────────────────────────────────────────────────────────

/// Operation counters shared between workers and the progress reporter.
#[derive(Default)]
pub(crate) struct RunCounters {
    pub(crate) completed: AtomicU64,
    pub(crate) failed: AtomicU64,
}

impl RunCounters {
    /// Completed plus failed. The progress line reports attempts, since a
    /// failing store still consumes workload at full speed.
    pub(crate) fn attempts(&self) -> u64 {
        self.completed.load(Ordering::Relaxed) + self.failed.load(Ordering::Relaxed)
    }
}

// ────────────────────────────────────────────────────────────────────────────────
// Run results
// ────────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    pub store: String,
    pub phase: String,
    pub completed: u64,
    pub failed: u64,
    pub elapsed_secs: f64,
    pub throughput: f64, // attempts/sec
    pub p50_us: f64,
    pub p95_us: f64,
    pub p99_us: f64,
    pub p999_us: f64,
    pub max_us: f64,
    pub mean_us: f64,
    pub created: i64,
    pub live: i64,
}

// ────────────────────────────────────────────────────────────────────────────────
// Engine
// ────────────────────────────────────────────────────────────────────────────────

pub struct Engine {
    config: WorkloadConfig,
    store: Arc<dyn DocStore>,
    state: StateCell,
}

impl Engine {
    /// Validate `config` and bind it to a store. Rejecting a bad mix here
    /// keeps every later stage free of partial-run cleanup.
    pub fn new(config: WorkloadConfig, store: Arc<dyn DocStore>) -> BenchResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            state: StateCell::new(),
        })
    }

    pub fn state(&self) -> EngineState {
        self.state.get()
    }

    /// Execute the configured phase to completion and return merged stats.
    /// The state lands on `Stopped` whether the run succeeded or not.
    pub fn run(&self) -> BenchResult<RunStats> {
        self.state.set(EngineState::Running);
        let result = self.drive();
        self.state.set(EngineState::Stopped);
        result
    }

    fn drive(&self) -> BenchResult<RunStats> {
        let keyspace = Arc::new(KeySpace::new(self.config.initial_documents));
        let cancel = Arc::new(AtomicBool::new(false));
        let counters = Arc::new(RunCounters::default());
        let done = Arc::new(AtomicBool::new(false));

        let phase = self.config.phase();
        let phase_name = match phase {
            Phase::Load { .. } => "load",
            Phase::Run { .. } => "run",
        };
        info!(
            store = self.store.name(),
            phase = phase_name,
            workers = self.config.workers,
            "workload starting"
        );

        let start = Instant::now();
        let (queues, producer) = pipeline::spawn(&self.config, keyspace.clone(), cancel.clone())?;
        let reporter =
            report::spawn_reporter(counters.clone(), done.clone(), self.config.report_interval())?;

        let mut workers = Vec::with_capacity(self.config.workers);
        for i in 0..self.config.workers {
            let worker = Worker {
                store: self.store.clone(),
                kv: queues.kv.clone(),
                query: queues.query.clone(),
                cancel: cancel.clone(),
                counters: counters.clone(),
            };
            let handle = thread::Builder::new()
                .name(format!("docbench-worker-{i}"))
                .spawn(move || worker.run())?;
            workers.push(handle);
        }
        // Workers hold the only receiver clones now; once the producer drops
        // its senders the queues disconnect and the drain can finish.
        drop(queues);

        let producer_result = match phase {
            Phase::Load { .. } => {
                // The producer stops by itself at the budget. Workers drain
                // whatever is still queued before the channels report empty.
                let result = producer.join();
                self.state.set(EngineState::Draining);
                result
            }
            Phase::Run { duration } => {
                let deadline = start + duration;
                while Instant::now() < deadline && !cancel.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(50));
                }
                self.state.set(EngineState::Draining);
                cancel.store(true, Ordering::Relaxed);
                producer.join()
            }
        };

        let mut latency = Histogram::<u64>::new_with_bounds(1, 60_000_000_000, 3).unwrap();
        for handle in workers {
            match handle.join() {
                Ok(hist) => {
                    let _ = latency.add(&hist);
                }
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
        let elapsed_secs = start.elapsed().as_secs_f64();

        done.store(true, Ordering::Relaxed);
        if let Err(panic) = reporter.join() {
            std::panic::resume_unwind(panic);
        }

        // A producer abort (exhausted key space, unconfigured query slots)
        // fails the whole run, but only after every thread is down.
        producer_result?;

        let completed = counters.completed.load(Ordering::Relaxed);
        let failed = counters.failed.load(Ordering::Relaxed);
        let attempts = completed + failed;
        info!(completed, failed, elapsed_secs, "workload finished");

        Ok(RunStats {
            store: self.store.name().to_string(),
            phase: phase_name.to_string(),
            completed,
            failed,
            elapsed_secs,
            throughput: if elapsed_secs > 0.0 {
                attempts as f64 / elapsed_secs
            } else {
                0.0
            },
            p50_us: latency.value_at_percentile(50.0) as f64 / 1_000.0,
            p95_us: latency.value_at_percentile(95.0) as f64 / 1_000.0,
            p99_us: latency.value_at_percentile(99.0) as f64 / 1_000.0,
            p999_us: latency.value_at_percentile(99.9) as f64 / 1_000.0,
            max_us: latency.max() as f64 / 1_000.0,
            mean_us: latency.mean() / 1_000.0,
            created: keyspace.created(),
            live: keyspace.live(),
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────────
// Worker
// ────────────────────────────────────────────────────────────────────────────────

struct Worker {
    store: Arc<dyn DocStore>,
    kv: Receiver<KvPayload>,
    query: Receiver<QueryPayload>,
    cancel: Arc<AtomicBool>,
    counters: Arc<RunCounters>,
}

impl Worker {
    /// Drain both queues until they disconnect or the run is cancelled.
    /// Returns this worker's latency histogram, in nanoseconds.
    fn run(self) -> Histogram<u64> {
        let mut hist = Histogram::<u64>::new_with_bounds(1, 60_000_000_000, 3).unwrap();
        let never_kv = never::<KvPayload>();
        let never_query = never::<QueryPayload>();
        let mut kv_open = true;
        let mut query_open = true;

        while kv_open || query_open {
            if self.cancel.load(Ordering::Relaxed) {
                break;
            }
            let kv_rx = if kv_open { &self.kv } else { &never_kv };
            let query_rx = if query_open { &self.query } else { &never_query };
            select! {
                recv(kv_rx) -> msg => match msg {
                    Ok(payload) => self.execute_kv(payload, &mut hist),
                    Err(_) => kv_open = false,
                },
                recv(query_rx) -> msg => match msg {
                    Ok(payload) => self.execute_query(payload, &mut hist),
                    Err(_) => query_open = false,
                },
                // Wake periodically so a cancel is noticed on quiet queues.
                default(Duration::from_millis(50)) => {}
            }
        }

        hist
    }

    fn execute_kv(&self, payload: KvPayload, hist: &mut Histogram<u64>) {
        let start = Instant::now();
        let result = match &payload {
            KvPayload::Create { key, doc } => self.store.create(key, doc),
            KvPayload::Read { key } => match self.store.read(key) {
                Ok(Some(_)) => Ok(()),
                // The key space only hands out live keys, so a miss means the
                // store lost data. Surface it as a failed operation.
                Ok(None) => Err(BenchError::Store(format!("read {key}: no such key"))),
                Err(e) => Err(e),
            },
            KvPayload::Update { key, doc } => self.store.update(key, doc),
            KvPayload::Delete { key } => self.store.delete(key),
        };
        self.finish(payload.op_name(), start, result, hist);
    }

    fn execute_query(&self, payload: QueryPayload, hist: &mut Histogram<u64>) {
        let start = Instant::now();
        let result = self.store.query(payload.kind, &payload.arg).map(|_| ());
        self.finish("query", start, result, hist);
    }

    fn finish(
        &self,
        op: &'static str,
        start: Instant,
        result: BenchResult<()>,
        hist: &mut Histogram<u64>,
    ) {
        let nanos = start.elapsed().as_nanos() as u64;
        let _ = hist.record(nanos.max(1));
        match result {
            Ok(()) => {
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(op, error = %e, "operation failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStore;
    use crossbeam_channel::bounded;
    use docbench_core::{docgen, format_key};

    #[test]
    fn test_state_cell_transitions() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), EngineState::Idle);
        cell.set(EngineState::Running);
        assert_eq!(cell.get(), EngineState::Running);
        cell.set(EngineState::Draining);
        assert_eq!(cell.get(), EngineState::Draining);
        cell.set(EngineState::Stopped);
        assert_eq!(cell.get(), EngineState::Stopped);
    }

    #[test]
    fn test_counters_sum_attempts() {
        let counters = RunCounters::default();
        counters.completed.fetch_add(7, Ordering::Relaxed);
        counters.failed.fetch_add(3, Ordering::Relaxed);
        assert_eq!(counters.attempts(), 10);
    }

    fn test_worker(
        store: Arc<dyn DocStore>,
        counters: Arc<RunCounters>,
    ) -> (
        Worker,
        crossbeam_channel::Sender<KvPayload>,
        crossbeam_channel::Sender<QueryPayload>,
    ) {
        let (kv_tx, kv_rx) = bounded(16);
        let (query_tx, query_rx) = bounded(16);
        let worker = Worker {
            store,
            kv: kv_rx,
            query: query_rx,
            cancel: Arc::new(AtomicBool::new(false)),
            counters,
        };
        (worker, kv_tx, query_tx)
    }

    #[test]
    fn test_worker_executes_and_counts() {
        let counters = Arc::new(RunCounters::default());
        let store = Arc::new(MemoryStore::new());
        let (worker, kv_tx, query_tx) = test_worker(store.clone(), counters.clone());

        let key = format_key(1);
        let doc = docgen::generate(1, &key, 600);
        kv_tx.send(KvPayload::Create { key: key.clone(), doc }).unwrap();
        kv_tx.send(KvPayload::Read { key }).unwrap();
        drop(kv_tx);
        drop(query_tx);

        let hist = worker.run();
        assert_eq!(hist.len(), 2);
        assert_eq!(counters.completed.load(Ordering::Relaxed), 2);
        assert_eq!(counters.failed.load(Ordering::Relaxed), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_worker_counts_read_miss_as_failure() {
        let counters = Arc::new(RunCounters::default());
        let store = Arc::new(MemoryStore::new());
        let (worker, kv_tx, query_tx) = test_worker(store, counters.clone());

        kv_tx.send(KvPayload::Read { key: format_key(7) }).unwrap();
        drop(kv_tx);
        drop(query_tx);

        let hist = worker.run();
        assert_eq!(hist.len(), 1);
        assert_eq!(counters.completed.load(Ordering::Relaxed), 0);
        assert_eq!(counters.failed.load(Ordering::Relaxed), 1);
    }

    // ── end-to-end scenarios ──

    use crate::adapters::SqliteStore;
    use docbench_core::{Document, Mix, QueryArg, QueryKind, WorkloadError};

    /// Store double that makes every operation take `delay`.
    struct SlowStore {
        inner: MemoryStore,
        delay: Duration,
    }

    impl DocStore for SlowStore {
        fn name(&self) -> &str {
            "slow"
        }

        fn create(&self, key: &str, doc: &Document) -> BenchResult<()> {
            thread::sleep(self.delay);
            self.inner.create(key, doc)
        }

        fn read(&self, key: &str) -> BenchResult<Option<Document>> {
            thread::sleep(self.delay);
            self.inner.read(key)
        }

        fn update(&self, key: &str, doc: &Document) -> BenchResult<()> {
            thread::sleep(self.delay);
            self.inner.update(key, doc)
        }

        fn delete(&self, key: &str) -> BenchResult<()> {
            thread::sleep(self.delay);
            self.inner.delete(key)
        }

        fn query(&self, kind: QueryKind, arg: &QueryArg) -> BenchResult<u64> {
            thread::sleep(self.delay);
            self.inner.query(kind, arg)
        }
    }

    /// Store double that rejects everything.
    struct FailStore;

    impl FailStore {
        fn err<T>() -> BenchResult<T> {
            Err(BenchError::Store("injected failure".to_string()))
        }
    }

    impl DocStore for FailStore {
        fn name(&self) -> &str {
            "broken"
        }

        fn create(&self, _key: &str, _doc: &Document) -> BenchResult<()> {
            Self::err()
        }

        fn read(&self, _key: &str) -> BenchResult<Option<Document>> {
            Self::err()
        }

        fn update(&self, _key: &str, _doc: &Document) -> BenchResult<()> {
            Self::err()
        }

        fn delete(&self, _key: &str) -> BenchResult<()> {
            Self::err()
        }

        fn query(&self, _kind: QueryKind, _arg: &QueryArg) -> BenchResult<u64> {
            Self::err()
        }
    }

    fn load_config(operations: u64, workers: usize) -> WorkloadConfig {
        WorkloadConfig {
            mix: Mix::create_only(),
            operations,
            workers,
            size: 600,
            ..WorkloadConfig::default()
        }
    }

    #[test]
    fn test_load_populates_store_exactly() {
        let store = Arc::new(MemoryStore::new());
        let engine = Engine::new(load_config(1_000, 4), store.clone()).unwrap();
        assert_eq!(engine.state(), EngineState::Idle);

        let stats = engine.run().unwrap();
        assert_eq!(engine.state(), EngineState::Stopped);
        assert_eq!(stats.completed, 1_000);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.created, 1_000);
        assert_eq!(stats.live, 1_000);
        assert_eq!(store.len(), 1_000);
    }

    #[test]
    fn test_new_rejects_bad_mix() {
        let mut config = load_config(100, 2);
        config.mix = Mix {
            create: 50,
            read: 49,
            ..Mix::default()
        };
        let result = Engine::new(config, Arc::new(MemoryStore::new()));
        assert!(matches!(
            result,
            Err(BenchError::Workload(WorkloadError::InvalidMix { got: 99 }))
        ));
    }

    #[test]
    fn test_run_phase_stops_at_deadline() {
        let store = Arc::new(SlowStore {
            inner: MemoryStore::new(),
            delay: Duration::from_millis(300),
        });
        let config = WorkloadConfig {
            mix: Mix::create_only(),
            duration_secs: Some(1),
            workers: 2,
            size: 600,
            ..WorkloadConfig::default()
        };
        let engine = Engine::new(config, store).unwrap();

        let started = Instant::now();
        let stats = engine.run().unwrap();
        let elapsed = started.elapsed();

        // The deadline must hold even though each operation takes 300ms:
        // in-flight work finishes, queued residue is dropped.
        assert!(elapsed >= Duration::from_secs(1));
        assert!(elapsed < Duration::from_secs(4), "drain took {:?}", elapsed);
        assert!(stats.completed > 0);
    }

    #[test]
    fn test_store_failures_do_not_abort_the_run() {
        let engine = Engine::new(load_config(200, 2), Arc::new(FailStore)).unwrap();
        let stats = engine.run().unwrap();
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.failed, 200);
        assert_eq!(stats.created, 200);
    }

    #[test]
    fn test_exhausted_key_space_fails_the_run() {
        let config = WorkloadConfig {
            mix: Mix {
                delete: 100,
                ..Mix::default()
            },
            operations: 100,
            initial_documents: 5,
            workers: 2,
            size: 600,
            ..WorkloadConfig::default()
        };
        let engine = Engine::new(config, Arc::new(MemoryStore::new())).unwrap();
        let result = engine.run();
        assert!(matches!(
            result,
            Err(BenchError::Workload(WorkloadError::EmptyKeySpace))
        ));
        assert_eq!(engine.state(), EngineState::Stopped);
    }

    #[test]
    fn test_mixed_run_drives_both_queues() {
        let store = Arc::new(MemoryStore::new());
        let config = WorkloadConfig {
            mix: Mix {
                create: 50,
                query: 50,
                ..Mix::default()
            },
            query_kind: Some(QueryKind::ByCategory),
            operations: 400,
            workers: 4,
            size: 600,
            ..WorkloadConfig::default()
        };
        let engine = Engine::new(config, store.clone()).unwrap();
        let stats = engine.run().unwrap();
        assert_eq!(stats.completed, 400);
        assert_eq!(stats.failed, 0);
        assert_eq!(store.len(), 200);
    }

    #[test]
    fn test_load_round_trips_through_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteStore::open(&dir.path().join("bench.db"), 2).unwrap());
        let engine = Engine::new(load_config(300, 2), store.clone()).unwrap();
        let stats = engine.run().unwrap();
        assert_eq!(stats.completed, 300);
        assert_eq!(stats.failed, 0);

        // Compare the index-determined fields; uuid differs per generation.
        let key = format_key(123);
        let doc = store.read(&key).unwrap().expect("doc present");
        let reference = docgen::generate(123, &key, 600);
        assert_eq!(doc.email, reference.email);
        assert_eq!(doc.address, reference.address);
        assert_eq!(doc.notes, reference.notes);
    }
}
