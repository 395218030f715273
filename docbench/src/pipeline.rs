//! Payload production: sequencing, key choice and document synthesis.
//!
//! One producer thread walks the operation sequence, resolves each kind into
//! a concrete payload against the shared key space, and pushes it into
//! bounded queues. Backpressure comes purely from queue capacity: the
//! producer blocks when workers fall behind, in short slices so cancellation
//! is never missed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::warn;

use docbench_core::{
    docgen, format_key, KeySpace, KvPayload, OpKind, OpSequence, Phase, QueryKind, QueryPayload,
    WorkloadConfig, WorkloadError,
};

use crate::BenchResult;

/// Queue capacity: a small multiple of the worker count, so a stalled store
/// holds back production instead of ballooning memory.
pub(crate) fn queue_capacity(workers: usize) -> usize {
    (workers * 4).max(8)
}

/// Receiving ends of the payload queues workers drain.
///
/// Pure key-value runs simply never see traffic on `query`.
pub struct PayloadQueues {
    pub kv: Receiver<KvPayload>,
    pub query: Receiver<QueryPayload>,
}

/// Handle to the producer thread.
pub struct Producer {
    handle: JoinHandle<Result<u64, WorkloadError>>,
}

impl Producer {
    /// Wait for the producer; yields how many payloads it emitted, or the
    /// fatal error that stopped it.
    pub fn join(self) -> Result<u64, WorkloadError> {
        match self.handle.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

/// Spawn the producer for `config`. Senders are dropped when it finishes,
/// which closes the queues and lets workers drain to the end.
pub fn spawn(
    config: &WorkloadConfig,
    keyspace: Arc<KeySpace>,
    cancel: Arc<AtomicBool>,
) -> BenchResult<(PayloadQueues, Producer)> {
    let capacity = queue_capacity(config.workers);
    let (kv_tx, kv_rx) = bounded(capacity);
    let (query_tx, query_rx) = bounded(capacity);

    let task = ProducerTask {
        sequence: OpSequence::new(&config.mix, config.seed)?,
        keyspace,
        cancel,
        kv: kv_tx,
        query: query_tx,
        query_kind: config.query_kind,
        size: config.size,
        budget: match config.phase() {
            Phase::Load { operations } => Some(operations),
            Phase::Run { .. } => None,
        },
        rng: ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(1)),
    };

    let handle = thread::Builder::new()
        .name("docbench-producer".to_string())
        .spawn(move || task.run())?;

    Ok((
        PayloadQueues {
            kv: kv_rx,
            query: query_rx,
        },
        Producer { handle },
    ))
}

enum Payload {
    Kv(KvPayload),
    Query(QueryPayload),
}

struct ProducerTask {
    sequence: OpSequence,
    keyspace: Arc<KeySpace>,
    cancel: Arc<AtomicBool>,
    kv: Sender<KvPayload>,
    query: Sender<QueryPayload>,
    query_kind: Option<QueryKind>,
    size: usize,
    budget: Option<u64>,
    rng: ChaCha8Rng,
}

impl ProducerTask {
    fn run(mut self) -> Result<u64, WorkloadError> {
        let mut produced = 0u64;

        loop {
            if self.cancel.load(Ordering::Relaxed) {
                break;
            }
            if let Some(total) = self.budget {
                if produced >= total {
                    break;
                }
            }
            let Some(kind) = self.sequence.next() else {
                break;
            };

            match self.build(kind) {
                Ok(Payload::Kv(payload)) => {
                    if !send_observing_cancel(&self.kv, payload, &self.cancel) {
                        break;
                    }
                }
                Ok(Payload::Query(payload)) => {
                    if !send_observing_cancel(&self.query, payload, &self.cancel) {
                        break;
                    }
                }
                Err(e) => {
                    // Contract violation: the run cannot continue meaningfully.
                    warn!(error = %e, "payload production aborted");
                    self.cancel.store(true, Ordering::Relaxed);
                    return Err(e);
                }
            }
            produced += 1;
        }

        Ok(produced)
    }

    fn build(&mut self, kind: OpKind) -> Result<Payload, WorkloadError> {
        let payload = match kind {
            OpKind::Create => {
                let index = self.keyspace.next_new();
                let key = format_key(index);
                let doc = docgen::generate(index, &key, self.size);
                Payload::Kv(KvPayload::Create { key, doc })
            }
            OpKind::Read => {
                let index = self.keyspace.existing(&mut self.rng)?;
                Payload::Kv(KvPayload::Read {
                    key: format_key(index),
                })
            }
            OpKind::Update => {
                let index = self.keyspace.existing(&mut self.rng)?;
                let key = format_key(index);
                let doc = docgen::generate(index, &key, self.size);
                Payload::Kv(KvPayload::Update { key, doc })
            }
            OpKind::Delete => {
                let index = self.keyspace.removal()?;
                Payload::Kv(KvPayload::Delete {
                    key: format_key(index),
                })
            }
            OpKind::Query => {
                let kind = self.query_kind.ok_or_else(|| {
                    WorkloadError::InvalidConfig("query slots need a query_kind".into())
                })?;
                Payload::Query(QueryPayload::at_bound(kind, self.keyspace.created()))
            }
        };
        Ok(payload)
    }
}

/// Send, re-checking the cancel flag while the queue is full. Returns false
/// when the payload was not delivered.
fn send_observing_cancel<T>(tx: &Sender<T>, mut item: T, cancel: &AtomicBool) -> bool {
    loop {
        if cancel.load(Ordering::Relaxed) {
            return false;
        }
        match tx.send_timeout(item, Duration::from_millis(50)) {
            Ok(()) => return true,
            Err(SendTimeoutError::Timeout(back)) => item = back,
            Err(SendTimeoutError::Disconnected(_)) => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docbench_core::Mix;

    fn config(mix: Mix, operations: u64) -> WorkloadConfig {
        WorkloadConfig {
            mix,
            operations,
            size: 600,
            workers: 2,
            ..WorkloadConfig::default()
        }
    }

    #[test]
    fn test_budget_is_exact() {
        // 150 is deliberately not a multiple of the 100-slot block.
        let config = config(Mix::create_only(), 150);
        let keyspace = Arc::new(KeySpace::new(0));
        let cancel = Arc::new(AtomicBool::new(false));

        let (queues, producer) = spawn(&config, keyspace.clone(), cancel).unwrap();

        let mut received = 0u64;
        while queues.kv.recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 150);
        assert_eq!(producer.join().unwrap(), 150);
        assert_eq!(keyspace.created(), 150);
    }

    #[test]
    fn test_create_payloads_carry_matching_documents() {
        let config = config(Mix::create_only(), 10);
        let keyspace = Arc::new(KeySpace::new(0));
        let cancel = Arc::new(AtomicBool::new(false));

        let (queues, producer) = spawn(&config, keyspace, cancel).unwrap();

        let mut expected_index = 0i64;
        while let Ok(payload) = queues.kv.recv() {
            expected_index += 1;
            let KvPayload::Create { key, doc } = payload else {
                panic!("unexpected payload kind");
            };
            assert_eq!(key, format_key(expected_index));
            let reference = docgen::generate(expected_index, &key, 600);
            assert_eq!(doc.first_name, reference.first_name);
            assert_eq!(doc.notes, reference.notes);
        }
        producer.join().unwrap();
    }

    #[test]
    fn test_exhausted_key_space_is_fatal() {
        let mix = Mix {
            delete: 100,
            ..Mix::default()
        };
        let mut config = config(mix, 100);
        config.initial_documents = 5;
        let keyspace = Arc::new(KeySpace::new(config.initial_documents));
        let cancel = Arc::new(AtomicBool::new(false));

        let (queues, producer) = spawn(&config, keyspace, cancel.clone()).unwrap();

        let mut deletes = 0;
        while queues.kv.recv().is_ok() {
            deletes += 1;
        }
        assert_eq!(deletes, 5);
        assert_eq!(producer.join(), Err(WorkloadError::EmptyKeySpace));
        assert!(cancel.load(Ordering::Relaxed));
    }

    #[test]
    fn test_cancel_stops_production() {
        let config = config(Mix::create_only(), 1_000_000);
        let keyspace = Arc::new(KeySpace::new(0));
        let cancel = Arc::new(AtomicBool::new(false));

        // Never drain the queue; the producer must stop while blocked.
        let (_queues, producer) = spawn(&config, keyspace, cancel.clone()).unwrap();
        thread::sleep(Duration::from_millis(50));
        cancel.store(true, Ordering::Relaxed);

        let produced = producer.join().unwrap();
        assert!(produced < 1_000_000);
    }

    #[test]
    fn test_mixed_mode_fills_both_queues() {
        let mix = Mix {
            create: 50,
            query: 50,
            ..Mix::default()
        };
        let mut config = config(mix, 200);
        config.query_kind = Some(QueryKind::ByCategory);
        let keyspace = Arc::new(KeySpace::new(0));
        let cancel = Arc::new(AtomicBool::new(false));

        let (queues, producer) = spawn(&config, keyspace, cancel).unwrap();

        let drainer = thread::spawn(move || {
            let mut kv = 0u64;
            let mut query = 0u64;
            let mut kv_open = true;
            let mut query_open = true;
            while kv_open || query_open {
                crossbeam_channel::select! {
                    recv(queues.kv) -> msg => match msg {
                        Ok(_) => kv += 1,
                        Err(_) => kv_open = false,
                    },
                    recv(queues.query) -> msg => match msg {
                        Ok(_) => query += 1,
                        Err(_) => query_open = false,
                    },
                }
            }
            (kv, query)
        });

        assert_eq!(producer.join().unwrap(), 200);
        let (kv, query) = drainer.join().unwrap();
        // Two full blocks: exactly half creates, half queries.
        assert_eq!(kv, 100);
        assert_eq!(query, 100);
    }
}
