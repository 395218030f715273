//! Shared key space bookkeeping.
//!
//! Keys are dense 1-based indices rendered as fixed-width decimals, keeping
//! numeric and lexicographic order aligned. Two counters drive key choice:
//! `created` grows with every new document and `deleted` trails it as
//! documents are removed oldest-first, so the live range is always
//! `deleted + 1 ..= created`.

use parking_lot::Mutex;
use rand::Rng;

use crate::error::WorkloadError;

/// Render a document index as its store key.
pub fn format_key(index: i64) -> String {
    format!("{:012}", index)
}

#[derive(Debug)]
struct Counters {
    created: i64,
    deleted: i64,
}

/// Counter-backed key space shared by the payload pipeline and tests.
///
/// All operations take `&self` and serialize on an internal lock; the struct
/// is meant to live in an `Arc` next to the queues.
#[derive(Debug)]
pub struct KeySpace {
    inner: Mutex<Counters>,
}

impl KeySpace {
    /// Start with `initial` already-loaded documents and nothing deleted.
    pub fn new(initial: i64) -> Self {
        Self {
            inner: Mutex::new(Counters {
                created: initial.max(0),
                deleted: 0,
            }),
        }
    }

    /// Claim the next unused index. Strictly increasing across threads.
    pub fn next_new(&self) -> i64 {
        let mut c = self.inner.lock();
        c.created += 1;
        c.created
    }

    /// Pick a uniformly random live index.
    pub fn existing<R: Rng>(&self, rng: &mut R) -> Result<i64, WorkloadError> {
        let c = self.inner.lock();
        if c.created <= c.deleted {
            return Err(WorkloadError::EmptyKeySpace);
        }
        Ok(rng.gen_range(c.deleted + 1..=c.created))
    }

    /// Claim the oldest live index for deletion.
    pub fn removal(&self) -> Result<i64, WorkloadError> {
        let mut c = self.inner.lock();
        if c.deleted >= c.created {
            return Err(WorkloadError::EmptyKeySpace);
        }
        c.deleted += 1;
        Ok(c.deleted)
    }

    /// Highest index handed out so far.
    pub fn created(&self) -> i64 {
        self.inner.lock().created
    }

    /// Number of live documents.
    pub fn live(&self) -> i64 {
        let c = self.inner.lock();
        c.created - c.deleted
    }
}
