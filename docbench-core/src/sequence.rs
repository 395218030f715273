//! Weighted operation sequencing.
//!
//! A [`Mix`] is expanded into a 100-slot block holding each operation kind
//! exactly as often as its percentage; the block is reshuffled whenever it
//! runs out. Frequencies are exact within a block and only statistical
//! across a whole run.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::WorkloadError;

/// One workload operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Create,
    Read,
    Update,
    Delete,
    Query,
}

impl OpKind {
    /// Lowercase name used in logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            OpKind::Create => "create",
            OpKind::Read => "read",
            OpKind::Update => "update",
            OpKind::Delete => "delete",
            OpKind::Query => "query",
        }
    }
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Percentage of each operation kind in the stream; must add up to 100.
///
/// `query` slots drive the secondary-index query configured next to the mix;
/// the other four are plain key-value operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mix {
    #[serde(default)]
    pub create: u32,
    #[serde(default)]
    pub read: u32,
    #[serde(default)]
    pub update: u32,
    #[serde(default)]
    pub delete: u32,
    #[serde(default)]
    pub query: u32,
}

impl Mix {
    /// Pure-insert mix used by the load phase.
    pub fn create_only() -> Self {
        Self {
            create: 100,
            ..Self::default()
        }
    }

    pub fn total(&self) -> u32 {
        self.create + self.read + self.update + self.delete + self.query
    }

    pub fn validate(&self) -> Result<(), WorkloadError> {
        match self.total() {
            100 => Ok(()),
            got => Err(WorkloadError::InvalidMix { got }),
        }
    }

    fn slots(&self) -> Vec<OpKind> {
        let weighted = [
            (OpKind::Create, self.create),
            (OpKind::Read, self.read),
            (OpKind::Update, self.update),
            (OpKind::Delete, self.delete),
            (OpKind::Query, self.query),
        ];
        let mut block = Vec::with_capacity(100);
        for (kind, percent) in weighted {
            block.extend(std::iter::repeat(kind).take(percent as usize));
        }
        block
    }
}

/// Endless operation stream honouring a [`Mix`].
///
/// The iterator never ends; whoever consumes it decides when to stop. Same
/// seed, same stream.
pub struct OpSequence {
    block: Vec<OpKind>,
    pos: usize,
    rng: ChaCha8Rng,
}

impl OpSequence {
    pub fn new(mix: &Mix, seed: u64) -> Result<Self, WorkloadError> {
        mix.validate()?;
        let block = mix.slots();
        Ok(Self {
            pos: block.len(),
            block,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }
}

impl Iterator for OpSequence {
    type Item = OpKind;

    fn next(&mut self) -> Option<OpKind> {
        if self.pos >= self.block.len() {
            self.block.shuffle(&mut self.rng);
            self.pos = 0;
        }
        let kind = self.block[self.pos];
        self.pos += 1;
        Some(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn frequencies(kinds: &[OpKind]) -> HashMap<OpKind, usize> {
        let mut counts = HashMap::new();
        for kind in kinds {
            *counts.entry(*kind).or_insert(0) += 1;
        }
        counts
    }

    #[test]
    fn test_block_frequencies_are_exact() {
        let mix = Mix {
            create: 30,
            read: 70,
            ..Mix::default()
        };
        let mut seq = OpSequence::new(&mix, 42).unwrap();

        for _ in 0..5 {
            let block: Vec<OpKind> = seq.by_ref().take(100).collect();
            let counts = frequencies(&block);
            assert_eq!(counts[&OpKind::Create], 30);
            assert_eq!(counts[&OpKind::Read], 70);
        }
    }

    #[test]
    fn test_all_kinds_present() {
        let mix = Mix {
            create: 25,
            read: 25,
            update: 25,
            delete: 25,
            ..Mix::default()
        };
        let seq = OpSequence::new(&mix, 9).unwrap();
        let counts = frequencies(&seq.take(100).collect::<Vec<_>>());
        assert_eq!(counts.len(), 4);
        assert!(counts.values().all(|&n| n == 25));
    }

    #[test]
    fn test_mixed_mode_block() {
        let mix = Mix {
            create: 50,
            query: 50,
            ..Mix::default()
        };
        let seq = OpSequence::new(&mix, 3).unwrap();
        let counts = frequencies(&seq.take(200).collect::<Vec<_>>());
        assert_eq!(counts[&OpKind::Create], 100);
        assert_eq!(counts[&OpKind::Query], 100);
    }

    #[test]
    fn test_invalid_mix_rejected() {
        let short = Mix {
            create: 30,
            read: 69,
            ..Mix::default()
        };
        assert_eq!(
            OpSequence::new(&short, 1).err(),
            Some(WorkloadError::InvalidMix { got: 99 })
        );

        let long = Mix {
            create: 60,
            read: 60,
            ..Mix::default()
        };
        assert_eq!(
            OpSequence::new(&long, 1).err(),
            Some(WorkloadError::InvalidMix { got: 120 })
        );

        assert!(Mix::create_only().validate().is_ok());
    }

    #[test]
    fn test_same_seed_same_stream() {
        let mix = Mix {
            create: 10,
            read: 40,
            update: 30,
            delete: 20,
            ..Mix::default()
        };
        let a: Vec<OpKind> = OpSequence::new(&mix, 77).unwrap().take(300).collect();
        let b: Vec<OpKind> = OpSequence::new(&mix, 77).unwrap().take(300).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_sequence_is_endless() {
        let mut seq = OpSequence::new(&Mix::create_only(), 5).unwrap();
        // Far past several blocks, including sums that are not multiples of 100.
        for _ in 0..1_234 {
            assert_eq!(seq.next(), Some(OpKind::Create));
        }
    }
}
