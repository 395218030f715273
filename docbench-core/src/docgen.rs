//! Deterministic synthetic document generation.
//!
//! Every field of a [`Document`] except `notes` and `uuid` is a pure function
//! of the document index and its seed key, so repeated runs over the same key
//! space produce the same data without storing any of it. `notes` pads the
//! serialized document towards a target size and `uuid` is freshly random so
//! successive loads never collide on it.

use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tables::{CORPORATE_TYPES, STREET_SUFFIXES, UNITED_STATES};

/// Serialized size of a document with empty `notes`, within a few bytes.
///
/// Against the tables in [`crate::tables`], an empty-notes document
/// serializes to roughly `SIZE_OVERHEAD - 19 ..= SIZE_OVERHEAD + 3` bytes
/// depending on the index, so notes of `target - SIZE_OVERHEAD` symbols land
/// the total within that band of the target.
pub const SIZE_OVERHEAD: usize = 481;

/// Symbol table for keyed substitution strings.
const SYMBOLS: &[u8] = b"9CjASFTWkKgHrNl8eJXzfphmyb6ncvR2IDU3P1qiL0s4xYotuEQGB7dwaZ5VOM";

/// Substitution string of `len` symbols derived from `index` and `seed`.
///
/// Position `j` picks `SYMBOLS[(index + j + shift) % SYMBOLS.len()]`, where
/// `shift` is a byte of `seed` taken from a cyclically decreasing position.
/// Same inputs, same output.
pub fn keyed_string(index: i64, seed: &str, len: usize) -> String {
    let seed = seed.as_bytes();
    if seed.is_empty() || len == 0 {
        return String::new();
    }

    let symbols = SYMBOLS.len() as i64;
    let mut out = String::with_capacity(len);
    let mut shifts = seed.len();
    for j in 0..len {
        let shift = i64::from(seed[shifts - 1]);
        let idx = (index + j as i64 + shift).rem_euclid(symbols) as usize;
        out.push(SYMBOLS[idx] as char);
        shifts -= 1;
        if shifts == 0 {
            shifts = seed.len();
        }
    }
    out
}

/// Postal address block nested in every document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub city: String,
    pub county: String,
    pub country: String,
    pub full_state: String,
    pub state: String,
    pub street: String,
    pub zip: i64,
}

/// Synthetic user-profile document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub address: Address,
    pub category: i64,
    pub balance: f64,
    pub dob: String,
    pub uuid: String,
    pub notes: String,
    pub avatar: String,
    pub age: i64,
    pub company: String,
    pub local_group: String,
}

/// Build the document at `index`, with `key` seeding the substitution.
/// `key` must be non-empty.
///
/// `target_size` is the desired serialized size in bytes; targets at or
/// below [`SIZE_OVERHEAD`] leave `notes` empty.
pub fn generate(index: i64, key: &str, target_size: usize) -> Document {
    let alphabet = keyed_string(index, key, 64);

    let notes = if target_size > SIZE_OVERHEAD {
        keyed_string(index << 1, &alphabet, target_size - SIZE_OVERHEAD)
    } else {
        String::new()
    };

    let state_idx = index.rem_euclid(UNITED_STATES.len() as i64) as usize;
    let (state, full_state) = UNITED_STATES[state_idx];

    Document {
        first_name: alphabet[..8].to_string(),
        last_name: alphabet[8..16].to_string(),
        email: format!("{}@{}.com", &alphabet[16..24], &alphabet[24..30]),
        address: Address {
            city: alphabet[30..38].to_string(),
            county: alphabet[38..45].to_string(),
            country: alphabet[45..54].to_string(),
            full_state: full_state.to_string(),
            state: state.to_string(),
            street: street(index),
            zip: 70_000 + index.rem_euclid(20_000),
        },
        category: category(index),
        balance: balance(&alphabet),
        dob: date_of_birth(&alphabet),
        uuid: Uuid::new_v4().to_string(),
        notes,
        avatar: format!("https://www.gravatar.com/avatar/{}", &alphabet[32..]),
        age: base36(&alphabet[5..6]),
        company: company(&alphabet, index),
        local_group: local_group(index),
    }
}

/// Category the document at `index` carries.
pub fn category(index: i64) -> i64 {
    index.rem_euclid(5)
}

/// Hex bucket label shared by every hundred consecutive documents.
pub fn local_group(index: i64) -> String {
    group(index, 100)
}

fn street(index: i64) -> String {
    let building = index.rem_euclid(5_000);
    let suffix_idx = index.rem_euclid(STREET_SUFFIXES.len() as i64) as usize;
    format!(
        "{} {} {} {}",
        building,
        group(index, 10),
        group(index, 1_000 * (1 + index.rem_euclid(3))),
        STREET_SUFFIXES[suffix_idx]
    )
}

fn group(index: i64, capacity: i64) -> String {
    format!("{:x}", index / capacity)
}

fn company(alphabet: &str, index: i64) -> String {
    let form_idx = index.rem_euclid(CORPORATE_TYPES.len() as i64) as usize;
    format!("{} {}", &alphabet[54..64], CORPORATE_TYPES[form_idx])
}

fn balance(alphabet: &str) -> f64 {
    (base36(&alphabet[..3]) as f64 / 100.0).max(0.1)
}

/// One 30-day step per base36 unit of the alphabet's first two symbols.
fn date_of_birth(alphabet: &str) -> String {
    let periods = base36(&alphabet[..2]);
    let t = DateTime::from_timestamp(periods * 30 * 24 * 3600, 0).unwrap_or_default();
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn base36(s: &str) -> i64 {
    // Symbols are alphanumeric, so this only fails on foreign input.
    i64::from_str_radix(s, 36).unwrap_or(0)
}
