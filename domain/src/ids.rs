//! Record id generation strategies.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::IdGenerator;

/// Random ids: `<prefix><uuid v4>`, e.g. `mock-3f2b...`.
#[derive(Clone, Debug)]
pub struct UuidIds {
    prefix: String,
}

impl UuidIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for UuidIds {
    fn default() -> Self {
        Self::new("mock-")
    }
}

impl IdGenerator for UuidIds {
    fn next_id(&self) -> String {
        format!("{}{}", self.prefix, uuid::Uuid::new_v4())
    }
}

const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Encode an unsigned 64-bit integer into base62 (0-9, A-Z, a-z). Zero
/// encodes to "0".
pub fn encode_base62(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    // 62^11 > 2^64
    let mut out = Vec::with_capacity(11);
    while n > 0 {
        out.push(ALPHABET[(n % 62) as usize] as char);
        n /= 62;
    }
    out.iter().rev().collect()
}

/// Deterministic ids for tests and demos: `<prefix><base62 counter>`,
/// left-padded with '0' to `min_width`.
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    min_width: usize,
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>, min_width: usize) -> Self {
        Self {
            prefix: prefix.into(),
            min_width,
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!(
            "{}{:0>width$}",
            self.prefix,
            encode_base62(n),
            width = self.min_width
        )
    }
}
