//! One-byte rolling fingerprint for tamper evidence.
//!
//! Folds bytes with `state = 31 * state + byte` in wrapping `u8` arithmetic,
//! starting from 1. The width is deliberately narrow: collisions are common
//! and acceptable. This detects accidental or careless corruption, nothing
//! stronger.

/// Multiplier applied to the running state before each byte is folded in.
pub const FACTOR: u8 = 31;

/// Streaming accumulator. See [digest_of] for the one-shot form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Digest {
    state: u8,
}

impl Digest {
    pub fn new() -> Self {
        Self { state: 1 }
    }

    /// Fold `bytes` into the state, in order.
    pub fn update(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.state = self.state.wrapping_mul(FACTOR).wrapping_add(b);
        }
    }

    /// Fold a `usize` in native-endian byte order.
    pub fn update_usize(&mut self, word: usize) {
        self.update(&word.to_ne_bytes());
    }

    pub fn finalize(self) -> u8 {
        self.state
    }
}

impl Default for Digest {
    fn default() -> Self {
        Self::new()
    }
}

/// Fingerprint of a byte slice.
pub fn digest_of(bytes: &[u8]) -> u8 {
    let mut d = Digest::new();
    d.update(bytes);
    d.finalize()
}
