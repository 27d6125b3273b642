//! SHA-256 content hashing and FNV-1a feature hashing.

use sha2::{Digest, Sha256};

/// Calculate the SHA-256 hash of in-memory data.
pub fn sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// Incremental FNV-1a 64-bit hasher for deterministic feature hashing.
///
/// Unlike `std::hash`, the output is stable across platforms and
/// releases, which fingerprints and structural hashes require.
#[derive(Debug, Clone, Copy)]
pub struct Fnv1a(u64);

impl Fnv1a {
    pub fn new() -> Self {
        Fnv1a(FNV_OFFSET)
    }

    /// Mix a 64-bit value into the hash, byte by byte.
    pub fn update(&mut self, value: u64) -> &mut Self {
        for &b in &value.to_le_bytes() {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(FNV_PRIME);
        }
        self
    }

    pub fn finish(&self) -> u64 {
        self.0
    }
}

impl Default for Fnv1a {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot FNV-1a hash of a byte slice.
pub fn fnv1a_bytes(data: &[u8]) -> u64 {
    let mut h = FNV_OFFSET;
    for &b in data {
        h ^= b as u64;
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        assert_eq!(
            sha256(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn fnv_is_deterministic() {
        let mut a = Fnv1a::new();
        a.update(42).update(7);
        let mut b = Fnv1a::new();
        b.update(42).update(7);
        assert_eq!(a.finish(), b.finish());
    }

    #[test]
    fn fnv_order_sensitive() {
        let mut a = Fnv1a::new();
        a.update(1).update(2);
        let mut b = Fnv1a::new();
        b.update(2).update(1);
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn fnv_bytes_empty_is_offset() {
        assert_eq!(fnv1a_bytes(&[]), 0xcbf29ce484222325);
    }
}
