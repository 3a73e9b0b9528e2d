//! FNV-1a Hashing
//!
//! Deterministic, non-cryptographic fingerprints for cache keys. There is no
//! random seed: the same bytes hash to the same value on every run and on
//! every platform.

use std::hash::{BuildHasher, Hasher};

// == Constants ==
pub const OFFSET32: u32 = 0x811c_9dc5;
pub const PRIME32: u32 = 0x0100_0193;
pub const OFFSET64: u64 = 0xcbf2_9ce4_8422_2325;
pub const PRIME64: u64 = 0x0000_0100_0000_01b3;

// == Hash 64a ==
/// 64-bit FNV-1a over raw bytes.
///
/// Strings are hashed through their UTF-8 encoding.
pub fn hash64a(input: impl AsRef<[u8]>) -> u64 {
    input.as_ref().iter().fold(OFFSET64, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(PRIME64)
    })
}

/// 32-bit FNV-1a over raw bytes.
pub fn hash32a(input: impl AsRef<[u8]>) -> u32 {
    input.as_ref().iter().fold(OFFSET32, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(PRIME32)
    })
}

// == Hasher ==
/// [`Hasher`] implementation of 64-bit FNV-1a.
///
/// Note that `Hash` impls may feed extra bytes (`str` appends a `0xff`
/// terminator), so `FnvHasher` over a `String` differs from [`hash64a`] over
/// the same text. Both are stable across runs.
#[derive(Debug, Clone, Copy)]
pub struct FnvHasher(u64);

impl Default for FnvHasher {
    fn default() -> Self {
        Self(OFFSET64)
    }
}

impl Hasher for FnvHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.0 = (self.0 ^ u64::from(*byte)).wrapping_mul(PRIME64);
        }
    }
}

/// Unseeded [`BuildHasher`] producing [`FnvHasher`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct FnvBuildHasher;

impl BuildHasher for FnvBuildHasher {
    type Hasher = FnvHasher;

    fn build_hasher(&self) -> FnvHasher {
        FnvHasher::default()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "this is a sample content";

    #[test]
    fn test_empty_input_is_offset() {
        assert_eq!(hash64a(""), OFFSET64);
        assert_eq!(hash64a([]), 0xcbf29ce484222325);
        assert_eq!(hash32a(""), OFFSET32);
    }

    #[test]
    fn test_sample_is_deterministic() {
        let first = hash64a(SAMPLE);
        let second = hash64a(SAMPLE);

        assert_ne!(first, 0);
        assert_eq!(first, second);
        assert_eq!(first, 0xb732af28cbdd40e3);
    }

    #[test]
    fn test_known_vectors() {
        assert_eq!(hash64a("a"), 0xaf63dc4c8601ec8c);
        assert_eq!(hash64a("foobar"), 0x85944171f73967e8);
        assert_eq!(hash32a("a"), 0xe40c292c);
        assert_eq!(hash32a("foobar"), 0xbf9cf968);
    }

    #[test]
    fn test_str_and_bytes_agree() {
        assert_eq!(hash64a(SAMPLE), hash64a(SAMPLE.as_bytes()));
        assert_eq!(hash64a(String::from(SAMPLE)), hash64a(SAMPLE.as_bytes().to_vec()));
    }

    #[test]
    fn test_nearby_inputs_disperse() {
        let distances: Vec<u32> = (0..1000)
            .map(|i| {
                let a = hash64a(format!("item-{}", i));
                let b = hash64a(format!("item-{}", i + 1));
                (a ^ b).count_ones()
            })
            .collect();

        assert!(distances.iter().all(|d| *d > 0));
        let mean = distances.iter().sum::<u32>() as f64 / distances.len() as f64;
        assert!(mean >= 8.0, "mean bit distance too low: {}", mean);
    }

    #[test]
    fn test_hasher_matches_free_function_on_raw_bytes() {
        let mut hasher = FnvBuildHasher.build_hasher();
        hasher.write(SAMPLE.as_bytes());
        assert_eq!(hasher.finish(), hash64a(SAMPLE));
    }

    #[test]
    fn test_build_hasher_is_unseeded() {
        let a = FnvBuildHasher.hash_one("cache-key");
        let b = FnvBuildHasher.hash_one("cache-key");
        assert_eq!(a, b);
    }
}
