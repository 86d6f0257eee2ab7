//! Hash-based edge id generation.
//!
//! Ids look like `dep-k3f9az`: a configurable prefix plus a base36 rendering
//! of a SHA-256 digest over the edge's endpoints, a timestamp and a nonce.
//! The hash part grows with the size of the store so collisions stay rare,
//! and a collision against an existing id is retried with the next nonce.

use chrono::Utc;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};

const BASE36_CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const MAX_NONCE: u32 = 100;
const MAX_LENGTH: usize = 8;

/// Default prefix for edge ids.
pub const DEFAULT_EDGE_PREFIX: &str = "dep";

/// Errors that can occur during id generation
#[derive(Debug, Error)]
pub enum IdGenerationError {
    /// Every nonce collided at every permitted length
    #[error("unable to generate a unique id after {attempts} attempts")]
    CollisionExhausted {
        /// Number of candidates tried
        attempts: u32,
    },

    /// Prefix is empty or contains characters not allowed in ids
    #[error("invalid id prefix '{0}'")]
    InvalidPrefix(String),
}

/// Hash-based id generator for dependency edges.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    prefix: String,
}

impl IdGenerator {
    /// Create a generator for the given prefix.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPrefix` unless the prefix is non-empty lowercase
    /// alphanumeric (hyphens allowed inside).
    pub fn new(prefix: impl Into<String>) -> Result<Self, IdGenerationError> {
        let prefix = prefix.into();
        if !is_valid_prefix(&prefix) {
            return Err(IdGenerationError::InvalidPrefix(prefix));
        }
        Ok(Self { prefix })
    }

    /// The configured prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Generate an id not rejected by `is_taken`.
    ///
    /// `seed` should identify the edge being created (its endpoints and
    /// type); `existing` is the number of stored edges and drives the
    /// adaptive length.
    ///
    /// # Errors
    ///
    /// Returns `CollisionExhausted` if no free id was found.
    pub fn generate(
        &self,
        seed: &str,
        existing: usize,
        is_taken: impl Fn(&str) -> bool,
    ) -> Result<String, IdGenerationError> {
        let timestamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let mut attempts = 0;

        for length in adaptive_length(existing)..=MAX_LENGTH {
            for nonce in 0..MAX_NONCE {
                attempts += 1;
                let id = self.hash_id(seed, timestamp, nonce, length);
                if !is_taken(&id) {
                    if attempts > 1 {
                        debug!(attempts, length, "Generated unique edge id after collisions");
                    }
                    return Ok(id);
                }
            }
            warn!(length, "All nonces exhausted, increasing id length");
        }

        Err(IdGenerationError::CollisionExhausted { attempts })
    }

    fn hash_id(&self, seed: &str, timestamp: i64, nonce: u32, length: usize) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{seed}|{timestamp}|{nonce}").as_bytes());
        let digest = hasher.finalize();

        let mut num: u64 = 0;
        for &byte in &digest[..8] {
            num = (num << 8) | u64::from(byte);
        }

        format!("{}-{}", self.prefix, encode_base36(num, length))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_EDGE_PREFIX.to_string(),
        }
    }
}

/// Hash length for a store holding `existing` edges.
///
/// - up to 1,000 edges: 6 chars
/// - up to 30,000: 7 chars
/// - beyond: 8 chars
fn adaptive_length(existing: usize) -> usize {
    match existing {
        0..=1_000 => 6,
        1_001..=30_000 => 7,
        _ => MAX_LENGTH,
    }
}

fn encode_base36(mut n: u64, length: usize) -> String {
    let mut out = Vec::with_capacity(length);
    while out.len() < length {
        // Index is always < 36.
        #[allow(clippy::cast_possible_truncation)]
        out.push(char::from(BASE36_CHARS[(n % 36) as usize]));
        n /= 36;
    }
    out.iter().rev().collect()
}

/// Whether `prefix` is usable as an id prefix.
#[must_use]
pub fn is_valid_prefix(prefix: &str) -> bool {
    !prefix.is_empty()
        && !prefix.starts_with('-')
        && !prefix.ends_with('-')
        && prefix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::cell::Cell;
    use std::collections::HashSet;

    #[test]
    fn generated_id_has_prefix_and_length() {
        let generator = IdGenerator::default();
        let id = generator.generate("t1|t2|blocks", 0, |_| false).unwrap();

        let hash = id.strip_prefix("dep-").unwrap();
        assert_eq!(hash.len(), 6);
        assert!(hash.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[rstest]
    #[case(0, 6)]
    #[case(1_000, 6)]
    #[case(1_001, 7)]
    #[case(30_001, 8)]
    fn length_grows_with_store(#[case] existing: usize, #[case] expected: usize) {
        assert_eq!(adaptive_length(existing), expected);
    }

    #[test]
    fn collisions_retry_with_next_nonce() {
        let generator = IdGenerator::default();
        let calls = Cell::new(0);
        let id = generator
            .generate("seed", 0, |_| {
                calls.set(calls.get() + 1);
                calls.get() <= 3
            })
            .unwrap();

        assert!(id.starts_with("dep-"));
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn exhaustion_is_an_error() {
        let generator = IdGenerator::default();
        let err = generator.generate("seed", 0, |_| true).unwrap_err();
        assert!(matches!(err, IdGenerationError::CollisionExhausted { attempts: 300 }));
    }

    #[test]
    fn many_ids_are_distinct() {
        let generator = IdGenerator::default();
        let mut seen = HashSet::new();
        for i in 0..200 {
            let id = generator
                .generate(&format!("t{i}|t{}|blocks", i + 1), seen.len(), |c| {
                    seen.contains(c)
                })
                .unwrap();
            assert!(seen.insert(id));
        }
    }

    #[rstest]
    #[case("dep", true)]
    #[case("my-deps2", true)]
    #[case("", false)]
    #[case("Dep", false)]
    #[case("-dep", false)]
    #[case("dep_x", false)]
    fn prefix_validation(#[case] prefix: &str, #[case] valid: bool) {
        assert_eq!(IdGenerator::new(prefix).is_ok(), valid);
    }
}
