use std::hash::{Hash, Hasher};

use xxhash_rust::xxh3::Xxh3;

use super::operation::Operation;

/// Stable hash of an operation's shape. Used as the plan cache key.
///
/// Xxh3 is seeded with a constant, so the same operation hashes to the same value
/// across processes.
pub fn operation_hash(operation: &Operation) -> u64 {
    let mut hasher = Xxh3::new();
    operation.hash(&mut hasher);
    hasher.finish()
}
