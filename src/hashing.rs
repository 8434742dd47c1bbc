//! Deterministic `HashMap` and `HashSet` aliases and a string hash used to derive
//! per-RNG seeds.
//!
//! The standard library's default hasher is randomly seeded per process, which
//! would make iteration order (and therefore anything that draws random numbers
//! while iterating) differ between runs. Everything in the model that hashes uses
//! the Fx hasher from `rustc-hash` instead.
//!
//! `HashMap<K, V, S>` only has a `new` method for the default `RandomState`, so
//! `HashMapExt` / `HashSetExt` provide one. The traits need only be in scope.

use std::hash::{BuildHasher, Hasher};

use rustc_hash::{FxBuildHasher, FxHasher};

pub type HashMap<K, V> = rustc_hash::FxHashMap<K, V>;
pub type HashSet<T> = rustc_hash::FxHashSet<T>;

pub trait HashMapExt {
    fn new() -> Self;
    fn with_capacity(capacity: usize) -> Self;
}

impl<K, V> HashMapExt for HashMap<K, V> {
    fn new() -> Self {
        HashMap::with_hasher(FxBuildHasher)
    }

    fn with_capacity(capacity: usize) -> Self {
        HashMap::with_capacity_and_hasher(capacity, FxBuildHasher)
    }
}

pub trait HashSetExt {
    fn new() -> Self;
}

impl<T> HashSetExt for HashSet<T> {
    fn new() -> Self {
        HashSet::with_hasher(FxBuildHasher)
    }
}

/// A convenience method to compute the hash of a `&str`.
#[must_use]
pub fn hash_str(data: &str) -> u64 {
    let mut hasher: FxHasher = FxBuildHasher.build_hasher();
    hasher.write(data.as_bytes());
    hasher.finish()
}
