//! Input-keyed memoization for pure async lookups.
//!
//! The pipeline classifies the same paths and normalizes the same strings
//! over and over: every line of a file shares its path, and normalizer
//! inputs repeat across files. [`MemoCache`] remembers those results.
//!
//! # Concurrency
//!
//! The map is a [`DashMap`], so any number of tasks may read and insert
//! concurrently. Computation happens outside of any shard lock. Two callers
//! racing on the same missing key may both compute it; the first insert
//! wins and both callers observe that value.
//!
//! # Examples
//!
//! ```rust
//! use grdep::cache::MemoCache;
//!
//! # async fn example() {
//! let cache: MemoCache<String, usize> = MemoCache::new();
//! let len = cache.get_or_compute("abc".to_string(), || async { 3 }).await;
//! assert_eq!(len, 3);
//! // the second computation is never run
//! let len = cache.get_or_compute("abc".to_string(), || async { 0 }).await;
//! assert_eq!(len, 3);
//! # }
//! ```

use dashmap::DashMap;
use std::borrow::Borrow;
use std::future::Future;
use std::hash::Hash;

/// Concurrent memo table.
#[derive(Debug)]
pub struct MemoCache<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, V>,
}

impl<K, V> Default for MemoCache<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<K, V> MemoCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the cached value for `key`, if any.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Returns the cached value for `key`, computing and storing it first if
    /// it is missing.
    pub async fn get_or_compute<F, Fut>(&self, key: K, compute: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        if let Some(value) = self.get(&key) {
            return value;
        }
        let value = compute().await;
        self.entries.entry(key).or_insert(value).value().clone()
    }

    /// Like [`MemoCache::get_or_compute`], but only successful values are
    /// stored. Errors are returned to the caller and the next lookup
    /// computes again.
    pub async fn try_get_or_compute<F, Fut, E>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = compute().await?;
        Ok(self.entries.entry(key).or_insert(value).value().clone())
    }

    /// Number of cached keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every cached value.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

/// A component paired with a cache of its results keyed by input string.
///
/// Components that benefit from memoization get an inherent `impl` on
/// their `Memoized` form next to their own definition, exposing the same
/// call signature as the bare component.
#[derive(Debug)]
pub struct Memoized<S, V> {
    inner: S,
    cache: MemoCache<String, V>,
}

impl<S, V: Clone> Memoized<S, V> {
    /// Wraps `inner` with an empty cache.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cache: MemoCache::new(),
        }
    }

    /// The wrapped component.
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    /// Mutable access to the wrapped component, e.g. to close it.
    pub const fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// The result cache.
    pub const fn cache(&self) -> &MemoCache<String, V> {
        &self.cache
    }

    /// Unwraps the component, dropping the cache.
    pub fn into_inner(self) -> S {
        self.inner
    }
}
