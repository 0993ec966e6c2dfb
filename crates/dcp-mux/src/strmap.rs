//! Byte-string keyed hash map with a fixed bucket count
//!
//! Keys are arbitrary byte strings hashed with FNV-1a. The bucket count is
//! chosen at creation and never changes; each bucket is a short chain.

use std::ops::ControlFlow;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Buckets used by [`StrMap::default`]
pub const DEFAULT_BUCKETS: usize = 64;

/// Outcome of [`StrMap::iterate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterStatus {
    /// Every entry was visited
    Completed,
    /// The visitor stopped early
    Stopped,
}

fn fnv1a(key: &[u8]) -> u64 {
    key.iter()
        .fold(FNV_OFFSET, |hash, &b| (hash ^ b as u64).wrapping_mul(FNV_PRIME))
}

/// Chained hash map from byte strings to `V`
#[derive(Debug, Clone)]
pub struct StrMap<V> {
    buckets: Vec<Vec<(Box<[u8]>, V)>>,
    len: usize,
}

impl<V> Default for StrMap<V> {
    fn default() -> Self {
        Self::with_buckets(DEFAULT_BUCKETS)
    }
}

impl<V> StrMap<V> {
    /// Create a map with `capacity` buckets; `None` if `capacity` is zero
    pub fn new(capacity: usize) -> Option<Self> {
        (capacity > 0).then(|| Self::with_buckets(capacity))
    }

    fn with_buckets(capacity: usize) -> Self {
        let mut buckets = Vec::with_capacity(capacity);
        buckets.resize_with(capacity, Vec::new);
        Self { buckets, len: 0 }
    }

    fn bucket(&self, key: &[u8]) -> usize {
        (fnv1a(key) % self.buckets.len() as u64) as usize
    }

    /// Value stored under `key`
    pub fn get(&self, key: impl AsRef<[u8]>) -> Option<&V> {
        let key = key.as_ref();
        self.buckets[self.bucket(key)]
            .iter()
            .find(|(k, _)| &**k == key)
            .map(|(_, v)| v)
    }

    /// Mutable value stored under `key`
    pub fn get_mut(&mut self, key: impl AsRef<[u8]>) -> Option<&mut V> {
        let key = key.as_ref();
        let idx = self.bucket(key);
        self.buckets[idx]
            .iter_mut()
            .find(|(k, _)| &**k == key)
            .map(|(_, v)| v)
    }

    /// Whether `key` is present
    pub fn exists(&self, key: impl AsRef<[u8]>) -> bool {
        self.get(key).is_some()
    }

    /// Store `value` under `key`, or remove the key when `value` is `None`
    ///
    /// Returns the value previously stored under `key`.
    pub fn put(&mut self, key: impl AsRef<[u8]>, value: Option<V>) -> Option<V> {
        let key = key.as_ref();
        let idx = self.bucket(key);
        let chain = &mut self.buckets[idx];
        let pos = chain.iter().position(|(k, _)| &**k == key);

        match (pos, value) {
            (Some(pos), Some(value)) => Some(std::mem::replace(&mut chain[pos].1, value)),
            (Some(pos), None) => {
                self.len -= 1;
                Some(chain.swap_remove(pos).1)
            }
            (None, Some(value)) => {
                chain.push((key.into(), value));
                self.len += 1;
                None
            }
            (None, None) => None,
        }
    }

    /// Visit every entry until the visitor breaks
    pub fn iterate<F>(&self, mut visit: F) -> IterStatus
    where
        F: FnMut(&[u8], &V) -> ControlFlow<()>,
    {
        for (key, value) in self.iter() {
            if visit(key, value).is_break() {
                return IterStatus::Stopped;
            }
        }
        IterStatus::Completed
    }

    /// Iterate over all entries in bucket order
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &V)> {
        self.buckets
            .iter()
            .flatten()
            .map(|(k, v)| (&**k, v))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of buckets
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }
}
