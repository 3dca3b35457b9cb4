//! Insertion-ordered key/value store with a capacity limit.
//!
//! [`BoundedCache`] evicts the **oldest inserted** entry once it holds more
//! entries than its [`Capacity`]. Re-setting an existing key replaces the value
//! in place and keeps its original position, so the eviction order is not an LRU.
//!
//! ```rust
//! use ferrogram_core::{BoundedCache, Capacity};
//!
//! let mut cache = BoundedCache::new(Capacity::Bounded(2));
//! cache.set("a", 1);
//! cache.set("b", 2);
//! cache.set("a", 10); // updates, keeps "a" as the oldest
//! cache.set("c", 3); // evicts "a"
//!
//! assert!(cache.get(&"a").is_none());
//! assert_eq!(cache.keys().collect::<Vec<_>>(), vec![&"b", &"c"]);
//! ```
//!
//! The cache is a plain data structure. Callers that share it across tasks wrap
//! it in a lock, as [`EntityManager`](crate::EntityManager) does.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

/// Maximum number of entries a cache may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Capacity {
    /// At most this many entries are retained.
    Bounded(usize),
    /// No limit.
    #[default]
    Unbounded,
}

impl Capacity {
    /// Returns `true` if `len` entries exceed this capacity.
    pub fn is_exceeded_by(self, len: usize) -> bool {
        match self {
            Self::Bounded(max) => len > max,
            Self::Unbounded => false,
        }
    }

    /// Returns the limit, or `None` when unbounded.
    pub fn limit(self) -> Option<usize> {
        match self {
            Self::Bounded(max) => Some(max),
            Self::Unbounded => None,
        }
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounded(max) => write!(f, "{max}"),
            Self::Unbounded => write!(f, "unbounded"),
        }
    }
}

impl Serialize for Capacity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Bounded(max) => serializer.serialize_u64(*max as u64),
            Self::Unbounded => serializer.serialize_str("unbounded"),
        }
    }
}

/// Accepts a non-negative integer, a negative integer or infinity (unbounded),
/// and the strings `"unbounded"` / `"infinity"`.
impl<'de> Deserialize<'de> for Capacity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Int(i64),
            Float(f64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Int(n) if n < 0 => Ok(Self::Unbounded),
            Repr::Int(n) => usize::try_from(n)
                .map(Self::Bounded)
                .map_err(|_| de::Error::custom("capacity out of range")),
            Repr::Float(f) if f.is_infinite() || f < 0.0 => Ok(Self::Unbounded),
            Repr::Float(f) if f.fract() == 0.0 && f <= usize::MAX as f64 => {
                Ok(Self::Bounded(f as usize))
            }
            Repr::Float(f) => Err(de::Error::custom(format!("invalid capacity: {f}"))),
            Repr::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "unbounded" | "infinity" | "inf" | "unlimited" => Ok(Self::Unbounded),
                other => other
                    .parse::<usize>()
                    .map(Self::Bounded)
                    .map_err(|_| de::Error::custom(format!("invalid capacity: {s}"))),
            },
        }
    }
}

struct Slot<V> {
    seq: u64,
    value: V,
}

/// Insertion-ordered map that evicts its oldest entry when over capacity.
pub struct BoundedCache<K, V> {
    entries: HashMap<K, Slot<V>>,
    /// Insertion sequence number -> key, oldest first.
    order: BTreeMap<u64, K>,
    next_seq: u64,
    capacity: Capacity,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Creates an empty cache with the given capacity.
    pub fn new(capacity: Capacity) -> Self {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_seq: 0,
            capacity,
        }
    }

    /// Creates an empty cache without a size limit.
    pub fn unbounded() -> Self {
        Self::new(Capacity::Unbounded)
    }

    /// Returns the configured capacity.
    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    /// Changes the capacity, evicting the oldest entries if the cache is now over it.
    pub fn set_capacity(&mut self, capacity: Capacity) -> Vec<(K, V)> {
        self.capacity = capacity;
        self.evict_overflow()
    }

    /// Inserts or updates `key`.
    ///
    /// An existing key keeps its insertion position. A new key goes to the back;
    /// if that pushes the cache over capacity, the oldest entry is evicted and
    /// returned.
    pub fn set(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(slot) = self.entries.get_mut(&key) {
            slot.value = value;
            return None;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, key.clone());
        self.entries.insert(key, Slot { seq, value });

        self.evict_overflow().pop()
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|slot| &slot.value)
    }

    /// Returns a mutable reference to the value stored under `key`.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries.get_mut(key).map(|slot| &mut slot.value)
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Removes `key`, returning whether it was present.
    pub fn delete(&mut self, key: &K) -> bool {
        self.take(key).is_some()
    }

    /// Removes `key` and returns its value.
    pub fn take(&mut self, key: &K) -> Option<V> {
        let slot = self.entries.remove(key)?;
        self.order.remove(&slot.seq);
        Some(slot.value)
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in insertion order, oldest first.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.order.values()
    }

    /// Entries in insertion order, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.order
            .values()
            .filter_map(|key| self.entries.get(key).map(|slot| (key, &slot.value)))
    }

    fn evict_overflow(&mut self) -> Vec<(K, V)> {
        let mut evicted = Vec::new();
        while self.capacity.is_exceeded_by(self.entries.len()) {
            let Some((_, key)) = self.order.pop_first() else {
                break;
            };
            if let Some(slot) = self.entries.remove(&key) {
                evicted.push((key, slot.value));
            }
        }
        evicted
    }
}

impl<K, V> Default for BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::unbounded()
    }
}

impl<K, V> fmt::Debug for BoundedCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedCache")
            .field("len", &self.entries.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overflow_evicts_oldest() {
        let mut cache = BoundedCache::new(Capacity::Bounded(3));
        for i in 0..3 {
            assert!(cache.set(i, i * 10).is_none());
        }

        let evicted = cache.set(3, 30);

        assert_eq!(evicted, Some((0, 0)));
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_reset_keeps_position() {
        let mut cache = BoundedCache::new(Capacity::Bounded(2));
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("a", 3);

        assert_eq!(cache.get(&"a"), Some(&3));

        cache.set("c", 4);
        assert!(!cache.contains_key(&"a"));
        assert_eq!(
            cache.iter().map(|(k, v)| (*k, *v)).collect::<Vec<_>>(),
            vec![("b", 2), ("c", 4)]
        );
    }

    #[test]
    fn test_delete_then_evict_skips_deleted() {
        let mut cache = BoundedCache::new(Capacity::Bounded(2));
        cache.set(1, ());
        cache.set(2, ());
        assert!(cache.delete(&1));
        assert!(!cache.delete(&1));

        cache.set(3, ());
        assert!(cache.set(4, ()).is_some());
        assert_eq!(cache.keys().copied().collect::<Vec<_>>(), vec![3, 4]);
    }

    #[test]
    fn test_unbounded_never_evicts() {
        let mut cache = BoundedCache::unbounded();
        for i in 0..1000 {
            assert!(cache.set(i, i).is_none());
        }
        assert_eq!(cache.len(), 1000);
    }

    #[test]
    fn test_zero_capacity_retains_nothing() {
        let mut cache = BoundedCache::new(Capacity::Bounded(0));
        assert_eq!(cache.set("k", 1), Some(("k", 1)));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_shrinking_capacity_evicts_in_order() {
        let mut cache = BoundedCache::unbounded();
        for i in 0..5 {
            cache.set(i, ());
        }
        let evicted: Vec<_> = cache
            .set_capacity(Capacity::Bounded(2))
            .into_iter()
            .map(|(k, _)| k)
            .collect();

        assert_eq!(evicted, vec![0, 1, 2]);
        assert_eq!(cache.keys().copied().collect::<Vec<_>>(), vec![3, 4]);
    }

    #[test]
    fn test_capacity_deserialize() {
        let parse = |s: &str| serde_json::from_str::<Capacity>(s).unwrap();

        assert_eq!(parse("200"), Capacity::Bounded(200));
        assert_eq!(parse("-1"), Capacity::Unbounded);
        assert_eq!(parse("\"unbounded\""), Capacity::Unbounded);
        assert_eq!(parse("\"Infinity\""), Capacity::Unbounded);
        assert!(serde_json::from_str::<Capacity>("\"lots\"").is_err());
    }
}
