//! Append-only, lock-free associative cache
//!
//! A singly linked list of immutable nodes whose head is replaced with an
//! atomic compare-and-swap. Keys are matched by identity, never by value
//! equality. Entries are never removed or overwritten: when two writers race
//! to add the same key, the first node to be linked wins and the loser is
//! handed the winner's value.
//!
//! Lookups are `O(n)` in the number of entries. The cache is meant for small,
//! bounded key spaces such as the set of concrete driver types seen by a
//! process.

use arc_swap::ArcSwapOption;
use std::any::TypeId;
use std::sync::Arc;

/// Keys compared by identity
pub trait Identity {
    /// True if both keys denote the same underlying object
    fn is_same(&self, other: &Self) -> bool;
}

impl<T: ?Sized> Identity for Arc<T> {
    fn is_same(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(self), Arc::as_ptr(other))
    }
}

impl<T: ?Sized> Identity for &'static T {
    fn is_same(&self, other: &Self) -> bool {
        std::ptr::addr_eq(*self, *other)
    }
}

/// A `TypeId` is the identity of a runtime type.
impl Identity for TypeId {
    fn is_same(&self, other: &Self) -> bool {
        self == other
    }
}

/// Immutable cache node
pub struct Link<K, V> {
    key: K,
    value: V,
    tail: Option<Arc<Link<K, V>>>,
}

impl<K: Identity, V> Link<K, V> {
    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn tail(&self) -> Option<&Arc<Link<K, V>>> {
        self.tail.as_ref()
    }

    /// Walk the chain starting at `link`, returning the first value whose key
    /// is identical to `key`
    pub fn find<'a>(mut link: Option<&'a Arc<Link<K, V>>>, key: &K) -> Option<&'a V> {
        while let Some(node) = link {
            if node.key.is_same(key) {
                return Some(&node.value);
            }
            link = node.tail.as_ref();
        }
        None
    }
}

/// Outcome of [`LinkCache::try_add`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Added<V> {
    /// The caller's value was linked
    Inserted(V),
    /// The key was already present; carries the value already stored
    Existing(V),
}

impl<V> Added<V> {
    pub fn inserted(&self) -> bool {
        matches!(self, Added::Inserted(_))
    }

    /// The value every caller should use for this key
    pub fn into_value(self) -> V {
        match self {
            Added::Inserted(v) | Added::Existing(v) => v,
        }
    }
}

/// Lock-free append-only cache keyed by identity
pub struct LinkCache<K, V> {
    head: ArcSwapOption<Link<K, V>>,
}

impl<K, V> Default for LinkCache<K, V> {
    fn default() -> Self {
        Self {
            head: ArcSwapOption::empty(),
        }
    }
}

impl<K: Identity, V: Clone> LinkCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current head of the chain
    pub fn snapshot(&self) -> Option<Arc<Link<K, V>>> {
        self.head.load_full()
    }

    /// Look up `key`, cloning the stored value
    pub fn get(&self, key: &K) -> Option<V> {
        let head = self.head.load();
        Link::find((*head).as_ref(), key).cloned()
    }

    /// Link `key -> value` unless the key is already present.
    ///
    /// Retries without bound when another writer moves the head between the
    /// snapshot and the swap.
    pub fn try_add(&self, key: K, value: V) -> Added<V>
    where
        K: Clone,
    {
        loop {
            let snapshot = self.head.load_full();
            if let Some(found) = Link::find(snapshot.as_ref(), &key) {
                return Added::Existing(found.clone());
            }

            let candidate = Arc::new(Link {
                key: key.clone(),
                value: value.clone(),
                tail: snapshot.clone(),
            });
            let previous = self.head.compare_and_swap(&snapshot, Some(candidate));
            if same_node(&*previous, &snapshot) {
                return Added::Inserted(value);
            }
        }
    }

    /// Number of linked entries
    pub fn len(&self) -> usize {
        let head = self.head.load();
        let mut link = (*head).as_ref();
        let mut count = 0;
        while let Some(node) = link {
            count += 1;
            link = node.tail.as_ref();
        }
        count
    }

    pub fn is_empty(&self) -> bool {
        self.head.load().is_none()
    }
}

fn same_node<K, V>(a: &Option<Arc<Link<K, V>>>, b: &Option<Arc<Link<K, V>>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

impl<K, V> Drop for LinkCache<K, V> {
    fn drop(&mut self) {
        // Unlink iteratively so a long chain cannot overflow the stack.
        let mut link = self.head.swap(None);
        while let Some(node) = link {
            link = match Arc::try_unwrap(node) {
                Ok(mut node) => node.tail.take(),
                Err(_) => None,
            };
        }
    }
}
