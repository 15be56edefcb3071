// ── Ordered keyed collection ──
//
// Insertion-ordered storage with keyed lookup. Updates replace values in
// place so list positions stay stable across merges; only removal shifts
// later items up.

use std::hash::Hash;
use std::sync::Arc;

use indexmap::{Equivalent, IndexMap};

/// What an upsert did to the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Upsert {
    Inserted,
    Updated,
    Unchanged,
}

impl Upsert {
    pub(crate) fn changed(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

pub(crate) struct OrderedCollection<K, V> {
    items: IndexMap<K, Arc<V>>,
}

impl<K, V> OrderedCollection<K, V>
where
    K: Hash + Eq,
    V: PartialEq,
{
    pub(crate) fn new() -> Self {
        Self {
            items: IndexMap::new(),
        }
    }

    /// Insert at the end, or overwrite in place. Equal values are left alone.
    pub(crate) fn upsert(&mut self, key: K, value: V) -> Upsert {
        match self.items.get_mut(&key) {
            Some(existing) if **existing == value => Upsert::Unchanged,
            Some(existing) => {
                *existing = Arc::new(value);
                Upsert::Updated
            }
            None => {
                self.items.insert(key, Arc::new(value));
                Upsert::Inserted
            }
        }
    }

    /// Remove by key, preserving the order of the remaining items.
    pub(crate) fn remove<Q>(&mut self, key: &Q) -> Option<Arc<V>>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.items.shift_remove(key)
    }

    /// Re-key an item without moving it. Any other item already holding
    /// `new_key` is dropped. Returns `false` if `old_key` is absent.
    pub(crate) fn rename<Q>(&mut self, old_key: &Q, new_key: K, value: V) -> bool
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        if !old_key.equivalent(&new_key) {
            self.items.shift_remove(&new_key);
        }
        let Some(index) = self.items.get_index_of(old_key) else {
            return false;
        };
        self.items.shift_remove_index(index);
        self.items.shift_insert(index, new_key, Arc::new(value));
        true
    }

    pub(crate) fn get<Q>(&self, key: &Q) -> Option<&Arc<V>>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.items.get(key)
    }

    pub(crate) fn contains<Q>(&self, key: &Q) -> bool
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.items.contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn values(&self) -> impl Iterator<Item = &Arc<V>> {
        self.items.values()
    }

    /// Cheap copy of the current values in order.
    pub(crate) fn snapshot(&self) -> Vec<Arc<V>> {
        self.items.values().cloned().collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn values(col: &OrderedCollection<&'static str, String>) -> Vec<String> {
        col.values().map(|v| (**v).clone()).collect()
    }

    #[test]
    fn upsert_reports_what_happened() {
        let mut col = OrderedCollection::new();
        assert_eq!(col.upsert("a", "x".to_owned()), Upsert::Inserted);
        assert_eq!(col.upsert("a", "x".to_owned()), Upsert::Unchanged);
        assert_eq!(col.upsert("a", "y".to_owned()), Upsert::Updated);
        assert_eq!(col.len(), 1);
    }

    #[test]
    fn update_keeps_position() {
        let mut col = OrderedCollection::new();
        col.upsert("a", "1".to_owned());
        col.upsert("b", "2".to_owned());
        col.upsert("c", "3".to_owned());
        col.upsert("a", "changed".to_owned());
        assert_eq!(values(&col), vec!["changed", "2", "3"]);
    }

    #[test]
    fn remove_keeps_relative_order() {
        let mut col = OrderedCollection::new();
        col.upsert("a", "1".to_owned());
        col.upsert("b", "2".to_owned());
        col.upsert("c", "3".to_owned());
        assert_eq!(*col.remove(&"b").unwrap(), "2");
        assert!(col.remove(&"b").is_none());
        assert_eq!(values(&col), vec!["1", "3"]);
    }

    #[test]
    fn rename_keeps_slot() {
        let mut col = OrderedCollection::new();
        col.upsert("a", "1".to_owned());
        col.upsert("b", "2".to_owned());
        col.upsert("c", "3".to_owned());

        assert!(col.rename(&"b", "z", "renamed".to_owned()));
        assert!(!col.contains(&"b"));
        assert_eq!(values(&col), vec!["1", "renamed", "3"]);
        assert!(!col.rename(&"missing", "q", "x".to_owned()));
    }

    #[test]
    fn rename_onto_existing_key_replaces_it() {
        let mut col = OrderedCollection::new();
        col.upsert("a", "1".to_owned());
        col.upsert("b", "2".to_owned());
        col.upsert("c", "3".to_owned());

        assert!(col.rename(&"c", "a", "moved".to_owned()));
        assert_eq!(values(&col), vec!["2", "moved"]);
    }

    #[test]
    fn snapshot_is_detached_from_later_writes() {
        let mut col = OrderedCollection::new();
        col.upsert("a", "1".to_owned());
        let snap = col.snapshot();
        col.upsert("a", "2".to_owned());
        assert_eq!(*snap[0], "1");
        assert_eq!(**col.get(&"a").unwrap(), "2");
    }
}
