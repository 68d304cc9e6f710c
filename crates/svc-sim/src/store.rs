//! In-memory object stores.
//!
//! Every entity kind lives in its own [`Store`], keyed by a synthetic id.
//! Ids are handed out by [`Store::next_id`], which always returns the
//! smallest id not currently in use.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

/// An entity that can live in a [`Store`].
pub trait Record {
    fn id(&self) -> u32;

    /// Unique name within the store, or `""` for unnamed records.
    fn name(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct Store<T> {
    items: BTreeMap<u32, T>,
}

impl<T> Default for Store<T> {
    fn default() -> Self {
        Self {
            items: BTreeMap::new(),
        }
    }
}

impl<T: Record> Store<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Smallest non-negative id not held by any record.
    pub fn next_id(&self) -> u32 {
        let len = self.items.len() as u32;
        (0..len)
            .zip(self.items.keys())
            .find(|(expected, actual)| expected != *actual)
            .map(|(expected, _)| expected)
            .unwrap_or(len)
    }

    /// Insert keyed by the record's own id, replacing any previous holder.
    pub fn insert(&mut self, item: T) -> Option<T> {
        self.items.insert(item.id(), item)
    }

    pub fn get(&self, id: u32) -> Option<&T> {
        self.items.get(&id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut T> {
        self.items.get_mut(&id)
    }

    pub fn remove(&mut self, id: u32) -> Option<T> {
        self.items.remove(&id)
    }

    pub fn by_name(&self, name: &str) -> Option<&T> {
        self.items.values().find(|item| item.name() == name)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name(name).is_some()
    }

    /// Id of the record called `key`, or whose id is `key`. Names win
    /// over ids.
    pub fn resolve_id(&self, key: &str) -> Option<u32> {
        if let Some(item) = self.by_name(key) {
            return Some(item.id());
        }
        key.parse::<u32>()
            .ok()
            .filter(|id| self.items.contains_key(id))
    }

    pub fn resolve(&self, key: &str) -> Option<&T> {
        self.resolve_id(key).and_then(|id| self.items.get(&id))
    }

    pub fn resolve_mut(&mut self, key: &str) -> Option<&mut T> {
        let id = self.resolve_id(key)?;
        self.items.get_mut(&id)
    }

    /// Ids of every record matching `pred`, in id order.
    pub fn ids_where<F>(&self, pred: F) -> Vec<u32>
    where
        F: Fn(&T) -> bool,
    {
        self.items
            .values()
            .filter(|item| pred(item))
            .map(Record::id)
            .collect()
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.items.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.values_mut()
    }

    pub fn ids(&self) -> Vec<u32> {
        self.items.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: Serialize> Serialize for Store<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.items.values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    #[derive(Debug, Clone, Serialize)]
    struct Item {
        id: u32,
        name: String,
    }

    impl Record for Item {
        fn id(&self) -> u32 {
            self.id
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    fn add(store: &mut Store<Item>, name: &str) -> u32 {
        let id = store.next_id();
        store.insert(Item {
            id,
            name: name.to_string(),
        });
        id
    }

    #[test]
    fn test_allocator_fills_holes() {
        let mut store = Store::new();
        assert_eq!(add(&mut store, "a"), 0);
        assert_eq!(add(&mut store, "b"), 1);
        assert_eq!(add(&mut store, "c"), 2);
        store.remove(1);
        assert_eq!(add(&mut store, "d"), 1);
        assert_eq!(add(&mut store, "e"), 3);
    }

    #[test]
    fn test_resolve_by_name_then_id() {
        let mut store = Store::new();
        add(&mut store, "vol0");
        add(&mut store, "0");
        assert_eq!(store.resolve("vol0").map(|i| i.id), Some(0));
        // A record literally named "0" shadows id 0.
        assert_eq!(store.resolve("0").map(|i| i.id), Some(1));
        assert_eq!(store.resolve("1").map(|i| i.id), Some(1));
        assert!(store.resolve("7").is_none());
        assert!(store.resolve("ghost").is_none());
    }

    #[test]
    fn test_serializes_as_sequence() {
        let mut store = Store::new();
        add(&mut store, "x");
        let json = serde_json::to_string(&store).unwrap();
        assert_eq!(json, r#"[{"id":0,"name":"x"}]"#);
    }

    proptest! {
        #[test]
        fn prop_next_id_is_smallest_unused(ops in proptest::collection::vec((any::<bool>(), 0u32..16), 1..64)) {
            let mut store = Store::new();
            for (insert, victim) in ops {
                if insert {
                    add(&mut store, "n");
                } else {
                    store.remove(victim);
                }
                let used: BTreeSet<u32> = store.ids().into_iter().collect();
                let expected = (0..).find(|id| !used.contains(id)).unwrap();
                prop_assert_eq!(store.next_id(), expected);
            }
        }
    }
}
