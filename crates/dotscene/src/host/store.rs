//! Name-keyed object storage
//!
//! Every live object category the host exposes (lights, cameras, entities,
//! ...) lives in an [`ObjectStore`]: a slotmap of values plus a name index.
//! Handles stay valid until the object is destroyed, so callers can compare
//! handles to check object identity rather than name equality.

use slotmap::{Key, SlotMap};
use std::collections::HashMap;

use super::HostError;

/// Storage for one category of named live objects
#[derive(Debug, Clone)]
pub struct ObjectStore<K: Key, T> {
    category: &'static str,
    objects: SlotMap<K, T>,
    names: HashMap<String, K>,
    order: Vec<K>,
}

impl<K: Key, T> ObjectStore<K, T> {
    /// Create an empty store; `category` is only used in error messages
    pub fn new(category: &'static str) -> Self {
        Self {
            category,
            objects: SlotMap::with_key(),
            names: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Category label of this store
    pub fn category(&self) -> &'static str {
        self.category
    }

    /// Insert a new object under `name`
    pub fn create(&mut self, name: impl Into<String>, value: T) -> Result<K, HostError> {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(HostError::Duplicate {
                category: self.category,
                name,
            });
        }
        let key = self.objects.insert(value);
        self.names.insert(name, key);
        self.order.push(key);
        Ok(key)
    }

    /// Handle of the object named `name`
    pub fn id(&self, name: &str) -> Option<K> {
        self.names.get(name).copied()
    }

    /// Whether an object named `name` exists
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Object by handle
    pub fn get(&self, key: K) -> Option<&T> {
        self.objects.get(key)
    }

    /// Mutable object by handle
    pub fn get_mut(&mut self, key: K) -> Option<&mut T> {
        self.objects.get_mut(key)
    }

    /// Object by name
    pub fn by_name(&self, name: &str) -> Option<&T> {
        self.id(name).and_then(|key| self.objects.get(key))
    }

    /// Mutable object by name
    pub fn by_name_mut(&mut self, name: &str) -> Option<&mut T> {
        let key = self.id(name)?;
        self.objects.get_mut(key)
    }

    /// Name registered for a handle
    pub fn name_of(&self, key: K) -> Option<&str> {
        self.names
            .iter()
            .find_map(|(name, k)| (*k == key).then_some(name.as_str()))
    }

    /// Remove the object named `name`, returning its value
    pub fn destroy(&mut self, name: &str) -> Result<T, HostError> {
        let key = self.names.remove(name).ok_or_else(|| HostError::NotFound {
            category: self.category,
            name: name.to_string(),
        })?;
        self.order.retain(|k| *k != key);
        self.objects.remove(key).ok_or_else(|| HostError::InvalidState(format!(
            "{} '{}' had a name but no storage",
            self.category, name
        )))
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Objects in creation order
    pub fn iter(&self) -> impl Iterator<Item = (K, &T)> + '_ {
        self.order
            .iter()
            .filter_map(move |key| self.objects.get(*key).map(|value| (*key, value)))
    }

    /// Mutable objects, in no particular order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (K, &mut T)> + '_ {
        self.objects.iter_mut()
    }

    /// Handle of the earliest created object still alive
    pub fn first(&self) -> Option<K> {
        self.order.first().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    slotmap::new_key_type! { struct TestId; }

    #[test]
    fn test_create_and_lookup() {
        let mut store: ObjectStore<TestId, u32> = ObjectStore::new("test");
        let a = store.create("a", 1).unwrap();
        let b = store.create("b", 2).unwrap();

        assert_ne!(a, b);
        assert_eq!(store.id("a"), Some(a));
        assert_eq!(store.by_name("b"), Some(&2));
        assert_eq!(store.name_of(b), Some("b"));
        assert!(store.contains("a"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut store: ObjectStore<TestId, u32> = ObjectStore::new("test");
        store.create("a", 1).unwrap();
        let err = store.create("a", 2).unwrap_err();
        assert!(matches!(err, HostError::Duplicate { .. }));
    }

    #[test]
    fn test_destroy_keeps_creation_order() {
        let mut store: ObjectStore<TestId, u32> = ObjectStore::new("test");
        store.create("a", 1).unwrap();
        store.create("b", 2).unwrap();
        store.create("c", 3).unwrap();

        assert_eq!(store.destroy("a").unwrap(), 1);
        assert!(store.destroy("a").is_err());

        let values: Vec<u32> = store.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![2, 3]);
        assert_eq!(store.first(), store.id("b"));
    }

    #[test]
    fn test_handle_invalid_after_destroy() {
        let mut store: ObjectStore<TestId, u32> = ObjectStore::new("test");
        let a = store.create("a", 1).unwrap();
        store.destroy("a").unwrap();
        let again = store.create("a", 5).unwrap();

        assert!(store.get(a).is_none());
        assert_eq!(store.get(again), Some(&5));
    }
}
