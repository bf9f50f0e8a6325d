//! Spatial index backend: integer D-tuple keys to values
//!
//! Only key uniqueness is guaranteed; iteration order is unspecified.

use ahash::AHashMap;

pub struct IndexStorage<const D: usize, V> {
    map: AHashMap<[i32; D], V>,
}

impl<const D: usize, V> Default for IndexStorage<D, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const D: usize, V> IndexStorage<D, V> {
    pub fn new() -> Self {
        Self { map: AHashMap::new() }
    }

    #[inline]
    pub fn get(&self, index: &[i32; D]) -> Option<&V> {
        self.map.get(index)
    }

    #[inline]
    pub fn contains(&self, index: &[i32; D]) -> bool {
        self.map.contains_key(index)
    }

    /// Insert or overwrite, returning the stored value
    pub fn insert(&mut self, index: [i32; D], value: V) -> &mut V {
        use std::collections::hash_map::Entry;
        match self.map.entry(index) {
            Entry::Occupied(mut slot) => {
                slot.insert(value);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(value),
        }
    }

    /// Existing value, or the one produced by `make`; the flag tells which
    pub fn get_or_insert_with<F>(&mut self, index: [i32; D], make: F) -> (&mut V, bool)
    where
        F: FnOnce() -> V,
    {
        use std::collections::hash_map::Entry;
        match self.map.entry(index) {
            Entry::Occupied(slot) => (slot.into_mut(), false),
            Entry::Vacant(slot) => (slot.insert(make()), true),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[i32; D], &V)> {
        self.map.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_miss() {
        let mut storage = IndexStorage::<2, u32>::new();
        assert!(storage.get(&[0, 0]).is_none());

        *storage.insert([-5, 3], 7) += 1;
        assert_eq!(storage.get(&[-5, 3]), Some(&8));
        assert!(storage.get(&[3, -5]).is_none());

        storage.insert([-5, 3], 1);
        assert_eq!(storage.get(&[-5, 3]), Some(&1));
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_get_or_insert_with() {
        let mut storage = IndexStorage::<3, String>::new();
        let (value, inserted) = storage.get_or_insert_with([1, 2, 3], || "a".to_string());
        assert!(inserted);
        value.push('b');

        let (value, inserted) = storage.get_or_insert_with([1, 2, 3], || "z".to_string());
        assert!(!inserted);
        assert_eq!(value, "ab");
        assert!(storage.contains(&[1, 2, 3]));
        assert_eq!(storage.iter().count(), 1);
    }
}
