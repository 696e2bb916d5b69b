//! Weakly-owned metadata storage.

use std::collections::HashMap;
use std::sync::Weak;

use parking_lot::RwLock;

use super::owner::{Owner, OwnerId, OwnerInner};

struct Entry<V> {
    owner: Weak<OwnerInner>,
    value: V,
}

/// Maps an [`Owner`] to one value of type `V`.
///
/// Entries point back at their owner weakly: storing a value never keeps a
/// controller or method alive, and an entry whose owner is gone is dropped on
/// the next write. There is deliberately no way to list what is stored, only
/// to look up the value for an owner the caller already holds.
pub struct MetadataStore<V> {
    entries: RwLock<HashMap<OwnerId, Entry<V>>>,
}

impl<V> MetadataStore<V> {
    pub fn new() -> Self {
        Self { entries: RwLock::new(HashMap::new()) }
    }

    pub fn get(&self, owner: &Owner) -> Option<V>
    where
        V: Clone,
    {
        self.entries
            .read()
            .get(&owner.id())
            .filter(|entry| entry.owner.strong_count() > 0)
            .map(|entry| entry.value.clone())
    }

    pub fn contains(&self, owner: &Owner) -> bool {
        self.entries.read().contains_key(&owner.id())
    }

    /// Stores `value` for `owner`, replacing any previous value.
    pub fn set(&self, owner: &Owner, value: V) {
        let mut entries = self.entries.write();
        entries.retain(|_, entry| entry.owner.strong_count() > 0);
        entries.insert(owner.id(), Entry { owner: owner.downgrade(), value });
    }

    /// Looks up the value stored for the controller type `T`.
    ///
    /// Returns `None` when `T` has no live class owner, without minting one.
    pub fn get_for_class<T: 'static>(&self) -> Option<V>
    where
        V: Clone,
    {
        Owner::find_class::<T>().and_then(|owner| self.get(&owner))
    }

    /// Folds a new value into the entry for `owner` under the write lock.
    ///
    /// `fold` sees the current value, if any, and may mutate it in place. A
    /// returned value replaces the entry. Readers never observe the entry as
    /// missing while the fold runs. Returns whether `owner` holds a value
    /// afterwards.
    ///
    /// `fold` must not touch this store again; the lock is not reentrant.
    pub fn update<F>(&self, owner: &Owner, fold: F) -> bool
    where
        F: FnOnce(Option<&mut V>) -> Option<V>,
    {
        let mut entries = self.entries.write();
        let id = owner.id();
        match fold(entries.get_mut(&id).map(|entry| &mut entry.value)) {
            Some(value) => {
                entries.retain(|_, entry| entry.owner.strong_count() > 0);
                entries.insert(id, Entry { owner: owner.downgrade(), value });
                true
            }
            None => entries.contains_key(&id),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.read().len()
    }
}

impl<V> Default for MetadataStore<V> {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Catalog;

    #[test]
    fn set_then_get() {
        let store = MetadataStore::new();
        let class = Owner::class::<Catalog>();
        assert_eq!(store.get(&class), None);

        store.set(&class, "admin");
        assert_eq!(store.get(&class), Some("admin"));
        assert_eq!(store.get_for_class::<Catalog>(), Some("admin"));

        store.set(&class, "root");
        assert_eq!(store.get(&class), Some("root"));
    }

    #[test]
    fn owners_do_not_see_each_other() {
        let store = MetadataStore::new();
        let class = Owner::class::<Catalog>();
        let member = Owner::member(&class, "search");

        store.set(&member, 7);
        assert_eq!(store.get(&member), Some(7));
        assert_eq!(store.get(&class), None);
        assert!(!store.contains(&class));
    }

    #[test]
    fn entries_do_not_outlive_their_owner() {
        let store = MetadataStore::new();
        let class = Owner::class::<Catalog>();
        let doomed = Owner::member(&class, "legacy");
        let weak = doomed.downgrade();

        store.set(&doomed, vec![1, 2, 3]);
        drop(doomed);
        assert_eq!(weak.strong_count(), 0);

        let survivor = Owner::member(&class, "current");
        store.set(&survivor, vec![4]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&survivor), Some(vec![4]));
    }

    #[test]
    fn update_mutates_in_place_or_replaces() {
        let store = MetadataStore::new();
        let class = Owner::class::<Catalog>();
        let member = Owner::member(&class, "tally");

        assert!(!store.update(&member, |_| None));
        assert!(store.update(&member, |current| {
            assert!(current.is_none());
            Some(1)
        }));
        assert!(store.update(&member, |current| {
            *current.unwrap() += 1;
            None
        }));
        assert_eq!(store.get(&member), Some(2));
        assert!(store.update(&member, |_| Some(10)));
        assert_eq!(store.get(&member), Some(10));
    }

    #[test]
    fn unknown_class_is_absent() {
        struct NeverDescribed;
        let store: MetadataStore<u8> = MetadataStore::new();
        assert_eq!(store.get_for_class::<NeverDescribed>(), None);
    }
}
