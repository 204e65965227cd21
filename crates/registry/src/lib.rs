#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Nebula Registry
//!
//! A process-wide name→entity directory, generic over whatever entity type
//! a caller wants to store (components, strategies, ...). Reads are
//! lock-free via `dashmap`'s sharded map (a snapshot-style read, fine-
//! grained locking per shard); writes are serialized per shard, which is
//! sufficient since the design document only requires writes not race with
//! each other, not a single global lock.
//!
//! Entities opt into storage by implementing [`Named`]: `put_if_named` is a
//! no-op for an entity whose name is `None`, matching "components/strategies
//! created without a name are never bound in the registry."

use std::hash::Hash;

use dashmap::DashMap;

/// An entity that may optionally carry a registry name.
///
/// Components and strategies both implement this so one [`Registry`] type
/// can host either, without the registry crate depending on either's
/// concrete type.
pub trait Named {
    /// The registry key this entity should bind to, if any.
    fn name(&self) -> Option<&str>;
}

/// A process-wide, concurrently-readable name→entity directory.
#[derive(Debug)]
pub struct Registry<T> {
    entries: DashMap<String, T>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<T> Registry<T>
where
    T: Named + Clone,
{
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `entity` under its own name, replacing any prior binding to
    /// that name. A no-op returning `None` if the entity has no name;
    /// otherwise returns the entity back to the caller (mirroring the
    /// design document's "inserts... returning the entity").
    pub fn put_if_named(&self, entity: T) -> Option<T> {
        let name = entity.name()?.to_string();
        self.entries.insert(name, entity.clone());
        Some(entity)
    }

    /// Look up an entity by name.
    ///
    /// # Errors
    /// Returns [`nebula_error::Error::UnknownName`] if no entity is bound to
    /// `name`.
    pub fn get(&self, name: &str) -> nebula_error::Result<T> {
        self.entries
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| nebula_error::Error::unknown_name(name))
    }

    /// Returns `true` if `name` is currently bound.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// A snapshot of every currently-bound entity, in unspecified order.
    #[must_use]
    pub fn all(&self) -> Vec<T> {
        self.entries.iter().map(|e| e.value().clone()).collect()
    }

    /// Remove a binding, returning the removed entity if it existed.
    pub fn remove(&self, name: &str) -> Option<T> {
        self.entries.remove(name).map(|(_, v)| v)
    }

    /// Number of currently-bound entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no entities are bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// `Hash` is not actually needed by `DashMap<String, T>`, but many entity
// types keep a derived `Hash` around for use as map keys elsewhere; this
// blanket re-export keeps the trait bound visible to readers of this crate.
#[allow(dead_code)]
fn _assert_string_key_is_hashable() {
    fn assert_hash<K: Hash>() {}
    assert_hash::<String>();
}
