//! Last-value cache for sampled schema values.
//!
//! The connection loop writes each decoded sample into the slot keyed by its
//! schema's [`DefinitionId`]; any thread may read the slot at any time. Only
//! the most recent value is retained.
//!
//! # Design
//!
//! Values are published as whole `Arc`s under a [`parking_lot::RwLock`]. A
//! writer swaps the pointer and a reader clones it, so a reader never sees a
//! partially written value and never blocks the loop for longer than a map
//! insert.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::provider::DefinitionId;
use crate::schema::Schema;

/// A decoded schema value with its concrete type erased.
pub type StoredValue = Arc<dyn Any + Send + Sync>;

/// Thread-safe map from schema identity to its latest value.
#[derive(Default)]
pub struct DataStore {
    slots: RwLock<HashMap<DefinitionId, StoredValue>>,
}

impl std::fmt::Debug for DataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataStore")
            .field("slots", &self.len())
            .finish()
    }
}

impl DataStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the value held for `id`.
    pub fn put(&self, id: DefinitionId, value: StoredValue) {
        self.slots.write().insert(id, value);
    }

    /// Stores a typed value under its schema's identity.
    pub fn put_typed<T: Schema>(&self, value: T) {
        self.put(T::ID, Arc::new(value));
    }

    /// Returns the latest value of `T`, or `T::default()` if none is held.
    ///
    /// A never-sampled schema and a schema whose latest sample equals the
    /// default are indistinguishable here; use [`try_get`](Self::try_get) to
    /// tell them apart.
    pub fn get<T: Schema>(&self) -> T {
        self.try_get::<T>().unwrap_or_default()
    }

    /// Returns the latest value of `T`, or `None` if none is held.
    ///
    /// A slot holding a value of another type (two schemas sharing one id)
    /// also reads as `None`.
    pub fn try_get<T: Schema>(&self) -> Option<T> {
        let value = self.slots.read().get(&T::ID).cloned()?;
        match value.downcast_ref::<T>() {
            Some(typed) => Some(typed.clone()),
            None => {
                tracing::debug!(
                    id = %T::ID,
                    requested = std::any::type_name::<T>(),
                    "stored value has a different type"
                );
                None
            }
        }
    }

    /// Returns `true` if a value is held for `id`.
    pub fn contains(&self, id: DefinitionId) -> bool {
        self.slots.read().contains_key(&id)
    }

    /// Number of schemas with a value.
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// Returns `true` if nothing has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }
}
