//! # Registry
//!
//! This module covers the keyed collection that tracks lifecycle elements by name

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::debug;

use crate::lifecycle::Lifecycle;

/// Error raised by keyed lookup when no element is registered under the name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no element named `{0}` registered")]
pub struct NotFound(pub String);

/// Keyed collection of lifecycle elements, unique by name.
///
/// The registry owns one handle to every tracked element and hands out additional
/// [`Arc`] handles on insert and lookup. Map mutation is serialized behind a mutex;
/// element transitions run outside that lock, so a slow or hung target never blocks
/// lookups or other bookkeeping.
///
/// Removal is guaranteed: a removed element always leaves the map, even when its
/// teardown fails, and the teardown failure is re-raised only after the entry is gone.
pub struct Registry<T: Lifecycle> {
    /// Tracked elements, keyed by [`Lifecycle::name`]
    items: Mutex<HashMap<String, Arc<T>>>,
}

impl<T: Lifecycle> Registry<T> {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the element registered under `name`, inserting the element built by
    /// `init` if the name is new.
    ///
    /// An existing element always wins: `init` is not run and the existing entry is
    /// returned unchanged, whatever the caller intended to insert.
    pub fn get_or_insert_with(&self, name: &str, init: impl FnOnce() -> T) -> Arc<T> {
        let mut items = self.items.lock().unwrap();
        if let Some(existing) = items.get(name) {
            debug!(name, "name already registered, returning existing element");
            return Arc::clone(existing);
        }
        let item = Arc::new(init());
        debug_assert_eq!(item.name(), name);
        items.insert(name.to_owned(), Arc::clone(&item));
        item
    }

    /// Returns the element registered under `name`
    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        self.items.lock().unwrap().get(name).cloned()
    }

    /// Returns the element registered under `name`, failing if the name is unknown.
    ///
    /// Unlike [`Registry::remove`], a missing name here is an error: reads are keyed
    /// accesses the caller relies on, while deletes of an absent entry are harmless.
    pub fn lookup(&self, name: &str) -> Result<Arc<T>, NotFound> {
        self.get(name).ok_or_else(|| NotFound(name.to_owned()))
    }

    /// Whether an element is registered under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.items.lock().unwrap().contains_key(name)
    }

    /// Number of tracked elements
    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    /// Whether the registry tracks no elements
    pub fn is_empty(&self) -> bool {
        self.items.lock().unwrap().is_empty()
    }

    /// Names of every tracked element, in no particular order
    pub fn names(&self) -> Vec<String> {
        self.items.lock().unwrap().keys().cloned().collect()
    }

    /// Snapshot of every tracked element, in no particular order
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.items.lock().unwrap().values().cloned().collect()
    }

    /// Snapshot of the full name-to-element mapping
    pub fn entries(&self) -> HashMap<String, Arc<T>> {
        self.items.lock().unwrap().clone()
    }

    /// Enables every tracked element.
    ///
    /// Every element is visited even when one fails; the first failure is returned
    /// once the sweep completes.
    pub fn enable_all(&self) -> Result<(), T::Error> {
        sweep(self.snapshot(), |item| item.enable())
    }

    /// Disables every tracked element. Same failure policy as [`Registry::enable_all`].
    pub fn disable_all(&self) -> Result<(), T::Error> {
        sweep(self.snapshot(), |item| item.disable())
    }

    /// Removes the element registered under `name` and tears it down.
    ///
    /// An unknown name is a silent no-op. A known name always leaves the map, even
    /// when its teardown fails; the teardown failure then propagates to the caller
    /// with the removal already done.
    pub fn remove(&self, name: &str) -> Result<(), T::Error> {
        let removed = self.items.lock().unwrap().remove(name);
        match removed {
            Some(item) => {
                debug!(name, "removed element");
                item.dispose()
            }
            None => Ok(()),
        }
    }

    /// Removes `item` from the registry by its name. See [`Registry::remove`].
    pub fn remove_item(&self, item: &T) -> Result<(), T::Error> {
        self.remove(item.name())
    }

    /// Removes every tracked element, tearing each one down.
    ///
    /// The map is cleared unconditionally before any teardown runs; teardown failures
    /// follow the same first-failure policy as [`Registry::enable_all`].
    pub fn remove_all(&self) -> Result<(), T::Error> {
        let drained: Vec<Arc<T>> = self
            .items
            .lock()
            .unwrap()
            .drain()
            .map(|(_, item)| item)
            .collect();
        debug!(count = drained.len(), "cleared registry");
        sweep(drained, |item| item.dispose())
    }
}

impl<T: Lifecycle> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Visits every element, keeping the first failure and returning it after the sweep
fn sweep<T: Lifecycle>(
    items: Vec<Arc<T>>,
    op: impl Fn(&T) -> Result<(), T::Error>,
) -> Result<(), T::Error> {
    let mut first: Result<(), T::Error> = Ok(());
    for item in items {
        if let Err(e) = op(&item) {
            if first.is_ok() {
                first = Err(e);
            }
        }
    }
    first
}
