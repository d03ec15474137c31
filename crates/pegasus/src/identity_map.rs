use crate::instance::{Instance, InstanceState};

use pegasus_core::{schema::app::ModelId, stmt::Value};
use std::{
    collections::HashMap,
    rc::{Rc, Weak},
};

/// Primary key values of an instance, in primary key order.
pub(crate) type Key = Vec<Value>;

/// Guarantees at most one live instance per model and primary key.
///
/// Entries are weak: once every handle to an instance is dropped, the
/// next read materializes a fresh one.
#[derive(Debug, Default)]
pub(crate) struct IdentityMap {
    entries: HashMap<(ModelId, Key), Weak<InstanceState>>,
}

impl IdentityMap {
    pub(crate) fn new() -> IdentityMap {
        IdentityMap::default()
    }

    /// Returns the live instance registered for `key`.
    pub(crate) fn get(&self, model: ModelId, key: &[Value]) -> Option<Instance> {
        self.entries
            .get(&(model, key.to_vec()))
            .and_then(Weak::upgrade)
            .map(Instance::from_state)
    }

    /// Registers `instance` unless a live instance already holds the key,
    /// and returns whichever instance is registered afterwards.
    pub(crate) fn set(&mut self, model: ModelId, key: Key, instance: &Instance) -> Instance {
        let entry = self.entries.entry((model, key)).or_default();

        if let Some(existing) = entry.upgrade() {
            return Instance::from_state(existing);
        }

        *entry = Rc::downgrade(instance.state());
        instance.clone()
    }

    /// Removes the entry for `key` and returns the instance it held.
    pub(crate) fn delete(&mut self, model: ModelId, key: &[Value]) -> Option<Instance> {
        self.entries
            .remove(&(model, key.to_vec()))
            .and_then(|weak| weak.upgrade())
            .map(Instance::from_state)
    }

    /// Removes the entry for `key` only if it holds `instance`.
    pub(crate) fn evict(&mut self, model: ModelId, key: &[Value], instance: &Instance) {
        let slot = (model, key.to_vec());

        let held = self
            .entries
            .get(&slot)
            .is_some_and(|weak| weak.as_ptr() == Rc::as_ptr(instance.state()));

        if held {
            self.entries.remove(&slot);
        }
    }

    /// Drops entries whose instance is gone.
    pub(crate) fn prune(&mut self) {
        self.entries.retain(|_, weak| weak.strong_count() > 0);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}
