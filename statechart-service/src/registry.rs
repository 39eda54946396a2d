//! Running-instance registry with per-instance exclusive locks.

use crate::error::ServiceError;
use dashmap::DashMap;
use parking_lot::Mutex;
use statechart_core::Instance;

/// Holds running instances, each behind its own lock.
///
/// Different instances never contend; two requests against the same
/// instance serialize for the whole transition-plus-stabilization sequence,
/// so callers observe a linear history.
#[derive(Default)]
pub struct InstanceRegistry {
    instances: DashMap<String, Mutex<Instance>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, instance: Instance) {
        self.instances
            .insert(instance.id.clone(), Mutex::new(instance));
    }

    /// Runs `f` with exclusive access to the instance. The lock is released
    /// when `f` returns, success or failure.
    pub fn with_instance<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Instance) -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        let entry = self
            .instances
            .get(id)
            .ok_or_else(|| ServiceError::InstanceNotFound {
                instance: id.to_string(),
            })?;
        let mut instance = entry.lock();
        f(&mut instance)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.instances.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Ids of all registered instances.
    pub fn list_ids(&self) -> Vec<String> {
        self.instances
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }
}
