use ahash::AHashMap as HashMap;
use parking_lot::RwLock;
use std::{collections::BTreeSet, sync::Arc};
use workload_controller_core::{ServiceKey, WorkloadKey};

pub type WorkloadSet = BTreeSet<WorkloadKey>;

/// Maps each participating service to the workloads it currently targets.
///
/// Published sets are never mutated: `store` swaps in a new `Arc`, so a
/// reader holding a set from `load` or `range` always sees a whole version of
/// it. Services with no targets have no entry.
#[derive(Debug, Default)]
pub struct Registry {
    entries: RwLock<HashMap<ServiceKey, Arc<WorkloadSet>>>,
}

// === impl Registry ===

impl Registry {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn load(&self, service: &ServiceKey) -> Option<Arc<WorkloadSet>> {
        self.entries.read().get(service).cloned()
    }

    /// Replaces the service's targets. Storing an empty set removes the entry.
    pub fn store(&self, service: ServiceKey, workloads: WorkloadSet) {
        if workloads.is_empty() {
            self.delete(&service);
            return;
        }
        self.entries.write().insert(service, Arc::new(workloads));
    }

    pub fn delete(&self, service: &ServiceKey) -> Option<Arc<WorkloadSet>> {
        self.entries.write().remove(service)
    }

    /// Visits every entry until `visit` returns false.
    ///
    /// Entries are visited from a snapshot, so `visit` runs without holding the
    /// registry's lock and may itself read or write the registry.
    pub fn range(&self, mut visit: impl FnMut(&ServiceKey, &WorkloadSet) -> bool) {
        let snapshot = self
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<Vec<_>>();
        for (service, workloads) in snapshot {
            if !visit(&service, &workloads) {
                return;
            }
        }
    }

    /// Returns every service whose targets include `workload`.
    pub fn services_targeting(&self, workload: &WorkloadKey) -> BTreeSet<ServiceKey> {
        let mut services = BTreeSet::new();
        self.range(|service, workloads| {
            if workloads.contains(workload) {
                services.insert(service.clone());
            }
            true
        });
        services
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
