use ahash::AHashMap as HashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};
use workload_controller_core::{ResolveError, ResourceId, Workload, WorkloadDirectory};
use workload_controller_k8s_api::{self as k8s, LabelSelector, Map, ResourceExt, Selector};

pub type SharedIndex = Arc<RwLock<Index>>;

/// Resolves workloads from a [`SharedIndex`].
#[derive(Clone, Debug)]
pub struct Directory(SharedIndex);

/// Indexes the selectors of all workloads, by namespace.
#[derive(Debug, Default)]
pub struct Index {
    namespaces: HashMap<String, NamespaceIndex>,
}

#[derive(Debug, Default)]
struct NamespaceIndex {
    by_kind: HashMap<(Kind, String), Selector>,
}

/// The workload kinds that may be targeted by a service.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Deployment,
    DaemonSet,
    StatefulSet,
    ReplicaSet,
    Job,
}

/// A Kubernetes resource that owns pods through a label selector.
pub trait WorkloadResource: ResourceExt {
    const KIND: Kind;

    fn into_selector(self) -> Option<LabelSelector>;
}

// === impl Index ===

impl Index {
    pub fn shared() -> SharedIndex {
        Arc::new(RwLock::new(Self::default()))
    }

    pub(crate) fn namespace_size(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.namespaces
            .iter()
            .map(|(ns, idx)| (ns.as_str(), idx.by_kind.len()))
    }

    fn get(&self, kind: Kind, namespace: &str, name: &str) -> Option<Workload> {
        let selector = self
            .namespaces
            .get(namespace)?
            .by_kind
            .get(&(kind, name.to_string()))?;
        Some(Workload {
            key: ResourceId::new(namespace, name),
            selector: selector.clone(),
        })
    }

    fn insert(&mut self, kind: Kind, namespace: String, name: String, selector: Selector) {
        self.namespaces
            .entry(namespace)
            .or_default()
            .by_kind
            .insert((kind, name), selector);
    }

    fn remove(&mut self, kind: Kind, namespace: &str, name: String) {
        if let Some(ns) = self.namespaces.get_mut(namespace) {
            ns.by_kind.remove(&(kind, name));
            if ns.by_kind.is_empty() {
                self.namespaces.remove(namespace);
            }
        }
    }
}

impl<T: WorkloadResource> kubert::index::IndexNamespacedResource<T> for Index {
    fn apply(&mut self, resource: T) {
        let Some(namespace) = resource.namespace() else {
            info!(name = %resource.name_any(), kind = ?T::KIND, "Ignoring workload without a namespace");
            return;
        };
        let name = resource.name_unchecked();

        // Workloads without a usable selector are not indexed. Drop any prior version.
        let Some(selector) = resource.into_selector() else {
            info!(%namespace, %name, kind = ?T::KIND, "Ignoring workload without a selector");
            self.remove(T::KIND, &namespace, name);
            return;
        };
        match Selector::try_from(selector) {
            Ok(selector) => {
                debug!(%namespace, %name, kind = ?T::KIND, "Indexing workload");
                self.insert(T::KIND, namespace, name, selector);
            }
            Err(error) => {
                info!(%namespace, %name, kind = ?T::KIND, %error, "Ignoring workload");
                self.remove(T::KIND, &namespace, name);
            }
        }
    }

    fn delete(&mut self, namespace: String, name: String) {
        debug!(%namespace, %name, kind = ?T::KIND, "Removing workload");
        self.remove(T::KIND, &namespace, name);
    }
}

// === impl Directory ===

impl Directory {
    pub fn new(index: SharedIndex) -> Self {
        Self(index)
    }
}

impl WorkloadDirectory for Directory {
    /// Resolves identifiers of the form `<kind>:<namespace>:<name>`.
    fn resolve(&self, id: &str) -> Result<Workload, ResolveError> {
        let mut parts = id.splitn(3, ':');
        let (kind, namespace, name) = match (parts.next(), parts.next(), parts.next()) {
            (Some(kind), Some(ns), Some(name)) if !ns.is_empty() && !name.is_empty() => {
                (kind, ns, name)
            }
            _ => return Err(ResolveError::InvalidId(id.to_string())),
        };
        let kind = kind.parse::<Kind>()?;

        self.0
            .read()
            .get(kind, namespace, name)
            .ok_or_else(|| ResolveError::NotFound(id.to_string()))
    }

    fn matching_labels(&self, namespace: &str, labels: &Map) -> Vec<Workload> {
        let index = self.0.read();
        let Some(ns) = index.namespaces.get(namespace) else {
            return Vec::new();
        };
        ns.by_kind
            .iter()
            .filter(|(_, selector)| selector.matches(labels))
            .map(|((_, name), selector)| Workload {
                key: ResourceId::new(namespace, name.clone()),
                selector: selector.clone(),
            })
            .collect()
    }
}

// === impl Kind ===

impl std::str::FromStr for Kind {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "deployment" => Ok(Self::Deployment),
            "daemonset" => Ok(Self::DaemonSet),
            "statefulset" => Ok(Self::StatefulSet),
            "replicaset" => Ok(Self::ReplicaSet),
            "job" => Ok(Self::Job),
            _ => Err(ResolveError::UnsupportedKind(s.to_string())),
        }
    }
}

// === impl WorkloadResource ===

impl WorkloadResource for k8s::Deployment {
    const KIND: Kind = Kind::Deployment;

    fn into_selector(self) -> Option<LabelSelector> {
        self.spec.map(|spec| spec.selector)
    }
}

impl WorkloadResource for k8s::DaemonSet {
    const KIND: Kind = Kind::DaemonSet;

    fn into_selector(self) -> Option<LabelSelector> {
        self.spec.map(|spec| spec.selector)
    }
}

impl WorkloadResource for k8s::StatefulSet {
    const KIND: Kind = Kind::StatefulSet;

    fn into_selector(self) -> Option<LabelSelector> {
        self.spec.map(|spec| spec.selector)
    }
}

impl WorkloadResource for k8s::ReplicaSet {
    const KIND: Kind = Kind::ReplicaSet;

    fn into_selector(self) -> Option<LabelSelector> {
        self.spec.map(|spec| spec.selector)
    }
}

impl WorkloadResource for k8s::Job {
    const KIND: Kind = Kind::Job;

    fn into_selector(self) -> Option<LabelSelector> {
        self.spec.and_then(|spec| spec.selector)
    }
}
