use crate::{
    core::{PodKey, PodStore, ResourceId, ServiceKey, ServiceStore},
    k8s::{self, Api, Client, PostParams, ResourceExt, Selector},
    queue::Queue,
};
use ahash::AHashMap as HashMap;
use anyhow::{Context, Result};
use k8s_openapi::NamespaceResourceScope;
use kubert::index::IndexNamespacedResource;
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use std::{fmt, sync::Arc};
use tokio::time;

/// The most recently observed version of each watched resource, by namespace
/// and name.
pub(crate) type Cache<T> = Arc<RwLock<HashMap<String, HashMap<String, Arc<T>>>>>;

/// Applies watch events to a [`Cache`] and queues every changed key.
pub(crate) struct Watched<T> {
    cache: Cache<T>,
    queue: Queue,
}

/// Reads from a [`Cache`] and writes through to the API server.
pub(crate) struct Store<T> {
    cache: Cache<T>,
    client: Client,
    write_timeout: time::Duration,
    queue: Queue,
}

pub(crate) fn get<T>(cache: &Cache<T>, key: &ResourceId) -> Option<Arc<T>> {
    cache.read().get(&key.namespace)?.get(&key.name).cloned()
}

/// Returns every cached key, in order.
pub(crate) fn keys<T>(cache: &Cache<T>) -> Vec<ResourceId> {
    let mut keys = cache
        .read()
        .iter()
        .flat_map(|(ns, objs)| objs.keys().map(move |name| ResourceId::new(ns, name)))
        .collect::<Vec<_>>();
    keys.sort();
    keys
}

/// Returns the cached resources in `namespace` whose labels match `selector`.
pub(crate) fn list<T: ResourceExt>(
    cache: &Cache<T>,
    namespace: &str,
    selector: &Selector,
) -> Vec<Arc<T>> {
    let cache = cache.read();
    let Some(objs) = cache.get(namespace) else {
        return Vec::new();
    };
    objs.values()
        .filter(|obj| selector.matches(obj.labels()))
        .cloned()
        .collect()
}

// === impl Watched ===

impl<T> Watched<T> {
    pub(crate) fn shared(cache: Cache<T>, queue: Queue) -> Arc<RwLock<Self>> {
        Arc::new(RwLock::new(Self { cache, queue }))
    }
}

impl<T: ResourceExt> IndexNamespacedResource<T> for Watched<T> {
    fn apply(&mut self, resource: T) {
        let Some(namespace) = resource.namespace() else {
            tracing::warn!(name = %resource.name_any(), "Ignoring resource without a namespace");
            return;
        };
        let name = resource.name_unchecked();
        self.cache
            .write()
            .entry(namespace.clone())
            .or_default()
            .insert(name.clone(), Arc::new(resource));
        self.queue.push(ResourceId::new(namespace, name));
    }

    fn delete(&mut self, namespace: String, name: String) {
        {
            let mut cache = self.cache.write();
            if let Some(objs) = cache.get_mut(&namespace) {
                objs.remove(&name);
                if objs.is_empty() {
                    cache.remove(&namespace);
                }
            }
        }
        self.queue.push(ResourceId::new(namespace, name));
    }
}

// === impl Store ===

impl<T> Store<T>
where
    T: k8s::Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    T: Clone + fmt::Debug + DeserializeOwned + Serialize,
{
    pub(crate) fn new(
        cache: Cache<T>,
        client: Client,
        write_timeout: time::Duration,
        queue: Queue,
    ) -> Self {
        Self {
            cache,
            client,
            write_timeout,
            queue,
        }
    }

    /// Replaces the resource, failing if its resource version is stale or the
    /// write does not complete within the write timeout.
    async fn replace(&self, obj: T) -> Result<()> {
        let kind = T::kind(&());
        let namespace = obj
            .namespace()
            .with_context(|| format!("{kind} {} has no namespace", obj.name_any()))?;
        let name = obj.name_unchecked();
        let api = Api::<T>::namespaced(self.client.clone(), &namespace);
        time::timeout(
            self.write_timeout,
            api.replace(&name, &PostParams::default(), &obj),
        )
        .await
        .with_context(|| format!("timed out replacing {kind} {namespace}/{name}"))??;
        tracing::trace!(%kind, %namespace, %name, "Replaced");
        Ok(())
    }
}

#[async_trait::async_trait]
impl ServiceStore for Store<k8s::Service> {
    fn get(&self, key: &ServiceKey) -> Result<Option<Arc<k8s::Service>>> {
        Ok(get(&self.cache, key))
    }

    async fn update(&self, service: k8s::Service) -> Result<()> {
        self.replace(service).await
    }
}

#[async_trait::async_trait]
impl PodStore for Store<k8s::Pod> {
    fn list(&self, namespace: &str, selector: &Selector) -> Result<Vec<Arc<k8s::Pod>>> {
        Ok(list(&self.cache, namespace, selector))
    }

    async fn update(&self, pod: k8s::Pod) -> Result<()> {
        self.replace(pod).await
    }

    fn requeue(&self, key: PodKey) {
        self.queue.push(key);
    }
}
