#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod id;
pub mod labels;
mod workload;

pub use self::{
    id::{KeyError, PodKey, ResourceId, ServiceKey, WorkloadKey},
    workload::{ResolveError, Workload},
};
use anyhow::Result;
use std::sync::Arc;
use workload_controller_k8s_api::{self as k8s, Map, Selector};

/// Looks up workloads and the pods they own.
pub trait WorkloadDirectory: Send + Sync {
    /// Resolves a workload identifier, as written in a service's target
    /// workloads annotation.
    fn resolve(&self, id: &str) -> Result<Workload, ResolveError>;

    /// Returns all workloads in `namespace` whose selector matches `labels`.
    fn matching_labels(&self, namespace: &str, labels: &Map) -> Vec<Workload>;
}

#[async_trait::async_trait]
pub trait ServiceStore: Send + Sync {
    fn get(&self, key: &ServiceKey) -> Result<Option<Arc<k8s::Service>>>;

    /// Replaces the service. The write fails if the service changed since it
    /// was read.
    async fn update(&self, service: k8s::Service) -> Result<()>;
}

#[async_trait::async_trait]
pub trait PodStore: Send + Sync {
    /// Lists the pods in `namespace` matching `selector`.
    fn list(&self, namespace: &str, selector: &Selector) -> Result<Vec<Arc<k8s::Pod>>>;

    /// Replaces the pod. The write fails if the pod changed since it was
    /// read.
    async fn update(&self, pod: k8s::Pod) -> Result<()>;

    /// Forces the pod to be reconciled again, whether or not it changed.
    fn requeue(&self, key: PodKey);
}
