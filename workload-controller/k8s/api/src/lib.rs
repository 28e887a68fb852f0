#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod annotations;
pub mod labels;

pub use self::{
    annotations::{
        target_workload_ids, TARGET_WORKLOADS_ANNOTATION, TARGET_WORKLOADS_NOOP_ANNOTATION,
    },
    labels::{Map, Selector},
};
pub use k8s_openapi::{
    api::{
        self,
        apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet},
        batch::v1::Job,
        core::v1::{Pod, PodSpec, Service, ServiceSpec},
    },
    apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement, Time},
};
pub use kube::{
    api::{Api, ObjectMeta, PostParams, ResourceExt},
    runtime::{reflector::ObjectRef, watcher},
    Client, Error, Resource,
};

/// Returns true if the object has been marked for deletion.
#[inline]
pub fn is_terminating<K: Resource>(obj: &K) -> bool {
    obj.meta().deletion_timestamp.is_some()
}
