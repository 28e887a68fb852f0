//! Workload Controller indexes
//!
//! Two in-memory indexes back the label propagation controllers:
//!
//! - The [`Registry`] maps each service that targets other workloads to the set of workload keys
//!   it currently resolves to. It is written by the service reconciler and scanned in reverse by
//!   the pod reconciler to find the services that depend on a pod's workloads.
//! - The workload [`Index`] holds the selectors of every Deployment, DaemonSet, StatefulSet,
//!   ReplicaSet and Job, updated from watches. It resolves workload identifiers and finds the
//!   workloads a pod belongs to.
//!
//! Neither index is persisted. Both are rebuilt from a full resync on startup.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod metrics;
mod registry;
mod workload;


pub use self::{
    registry::{Registry, WorkloadSet},
    workload::{Directory, Index, Kind, SharedIndex, WorkloadResource},
};
