//! Target workload label propagation
//!
//! A service may route to pods it does not select by listing target workloads in an annotation.
//! Two reconcilers cooperate to make ordinary label selection work for such a service:
//!
//! - The [`ServiceReconciler`] adds a synthetic term (`workloadID_<service>: "true"`) to the
//!   service's selector, copies the service's selector labels onto every pod of the target
//!   workloads, and records the targets in the [`Registry`]. When the targets shrink, or the
//!   service goes away, the pods still carrying its synthetic label are requeued.
//! - The [`PodReconciler`] finds the workloads a pod belongs to, looks up every service that
//!   targets one of them in the registry, and recomputes the pod's synthetic labels from those
//!   services' selectors.
//!
//! ```text
//! [ Service ] -> [ Registry ] <- [ Pod ]
//!      |              |             |
//!      +--> [ Workload Directory ] <-+
//! ```
//!
//! Both reconcilers recompute everything from their inputs on each call, so they tolerate
//! redelivery and may run concurrently.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod metrics;
mod pod;
mod service;


pub use self::{metrics::Metrics, pod::PodReconciler, service::ServiceReconciler};
pub use workload_controller_k8s_index::Registry;

/// Describes what a reconciliation did.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// At least one write or requeue was issued.
    Updated,
    /// Everything was already up to date.
    Unchanged,
    /// The resource does not take part in label propagation.
    Skipped,
}

impl Outcome {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
            Self::Skipped => "skipped",
        }
    }
}
