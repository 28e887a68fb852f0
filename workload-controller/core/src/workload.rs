use crate::WorkloadKey;
use workload_controller_k8s_api::Selector;

/// A group of pods selected by a shared label selector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Workload {
    pub key: WorkloadKey,
    pub selector: Selector,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("invalid workload id {0:?}: expected <kind>:<namespace>:<name>")]
    InvalidId(String),

    #[error("unsupported workload kind {0:?}")]
    UnsupportedKind(String),

    #[error("workload {0} not found")]
    NotFound(String),
}
