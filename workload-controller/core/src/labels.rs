//! Helpers for the synthetic labels that link a service to its target
//! workloads' pods.
//!
//! A service `web` that targets other workloads gets the selector term
//! `workloadID_web: "true"`, and every pod of those workloads carries the same
//! label. The term is derived from the service's name only, so two services
//! with the same name in different namespaces share it.

use workload_controller_k8s_api::Map;

pub const SYNTHETIC_PREFIX: &str = "workloadID";

pub const SYNTHETIC_VALUE: &str = "true";

/// Returns the synthetic selector key for the named service.
pub fn synthetic_key(service_name: &str) -> String {
    format!("{SYNTHETIC_PREFIX}_{service_name}")
}

/// Returns true if the label key was written by this controller.
pub fn is_synthetic(key: &str) -> bool {
    key.strip_prefix(SYNTHETIC_PREFIX)
        .is_some_and(|rest| rest.starts_with('_'))
}

/// Returns true if any key/value pair of `selector` is absent from `labels`.
pub fn missing_any(labels: &Map, selector: &Map) -> bool {
    selector.iter().any(|(k, v)| labels.get(k) != Some(v))
}

/// Overlays all of `selector`'s pairs onto `labels`, keeping everything else.
pub fn merge(labels: &Map, selector: &Map) -> Map {
    let mut merged = labels.clone();
    merged.extend(selector.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Computes a pod's labels given the labels every service that targets it
/// wants set.
///
/// Synthetic labels that no service wants any longer are dropped; the desired
/// labels are then overlaid. All other labels are kept as they are.
pub fn reconcile(current: &Map, desired: &Map) -> Map {
    let mut labels = current
        .iter()
        .filter(|(k, _)| !is_synthetic(k) || desired.contains_key(*k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect::<Map>();
    labels.extend(desired.iter().map(|(k, v)| (k.clone(), v.clone())));
    labels
}
