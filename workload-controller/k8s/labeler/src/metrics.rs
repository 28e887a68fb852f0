use crate::Outcome;
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

#[derive(Clone, Debug)]
pub struct Metrics {
    reconciles: Family<ReconcileLabels, Counter>,
    pub(crate) pod_label_updates: Counter,
    pub(crate) selector_installs: Counter,
    pub(crate) cleanup_requeues: Counter,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ReconcileLabels {
    kind: &'static str,
    outcome: &'static str,
}

// === impl Metrics ===

impl Metrics {
    pub fn register(reg: &mut Registry) -> Self {
        let reconciles = Family::default();
        reg.register(
            "reconciles",
            "Count of reconciliations by resource kind and outcome",
            reconciles.clone(),
        );

        let pod_label_updates = Counter::default();
        reg.register(
            "pod_label_updates",
            "Count of pod label updates",
            pod_label_updates.clone(),
        );

        let selector_installs = Counter::default();
        reg.register(
            "selector_installs",
            "Count of synthetic selector terms added to services",
            selector_installs.clone(),
        );

        let cleanup_requeues = Counter::default();
        reg.register(
            "cleanup_requeues",
            "Count of pods requeued to drop a service's synthetic label",
            cleanup_requeues.clone(),
        );

        Self {
            reconciles,
            pod_label_updates,
            selector_installs,
            cleanup_requeues,
        }
    }

    pub(crate) fn record<E>(&self, kind: &'static str, result: &Result<Outcome, E>) {
        let outcome = match result {
            Ok(outcome) => outcome.as_str(),
            Err(_) => "failed",
        };
        self.reconciles
            .get_or_create(&ReconcileLabels { kind, outcome })
            .inc();
    }
}
