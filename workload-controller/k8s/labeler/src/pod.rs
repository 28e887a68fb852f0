use crate::{Metrics, Outcome, Registry};
use anyhow::{Context, Result};
use std::{collections::BTreeSet, sync::Arc};
use tracing::{debug, instrument};
use workload_controller_core::{
    labels, PodKey, PodStore, ServiceKey, ServiceStore, WorkloadDirectory,
};
use workload_controller_k8s_api::{self as k8s, Map, ResourceExt};

/// Recomputes a pod's synthetic labels from the services that target its workloads.
pub struct PodReconciler {
    registry: Arc<Registry>,
    workloads: Arc<dyn WorkloadDirectory>,
    services: Arc<dyn ServiceStore>,
    pods: Arc<dyn PodStore>,
    metrics: Metrics,
}

// === impl PodReconciler ===

impl PodReconciler {
    pub fn new(
        registry: Arc<Registry>,
        workloads: Arc<dyn WorkloadDirectory>,
        services: Arc<dyn ServiceStore>,
        pods: Arc<dyn PodStore>,
        metrics: Metrics,
    ) -> Self {
        Self {
            registry,
            workloads,
            services,
            pods,
            metrics,
        }
    }

    /// Reconciles the pod identified by `key`. Absent and terminating pods are skipped.
    #[instrument(skip_all, fields(pod = %key))]
    pub async fn sync(&self, key: &PodKey, pod: Option<&k8s::Pod>) -> Result<Outcome> {
        let result = self.reconcile(key, pod).await;
        self.metrics.record("pod", &result);
        result
    }

    async fn reconcile(&self, key: &PodKey, pod: Option<&k8s::Pod>) -> Result<Outcome> {
        let pod = match pod {
            Some(pod) if !k8s::is_terminating(pod) => pod,
            _ => return Ok(Outcome::Skipped),
        };

        let desired = self.desired_labels(key, pod.labels())?;
        let updated = labels::reconcile(pod.labels(), &desired);
        if updated == *pod.labels() {
            return Ok(Outcome::Unchanged);
        }

        let mut update = pod.clone();
        update.metadata.labels = Some(updated);
        self.pods
            .update(update)
            .await
            .with_context(|| format!("failed to update labels of pod {key}"))?;
        self.metrics.pod_label_updates.inc();
        debug!(?desired, "Updated synthetic labels");
        Ok(Outcome::Updated)
    }

    /// Merges the selectors of every service that targets one of the pod's workloads.
    ///
    /// Services are merged in key order, so on a conflicting label the greatest service key wins.
    fn desired_labels(&self, key: &PodKey, pod_labels: &Map) -> Result<Map> {
        let services = self
            .workloads
            .matching_labels(&key.namespace, pod_labels)
            .iter()
            .flat_map(|workload| self.registry.services_targeting(&workload.key))
            .collect::<BTreeSet<ServiceKey>>();

        let mut desired = Map::new();
        for svc in &services {
            let service = match self
                .services
                .get(svc)
                .with_context(|| format!("failed to get service {svc}"))?
            {
                Some(service) => service,
                None => {
                    debug!(service = %svc, "Targeting service not found");
                    continue;
                }
            };
            if let Some(selector) = service.spec.as_ref().and_then(|spec| spec.selector.as_ref()) {
                desired.extend(selector.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
        Ok(desired)
    }
}
