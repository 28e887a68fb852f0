use crate::{Metrics, Outcome, Registry};
use anyhow::{Context, Result};
use std::{
    collections::{btree_map::Entry, BTreeMap},
    sync::Arc,
};
use tracing::{debug, info, instrument, warn};
use workload_controller_core::{
    labels::{self, SYNTHETIC_VALUE},
    PodKey, PodStore, ServiceKey, ServiceStore, Workload, WorkloadDirectory,
};
use workload_controller_k8s_api::{self as k8s, Map, ResourceExt, Selector};
use workload_controller_k8s_index::WorkloadSet;

/// Propagates a service's selector onto the pods of its target workloads.
pub struct ServiceReconciler {
    registry: Arc<Registry>,
    workloads: Arc<dyn WorkloadDirectory>,
    services: Arc<dyn ServiceStore>,
    pods: Arc<dyn PodStore>,
    metrics: Metrics,
}

// === impl ServiceReconciler ===

impl ServiceReconciler {
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

    /// Reconciles the service identified by `key`.
    ///
    /// `service` is `None` when the service no longer exists. A service that is being deleted,
    /// or no longer targets any workload, has its registry entry removed after the pods that
    /// carry its synthetic label are requeued.
    #[instrument(skip_all, fields(service = %key))]
    pub async fn sync(&self, key: &ServiceKey, service: Option<&k8s::Service>) -> Result<Outcome> {
        let result = self.reconcile(key, service).await;
        self.metrics.record("service", &result);
        result
    }

    async fn reconcile(
        &self,
        key: &ServiceKey,
        service: Option<&k8s::Service>,
    ) -> Result<Outcome> {
        let service = match service {
            Some(svc) if !k8s::is_terminating(svc) => svc,
            _ => return self.remove(key),
        };

        let ids = k8s::target_workload_ids(service.annotations()).unwrap_or_else(|error| {
            warn!(%error, "Ignoring malformed target workloads annotation");
            Vec::new()
        });
        if ids.is_empty() {
            return self.remove(key);
        }

        let (selector, installed) = self.install_selector(key, service).await?;

        let mut targets = WorkloadSet::new();
        let mut workloads = Vec::with_capacity(ids.len());
        for id in &ids {
            match self.workloads.resolve(id) {
                // A service only routes to pods in its own namespace.
                Ok(workload) if workload.key.namespace != key.namespace => {
                    warn!(workload = %id, "Skipping target workload in another namespace");
                }
                Ok(workload) => {
                    if targets.insert(workload.key.clone()) {
                        workloads.push(workload);
                    }
                }
                Err(error) => warn!(workload = %id, %error, "Skipping target workload"),
            }
        }

        let updated = self.label_pods(&workloads, &selector).await?;

        let mut requeued = 0;
        if let Some(prior) = self.registry.load(key) {
            if prior.iter().any(|workload| !targets.contains(workload)) {
                debug!(?prior, ?targets, "Target workloads removed");
                requeued = self.requeue_labeled_pods(key)?;
            }
        }

        self.registry.store(key.clone(), targets);

        if installed || updated > 0 || requeued > 0 {
            Ok(Outcome::Updated)
        } else {
            Ok(Outcome::Unchanged)
        }
    }

    /// Ensures the service's selector includes its synthetic term, returning the selector and
    /// whether it had to be written.
    async fn install_selector(
        &self,
        key: &ServiceKey,
        service: &k8s::Service,
    ) -> Result<(Map, bool)> {
        let mut selector = service
            .spec
            .as_ref()
            .and_then(|spec| spec.selector.clone())
            .unwrap_or_default();

        let synthetic = labels::synthetic_key(&key.name);
        if selector.contains_key(&synthetic) {
            return Ok((selector, false));
        }

        selector.insert(synthetic, SYNTHETIC_VALUE.to_string());
        let mut update = service.clone();
        update.spec.get_or_insert_with(Default::default).selector = Some(selector.clone());
        self.services
            .update(update)
            .await
            .with_context(|| format!("failed to install selector on service {key}"))?;
        self.metrics.selector_installs.inc();
        info!("Installed synthetic selector");

        Ok((selector, true))
    }

    /// Adds the selector's labels to every live pod of the workloads that lacks one of them.
    ///
    /// Stops at the first failed write; labels already written are kept.
    async fn label_pods(&self, workloads: &[Workload], selector: &Map) -> Result<usize> {
        let mut updates = BTreeMap::<PodKey, k8s::Pod>::new();
        for workload in workloads {
            let namespace = &workload.key.namespace;
            let pods = self
                .pods
                .list(namespace, &workload.selector)
                .with_context(|| format!("failed to list pods of workload {}", workload.key))?;

            for pod in pods {
                if k8s::is_terminating(&*pod) || !labels::missing_any(pod.labels(), selector) {
                    continue;
                }
                let key = PodKey::new(namespace, pod.name_any());
                if let Entry::Vacant(entry) = updates.entry(key) {
                    let mut pod = (*pod).clone();
                    pod.metadata.labels = Some(labels::merge(pod.labels(), selector));
                    entry.insert(pod);
                }
            }
        }

        let count = updates.len();
        for (key, pod) in updates {
            self.pods
                .update(pod)
                .await
                .with_context(|| format!("failed to update pod {key}"))?;
            self.metrics.pod_label_updates.inc();
            debug!(pod = %key, "Added service selector labels");
        }
        Ok(count)
    }

    fn remove(&self, key: &ServiceKey) -> Result<Outcome> {
        if self.registry.load(key).is_none() {
            return Ok(Outcome::Skipped);
        }

        self.requeue_labeled_pods(key)?;
        self.registry.delete(key);
        info!("Removed target workloads");
        Ok(Outcome::Updated)
    }

    /// Requeues every pod in the service's namespace that carries its synthetic label, so the
    /// pod reconciler drops the label from pods that are no longer targeted.
    fn requeue_labeled_pods(&self, key: &ServiceKey) -> Result<usize> {
        let selector = Selector::from_map(Map::from([(
            labels::synthetic_key(&key.name),
            SYNTHETIC_VALUE.to_string(),
        )]));
        let pods = self
            .pods
            .list(&key.namespace, &selector)
            .with_context(|| format!("failed to list pods labeled for service {key}"))?;

        for pod in &pods {
            let pod = PodKey::new(&key.namespace, pod.name_any());
            debug!(%pod, "Requeueing");
            self.pods.requeue(pod);
        }
        self.metrics.cleanup_requeues.inc_by(pods.len() as u64);
        Ok(pods.len())
    }
}
