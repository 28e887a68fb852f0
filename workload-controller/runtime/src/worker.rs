use crate::{
    core::{PodKey, ServiceKey},
    k8s,
    labeler::{PodReconciler, ServiceReconciler},
    queue::{Queue, Receiver},
    ready, retry,
    store::{self, Cache},
};
use tokio::{sync::watch, time};
use tracing::{debug, info, warn};

/// Drives the [`ServiceReconciler`] from the service queue.
pub(crate) struct Services {
    pub reconciler: ServiceReconciler,
    pub cache: Cache<k8s::Service>,
    pub queue: Queue,
    pub rx: Receiver,
    pub requeue_backoff: time::Duration,
    pub resync_interval: time::Duration,
    pub tombstone: retry::Budget,
}

/// Drives the [`PodReconciler`] from the pod queue.
pub(crate) struct Pods {
    pub reconciler: PodReconciler,
    pub cache: Cache<k8s::Pod>,
    pub queue: Queue,
    pub rx: Receiver,
    pub requeue_backoff: time::Duration,
}

// === impl Services ===

impl Services {
    /// Once every watch has been listed, syncs all services to rebuild the
    /// registry and then signals `synced`. Afterwards, processes the queue and
    /// periodically requeues every service.
    pub(crate) async fn run(
        mut self,
        ready: Vec<watch::Receiver<bool>>,
        synced: watch::Sender<bool>,
    ) {
        if !ready::all(ready).await {
            warn!("Watch stopped before it was ready");
            return;
        }

        let keys = store::keys(&self.cache);
        info!(services = keys.len(), "Rebuilding registry");
        for key in &keys {
            self.sync(key).await;
        }
        synced.send_replace(true);
        info!("Registry rebuilt");

        let mut resync = time::interval_at(
            time::Instant::now() + self.resync_interval,
            self.resync_interval,
        );
        loop {
            tokio::select! {
                key = self.rx.next() => match key {
                    Some(key) => self.sync(&key).await,
                    None => return,
                },
                _ = resync.tick() => {
                    let keys = store::keys(&self.cache);
                    debug!(services = keys.len(), "Resyncing");
                    for key in keys {
                        self.queue.push(key);
                    }
                }
            }
        }
    }

    async fn sync(&self, key: &ServiceKey) {
        let service = store::get(&self.cache, key);
        let result = match service.as_deref() {
            Some(service) => self.reconciler.sync(key, Some(service)).await,
            // Nothing redelivers a deleted service, so its cleanup is retried
            // here within a fixed budget.
            None => retry::bounded(&self.tombstone, || self.reconciler.sync(key, None)).await,
        };
        match result {
            Ok(outcome) => debug!(service = %key, ?outcome, "Reconciled"),
            Err(error) if service.is_none() => warn!(
                service = %key,
                error = format_args!("{error:#}"),
                "Failed to clean up deleted service"
            ),
            Err(error) => {
                warn!(
                    service = %key,
                    error = format_args!("{error:#}"),
                    "Failed to reconcile service"
                );
                self.queue.push_after(key.clone(), self.requeue_backoff);
            }
        }
    }
}

// === impl Pods ===

impl Pods {
    /// Processes the pod queue once the registry has been rebuilt.
    pub(crate) async fn run(mut self, mut synced: watch::Receiver<bool>) {
        if synced.wait_for(|synced| *synced).await.is_err() {
            warn!("Registry was never rebuilt");
            return;
        }

        while let Some(key) = self.rx.next().await {
            self.sync(&key).await;
        }
    }

    async fn sync(&self, key: &PodKey) {
        let pod = store::get(&self.cache, key);
        match self.reconciler.sync(key, pod.as_deref()).await {
            Ok(outcome) => debug!(pod = %key, ?outcome, "Reconciled"),
            Err(error) => {
                warn!(
                    pod = %key,
                    error = format_args!("{error:#}"),
                    "Failed to reconcile pod"
                );
                self.queue.push_after(key.clone(), self.requeue_backoff);
            }
        }
    }
}
