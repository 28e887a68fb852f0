use crate::{
    index::{self, Directory, Index},
    k8s,
    labeler::{self, PodReconciler, Registry, ServiceReconciler},
    queue::Queue,
    ready::Signaled,
    retry,
    store::{Cache, Store, Watched},
    worker,
};
use anyhow::{bail, Result};
use clap::Parser;
use kube::runtime::watcher;
use std::sync::Arc;
use tokio::{sync::watch, time::Duration};
use tracing::{info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(
    name = "workload-controller",
    about = "Propagates service selectors onto the pods of target workloads"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "workload=info,warn",
        env = "WORKLOAD_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Bounds each write to the API server.
    #[clap(long, default_value = "5000")]
    write_timeout_ms: u64,

    /// Delay before a failed reconciliation is retried.
    #[clap(long, default_value = "5000")]
    requeue_backoff_ms: u64,

    /// Interval at which all services are reconciled again.
    #[clap(long, default_value = "300")]
    resync_interval_secs: u64,

    /// Attempts made to clean up after a deleted service.
    #[clap(long, default_value = "5")]
    tombstone_attempts: u32,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            write_timeout_ms,
            requeue_backoff_ms,
            resync_interval_secs,
            tombstone_attempts,
        } = self;

        let write_timeout = Duration::from_millis(write_timeout_ms);
        let requeue_backoff = Duration::from_millis(requeue_backoff_ms);

        let registry = Registry::shared();
        let workloads = Index::shared();

        let mut prom = <prometheus_client::registry::Registry>::default();
        let metrics = labeler::Metrics::register(prom.sub_registry_with_prefix("labeler"));
        index::metrics::register(
            prom.sub_registry_with_prefix("index"),
            registry.clone(),
            workloads.clone(),
        );
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        // Spawn resource watches. Each one signals once its initial list has
        // been indexed.
        let mut ready = Vec::new();

        let (services_queue, services_rx) = Queue::new();
        let services_cache = Cache::<k8s::Service>::default();
        let (services_index, rx) =
            Signaled::shared(Watched::shared(services_cache.clone(), services_queue.clone()));
        ready.push(rx);
        let services = runtime.watch_all::<k8s::Service>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(services_index, services).instrument(info_span!("services")),
        );

        let (pods_queue, pods_rx) = Queue::new();
        let pods_cache = Cache::<k8s::Pod>::default();
        let (pods_index, rx) =
            Signaled::shared(Watched::shared(pods_cache.clone(), pods_queue.clone()));
        ready.push(rx);
        let pods = runtime.watch_all::<k8s::Pod>(watcher::Config::default());
        tokio::spawn(kubert::index::namespaced(pods_index, pods).instrument(info_span!("pods")));

        let (deployments_index, rx) = Signaled::shared(workloads.clone());
        ready.push(rx);
        let deployments = runtime.watch_all::<k8s::Deployment>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(deployments_index, deployments)
                .instrument(info_span!("deployments")),
        );

        let (daemonsets_index, rx) = Signaled::shared(workloads.clone());
        ready.push(rx);
        let daemonsets = runtime.watch_all::<k8s::DaemonSet>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(daemonsets_index, daemonsets)
                .instrument(info_span!("daemonsets")),
        );

        let (statefulsets_index, rx) = Signaled::shared(workloads.clone());
        ready.push(rx);
        let statefulsets = runtime.watch_all::<k8s::StatefulSet>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(statefulsets_index, statefulsets)
                .instrument(info_span!("statefulsets")),
        );

        let (replicasets_index, rx) = Signaled::shared(workloads.clone());
        ready.push(rx);
        let replicasets = runtime.watch_all::<k8s::ReplicaSet>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(replicasets_index, replicasets)
                .instrument(info_span!("replicasets")),
        );

        let (jobs_index, rx) = Signaled::shared(workloads.clone());
        ready.push(rx);
        let jobs = runtime.watch_all::<k8s::Job>(watcher::Config::default());
        tokio::spawn(kubert::index::namespaced(jobs_index, jobs).instrument(info_span!("jobs")));

        // Both reconcilers read through the watch caches and write to the API
        // server.
        let directory = Arc::new(Directory::new(workloads));
        let client = runtime.client();
        let service_store = Arc::new(Store::new(
            services_cache.clone(),
            client.clone(),
            write_timeout,
            services_queue.clone(),
        ));
        let pod_store = Arc::new(Store::new(
            pods_cache.clone(),
            client,
            write_timeout,
            pods_queue.clone(),
        ));

        let services = worker::Services {
            reconciler: ServiceReconciler::new(
                registry.clone(),
                directory.clone(),
                service_store.clone(),
                pod_store.clone(),
                metrics.clone(),
            ),
            cache: services_cache,
            queue: services_queue,
            rx: services_rx,
            requeue_backoff,
            resync_interval: Duration::from_secs(resync_interval_secs),
            tombstone: retry::Budget {
                attempts: tombstone_attempts,
                timeout: write_timeout,
                backoff: requeue_backoff,
            },
        };
        let pods = worker::Pods {
            reconciler: PodReconciler::new(registry, directory, service_store, pod_store, metrics),
            cache: pods_cache,
            queue: pods_queue,
            rx: pods_rx,
            requeue_backoff,
        };

        // Pods are not reconciled until every service has been synced once, so
        // no pod loses a label that a service would have restored.
        let (synced_tx, synced_rx) = watch::channel(false);
        tokio::spawn(
            services
                .run(ready, synced_tx)
                .instrument(info_span!("service_reconciler")),
        );
        tokio::spawn(
            pods.run(synced_rx)
                .instrument(info_span!("pod_reconciler")),
        );

        // Block the main thread on the shutdown signal.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}
