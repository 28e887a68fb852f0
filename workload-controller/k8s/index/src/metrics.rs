use crate::{Registry, SharedIndex};
use prometheus_client::{
    collector::Collector,
    encoding::{DescriptorEncoder, EncodeMetric},
    metrics::{gauge::ConstGauge, MetricType},
    registry::Registry as Prom,
};
use std::sync::Arc;

#[derive(Debug)]
struct Instrumented {
    registry: Arc<Registry>,
    workloads: SharedIndex,
}

pub fn register(prom: &mut Prom, registry: Arc<Registry>, workloads: SharedIndex) {
    prom.register_collector(Box::new(Instrumented {
        registry,
        workloads,
    }));
}

impl Collector for Instrumented {
    fn encode(&self, mut encoder: DescriptorEncoder<'_>) -> Result<(), std::fmt::Error> {
        let registry_encoder = encoder.encode_descriptor(
            "registry_size",
            "The number of services that target other workloads",
            None,
            MetricType::Gauge,
        )?;
        ConstGauge::new(self.registry.len() as i64).encode(registry_encoder)?;

        let mut workloads_encoder = encoder.encode_descriptor(
            "workload_index_size",
            "The number of workloads in index",
            None,
            MetricType::Gauge,
        )?;
        let workloads = self.workloads.read();
        for (ns, size) in workloads.namespace_size() {
            let labels = [("namespace", ns)];
            let workloads_encoder = workloads_encoder.encode_family(&labels)?;
            ConstGauge::new(size as i64).encode(workloads_encoder)?;
        }

        Ok(())
    }
}
