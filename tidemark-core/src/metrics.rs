//! Per-collector Prometheus metrics. Each collector owns its [Registry], the text exposition is
//! available through [CollectorMetrics::encode].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::{Registry, Unit};

const REGISTRY_PREFIX: &str = "tidemark";
const COLLECTOR_LABEL: &str = "collector";

// counters, the `_total` suffix is added by the client library
const INCOMING_RECORDS: &str = "incoming_records";
const FORWARDED_RECORDS: &str = "forwarded_records";
const CYCLE_DURATION: &str = "cycle_duration";

type Labels = Vec<(String, String)>;

#[derive(Clone)]
pub struct CollectorMetrics {
    labels: Labels,
    incoming_records: Family<Labels, Counter>,
    forwarded_records: Family<Labels, Counter>,
    cycle_duration: Family<Labels, Histogram>,
    registry: Arc<Mutex<Registry>>,
}

impl fmt::Debug for CollectorMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectorMetrics")
            .field("labels", &self.labels)
            .finish()
    }
}

impl CollectorMetrics {
    /// Metrics of the collector persisting under `collector`.
    pub fn new(collector: impl Into<String>) -> Self {
        let metrics = Self {
            labels: vec![(COLLECTOR_LABEL.to_string(), collector.into())],
            incoming_records: Family::default(),
            forwarded_records: Family::default(),
            // 1ms up to about 17 minutes
            cycle_duration: Family::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.001, 4.0, 11))
            }),
            registry: Arc::default(),
        };

        let mut registry = Registry::with_prefix(REGISTRY_PREFIX);
        registry.register(
            INCOMING_RECORDS,
            "Records received from the vendor API",
            metrics.incoming_records.clone(),
        );
        registry.register(
            FORWARDED_RECORDS,
            "Records accepted by the sink",
            metrics.forwarded_records.clone(),
        );
        registry.register_with_unit(
            CYCLE_DURATION,
            "Duration of a poll cycle, failed ones included",
            Unit::Seconds,
            metrics.cycle_duration.clone(),
        );
        *metrics.registry.lock() = registry;

        metrics
    }

    pub(crate) fn incoming(&self, records: usize) {
        self.incoming_records
            .get_or_create(&self.labels)
            .inc_by(records as u64);
    }

    pub(crate) fn forwarded(&self, records: usize) {
        self.forwarded_records
            .get_or_create(&self.labels)
            .inc_by(records as u64);
    }

    pub(crate) fn observe_cycle(&self, elapsed: Duration) {
        self.cycle_duration
            .get_or_create(&self.labels)
            .observe(elapsed.as_secs_f64());
    }

    pub fn incoming_total(&self) -> u64 {
        self.incoming_records.get_or_create(&self.labels).get()
    }

    pub fn forwarded_total(&self) -> u64 {
        self.forwarded_records.get_or_create(&self.labels).get()
    }

    /// OpenMetrics text exposition of the registry.
    pub fn encode(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();
        encode(&mut buf, &self.registry.lock())?;
        Ok(buf)
    }
}
