use prometheus::{
    proto::Metric, Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry,
    TextEncoder,
};

const DURATION_METRIC: &str = "simulation_duration_seconds";
const ERRORS_METRIC: &str = "simulation_errors_total";

/// Prometheus metrics for the worker
///
/// Prometheus collectors synchronize internally, so the dispatcher and the
/// scrape handler share this through an `Arc` without extra locking.
pub struct WorkerMetrics {
    pub registry: Registry,

    /// Duration of successful simulation runs, by plugin
    pub simulation_duration: HistogramVec,

    /// Failed simulation runs, by plugin
    pub simulation_errors: IntCounterVec,
}

impl WorkerMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let simulation_duration = HistogramVec::new(
            HistogramOpts::new(DURATION_METRIC, "Duration of simulation runs in seconds"),
            &["plugin"],
        )?;
        registry.register(Box::new(simulation_duration.clone()))?;

        let simulation_errors = IntCounterVec::new(
            Opts::new(ERRORS_METRIC, "Total simulation errors"),
            &["plugin"],
        )?;
        registry.register(Box::new(simulation_errors.clone()))?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(WorkerMetrics {
            registry,
            simulation_duration,
            simulation_errors,
        })
    }

    /// Record the duration of a successful run
    pub fn observe_duration(&self, plugin: &str, duration_secs: f64) {
        self.simulation_duration
            .with_label_values(&[plugin])
            .observe(duration_secs);
    }

    /// Count a failed run
    pub fn inc_errors(&self, plugin: &str) {
        self.simulation_errors.with_label_values(&[plugin]).inc();
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn encode(&self) -> Result<Vec<u8>, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(buffer)
    }

    /// Number of duration observations recorded for a plugin
    pub fn duration_count(&self, plugin: &str) -> u64 {
        self.find(DURATION_METRIC, plugin)
            .map(|m| m.get_histogram().get_sample_count())
            .unwrap_or(0)
    }

    /// Error count recorded for a plugin
    pub fn error_count(&self, plugin: &str) -> u64 {
        self.find(ERRORS_METRIC, plugin)
            .map(|m| m.get_counter().get_value() as u64)
            .unwrap_or(0)
    }

    // Reads through `gather` so that looking up a label never creates it.
    fn find(&self, family: &str, plugin: &str) -> Option<Metric> {
        let families = self.registry.gather();
        let family = families.iter().find(|f| f.get_name() == family)?;
        family
            .get_metric()
            .iter()
            .find(|m| {
                m.get_label()
                    .iter()
                    .any(|l| l.get_name() == "plugin" && l.get_value() == plugin)
            })
            .cloned()
    }
}
