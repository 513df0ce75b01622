use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and register descriptions.
    pub fn init() -> Result<Self> {
        // Use default buckets to avoid API differences across crate versions.
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_metrics_described();
        Ok(Self { handle })
    }
}

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("gateway_events_total", "Sensor events ingested, by kind.");
        describe_counter!(
            "gateway_events_invalid_total",
            "Events skipped because the payload could not be converted."
        );
        describe_counter!(
            "gateway_events_dropped_total",
            "Events dropped because the inbound queue was full."
        );
        describe_counter!("gateway_source_errors_total", "Transport read errors.");
        describe_counter!("gateway_reports_total", "Reports delivered.");
        describe_counter!("gateway_report_errors_total", "Reports that failed.");
        describe_gauge!("gateway_queue_depth", "Events waiting for the consumer.");
        describe_gauge!("gateway_last_tick_ts", "Unix ts of the last aggregation tick.");
    });
}
