//! Run counters and timings.
//!
//! Recording is a no-op until a recorder is installed, so library users and tests
//! pay nothing unless the binary calls [`init_metrics`].

use std::net::SocketAddr;
use tracing::{info, warn};

/// Installs the Prometheus exporter on `0.0.0.0:port`.
pub fn init_metrics(port: u16) {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => info!("Prometheus exporter listening on http://{}/metrics", addr),
        Err(e) => warn!("Prometheus exporter install failed: {}", e),
    }
}

pub struct PipelineMetrics;

impl PipelineMetrics {
    pub fn record_link_assembled() {
        ::metrics::counter!("eventi_links_attempted_total").increment(1);
        ::metrics::counter!("eventi_events_assembled_total").increment(1);
    }

    pub fn record_link_failed(kind: &'static str) {
        ::metrics::counter!("eventi_links_attempted_total").increment(1);
        ::metrics::counter!("eventi_link_failures_total", "kind" => kind).increment(1);
    }

    pub fn record_enrichment_failed() {
        ::metrics::counter!("eventi_enrichment_failures_total").increment(1);
    }

    pub fn record_run(added: usize, cancelled: bool, duration_secs: f64) {
        ::metrics::counter!("eventi_runs_total").increment(1);
        ::metrics::counter!("eventi_events_added_total").increment(added as u64);
        if cancelled {
            ::metrics::counter!("eventi_runs_cancelled_total").increment(1);
        }
        ::metrics::histogram!("eventi_run_duration_seconds").record(duration_secs);
    }
}
