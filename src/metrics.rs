use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, TextEncoder, register_histogram,
    register_int_counter, register_int_counter_vec, register_int_gauge,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: IntCounter =
        register_int_counter!("gateway_requests_total", "Total number of requests").unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "gateway_request_latency_seconds",
        "Request latency in seconds"
    )
    .unwrap();
    pub static ref RATE_LIMITED: IntCounterVec = register_int_counter_vec!(
        "gateway_rate_limited_total",
        "Requests rejected by the rate limiter",
        &["policy"]
    )
    .unwrap();
    pub static ref RATE_LIMIT_ENTRIES: IntGauge =
        register_int_gauge!("rate_limit_entries", "Live rate limit entries").unwrap();
    pub static ref EVENTS_DELIVERED: IntCounter = register_int_counter!(
        "analytics_events_delivered_total",
        "Analytics events accepted by the collector"
    )
    .unwrap();
    pub static ref EVENTS_FAILED: IntCounter = register_int_counter!(
        "analytics_events_failed_total",
        "Analytics deliveries that failed and were queued again"
    )
    .unwrap();
    pub static ref EVENTS_DROPPED: IntCounter = register_int_counter!(
        "analytics_events_dropped_total",
        "Analytics events dropped (rejected or queue overflow)"
    )
    .unwrap();
    pub static ref QUEUE_DEPTH: IntGauge =
        register_int_gauge!("analytics_queue_depth", "Analytics events waiting to flush").unwrap();
}

// Text exposition of everything in the default registry
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_registered_metrics() {
        REQUEST_TOTAL.inc();
        RATE_LIMITED.with_label_values(&["search"]).inc();
        let text = render().unwrap();
        assert!(text.contains("gateway_requests_total"));
        assert!(text.contains("gateway_rate_limited_total{policy=\"search\"}"));
    }
}
