use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Process-level state behind the operational endpoints.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Parses a `--ttl` value given in seconds.
pub(crate) fn parse_ttl(raw: &str) -> Result<i64, String> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|secs| *secs > 0)
        .ok_or_else(|| format!("'{raw}' is not a positive number of seconds"))
}
