use metrics::{describe_counter, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Thin handle around the global metrics recorder.
///
/// After `Metrics::install()` the `metrics` crate macros (`counter!`) can be
/// used anywhere in the admission path. The `PrometheusHandle` is retained
/// solely for rendering a `/metrics` endpoint from the embedding host.
#[derive(Clone)]
pub struct Metrics {
    handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder and register metric descriptions.
    ///
    /// Must be called **once** at startup before any `counter!` calls. A host
    /// that already installs its own recorder should skip this and rely on
    /// `describe_counter!`/`counter!` being no-ops-safe against any recorder.
    pub fn install() -> Self {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("failed to install metrics recorder");

        describe_counter!(
            "rate_limiter_requests_total",
            Unit::Count,
            "Total admission decisions made by the rate limiter, labeled by outcome"
        );

        Self { handle }
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Record one admission decision. Called unconditionally from `try_acquire`,
/// including the fail-open path, so that a disabled limiter is still visible
/// in metrics (as `limited = "false"` for every call).
pub(crate) fn record_decision(resource_key: &str, limited: bool) {
    metrics::counter!(
        "rate_limiter_requests_total",
        "service_name" => resource_key.to_string(),
        "limited" => if limited { "true" } else { "false" },
    )
    .increment(1);
}
