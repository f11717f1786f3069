use std::net::SocketAddr;

// ── Backend traffic ─────────────────────────────────────────────

/// Counter: backend requests issued. Labels: method, status.
pub const BACKEND_REQUESTS_TOTAL: &str = "cowork_backend_requests_total";

/// Histogram: backend request latency in seconds. Labels: method.
pub const BACKEND_REQUEST_DURATION_SECONDS: &str = "cowork_backend_request_duration_seconds";

/// Counter: sessions dropped by logout or a 401.
pub const SESSION_CLEARS_TOTAL: &str = "cowork_session_clears_total";

// ── Booking workflow ────────────────────────────────────────────

/// Counter: reservation requests refused client-side. Labels: kind.
pub const RESERVATION_CONFLICTS_TOTAL: &str = "cowork_reservation_conflicts_total";

/// Counter: reservations submitted after passing validation.
pub const RESERVATIONS_CREATED_TOTAL: &str = "cowork_reservations_created_total";

/// Counter: availability fetches that failed and were treated as "nothing blocked". Labels: source.
pub const AVAILABILITY_FAIL_OPEN_TOTAL: &str = "cowork_availability_fail_open_total";

/// Counter: subscription changes. Labels: action, status.
pub const SUBSCRIPTION_CHANGES_TOTAL: &str = "cowork_subscription_changes_total";

/// Counter: dashboard loads. Labels: outcome.
pub const DASHBOARD_LOADS_TOTAL: &str = "cowork_dashboard_loads_total";

/// Counter: invoices generated.
pub const INVOICES_GENERATED_TOTAL: &str = "cowork_invoices_generated_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Collapse a status code into a low-cardinality label.
pub fn status_label(status: u16) -> &'static str {
    match status {
        200..=299 => "2xx",
        401 => "401",
        403 => "403",
        404 => "404",
        400..=499 => "4xx",
        _ => "5xx",
    }
}
