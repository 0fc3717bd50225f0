use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: booking requests that created a reservation.
pub const BOOKINGS_TOTAL: &str = "fleetres_bookings_total";

/// Counter: booking requests rejected because the range was taken.
pub const BOOKING_CONFLICTS_TOTAL: &str = "fleetres_booking_conflicts_total";

/// Counter: successful lifecycle transitions. Labels: to.
pub const TRANSITIONS_TOTAL: &str = "fleetres_transitions_total";

/// Counter: operations that gave up waiting for a vehicle's lock.
pub const LOCK_TIMEOUTS_TOTAL: &str = "fleetres_lock_timeouts_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: vehicles with tracked state.
pub const VEHICLES_TRACKED: &str = "fleetres_vehicles_tracked";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "fleetres_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (records per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "fleetres_wal_flush_batch_size";

/// Install the Prometheus metrics exporter on the given port. No-op if port
/// is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Plain stdout tracing subscriber for embedders that don't bring their own.
pub fn init_tracing() {
    tracing_subscriber::fmt::init();
}
