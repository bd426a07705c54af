use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "camrent_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "camrent_query_duration_seconds";

/// Counter: rental decisions. Labels: op (create/update/move/resize/cancel),
/// outcome (accepted, or the rejection kind such as conflict).
pub const RENTAL_DECISIONS_TOTAL: &str = "camrent_rental_decisions_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "camrent_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "camrent_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "camrent_connections_rejected_total";

/// Counter: logins refused before password check (unknown user).
pub const AUTH_FAILURES_TOTAL: &str = "camrent_auth_failures_total";

/// Counter: mutations refused to a read-only session.
pub const PERMISSION_DENIED_TOTAL: &str = "camrent_permission_denied_total";

/// Histogram: journal group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "camrent_wal_flush_duration_seconds";

/// Histogram: journal group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "camrent_wal_flush_batch_size";

/// Counter: journal compactions. Labels: status.
pub const COMPACTIONS_TOTAL: &str = "camrent_compactions_total";

/// Install the Prometheus exporter on `port`. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::InsertCamera { .. } => "insert_camera",
        Command::UpdateCamera { .. } => "update_camera",
        Command::DeleteCamera { .. } => "delete_camera",
        Command::SelectCameras { .. } => "select_cameras",
        Command::InsertRental { .. } => "insert_rental",
        Command::UpdateRental { .. } => "update_rental",
        Command::MoveRental { .. } => "move_rental",
        Command::ResizeRental { .. } => "resize_rental",
        Command::CancelRental { .. } => "cancel_rental",
        Command::SelectRentals { .. } => "select_rentals",
    }
}
