use std::net::SocketAddr;

use crate::wire::Request;

// ── Queue engine ────────────────────────────────────────────────

/// Counter: borrow requests. Labels: outcome.
pub const REQUESTS_TOTAL: &str = "loanq_requests_total";

/// Counter: administrative approvals. Labels: outcome.
pub const APPROVALS_TOTAL: &str = "loanq_approvals_total";

/// Counter: reservations returned.
pub const RETURNS_TOTAL: &str = "loanq_returns_total";

/// Counter: members leaving.
pub const DEPARTURES_TOTAL: &str = "loanq_departures_total";

/// Counter: daily resets performed.
pub const RESETS_TOTAL: &str = "loanq_resets_total";

/// Counter: inactive or unregistered waiters dropped during a notified-set rebuild.
pub const STALE_WAITERS_PURGED_TOTAL: &str = "loanq_stale_waiters_purged_total";

/// Gauge: members currently present.
pub const MEMBERS_ACTIVE: &str = "loanq_members_active";

/// Gauge: members waiting for a book. Labels: book.
pub const WAITLIST_LENGTH: &str = "loanq_waitlist_length";

/// Histogram: time spent waiting for a book lock, in seconds.
pub const LOCK_WAIT_SECONDS: &str = "loanq_lock_wait_seconds";

// ── Wire ────────────────────────────────────────────────────────

/// Counter: commands executed. Labels: command, status.
pub const COMMANDS_TOTAL: &str = "loanq_commands_total";

/// Histogram: command latency in seconds. Labels: command.
pub const COMMAND_DURATION_SECONDS: &str = "loanq_command_duration_seconds";

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "loanq_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "loanq_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "loanq_connections_rejected_total";

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

/// Map a Request variant to a short label for metrics.
pub fn command_label(req: &Request) -> &'static str {
    match req {
        Request::Enter { .. } => "enter",
        Request::Leave { .. } => "leave",
        Request::Request { .. } => "request",
        Request::Return { .. } => "return",
        Request::Approve { .. } => "approve",
        Request::Notifications => "notifications",
        Request::Waitlist { .. } => "waitlist",
        Request::Overdue => "overdue",
        Request::Reset => "reset",
    }
}
