//! Metrics definitions for Huddle.
//!
//! All metrics follow Prometheus naming conventions:
//! - `huddle_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `method`: HTTP methods
//! - `endpoint`: parameterized paths (ids replaced by placeholders)
//! - `status`: success, error, timeout (plus `conflict` for DB queries)
//! - `operation`: bounded by code
//! - `transition` / `reason`: fixed enum values

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and return the handle used by `/metrics`.
///
/// Must be called before any metric is recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("huddle_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("huddle_db_query".to_string()),
            &[
                0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set DB query buckets: {e}"))?
        // Cascades walk every dependent record, so they get a longer tail
        .set_buckets_for_metric(
            Matcher::Prefix("huddle_cascade".to_string()),
            &[0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000, 20.000],
        )
        .map_err(|e| format!("Failed to set cascade buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion.
///
/// Metric: `huddle_http_requests_total`, `huddle_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("huddle_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("huddle_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize an endpoint path so ids do not become label values.
fn normalize_endpoint(path: &str) -> String {
    match path {
        "/" | "/health" | "/ready" | "/metrics" | "/api/v1/accounts" | "/api/v1/meetings"
        | "/api/v1/invites" => path.to_string(),
        _ => normalize_dynamic_endpoint(path),
    }
}

fn normalize_dynamic_endpoint(path: &str) -> String {
    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();

    let normalized = match segments.as_slice() {
        ["api", "v1", "accounts", "@me"] => "/api/v1/accounts/@me",
        ["api", "v1", "accounts", "@me", "meetings"] => "/api/v1/accounts/@me/meetings",
        ["api", "v1", "accounts", "@me", "meetings", "count"] => {
            "/api/v1/accounts/@me/meetings/count"
        }
        ["api", "v1", "accounts", "@me", "invites"] => "/api/v1/accounts/@me/invites",
        ["api", "v1", "accounts", "@me", "invites", "count"] => {
            "/api/v1/accounts/@me/invites/count"
        }
        ["api", "v1", "meetings", _] => "/api/v1/meetings/{id}",
        ["api", "v1", "meetings", _, "invites"] => "/api/v1/meetings/{id}/invites",
        ["api", "v1", "meetings", _, "invites", "count"] => "/api/v1/meetings/{id}/invites/count",
        ["api", "v1", "meetings", _, "organizers", _] => {
            "/api/v1/meetings/{id}/organizers/{account_id}"
        }
        ["api", "v1", "invites", _] => "/api/v1/invites/{id}",
        ["api", "v1", "invites", _, "accept"] => "/api/v1/invites/{id}/accept",
        _ => "/other",
    };

    normalized.to_string()
}

// ============================================================================
// Database Metrics
// ============================================================================

/// Record database query execution.
///
/// Metric: `huddle_db_query_duration_seconds`, `huddle_db_queries_total`
/// Labels: `operation`, `status`
pub fn record_db_query(operation: &str, status: &str, duration: Duration) {
    histogram!("huddle_db_query_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("huddle_db_queries_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Invitation Lifecycle Metrics
// ============================================================================

/// Record an invitation leaving or entering the pending state.
///
/// Metric: `huddle_invitation_transitions_total`
/// Labels: `transition` (sent, accepted, already_member, rejected, reaped),
/// `reason` (none or a stale reason)
pub fn record_invitation_transition(transition: &str, reason: Option<&str>) {
    counter!("huddle_invitation_transitions_total",
        "transition" => transition.to_string(),
        "reason" => reason.unwrap_or("none").to_string()
    )
    .increment(1);
}

/// Record a cascade delete.
///
/// Metric: `huddle_cascade_duration_seconds`, `huddle_cascade_items_total`
/// Labels: `kind` (meeting, account), `status` (removed, failed)
pub fn record_cascade(kind: &str, removed: usize, failed: usize, duration: Duration) {
    histogram!("huddle_cascade_duration_seconds",
        "kind" => kind.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("huddle_cascade_items_total",
        "kind" => kind.to_string(),
        "status" => "removed"
    )
    .increment(removed as u64);

    if failed > 0 {
        counter!("huddle_cascade_items_total",
            "kind" => kind.to_string(),
            "status" => "failed"
        )
        .increment(failed as u64);
    }
}

/// Record an operation abandoned at its deadline.
///
/// Metric: `huddle_deadline_exceeded_total`
/// Labels: `operation`
pub fn record_deadline_exceeded(operation: &str) {
    counter!("huddle_deadline_exceeded_total",
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record a quota rejection.
///
/// Metric: `huddle_quota_rejections_total`
/// Labels: `quota` (meeting, invite)
pub fn record_quota_rejection(quota: &str) {
    counter!("huddle_quota_rejections_total",
        "quota" => quota.to_string()
    )
    .increment(1);
}
