use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::access::AccessGate;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub checks: HealthChecks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub grist: CheckResult,
    pub snapshot: CheckResult,
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CheckResult {
    fn healthy(detail: Option<String>) -> Self {
        Self { ok: true, detail }
    }

    fn unhealthy(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: Some(detail.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Individual checks
// ---------------------------------------------------------------------------

async fn check_grist(gate: &AccessGate) -> CheckResult {
    match gate.api().check_health().await {
        Ok(()) => CheckResult::healthy(None),
        Err(e) => CheckResult::unhealthy(format!("{e:#}")),
    }
}

fn check_snapshot(gate: &AccessGate) -> CheckResult {
    let members = gate.snapshot().len();
    if members > 0 {
        CheckResult::healthy(Some(format!("{members} members cached")))
    } else {
        CheckResult::unhealthy("snapshot is empty")
    }
}

// ---------------------------------------------------------------------------
// Aggregate status
// ---------------------------------------------------------------------------

/// Grist being reachable is what matters; a warm snapshot keeps known users
/// working while it is not.
fn aggregate_status(checks: &HealthChecks) -> HealthStatus {
    if checks.grist.ok {
        HealthStatus::Ok
    } else if checks.snapshot.ok {
        HealthStatus::Degraded
    } else {
        HealthStatus::Unhealthy
    }
}

/// Run all checks.  Returns 200 on Ok/Degraded, 503 on Unhealthy.
pub async fn health(gate: &AccessGate) -> impl IntoResponse {
    let checks = HealthChecks {
        grist: check_grist(gate).await,
        snapshot: check_snapshot(gate),
    };
    let status = aggregate_status(&checks);
    let body = HealthResponse { status, checks };

    let http_status = match status {
        HealthStatus::Ok | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (http_status, Json(body))
}
