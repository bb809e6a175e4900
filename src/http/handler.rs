//! axum router and HTTP request handlers for the forward-auth gate.
//!
//! Routes:
//! - `GET /healthz` - Health check
//! - `GET /metrics` - Prometheus metrics
//! - anything else  - Forward-auth check for the user named in the
//!   configured header

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tracing::{debug, error, instrument, warn};

use crate::AppState;

/// Response header carrying the verified user back to the reverse proxy.
pub const FORWARDED_USER: HeaderName = HeaderName::from_static("x-forwarded-user");

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the axum [`Router`] with all HTTP routes and shared state.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(handle_health))
        .route("/metrics", get(handle_metrics))
        // The reverse proxy may call any path and method.
        .fallback(handle_forward_auth)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Forward-auth check.
///
/// Reads the authenticated user's email from the configured header and makes
/// sure that user has access to the organisation.  Responds 200 with the
/// user echoed in `X-Forwarded-User`, 401 when no user was supplied, and 403
/// when access could not be ensured.
#[instrument(skip(state, headers))]
async fn handle_forward_auth(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let email = extract_user(&headers, &state.config.server.user_header)?;

    match state.gate.ensure_access(&email).await {
        Ok(outcome) => {
            debug!(%email, ?outcome, "access ensured");
            let echoed = HeaderValue::from_bytes(email.as_bytes())
                .map_err(|e| AppError::Internal(anyhow::anyhow!("cannot echo user header: {e}")))?;
            Ok((StatusCode::OK, [(FORWARDED_USER, echoed)]).into_response())
        }
        Err(e) => {
            warn!(%email, error = %format!("{e:#}"), "access could not be ensured");
            Err(AppError::Forbidden(format!(
                "access to the organisation could not be ensured for {email}"
            )))
        }
    }
}

/// `GET /healthz`
async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    crate::health::health(&state.gate).await
}

/// `GET /metrics`
///
/// Returns Prometheus metrics collected by the gate.
async fn handle_metrics(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let buf = state.metrics.encode()?;

    Ok((
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        buf,
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Pull the user's email out of `header_name`.
fn extract_user(headers: &HeaderMap, header_name: &str) -> Result<String, AppError> {
    let value = headers
        .get(header_name)
        .ok_or_else(|| AppError::Unauthorized(format!("missing {header_name} header")))?;
    // Header values may carry non-ASCII bytes; any valid UTF-8 is accepted.
    let email = std::str::from_utf8(value.as_bytes())
        .map_err(|_| AppError::Unauthorized(format!("{header_name} header is not valid UTF-8")))?
        .trim();
    if email.is_empty() {
        return Err(AppError::Unauthorized(format!(
            "{header_name} header is empty"
        )));
    }
    Ok(email.to_string())
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Application-level error type that maps cleanly to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// No authenticated user was passed by the reverse proxy.
    Unauthorized(String),
    /// The user is known but access could not be ensured.
    Forbidden(String),
    /// An unexpected internal error.
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg).into_response(),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg).into_response(),
            AppError::Internal(err) => {
                error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Internal server error: {err:#}"),
                )
                    .into_response()
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}
