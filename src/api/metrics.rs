//! Prometheus metrics endpoint
//!
//! Exposes application metrics in Prometheus format. Admin only.

use axum::{
    Router,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus::{Encoder, TextEncoder};

use crate::AppState;
use crate::auth::{Role, SessionContext, require_role};
use crate::error::AppError;
use crate::metrics::REGISTRY;

/// Metrics endpoint handler
///
/// Returns all metrics in Prometheus text format.
async fn metrics_handler(ctx: SessionContext) -> Result<Response, AppError> {
    let decision = require_role(&ctx, Role::Admin).await?;
    if !decision.is_success() {
        return Ok(decision.into_response());
    }

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let response = match encoder.encode_to_string(&metric_families) {
        Ok(metrics_text) => (
            axum::http::StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, encoder.format_type())],
            metrics_text,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics",
            )
                .into_response()
        }
    };

    Ok(response)
}

/// Create metrics router
///
/// Exposes the `/metrics` endpoint.
pub fn metrics_router() -> Router<AppState> {
    Router::new().route("/metrics", get(metrics_handler))
}
