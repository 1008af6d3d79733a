//! Admin API endpoints
//!
//! All routes require the `ADMIN` role. A signed-in caller without it gets
//! the gate's 401 decision rather than a redirect.

use axum::{Router, routing::get};

use crate::AppState;
use crate::auth::{AuthzDecision, Role, SessionContext, require_role};
use crate::error::AppError;

/// Create admin router
///
/// Routes:
/// - GET /admin/session - Role gate check
pub fn admin_router() -> Router<AppState> {
    Router::new().route("/session", get(session_check))
}

/// GET /admin/session
///
/// Renders the role decision as `{success, data?, error?, statusCode}`.
async fn session_check(ctx: SessionContext) -> Result<AuthzDecision, AppError> {
    require_role(&ctx, Role::Admin).await
}
