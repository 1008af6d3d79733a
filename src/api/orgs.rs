//! Post sign-in landing

use axum::{Json, Router, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::AppState;
use crate::auth::{Authenticated, User};

/// Create landing router
///
/// Routes:
/// - GET /orgs - Signed-in landing page
pub fn orgs_router() -> Router<AppState> {
    Router::new().route("/orgs", get(landing))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Landing {
    user: User,
    session_expires_at: DateTime<Utc>,
}

/// GET /orgs
///
/// Anonymous callers are redirected to `/sign-in` by the extractor.
async fn landing(Authenticated(session): Authenticated) -> Json<Landing> {
    Json(Landing {
        user: session.user,
        session_expires_at: session.expires_at,
    })
}
