//! Authentication and role gates
//!
//! Missing authentication is terminal: the gate returns
//! `AppError::Redirect` to the sign-in route and the caller propagates it.
//! A role mismatch is not terminal: it comes back as an `AuthzDecision`
//! value that the caller must inspect.

use axum::{
    Json, async_trait,
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use super::context::SessionContext;
use super::session::{Role, Session};
use crate::AppState;
use crate::error::AppError;
use crate::metrics::GATE_DECISIONS_TOTAL;

/// Where unauthenticated callers are sent
pub const SIGN_IN_ROUTE: &str = "/sign-in";
/// Where authenticated callers land after signing in
pub const LANDING_ROUTE: &str = "/orgs";

/// Outcome of a gate check
#[derive(Debug, Clone, PartialEq)]
pub enum AuthzDecision {
    Authenticated(Session),
    Unauthenticated,
    Forbidden {
        reason: String,
        status_code: StatusCode,
    },
}

/// Wire shape of a decision
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DecisionBody<'a> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a Session>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    status_code: u16,
}

impl AuthzDecision {
    pub fn is_success(&self) -> bool {
        matches!(self, AuthzDecision::Authenticated(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthzDecision::Authenticated(_) => StatusCode::OK,
            AuthzDecision::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthzDecision::Forbidden { status_code, .. } => *status_code,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthzDecision::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    /// `{success, data?, error?, statusCode}`
    pub fn to_json(&self) -> serde_json::Value {
        let body = match self {
            AuthzDecision::Authenticated(session) => DecisionBody {
                success: true,
                data: Some(session),
                error: None,
                status_code: self.status_code().as_u16(),
            },
            AuthzDecision::Unauthenticated => DecisionBody {
                success: false,
                data: None,
                error: Some("Authentication required"),
                status_code: self.status_code().as_u16(),
            },
            AuthzDecision::Forbidden { reason, .. } => DecisionBody {
                success: false,
                data: None,
                error: Some(reason),
                status_code: self.status_code().as_u16(),
            },
        };
        serde_json::to_value(body).unwrap_or_default()
    }
}

impl IntoResponse for AuthzDecision {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}

/// Require a signed-in caller
///
/// # Errors
/// `AppError::Redirect` to the sign-in route when there is no session;
/// provider failures propagate unchanged.
pub async fn require_authenticated(ctx: &SessionContext) -> Result<Session, AppError> {
    match ctx.get_session().await? {
        Some(session) => {
            GATE_DECISIONS_TOTAL
                .with_label_values(&["authenticated", "allow"])
                .inc();
            Ok(session)
        }
        None => {
            GATE_DECISIONS_TOTAL
                .with_label_values(&["authenticated", "redirect"])
                .inc();
            tracing::debug!(request_id = %ctx.request_id(), "No session, redirecting to sign-in");
            Err(AppError::redirect(SIGN_IN_ROUTE))
        }
    }
}

/// Require a signed-in caller holding `role`
///
/// Redirects like `require_authenticated` when there is no session.
/// A role mismatch is returned as `AuthzDecision::Forbidden` with a 401.
pub async fn require_role(ctx: &SessionContext, role: Role) -> Result<AuthzDecision, AppError> {
    let session = require_authenticated(ctx).await?;

    if session.user.role == role {
        GATE_DECISIONS_TOTAL.with_label_values(&["role", "allow"]).inc();
        return Ok(AuthzDecision::Authenticated(session));
    }

    GATE_DECISIONS_TOTAL.with_label_values(&["role", "deny"]).inc();
    tracing::info!(
        request_id = %ctx.request_id(),
        user_id = %session.user.id,
        required = %role,
        actual = %session.user.role,
        "Role check denied"
    );

    Ok(AuthzDecision::Forbidden {
        reason: "Unauthorized".to_string(),
        status_code: StatusCode::UNAUTHORIZED,
    })
}

/// Non-terminal authentication check
pub async fn check_authenticated(ctx: &SessionContext) -> Result<AuthzDecision, AppError> {
    Ok(match ctx.get_session().await? {
        Some(session) => AuthzDecision::Authenticated(session),
        None => AuthzDecision::Unauthenticated,
    })
}

/// Send already signed-in callers to the landing route
///
/// Used by the sign-in and sign-up entry points.
pub async fn redirect_if_authenticated(ctx: &SessionContext) -> Result<(), AppError> {
    if check_authenticated(ctx).await?.is_success() {
        GATE_DECISIONS_TOTAL
            .with_label_values(&["entry", "redirect"])
            .inc();
        return Err(AppError::redirect(LANDING_ROUTE));
    }
    Ok(())
}

/// Extractor for handlers that need a signed-in caller
///
/// Rejects with a redirect to the sign-in route.
///
/// # Usage
/// ```ignore
/// async fn handler(Authenticated(session): Authenticated) -> impl IntoResponse {
///     format!("Hello, {}", session.user.name)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Authenticated(pub Session);

#[async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ctx = match SessionContext::from_request_parts(parts, state).await {
            Ok(ctx) => ctx,
            Err(never) => match never {},
        };
        require_authenticated(&ctx).await.map(Authenticated)
    }
}
