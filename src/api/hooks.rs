//! Provider-invoked hooks
//!
//! The identity provider calls these when it needs the portal to send
//! mail on its behalf. Callers authenticate with
//! `Authorization: Bearer <hooks.secret>`; without a configured secret the
//! routes answer 404.

use axum::{
    Json, Router, async_trait,
    extract::{FromRef, FromRequestParts, State},
    http::{header, request::Parts},
    routing::post,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::AppState;
use crate::error::AppError;

/// Create hooks router
///
/// Routes:
/// - POST /hooks/password-reset - Send a password reset email
pub fn hooks_router() -> Router<AppState> {
    Router::new().route("/password-reset", post(password_reset))
}

/// Proof that the request carries the hook secret
#[derive(Debug, Clone, Copy)]
pub struct HookCaller;

#[async_trait]
impl<S> FromRequestParts<S> for HookCaller
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let secret = state.config.hooks.secret.as_deref().ok_or(AppError::NotFound)?;

        let presented = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "));

        match presented {
            Some(token) if secrets_match(token.as_bytes(), secret.as_bytes()) => Ok(HookCaller),
            _ => {
                tracing::warn!("Hook call with missing or wrong secret");
                Err(AppError::Unauthorized)
            }
        }
    }
}

fn secrets_match(presented: &[u8], expected: &[u8]) -> bool {
    let presented = Sha256::digest(presented);
    let expected = Sha256::digest(expected);
    presented.ct_eq(&expected).into()
}

/// Reset request as sent by the provider
#[derive(Debug, Deserialize)]
pub struct PasswordResetHook {
    pub user: HookUser,
    /// Provider-generated reset link
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct HookUser {
    pub email: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookAccepted {
    pub message_id: String,
}

/// POST /hooks/password-reset
///
/// Waits for the relay so the provider learns about delivery failures (502).
async fn password_reset(
    _caller: HookCaller,
    State(state): State<AppState>,
    Json(hook): Json<PasswordResetHook>,
) -> Result<Json<HookAccepted>, AppError> {
    let reset_url = url::Url::parse(&hook.url)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .ok_or_else(|| AppError::Validation("url must be an absolute http(s) URL".to_string()))?;

    let message = state
        .mailer
        .password_reset(&hook.user.email, &hook.user.name, reset_url.as_str());
    let receipt = state.mailer.send_email(message).await?;

    Ok(Json(HookAccepted {
        message_id: receipt.message_id,
    }))
}
