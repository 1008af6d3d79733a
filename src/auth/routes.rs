//! Sign-in and sign-up HTTP surface
//!
//! Routes:
//! - GET  /sign-in         - Sign-in page descriptor
//! - POST /sign-in         - Email/password sign-in
//! - GET  /sign-up         - Sign-up page descriptor
//! - POST /sign-up         - Email/password sign-up
//! - POST /sign-in/social  - Federated sign-in or sign-up

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::Serialize;
use ulid::Ulid;

use super::context::SessionContext;
use super::flow::{CredentialFlow, FlowReport};
use super::gate::redirect_if_authenticated;
use super::provider::FederatedProvider;
use super::validation::{FederatedSubmission, SignInSubmission, SignUpSubmission};
use crate::AppState;
use crate::config::AppConfig;
use crate::error::AppError;

/// Cookie identifying the browser for the federated in-flight guard
pub const CLIENT_COOKIE: &str = "portal_client";

/// Create auth router
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/sign-in", get(sign_in_page).post(sign_in))
        .route("/sign-up", get(sign_up_page).post(sign_up))
        .route("/sign-in/social", post(federated))
}

// =============================================================================
// Entry pages
// =============================================================================

/// What the client needs to render an entry page
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDescriptor {
    page: &'static str,
    title: &'static str,
    fields: &'static [&'static str],
    providers: Vec<ProviderButton>,
    /// Link to the other entry page
    alternate: &'static str,
}

#[derive(Debug, Serialize)]
struct ProviderButton {
    id: &'static str,
    name: &'static str,
}

impl PageDescriptor {
    fn sign_in() -> Self {
        Self {
            page: "sign-in",
            title: "Sign in",
            fields: &["email", "password"],
            providers: provider_buttons(),
            alternate: "/sign-up",
        }
    }

    fn sign_up() -> Self {
        Self {
            page: "sign-up",
            title: "Create an account",
            fields: &["name", "email", "password"],
            providers: provider_buttons(),
            alternate: "/sign-in",
        }
    }
}

fn provider_buttons() -> Vec<ProviderButton> {
    FederatedProvider::ALL
        .iter()
        .map(|provider| ProviderButton {
            id: provider.id(),
            name: provider.display_name(),
        })
        .collect()
}

/// GET /sign-in
///
/// Signed-in callers are sent to the landing route.
async fn sign_in_page(
    ctx: SessionContext,
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<PageDescriptor>), AppError> {
    redirect_if_authenticated(&ctx).await?;
    Ok((
        with_client_cookie(jar, &state.config),
        Json(PageDescriptor::sign_in()),
    ))
}

/// GET /sign-up
async fn sign_up_page(
    ctx: SessionContext,
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<PageDescriptor>), AppError> {
    redirect_if_authenticated(&ctx).await?;
    Ok((
        with_client_cookie(jar, &state.config),
        Json(PageDescriptor::sign_up()),
    ))
}

fn with_client_cookie(jar: CookieJar, config: &AppConfig) -> CookieJar {
    if jar.get(CLIENT_COOKIE).is_some() {
        return jar;
    }

    let cookie = Cookie::build((CLIENT_COOKIE, Ulid::new().to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.should_use_secure_cookies())
        .build();
    jar.add(cookie)
}

// =============================================================================
// Submissions
// =============================================================================

/// POST /sign-in
///
/// Signed-in callers are sent to the landing route before the provider
/// is contacted.
async fn sign_in(
    ctx: SessionContext,
    State(state): State<AppState>,
    Json(submission): Json<SignInSubmission>,
) -> Result<FlowReport, AppError> {
    redirect_if_authenticated(&ctx).await?;
    Ok(CredentialFlow::new(state.identity.as_ref())
        .sign_in(submission)
        .await)
}

/// POST /sign-up
///
/// A welcome email follows a successful sign-up.
async fn sign_up(
    ctx: SessionContext,
    State(state): State<AppState>,
    Json(submission): Json<SignUpSubmission>,
) -> Result<FlowReport, AppError> {
    redirect_if_authenticated(&ctx).await?;
    Ok(CredentialFlow::new(state.identity.as_ref())
        .with_mailer(&state.mailer)
        .sign_up(submission)
        .await)
}

/// POST /sign-in/social
///
/// Requests without the client cookie get a one-off control key, so
/// they are never turned away as duplicates.
async fn federated(
    ctx: SessionContext,
    State(state): State<AppState>,
    jar: CookieJar,
    Json(submission): Json<FederatedSubmission>,
) -> Result<FlowReport, AppError> {
    redirect_if_authenticated(&ctx).await?;
    let control = jar
        .get(CLIENT_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .unwrap_or_else(|| Ulid::new().to_string());

    Ok(CredentialFlow::new(state.identity.as_ref())
        .federated(submission, &state.federated_guard, &control)
        .await)
}
