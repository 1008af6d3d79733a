//! Portalgate - identity boundary for the Client Portal Hub
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      HTTP Layer (Axum)                       │
//! │  - Sign-in / sign-up entry points and submissions           │
//! │  - Landing, admin and hook endpoints                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Auth Layer                              │
//! │  - Per-request session cache                                │
//! │  - Authentication and role gates                            │
//! │  - Credential flow orchestration                            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   External Services                          │
//! │  - Identity provider (HTTP)                                 │
//! │  - SMTP relay                                               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: Landing, admin, hook and metrics handlers
//! - `auth`: Session cache, gates, flows and the identity provider client
//! - `mail`: Transactional email
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod mail;
pub mod metrics;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// Everything here is read-only after start-up except the federated
/// in-flight set.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Identity provider client
    pub identity: Arc<dyn auth::IdentityProvider>,

    /// Transactional mail dispatcher
    pub mailer: Arc<mail::Mailer>,

    /// Federated attempts still waiting on the provider
    pub federated_guard: auth::FederatedGuard,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Build the identity provider client
    /// 2. Configure the SMTP transport
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let identity = auth::HttpIdentityProvider::new(&config.identity)?;
        tracing::info!(base_url = %config.identity.base_url, "Identity provider client ready");

        let mailer = mail::Mailer::from_config(&config)?;
        tracing::info!(sender = %mailer.sender(), "Mailer ready");

        Ok(Self::with_components(config, Arc::new(identity), mailer))
    }

    /// Assemble state from already-built parts
    pub fn with_components(
        config: config::AppConfig,
        identity: Arc<dyn auth::IdentityProvider>,
        mailer: mail::Mailer,
    ) -> Self {
        Self {
            config: Arc::new(config),
            identity,
            mailer: Arc::new(mailer),
            federated_guard: auth::FederatedGuard::new(),
        }
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::trace::TraceLayer;

    let cors_layer = build_cors_layer(&state.config.server);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(auth::auth_router())
        .merge(api::orgs_router())
        .nest("/admin", api::admin_router())
        .nest("/hooks", api::hooks_router())
        .merge(api::metrics_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::HeaderValue;
    use tower_http::cors::{Any, CorsLayer};

    if !server.protocol.eq_ignore_ascii_case("https") {
        return CorsLayer::permissive();
    }

    let allowed_origin = server.base_url();
    match HeaderValue::from_str(&allowed_origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin([origin])
            .allow_methods(Any)
            .allow_headers(Any),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %allowed_origin,
                "Failed to parse CORS origin from server base URL; denying cross-origin requests"
            );
            CorsLayer::new().allow_methods(Any).allow_headers(Any)
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}
