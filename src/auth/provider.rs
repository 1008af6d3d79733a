//! Identity provider contract
//!
//! The provider owns users, credentials and sessions. This crate only
//! asks it who the caller is and forwards sign-in/sign-up submissions.

use axum::async_trait;
use http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::session::Session;

/// External providers offered for federated sign-in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FederatedProvider {
    Google,
    Github,
}

impl FederatedProvider {
    pub const ALL: [FederatedProvider; 2] = [FederatedProvider::Google, FederatedProvider::Github];

    /// Wire identifier understood by the provider
    pub fn id(self) -> &'static str {
        match self {
            FederatedProvider::Google => "google",
            FederatedProvider::Github => "github",
        }
    }

    /// Human-readable name used in notices
    pub fn display_name(self) -> &'static str {
        match self {
            FederatedProvider::Google => "Google",
            FederatedProvider::Github => "GitHub",
        }
    }
}

/// Credential sign-in request
#[derive(Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSignIn {
    pub email: String,
    pub password: String,
    #[serde(rename = "callbackURL")]
    pub callback_url: String,
}

/// Federated sign-in request (shared by sign-in and sign-up)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialSignIn {
    pub provider: FederatedProvider,
    #[serde(rename = "callbackURL")]
    pub callback_url: String,
}

/// Credential sign-up request
#[derive(Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSignUp {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(rename = "callbackURL")]
    pub callback_url: String,
}

impl std::fmt::Debug for EmailSignIn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailSignIn")
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .field("callback_url", &self.callback_url)
            .finish()
    }
}

impl std::fmt::Debug for EmailSignUp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailSignUp")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .field("callback_url", &self.callback_url)
            .finish()
    }
}

/// Successful provider reply
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderReply {
    /// Where the browser should go next (federated consent screen)
    pub redirect_url: Option<String>,
    /// `Set-Cookie` values to relay to the caller
    pub set_cookies: Vec<String>,
}

/// Identity provider failure
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    /// The provider answered and refused the request
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// The provider could not be reached or answered nonsense
    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    /// Provider-chosen client error status, if any
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            ProviderError::Rejected { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(StatusCode::is_client_error),
            ProviderError::Unavailable(_) => None,
        }
    }

    /// Message suitable for showing to the caller unchanged
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Unavailable(err.to_string())
    }
}

/// Operations this crate needs from the identity provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve the session carried by the request headers
    async fn get_session(&self, headers: &HeaderMap) -> Result<Option<Session>, ProviderError>;

    async fn sign_in_email(&self, request: EmailSignIn) -> Result<ProviderReply, ProviderError>;

    async fn sign_in_social(&self, request: SocialSignIn) -> Result<ProviderReply, ProviderError>;

    async fn sign_up_email(&self, request: EmailSignUp) -> Result<ProviderReply, ProviderError>;
}
