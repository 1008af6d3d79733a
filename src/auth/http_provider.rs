//! HTTP identity provider client
//!
//! Talks to the provider's JSON API. Caller cookies are forwarded on
//! session lookups and the provider's `Set-Cookie` headers are handed back
//! so the portal can relay them to the browser.

use std::time::Duration;

use axum::async_trait;
use chrono::{DateTime, Utc};
use http::{HeaderMap, StatusCode, header};
use serde::{Deserialize, Serialize};

use super::provider::{
    EmailSignIn, EmailSignUp, IdentityProvider, ProviderError, ProviderReply, SocialSignIn,
};
use super::session::{Session, User};
use crate::config::IdentityConfig;
use crate::error::AppError;

const GET_SESSION_PATH: &str = "api/auth/get-session";
const SIGN_IN_EMAIL_PATH: &str = "api/auth/sign-in/email";
const SIGN_IN_SOCIAL_PATH: &str = "api/auth/sign-in/social";
const SIGN_UP_EMAIL_PATH: &str = "api/auth/sign-up/email";

/// Provider client backed by `reqwest`
#[derive(Clone)]
pub struct HttpIdentityProvider {
    client: reqwest::Client,
    base_url: url::Url,
}

/// `get-session` reply body (the provider answers `null` when signed out)
#[derive(Debug, Deserialize)]
struct SessionEnvelope {
    session: SessionRecord,
    user: User,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionRecord {
    expires_at: DateTime<Utc>,
}

/// Error body shapes the provider is known to produce
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Flat { message: String },
    Nested { error: NestedError },
}

#[derive(Debug, Deserialize)]
struct NestedError {
    message: String,
}

impl HttpIdentityProvider {
    /// Create a provider client
    ///
    /// # Errors
    /// Returns error if the base URL is invalid or the HTTP client cannot be built
    pub fn new(config: &IdentityConfig) -> Result<Self, AppError> {
        let mut base_url = url::Url::parse(&config.base_url)
            .map_err(|e| AppError::Config(format!("identity.base_url: {e}")))?;
        // Relative joins below need a trailing slash to keep any path prefix.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .user_agent("Portalgate/0.1.0")
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<url::Url, ProviderError> {
        self.base_url
            .join(path)
            .map_err(|e| ProviderError::Unavailable(format!("invalid provider URL: {e}")))
    }

    async fn post_json<T: Serialize + Sync>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<ProviderReply, ProviderError> {
        let url = self.endpoint(path)?;
        let response = self.client.post(url).json(body).send().await?;

        let status = response.status();
        let set_cookies = collect_set_cookies(response.headers());
        let bytes = response.bytes().await?;

        if !status.is_success() {
            tracing::debug!(path, status = %status, "Identity provider rejected request");
            return Err(rejection(status, &bytes));
        }

        Ok(ProviderReply {
            redirect_url: redirect_url(&bytes),
            set_cookies,
        })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn get_session(&self, headers: &HeaderMap) -> Result<Option<Session>, ProviderError> {
        let url = self.endpoint(GET_SESSION_PATH)?;
        let mut request = self.client.get(url);
        for name in [header::COOKIE, header::AUTHORIZATION] {
            for value in headers.get_all(&name) {
                request = request.header(name.clone(), value.clone());
            }
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }

        let bytes = response.bytes().await?;
        if !status.is_success() {
            return Err(rejection(status, &bytes));
        }

        parse_session(&bytes)
    }

    async fn sign_in_email(&self, request: EmailSignIn) -> Result<ProviderReply, ProviderError> {
        self.post_json(SIGN_IN_EMAIL_PATH, &request).await
    }

    async fn sign_in_social(&self, request: SocialSignIn) -> Result<ProviderReply, ProviderError> {
        self.post_json(SIGN_IN_SOCIAL_PATH, &request).await
    }

    async fn sign_up_email(&self, request: EmailSignUp) -> Result<ProviderReply, ProviderError> {
        self.post_json(SIGN_UP_EMAIL_PATH, &request).await
    }
}

fn collect_set_cookies(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok().map(ToOwned::to_owned))
        .collect()
}

fn parse_session(bytes: &[u8]) -> Result<Option<Session>, ProviderError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let envelope: Option<SessionEnvelope> = serde_json::from_slice(bytes)
        .map_err(|e| ProviderError::Unavailable(format!("malformed session payload: {e}")))?;

    Ok(envelope.map(|envelope| Session {
        user: envelope.user,
        expires_at: envelope.session.expires_at,
    }))
}

fn redirect_url(bytes: &[u8]) -> Option<String> {
    serde_json::from_slice::<serde_json::Value>(bytes)
        .ok()?
        .get("url")?
        .as_str()
        .map(ToOwned::to_owned)
}

fn rejection(status: StatusCode, bytes: &[u8]) -> ProviderError {
    let message = match serde_json::from_slice::<ErrorBody>(bytes) {
        Ok(ErrorBody::Flat { message }) => message,
        Ok(ErrorBody::Nested { error }) => error.message,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("Identity provider error")
            .to_string(),
    };

    if status.is_client_error() {
        ProviderError::Rejected {
            status: status.as_u16(),
            message,
        }
    } else {
        ProviderError::Unavailable(message)
    }
}
