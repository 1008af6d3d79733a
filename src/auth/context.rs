//! Per-request session cache
//!
//! One `SessionContext` is created per inbound request and stored in the
//! request extensions. Every gate and handler in that request shares it,
//! so the provider is asked about the caller at most once.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use tokio::sync::OnceCell;
use ulid::Ulid;

use super::provider::IdentityProvider;
use super::session::Session;
use crate::AppState;
use crate::error::AppError;

/// Request-scoped view of the caller's identity
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    request_id: Ulid,
    provider: Arc<dyn IdentityProvider>,
    headers: HeaderMap,
    session: OnceCell<Option<Session>>,
}

impl SessionContext {
    pub fn new(provider: Arc<dyn IdentityProvider>, headers: HeaderMap) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                request_id: Ulid::new(),
                provider,
                headers,
                session: OnceCell::new(),
            }),
        }
    }

    pub fn request_id(&self) -> Ulid {
        self.inner.request_id
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.inner.headers
    }

    /// Resolve the caller's session
    ///
    /// The first successful lookup is memoized for the rest of the request;
    /// concurrent callers wait for it instead of issuing their own. A failed
    /// lookup is returned to the caller and not cached.
    pub async fn get_session(&self) -> Result<Option<Session>, AppError> {
        let session = self
            .inner
            .session
            .get_or_try_init(|| self.resolve())
            .await?;
        Ok(session.clone())
    }

    async fn resolve(&self) -> Result<Option<Session>, AppError> {
        use crate::metrics::SESSION_LOOKUPS_TOTAL;

        let result = self.inner.provider.get_session(&self.inner.headers).await;
        let session = match result {
            Ok(Some(session)) if session.is_expired() => {
                tracing::debug!(
                    request_id = %self.inner.request_id,
                    user_id = %session.user.id,
                    "Provider returned an expired session"
                );
                SESSION_LOOKUPS_TOTAL.with_label_values(&["expired"]).inc();
                None
            }
            Ok(Some(session)) => {
                SESSION_LOOKUPS_TOTAL.with_label_values(&["found"]).inc();
                Some(session)
            }
            Ok(None) => {
                SESSION_LOOKUPS_TOTAL.with_label_values(&["none"]).inc();
                None
            }
            Err(error) => {
                SESSION_LOOKUPS_TOTAL.with_label_values(&["error"]).inc();
                tracing::warn!(
                    request_id = %self.inner.request_id,
                    %error,
                    "Session lookup failed"
                );
                return Err(error.into());
            }
        };

        Ok(session)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionContext
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(context) = parts.extensions.get::<SessionContext>() {
            return Ok(context.clone());
        }

        let app_state = AppState::from_ref(state);
        let context = SessionContext::new(app_state.identity.clone(), parts.headers.clone());
        parts.extensions.insert(context.clone());

        Ok(context)
    }
}
