//! Credential and federated sign-in/sign-up orchestration
//!
//! A `CredentialFlow` is a single-use state machine:
//!
//! ```text
//! Idle ──validate──▶ Submitting ──provider──▶ Succeeded | Failed
//!   ▲       │
//!   └───────┘ invalid input (provider never contacted)
//! ```
//!
//! Every run method takes `self`, so a new submission always starts from a
//! fresh `Idle` machine. Provider phases (`request`, `success`, `error`)
//! surface as `Notice`s on the returned `FlowReport`.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use super::gate::LANDING_ROUTE;
use super::guard::FederatedGuard;
use super::provider::{
    EmailSignIn, EmailSignUp, FederatedProvider, IdentityProvider, ProviderError, ProviderReply,
    SocialSignIn,
};
use super::validation::{
    FederatedSubmission, SignInSubmission, SignUpSubmission, ValidSignUp, ValidationErrors,
};
use crate::mail::Mailer;
use crate::metrics::AUTH_FLOWS_TOTAL;

/// Machine state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

/// Which form drove the flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    SignIn,
    SignUp,
    Federated,
}

impl FlowKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FlowKind::SignIn => "sign_in",
            FlowKind::SignUp => "sign_up",
            FlowKind::Federated => "federated",
        }
    }
}

/// Toast severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Loading,
    Success,
    Error,
}

/// User-facing notification emitted during a flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// How a flow ended
#[derive(Debug, Clone, PartialEq)]
pub enum FlowOutcome {
    /// Rejected locally; the provider was not contacted
    Invalid(ValidationErrors),
    /// The browser is being sent to the provider's consent screen
    Pending { location: Option<String> },
    Success { redirect_to: String },
    Failure {
        message: String,
        status: StatusCode,
    },
    /// Another attempt on the same control is still in flight
    Ignored,
}

impl FlowOutcome {
    fn label(&self) -> &'static str {
        match self {
            FlowOutcome::Invalid(_) => "invalid",
            FlowOutcome::Pending { .. } => "redirecting",
            FlowOutcome::Success { .. } => "succeeded",
            FlowOutcome::Failure { .. } => "failed",
            FlowOutcome::Ignored => "ignored",
        }
    }
}

/// Result of one flow run
#[derive(Debug, Clone)]
pub struct FlowReport {
    pub kind: FlowKind,
    pub state: FlowState,
    pub outcome: FlowOutcome,
    pub notices: Vec<Notice>,
    /// Provider `Set-Cookie` values to relay to the browser
    pub set_cookies: Vec<String>,
}

impl FlowReport {
    pub fn has_notice(&self, level: NoticeLevel) -> bool {
        self.notices.iter().any(|notice| notice.level == level)
    }
}

/// Sign-in/sign-up state machine
pub struct CredentialFlow<'a> {
    provider: &'a dyn IdentityProvider,
    mailer: Option<&'a Mailer>,
    state: FlowState,
    notices: Vec<Notice>,
}

impl<'a> CredentialFlow<'a> {
    pub fn new(provider: &'a dyn IdentityProvider) -> Self {
        Self {
            provider,
            mailer: None,
            state: FlowState::Idle,
            notices: Vec::new(),
        }
    }

    /// Send lifecycle email (welcome on sign-up) through `mailer`
    pub fn with_mailer(mut self, mailer: &'a Mailer) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    /// Email/password sign-in
    pub async fn sign_in(mut self, submission: SignInSubmission) -> FlowReport {
        let valid = match submission.validate() {
            Ok(valid) => valid,
            Err(errors) => return self.reject(FlowKind::SignIn, errors),
        };

        self.transition(FlowState::Submitting);
        let result = self
            .provider
            .sign_in_email(EmailSignIn {
                email: valid.email,
                password: valid.password,
                callback_url: LANDING_ROUTE.to_string(),
            })
            .await;

        self.settle(FlowKind::SignIn, result, "Logged in successfully")
    }

    /// Email/password sign-up
    ///
    /// On success a welcome email is handed to the mailer without waiting
    /// for delivery.
    pub async fn sign_up(mut self, submission: SignUpSubmission) -> FlowReport {
        let valid = match submission.validate() {
            Ok(valid) => valid,
            Err(errors) => return self.reject(FlowKind::SignUp, errors),
        };

        self.transition(FlowState::Submitting);
        let ValidSignUp {
            name,
            email,
            password,
        } = valid;
        let result = self
            .provider
            .sign_up_email(EmailSignUp {
                name: name.clone(),
                email: email.clone(),
                password,
                callback_url: LANDING_ROUTE.to_string(),
            })
            .await;

        let report = self.settle(FlowKind::SignUp, result, "Account created successfully");
        if report.state == FlowState::Succeeded {
            if let Some(mailer) = self.mailer {
                let _ = mailer.dispatch(mailer.welcome(&email, &name));
            }
        }
        report
    }

    /// Federated sign-in (also used for sign-up)
    ///
    /// `control` identifies the browser the request came from. While an
    /// attempt for the same control and provider is in flight, further
    /// attempts end as `FlowOutcome::Ignored` without calling the provider.
    ///
    /// On success the state stays `Submitting`: completion is only visible
    /// later, as a fresh session when the browser returns.
    pub async fn federated(
        mut self,
        submission: FederatedSubmission,
        guard: &FederatedGuard,
        control: &str,
    ) -> FlowReport {
        let provider = submission.provider;
        let key = FederatedGuard::control_key(control, provider);
        let Some(_in_flight) = guard.try_acquire(key) else {
            tracing::debug!(provider = provider.id(), "Federated attempt already in flight");
            return self.finish(FlowKind::Federated, FlowOutcome::Ignored, Vec::new());
        };

        self.notify(NoticeLevel::Loading, redirecting_message(provider));
        self.transition(FlowState::Submitting);

        let result = self
            .provider
            .sign_in_social(SocialSignIn {
                provider,
                callback_url: LANDING_ROUTE.to_string(),
            })
            .await;

        match result {
            Ok(reply) => {
                self.notify(NoticeLevel::Success, redirecting_message(provider));
                self.finish(
                    FlowKind::Federated,
                    FlowOutcome::Pending {
                        location: reply.redirect_url,
                    },
                    reply.set_cookies,
                )
            }
            Err(error) => {
                tracing::warn!(provider = provider.id(), %error, "Federated redirect failed");
                let message = format!("Failed to redirect to {}", provider.display_name());
                self.transition(FlowState::Failed);
                self.notify(NoticeLevel::Error, message.clone());
                self.finish(
                    FlowKind::Federated,
                    FlowOutcome::Failure {
                        message,
                        status: StatusCode::BAD_GATEWAY,
                    },
                    Vec::new(),
                )
            }
        }
    }

    fn reject(self, kind: FlowKind, errors: ValidationErrors) -> FlowReport {
        tracing::debug!(flow = kind.as_str(), errors = %errors, "Submission failed validation");
        self.finish(kind, FlowOutcome::Invalid(errors), Vec::new())
    }

    fn settle(
        &mut self,
        kind: FlowKind,
        result: Result<ProviderReply, ProviderError>,
        success_message: &str,
    ) -> FlowReport {
        match result {
            Ok(reply) => {
                self.transition(FlowState::Succeeded);
                self.notify(NoticeLevel::Success, success_message);
                self.report(
                    kind,
                    FlowOutcome::Success {
                        redirect_to: LANDING_ROUTE.to_string(),
                    },
                    reply.set_cookies,
                )
            }
            Err(error) => {
                self.transition(FlowState::Failed);
                let message = error.message();
                self.notify(NoticeLevel::Error, message.clone());
                self.report(
                    kind,
                    FlowOutcome::Failure {
                        message,
                        status: error.status_code().unwrap_or(StatusCode::BAD_GATEWAY),
                    },
                    Vec::new(),
                )
            }
        }
    }

    fn transition(&mut self, next: FlowState) {
        debug_assert!(
            matches!(
                (self.state, next),
                (FlowState::Idle, FlowState::Submitting)
                    | (FlowState::Submitting, FlowState::Succeeded)
                    | (FlowState::Submitting, FlowState::Failed)
            ),
            "illegal flow transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::trace!(from = ?self.state, to = ?next, "Flow transition");
        self.state = next;
    }

    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notices.push(Notice {
            level,
            message: message.into(),
        });
    }

    fn report(
        &mut self,
        kind: FlowKind,
        outcome: FlowOutcome,
        set_cookies: Vec<String>,
    ) -> FlowReport {
        AUTH_FLOWS_TOTAL
            .with_label_values(&[kind.as_str(), outcome.label()])
            .inc();
        tracing::info!(
            flow = kind.as_str(),
            outcome = outcome.label(),
            state = ?self.state,
            "Auth flow finished"
        );

        FlowReport {
            kind,
            state: self.state,
            outcome,
            notices: std::mem::take(&mut self.notices),
            set_cookies,
        }
    }

    fn finish(mut self, kind: FlowKind, outcome: FlowOutcome, set_cookies: Vec<String>) -> FlowReport {
        self.report(kind, outcome, set_cookies)
    }
}

fn redirecting_message(provider: FederatedProvider) -> String {
    format!("Redirecting to {}...", provider.display_name())
}

/// Wire shape of a report
#[derive(Serialize)]
struct ReportBody<'a> {
    status: &'static str,
    state: FlowState,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a ValidationErrors>,
    notices: &'a [Notice],
}

impl IntoResponse for FlowReport {
    fn into_response(self) -> Response {
        let (status, redirect, error, errors) = match &self.outcome {
            FlowOutcome::Invalid(errors) => {
                (StatusCode::UNPROCESSABLE_ENTITY, None, None, Some(errors))
            }
            FlowOutcome::Pending { location } => (StatusCode::OK, location.as_deref(), None, None),
            FlowOutcome::Success { redirect_to } => {
                (StatusCode::OK, Some(redirect_to.as_str()), None, None)
            }
            FlowOutcome::Failure { message, status } => {
                (*status, None, Some(message.as_str()), None)
            }
            FlowOutcome::Ignored => (StatusCode::CONFLICT, None, None, None),
        };

        let body = ReportBody {
            status: self.outcome.label(),
            state: self.state,
            redirect,
            error,
            errors,
            notices: &self.notices,
        };
        let mut response = (status, Json(body)).into_response();

        for cookie in &self.set_cookies {
            match HeaderValue::from_str(cookie) {
                Ok(value) => {
                    response.headers_mut().append(header::SET_COOKIE, value);
                }
                Err(error) => {
                    tracing::warn!(%error, "Dropping malformed provider cookie");
                }
            }
        }

        response
    }
}
