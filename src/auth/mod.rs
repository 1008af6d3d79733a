//! Identity boundary
//!
//! Handles:
//! - Per-request session resolution against the identity provider
//! - Authentication and role gates
//! - Sign-in, sign-up and federated flows

mod context;
mod flow;
mod gate;
mod guard;
mod http_provider;
mod provider;
mod routes;
pub mod session;
pub mod validation;

pub use context::SessionContext;
pub use flow::{CredentialFlow, FlowKind, FlowOutcome, FlowReport, FlowState, Notice, NoticeLevel};
pub use gate::{
    Authenticated, AuthzDecision, LANDING_ROUTE, SIGN_IN_ROUTE, check_authenticated,
    redirect_if_authenticated, require_authenticated, require_role,
};
pub use guard::{FederatedGuard, InFlight};
pub use http_provider::HttpIdentityProvider;
pub use provider::{
    EmailSignIn, EmailSignUp, FederatedProvider, IdentityProvider, ProviderError, ProviderReply,
    SocialSignIn,
};
#[cfg(test)]
pub(crate) use provider::MockIdentityProvider;
pub use routes::{CLIENT_COOKIE, auth_router};
pub use session::{Role, Session, User};
