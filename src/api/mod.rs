//! API layer
//!
//! HTTP handlers for:
//! - Signed-in landing
//! - Admin API
//! - Provider hooks
//! - Metrics (Prometheus)

mod admin;
mod hooks;
pub mod metrics;
mod orgs;

pub use admin::admin_router;
pub use hooks::{HookCaller, hooks_router};
pub use metrics::metrics_router;
pub use orgs::orgs_router;
