//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Session Metrics
    pub static ref SESSION_LOOKUPS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("portalgate_session_lookups_total", "Identity provider session lookups"),
        &["result"]
    ).expect("metric can be created");

    // Gate Metrics
    pub static ref GATE_DECISIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("portalgate_gate_decisions_total", "Auth gate decisions"),
        &["gate", "decision"]
    ).expect("metric can be created");

    // Flow Metrics
    pub static ref AUTH_FLOWS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("portalgate_auth_flows_total", "Sign-in and sign-up flow outcomes"),
        &["flow", "outcome"]
    ).expect("metric can be created");

    // Email Metrics
    pub static ref EMAILS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("portalgate_emails_total", "Transactional emails by delivery status"),
        &["template", "status"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("portalgate_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(SESSION_LOOKUPS_TOTAL.clone()))
        .expect("SESSION_LOOKUPS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(GATE_DECISIONS_TOTAL.clone()))
        .expect("GATE_DECISIONS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(AUTH_FLOWS_TOTAL.clone()))
        .expect("AUTH_FLOWS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(EMAILS_TOTAL.clone()))
        .expect("EMAILS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}
