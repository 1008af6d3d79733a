//! Session data
//!
//! Sessions are issued and invalidated by the identity provider.
//! This crate only reads them, and only for the lifetime of one request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Portal-wide role carried on the user record
///
/// Issued by the identity provider and compared by strict equality.
/// Roles this portal does not know still authenticate but grant nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Role {
    #[serde(rename = "ADMIN", alias = "admin")]
    Admin,
    #[default]
    #[serde(rename = "MEMBER", alias = "member", alias = "USER", alias = "user")]
    Member,
    #[serde(rename = "OTHER")]
    #[serde(other)]
    Other,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Member => "MEMBER",
            Role::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authenticated user as reported by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: Role,
}

/// User session data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: User,
    /// When the provider will stop honouring this session
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Check if session is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}
