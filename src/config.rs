//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::net::IpAddr;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Deployment environment (selects the SMTP submission port)
    #[serde(default)]
    pub environment: Environment,
    pub server: ServerConfig,
    pub identity: IdentityConfig,
    pub email: EmailConfig,
    #[serde(default)]
    pub hooks: HooksConfig,
    pub logging: LoggingConfig,
}

/// Deployment environment
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Public domain (e.g., "portal.example.com")
    pub domain: String,
    /// Protocol ("http" or "https")
    pub protocol: String,
}

impl ServerConfig {
    /// Get the base URL for the portal
    ///
    /// # Returns
    /// Full URL like "https://portal.example.com"
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }
}

/// Identity provider connection
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// Base URL of the identity provider (e.g., "https://auth.example.com")
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

/// SMTP submission settings
///
/// Port is not configured here: it follows `AppConfig::environment`.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// SMTP relay host
    pub host: String,
    /// SMTP username
    pub username: String,
    /// SMTP password
    pub password: String,
    /// Sender mailbox used for every outgoing message
    pub from: String,
}

impl EmailConfig {
    /// SMTP port for the given environment
    ///
    /// Production submits over implicit TLS (465); everything else uses
    /// the STARTTLS submission port (587).
    pub fn port_for(environment: Environment) -> u16 {
        if environment.is_production() { 465 } else { 587 }
    }
}

/// Shared secret for provider-invoked hooks
#[derive(Debug, Clone, Deserialize, Default)]
pub struct HooksConfig {
    /// Bearer secret (32+ bytes). Hooks are disabled when unset.
    pub secret: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (PORTALGATE_*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("environment", "development")?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.domain", "localhost")?
            .set_default("server.protocol", "http")?
            .set_default("identity.timeout_seconds", 10)?
            .set_default("email.host", "smtp.sendgrid.net")?
            .set_default("email.from", "Client Portal Hub <no-reply@clientportalhub.app>")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("PORTALGATE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn smtp_port(&self) -> u16 {
        EmailConfig::port_for(self.environment)
    }

    pub fn should_use_secure_cookies(&self) -> bool {
        self.server.protocol.eq_ignore_ascii_case("https")
            || !is_local_server_domain(&self.server.domain)
    }

    pub(crate) fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_HOOK_SECRET_BYTES: usize = 32;

        url::Url::parse(&self.identity.base_url).map_err(|e| {
            crate::error::AppError::Config(format!("identity.base_url is not a valid URL: {e}"))
        })?;

        self.email
            .from
            .parse::<lettre::message::Mailbox>()
            .map_err(|e| {
                crate::error::AppError::Config(format!("email.from is not a valid mailbox: {e}"))
            })?;

        if let Some(secret) = &self.hooks.secret {
            if secret.as_bytes().len() < MIN_HOOK_SECRET_BYTES {
                return Err(crate::error::AppError::Config(format!(
                    "hooks.secret must be at least {} bytes",
                    MIN_HOOK_SECRET_BYTES
                )));
            }
        }

        if !self.should_use_secure_cookies() {
            let host = normalized_server_host(&self.server.domain);
            tracing::warn!(
                host = %host,
                protocol = %self.server.protocol,
                "Using insecure cookies for local development"
            );
        } else if !self.server.protocol.eq_ignore_ascii_case("https") {
            return Err(crate::error::AppError::Config(
                "server.protocol must be https for non-local server domains".to_string(),
            ));
        }

        Ok(())
    }
}

fn normalized_server_host(domain: &str) -> String {
    let trimmed = domain.trim();
    let parsed_host = url::Url::parse(&format!("http://{trimmed}"))
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()));
    let host = parsed_host.unwrap_or_else(|| trimmed.to_string());
    host.trim_end_matches('.').to_ascii_lowercase()
}

fn is_local_server_domain(domain: &str) -> bool {
    let host = normalized_server_host(domain);
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.is_loopback() || ip.is_unspecified();
    }

    false
}
