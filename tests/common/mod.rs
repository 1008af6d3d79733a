//! Common test utilities for E2E tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::async_trait;
use axum::http::{HeaderMap, header};
use chrono::Utc;
use lettre::message::Mailbox;
use portalgate::auth::{
    EmailSignIn, EmailSignUp, IdentityProvider, ProviderError, ProviderReply, Role, Session,
    SocialSignIn, User,
};
use portalgate::mail::{DeliveryReceipt, EmailMessage, MailError, MailTransport, Mailer};
use portalgate::{AppState, config};
use tokio::net::TcpListener;

pub const HOOK_SECRET: &str = "test-hook-secret-that-is-32-bytes!!";
pub const SESSION_COOKIE: &str = "session_token";

/// In-memory identity provider
#[derive(Default)]
pub struct FakeIdentityProvider {
    accounts: Mutex<HashMap<String, (String, User)>>,
    sessions: Mutex<HashMap<String, Session>>,
    pub session_calls: AtomicUsize,
    pub sign_in_calls: AtomicUsize,
    pub sign_up_calls: AtomicUsize,
    pub social_calls: AtomicUsize,
    /// Fail every session lookup as if the provider were down
    pub unavailable: AtomicBool,
    /// Delay applied to federated sign-in
    social_delay: Mutex<Duration>,
}

impl FakeIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_social_delay(&self, delay: Duration) {
        *self.social_delay.lock().unwrap() = delay;
    }

    /// Register an account and return a live session token for it
    pub fn add_user(&self, email: &str, password: &str, name: &str, role: Role) -> String {
        let user = User {
            id: format!("u_{}", ulid::Ulid::new()),
            email: email.to_string(),
            name: name.to_string(),
            role,
        };
        self.accounts
            .lock()
            .unwrap()
            .insert(email.to_string(), (password.to_string(), user.clone()));
        self.issue_session(user)
    }

    fn issue_session(&self, user: User) -> String {
        let token = ulid::Ulid::new().to_string();
        self.sessions.lock().unwrap().insert(
            token.clone(),
            Session {
                user,
                expires_at: Utc::now() + chrono::Duration::days(7),
            },
        );
        token
    }

    fn session_cookie(token: &str) -> String {
        format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly")
    }
}

fn token_from(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::COOKIE)
        .and_then(|h| h.to_str().ok())?
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn get_session(&self, headers: &HeaderMap) -> Result<Option<Session>, ProviderError> {
        self.session_calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("connection refused".to_string()));
        }

        Ok(token_from(headers).and_then(|token| self.sessions.lock().unwrap().get(&token).cloned()))
    }

    async fn sign_in_email(&self, request: EmailSignIn) -> Result<ProviderReply, ProviderError> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);

        let user = {
            let accounts = self.accounts.lock().unwrap();
            match accounts.get(&request.email) {
                Some((password, user)) if *password == request.password => user.clone(),
                _ => {
                    return Err(ProviderError::Rejected {
                        status: 401,
                        message: "Invalid email or password".to_string(),
                    });
                }
            }
        };

        let token = self.issue_session(user);
        Ok(ProviderReply {
            redirect_url: None,
            set_cookies: vec![Self::session_cookie(&token)],
        })
    }

    async fn sign_in_social(&self, request: SocialSignIn) -> Result<ProviderReply, ProviderError> {
        self.social_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.social_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        Ok(ProviderReply {
            redirect_url: Some(format!(
                "https://accounts.example.com/authorize?provider={}",
                request.provider.id()
            )),
            set_cookies: Vec::new(),
        })
    }

    async fn sign_up_email(&self, request: EmailSignUp) -> Result<ProviderReply, ProviderError> {
        self.sign_up_calls.fetch_add(1, Ordering::SeqCst);

        if self.accounts.lock().unwrap().contains_key(&request.email) {
            return Err(ProviderError::Rejected {
                status: 422,
                message: "User already exists".to_string(),
            });
        }

        let token = self.add_user(&request.email, &request.password, &request.name, Role::Member);
        Ok(ProviderReply {
            redirect_url: None,
            set_cookies: vec![Self::session_cookie(&token)],
        })
    }
}

/// Mail transport that keeps every message
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<EmailMessage>>,
    pub fail: AtomicBool,
}

impl RecordingTransport {
    pub fn messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Wait until at least `count` messages were delivered
    pub async fn wait_for(&self, count: usize) -> Vec<EmailMessage> {
        for _ in 0..50 {
            let messages = self.messages();
            if messages.len() >= count {
                return messages;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.messages()
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn deliver(
        &self,
        _from: &Mailbox,
        message: &EmailMessage,
    ) -> Result<DeliveryReceipt, MailError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(MailError::Delivery("relay unreachable".to_string()));
        }

        self.sent.lock().unwrap().push(message.clone());
        Ok(DeliveryReceipt::accepted(
            format!("<{}@clientportalhub.app>", ulid::Ulid::new()),
            "250 OK",
        ))
    }
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub provider: Arc<FakeIdentityProvider>,
    pub transport: Arc<RecordingTransport>,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        let config = test_config();
        let provider = Arc::new(FakeIdentityProvider::new());
        let transport = Arc::new(RecordingTransport::default());

        let mailer = Mailer::new(
            transport.clone(),
            config.email.from.parse().unwrap(),
            config.server.base_url(),
        );
        let state = AppState::with_components(config, provider.clone(), mailer);

        // Redirects are asserted on, never followed
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = portalgate::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            provider,
            transport,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Register a user and return a `Cookie` header value for their session
    pub fn sign_in_as(&self, role: Role) -> String {
        let email = format!("{}@example.com", role.as_str().to_ascii_lowercase());
        let token = self.provider.add_user(&email, "correct horse", "Test User", role);
        format!("{SESSION_COOKIE}={token}")
    }

    pub fn session_calls(&self) -> usize {
        self.provider.session_calls.load(Ordering::SeqCst)
    }
}

pub fn test_config() -> config::AppConfig {
    config::AppConfig {
        environment: config::Environment::Test,
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Let OS assign port
            domain: "localhost".to_string(),
            protocol: "http".to_string(),
        },
        identity: config::IdentityConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_seconds: 5,
        },
        email: config::EmailConfig {
            host: "smtp.example.com".to_string(),
            username: "apikey".to_string(),
            password: "test-password".to_string(),
            from: "Client Portal Hub <no-reply@clientportalhub.app>".to_string(),
        },
        hooks: config::HooksConfig {
            secret: Some(HOOK_SECRET.to_string()),
        },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

/// First `Set-Cookie` value whose name is `name`
pub fn set_cookie(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(&format!("{name}=")))
        .map(str::to_string)
}

/// `name=value` part of a `Set-Cookie` header
pub fn cookie_pair(set_cookie: &str) -> String {
    set_cookie.split(';').next().unwrap_or_default().to_string()
}
