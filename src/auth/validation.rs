//! Credential submissions and their local validation
//!
//! Submissions are checked here before anything is sent to the identity
//! provider. Errors are reported per field, in form order.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::provider::FederatedProvider;

/// Minimum password length, in characters
pub const MIN_PASSWORD_LENGTH: usize = 8;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(
        r"^[A-Za-z0-9_'+\-]+(?:\.[A-Za-z0-9_'+\-]+)*@(?:[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?\.)+[A-Za-z]{2,}$"
    )
    .expect("email pattern compiles");
}

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// All validation failures of one submission
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// First message reported for `field`
    pub fn for_field(&self, field: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|error| error.field == field)
            .map(|error| error.message.as_str())
    }

    fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for error in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", error.field, error.message)?;
            first = false;
        }
        Ok(())
    }
}

/// Email/password sign-in form
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignInSubmission {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Name/email/password sign-up form
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignUpSubmission {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Federated sign-in/sign-up button
#[derive(Debug, Clone, Deserialize)]
pub struct FederatedSubmission {
    pub provider: FederatedProvider,
}

/// Sign-in input that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSignIn {
    pub email: String,
    pub password: String,
}

/// Sign-up input that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSignUp {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl SignInSubmission {
    pub fn validate(self) -> Result<ValidSignIn, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let email = check_email(&mut errors, self.email);
        let password = check_password(&mut errors, self.password);
        errors.into_result(ValidSignIn { email, password })
    }
}

impl SignUpSubmission {
    pub fn validate(self) -> Result<ValidSignUp, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let name = check_name(&mut errors, self.name);
        let email = check_email(&mut errors, self.email);
        let password = check_password(&mut errors, self.password);
        errors.into_result(ValidSignUp {
            name,
            email,
            password,
        })
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

fn check_name(errors: &mut ValidationErrors, name: Option<String>) -> String {
    match name {
        None => {
            errors.push("name", "Name is required");
            String::new()
        }
        Some(name) if name.is_empty() => {
            errors.push("name", "Name should be at least 1 character");
            name
        }
        Some(name) => name,
    }
}

fn check_email(errors: &mut ValidationErrors, email: Option<String>) -> String {
    let email = email.unwrap_or_default();
    if !is_valid_email(&email) {
        errors.push("email", "Invalid email address");
    }
    email
}

fn check_password(errors: &mut ValidationErrors, password: Option<String>) -> String {
    match password {
        None => {
            errors.push("password", "Password is required");
            String::new()
        }
        Some(password) if password.chars().count() < MIN_PASSWORD_LENGTH => {
            errors.push("password", "Password must be at least 8 characters");
            password
        }
        Some(password) => password,
    }
}
