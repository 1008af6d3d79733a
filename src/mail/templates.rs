//! Email bodies
//!
//! Names and URLs come from users or the identity provider and are escaped
//! before they are placed in HTML.

use html_escape::{encode_double_quoted_attribute, encode_text};

use super::EmailMessage;

/// Subject and bodies of one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub subject: String,
    pub html: String,
    pub text: String,
}

impl Rendered {
    pub fn into_message(self, template: &'static str, to: &str) -> EmailMessage {
        EmailMessage {
            template,
            to: to.to_string(),
            subject: self.subject,
            html: self.html,
            text: Some(self.text),
        }
    }
}

pub fn welcome(name: &str, portal_url: &str) -> Rendered {
    let greeting = greeting(name);
    let html = layout(&format!(
        r#"<p>{greeting}</p>
<p>Your Client Portal Hub account is ready.</p>
<p><a href="{href}">Open your portal</a></p>"#,
        greeting = encode_text(&greeting),
        href = encode_double_quoted_attribute(portal_url),
    ));
    let text = format!(
        "{greeting}\n\nYour Client Portal Hub account is ready.\n\nOpen your portal: {portal_url}\n"
    );

    Rendered {
        subject: "Welcome to Client Portal Hub".to_string(),
        html,
        text,
    }
}

pub fn password_reset(name: &str, reset_url: &str) -> Rendered {
    let greeting = greeting(name);
    let html = layout(&format!(
        r#"<p>{greeting}</p>
<p>We received a request to reset your password.</p>
<p><a href="{href}">Reset your password</a></p>
<p>If you did not ask for this, you can ignore this email.</p>"#,
        greeting = encode_text(&greeting),
        href = encode_double_quoted_attribute(reset_url),
    ));
    let text = format!(
        "{greeting}\n\nWe received a request to reset your password.\n\nReset it here: {reset_url}\n\nIf you did not ask for this, you can ignore this email.\n"
    );

    Rendered {
        subject: "Reset your Client Portal Hub password".to_string(),
        html,
        text,
    }
}

fn greeting(name: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        "Hi,".to_string()
    } else {
        format!("Hi {name},")
    }
}

fn layout(body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: sans-serif; line-height: 1.5;">
{body}
<p style="color: #888;">Client Portal Hub</p>
</body>
</html>"#
    )
}
