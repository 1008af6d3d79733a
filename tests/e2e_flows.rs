//! E2E tests for sign-in, sign-up and federated flows

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{TestServer, cookie_pair, set_cookie};
use portalgate::auth::Role;
use serde_json::{Value, json};

#[tokio::test]
async fn test_sign_up_creates_account_and_sends_welcome() {
    let server = TestServer::new().await;

    let response = server
        .client
        .post(server.url("/sign-up"))
        .json(&json!({
            "name": "Ada <Lovelace>",
            "email": "ada@example.com",
            "password": "analytical"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let session = set_cookie(&response, "session_token").expect("provider cookie relayed");

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "succeeded");
    assert_eq!(body["state"], "succeeded");
    assert_eq!(body["redirect"], "/orgs");
    assert_eq!(
        body["notices"],
        json!([{ "level": "success", "message": "Account created successfully" }])
    );

    let sent = server.transport.wait_for(1).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ada@example.com");
    assert_eq!(sent[0].template, "welcome");
    assert!(sent[0].html.contains("Ada &lt;Lovelace&gt;"));

    // The relayed cookie is a working session.
    let landing = server
        .client
        .get(server.url("/orgs"))
        .header("Cookie", cookie_pair(&session))
        .send()
        .await
        .unwrap();
    assert_eq!(landing.status(), 200);
}

#[tokio::test]
async fn test_sign_up_validation_never_reaches_provider() {
    let server = TestServer::new().await;

    let response = server
        .client
        .post(server.url("/sign-up"))
        .json(&json!({ "name": "", "email": "not-an-email", "password": "1234567" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 422);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "invalid");
    assert_eq!(body["state"], "idle");
    assert_eq!(
        body["errors"],
        json!([
            { "field": "name", "message": "Name should be at least 1 character" },
            { "field": "email", "message": "Invalid email address" },
            { "field": "password", "message": "Password must be at least 8 characters" }
        ])
    );

    assert_eq!(server.provider.sign_up_calls.load(Ordering::SeqCst), 0);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(server.transport.messages().is_empty());
}

#[tokio::test]
async fn test_duplicate_sign_up_shows_provider_message() {
    let server = TestServer::new().await;
    server.sign_in_as(Role::Member);

    let response = server
        .client
        .post(server.url("/sign-up"))
        .json(&json!({
            "name": "Someone",
            "email": "member@example.com",
            "password": "long enough"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 422);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "failed");
    assert_eq!(body["error"], "User already exists");
    assert_eq!(body["notices"][0]["level"], "error");
    assert_eq!(body["notices"][0]["message"], "User already exists");
}

#[tokio::test]
async fn test_sign_in_success() {
    let server = TestServer::new().await;
    server
        .provider
        .add_user("grace@example.com", "compilers", "Grace", Role::Admin);

    let response = server
        .client
        .post(server.url("/sign-in"))
        .json(&json!({ "email": "grace@example.com", "password": "compilers" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert!(set_cookie(&response, "session_token").is_some());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["redirect"], "/orgs");
    assert_eq!(body["notices"][0]["message"], "Logged in successfully");
    assert_eq!(server.provider.sign_in_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_signed_in_submissions_redirect_to_landing() {
    let server = TestServer::new().await;
    let cookie = server.sign_in_as(Role::Member);

    let submissions = [
        ("/sign-in", json!({ "email": "member@example.com", "password": "correct horse" })),
        (
            "/sign-up",
            json!({ "name": "Again", "email": "again@example.com", "password": "analytical" }),
        ),
        ("/sign-in/social", json!({ "provider": "github" })),
    ];

    for (path, body) in submissions {
        let response = server
            .client
            .post(server.url(path))
            .header("cookie", &cookie)
            .json(&body)
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 303, "{path}");
        assert_eq!(response.headers()["location"], "/orgs", "{path}");
    }

    assert_eq!(server.provider.sign_in_calls.load(Ordering::SeqCst), 0);
    assert_eq!(server.provider.sign_up_calls.load(Ordering::SeqCst), 0);
    assert_eq!(server.provider.social_calls.load(Ordering::SeqCst), 0);
    assert!(server.transport.messages().is_empty());
}

#[tokio::test]
async fn test_sign_in_wrong_password_is_verbatim_failure() {
    let server = TestServer::new().await;
    server
        .provider
        .add_user("grace@example.com", "compilers", "Grace", Role::Member);

    let response = server
        .client
        .post(server.url("/sign-in"))
        .json(&json!({ "email": "grace@example.com", "password": "not the one" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    assert!(set_cookie(&response, "session_token").is_none());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["state"], "failed");
    assert_eq!(body["error"], "Invalid email or password");
    assert!(
        body["notices"]
            .as_array()
            .unwrap()
            .iter()
            .all(|notice| notice["level"] != "success")
    );
}

#[tokio::test]
async fn test_sign_in_short_password_is_local_error() {
    let server = TestServer::new().await;

    let response = server
        .client
        .post(server.url("/sign-in"))
        .json(&json!({ "email": "grace@example.com", "password": "1234567" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 422);
    assert_eq!(server.provider.sign_in_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_federated_sign_in_redirects_to_provider() {
    let server = TestServer::new().await;

    let response = server
        .client
        .post(server.url("/sign-in/social"))
        .json(&json!({ "provider": "github" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "redirecting");
    assert_eq!(body["state"], "submitting");
    assert_eq!(
        body["redirect"],
        "https://accounts.example.com/authorize?provider=github"
    );
    assert_eq!(
        body["notices"],
        json!([
            { "level": "loading", "message": "Redirecting to GitHub..." },
            { "level": "success", "message": "Redirecting to GitHub..." }
        ])
    );
}

#[tokio::test]
async fn test_federated_unknown_provider_is_rejected() {
    let server = TestServer::new().await;

    let response = server
        .client
        .post(server.url("/sign-in/social"))
        .json(&json!({ "provider": "myspace" }))
        .send()
        .await
        .unwrap();

    assert!(response.status().is_client_error());
    assert_eq!(server.provider.social_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_federated_double_click_reaches_provider_once() {
    let server = TestServer::new().await;
    server.provider.set_social_delay(Duration::from_millis(300));

    let page = server
        .client
        .get(server.url("/sign-in"))
        .send()
        .await
        .unwrap();
    let client_cookie = cookie_pair(&set_cookie(&page, "portal_client").unwrap());

    let click = || {
        server
            .client
            .post(server.url("/sign-in/social"))
            .header("Cookie", client_cookie.clone())
            .json(&json!({ "provider": "google" }))
            .send()
    };

    let first = click();
    let second = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        click().await
    };
    let (first, second) = tokio::join!(first, second);

    let mut statuses = vec![
        first.unwrap().status().as_u16(),
        second.unwrap().status().as_u16(),
    ];
    statuses.sort();
    assert_eq!(statuses, vec![200, 409]);
    assert_eq!(server.provider.social_calls.load(Ordering::SeqCst), 1);
    assert!(server.state.federated_guard.is_empty());
}

#[tokio::test]
async fn test_federated_clicks_after_resolution_are_accepted() {
    let server = TestServer::new().await;

    for _ in 0..2 {
        let response = server
            .client
            .post(server.url("/sign-in/social"))
            .header("Cookie", "portal_client=01HZZZZZZZZZZZZZZZZZZZZZZZ")
            .json(&json!({ "provider": "google" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    assert_eq!(server.provider.social_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_password_reset_hook_requires_secret() {
    let server = TestServer::new().await;
    let payload = json!({
        "user": { "email": "ada@example.com", "name": "Ada" },
        "url": "https://portal.example.com/reset-password?token=abc"
    });

    let missing = server
        .client
        .post(server.url("/hooks/password-reset"))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 401);

    let wrong = server
        .client
        .post(server.url("/hooks/password-reset"))
        .bearer_auth("not-the-secret")
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), 401);

    assert!(server.transport.messages().is_empty());
}

#[tokio::test]
async fn test_password_reset_hook_sends_email() {
    let server = TestServer::new().await;

    let response = server
        .client
        .post(server.url("/hooks/password-reset"))
        .bearer_auth(common::HOOK_SECRET)
        .json(&json!({
            "user": { "email": "ada@example.com", "name": "Ada" },
            "url": "https://portal.example.com/reset-password?token=abc"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert!(body["messageId"].as_str().unwrap().ends_with("@clientportalhub.app>"));

    let sent = server.transport.messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].template, "password_reset");
    assert!(sent[0].html.contains("token=abc"));
}

#[tokio::test]
async fn test_password_reset_hook_reports_delivery_failure() {
    let server = TestServer::new().await;
    server.transport.fail.store(true, Ordering::SeqCst);

    let response = server
        .client
        .post(server.url("/hooks/password-reset"))
        .bearer_auth(common::HOOK_SECRET)
        .json(&json!({
            "user": { "email": "ada@example.com" },
            "url": "https://portal.example.com/reset-password?token=abc"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 502);
}

#[tokio::test]
async fn test_password_reset_hook_rejects_bad_recipient() {
    let server = TestServer::new().await;

    let response = server
        .client
        .post(server.url("/hooks/password-reset"))
        .bearer_auth(common::HOOK_SECRET)
        .json(&json!({
            "user": { "email": "not an address" },
            "url": "https://portal.example.com/reset-password?token=abc"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    assert!(server.transport.messages().is_empty());
}

#[tokio::test]
async fn test_sign_up_succeeds_when_mail_relay_is_down() {
    let server = TestServer::new().await;
    server.transport.fail.store(true, Ordering::SeqCst);

    let response = server
        .client
        .post(server.url("/sign-up"))
        .json(&json!({
            "name": "Ada",
            "email": "ada@example.com",
            "password": "analytical"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
}
