mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use membership_api::services::auth::Role;

use common::*;

fn generate_req(uri: &str, username: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::HOST, "members.example.com")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("username={}", username.replace('@', "%40"))))
        .unwrap()
}

fn login_req(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("token={token}")))
        .unwrap()
}

fn token_of(mail: &SentMail) -> String {
    link_in(mail)
        .query_pairs()
        .find(|(k, _)| k == "token")
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}

#[tokio::test]
async fn callback_link_drops_request_query_and_carries_one_token() -> Result<()> {
    let mailer = Arc::new(RecordingMailer::default());
    let app = TestApp::new(mailer.clone());
    app.directory.add_user("alice@example.com", &[Role::User], true);

    let res = send(&app.router(), generate_req("/ott/generate?foo=bar", "alice@example.com")).await;

    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(res.headers()[header::LOCATION], "/ott/sent");

    let sent = mailer.wait_for(1).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, "alice@example.com");

    let link = link_in(&sent[0]);
    assert_eq!(link.scheme(), "http");
    assert_eq!(link.host_str(), Some("members.example.com"));
    assert_eq!(link.path(), "/login/ott");
    assert!(!link.as_str().contains("foo"));
    assert_eq!(link.query_pairs().count(), 1);
    assert_eq!(link.query_pairs().filter(|(k, _)| k == "token").count(), 1);
    Ok(())
}

#[tokio::test]
async fn failing_delivery_does_not_change_the_redirect() -> Result<()> {
    let ok_app = TestApp::new(Arc::new(RecordingMailer::default()));
    let failing_app = TestApp::new(Arc::new(FailingMailer));
    let panicking_app = TestApp::new(Arc::new(PanickingMailer));

    let mut outcomes = Vec::new();
    for app in [&ok_app, &failing_app, &panicking_app] {
        app.directory.add_user("alice@example.com", &[Role::User], true);
        let res = send(&app.router(), generate_req("/ott/generate", "alice@example.com")).await;
        outcomes.push((res.status(), res.headers()[header::LOCATION].clone()));
    }

    // Let the background deliveries run (and fail) before the runtime goes away.
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(outcomes.iter().all(|o| *o == outcomes[0]));
    assert_eq!(outcomes[0].0, StatusCode::FOUND);
    Ok(())
}

#[tokio::test]
async fn unknown_or_disabled_account_gets_same_redirect_and_no_mail() -> Result<()> {
    let mailer = Arc::new(RecordingMailer::default());
    let app = TestApp::new(mailer.clone());
    app.directory.add_user("bob@example.com", &[Role::User], false);
    let router = app.router();

    for username in ["nobody@example.com", "bob@example.com"] {
        let res = send(&router, generate_req("/ott/generate", username)).await;
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(res.headers()[header::LOCATION], "/ott/sent");
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(mailer.sent().is_empty());
    Ok(())
}

#[tokio::test]
async fn link_logs_in_exactly_once() -> Result<()> {
    let mailer = Arc::new(RecordingMailer::default());
    let app = TestApp::new(mailer.clone());
    app.directory.add_user("alice@example.com", &[Role::User], true);
    let router = app.router();

    send(&router, generate_req("/ott/generate", "alice@example.com")).await;
    let token = token_of(&mailer.wait_for(1).await[0]);

    // Following the link only renders a form.
    let form = send(
        &router,
        Request::builder()
            .uri(format!("/login/ott?token={token}"))
            .body(Body::empty())?,
    )
    .await;
    assert_eq!(form.status(), StatusCode::OK);
    assert!(body_text(form).await.contains(&token));

    let res = send(&router, login_req("/login/ott", &token)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["token_type"], "Bearer");
    let access = body["access_token"].as_str().unwrap_or_default().to_string();

    let me = send(
        &router,
        Request::builder()
            .uri("/api/me")
            .header(header::AUTHORIZATION, format!("Bearer {access}"))
            .body(Body::empty())?,
    )
    .await;
    assert_eq!(body_json(me).await["subject"], "alice@example.com");

    let again = send(&router, login_req("/login/ott", &token)).await;
    assert_eq!(again.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body_json(again).await), "INVALID_ONE_TIME_TOKEN");
    Ok(())
}

#[tokio::test]
async fn newer_link_supersedes_older_one() -> Result<()> {
    let mailer = Arc::new(RecordingMailer::default());
    let app = TestApp::new(mailer.clone());
    app.directory.add_user("alice@example.com", &[Role::User], true);
    let router = app.router();

    send(&router, generate_req("/ott/generate", "alice@example.com")).await;
    let first = token_of(&mailer.wait_for(1).await[0]);
    send(&router, generate_req("/ott/generate", "alice@example.com")).await;
    let second = token_of(&mailer.wait_for(2).await[1]);

    let old = send(&router, login_req("/login/ott", &first)).await;
    assert_eq!(old.status(), StatusCode::UNAUTHORIZED);

    let new = send(&router, login_req("/login/ott", &second)).await;
    assert_eq!(new.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn link_for_account_disabled_after_issuance_is_refused() -> Result<()> {
    let mailer = Arc::new(RecordingMailer::default());
    let app = TestApp::new(mailer.clone());
    app.directory.add_user("alice@example.com", &[Role::User], true);
    let router = app.router();

    send(&router, generate_req("/ott/generate", "alice@example.com")).await;
    let token = token_of(&mailer.wait_for(1).await[0]);
    app.directory.set_enabled_for_test("alice@example.com", false);

    let res = send(&router, login_req("/login/ott", &token)).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body_json(res).await), "ACCOUNT_DISABLED");
    Ok(())
}

#[tokio::test]
async fn malformed_link_token_is_rejected_without_side_effects() -> Result<()> {
    let app = TestApp::new(Arc::new(RecordingMailer::default()));
    let router = app.router();

    let form = send(
        &router,
        Request::builder()
            .uri("/login/ott?token=%3Cscript%3E")
            .body(Body::empty())?,
    )
    .await;
    assert_eq!(form.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body_json(form).await), "INVALID_ONE_TIME_TOKEN");

    let res = send(&router, login_req("/login/ott", "short")).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn context_path_prefixes_link_and_redirect() -> Result<()> {
    let mailer = Arc::new(RecordingMailer::default());
    let app = TestApp::with_context_path(mailer.clone(), "/app");
    app.directory.add_user("alice@example.com", &[Role::User], true);
    let router = app.router_at("/app");

    let res = send(&router, generate_req("/app/ott/generate?foo=bar", "alice@example.com")).await;
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(res.headers()[header::LOCATION], "/app/ott/sent");

    let link = link_in(&mailer.wait_for(1).await[0]);
    assert_eq!(link.path(), "/app/login/ott");
    assert!(!link.as_str().contains("foo"));

    let token = token_of(&mailer.sent()[0]);
    let res = send(&router, login_req("/app/login/ott", &token)).await;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn spoofed_forwarded_host_does_not_reach_the_mailed_link() -> Result<()> {
    let mailer = Arc::new(RecordingMailer::default());
    let app = TestApp::new(mailer.clone());
    app.directory.add_user("victim@example.com", &[Role::User], true);

    let mut req = generate_req("/ott/generate", "victim@example.com");
    req.headers_mut()
        .insert("x-forwarded-host", header::HeaderValue::from_static("attacker.example"));
    req.headers_mut()
        .insert("x-forwarded-proto", header::HeaderValue::from_static("https"));

    let res = send(&app.router(), req).await;
    assert_eq!(res.status(), StatusCode::FOUND);

    let link = link_in(&mailer.wait_for(1).await[0]);
    assert_eq!(link.host_str(), Some("members.example.com"));
    assert_eq!(link.scheme(), "http");
    assert!(!link.as_str().contains("attacker"));
    Ok(())
}

#[tokio::test]
async fn unreadable_forms_get_the_error_envelope_and_send_nothing() -> Result<()> {
    let mailer = Arc::new(RecordingMailer::default());
    let app = TestApp::new(mailer.clone());
    app.directory.add_user("alice@example.com", &[Role::User], true);
    let router = app.router();

    let form = |uri: &str, body: &'static str| {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    };
    let not_a_form = Request::builder()
        .method(Method::POST)
        .uri("/ott/generate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"username":"alice@example.com"}"#))?;

    for req in [
        form("/ott/generate", ""),
        form("/ott/generate", "user=alice%40example.com"),
        form("/login/ott", ""),
        not_a_form,
    ] {
        let res = send(&router, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_code(&body_json(res).await), "INVALID_BODY");
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(mailer.sent().is_empty());
    Ok(())
}
