//! Router level tests: auth cookie, antiforgery and protected endpoints.
#![cfg(feature = "web")]

mod common;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use common::*;
use futures::StreamExt;
use pantry::Settings;
use pantry::app::{AppState, router};
use pantry::changes::{AppDataChanges, DataScope};
use serde_json::{Value, json};
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn app(server: &MockServer) -> Router {
    app_with_changes(server).0
}

/// Router plus the change bus its handlers publish to
fn app_with_changes(server: &MockServer) -> (Router, AppDataChanges) {
    let settings = Settings::for_project(&server.uri(), ANON_KEY);
    let state = AppState::new(&settings).expect("state builds");
    let changes = state.changes.clone();
    (router(state), changes)
}

/// `name=value` pairs of every Set-Cookie header
fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .map(str::to_string)
        .collect()
}

fn cookie_named(cookies: &[String], name: &str) -> Option<String> {
    cookies
        .iter()
        .find(|c| c.starts_with(&format!("{name}=")))
        .cloned()
}

fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Antiforgery cookie and token, as a browser gets them from the login page
async fn antiforgery(app: &Router) -> (String, String) {
    let response = app
        .clone()
        .oneshot(Request::get("/login").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = cookie_named(&set_cookies(&response), "pantry.af").expect("antiforgery cookie");
    let html = body_text(response).await;
    let marker = "name=\"__RequestVerificationToken\" value=\"";
    let start = html.find(marker).expect("token field") + marker.len();
    let token = html[start..].split('"').next().unwrap().to_string();
    (cookie, token)
}

fn form_post(uri: &str, cookies: &[&str], fields: &[(&str, &str)]) -> Request<Body> {
    let body = fields
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::COOKIE, cookies.join("; "))
        .body(Body::from(body))
        .unwrap()
}

async fn mount_sign_in(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(session_json(&access_token(), "refresh-1")),
        )
        .mount(server)
        .await;
}

/// Signs in through the login endpoint; returns the antiforgery and auth cookies
async fn sign_in(app: &Router, server: &MockServer) -> (String, String, String) {
    mount_sign_in(server).await;
    let (af_cookie, token) = antiforgery(app).await;
    let response = app
        .clone()
        .oneshot(form_post(
            "/auth/login",
            &[&af_cookie],
            &[
                ("email", EMAIL),
                ("password", "secret1"),
                ("returnUrl", "/shopping"),
                ("__RequestVerificationToken", &token),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/shopping");
    let auth = cookie_named(&set_cookies(&response), "pantry.auth").expect("auth cookie");
    (af_cookie, token, auth)
}

/// Token refresh plus an in-sync profile with an existing household
async fn mount_household(server: &MockServer) {
    let rotated = token(json!({ "sub": USER_ID, "email": EMAIL, "session_id": "second" }));
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_json(&rotated, "refresh-2")))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/group_members"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([membership_row("owner")])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/groups"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([group_row("Ann Lee's Household")])),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn api_without_cookie_is_unauthorized() {
    let server = MockServer::start().await;
    let response = app(&server)
        .oneshot(Request::get("/api/me").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["code"], "unauthenticated");
}

#[tokio::test]
async fn pages_without_cookie_redirect_to_login() {
    let server = MockServer::start().await;
    let response = app(&server)
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?returnUrl=%2F");
}

#[tokio::test]
async fn login_without_antiforgery_token_is_rejected() {
    let server = MockServer::start().await;
    let response = app(&server)
        .oneshot(form_post(
            "/auth/login",
            &[],
            &[("email", EMAIL), ("password", "secret1")],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "Invalid request.");
}

#[tokio::test]
async fn blank_credentials_redirect_with_missing() {
    let server = MockServer::start().await;
    let app = app(&server);
    let (af_cookie, token) = antiforgery(&app).await;

    let response = app
        .oneshot(form_post(
            "/auth/login",
            &[&af_cookie],
            &[
                ("email", " "),
                ("password", ""),
                ("__RequestVerificationToken", &token),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(location(&response), "/login?error=missing");
}

#[tokio::test]
async fn wrong_password_redirects_with_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error_code": "invalid_credentials",
            "msg": "Invalid login credentials"
        })))
        .mount(&server)
        .await;
    let app = app(&server);
    let (af_cookie, token) = antiforgery(&app).await;

    let response = app
        .oneshot(form_post(
            "/auth/login",
            &[&af_cookie],
            &[
                ("email", EMAIL),
                ("password", "wrong"),
                ("returnUrl", "https://evil.example.com/"),
                ("__RequestVerificationToken", &token),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?error=invalid");
    assert!(cookie_named(&set_cookies(&response), "pantry.auth").is_none());
}

#[tokio::test]
async fn absolute_return_url_falls_back_to_home() {
    let server = MockServer::start().await;
    mount_sign_in(&server).await;
    let app = app(&server);
    let (af_cookie, token) = antiforgery(&app).await;

    let response = app
        .oneshot(form_post(
            "/auth/login",
            &[&af_cookie],
            &[
                ("email", EMAIL),
                ("password", "secret1"),
                ("returnUrl", "//evil.example.com"),
                ("__RequestVerificationToken", &token),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn signed_in_cookie_opens_protected_endpoints() {
    let server = MockServer::start().await;
    let app = app(&server);
    let (_, _, auth) = sign_in(&app, &server).await;

    let response = app
        .oneshot(
            Request::get("/api/inventory/locations")
                .header(header::COOKIE, &auth)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(cookie_named(&set_cookies(&response), "pantry.auth").is_none());
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|l| l["name"].as_str())
        .collect();
    assert_eq!(names, vec!["Food Storage", "Pantry"]);
}

#[tokio::test]
async fn refreshed_tokens_are_written_back_to_the_cookie() {
    let server = MockServer::start().await;
    let app = app(&server);
    let (_, _, auth) = sign_in(&app, &server).await;

    let rotated = token(json!({ "sub": USER_ID, "email": EMAIL, "session_id": "second" }));
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_json(&rotated, "refresh-2")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([user_row("Ann Lee")])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/group_members"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([membership_row("owner")])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/groups"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([group_row("Ann Lee's Household")])),
        )
        .mount(&server)
        .await;

    let response = app
        .oneshot(
            Request::get("/api/context")
                .header(header::COOKIE, &auth)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let rewritten = cookie_named(&set_cookies(&response), "pantry.auth");
    assert!(rewritten.is_some_and(|c| c != auth));
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["group"]["group_id"], GROUP_ID);
    assert_eq!(body["user"]["display_name"], "Ann Lee");
}

#[tokio::test]
async fn logout_revokes_session_and_clears_cookie() {
    let server = MockServer::start().await;
    let app = app(&server);
    let (af_cookie, token, auth) = sign_in(&app, &server).await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let response = app
        .oneshot(form_post(
            "/auth/logout",
            &[&af_cookie, &auth],
            &[("__RequestVerificationToken", &token)],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    assert_eq!(
        cookie_named(&set_cookies(&response), "pantry.auth").as_deref(),
        Some("pantry.auth=")
    );
}

#[tokio::test]
async fn profile_email_change_is_kept_in_the_cookie() {
    let server = MockServer::start().await;
    let app = app(&server);
    let (_, _, auth) = sign_in(&app, &server).await;
    mount_household(&server).await;
    let new_email = "ann@lees.example.com";
    let new_row = json!({ "user_id": USER_ID, "email": new_email, "display_name": "Ann Lee" });

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([user_row("Ann Lee")])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([new_row])))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/auth/v1/user"))
        .and(body_partial_json(json!({ "email": new_email })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": USER_ID, "email": new_email })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/users"))
        .and(body_partial_json(json!({ "email": new_email })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([new_row])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/users"))
        .and(body_partial_json(json!({ "email": EMAIL })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([user_row("Ann Lee")])))
        .expect(0)
        .mount(&server)
        .await;

    let response = app
        .clone()
        .oneshot(
            Request::put("/api/settings/profile")
                .header(header::COOKIE, &auth)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "display_name": "ann lee", "email": new_email }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated = cookie_named(&set_cookies(&response), "pantry.auth").expect("auth cookie");

    let response = app
        .oneshot(
            Request::get("/api/context")
                .header(header::COOKIE, &updated)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["user"]["email"], new_email);
}

#[tokio::test]
async fn event_stream_only_carries_own_household_changes() {
    let server = MockServer::start().await;
    let (app, changes) = app_with_changes(&server);
    let (_, _, auth) = sign_in(&app, &server).await;
    mount_household(&server).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([user_row("Ann Lee")])))
        .mount(&server)
        .await;

    let response = app
        .oneshot(
            Request::get("/api/events")
                .header(header::COOKIE, &auth)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let own = Uuid::parse_str(GROUP_ID).unwrap();
    changes.notify_changed(DataScope::Locations, Some(Uuid::new_v4()));
    changes.notify_changed(DataScope::Categories, Some(own));

    let mut body = response.into_body().into_data_stream();
    let frame = tokio::time::timeout(Duration::from_secs(5), body.next())
        .await
        .expect("event within timeout")
        .expect("stream open")
        .unwrap();
    let text = String::from_utf8(frame.to_vec()).unwrap();
    assert!(text.starts_with("event: categories"), "{text}");
    assert!(text.contains(GROUP_ID));
}
