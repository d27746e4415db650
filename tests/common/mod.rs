//! Shared fixtures for the Supabase-backed integration tests.
#![allow(dead_code)]

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use pantry::config::SupabaseSettings;
use pantry::principal::{COOKIE_AUTHENTICATION, Principal};
use pantry::supabase::SupabaseService;
use serde_json::{Value, json};
use std::time::Duration;
use wiremock::MockServer;

pub const ANON_KEY: &str = "anon-key";
pub const USER_ID: &str = "0d3c8b4e-5f0a-4e7b-9d1c-2a6b7c8d9e0f";
pub const GROUP_ID: &str = "5b1e0c7a-3d2f-4c8e-a9b1-7e6d5c4b3a21";
pub const EMAIL: &str = "ann.lee@example.com";

/// Compact JWT with an unverifiable signature
pub fn token(claims: Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

/// Access token for the test user, valid for an hour
pub fn access_token() -> String {
    let exp = chrono::Utc::now().timestamp() + 3600;
    token(json!({ "sub": USER_ID, "email": EMAIL, "exp": exp, "role": "authenticated" }))
}

pub fn service(server: &MockServer) -> SupabaseService {
    let settings = SupabaseSettings::new(&server.uri(), ANON_KEY, Duration::from_secs(5))
        .expect("valid settings");
    SupabaseService::new(settings).expect("client builds")
}

/// Principal as stored in the auth cookie after sign-in
pub fn cookie_principal() -> Principal {
    Principal {
        user_id: Some(USER_ID.to_string()),
        email: Some(EMAIL.to_string()),
        access_token: Some(access_token()),
        refresh_token: Some("refresh-1".to_string()),
        authentication_type: COOKIE_AUTHENTICATION.to_string(),
    }
}

/// GoTrue session response for the test user
pub fn session_json(access_token: &str, refresh_token: &str) -> Value {
    json!({
        "access_token": access_token,
        "refresh_token": refresh_token,
        "token_type": "bearer",
        "expires_in": 3600,
        "user": { "id": USER_ID, "email": EMAIL, "user_metadata": {} }
    })
}

pub fn user_row(display_name: &str) -> Value {
    json!({
        "user_id": USER_ID,
        "email": EMAIL,
        "display_name": display_name,
        "created_at": "2024-01-01T00:00:00Z"
    })
}

pub fn group_row(name: &str) -> Value {
    json!({
        "group_id": GROUP_ID,
        "name": name,
        "created_by_user": USER_ID,
        "created_at": "2024-01-01T00:00:00Z"
    })
}

pub fn membership_row(role: &str) -> Value {
    json!({ "group_id": GROUP_ID, "user_id": USER_ID, "role": role })
}
