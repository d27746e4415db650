//! GoTrue endpoints: password sign-in, sign-up, refresh, user lookup and sign-out.

use super::{Session, SupabaseError, SupabaseService, User};
use crate::jwt;
use chrono::{Duration, Utc};
use log::debug;
use reqwest::{RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

/// Why an auth request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    EmailNotConfirmed,
    BadEmailAddress,
    BadLogin,
    BadPassword,
    AlreadyRegistered,
    TooManyRequests,
    InvalidRefreshToken,
    Unknown,
}

/// Result of a sign-up; projects with email confirmation return no session
#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    Session(Session),
    PendingConfirmation(User),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(Session),
    User(User),
}

#[derive(Debug, Default, Deserialize)]
struct GotrueErrorBody {
    error_code: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
}

impl GotrueErrorBody {
    fn message(&self) -> String {
        [
            &self.msg,
            &self.error_description,
            &self.message,
            &self.error,
        ]
        .into_iter()
        .flatten()
        .find(|m| !m.trim().is_empty())
        .cloned()
        .unwrap_or_default()
    }
}

/// Access tokens this close to expiry are refreshed instead of reused
const EXPIRY_SKEW_SECS: i64 = 30;

/// Classifies a GoTrue error from its status, error code and message
pub fn classify_failure(status: u16, error_code: Option<&str>, message: &str) -> FailureReason {
    let message = message.to_ascii_lowercase();
    let code = error_code.unwrap_or_default();

    if status == 429 || code.starts_with("over_") || message.contains("rate limit") {
        return FailureReason::TooManyRequests;
    }
    if code == "email_not_confirmed" || message.contains("email not confirmed") {
        return FailureReason::EmailNotConfirmed;
    }
    if code == "email_address_invalid"
        || code == "email_address_not_authorized"
        || message.contains("unable to validate email address")
        || message.contains("invalid email")
    {
        return FailureReason::BadEmailAddress;
    }
    if code == "invalid_credentials" || message.contains("invalid login credentials") {
        return FailureReason::BadLogin;
    }
    if code == "weak_password" || message.contains("password should") {
        return FailureReason::BadPassword;
    }
    if code == "user_already_exists"
        || code == "email_exists"
        || message.contains("already registered")
    {
        return FailureReason::AlreadyRegistered;
    }
    if code == "refresh_token_not_found"
        || code == "refresh_token_already_used"
        || message.contains("refresh token")
    {
        return FailureReason::InvalidRefreshToken;
    }
    FailureReason::Unknown
}

/// Auth calls bound to one [`SupabaseService`] handle
pub struct AuthClient<'a> {
    service: &'a SupabaseService,
}

impl<'a> AuthClient<'a> {
    pub(super) fn new(service: &'a SupabaseService) -> Self {
        AuthClient { service }
    }

    /// Email/password sign-in; the session becomes the handle's current session
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, SupabaseError> {
        let url = self.service.endpoint("auth/v1/token?grant_type=password")?;
        let request = self
            .service
            .http()
            .post(url)
            .json(&json!({ "email": email, "password": password }));
        let session: Session = send(request).await?;
        self.service.set_current_session(Some(session.clone()));
        Ok(session)
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<SignUpOutcome, SupabaseError> {
        let url = self.service.endpoint("auth/v1/signup")?;
        let mut body = json!({ "email": email, "password": password });
        if let Some(data) = metadata {
            body["data"] = data;
        }
        let request = self.service.http().post(url).json(&body);

        match send::<SignUpResponse>(request).await? {
            SignUpResponse::Session(session) => {
                self.service.set_current_session(Some(session.clone()));
                Ok(SignUpOutcome::Session(session))
            }
            SignUpResponse::User(user) => Ok(SignUpOutcome::PendingConfirmation(user)),
        }
    }

    /// Revokes the current session remotely, then forgets it locally either way
    pub async fn sign_out(&self) -> Result<(), SupabaseError> {
        let Some(session) = self.service.current_session() else {
            return Ok(());
        };
        self.service.set_current_session(None);

        let url = self.service.endpoint("auth/v1/logout")?;
        let response = self
            .service
            .http()
            .post(url)
            .bearer_auth(&session.access_token)
            .send()
            .await?;
        ensure_success(response).await.map(|_| ())
    }

    /// Makes the given tokens the current session
    ///
    /// The refresh token is exchanged when `force_refresh` is set or the access
    /// token has expired; otherwise the access token is validated by fetching
    /// its user.
    pub async fn set_session(
        &self,
        access_token: &str,
        refresh_token: &str,
        force_refresh: bool,
    ) -> Result<Session, SupabaseError> {
        let claims = jwt::decode_claims(access_token);
        let expired = claims
            .as_ref()
            .map(|c| c.is_expired_at(Utc::now(), Duration::seconds(EXPIRY_SKEW_SECS)))
            .unwrap_or(true);

        if force_refresh || expired {
            debug!("Refreshing session (forced={force_refresh}, expired={expired}).");
            return self.refresh_session(refresh_token).await;
        }

        let user = self.get_user(access_token).await?;
        let session = Session {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            token_type: Some("bearer".to_string()),
            expires_in: None,
            expires_at: claims.and_then(|c| c.exp),
            user: Some(user),
        };
        self.service.set_current_session(Some(session.clone()));
        Ok(session)
    }

    /// Adopts tokens without a network round trip; the user comes from the JWT
    pub fn restore_session(&self, access_token: &str, refresh_token: &str) -> Session {
        let claims = jwt::decode_claims(access_token).unwrap_or_default();
        let user = claims.sub.clone().map(|id| User {
            id,
            email: claims.email.clone(),
            email_confirmed_at: None,
            user_metadata: claims.user_metadata.clone(),
        });
        let session = Session {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            token_type: Some("bearer".to_string()),
            expires_in: None,
            expires_at: claims.exp,
            user,
        };
        self.service.set_current_session(Some(session.clone()));
        session
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> Result<Session, SupabaseError> {
        let url = self.service.endpoint("auth/v1/token?grant_type=refresh_token")?;
        let request = self
            .service
            .http()
            .post(url)
            .json(&json!({ "refresh_token": refresh_token }));
        let session: Session = send(request).await?;
        self.service.set_current_session(Some(session.clone()));
        Ok(session)
    }

    pub async fn get_user(&self, access_token: &str) -> Result<User, SupabaseError> {
        let url = self.service.endpoint("auth/v1/user")?;
        let request = self.service.http().get(url).bearer_auth(access_token);
        send(request).await
    }

    /// Changes the signed-in user's password
    pub async fn update_password(&self, new_password: &str) -> Result<User, SupabaseError> {
        self.update_user(json!({ "password": new_password })).await
    }

    /// Changes the signed-in user's account email
    ///
    /// Projects with secure email change keep the old address until the new
    /// one is confirmed; the returned user then still carries the old email.
    pub async fn update_email(&self, new_email: &str) -> Result<User, SupabaseError> {
        self.update_user(json!({ "email": new_email })).await
    }

    async fn update_user(&self, attributes: serde_json::Value) -> Result<User, SupabaseError> {
        let session = self
            .service
            .current_session()
            .ok_or(SupabaseError::NoSession)?;
        let url = self.service.endpoint("auth/v1/user")?;
        let request = self
            .service
            .http()
            .put(url)
            .bearer_auth(&session.access_token)
            .json(&attributes);
        let user: User = send(request).await?;

        let mut updated = session;
        updated.user = Some(user.clone());
        self.service.set_current_session(Some(updated));
        Ok(user)
    }
}

async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, SupabaseError> {
    let response = ensure_success(request.send().await?).await?;
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| SupabaseError::Decode(e.to_string()))
}

async fn ensure_success(response: Response) -> Result<Response, SupabaseError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body: GotrueErrorBody = response.json().await.unwrap_or_default();
    let message = body.message();
    let reason = classify_failure(status.as_u16(), body.error_code.as_deref(), &message);
    Err(SupabaseError::Auth {
        status: status.as_u16(),
        reason,
        message: if message.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            message
        },
    })
}
