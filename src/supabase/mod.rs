//! Thin client for the Supabase auth (GoTrue) and row (PostgREST) APIs.
//!
//! A [`SupabaseService`] owns the shared HTTP client. Each request works on a
//! [`SupabaseService::scoped`] handle so the in-memory session of one signed-in
//! user never leaks into another request.

pub mod auth;
pub mod postgrest;

use crate::config::SupabaseSettings;
use crate::models::Table;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use url::Url;

pub use auth::{AuthClient, FailureReason, SignUpOutcome};
pub use postgrest::QueryBuilder;

/// Errors returned by the Supabase endpoints or while talking to them
#[derive(Debug, Error)]
pub enum SupabaseError {
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("auth request failed ({status}, {reason:?}): {message}")]
    Auth {
        status: u16,
        reason: FailureReason,
        message: String,
    },

    #[error("request on table {table} failed ({status}): {message}")]
    Postgrest {
        table: &'static str,
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("no active session")]
    NoSession,

    #[error("refusing to {operation} every row of {table}")]
    Unfiltered {
        table: &'static str,
        operation: &'static str,
    },
}

impl SupabaseError {
    /// Failure classification for auth errors, `Unknown` for everything else
    pub fn reason(&self) -> FailureReason {
        match self {
            SupabaseError::Auth { reason, .. } => *reason,
            _ => FailureReason::Unknown,
        }
    }

    /// True for unique-violation and conflict responses
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            SupabaseError::Postgrest { status: 409, .. }
        ) || matches!(
            self,
            SupabaseError::Postgrest { code: Some(code), .. } if code == "23505"
        )
    }
}

/// An authenticated GoTrue user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_confirmed_at: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

impl User {
    pub fn metadata_display_name(&self) -> Option<&str> {
        self.user_metadata.get("display_name").and_then(|v| v.as_str())
    }
}

/// Tokens handed out by GoTrue for a signed-in user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub user: Option<User>,
}

impl Session {
    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }
}

/// Handle on a Supabase project
#[derive(Clone)]
pub struct SupabaseService {
    http: reqwest::Client,
    settings: Arc<SupabaseSettings>,
    session: Arc<RwLock<Option<Session>>>,
}

impl std::fmt::Debug for SupabaseService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseService")
            .field("url", &self.settings.url.as_str())
            .field("has_session", &self.current_session().is_some())
            .finish()
    }
}

impl SupabaseService {
    pub fn new(settings: SupabaseSettings) -> Result<Self, SupabaseError> {
        let mut headers = HeaderMap::new();
        let apikey = HeaderValue::from_str(&settings.anon_key)
            .map_err(|_| SupabaseError::Decode("anon key is not a valid header value".into()))?;
        headers.insert("apikey", apikey);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()?;

        Ok(SupabaseService {
            http,
            settings: Arc::new(settings),
            session: Arc::new(RwLock::new(None)),
        })
    }

    /// Same project and connection pool, empty session
    pub fn scoped(&self) -> Self {
        SupabaseService {
            http: self.http.clone(),
            settings: Arc::clone(&self.settings),
            session: Arc::new(RwLock::new(None)),
        }
    }

    pub fn settings(&self) -> &SupabaseSettings {
        &self.settings
    }

    pub fn auth(&self) -> AuthClient<'_> {
        AuthClient::new(self)
    }

    /// Starts a query against the table mapped by `T`
    pub fn from<T: Table>(&self) -> QueryBuilder<T> {
        QueryBuilder::new(self.clone())
    }

    pub fn current_session(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.current_session().and_then(|s| s.user)
    }

    pub(crate) fn set_current_session(&self, session: Option<Session>) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = session;
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, SupabaseError> {
        Ok(self.settings.url.join(path)?)
    }

    /// Bearer for row requests: the user's access token, else the anon key
    pub(crate) fn bearer(&self) -> String {
        self.current_session()
            .map(|s| s.access_token)
            .unwrap_or_else(|| self.settings.anon_key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn service() -> SupabaseService {
        let settings =
            SupabaseSettings::new("https://abc.supabase.co", "anon-key", Duration::from_secs(1))
                .unwrap();
        SupabaseService::new(settings).unwrap()
    }

    fn session(access: &str) -> Session {
        Session {
            access_token: access.to_string(),
            refresh_token: "refresh".to_string(),
            token_type: Some("bearer".to_string()),
            expires_in: None,
            expires_at: None,
            user: None,
        }
    }

    #[test]
    fn scoped_handles_do_not_share_sessions() {
        let base = service();
        let first = base.scoped();
        let second = base.scoped();

        first.set_current_session(Some(session("token-a")));
        assert_eq!(first.bearer(), "token-a");
        assert_eq!(second.bearer(), "anon-key");
        assert!(base.current_session().is_none());

        let clone = first.clone();
        assert_eq!(clone.bearer(), "token-a");
    }

    #[test]
    fn endpoints_join_under_project_url() {
        let svc = service();
        assert_eq!(
            svc.endpoint("rest/v1/users").unwrap().as_str(),
            "https://abc.supabase.co/rest/v1/users"
        );
    }

    #[test]
    fn conflict_detection() {
        let by_status = SupabaseError::Postgrest {
            table: "users",
            status: 409,
            code: None,
            message: "dup".into(),
        };
        let by_code = SupabaseError::Postgrest {
            table: "users",
            status: 400,
            code: Some("23505".into()),
            message: "dup".into(),
        };
        assert!(by_status.is_conflict());
        assert!(by_code.is_conflict());
        assert!(!SupabaseError::NoSession.is_conflict());
    }
}
