//! The signed-in principal carried in the auth cookie.

use crate::supabase::Session;
use serde::{Deserialize, Serialize};

/// Authentication type of principals issued by the login endpoint
pub const COOKIE_AUTHENTICATION: &str = "Cookies";
/// Authentication type of principals derived from an in-memory session
pub const SUPABASE_AUTHENTICATION: &str = "Supabase";

/// Claims of an authenticated (or anonymous) caller
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Principal {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Empty for anonymous principals
    #[serde(default)]
    pub authentication_type: String,
}

impl Principal {
    pub fn anonymous() -> Self {
        Principal::default()
    }

    /// Principal stored in the cookie after a successful sign-in
    pub fn from_session(session: &Session, fallback_email: &str) -> Self {
        let user = session.user.as_ref();
        Principal {
            user_id: Some(user.map(|u| u.id.clone()).unwrap_or_default()),
            email: Some(
                user.and_then(|u| u.email.clone())
                    .unwrap_or_else(|| fallback_email.to_string()),
            ),
            access_token: Some(session.access_token.clone()),
            refresh_token: Some(session.refresh_token.clone()),
            authentication_type: COOKIE_AUTHENTICATION.to_string(),
        }
    }

    /// Identity-only view of a session: user id and email, no tokens
    pub fn from_session_identity(session: &Session) -> Self {
        match &session.user {
            Some(user) => Principal {
                user_id: Some(user.id.clone()),
                email: Some(user.email.clone().unwrap_or_default()),
                access_token: None,
                refresh_token: None,
                authentication_type: SUPABASE_AUTHENTICATION.to_string(),
            },
            None => Principal::anonymous(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !self.authentication_type.is_empty()
    }

    pub fn user_id_claim(&self) -> Option<&str> {
        self.user_id.as_deref().filter(|v| !v.trim().is_empty())
    }

    pub fn email_claim(&self) -> Option<&str> {
        self.email.as_deref().filter(|v| !v.trim().is_empty())
    }

    /// Access and refresh token, only when both are present
    pub fn tokens(&self) -> Option<(&str, &str)> {
        let access = self.access_token.as_deref().filter(|t| !t.trim().is_empty())?;
        let refresh = self.refresh_token.as_deref().filter(|t| !t.trim().is_empty())?;
        Some((access, refresh))
    }

    /// Same claims with the tokens of a refreshed session
    pub fn with_session(&self, session: &Session) -> Self {
        Principal {
            access_token: Some(session.access_token.clone()),
            refresh_token: Some(session.refresh_token.clone()),
            ..self.clone()
        }
    }
}
