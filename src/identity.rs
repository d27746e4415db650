//! Reconciles the cookie principal with the Supabase session of a request.
//!
//! The cookie carries the user id, email and both tokens. The Supabase handle
//! of a request starts without a session, so before any row access the session
//! is hydrated from the cookie tokens. Values missing from the cookie are
//! filled from the session user and, last, from the access-token claims.

use crate::error::{AppError, AppResult};
use crate::jwt;
use crate::models::AppUser;
use crate::principal::Principal;
use crate::supabase::SupabaseService;
use crate::text::first_non_empty;
use log::{debug, warn};
use uuid::Uuid;

/// Hydrates the session from the principal's tokens unless a session for the
/// claimed user is already present. Failures are logged and swallowed.
pub async fn ensure_session(
    supabase: &SupabaseService,
    principal: &Principal,
    user_id_claim: Option<&str>,
) {
    if let Some(session_user) = supabase.current_user().map(|u| u.id) {
        let matches_claim = match user_id_claim.filter(|c| !c.trim().is_empty()) {
            None => true,
            Some(claim) => session_user.eq_ignore_ascii_case(claim.trim()),
        };
        if !session_user.trim().is_empty() && matches_claim {
            return;
        }
    }

    let Some((access_token, refresh_token)) = principal.tokens() else {
        debug!("No tokens on principal; session stays empty.");
        return;
    };

    if let Err(e) = supabase
        .auth()
        .set_session(access_token, refresh_token, true)
        .await
    {
        warn!("Could not restore session from cookie tokens: {e}");
    }
}

/// Claim, then session user, then the JWT subject
pub fn resolve_user_id(
    supabase: &SupabaseService,
    principal: &Principal,
    user_id_claim: Option<&str>,
) -> AppResult<Uuid> {
    let session_user = supabase.current_user().map(|u| u.id);
    let jwt_subject = principal
        .access_token
        .as_deref()
        .and_then(jwt::decode_claims)
        .and_then(|c| c.sub);

    let effective = first_non_empty([
        user_id_claim,
        session_user.as_deref(),
        jwt_subject.as_deref(),
    ])
    .ok_or(AppError::MissingUserId)?;

    Uuid::parse_str(&effective).map_err(|_| AppError::MissingUserId)
}

/// Claim, then session user, then the stored row, then the JWT email
pub fn resolve_email(
    email_claim: Option<&str>,
    supabase: &SupabaseService,
    existing: Option<&AppUser>,
    principal: &Principal,
) -> AppResult<String> {
    let session_email = supabase.current_user().and_then(|u| u.email);
    let jwt_email = principal
        .access_token
        .as_deref()
        .and_then(jwt::decode_claims)
        .and_then(|c| c.email);

    first_non_empty([
        email_claim,
        session_email.as_deref(),
        existing.and_then(|u| u.email.as_deref()),
        jwt_email.as_deref(),
    ])
    .ok_or(AppError::MissingEmail)
}

/// Display name captured at sign-up, from the session user or the JWT
pub fn metadata_display_name(supabase: &SupabaseService, principal: &Principal) -> Option<String> {
    let from_session = supabase
        .current_user()
        .and_then(|u| u.metadata_display_name().map(str::to_string));
    from_session.or_else(|| {
        principal
            .access_token
            .as_deref()
            .and_then(jwt::decode_claims)
            .and_then(|c| c.metadata_display_name().map(str::to_string))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SupabaseSettings;
    use crate::jwt::unsigned_token;
    use serde_json::json;
    use std::time::Duration;

    const USER: &str = "0d3c8b4e-5f0a-4e7b-9d1c-2a6b7c8d9e0f";

    fn service() -> SupabaseService {
        let settings =
            SupabaseSettings::new("http://127.0.0.1:9", "anon", Duration::from_secs(1)).unwrap();
        SupabaseService::new(settings).unwrap()
    }

    fn principal_with_token(claims: serde_json::Value) -> Principal {
        Principal {
            access_token: Some(unsigned_token(claims)),
            refresh_token: Some("refresh".to_string()),
            authentication_type: "Cookies".to_string(),
            ..Principal::default()
        }
    }

    #[test]
    fn user_id_prefers_claim() {
        let principal = principal_with_token(json!({ "sub": Uuid::new_v4().to_string() }));
        let id = resolve_user_id(&service(), &principal, Some(USER)).unwrap();
        assert_eq!(id.to_string(), USER);
    }

    #[test]
    fn user_id_falls_back_to_jwt_subject() {
        let principal = principal_with_token(json!({ "sub": USER }));
        let id = resolve_user_id(&service(), &principal, Some("  ")).unwrap();
        assert_eq!(id.to_string(), USER);
    }

    #[test]
    fn user_id_from_restored_session() {
        let svc = service();
        let token = unsigned_token(json!({ "sub": USER, "email": "s@example.com" }));
        svc.auth().restore_session(&token, "refresh");
        let id = resolve_user_id(&svc, &Principal::anonymous(), None).unwrap();
        assert_eq!(id.to_string(), USER);
    }

    #[test]
    fn invalid_user_id_is_rejected() {
        let err = resolve_user_id(&service(), &Principal::anonymous(), Some("not-a-guid"))
            .unwrap_err();
        assert!(matches!(err, AppError::MissingUserId));
        assert!(matches!(
            resolve_user_id(&service(), &Principal::anonymous(), None),
            Err(AppError::MissingUserId)
        ));
    }

    #[test]
    fn email_resolution_order() {
        let principal = principal_with_token(json!({ "sub": USER, "email": "jwt@example.com" }));
        let row = AppUser {
            user_id: Uuid::parse_str(USER).unwrap(),
            email: Some("row@example.com".to_string()),
            display_name: None,
            created_at: None,
        };
        let svc = service();

        assert_eq!(
            resolve_email(Some(" claim@example.com "), &svc, Some(&row), &principal).unwrap(),
            "claim@example.com"
        );
        assert_eq!(
            resolve_email(None, &svc, Some(&row), &principal).unwrap(),
            "row@example.com"
        );
        assert_eq!(
            resolve_email(None, &svc, None, &principal).unwrap(),
            "jwt@example.com"
        );
        assert!(matches!(
            resolve_email(None, &svc, None, &Principal::anonymous()),
            Err(AppError::MissingEmail)
        ));
    }

    #[test]
    fn metadata_name_from_jwt() {
        let principal =
            principal_with_token(json!({ "sub": USER, "user_metadata": { "display_name": "Ann Lee" } }));
        assert_eq!(
            metadata_display_name(&service(), &principal).as_deref(),
            Some("Ann Lee")
        );
    }
}
