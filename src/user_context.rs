//! Read-only view of the signed-in user, plus profile settings.

use crate::changes::{AppDataChanges, DataScope};
use crate::error::{AppError, AppResult};
use crate::identity;
use crate::models::{AppUser, Group, GroupMember};
use crate::principal::Principal;
use crate::supabase::SupabaseService;
use crate::text::{normalize_display_name, resolve_display_name};
use log::info;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

/// Profile and (optional) household of the signed-in user
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserContext {
    pub user: AppUser,
    pub group: Option<Group>,
}

/// Result of a profile update: the stored row and the principal to persist
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub user: AppUser,
    pub principal: Principal,
}

pub struct UserContextService {
    supabase: SupabaseService,
    principal: Principal,
    changes: AppDataChanges,
}

impl UserContextService {
    pub fn new(supabase: SupabaseService, principal: Principal, changes: AppDataChanges) -> Self {
        UserContextService {
            supabase,
            principal,
            changes,
        }
    }

    /// Resolves the user without writing anything
    ///
    /// A missing profile row is synthesised in memory; blank fields of a stored
    /// row are filled in memory only.
    pub async fn get_for_claims(
        &self,
        user_id_claim: Option<&str>,
        email_claim: Option<&str>,
        preferred_display_name: Option<&str>,
    ) -> AppResult<UserContext> {
        identity::ensure_session(&self.supabase, &self.principal, user_id_claim).await;
        let user_id = identity::resolve_user_id(&self.supabase, &self.principal, user_id_claim)?;

        let existing = self
            .supabase
            .from::<AppUser>()
            .eq("user_id", user_id)
            .first()
            .await?;
        let email =
            identity::resolve_email(email_claim, &self.supabase, existing.as_ref(), &self.principal)?;
        let display_name = resolve_display_name(
            preferred_display_name,
            existing.as_ref().and_then(|u| u.display_name.as_deref()),
            &email,
        );

        let user = match existing {
            None => AppUser {
                user_id,
                email: Some(email),
                display_name: Some(display_name),
                created_at: None,
            },
            Some(mut user) => {
                if user.email.as_deref().is_none_or(|e| e.trim().is_empty()) {
                    user.email = Some(email);
                }
                if user.display_name.as_deref().is_none_or(|n| n.trim().is_empty()) {
                    user.display_name = Some(display_name);
                }
                user
            }
        };

        let membership = self
            .supabase
            .from::<GroupMember>()
            .eq("user_id", user_id)
            .first()
            .await?;
        let group = match membership {
            Some(m) => {
                self.supabase
                    .from::<Group>()
                    .eq("group_id", m.group_id)
                    .first()
                    .await?
            }
            None => None,
        };

        Ok(UserContext { user, group })
    }

    /// Stores a new display name and email
    ///
    /// The account email is changed through the auth API first, then the
    /// profile row. The returned principal carries the new email claim and
    /// replaces the one in the auth cookie.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        group_id: Option<Uuid>,
        display_name: &str,
        email: &str,
    ) -> AppResult<ProfileUpdate> {
        let display_name = normalize_display_name(Some(display_name));
        let email = email.trim();
        if display_name.is_empty() || email.is_empty() {
            return Err(AppError::invalid_input("display name and email are required"));
        }

        identity::ensure_session(&self.supabase, &self.principal, self.principal.user_id_claim())
            .await;
        let account_email = self
            .supabase
            .current_user()
            .and_then(|u| u.email)
            .or_else(|| self.principal.email_claim().map(str::to_string));
        if !account_email.is_some_and(|current| current.eq_ignore_ascii_case(email)) {
            self.supabase.auth().update_email(email).await?;
            info!("Requested account email change for user {user_id}.");
        }

        let updated = self
            .supabase
            .from::<AppUser>()
            .eq("user_id", user_id)
            .update(&json!({ "display_name": display_name, "email": email }))
            .await?;
        let user = updated
            .into_iter()
            .next()
            .ok_or_else(|| AppError::not_found("profile"))?;

        info!("Updated profile of user {user_id}.");
        self.changes.notify_changed(DataScope::Profile, group_id);
        Ok(ProfileUpdate {
            user,
            principal: Principal {
                email: Some(email.to_string()),
                ..self.principal.clone()
            },
        })
    }

    pub async fn change_password(&self, new_password: &str) -> AppResult<()> {
        identity::ensure_session(&self.supabase, &self.principal, self.principal.user_id_claim())
            .await;
        self.supabase.auth().update_password(new_password).await?;
        Ok(())
    }
}
