//! Provisioning of the user profile and household on sign-in, plus household
//! management.

use crate::changes::{AppDataChanges, DataScope};
use crate::error::{AppError, AppResult};
use crate::identity;
use crate::models::{AppUser, Group, GroupMember, ROLE_MEMBER, ROLE_OWNER};
use crate::principal::Principal;
use crate::supabase::SupabaseService;
use crate::text::{first_non_empty, resolve_display_name};
use chrono::Utc;
use log::{info, warn};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

/// Longest household name accepted
pub const MAX_HOUSEHOLD_NAME: usize = 150;

/// The signed-in user's profile row and household
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HouseholdContext {
    pub user: AppUser,
    pub group: Group,
}

/// A member of a household with profile details
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HouseholdMember {
    pub user_id: Uuid,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

pub struct HouseholdContextService {
    supabase: SupabaseService,
    principal: Principal,
    changes: AppDataChanges,
}

impl HouseholdContextService {
    /// `principal` is the request's cookie principal; its tokens hydrate the session
    pub fn new(supabase: SupabaseService, principal: Principal, changes: AppDataChanges) -> Self {
        HouseholdContextService {
            supabase,
            principal,
            changes,
        }
    }

    /// [`ensure_for_claims`](Self::ensure_for_claims) with the claims of the
    /// service's own principal
    pub async fn ensure_for_principal(
        &self,
        preferred_display_name: Option<&str>,
    ) -> AppResult<HouseholdContext> {
        self.ensure_for_claims(
            self.principal.user_id_claim(),
            self.principal.email_claim(),
            preferred_display_name,
        )
        .await
    }

    /// Makes sure the user has a profile row and belongs to a household
    ///
    /// Safe to call on every request: rows are only written when missing or
    /// out of date.
    pub async fn ensure_for_claims(
        &self,
        user_id_claim: Option<&str>,
        email_claim: Option<&str>,
        preferred_display_name: Option<&str>,
    ) -> AppResult<HouseholdContext> {
        identity::ensure_session(&self.supabase, &self.principal, user_id_claim).await;
        let user_id = identity::resolve_user_id(&self.supabase, &self.principal, user_id_claim)?;

        let existing = self.find_user(user_id).await?;
        let email =
            identity::resolve_email(email_claim, &self.supabase, existing.as_ref(), &self.principal)?;

        let signup_name = identity::metadata_display_name(&self.supabase, &self.principal);
        let stored_name = first_non_empty([
            existing.as_ref().and_then(|u| u.display_name.as_deref()),
            signup_name.as_deref(),
        ]);
        let display_name =
            resolve_display_name(preferred_display_name, stored_name.as_deref(), &email);

        let user = match existing {
            None => self.insert_user(user_id, &email, &display_name).await?,
            Some(user) => self.sync_user(user, &email, &display_name).await?,
        };

        let group = match self.current_group(user_id).await? {
            Some(group) => group,
            None => self.create_household(user_id, &display_name).await?,
        };

        Ok(HouseholdContext { user, group })
    }

    /// Renames a household
    pub async fn rename_household(&self, group_id: Uuid, name: &str) -> AppResult<Group> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > MAX_HOUSEHOLD_NAME {
            return Err(AppError::invalid_input(format!(
                "household name must be 1 to {MAX_HOUSEHOLD_NAME} characters"
            )));
        }

        let updated = self
            .supabase
            .from::<Group>()
            .eq("group_id", group_id)
            .update(&json!({ "name": name }))
            .await?;
        let group = updated
            .into_iter()
            .next()
            .ok_or_else(|| AppError::not_found("household"))?;

        self.changes
            .notify_changed(DataScope::Household, Some(group_id));
        Ok(group)
    }

    /// Moves the user into another household as a regular member
    pub async fn join_household(&self, user_id: Uuid, group_id: Uuid) -> AppResult<Group> {
        let group = self
            .supabase
            .from::<Group>()
            .eq("group_id", group_id)
            .first()
            .await?
            .ok_or_else(|| AppError::not_found("household"))?;

        let current = self
            .supabase
            .from::<GroupMember>()
            .eq("user_id", user_id)
            .get()
            .await?;
        if current.iter().any(|m| m.group_id == group_id) {
            return Ok(group);
        }

        // Old memberships go only after the new one is stored
        self.supabase
            .from::<GroupMember>()
            .insert(&GroupMember {
                group_id,
                user_id,
                role: Some(ROLE_MEMBER.to_string()),
                joined_at: Some(Utc::now()),
            })
            .await?;

        if !current.is_empty() {
            self.supabase
                .from::<GroupMember>()
                .eq("user_id", user_id)
                .neq("group_id", group_id)
                .delete()
                .await?;
        }

        info!("User {user_id} joined household {group_id}.");
        for previous in current {
            self.changes
                .notify_changed(DataScope::Household, Some(previous.group_id));
        }
        self.changes
            .notify_changed(DataScope::Household, Some(group_id));
        Ok(group)
    }

    pub async fn members(&self, group_id: Uuid) -> AppResult<Vec<HouseholdMember>> {
        let memberships = self
            .supabase
            .from::<GroupMember>()
            .eq("group_id", group_id)
            .get()
            .await?;
        if memberships.is_empty() {
            return Ok(Vec::new());
        }

        let users = self
            .supabase
            .from::<AppUser>()
            .is_in("user_id", memberships.iter().map(|m| m.user_id))
            .get()
            .await?;

        let mut members: Vec<HouseholdMember> = memberships
            .into_iter()
            .map(|m| {
                let profile = users.iter().find(|u| u.user_id == m.user_id);
                HouseholdMember {
                    user_id: m.user_id,
                    display_name: profile.and_then(|u| u.display_name.clone()),
                    email: profile.and_then(|u| u.email.clone()),
                    role: m.role,
                }
            })
            .collect();
        members.sort_by_key(|m| {
            (
                m.role.as_deref() != Some(ROLE_OWNER),
                m.display_name.clone().unwrap_or_default().to_lowercase(),
            )
        });
        Ok(members)
    }

    async fn find_user(&self, user_id: Uuid) -> AppResult<Option<AppUser>> {
        Ok(self
            .supabase
            .from::<AppUser>()
            .eq("user_id", user_id)
            .first()
            .await?)
    }

    async fn insert_user(
        &self,
        user_id: Uuid,
        email: &str,
        display_name: &str,
    ) -> AppResult<AppUser> {
        let new_user = AppUser {
            user_id,
            email: Some(email.to_string()),
            display_name: Some(display_name.to_string()),
            created_at: Some(Utc::now()),
        };

        match self.supabase.from::<AppUser>().insert(&new_user).await {
            Ok(user) => {
                info!("Created profile for user {user_id}.");
                Ok(user)
            }
            Err(insert_error) => {
                // A database trigger may have created the profile concurrently
                warn!("Profile insert for {user_id} failed, re-reading once: {insert_error}");
                match self.find_user(user_id).await? {
                    Some(user) => Ok(user),
                    None => Err(insert_error.into()),
                }
            }
        }
    }

    async fn sync_user(&self, mut user: AppUser, email: &str, display_name: &str) -> AppResult<AppUser> {
        let email_matches = user
            .email
            .as_deref()
            .is_some_and(|stored| stored.to_lowercase() == email.to_lowercase());
        let name_matches = user.display_name.as_deref() == Some(display_name);
        if email_matches && name_matches {
            return Ok(user);
        }

        self.supabase
            .from::<AppUser>()
            .eq("user_id", user.user_id)
            .update(&json!({ "email": email, "display_name": display_name }))
            .await?;

        user.email = Some(email.to_string());
        user.display_name = Some(display_name.to_string());
        Ok(user)
    }

    async fn current_group(&self, user_id: Uuid) -> AppResult<Option<Group>> {
        let membership = self
            .supabase
            .from::<GroupMember>()
            .eq("user_id", user_id)
            .first()
            .await?;
        let Some(membership) = membership else {
            return Ok(None);
        };

        Ok(self
            .supabase
            .from::<Group>()
            .eq("group_id", membership.group_id)
            .first()
            .await?)
    }

    async fn create_household(&self, user_id: Uuid, display_name: &str) -> AppResult<Group> {
        let group = Group {
            group_id: Uuid::new_v4(),
            name: Some(format!("{display_name}'s Household")),
            created_by_user: user_id,
            created_at: Some(Utc::now()),
        };
        let group = self.supabase.from::<Group>().insert(&group).await?;

        self.supabase
            .from::<GroupMember>()
            .insert(&GroupMember {
                group_id: group.group_id,
                user_id,
                role: Some(ROLE_OWNER.to_string()),
                joined_at: Some(Utc::now()),
            })
            .await?;

        info!("Created household {} for user {user_id}.", group.group_id);
        Ok(group)
    }
}
