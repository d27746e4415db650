//! Authentication state tracked from an in-memory Supabase session.
//!
//! Used where one long-lived Supabase handle represents one signed-in user
//! (for example a CLI or a single-user tool). Subscribers are told about every
//! sign-in, sign-up and sign-out.

use crate::principal::Principal;
use crate::supabase::{SignUpOutcome, SupabaseError, SupabaseService};
use log::info;
use tokio::sync::watch;

pub struct SupabaseAuthStateProvider {
    supabase: SupabaseService,
    state: watch::Sender<Principal>,
}

impl SupabaseAuthStateProvider {
    pub fn new(supabase: SupabaseService) -> Self {
        let initial = principal_of(&supabase);
        let (state, _) = watch::channel(initial);
        SupabaseAuthStateProvider { supabase, state }
    }

    /// Anonymous unless the session has a user
    pub fn authentication_state(&self) -> Principal {
        principal_of(&self.supabase)
    }

    pub fn subscribe(&self) -> watch::Receiver<Principal> {
        self.state.subscribe()
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, SupabaseError> {
        self.supabase.auth().sign_in(email, password).await?;
        Ok(self.publish())
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<SignUpOutcome, SupabaseError> {
        let outcome = self.supabase.auth().sign_up(email, password, metadata).await?;
        self.publish();
        Ok(outcome)
    }

    /// The local session is dropped even when the remote sign-out fails
    pub async fn sign_out(&self) -> Result<(), SupabaseError> {
        let result = self.supabase.auth().sign_out().await;
        self.publish();
        result
    }

    fn publish(&self) -> Principal {
        let principal = self.authentication_state();
        info!(
            "Authentication state changed (authenticated={}).",
            principal.is_authenticated()
        );
        self.state.send_replace(principal.clone());
        principal
    }
}

fn principal_of(supabase: &SupabaseService) -> Principal {
    supabase
        .current_session()
        .map(|session| Principal::from_session_identity(&session))
        .unwrap_or_else(Principal::anonymous)
}
