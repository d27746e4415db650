use crate::config::ConfigError;
use crate::supabase::SupabaseError;
use thiserror::Error;

/// Top-level error for services and handlers
#[derive(Debug, Error)]
pub enum AppError {
    #[error("not signed in")]
    Unauthenticated,

    #[error("authenticated user id claim is missing or invalid")]
    MissingUserId,

    #[error("authenticated email claim is missing")]
    MissingEmail,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Supabase(#[from] SupabaseError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[cfg(feature = "web")]
    #[error("template error: {0}")]
    Template(#[from] handlebars::TemplateError),

    #[cfg(feature = "web")]
    #[error("render error: {0}")]
    Render(#[from] handlebars::RenderError),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        AppError::InvalidInput(message.into())
    }

    pub fn not_found<S: Into<String>>(what: S) -> Self {
        AppError::NotFound(what.into())
    }

    /// Stable machine readable code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthenticated => "unauthenticated",
            AppError::MissingUserId => "missing_user_id",
            AppError::MissingEmail => "missing_email",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::NotFound(_) => "not_found",
            AppError::Supabase(e) if e.is_conflict() => "conflict",
            AppError::Supabase(_) => "upstream",
            AppError::Config(_) => "config",
            #[cfg(feature = "web")]
            AppError::Template(_) | AppError::Render(_) => "template",
        }
    }
}

#[cfg(feature = "web")]
mod response {
    use super::AppError;
    use crate::supabase::SupabaseError;
    use axum::Json;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use log::{error, warn};
    use serde_json::json;

    impl AppError {
        pub fn status(&self) -> StatusCode {
            match self {
                AppError::Unauthenticated | AppError::MissingUserId | AppError::MissingEmail => {
                    StatusCode::UNAUTHORIZED
                }
                AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                AppError::NotFound(_) => StatusCode::NOT_FOUND,
                AppError::Supabase(e) if e.is_conflict() => StatusCode::CONFLICT,
                AppError::Supabase(SupabaseError::Auth { status: 401, .. })
                | AppError::Supabase(SupabaseError::Postgrest { status: 401, .. })
                | AppError::Supabase(SupabaseError::NoSession) => StatusCode::UNAUTHORIZED,
                AppError::Supabase(SupabaseError::Postgrest { status: 404, .. }) => {
                    StatusCode::NOT_FOUND
                }
                AppError::Supabase(SupabaseError::Postgrest { status: 403, .. }) => {
                    StatusCode::FORBIDDEN
                }
                AppError::Supabase(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            }
        }
    }

    impl IntoResponse for AppError {
        fn into_response(self) -> Response {
            let status = self.status();
            if status.is_server_error() {
                error!("Request failed: {self}");
            } else {
                warn!("Request rejected: {self}");
            }

            // Upstream details stay in the log
            let message = match &self {
                AppError::Supabase(_) if status.is_server_error() => {
                    "The data service is unavailable.".to_string()
                }
                AppError::Template(_) | AppError::Render(_) | AppError::Config(_) => {
                    "Internal error.".to_string()
                }
                other => other.to_string(),
            };

            (
                status,
                Json(json!({ "code": self.code(), "message": message })),
            )
                .into_response()
        }
    }
}
