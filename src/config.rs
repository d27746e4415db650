use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Longest persistent cookie lifetime accepted, in days
pub const MAX_SESSION_DAYS: i64 = 3650;

/// Configuration errors raised while validating [`Settings`]
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("SUPABASE_URL is not a valid absolute http(s) url: {0}")]
    InvalidUrl(String),

    #[error("SUPABASE_ANON_KEY must not be blank")]
    MissingAnonKey,

    #[error("cookie secret must be at least 64 bytes, got {0}")]
    CookieSecretTooShort(usize),

    #[error("session lifetime must be 1 to 3650 days, got {0}")]
    InvalidSessionDays(i64),
}

/// Server settings, read from the command line with environment fallbacks
#[derive(Debug, Clone, Parser)]
#[command(name = "website")]
#[command(about = "Household pantry and shopping list web server")]
#[command(version)]
pub struct Settings {
    /// Base url of the Supabase project
    #[arg(long, env = "SUPABASE_URL")]
    pub supabase_url: String,

    /// Public anon key of the Supabase project
    #[arg(long, env = "SUPABASE_ANON_KEY", hide_env_values = true)]
    pub supabase_anon_key: String,

    /// Address the HTTP server listens on
    #[arg(long, env = "PANTRY_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Secret used to encrypt the auth cookie (at least 64 bytes)
    #[arg(long, env = "PANTRY_COOKIE_SECRET", hide_env_values = true)]
    pub cookie_secret: Option<String>,

    /// Mark the auth cookie as Secure
    #[arg(long, env = "PANTRY_SECURE_COOKIES", default_value_t = false)]
    pub secure_cookies: bool,

    /// Lifetime of the persistent auth cookie, in days
    #[arg(long, env = "PANTRY_SESSION_DAYS", default_value_t = 14)]
    pub session_days: i64,

    /// Directory served under /static
    #[arg(long, env = "PANTRY_STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,

    /// Timeout for each request to Supabase, in seconds
    #[arg(long, env = "SUPABASE_TIMEOUT_SECS", default_value_t = 10)]
    pub request_timeout_secs: u64,
}

impl Settings {
    /// Settings with defaults for everything but the Supabase project
    pub fn for_project(supabase_url: &str, supabase_anon_key: &str) -> Self {
        Settings {
            supabase_url: supabase_url.to_string(),
            supabase_anon_key: supabase_anon_key.to_string(),
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            cookie_secret: None,
            secure_cookies: false,
            session_days: 14,
            static_dir: PathBuf::from("static"),
            request_timeout_secs: 10,
        }
    }

    /// Validate the Supabase section
    pub fn supabase(&self) -> Result<SupabaseSettings, ConfigError> {
        SupabaseSettings::new(
            &self.supabase_url,
            &self.supabase_anon_key,
            Duration::from_secs(self.request_timeout_secs),
        )
    }

    /// Validate cookie related settings
    pub fn validate_cookies(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_SESSION_DAYS).contains(&self.session_days) {
            return Err(ConfigError::InvalidSessionDays(self.session_days));
        }
        if let Some(secret) = &self.cookie_secret {
            if secret.len() < 64 {
                return Err(ConfigError::CookieSecretTooShort(secret.len()));
            }
        }
        Ok(())
    }
}

/// Connection settings for a Supabase project
#[derive(Debug, Clone, PartialEq)]
pub struct SupabaseSettings {
    /// Project base url, always ending in `/`
    pub url: Url,
    pub anon_key: String,
    pub timeout: Duration,
}

impl SupabaseSettings {
    pub fn new(url: &str, anon_key: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let mut parsed =
            Url::parse(url.trim()).map_err(|_| ConfigError::InvalidUrl(url.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.cannot_be_a_base() {
            return Err(ConfigError::InvalidUrl(url.to_string()));
        }
        if !parsed.path().ends_with('/') {
            let path = format!("{}/", parsed.path());
            parsed.set_path(&path);
        }

        let anon_key = anon_key.trim();
        if anon_key.is_empty() {
            return Err(ConfigError::MissingAnonKey);
        }

        Ok(SupabaseSettings {
            url: parsed,
            anon_key: anon_key.to_string(),
            timeout,
        })
    }
}
