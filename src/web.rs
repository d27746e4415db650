#![cfg(not(tarpaulin_include))]

use clap::Parser;
use pantry::{Settings, app};

/// Main entry point for the web application
///
/// Reads the settings from the command line and environment, sets up
/// logging and serves the application until the server fails.
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::parse();
    log::info!(
        "Starting pantry web server for {} on {}",
        settings.supabase_url,
        settings.bind
    );
    app::run(settings).await
}
