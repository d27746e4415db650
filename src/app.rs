use crate::api;
use crate::changes::AppDataChanges;
use crate::config::{ConfigError, Settings};
use crate::error::AppResult;
use crate::inventory::InventoryService;
use crate::login::{self, CookieSettings};
use crate::supabase::SupabaseService;
use axum::{
    Router,
    extract::FromRef,
    middleware,
    routing::{get, post, put},
};
use axum_extra::extract::cookie::Key;
use handlebars::Handlebars;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Shared state of every handler
#[derive(Clone)]
pub struct AppState {
    /// Unscoped handle; requests work on [`SupabaseService::scoped`] copies
    pub supabase: SupabaseService,
    pub cookie_key: Key,
    pub cookies: CookieSettings,
    pub templates: Arc<Handlebars<'static>>,
    pub changes: AppDataChanges,
    pub inventory: Arc<InventoryService>,
    pub static_dir: PathBuf,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

impl AppState {
    pub fn new(settings: &Settings) -> AppResult<Self> {
        settings.validate_cookies()?;
        let supabase = SupabaseService::new(settings.supabase()?)?;

        let cookie_key = match &settings.cookie_secret {
            Some(secret) => Key::try_from(secret.as_bytes())
                .map_err(|_| ConfigError::CookieSecretTooShort(secret.len()))?,
            None => {
                warn!("PANTRY_COOKIE_SECRET not set; sign-ins will not survive a restart.");
                Key::generate()
            }
        };

        Ok(AppState {
            supabase,
            cookie_key,
            cookies: CookieSettings {
                secure: settings.secure_cookies,
                session_days: settings.session_days,
            },
            templates: Arc::new(templates()?),
            changes: AppDataChanges::default(),
            inventory: Arc::new(InventoryService::new()),
            static_dir: settings.static_dir.clone(),
        })
    }
}

fn templates() -> AppResult<Handlebars<'static>> {
    let mut handlebars = Handlebars::new();
    handlebars.register_template_string("login", include_str!("./templates/login.hbs"))?;
    handlebars.register_template_string("signup", include_str!("./templates/signup.hbs"))?;
    handlebars.register_template_string("home", include_str!("./templates/home.hbs"))?;
    Ok(handlebars)
}

/// Builds the application router
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/", get(login::serve_home_page))
        .route("/api/me", get(api::me))
        .route("/api/context", get(api::context))
        .route("/api/settings/profile", put(api::update_profile))
        .route("/api/settings/password", put(api::change_password))
        .route("/api/settings/household", put(api::rename_household))
        .route("/api/household/join", post(api::join_household))
        .route("/api/household/members", get(api::members))
        .route("/api/shopping", get(api::shopping))
        .route("/api/shopping/items", post(api::add_list_item))
        .route(
            "/api/shopping/items/:item",
            put(api::update_list_item).delete(api::delete_list_item),
        )
        .route("/api/shopping/items/:item/toggle", post(api::toggle_list_item))
        .route("/api/catalog", get(api::catalog))
        .route("/api/pantries", get(api::pantries).post(api::add_pantry))
        .route("/api/pantry/sidebar", get(api::sidebar))
        .route(
            "/api/pantry/locations",
            get(api::location_rows).post(api::add_location),
        )
        .route(
            "/api/pantry/locations/:location",
            put(api::update_location).delete(api::delete_location),
        )
        .route("/api/pantry/locations/:location/items", get(api::location_items))
        .route(
            "/api/categories",
            get(api::categories).post(api::add_category),
        )
        .route(
            "/api/inventory/locations",
            get(api::inventory_locations).post(api::save_inventory_location),
        )
        .route(
            "/api/inventory/locations/:id",
            get(api::inventory_location).delete(api::delete_inventory_location),
        )
        .route("/api/events", get(api::events))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            login::require_auth,
        ));

    Router::new()
        .route("/login", get(login::serve_login_page))
        .route("/signup", get(login::serve_signup_page))
        .route("/auth/antiforgery", get(login::antiforgery_token))
        .route("/auth/login", post(login::handle_login))
        .route("/auth/signup", post(login::handle_signup))
        .route("/auth/logout", post(login::handle_logout))
        .merge(protected)
        .nest_service("/static", ServeDir::new(&state.static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Starts the web server and serves until it fails
pub async fn run(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::new(&settings)?;
    let app = router(state);

    let listener = TcpListener::bind(settings.bind).await?;
    info!("Listening on http://{}", settings.bind);
    axum::serve(listener, app).await?;

    Ok(())
}
