use crate::app::AppState;
use crate::error::{AppError, AppResult};
use crate::forms::{LoginForm, LogoutForm, SignupForm};
use crate::household::HouseholdContextService;
use crate::principal::Principal;
use crate::supabase::{FailureReason, SignUpOutcome, SupabaseService};
use crate::text::{mask_email, sanitize_return_url};
use axum::{
    Extension, Form,
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use log::{error, info, warn};
use rand::{Rng, distributions::Alphanumeric};
use serde::Deserialize;
use serde_json::json;

/// Name of the encrypted cookie holding the signed-in [`Principal`]
pub const AUTH_COOKIE: &str = "pantry.auth";

/// Name of the encrypted cookie holding the antiforgery token
pub const ANTIFORGERY_COOKIE: &str = "pantry.af";

/// Form field the antiforgery token is posted in
pub const ANTIFORGERY_FIELD: &str = "__RequestVerificationToken";

const ANTIFORGERY_TOKEN_LEN: usize = 32;

/// Attributes of the auth cookie
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CookieSettings {
    /// Only send the cookie over https
    pub secure: bool,

    /// Lifetime of the persistent cookie
    pub session_days: i64,
}

/// Per-request authentication scope
///
/// Inserted into the request extensions by [`require_auth`]. The Supabase
/// handle is scoped to this request, so its session belongs to this principal
/// only.
#[derive(Debug, Clone)]
pub struct RequestScope {
    /// Principal read from the auth cookie
    pub principal: Principal,

    /// Supabase handle for this request
    pub supabase: SupabaseService,
}

/// Query string of the login page
#[derive(Debug, Default, Deserialize)]
pub struct LoginPageQuery {
    /// Error code set by a failed sign-in
    pub error: Option<String>,

    /// Set after a sign-up that still needs email confirmation
    pub registered: Option<String>,

    /// Page to continue to after sign-in
    #[serde(rename = "returnUrl")]
    pub return_url: Option<String>,
}

/// Query string of the signup page
#[derive(Debug, Default, Deserialize)]
pub struct SignupPageQuery {
    /// Message of a failed sign-up
    pub error: Option<String>,
}

/// Build the auth cookie for a principal
///
/// # Arguments
/// * `principal` - The signed-in principal, tokens included
/// * `settings` - Cookie attributes
///
/// # Returns
/// * `Result<Cookie<'static>, serde_json::Error>` - The persistent, HttpOnly cookie
pub fn auth_cookie(
    principal: &Principal,
    settings: &CookieSettings,
) -> Result<Cookie<'static>, serde_json::Error> {
    let value = serde_json::to_string(principal)?;
    Ok(Cookie::build((AUTH_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(settings.secure)
        .max_age(time::Duration::days(settings.session_days))
        .build())
}

/// Read the principal from the auth cookie
///
/// Cookies that fail to decrypt or parse are treated as absent.
///
/// # Arguments
/// * `jar` - Private cookie jar of the request
///
/// # Returns
/// * `Option<Principal>` - The authenticated principal, if any
pub fn read_principal(jar: &PrivateCookieJar) -> Option<Principal> {
    let cookie = jar.get(AUTH_COOKIE)?;
    match serde_json::from_str::<Principal>(cookie.value()) {
        Ok(principal) if principal.is_authenticated() => Some(principal),
        Ok(_) => None,
        Err(e) => {
            warn!("Ignoring unreadable auth cookie: {e}");
            None
        }
    }
}

/// Return the antiforgery token of the browser, issuing one if needed
///
/// # Arguments
/// * `jar` - Private cookie jar of the request
///
/// # Returns
/// * `(PrivateCookieJar, String)` - Jar carrying the token cookie, and the token to embed in forms
pub fn issue_antiforgery(jar: PrivateCookieJar) -> (PrivateCookieJar, String) {
    if let Some(existing) = jar.get(ANTIFORGERY_COOKIE) {
        if !existing.value().is_empty() {
            let token = existing.value().to_string();
            return (jar, token);
        }
    }

    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ANTIFORGERY_TOKEN_LEN)
        .map(char::from)
        .collect();
    let cookie = Cookie::build((ANTIFORGERY_COOKIE, token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .build();
    (jar.add(cookie), token)
}

/// Check a posted antiforgery token against the browser's cookie
///
/// # Arguments
/// * `jar` - Private cookie jar of the request
/// * `submitted` - Token posted with the form
///
/// # Returns
/// * `bool` - True when both are present and equal
pub fn antiforgery_valid(jar: &PrivateCookieJar, submitted: Option<&str>) -> bool {
    match (jar.get(ANTIFORGERY_COOKIE), submitted) {
        (Some(cookie), Some(token)) => !token.is_empty() && cookie.value() == token,
        _ => false,
    }
}

/// Map an auth failure to the login page error code
pub fn login_error_code(reason: FailureReason) -> &'static str {
    match reason {
        FailureReason::EmailNotConfirmed => "confirm",
        FailureReason::BadEmailAddress | FailureReason::BadLogin | FailureReason::BadPassword => {
            "invalid"
        }
        FailureReason::TooManyRequests => "rate",
        _ => "unknown",
    }
}

fn login_error_message(code: &str) -> &'static str {
    match code {
        "missing" => "Enter your email and password.",
        "confirm" => "Please confirm your email address before signing in.",
        "invalid" => "Invalid email or password.",
        "rate" => "Too many attempts. Please wait a moment and try again.",
        _ => "Sign-in failed. Please try again.",
    }
}

fn bad_request() -> Response {
    (StatusCode::BAD_REQUEST, "Invalid request.").into_response()
}

/// Serve the login page
///
/// # Arguments
/// * `state` - Application state holding the templates
/// * `jar` - Private cookie jar, used for the antiforgery token
/// * `query` - Error, registration notice and return url
///
/// # Returns
/// * `AppResult<(PrivateCookieJar, Html<String>)>` - The rendered page
pub async fn serve_login_page(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Query(query): Query<LoginPageQuery>,
) -> AppResult<(PrivateCookieJar, Html<String>)> {
    let (jar, token) = issue_antiforgery(jar);
    let notice = query
        .registered
        .as_deref()
        .map(|_| "Check your inbox to confirm your email, then sign in.");
    let html = state.templates.render(
        "login",
        &json!({
            "field": ANTIFORGERY_FIELD,
            "token": token,
            "return_url": sanitize_return_url(query.return_url.as_deref()),
            "error": query.error.as_deref().map(login_error_message),
            "notice": notice,
        }),
    )?;
    Ok((jar, Html(html)))
}

/// Serve the signup page
///
/// # Arguments
/// * `state` - Application state holding the templates
/// * `jar` - Private cookie jar, used for the antiforgery token
/// * `query` - Error message of a previous attempt
///
/// # Returns
/// * `AppResult<(PrivateCookieJar, Html<String>)>` - The rendered page
pub async fn serve_signup_page(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Query(query): Query<SignupPageQuery>,
) -> AppResult<(PrivateCookieJar, Html<String>)> {
    let (jar, token) = issue_antiforgery(jar);
    let html = state.templates.render(
        "signup",
        &json!({
            "field": ANTIFORGERY_FIELD,
            "token": token,
            "error": query.error,
        }),
    )?;
    Ok((jar, Html(html)))
}

/// Serve the home page of a signed-in user
///
/// Provisions the user's profile and household on first visit.
///
/// # Arguments
/// * `state` - Application state
/// * `jar` - Private cookie jar, used for the logout form's antiforgery token
/// * `scope` - Authentication scope set by [`require_auth`]
///
/// # Returns
/// * `AppResult<(PrivateCookieJar, Html<String>)>` - The rendered page
pub async fn serve_home_page(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Extension(scope): Extension<RequestScope>,
) -> AppResult<(PrivateCookieJar, Html<String>)> {
    let households = HouseholdContextService::new(
        scope.supabase.clone(),
        scope.principal.clone(),
        state.changes.clone(),
    );
    let context = households.ensure_for_principal(None).await?;

    let (jar, token) = issue_antiforgery(jar);
    let html = state.templates.render(
        "home",
        &json!({
            "field": ANTIFORGERY_FIELD,
            "token": token,
            "display_name": context.user.display_name,
            "email": context.user.email,
            "household": context.group.name,
        }),
    )?;
    Ok((jar, Html(html)))
}

/// Issue an antiforgery token for script clients
///
/// # Returns
/// * `(PrivateCookieJar, Json)` - Jar with the token cookie, and `{ "field", "token" }`
pub async fn antiforgery_token(jar: PrivateCookieJar) -> impl IntoResponse {
    let (jar, token) = issue_antiforgery(jar);
    (
        jar,
        axum::Json(json!({ "field": ANTIFORGERY_FIELD, "token": token })),
    )
}

/// Handle sign-in form posts
///
/// Signs in against Supabase and stores the principal, tokens included, in
/// the encrypted auth cookie.
///
/// # Arguments
/// * `state` - Application state
/// * `jar` - Private cookie jar for the antiforgery and auth cookies
/// * `form` - Email, password, return url and antiforgery token
///
/// # Returns
/// * `Response` - Redirect to the return url, or back to the login page with an error code
pub async fn handle_login(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    if !antiforgery_valid(&jar, form.antiforgery.as_deref()) {
        warn!("Login POST failed antiforgery validation.");
        return bad_request();
    }

    let return_url = sanitize_return_url(form.return_url.as_deref());
    info!(
        "Login POST received for {}. ReturnUrl={return_url}.",
        mask_email(&form.email)
    );

    if !form.has_credentials() {
        return Redirect::to("/login?error=missing").into_response();
    }

    let email = form.email.trim();
    let supabase = state.supabase.scoped();
    let session = match supabase.auth().sign_in(email, &form.password).await {
        Ok(session) => session,
        Err(e) => {
            warn!("Supabase sign-in failed: {e}");
            let code = login_error_code(e.reason());
            return Redirect::to(&format!("/login?error={code}")).into_response();
        }
    };

    let principal = Principal::from_session(&session, email);
    if principal.tokens().is_none() {
        return Redirect::to("/login?error=confirm").into_response();
    }

    match auth_cookie(&principal, &state.cookies) {
        Ok(cookie) => {
            info!("Cookie sign-in completed for {}.", mask_email(email));
            (jar.add(cookie), Redirect::to(&return_url)).into_response()
        }
        Err(e) => {
            error!("Could not encode auth cookie: {e}");
            Redirect::to("/login?error=unknown").into_response()
        }
    }
}

/// Handle sign-up form posts
///
/// A sign-up that returns a session (email confirmation disabled) signs the
/// user in and creates their household right away.
///
/// # Arguments
/// * `state` - Application state
/// * `jar` - Private cookie jar for the antiforgery and auth cookies
/// * `form` - Name, email, password and confirmation
///
/// # Returns
/// * `Response` - Redirect home, to the login page with a notice, or back to signup with an error
pub async fn handle_signup(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Form(form): Form<SignupForm>,
) -> Response {
    if !antiforgery_valid(&jar, form.antiforgery.as_deref()) {
        warn!("Signup POST failed antiforgery validation.");
        return bad_request();
    }

    match form.validate() {
        Ok(()) => {}
        Err(AppError::InvalidInput(message)) => return signup_error(&message),
        Err(e) => return signup_error(&e.to_string()),
    }

    let email = form.email.trim();
    let display_name = form.display_name();
    let supabase = state.supabase.scoped();
    let metadata = json!({ "display_name": display_name });

    let session = match supabase
        .auth()
        .sign_up(email, &form.password, Some(metadata))
        .await
    {
        Ok(SignUpOutcome::Session(session)) => session,
        Ok(SignUpOutcome::PendingConfirmation(_)) => {
            info!("Sign-up for {} awaits email confirmation.", mask_email(email));
            return Redirect::to("/login?registered=confirm").into_response();
        }
        Err(e) => {
            warn!("Supabase sign-up failed: {e}");
            let message = match e.reason() {
                FailureReason::AlreadyRegistered => "An account with this email already exists.",
                FailureReason::BadPassword => "Choose a stronger password.",
                FailureReason::BadEmailAddress => "Enter a valid email address.",
                FailureReason::TooManyRequests => "Too many attempts. Please try again later.",
                _ => "Sign-up failed. Please try again.",
            };
            return signup_error(message);
        }
    };

    let principal = Principal::from_session(&session, email);
    let households =
        HouseholdContextService::new(supabase, principal.clone(), state.changes.clone());
    if let Err(e) = households.ensure_for_principal(Some(&display_name)).await {
        warn!("Household provisioning after sign-up failed: {e}");
    }

    match auth_cookie(&principal, &state.cookies) {
        Ok(cookie) => (jar.add(cookie), Redirect::to("/")).into_response(),
        Err(e) => {
            error!("Could not encode auth cookie: {e}");
            Redirect::to("/login").into_response()
        }
    }
}

fn signup_error(message: &str) -> Response {
    Redirect::to(&format!("/signup?error={}", urlencoding::encode(message))).into_response()
}

/// Handle logout form posts
///
/// Revokes the Supabase session (best effort) and removes the auth cookie.
///
/// # Arguments
/// * `state` - Application state
/// * `jar` - Private cookie jar holding the auth cookie
/// * `form` - Antiforgery token
///
/// # Returns
/// * `Response` - Redirect to the login page
pub async fn handle_logout(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Form(form): Form<LogoutForm>,
) -> Response {
    if !antiforgery_valid(&jar, form.antiforgery.as_deref()) {
        warn!("Logout POST failed antiforgery validation.");
        return bad_request();
    }

    if let Some(principal) = read_principal(&jar) {
        if let Some((access_token, refresh_token)) = principal.tokens() {
            let supabase = state.supabase.scoped();
            supabase.auth().restore_session(access_token, refresh_token);
            if let Err(e) = supabase.auth().sign_out().await {
                warn!("Supabase sign-out failed: {e}");
            }
        }
    }

    let removal = Cookie::build(AUTH_COOKIE).path("/");
    (jar.remove(removal), Redirect::to("/login")).into_response()
}

/// Authentication middleware
///
/// Requests without a valid auth cookie are rejected: API calls with 401,
/// pages with a redirect to the login page. Authenticated requests get a
/// [`RequestScope`]. When the handler refreshed the Supabase session, the
/// new tokens are written back into the cookie. A handler that changes the
/// claims returns the new [`Principal`] as a response extension; it replaces
/// the cookie principal.
///
/// # Arguments
/// * `state` - Application state
/// * `jar` - Private cookie jar holding the auth cookie
/// * `request` - The incoming request
/// * `next` - Next middleware in the chain
///
/// # Returns
/// * `Response` - The handler's response, a 401, or a redirect to login
pub async fn require_auth(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(principal) = read_principal(&jar) else {
        if request.uri().path().starts_with("/api/") {
            return AppError::Unauthenticated.into_response();
        }
        let target = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let location = format!("/login?returnUrl={}", urlencoding::encode(target));
        return Redirect::to(&location).into_response();
    };

    let supabase = state.supabase.scoped();
    request.extensions_mut().insert(RequestScope {
        principal: principal.clone(),
        supabase: supabase.clone(),
    });

    let mut response = next.run(request).await;

    let updated = response.extensions_mut().remove::<Principal>();
    let rotated = supabase
        .current_session()
        .filter(|s| principal.access_token.as_deref() != Some(s.access_token.as_str()));
    if updated.is_none() && rotated.is_none() {
        return response;
    }

    let mut stored = updated.unwrap_or(principal);
    if let Some(session) = rotated {
        stored = stored.with_session(&session);
    }
    match auth_cookie(&stored, &state.cookies) {
        Ok(cookie) => (jar.add(cookie), response).into_response(),
        Err(e) => {
            error!("Could not store refreshed tokens: {e}");
            response
        }
    }
}
