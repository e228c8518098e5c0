//! Login sessions for the HTML views.
//!
//! Passwords are stored as `pbkdf2_sha256$<iterations>$<salt>$<hex digest>`.
//! Sessions are handled by `tower-sessions`: the `sessionid` cookie names a
//! record in the in-memory store that holds the logged-in [`CurrentUser`].

use crate::config::Config;
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::storage;
use crate::templates;
use axum::{
    extract::{Query, Request, State},
    http::{header::LOCATION, HeaderValue, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Response},
    Form,
};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, Session, SessionManagerLayer};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "sessionid";
/// Session key of the logged-in user.
pub const USER_KEY: &str = "user";
pub const LOGIN_URL: &str = "/accounts/login/";
/// Where a successful login lands when no usable `next` was given.
pub const DEFAULT_REDIRECT: &str = "/states/";

const HASH_ALGORITHM: &str = "pbkdf2_sha256";
const HASH_ITERATIONS: u32 = 600_000;

// ============ Passwords ============

pub fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    hash_password_with(password, &salt, HASH_ITERATIONS)
}

pub fn hash_password_with(password: &str, salt: &str, iterations: u32) -> String {
    format!(
        "{}${}${}${}",
        HASH_ALGORITHM,
        iterations,
        salt,
        hex::encode(derive_key(password, salt, iterations))
    )
}

fn derive_key(password: &str, salt: &str, iterations: u32) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut key);
    key
}

/// Checks `password` against an encoded hash. Malformed hashes never verify.
pub fn verify_password(password: &str, encoded: &str) -> bool {
    let mut parts = encoded.splitn(4, '$');
    let (Some(algorithm), Some(iterations), Some(salt), Some(expected)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    if algorithm != HASH_ALGORITHM {
        return false;
    }
    let Some(iterations) = iterations.parse::<u32>().ok().filter(|n| *n > 0) else {
        return false;
    };
    let Ok(expected) = hex::decode(expected) else {
        return false;
    };

    constant_time_eq(&derive_key(password, salt, iterations), &expected)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// ============ Sessions ============

/// The user behind the current request, stored in the session at login and
/// set as a request extension by [`require_login`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub user_id: i64,
    pub username: String,
}

/// Cookie session layer over `store`: `sessionid`, HttpOnly, SameSite=Lax,
/// `Secure` when configured, expiring after `SESSION_TTL_SECS` of inactivity.
pub fn session_layer(store: MemoryStore, config: &Config) -> SessionManagerLayer<MemoryStore> {
    let ttl = i64::try_from(config.session_ttl_secs).unwrap_or(i64::MAX / 1_000);
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE)
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_secure(config.session_cookie_secure)
        .with_expiry(Expiry::OnInactivity(time::Duration::seconds(ttl)))
}

async fn current_user(session: &Session) -> Result<Option<CurrentUser>, AppError> {
    Ok(session.get::<CurrentUser>(USER_KEY).await?)
}

/// Only local absolute paths are followed after login. Browsers drop tabs and
/// newlines from URLs, so any control or whitespace character is refused
/// before the `//` check.
pub fn safe_next(next: Option<&str>) -> String {
    match next {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && !path.chars().any(|c| c.is_control() || c.is_whitespace()) =>
        {
            path.to_string()
        }
        _ => DEFAULT_REDIRECT.to_string(),
    }
}

/// `/accounts/login/?next=<path>`.
pub fn login_redirect_url(path_and_query: &str) -> String {
    let next: String = url::form_urlencoded::byte_serialize(path_and_query.as_bytes()).collect();
    format!("{}?next={}", LOGIN_URL, next)
}

/// 302 Found.
pub fn found(location: &str) -> Response {
    let mut response = StatusCode::FOUND.into_response();
    if let Ok(value) = HeaderValue::from_str(location) {
        response.headers_mut().insert(LOCATION, value);
    }
    response
}

// ============ Middleware ============

/// Gate for the HTML views: anonymous requests go to the login page.
pub async fn require_login(session: Session, mut request: Request, next: Next) -> Response {
    match current_user(&session).await {
        Ok(Some(user)) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Ok(None) => {
            let target = request
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| request.uri().path().to_string());
            tracing::debug!("Anonymous request to {}, redirecting to login", target);
            found(&login_redirect_url(&target))
        }
        Err(e) => e.into_response(),
    }
}

/// Gate for the JSON API, active only when `API_REQUIRE_LOGIN` is set.
pub async fn require_api_login(
    State(state): State<Arc<AppState>>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Response {
    if !state.config.api_require_login {
        return next.run(request).await;
    }
    match current_user(&session).await {
        Ok(Some(user)) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Ok(None) => AppError::Unauthorized(format!(
            "anonymous request to {}",
            request.uri().path()
        ))
        .into_response(),
        Err(e) => e.into_response(),
    }
}

// ============ Handlers ============

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub next: Option<String>,
}

/// GET /accounts/login/
pub async fn login_page(Query(query): Query<LoginQuery>) -> Html<String> {
    Html(templates::login_page(&safe_next(query.next.as_deref()), None))
}

/// POST /accounts/login/
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let next = safe_next(form.next.as_deref());
    let username = form.username.trim().to_string();

    let user = match storage::find_user(&state.db, &username).await? {
        Some(user) if user.is_active => {
            let password = form.password;
            let encoded = user.password_hash.clone();
            let valid = tokio::task::spawn_blocking(move || verify_password(&password, &encoded))
                .await
                .map_err(|e| AppError::InternalError(format!("password check: {}", e)))?;
            valid.then_some(user)
        }
        _ => None,
    };

    let Some(user) = user else {
        tracing::warn!("Failed login attempt for '{}'", username);
        let page = templates::login_page(
            &next,
            Some("Please enter a correct username and password."),
        );
        return Ok(Html(page).into_response());
    };

    storage::touch_last_login(&state.db, user.id).await?;
    session.cycle_id().await?;
    session
        .insert(
            USER_KEY,
            CurrentUser {
                user_id: user.id,
                username: user.username.clone(),
            },
        )
        .await?;
    tracing::info!("User '{}' logged in", user.username);

    Ok(found(&next))
}

/// GET /logout/
pub async fn logout(session: Session) -> Result<Response, AppError> {
    if let Some(user) = current_user(&session).await? {
        tracing::info!("User '{}' logged out", user.username);
    }
    session.flush().await?;
    Ok(found(LOGIN_URL))
}
