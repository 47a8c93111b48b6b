use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::auth::{self as session, AuthUser};
use crate::db::operations::user::{self, NewUser, User};
use crate::models::Role;
use crate::response::{created, message, ok, AppError};
use crate::state::AppState;

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 30;
const PASSWORD_MIN: usize = 8;
const NAME_MAX: usize = 50;

/// Routes that need a valid session; mounted behind `require_auth`.
pub fn session_router() -> Router<AppState> {
    Router::new()
        .route("/auth/verify", get(verify))
        .route("/auth/logout", post(logout))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    email: String,
    username: String,
    password: String,
    role: Option<String>,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    login: String,
    password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthData {
    user: User,
    token: String,
    expires_at: String,
}

pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

pub fn validate_username(username: &str) -> Result<(), &'static str> {
    let len = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err("Username must be 3-30 characters");
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err("Username may only contain letters, digits and underscores");
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.chars().count() < PASSWORD_MIN {
        return Err("Password must be at least 8 characters");
    }
    let has_letter = password.chars().any(|c| c.is_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !has_letter || !has_digit {
        return Err("Password must contain a letter and a digit");
    }
    Ok(())
}

/// Self-registration never grants `ADMIN`.
pub fn registration_role(role: Option<&str>) -> Result<Role, &'static str> {
    match role.map(str::trim).filter(|r| !r.is_empty()) {
        None => Ok(Role::Student),
        Some(value) => match Role::parse(value) {
            Some(role @ (Role::Student | Role::Teacher)) => Ok(role),
            _ => Err("Role must be STUDENT or TEACHER"),
        },
    }
}

fn validate_register(payload: &RegisterRequest) -> Result<Role, AppError> {
    if !is_valid_email(payload.email.trim()) {
        return Err(AppError::validation("Invalid email address"));
    }
    validate_username(payload.username.trim()).map_err(AppError::validation)?;
    validate_password(&payload.password).map_err(AppError::validation)?;
    if payload.first_name.chars().count() > NAME_MAX || payload.last_name.chars().count() > NAME_MAX {
        return Err(AppError::validation("Names must be at most 50 characters"));
    }
    registration_role(payload.role.as_deref()).map_err(AppError::validation)
}

fn session_headers(token: &str, expires_at: NaiveDateTime) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(cookie) = session::auth_cookie_header(token, expires_at) {
        headers.insert(header::SET_COOKIE, cookie);
    }
    headers
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let role = validate_register(&payload)?;
    let proxy = state.require_db()?;

    let email = payload.email.trim().to_lowercase();
    let username = payload.username.trim();
    if user::email_or_username_taken(&proxy, &email, username).await? {
        return Err(AppError::conflict("Email or username already registered"));
    }

    let password_hash = session::hash_password(&payload.password)?;
    let created_user = user::create_user_with_profile(
        &proxy,
        NewUser {
            email: &email,
            username,
            password_hash: &password_hash,
            role,
            first_name: &payload.first_name,
            last_name: &payload.last_name,
        },
    )
    .await?;

    let (token, expires_at) = session::start_session(&proxy, &created_user.id).await?;
    tracing::info!(user_id = %created_user.id, role = role.as_str(), "user registered");

    let (status, body) = created(AuthData {
        user: created_user,
        expires_at: session::format_naive_datetime_iso_millis(expires_at),
        token: token.clone(),
    });
    Ok((status, session_headers(&token, expires_at), body))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.login.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::validation("Login and password are required"));
    }
    let proxy = state.require_db()?;

    let Some((found, hash)) = user::find_user_for_login(&proxy, &payload.login).await? else {
        return Err(AppError::unauthorized("Invalid credentials"));
    };
    if !session::verify_password(&payload.password, &hash) {
        tracing::debug!(user_id = %found.id, "password mismatch");
        return Err(AppError::unauthorized("Invalid credentials"));
    }

    let (token, expires_at) = session::start_session(&proxy, &found.id).await?;
    tracing::info!(user_id = %found.id, "user logged in");

    let body = ok(AuthData {
        user: found,
        expires_at: session::format_naive_datetime_iso_millis(expires_at),
        token: token.clone(),
    });
    Ok((StatusCode::OK, session_headers(&token, expires_at), body))
}

async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;
    if let Some(token) = session::extract_token(&headers) {
        session::end_session(&proxy, &token).await?;
    }

    let mut response_headers = HeaderMap::new();
    if let Some(cookie) = session::clear_auth_cookie_header() {
        response_headers.insert(header::SET_COOKIE, cookie);
    }
    Ok((response_headers, message("Logged out")))
}

async fn verify(Extension(user): Extension<AuthUser>) -> impl IntoResponse {
    ok(serde_json::json!({ "user": user }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_needs_at_and_dot() {
        assert!(is_valid_email("ada@example.com"));
        assert!(!is_valid_email("ada.example.com"));
        assert!(!is_valid_email("ada@example"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("ada@.com"));
        assert!(!is_valid_email("a da@example.com"));
    }

    #[test]
    fn username_rules() {
        assert!(validate_username("ada_99").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"a".repeat(31)).is_err());
        assert!(validate_username("ada-lovelace").is_err());
    }

    #[test]
    fn password_needs_letter_and_digit() {
        assert!(validate_password("Password123").is_ok());
        assert!(validate_password("short1").is_err());
        assert!(validate_password("onlyletters").is_err());
        assert!(validate_password("12345678").is_err());
    }

    #[test]
    fn admin_cannot_self_register() {
        assert_eq!(registration_role(None), Ok(Role::Student));
        assert_eq!(registration_role(Some("teacher")), Ok(Role::Teacher));
        assert!(registration_role(Some("ADMIN")).is_err());
        assert!(registration_role(Some("janitor")).is_err());
    }
}
