use axum::http::{header, HeaderMap, HeaderValue};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::Row;
use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseProxy;
use crate::models::Role;

pub const AUTH_COOKIE_NAME: &str = "auth_token";
const BCRYPT_COST: u32 = 10;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub username: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub created_at: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn is_teacher(&self) -> bool {
        self.role.is_teacher()
    }

    pub fn is_student(&self) -> bool {
        self.role.is_student()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing token")]
    MissingToken,
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    Expired,
    #[error("missing JWT_SECRET")]
    MissingSecret,
    #[error("invalid JWT_EXPIRES_IN")]
    InvalidExpiresIn,
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = get_cookie(headers, AUTH_COOKIE_NAME) {
        return Some(token);
    }

    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())?;

    auth_header
        .strip_prefix("Bearer ")
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub async fn verify_request_token(
    proxy: &DatabaseProxy,
    token: &str,
) -> Result<AuthUser, AuthError> {
    let secret = jwt_secret()?;
    let claims = verify_jwt_hs256(token, &secret, Utc::now().timestamp())?;
    let token_hash = hash_token(token);

    let row = sqlx::query(
        r#"
        SELECT u."id", u."email", u."username", u."role", u."firstName", u."lastName",
               u."createdAt", s."expiresAt"
        FROM "sessions" s
        JOIN "users" u ON u."id" = s."userId"
        WHERE s."token" = $1 AND s."userId" = $2
        "#,
    )
    .bind(&token_hash)
    .bind(&claims.user_id)
    .fetch_optional(proxy.pool())
    .await?;

    let Some(row) = row else {
        return Err(AuthError::InvalidToken);
    };

    let expires_at: NaiveDateTime = row.try_get("expiresAt")?;
    if expires_at < Utc::now().naive_utc() {
        return Err(AuthError::Expired);
    }

    let role: String = row.try_get("role")?;
    let created_at: NaiveDateTime = row.try_get("createdAt")?;

    Ok(AuthUser {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        username: row.try_get("username")?,
        role: Role::parse(&role).ok_or(AuthError::InvalidToken)?,
        first_name: row.try_get("firstName")?,
        last_name: row.try_get("lastName")?,
        created_at: format_naive_datetime_iso_millis(created_at),
    })
}

/// Signs a token for `user_id`, persists its hash as a session and returns the raw token.
pub async fn start_session(
    proxy: &DatabaseProxy,
    user_id: &str,
) -> Result<(String, NaiveDateTime), AuthError> {
    let (token, expires_at) = sign_jwt_for_user(user_id)?;

    sqlx::query(
        r#"
        INSERT INTO "sessions" ("id", "userId", "token", "expiresAt")
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(hash_token(&token))
    .bind(expires_at)
    .execute(proxy.pool())
    .await?;

    Ok((token, expires_at))
}

pub async fn end_session(proxy: &DatabaseProxy, token: &str) -> Result<(), AuthError> {
    sqlx::query(r#"DELETE FROM "sessions" WHERE "token" = $1"#)
        .bind(hash_token(token))
        .execute(proxy.pool())
        .await?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct JwtClaims {
    user_id: String,
}

fn jwt_secret() -> Result<String, AuthError> {
    std::env::var("JWT_SECRET")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or(AuthError::MissingSecret)
}

fn verify_jwt_hs256(token: &str, secret: &str, now: i64) -> Result<JwtClaims, AuthError> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(AuthError::InvalidToken)?;
    let payload_b64 = parts.next().ok_or(AuthError::InvalidToken)?;
    let sig_b64 = parts.next().ok_or(AuthError::InvalidToken)?;
    if parts.next().is_some() {
        return Err(AuthError::InvalidToken);
    }

    let header_bytes = URL_SAFE_NO_PAD
        .decode(header_b64.as_bytes())
        .map_err(|_| AuthError::InvalidToken)?;
    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload_b64.as_bytes())
        .map_err(|_| AuthError::InvalidToken)?;
    let sig_bytes = URL_SAFE_NO_PAD
        .decode(sig_b64.as_bytes())
        .map_err(|_| AuthError::InvalidToken)?;

    let header_json: serde_json::Value =
        serde_json::from_slice(&header_bytes).map_err(|_| AuthError::InvalidToken)?;
    if header_json.get("alg").and_then(|value| value.as_str()) != Some("HS256") {
        return Err(AuthError::InvalidToken);
    }

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::InvalidToken)?;
    mac.update(format!("{header_b64}.{payload_b64}").as_bytes());
    mac.verify_slice(&sig_bytes)
        .map_err(|_| AuthError::InvalidToken)?;

    let payload: serde_json::Value =
        serde_json::from_slice(&payload_bytes).map_err(|_| AuthError::InvalidToken)?;

    if let Some(exp) = payload.get("exp").and_then(|value| value.as_i64()) {
        if now >= exp {
            return Err(AuthError::Expired);
        }
    }
    if let Some(nbf) = payload.get("nbf").and_then(|value| value.as_i64()) {
        if now < nbf {
            return Err(AuthError::InvalidToken);
        }
    }

    let user_id = payload
        .get("userId")
        .and_then(|value| value.as_str())
        .ok_or(AuthError::InvalidToken)?
        .to_string();

    Ok(JwtClaims { user_id })
}

const DEFAULT_EXPIRES_IN: &str = "24h";
const DEFAULT_EXPIRES_IN_MS: i64 = 24 * 60 * 60 * 1000;

pub fn sign_jwt_for_user(user_id: &str) -> Result<(String, NaiveDateTime), AuthError> {
    let secret = jwt_secret()?;
    let expires_in_ms = std::env::var("JWT_EXPIRES_IN")
        .map(|value| expires_in_ms_or_default(&value))
        .unwrap_or(DEFAULT_EXPIRES_IN_MS);
    sign_jwt(user_id, &secret, expires_in_ms, Utc::now())
}

fn sign_jwt(
    user_id: &str,
    secret: &str,
    expires_in_ms: i64,
    issued_at: DateTime<Utc>,
) -> Result<(String, NaiveDateTime), AuthError> {
    let exp = issued_at
        .checked_add_signed(chrono::Duration::milliseconds(expires_in_ms))
        .ok_or(AuthError::InvalidExpiresIn)?;

    let header_json = serde_json::json!({ "alg": "HS256", "typ": "JWT" });
    let payload_json = serde_json::json!({
        "userId": user_id,
        "iat": issued_at.timestamp(),
        "exp": exp.timestamp(),
    });

    let header_b64 = URL_SAFE_NO_PAD
        .encode(serde_json::to_vec(&header_json).map_err(|_| AuthError::InvalidToken)?);
    let payload_b64 = URL_SAFE_NO_PAD
        .encode(serde_json::to_vec(&payload_json).map_err(|_| AuthError::InvalidToken)?);
    let signing_input = format!("{header_b64}.{payload_b64}");

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::InvalidToken)?;
    mac.update(signing_input.as_bytes());
    let sig_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok((format!("{signing_input}.{sig_b64}"), exp.naive_utc()))
}

pub fn parse_expires_in_ms(value: &str) -> Result<i64, AuthError> {
    let trimmed = value.trim();
    if trimmed.len() < 2 {
        return Err(AuthError::InvalidExpiresIn);
    }

    let (digits, unit) = trimmed.split_at(trimmed.len() - 1);
    let amount: i64 = digits.parse().map_err(|_| AuthError::InvalidExpiresIn)?;
    if amount <= 0 {
        return Err(AuthError::InvalidExpiresIn);
    }

    let unit_ms: i64 = match unit {
        "s" => 1000,
        "m" => 60 * 1000,
        "h" => 60 * 60 * 1000,
        "d" => 24 * 60 * 60 * 1000,
        _ => return Err(AuthError::InvalidExpiresIn),
    };
    amount
        .checked_mul(unit_ms)
        .ok_or(AuthError::InvalidExpiresIn)
}

/// Unparseable or overflowing `JWT_EXPIRES_IN` values fall back to 24 hours.
fn expires_in_ms_or_default(value: &str) -> i64 {
    parse_expires_in_ms(value).unwrap_or_else(|_| {
        tracing::warn!(value, "invalid JWT_EXPIRES_IN, using {DEFAULT_EXPIRES_IN}");
        DEFAULT_EXPIRES_IN_MS
    })
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    Ok(bcrypt::hash(password, BCRYPT_COST)?)
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

pub fn auth_cookie_header(token: &str, expires_at: NaiveDateTime) -> Option<HeaderValue> {
    let max_age = (expires_at - Utc::now().naive_utc()).num_seconds().max(0);
    HeaderValue::from_str(&format!(
        "{AUTH_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}"
    ))
    .ok()
}

pub fn clear_auth_cookie_header() -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{AUTH_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"
    ))
    .ok()
}

pub fn format_naive_datetime_iso_millis(value: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(value, Utc)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn format_optional_datetime(value: Option<NaiveDateTime>) -> Option<String> {
    value.map(format_naive_datetime_iso_millis)
}

pub fn format_date(value: NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}

fn get_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|part| {
        let (key, value) = part.trim().split_once('=')?;
        (key == name && !value.is_empty()).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn signed_token_verifies_with_same_secret() {
        let now = Utc::now();
        let (token, _) = sign_jwt("user-1", SECRET, 60_000, now).unwrap();
        let claims = verify_jwt_hs256(&token, SECRET, now.timestamp()).unwrap();
        assert_eq!(claims.user_id, "user-1");
    }

    #[test]
    fn token_with_other_secret_is_rejected() {
        let now = Utc::now();
        let (token, _) = sign_jwt("user-1", SECRET, 60_000, now).unwrap();
        let result = verify_jwt_hs256(&token, "another-secret", now.timestamp());
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let issued = Utc::now() - chrono::Duration::hours(2);
        let (token, _) = sign_jwt("user-1", SECRET, 1_000, issued).unwrap();
        let result = verify_jwt_hs256(&token, SECRET, Utc::now().timestamp());
        assert!(matches!(result, Err(AuthError::Expired)));
    }

    #[test]
    fn malformed_token_is_rejected() {
        assert!(verify_jwt_hs256("abc", SECRET, 0).is_err());
        assert!(verify_jwt_hs256("a.b.c.d", SECRET, 0).is_err());
    }

    #[test]
    fn parse_expires_in_units() {
        assert_eq!(parse_expires_in_ms("30s").unwrap(), 30_000);
        assert_eq!(parse_expires_in_ms("5m").unwrap(), 300_000);
        assert_eq!(parse_expires_in_ms("24h").unwrap(), 86_400_000);
        assert_eq!(parse_expires_in_ms("7d").unwrap(), 604_800_000);
        assert!(parse_expires_in_ms("0h").is_err());
        assert!(parse_expires_in_ms("h").is_err());
        assert!(parse_expires_in_ms("10w").is_err());
    }

    #[test]
    fn oversized_expires_in_falls_back_to_default() {
        assert!(parse_expires_in_ms("9999999999999999d").is_err());
        assert_eq!(expires_in_ms_or_default("9999999999999999d"), DEFAULT_EXPIRES_IN_MS);
        assert_eq!(expires_in_ms_or_default("soon"), DEFAULT_EXPIRES_IN_MS);
        assert_eq!(expires_in_ms_or_default("2h"), 7_200_000);
    }

    #[test]
    fn token_prefers_cookie_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; auth_token=from-cookie"),
        );
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer from-header"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn bearer_token_is_extracted() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("abc.def.ghi"));

        let empty = HeaderMap::new();
        assert_eq!(extract_token(&empty), None);
    }

    #[test]
    fn token_hash_is_stable_hex() {
        let first = hash_token("token");
        assert_eq!(first, hash_token("token"));
        assert_eq!(first.len(), 64);
    }
}
