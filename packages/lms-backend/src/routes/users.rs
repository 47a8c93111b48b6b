use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Extension, Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::auth::validate_password;
use crate::auth::{self as session, AuthUser};
use crate::db::operations::user::{self, Profile, ProfileUpdate, User};
use crate::models::Role;
use crate::response::{message, ok, AppError};
use crate::services::access::require_admin;
use crate::state::AppState;

const PHONE_MAX: usize = 15;
const BIO_MAX: usize = 500;
const NAME_MAX: usize = 50;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/me", get(me).put(update_me))
        .route("/me/password", put(change_password))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MeResponse {
    user: User,
    profile: Option<Profile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileRequest {
    first_name: Option<String>,
    last_name: Option<String>,
    phone_number: Option<String>,
    date_of_birth: Option<NaiveDate>,
    bio: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordRequest {
    old_password: String,
    new_password: String,
}

#[derive(Debug, Deserialize)]
struct ListUsersQuery {
    role: Option<String>,
}

fn too_long(value: &Option<String>, max: usize) -> bool {
    value.as_ref().is_some_and(|v| v.chars().count() > max)
}

fn profile_update(payload: UpdateProfileRequest) -> Result<ProfileUpdate, AppError> {
    if too_long(&payload.first_name, NAME_MAX) || too_long(&payload.last_name, NAME_MAX) {
        return Err(AppError::validation("Names must be at most 50 characters"));
    }
    if too_long(&payload.phone_number, PHONE_MAX) {
        return Err(AppError::validation("Phone number must be at most 15 characters"));
    }
    if too_long(&payload.bio, BIO_MAX) {
        return Err(AppError::validation("Bio must be at most 500 characters"));
    }
    Ok(ProfileUpdate {
        first_name: payload.first_name.map(|v| v.trim().to_string()),
        last_name: payload.last_name.map(|v| v.trim().to_string()),
        phone_number: payload.phone_number.map(|v| v.trim().to_string()),
        date_of_birth: payload.date_of_birth,
        bio: payload.bio,
    })
}

async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;
    let found = user::find_user_by_id(&proxy, &auth.id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    let profile = user::get_profile(&proxy, &auth.id, auth.role).await?;
    Ok(ok(MeResponse { user: found, profile }))
}

async fn update_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let update = profile_update(payload)?;
    let proxy = state.require_db()?;
    let updated = user::update_profile(&proxy, &auth.id, &update)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(ok(updated))
}

async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    headers: HeaderMap,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_password(&payload.new_password).map_err(AppError::validation)?;
    let proxy = state.require_db()?;

    let hash = user::get_password_hash(&proxy, &auth.id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    if !session::verify_password(&payload.old_password, &hash) {
        return Err(AppError::bad_request("Current password is incorrect"));
    }

    let new_hash = session::hash_password(&payload.new_password)?;
    let current = session::extract_token(&headers).map(|t| session::hash_token(&t));
    user::update_password(&proxy, &auth.id, &new_hash, current.as_deref()).await?;
    tracing::info!(user_id = %auth.id, "password changed");

    Ok(message("Password updated"))
}

async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<ListUsersQuery>,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&auth)?;
    let role = match query.role.as_deref().filter(|r| !r.trim().is_empty()) {
        Some(raw) => Some(Role::parse(raw).ok_or_else(|| AppError::validation("Unknown role"))?),
        None => None,
    };
    let proxy = state.require_db()?;
    Ok(ok(user::list_users(&proxy, role).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> UpdateProfileRequest {
        UpdateProfileRequest {
            first_name: None,
            last_name: None,
            phone_number: None,
            date_of_birth: None,
            bio: None,
        }
    }

    #[test]
    fn rejects_long_phone_and_bio() {
        let mut payload = request();
        payload.phone_number = Some("1".repeat(16));
        assert!(profile_update(payload).is_err());

        let mut payload = request();
        payload.bio = Some("x".repeat(501));
        assert!(profile_update(payload).is_err());
    }

    #[test]
    fn trims_names() {
        let mut payload = request();
        payload.first_name = Some("  Ada ".into());
        let update = profile_update(payload).unwrap();
        assert_eq!(update.first_name.as_deref(), Some("Ada"));
        assert!(update.last_name.is_none());
    }
}
