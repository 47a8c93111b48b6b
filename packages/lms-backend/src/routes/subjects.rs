use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::db::operations::content;
use crate::response::{created, ok, AppError};
use crate::services::access::require_admin;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_subjects).post(create_subject))
}

#[derive(Debug, Deserialize)]
struct CreateSubjectRequest {
    name: String,
    code: String,
    #[serde(default)]
    description: String,
}

async fn list_subjects(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;
    Ok(ok(content::list_subjects(&proxy).await?))
}

async fn create_subject(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateSubjectRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&user)?;
    let name = payload.name.trim();
    let code = payload.code.trim().to_uppercase();
    if name.is_empty() || name.chars().count() > 100 {
        return Err(AppError::validation("Subject name must be 1-100 characters"));
    }
    if code.is_empty() || code.chars().count() > 20 {
        return Err(AppError::validation("Subject code must be 1-20 characters"));
    }

    let proxy = state.require_db()?;
    let subject =
        content::create_subject(&proxy, name, &code, payload.description.trim(), &user.id).await?;
    tracing::info!(subject_id = %subject.id, code = %subject.code, "subject created");
    Ok(created(subject))
}
