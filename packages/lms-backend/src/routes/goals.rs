use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::db::operations::analytics::log_activity_best_effort;
use crate::db::operations::content::{self, Goal};
use crate::models::ActivityType;
use crate::response::{created, ok, AppError};
use crate::services::access::require_student;
use crate::services::assistant::truncate_chars;
use crate::state::AppState;

const GOAL_PREVIEW_CHARS: usize = 50;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_goals).post(create_goal))
        .route("/:id/complete", post(complete_goal))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateGoalRequest {
    course_id: String,
    goal_text: String,
    target_date: NaiveDate,
}

#[derive(Serialize)]
struct GoalsResponse {
    active: Vec<Goal>,
    completed: Vec<Goal>,
}

async fn list_goals(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    require_student(&user)?;
    let proxy = state.require_db()?;
    let (completed, active): (Vec<Goal>, Vec<Goal>) = content::list_goals(&proxy, &user.id)
        .await?
        .into_iter()
        .partition(|goal| goal.is_completed);
    Ok(ok(GoalsResponse { active, completed }))
}

async fn create_goal(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateGoalRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_student(&user)?;
    let goal_text = payload.goal_text.trim();
    if goal_text.is_empty() {
        return Err(AppError::validation("Goal text is required"));
    }

    let proxy = state.require_db()?;
    if !content::is_enrolled(&proxy, &payload.course_id, &user.id).await? {
        return Err(AppError::forbidden("You can only set goals for courses you are enrolled in"));
    }

    let goal_id =
        content::create_goal(&proxy, &user.id, &payload.course_id, goal_text, payload.target_date)
            .await?;
    log_activity_best_effort(
        &proxy,
        &user.id,
        Some(&payload.course_id),
        ActivityType::GoalSet,
        &format!("Set goal: {}", truncate_chars(goal_text, GOAL_PREVIEW_CHARS)),
    )
    .await;

    let goal = content::get_goal(&proxy, &goal_id)
        .await?
        .ok_or_else(|| AppError::internal("created goal vanished"))?;
    Ok(created(goal))
}

async fn complete_goal(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(goal_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    require_student(&user)?;
    let proxy = state.require_db()?;
    let goal = content::get_goal(&proxy, &goal_id)
        .await?
        .filter(|g| g.student_id == user.id)
        .ok_or_else(|| AppError::not_found("Goal not found"))?;
    if goal.is_completed {
        return Err(AppError::conflict("Goal already completed"));
    }

    content::complete_goal(&proxy, &goal_id, Utc::now().date_naive()).await?;
    log_activity_best_effort(
        &proxy,
        &user.id,
        Some(&goal.course_id),
        ActivityType::GoalComplete,
        &format!("Completed goal: {}", truncate_chars(&goal.goal_text, GOAL_PREVIEW_CHARS)),
    )
    .await;

    let goal = content::get_goal(&proxy, &goal_id)
        .await?
        .ok_or_else(|| AppError::not_found("Goal not found"))?;
    Ok(ok(goal))
}
