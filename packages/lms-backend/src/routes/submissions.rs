use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::db::operations::assessments::{
    self, AiFeedback, Submission, SubmissionFilter, TeacherFeedback,
};
use crate::db::DatabaseProxy;
use crate::models::Role;
use crate::response::{ok, AppError};
use crate::services::access::{can_view_submission, ensure_course_manager, require_role};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_submissions))
        .route("/:id", get(submission_detail))
        .route("/:id/grade", post(grade_submission))
        .route(
            "/:id/ai-feedback",
            get(get_ai_feedback).post(generate_ai_feedback),
        )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GradeRequest {
    score: f64,
    feedback_text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmissionDetailResponse {
    submission: Submission,
    teacher_feedback: Vec<TeacherFeedback>,
    ai_feedback: Option<AiFeedback>,
}

pub fn validate_score(score: f64, max_score: i32) -> Result<(), AppError> {
    if !score.is_finite() || score < 0.0 || score > f64::from(max_score) {
        return Err(AppError::validation(format!(
            "Score must be between 0 and {max_score}"
        )));
    }
    Ok(())
}

/// Loads a submission the caller is allowed to see.
async fn visible_submission(
    proxy: &DatabaseProxy,
    user: &AuthUser,
    submission_id: &str,
) -> Result<Submission, AppError> {
    let submission = assessments::get_submission(proxy, submission_id)
        .await?
        .ok_or_else(|| AppError::not_found("Submission not found"))?;
    if !can_view_submission(user, &submission.student_id, submission.course_teacher_id.as_deref()) {
        return Err(AppError::forbidden("You cannot view this submission"));
    }
    Ok(submission)
}

async fn list_submissions(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    require_role(&user, &[Role::Teacher, Role::Admin])?;
    let proxy = state.require_db()?;
    let filter = SubmissionFilter {
        teacher_id: user.is_teacher().then(|| user.id.clone()),
        ..SubmissionFilter::default()
    };
    Ok(ok(assessments::list_submissions(&proxy, &filter).await?))
}

async fn submission_detail(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(submission_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;
    let submission = visible_submission(&proxy, &user, &submission_id).await?;
    let teacher_feedback = assessments::list_teacher_feedback(&proxy, &submission_id).await?;
    let ai_feedback = assessments::get_ai_feedback(&proxy, &submission_id).await?;
    Ok(ok(SubmissionDetailResponse {
        submission,
        teacher_feedback,
        ai_feedback,
    }))
}

async fn grade_submission(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(submission_id): Path<String>,
    Json(payload): Json<GradeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;
    let submission = assessments::get_submission(&proxy, &submission_id)
        .await?
        .ok_or_else(|| AppError::not_found("Submission not found"))?;
    ensure_course_manager(&user, submission.course_teacher_id.as_deref())?;
    validate_score(payload.score, submission.max_score)?;

    let feedback_text = payload
        .feedback_text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());
    assessments::grade_submission(&proxy, &submission_id, payload.score, &user.id, feedback_text)
        .await?;
    tracing::info!(submission_id = %submission_id, graded_by = %user.id, score = payload.score, "submission graded");

    let graded = assessments::get_submission(&proxy, &submission_id)
        .await?
        .ok_or_else(|| AppError::not_found("Submission not found"))?;
    Ok(ok(graded))
}

async fn get_ai_feedback(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(submission_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;
    visible_submission(&proxy, &user, &submission_id).await?;
    let feedback = assessments::get_ai_feedback(&proxy, &submission_id)
        .await?
        .ok_or_else(|| AppError::not_found("No AI feedback for this submission"))?;
    Ok(ok(feedback))
}

async fn generate_ai_feedback(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(submission_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;
    let submission = visible_submission(&proxy, &user, &submission_id).await?;

    if let Some(existing) = assessments::get_ai_feedback(&proxy, &submission_id).await? {
        return Ok((StatusCode::OK, ok(existing)));
    }

    let parsed = state
        .assistant()
        .feedback(&submission.assignment_description, &submission.content)
        .await?;
    let stored = assessments::save_ai_feedback(&proxy, &submission_id, &parsed).await?;
    tracing::info!(submission_id = %submission_id, "ai feedback generated");
    Ok((StatusCode::CREATED, ok(stored)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_bounds_are_inclusive() {
        assert!(validate_score(0.0, 100).is_ok());
        assert!(validate_score(100.0, 100).is_ok());
        assert!(validate_score(100.5, 100).is_err());
        assert!(validate_score(-1.0, 100).is_err());
        assert!(validate_score(f64::NAN, 100).is_err());
    }
}
