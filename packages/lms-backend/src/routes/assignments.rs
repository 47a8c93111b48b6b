use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::db::operations::analytics::log_activity_best_effort;
use crate::db::operations::assessments::{
    self, Assignment, AssignmentScope, AssignmentUpdate, NewAssignment, Submission,
};
use crate::db::operations::content;
use crate::models::{ActivityType, AssignmentStatus, Role};
use crate::response::{created, message, ok, AppError};
use crate::services::access::{
    can_manage_course, ensure_course_manager, require_student, require_teacher, teaches,
};
use crate::state::AppState;

const DEFAULT_MAX_SCORE: i32 = 100;
const DEFAULT_DUE_DAYS: i64 = 7;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_assignments).post(create_assignment))
        .route(
            "/:id",
            get(assignment_detail)
                .put(update_assignment)
                .delete(delete_assignment),
        )
        .route("/:id/submit", post(submit_assignment))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateAssignmentRequest {
    course_id: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    instructions: String,
    max_score: Option<i32>,
    due_date: Option<DateTime<Utc>>,
    status: Option<String>,
    attachment_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateAssignmentRequest {
    title: Option<String>,
    description: Option<String>,
    instructions: Option<String>,
    max_score: Option<i32>,
    due_date: Option<DateTime<Utc>>,
    status: Option<String>,
    attachment_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRequest {
    content: String,
    file_url: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AssignmentDetailResponse {
    assignment: Assignment,
    #[serde(skip_serializing_if = "Option::is_none")]
    my_submission: Option<Submission>,
    #[serde(skip_serializing_if = "Option::is_none")]
    submissions: Option<Vec<Submission>>,
}

fn parse_status(raw: &str) -> Result<AssignmentStatus, AppError> {
    AssignmentStatus::parse(raw)
        .ok_or_else(|| AppError::validation("status must be DRAFT, PUBLISHED or CLOSED"))
}

fn validate_max_score(max_score: i32) -> Result<(), AppError> {
    if max_score < 1 {
        return Err(AppError::validation("maxScore must be at least 1"));
    }
    Ok(())
}

/// Existing grades must stay within the new maximum so percentages never pass 100.
fn validate_max_score_covers_grades(max_score: i32, highest_grade: Option<f64>) -> Result<(), AppError> {
    match highest_grade {
        Some(grade) if grade > f64::from(max_score) => Err(AppError::validation(format!(
            "maxScore cannot be lower than an existing grade ({grade})"
        ))),
        _ => Ok(()),
    }
}

fn validate_title(title: &str) -> Result<(), AppError> {
    let len = title.trim().chars().count();
    if len == 0 || len > 200 {
        return Err(AppError::validation("Title must be 1-200 characters"));
    }
    Ok(())
}

async fn list_assignments(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;
    let scope = match user.role {
        Role::Student => AssignmentScope::Student(user.id.clone()),
        Role::Teacher => AssignmentScope::Teacher(user.id.clone()),
        Role::Admin => AssignmentScope::All,
    };
    Ok(ok(assessments::list_assignments(&proxy, &scope).await?))
}

async fn create_assignment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateAssignmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_teacher(&user)?;
    validate_title(&payload.title)?;
    let max_score = payload.max_score.unwrap_or(DEFAULT_MAX_SCORE);
    validate_max_score(max_score)?;
    let status = payload
        .status
        .as_deref()
        .map(parse_status)
        .transpose()?
        .unwrap_or(AssignmentStatus::Draft);

    let proxy = state.require_db()?;
    let teacher_id = content::course_teacher_id(&proxy, &payload.course_id)
        .await?
        .ok_or_else(|| AppError::not_found("Course not found"))?;
    if !teaches(&user, teacher_id.as_deref()) {
        return Err(AppError::forbidden("You can only create assignments for your own courses"));
    }

    let due_date = payload
        .due_date
        .map(|d| d.naive_utc())
        .unwrap_or_else(|| (Utc::now() + Duration::days(DEFAULT_DUE_DAYS)).naive_utc());

    let assignment_id = assessments::create_assignment(
        &proxy,
        &NewAssignment {
            course_id: payload.course_id,
            title: payload.title.trim().to_string(),
            description: payload.description,
            instructions: payload.instructions,
            max_score,
            due_date,
            status,
            attachment_url: payload.attachment_url,
            created_by: user.id.clone(),
        },
    )
    .await?;
    tracing::info!(assignment_id = %assignment_id, status = status.as_str(), "assignment created");

    let assignment = assessments::get_assignment(&proxy, &assignment_id)
        .await?
        .ok_or_else(|| AppError::internal("created assignment vanished"))?;
    Ok(created(assignment))
}

async fn assignment_detail(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(assignment_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;
    let assignment = assessments::get_assignment(&proxy, &assignment_id)
        .await?
        .ok_or_else(|| AppError::not_found("Assignment not found"))?;

    if user.is_student() {
        if assignment.status != AssignmentStatus::Published {
            return Err(AppError::not_found("Assignment not found"));
        }
        if !content::is_enrolled(&proxy, &assignment.course_id, &user.id).await? {
            return Err(AppError::forbidden("Enroll in the course to view this assignment"));
        }
        let my_submission =
            assessments::find_student_submission(&proxy, &assignment_id, &user.id).await?;
        return Ok(ok(AssignmentDetailResponse {
            assignment,
            my_submission,
            submissions: None,
        }));
    }

    if !can_manage_course(&user, assignment.course_teacher_id.as_deref()) {
        return Err(AppError::forbidden("Only the course teacher or an admin can view this assignment"));
    }
    let submissions = assessments::list_assignment_submissions(&proxy, &assignment_id).await?;
    Ok(ok(AssignmentDetailResponse {
        assignment,
        my_submission: None,
        submissions: Some(submissions),
    }))
}

async fn update_assignment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(assignment_id): Path<String>,
    Json(payload): Json<UpdateAssignmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(title) = &payload.title {
        validate_title(title)?;
    }
    if let Some(max_score) = payload.max_score {
        validate_max_score(max_score)?;
    }
    let status = payload.status.as_deref().map(parse_status).transpose()?;

    let proxy = state.require_db()?;
    let existing = assessments::get_assignment(&proxy, &assignment_id)
        .await?
        .ok_or_else(|| AppError::not_found("Assignment not found"))?;
    ensure_course_manager(&user, existing.course_teacher_id.as_deref())?;
    if let Some(max_score) = payload.max_score {
        if max_score < existing.max_score {
            let highest = assessments::highest_grade(&proxy, &assignment_id).await?;
            validate_max_score_covers_grades(max_score, highest)?;
        }
    }

    assessments::update_assignment(
        &proxy,
        &assignment_id,
        &AssignmentUpdate {
            title: payload.title.map(|t| t.trim().to_string()),
            description: payload.description,
            instructions: payload.instructions,
            max_score: payload.max_score,
            due_date: payload.due_date.map(|d| d.naive_utc()),
            status,
            attachment_url: payload.attachment_url,
        },
    )
    .await?;

    let assignment = assessments::get_assignment(&proxy, &assignment_id)
        .await?
        .ok_or_else(|| AppError::not_found("Assignment not found"))?;
    Ok(ok(assignment))
}

async fn delete_assignment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(assignment_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;
    let existing = assessments::get_assignment(&proxy, &assignment_id)
        .await?
        .ok_or_else(|| AppError::not_found("Assignment not found"))?;
    ensure_course_manager(&user, existing.course_teacher_id.as_deref())?;

    assessments::delete_assignment(&proxy, &assignment_id).await?;
    tracing::info!(assignment_id = %assignment_id, deleted_by = %user.id, "assignment deleted");
    Ok(message("Assignment deleted"))
}

async fn submit_assignment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(assignment_id): Path<String>,
    Json(payload): Json<SubmitRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_student(&user)?;
    let submission_content = payload.content.trim();
    if submission_content.is_empty() {
        return Err(AppError::validation("Submission content is required"));
    }

    let proxy = state.require_db()?;
    let assignment = assessments::get_assignment(&proxy, &assignment_id)
        .await?
        .ok_or_else(|| AppError::not_found("Assignment not found"))?;
    if !content::is_enrolled(&proxy, &assignment.course_id, &user.id).await? {
        return Err(AppError::forbidden("Enroll in the course to submit this assignment"));
    }
    if !assignment.status.accepts_submissions() {
        return Err(AppError::bad_request("This assignment is not accepting submissions"));
    }

    let submission_id = assessments::create_submission(
        &proxy,
        &assignment_id,
        &user.id,
        submission_content,
        payload.file_url.as_deref(),
    )
    .await?
    .ok_or_else(|| AppError::conflict("You have already submitted this assignment"))?;

    log_activity_best_effort(
        &proxy,
        &user.id,
        Some(&assignment.course_id),
        ActivityType::AssignmentSubmit,
        &format!("Submitted: {}", assignment.title),
    )
    .await;

    let submission = assessments::get_submission(&proxy, &submission_id)
        .await?
        .ok_or_else(|| AppError::internal("created submission vanished"))?;
    if submission.is_late {
        tracing::info!(submission_id = %submission.id, "late submission accepted");
    }
    Ok(created(submission))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_score_must_be_positive() {
        assert!(validate_max_score(1).is_ok());
        assert!(validate_max_score(0).is_err());
    }

    #[test]
    fn lowering_max_score_below_a_grade_is_rejected() {
        assert!(validate_max_score_covers_grades(50, None).is_ok());
        assert!(validate_max_score_covers_grades(50, Some(50.0)).is_ok());
        assert!(validate_max_score_covers_grades(50, Some(40.0)).is_ok());
        let err = validate_max_score_covers_grades(50, Some(90.0)).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }
}
