use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::db::operations::content;
use crate::db::operations::feedback::{self, NewSurvey, Survey, SurveySummary};
use crate::models::{FeedbackStatus, FeedbackType, Role};
use crate::response::{created, ok, AppError};
use crate::services::access::{require_admin, require_student};
use crate::state::AppState;

const SUBJECT_MAX: usize = 200;
const MESSAGE_MAX: usize = 5000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_feedback).post(create_feedback))
        .route("/mine", get(my_feedback))
        .route("/:id/review", put(review_feedback))
}

pub fn survey_router() -> Router<AppState> {
    Router::new().route("/", get(list_surveys))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateFeedbackRequest {
    feedback_type: String,
    subject: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct StatusQuery {
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewRequest {
    status: String,
    admin_response: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyRequest {
    content_quality_rating: i16,
    ai_assistance_rating: i16,
    overall_satisfaction: i16,
    #[serde(default)]
    comments: String,
    would_recommend: bool,
}

#[derive(Serialize)]
struct SurveyList {
    surveys: Vec<Survey>,
    summary: SurveySummary,
}

fn parse_status(raw: &str) -> Result<FeedbackStatus, AppError> {
    FeedbackStatus::parse(raw)
        .ok_or_else(|| AppError::validation("status must be PENDING, REVIEWED or RESOLVED"))
}

pub fn validate_ratings(ratings: &[i16]) -> Result<(), AppError> {
    if ratings.iter().all(|r| (1..=5).contains(r)) {
        Ok(())
    } else {
        Err(AppError::validation("Ratings must be between 1 and 5"))
    }
}

async fn create_feedback(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateFeedbackRequest>,
) -> Result<impl IntoResponse, AppError> {
    let feedback_type = FeedbackType::parse(&payload.feedback_type).ok_or_else(|| {
        AppError::validation("feedbackType must be BUG, FEATURE, GENERAL or AI_QUALITY")
    })?;
    let subject = payload.subject.trim();
    let body = payload.message.trim();
    if subject.is_empty() || subject.chars().count() > SUBJECT_MAX {
        return Err(AppError::validation("Subject must be 1-200 characters"));
    }
    if body.is_empty() || body.chars().count() > MESSAGE_MAX {
        return Err(AppError::validation("Message must be 1-5000 characters"));
    }

    let proxy = state.require_db()?;
    let stored = feedback::create_feedback(&proxy, &user.id, feedback_type, subject, body).await?;
    tracing::info!(feedback_id = %stored.id, kind = feedback_type.as_str(), "system feedback received");
    Ok(created(stored))
}

async fn my_feedback(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;
    Ok(ok(feedback::list_feedback_for_user(&proxy, &user.id).await?))
}

async fn list_feedback(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<StatusQuery>,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&user)?;
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(parse_status)
        .transpose()?;
    let proxy = state.require_db()?;
    Ok(ok(feedback::list_feedback(&proxy, status).await?))
}

async fn review_feedback(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(feedback_id): Path<String>,
    Json(payload): Json<ReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&user)?;
    let status = parse_status(&payload.status)?;
    let proxy = state.require_db()?;

    let reviewed = feedback::review_feedback(
        &proxy,
        &feedback_id,
        status,
        payload.admin_response.as_deref(),
        &user.id,
    )
    .await?
    .ok_or_else(|| AppError::not_found("Feedback not found"))?;
    Ok(ok(reviewed))
}

pub async fn submit_survey(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<String>,
    Json(payload): Json<SurveyRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_student(&user)?;
    validate_ratings(&[
        payload.content_quality_rating,
        payload.ai_assistance_rating,
        payload.overall_satisfaction,
    ])?;

    let proxy = state.require_db()?;
    if content::get_course(&proxy, &course_id).await?.is_none() {
        return Err(AppError::not_found("Course not found"));
    }
    if !content::is_enrolled(&proxy, &course_id, &user.id).await? {
        return Err(AppError::forbidden("Only enrolled students can rate this course"));
    }

    let survey_id = feedback::create_survey(
        &proxy,
        &course_id,
        &user.id,
        &NewSurvey {
            content_quality_rating: payload.content_quality_rating,
            ai_assistance_rating: payload.ai_assistance_rating,
            overall_satisfaction: payload.overall_satisfaction,
            comments: payload.comments.trim().to_string(),
            would_recommend: payload.would_recommend,
        },
    )
    .await?
    .ok_or_else(|| AppError::conflict("You have already submitted a survey for this course"))?;

    Ok(created(serde_json::json!({ "id": survey_id, "courseId": course_id })))
}

async fn list_surveys(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let teacher_filter = match user.role {
        Role::Admin => None,
        Role::Teacher => Some(user.id.as_str()),
        Role::Student => return Err(AppError::forbidden("Students cannot view survey results")),
    };
    let proxy = state.require_db()?;
    let surveys = feedback::list_surveys(&proxy, teacher_filter).await?;
    Ok(ok(SurveyList {
        summary: SurveySummary::from_surveys(&surveys),
        surveys,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratings_must_be_one_to_five() {
        assert!(validate_ratings(&[1, 3, 5]).is_ok());
        assert!(validate_ratings(&[0, 3, 5]).is_err());
        assert!(validate_ratings(&[1, 6, 5]).is_err());
    }
}
