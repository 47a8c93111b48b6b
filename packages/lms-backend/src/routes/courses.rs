use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};

use super::{feedback, materials};
use crate::auth::AuthUser;
use crate::db::operations::analytics::{self as progress_ops, Progress};
use crate::db::operations::assessments::{self, Assignment};
use crate::db::operations::content::{self, Course, CourseFilter, CourseUpdate, Material, NewCourse};
use crate::db::operations::user;
use crate::models::{ActivityType, Role};
use crate::response::{created, message, ok, AppError};
use crate::services::access::{can_manage_course, ensure_course_manager, require_role, require_student};
use crate::state::AppState;

const TITLE_MAX: usize = 200;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_courses).post(create_course))
        .route("/:id", get(course_detail).put(update_course))
        .route("/:id/enroll", post(enroll))
        .route("/:id/materials", post(materials::create_for_course))
        .route("/:id/survey", post(feedback::submit_survey))
}

#[derive(Debug, Deserialize)]
struct CourseListQuery {
    search: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CourseListResponse {
    courses: Vec<Course>,
    #[serde(skip_serializing_if = "Option::is_none")]
    enrolled_course_ids: Option<Vec<String>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CourseDetailResponse {
    course: Course,
    materials: Vec<Material>,
    assignments: Vec<Assignment>,
    is_enrolled: bool,
    progress: Option<Progress>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCourseRequest {
    title: String,
    subject_id: String,
    #[serde(default)]
    description: String,
    teacher_id: Option<String>,
    thumbnail_url: Option<String>,
    is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateCourseRequest {
    title: Option<String>,
    subject_id: Option<String>,
    description: Option<String>,
    thumbnail_url: Option<String>,
    is_active: Option<bool>,
}

fn validate_title(title: &str) -> Result<(), AppError> {
    let len = title.trim().chars().count();
    if len == 0 || len > TITLE_MAX {
        return Err(AppError::validation("Title must be 1-200 characters"));
    }
    Ok(())
}

async fn list_courses(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<CourseListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;
    let search = query
        .search
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let response = match user.role {
        Role::Student => CourseListResponse {
            courses: content::list_courses(
                &proxy,
                &CourseFilter {
                    active_only: true,
                    search,
                    ..CourseFilter::default()
                },
            )
            .await?,
            enrolled_course_ids: Some(content::enrolled_course_ids(&proxy, &user.id).await?),
        },
        Role::Teacher => CourseListResponse {
            courses: content::list_courses(
                &proxy,
                &CourseFilter {
                    teacher_id: Some(user.id.clone()),
                    search,
                    ..CourseFilter::default()
                },
            )
            .await?,
            enrolled_course_ids: None,
        },
        Role::Admin => CourseListResponse {
            courses: content::list_courses(
                &proxy,
                &CourseFilter {
                    search,
                    ..CourseFilter::default()
                },
            )
            .await?,
            enrolled_course_ids: None,
        },
    };
    Ok(ok(response))
}

async fn course_detail(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;
    let course = content::get_course(&proxy, &course_id)
        .await?
        .ok_or_else(|| AppError::not_found("Course not found"))?;

    let is_enrolled = user.is_student() && content::is_enrolled(&proxy, &course_id, &user.id).await?;
    if user.is_student() && !course.is_active && !is_enrolled {
        return Err(AppError::not_found("Course not found"));
    }

    let manager = can_manage_course(&user, course.teacher_id.as_deref());
    let materials = content::list_materials(&proxy, &course_id).await?;
    let assignments = assessments::list_course_assignments(&proxy, &course_id, !manager).await?;
    let progress = if is_enrolled {
        Some(progress_ops::get_or_create_progress(&proxy, &user.id, &course_id).await?)
    } else {
        None
    };

    Ok(ok(CourseDetailResponse {
        course,
        materials,
        assignments,
        is_enrolled,
        progress,
    }))
}

async fn create_course(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_role(&auth, &[Role::Teacher, Role::Admin])?;
    validate_title(&payload.title)?;
    let proxy = state.require_db()?;

    if !content::subject_exists(&proxy, &payload.subject_id).await? {
        return Err(AppError::validation("Subject does not exist"));
    }

    let teacher_id = if auth.is_teacher() {
        Some(auth.id.clone())
    } else {
        match payload.teacher_id.filter(|id| !id.trim().is_empty()) {
            Some(id) => {
                let teacher = user::find_user_by_id(&proxy, &id).await?;
                if !teacher.is_some_and(|t| t.role == Role::Teacher) {
                    return Err(AppError::validation("teacherId must reference a teacher"));
                }
                Some(id)
            }
            None => None,
        }
    };

    let course_id = content::create_course(
        &proxy,
        &NewCourse {
            title: payload.title.trim().to_string(),
            subject_id: payload.subject_id,
            description: payload.description,
            teacher_id,
            thumbnail_url: payload.thumbnail_url,
            is_active: payload.is_active.unwrap_or(true),
        },
    )
    .await?;
    tracing::info!(course_id = %course_id, created_by = %auth.id, "course created");

    let course = content::get_course(&proxy, &course_id)
        .await?
        .ok_or_else(|| AppError::internal("created course vanished"))?;
    Ok(created(course))
}

async fn update_course(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<String>,
    Json(payload): Json<UpdateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(title) = &payload.title {
        validate_title(title)?;
    }
    let proxy = state.require_db()?;
    let teacher_id = content::course_teacher_id(&proxy, &course_id)
        .await?
        .ok_or_else(|| AppError::not_found("Course not found"))?;
    ensure_course_manager(&user, teacher_id.as_deref())?;

    if let Some(subject_id) = &payload.subject_id {
        if !content::subject_exists(&proxy, subject_id).await? {
            return Err(AppError::validation("Subject does not exist"));
        }
    }

    content::update_course(
        &proxy,
        &course_id,
        &CourseUpdate {
            title: payload.title.map(|t| t.trim().to_string()),
            subject_id: payload.subject_id,
            description: payload.description,
            thumbnail_url: payload.thumbnail_url,
            is_active: payload.is_active,
        },
    )
    .await?;

    let course = content::get_course(&proxy, &course_id)
        .await?
        .ok_or_else(|| AppError::not_found("Course not found"))?;
    Ok(ok(course))
}

async fn enroll(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    require_student(&user)?;
    let proxy = state.require_db()?;
    let course = content::get_course(&proxy, &course_id)
        .await?
        .filter(|c| c.is_active)
        .ok_or_else(|| AppError::not_found("Course not found"))?;

    if !content::enroll_student(&proxy, &course_id, &user.id).await? {
        return Err(AppError::conflict("Already enrolled in this course"));
    }

    progress_ops::log_activity_best_effort(
        &proxy,
        &user.id,
        Some(&course_id),
        ActivityType::MaterialView,
        &format!("Enrolled in {}", course.title),
    )
    .await;
    tracing::info!(course_id = %course_id, student_id = %user.id, "student enrolled");

    Ok(message(format!("Enrolled in {}", course.title)))
}
