use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Router};
use serde::Serialize;

use crate::auth::AuthUser;
use crate::db::operations::analytics::{self as stats, Progress};
use crate::db::operations::assessments::{self, Assignment, Submission, SubmissionFilter};
use crate::db::operations::content::{self, Course, CourseFilter};
use crate::models::{Role, SubmissionStatus};
use crate::response::{ok, AppError};
use crate::state::AppState;

const STUDENT_PENDING_LIMIT: i64 = 5;
const STUDENT_PROGRESS_LIMIT: i64 = 5;
const TEACHER_REVIEW_LIMIT: i64 = 10;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(dashboard))
}

#[derive(Serialize)]
#[serde(tag = "role", rename_all = "SCREAMING_SNAKE_CASE")]
enum Dashboard {
    #[serde(rename_all = "camelCase")]
    Student {
        enrolled_courses: Vec<Course>,
        pending_assignments: Vec<Assignment>,
        pending_count: i64,
        recent_progress: Vec<Progress>,
    },
    #[serde(rename_all = "camelCase")]
    Teacher {
        courses: Vec<Course>,
        pending_submissions: Vec<Submission>,
        pending_count: i64,
    },
    #[serde(rename_all = "camelCase")]
    Admin {
        total_students: i64,
        total_teachers: i64,
        total_courses: i64,
    },
}

async fn dashboard(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;

    let view = match user.role {
        Role::Student => {
            let enrolled_courses = content::list_courses(
                &proxy,
                &CourseFilter {
                    enrolled_student_id: Some(user.id.clone()),
                    ..CourseFilter::default()
                },
            )
            .await?;
            let (pending_assignments, pending_count) =
                assessments::pending_assignments(&proxy, &user.id, STUDENT_PENDING_LIMIT).await?;
            let recent_progress =
                stats::recent_progress(&proxy, &user.id, STUDENT_PROGRESS_LIMIT).await?;
            Dashboard::Student {
                enrolled_courses,
                pending_assignments,
                pending_count,
                recent_progress,
            }
        }
        Role::Teacher => {
            let courses = content::list_courses(
                &proxy,
                &CourseFilter {
                    teacher_id: Some(user.id.clone()),
                    ..CourseFilter::default()
                },
            )
            .await?;
            let pending_submissions = assessments::list_submissions(
                &proxy,
                &SubmissionFilter {
                    teacher_id: Some(user.id.clone()),
                    status: Some(SubmissionStatus::Submitted),
                    limit: Some(TEACHER_REVIEW_LIMIT),
                    ..SubmissionFilter::default()
                },
            )
            .await?;
            let pending_count =
                assessments::count_submissions(&proxy, &user.id, SubmissionStatus::Submitted)
                    .await?;
            Dashboard::Teacher {
                courses,
                pending_submissions,
                pending_count,
            }
        }
        Role::Admin => {
            let (total_students, total_teachers, total_courses) =
                stats::role_totals(&proxy).await?;
            Dashboard::Admin {
                total_students,
                total_teachers,
                total_courses,
            }
        }
    };

    Ok(ok(view))
}
