use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Router};
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::db::operations::analytics::{
    self as stats, Activity, ActivityFilter, CourseEnrollmentCount, DailyMetric, Progress,
    StudentCourseProgress, SystemCounts,
};
use crate::db::operations::assessments::{self, Assignment, Submission, SubmissionFilter};
use crate::db::operations::content::{self, CourseFilter, Material};
use crate::db::operations::user::{self, User};
use crate::models::{ActivityType, SubmissionStatus};
use crate::response::{ok, AppError};
use crate::services::access::{ensure_course_manager, require_admin, require_student, require_teacher};
use crate::services::analytics::{
    average, clamp_engagement_days, is_struggling, page_offset, rate, round1, total_pages,
    ProgressDistribution, ACTIVITIES_PER_PAGE,
};
use crate::state::AppState;

const RECENT_ACTIVITY_LIMIT: i64 = 20;
const COURSE_ACTIVITY_LIMIT: i64 = 15;
const TOP_PERFORMERS: usize = 5;
const NEWEST_USERS: usize = 10;
const TOP_COURSES: i64 = 10;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/progress", get(my_progress))
        .route("/progress/:course_id", get(my_course_progress))
        .route("/activities", get(my_activities))
        .route("/courses/:course_id", get(course_analytics))
        .route("/students/:student_id", get(student_analytics))
        .route("/system", get(system_analytics))
        .route("/engagement", get(engagement_analytics))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProgressOverview {
    records: Vec<Progress>,
    total_courses: usize,
    avg_completion: f64,
    total_time: i64,
    recent_activities: Vec<Activity>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CourseProgressDetail {
    progress: Progress,
    materials: Vec<Material>,
    assignments: Vec<Assignment>,
    submissions: Vec<Submission>,
    assignment_completion: f64,
    recent_activities: Vec<Activity>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityQuery {
    r#type: Option<String>,
    course_id: Option<String>,
    page: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ActivityPage {
    activities: Vec<Activity>,
    page: i64,
    total_pages: i64,
    total_count: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CourseAnalytics {
    course_id: String,
    course_title: String,
    total_students: i64,
    avg_progress: f64,
    materials_count: i64,
    assignments_count: usize,
    submission_rate: f64,
    top_performers: Vec<StudentCourseProgress>,
    struggling_students: Vec<StudentCourseProgress>,
    progress_distribution: ProgressDistribution,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StudentAnalytics {
    student: User,
    progress: Vec<Progress>,
    submissions: Vec<Submission>,
    avg_grade: f64,
    recent_activities: Vec<Activity>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SystemAnalytics {
    counts: SystemCounts,
    newest_users: Vec<User>,
    top_courses: Vec<CourseEnrollmentCount>,
}

#[derive(Debug, Deserialize)]
struct EngagementQuery {
    days: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EngagementAnalytics {
    daily: Vec<DailyMetric>,
    total_engagement_time: i64,
    avg_daily_users: f64,
    start_date: NaiveDate,
    end_date: NaiveDate,
    days: i64,
}

fn recent_filter(student_id: &str) -> ActivityFilter {
    ActivityFilter {
        student_id: student_id.to_string(),
        ..ActivityFilter::default()
    }
}

/// Mean score over graded submissions only.
fn average_grade(submissions: &[Submission]) -> f64 {
    let scores: Vec<f64> = submissions
        .iter()
        .filter(|s| s.status == SubmissionStatus::Graded)
        .filter_map(|s| s.score)
        .collect();
    round1(average(&scores))
}

async fn my_progress(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    require_student(&user)?;
    let proxy = state.require_db()?;

    let records = stats::list_progress_for_student(&proxy, &user.id, None).await?;
    let completions: Vec<f64> = records.iter().map(|p| p.completion_percentage).collect();
    let total_time = records.iter().map(|p| i64::from(p.time_spent_minutes)).sum();
    let recent_activities =
        stats::list_activities(&proxy, &recent_filter(&user.id), RECENT_ACTIVITY_LIMIT, 0).await?;

    Ok(ok(ProgressOverview {
        total_courses: records.len(),
        avg_completion: round1(average(&completions)),
        total_time,
        recent_activities,
        records,
    }))
}

async fn my_course_progress(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    require_student(&user)?;
    let proxy = state.require_db()?;
    if content::get_course(&proxy, &course_id).await?.is_none() {
        return Err(AppError::not_found("Course not found"));
    }
    if !content::is_enrolled(&proxy, &course_id, &user.id).await? {
        return Err(AppError::forbidden("You are not enrolled in this course"));
    }

    let progress = stats::get_or_create_progress(&proxy, &user.id, &course_id).await?;
    let materials = content::list_materials(&proxy, &course_id).await?;
    let assignments = assessments::list_course_assignments(&proxy, &course_id, true).await?;
    let submissions = assessments::list_submissions(
        &proxy,
        &SubmissionFilter {
            student_id: Some(user.id.clone()),
            course_ids: Some(vec![course_id.clone()]),
            ..SubmissionFilter::default()
        },
    )
    .await?;
    let submitted = submissions
        .iter()
        .filter(|s| assignments.iter().any(|a| a.id == s.assignment_id))
        .count();
    let recent_activities = stats::list_activities(
        &proxy,
        &ActivityFilter {
            course_id: Some(course_id.clone()),
            ..recent_filter(&user.id)
        },
        COURSE_ACTIVITY_LIMIT,
        0,
    )
    .await?;

    Ok(ok(CourseProgressDetail {
        assignment_completion: round1(rate(submitted as i64, assignments.len() as i64)),
        progress,
        materials,
        assignments,
        submissions,
        recent_activities,
    }))
}

async fn my_activities(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ActivityQuery>,
) -> Result<impl IntoResponse, AppError> {
    require_student(&user)?;
    let activity_type = match query.r#type.as_deref().filter(|t| !t.trim().is_empty()) {
        Some(raw) => Some(
            ActivityType::parse(raw).ok_or_else(|| AppError::validation("Unknown activity type"))?,
        ),
        None => None,
    };
    let proxy = state.require_db()?;

    let filter = ActivityFilter {
        activity_type,
        course_id: query.course_id.filter(|c| !c.trim().is_empty()),
        ..recent_filter(&user.id)
    };
    let (page, offset) = page_offset(query.page, ACTIVITIES_PER_PAGE);
    let total_count = stats::count_activities(&proxy, &filter).await?;
    let activities = stats::list_activities(&proxy, &filter, ACTIVITIES_PER_PAGE, offset).await?;

    Ok(ok(ActivityPage {
        activities,
        page,
        total_pages: total_pages(total_count, ACTIVITIES_PER_PAGE),
        total_count,
    }))
}

async fn course_analytics(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;
    let course = content::get_course(&proxy, &course_id)
        .await?
        .ok_or_else(|| AppError::not_found("Course not found"))?;
    ensure_course_manager(&user, course.teacher_id.as_deref())?;

    let students = stats::course_progress(&proxy, &course_id).await?;
    let completions: Vec<f64> = students.iter().map(|s| s.completion_percentage).collect();
    let all_assignments = assessments::list_course_assignments(&proxy, &course_id, false).await?;
    let published = all_assignments
        .iter()
        .filter(|a| a.status.accepts_submissions())
        .count() as i64;
    let submissions = assessments::course_submission_count(&proxy, &course_id).await?;

    let top_performers = students.iter().take(TOP_PERFORMERS).cloned().collect();
    let struggling_students = students
        .iter()
        .filter(|s| is_struggling(s.completion_percentage))
        .cloned()
        .collect();

    Ok(ok(CourseAnalytics {
        course_id: course.id,
        course_title: course.title,
        total_students: course.student_count,
        avg_progress: round1(average(&completions)),
        materials_count: course.material_count,
        assignments_count: all_assignments.len(),
        submission_rate: round1(rate(submissions, published * course.student_count)),
        top_performers,
        struggling_students,
        progress_distribution: ProgressDistribution::from_completions(completions),
    }))
}

async fn student_analytics(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(student_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    require_teacher(&user)?;
    let proxy = state.require_db()?;

    let shared = content::list_courses(
        &proxy,
        &CourseFilter {
            teacher_id: Some(user.id.clone()),
            enrolled_student_id: Some(student_id.clone()),
            ..CourseFilter::default()
        },
    )
    .await?;
    if shared.is_empty() {
        return Err(AppError::forbidden("This student is not enrolled in any of your courses"));
    }
    let student = user::find_user_by_id(&proxy, &student_id)
        .await?
        .ok_or_else(|| AppError::not_found("Student not found"))?;

    let progress = stats::list_progress_for_student(&proxy, &student_id, Some(&user.id)).await?;
    let submissions = assessments::list_submissions(
        &proxy,
        &SubmissionFilter {
            teacher_id: Some(user.id.clone()),
            student_id: Some(student_id.clone()),
            ..SubmissionFilter::default()
        },
    )
    .await?;
    let recent_activities = stats::list_activities(
        &proxy,
        &ActivityFilter {
            teacher_id: Some(user.id.clone()),
            ..recent_filter(&student_id)
        },
        RECENT_ACTIVITY_LIMIT,
        0,
    )
    .await?;

    Ok(ok(StudentAnalytics {
        avg_grade: average_grade(&submissions),
        student,
        progress,
        submissions,
        recent_activities,
    }))
}

async fn system_analytics(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&user)?;
    let proxy = state.require_db()?;

    let counts = stats::system_counts(&proxy).await?;
    let mut newest_users = user::list_users(&proxy, None).await?;
    newest_users.truncate(NEWEST_USERS);
    let top_courses = stats::top_courses_by_enrollment(&proxy, TOP_COURSES).await?;

    Ok(ok(SystemAnalytics {
        counts,
        newest_users,
        top_courses,
    }))
}

async fn engagement_analytics(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<EngagementQuery>,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&user)?;
    let days = clamp_engagement_days(query.days);
    let end_date = Utc::now().date_naive();
    let start_date = end_date - Duration::days(days - 1);
    let proxy = state.require_db()?;

    let daily = stats::daily_metrics(&proxy, start_date, end_date).await?;
    let total_engagement_time = daily.iter().map(|d| d.total_time).sum();
    let users_per_day: Vec<f64> = daily.iter().map(|d| d.total_users as f64).collect();

    Ok(ok(EngagementAnalytics {
        avg_daily_users: round1(average(&users_per_day)),
        total_engagement_time,
        daily,
        start_date,
        end_date,
        days,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(status: SubmissionStatus, score: Option<f64>) -> Submission {
        Submission {
            id: "s".into(),
            assignment_id: "a".into(),
            assignment_title: "A".into(),
            course_id: "c".into(),
            course_title: "C".into(),
            student_id: "u".into(),
            student_name: "U".into(),
            content: "answer".into(),
            file_url: None,
            score,
            max_score: 100,
            status,
            submitted_at: String::new(),
            graded_at: None,
            is_graded: status == SubmissionStatus::Graded,
            is_late: false,
            percentage_score: None,
            course_teacher_id: None,
            assignment_description: String::new(),
        }
    }

    #[test]
    fn average_grade_ignores_ungraded() {
        let submissions = vec![
            submission(SubmissionStatus::Graded, Some(80.0)),
            submission(SubmissionStatus::Graded, Some(91.0)),
            submission(SubmissionStatus::Submitted, None),
        ];
        assert_eq!(average_grade(&submissions), 85.5);
        assert_eq!(average_grade(&[]), 0.0);
    }
}
