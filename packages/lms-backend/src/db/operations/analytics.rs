use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::Row;

use super::content::ensure_progress;
use super::user::full_name;
use super::{iso, new_id};
use crate::db::DatabaseProxy;
use crate::models::{ActivityType, Role};
use crate::services::analytics::{DailyEngagement, ViewProgress};
use crate::services::assistant::truncate_chars;

const DESCRIPTION_MAX_CHARS: usize = 200;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub id: String,
    pub student_id: String,
    pub course_id: String,
    pub course_title: String,
    pub materials_completed: i32,
    pub total_materials: i32,
    pub completion_percentage: f64,
    pub time_spent_minutes: i32,
    pub last_accessed: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub student_id: String,
    pub course_id: Option<String>,
    pub course_title: Option<String>,
    pub activity_type: ActivityType,
    pub activity_label: &'static str,
    pub description: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub student_id: String,
    pub activity_type: Option<ActivityType>,
    pub course_id: Option<String>,
    /// Restricts to courses taught by this teacher.
    pub teacher_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentCourseProgress {
    pub student_id: String,
    pub student_name: String,
    pub username: String,
    pub materials_completed: i32,
    pub total_materials: i32,
    pub completion_percentage: f64,
    pub last_accessed: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemCounts {
    pub total_users: i64,
    pub total_students: i64,
    pub total_teachers: i64,
    pub total_admins: i64,
    pub total_courses: i64,
    pub active_courses: i64,
    pub total_materials: i64,
    pub total_subjects: i64,
    pub total_assignments: i64,
    pub total_submissions: i64,
    pub weekly_activities: i64,
    pub total_ai_conversations: i64,
    pub total_ai_generations: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseEnrollmentCount {
    pub course_id: String,
    pub title: String,
    pub student_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyMetric {
    pub date: NaiveDate,
    pub total_users: i64,
    pub total_time: i64,
    pub total_materials: i64,
    pub total_ai: i64,
    pub total_assignments: i64,
}

const PROGRESS_SELECT: &str = r#"
    SELECT p."id", p."studentId", p."courseId", c."title" AS "courseTitle", p."materialsCompleted",
           p."totalMaterials", p."completionPercentage", p."timeSpentMinutes", p."lastAccessed", p."updatedAt"
    FROM "student_progress" p
    JOIN "courses" c ON c."id" = p."courseId"
"#;

const ACTIVITY_SELECT: &str = r#"
    SELECT a."id", a."studentId", a."courseId", c."title" AS "courseTitle", a."activityType",
           a."description", a."timestamp"
    FROM "learning_activities" a
    LEFT JOIN "courses" c ON c."id" = a."courseId"
"#;

const ACTIVITY_FILTER: &str = r#"
    WHERE a."studentId" = $1
      AND ($2::TEXT IS NULL OR a."activityType" = $2)
      AND ($3::TEXT IS NULL OR a."courseId" = $3)
      AND ($4::TEXT IS NULL OR c."teacherId" = $4)
"#;

fn map_progress(row: &PgRow) -> Result<Progress, sqlx::Error> {
    Ok(Progress {
        id: row.try_get("id")?,
        student_id: row.try_get("studentId")?,
        course_id: row.try_get("courseId")?,
        course_title: row.try_get("courseTitle")?,
        materials_completed: row.try_get("materialsCompleted")?,
        total_materials: row.try_get("totalMaterials")?,
        completion_percentage: row.try_get("completionPercentage")?,
        time_spent_minutes: row.try_get("timeSpentMinutes")?,
        last_accessed: iso(row.try_get("lastAccessed")?),
        updated_at: iso(row.try_get("updatedAt")?),
    })
}

fn map_activity(row: &PgRow) -> Result<Activity, sqlx::Error> {
    let kind: String = row.try_get("activityType")?;
    let activity_type = ActivityType::parse(&kind)
        .ok_or_else(|| sqlx::Error::Decode(format!("unknown activity type {kind}").into()))?;
    Ok(Activity {
        id: row.try_get("id")?,
        student_id: row.try_get("studentId")?,
        course_id: row.try_get("courseId")?,
        course_title: row.try_get("courseTitle")?,
        activity_type,
        activity_label: activity_type.label(),
        description: row.try_get("description")?,
        timestamp: iso(row.try_get("timestamp")?),
    })
}

// Progress

pub async fn get_or_create_progress(
    proxy: &DatabaseProxy,
    student_id: &str,
    course_id: &str,
) -> Result<Progress, sqlx::Error> {
    let mut conn = proxy.pool().acquire().await?;
    ensure_progress(&mut conn, student_id, course_id).await?;

    let sql = format!(r#"{PROGRESS_SELECT} WHERE p."studentId" = $1 AND p."courseId" = $2"#);
    let row = sqlx::query(&sql)
        .bind(student_id)
        .bind(course_id)
        .fetch_one(&mut *conn)
        .await?;
    map_progress(&row)
}

/// Records a material view. Only the first view of a material counts toward completion.
pub async fn record_material_view(
    proxy: &DatabaseProxy,
    student_id: &str,
    material_id: &str,
    course_id: &str,
) -> Result<Progress, sqlx::Error> {
    let mut tx = proxy.pool().begin().await?;
    ensure_progress(&mut tx, student_id, course_id).await?;

    let first_view = sqlx::query(
        r#"
        INSERT INTO "material_views" ("studentId", "materialId")
        VALUES ($1, $2)
        ON CONFLICT ("studentId", "materialId") DO NOTHING
        "#,
    )
    .bind(student_id)
    .bind(material_id)
    .execute(&mut *tx)
    .await?
    .rows_affected()
        > 0;

    let row = sqlx::query(
        r#"
        SELECT "materialsCompleted", "totalMaterials" FROM "student_progress"
        WHERE "studentId" = $1 AND "courseId" = $2
        FOR UPDATE
        "#,
    )
    .bind(student_id)
    .bind(course_id)
    .fetch_one(&mut *tx)
    .await?;
    let completed: i32 = row.try_get("materialsCompleted")?;
    let total: i32 = row.try_get("totalMaterials")?;
    let view = ViewProgress::after_view(completed, total, first_view);

    sqlx::query(
        r#"
        UPDATE "student_progress" SET
            "materialsCompleted" = $3,
            "completionPercentage" = $4,
            "timeSpentMinutes" = "timeSpentMinutes" + $5,
            "lastAccessed" = (NOW() AT TIME ZONE 'utc'),
            "updatedAt" = (NOW() AT TIME ZONE 'utc')
        WHERE "studentId" = $1 AND "courseId" = $2
        "#,
    )
    .bind(student_id)
    .bind(course_id)
    .bind(view.materials_completed)
    .bind(view.completion_percentage)
    .bind(view.minutes_added)
    .execute(&mut *tx)
    .await?;

    let sql = format!(r#"{PROGRESS_SELECT} WHERE p."studentId" = $1 AND p."courseId" = $2"#);
    let row = sqlx::query(&sql)
        .bind(student_id)
        .bind(course_id)
        .fetch_one(&mut *tx)
        .await?;
    let progress = map_progress(&row)?;

    tx.commit().await?;
    Ok(progress)
}

pub async fn list_progress_for_student(
    proxy: &DatabaseProxy,
    student_id: &str,
    teacher_id: Option<&str>,
) -> Result<Vec<Progress>, sqlx::Error> {
    let sql = format!(
        r#"{PROGRESS_SELECT}
        WHERE p."studentId" = $1 AND ($2::TEXT IS NULL OR c."teacherId" = $2)
        ORDER BY p."lastAccessed" DESC"#
    );
    let rows = sqlx::query(&sql)
        .bind(student_id)
        .bind(teacher_id)
        .fetch_all(proxy.pool())
        .await?;
    rows.iter().map(map_progress).collect()
}

pub async fn recent_progress(
    proxy: &DatabaseProxy,
    student_id: &str,
    limit: i64,
) -> Result<Vec<Progress>, sqlx::Error> {
    let sql = format!(
        r#"{PROGRESS_SELECT} WHERE p."studentId" = $1 ORDER BY p."updatedAt" DESC LIMIT $2"#
    );
    let rows = sqlx::query(&sql)
        .bind(student_id)
        .bind(limit)
        .fetch_all(proxy.pool())
        .await?;
    rows.iter().map(map_progress).collect()
}

pub async fn course_progress(
    proxy: &DatabaseProxy,
    course_id: &str,
) -> Result<Vec<StudentCourseProgress>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT p."studentId", u."username", u."firstName", u."lastName", p."materialsCompleted",
               p."totalMaterials", p."completionPercentage", p."lastAccessed"
        FROM "student_progress" p
        JOIN "users" u ON u."id" = p."studentId"
        WHERE p."courseId" = $1
        ORDER BY p."completionPercentage" DESC, u."username"
        "#,
    )
    .bind(course_id)
    .fetch_all(proxy.pool())
    .await?;

    rows.iter()
        .map(|row| {
            let username: String = row.try_get("username")?;
            let first: String = row.try_get("firstName")?;
            let last: String = row.try_get("lastName")?;
            Ok(StudentCourseProgress {
                student_id: row.try_get("studentId")?,
                student_name: full_name(&first, &last, &username),
                username,
                materials_completed: row.try_get("materialsCompleted")?,
                total_materials: row.try_get("totalMaterials")?,
                completion_percentage: row.try_get("completionPercentage")?,
                last_accessed: iso(row.try_get("lastAccessed")?),
            })
        })
        .collect()
}

// Activities

pub async fn log_activity(
    proxy: &DatabaseProxy,
    student_id: &str,
    course_id: Option<&str>,
    activity_type: ActivityType,
    description: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO "learning_activities" ("id", "studentId", "courseId", "activityType", "description")
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(new_id())
    .bind(student_id)
    .bind(course_id)
    .bind(activity_type.as_str())
    .bind(truncate_chars(description, DESCRIPTION_MAX_CHARS))
    .execute(proxy.pool())
    .await?;
    Ok(())
}

/// Activity logging never fails the surrounding request.
pub async fn log_activity_best_effort(
    proxy: &DatabaseProxy,
    student_id: &str,
    course_id: Option<&str>,
    activity_type: ActivityType,
    description: &str,
) {
    if let Err(err) = log_activity(proxy, student_id, course_id, activity_type, description).await {
        tracing::warn!(
            error = %err,
            student_id,
            activity = activity_type.as_str(),
            "failed to record learning activity"
        );
    }
}

pub async fn list_activities(
    proxy: &DatabaseProxy,
    filter: &ActivityFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<Activity>, sqlx::Error> {
    let sql = format!(
        r#"{ACTIVITY_SELECT} {ACTIVITY_FILTER} ORDER BY a."timestamp" DESC LIMIT $5 OFFSET $6"#
    );
    let rows = sqlx::query(&sql)
        .bind(&filter.student_id)
        .bind(filter.activity_type.map(|t| t.as_str()))
        .bind(filter.course_id.as_deref())
        .bind(filter.teacher_id.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(proxy.pool())
        .await?;
    rows.iter().map(map_activity).collect()
}

pub async fn count_activities(
    proxy: &DatabaseProxy,
    filter: &ActivityFilter,
) -> Result<i64, sqlx::Error> {
    let sql = format!(
        r#"SELECT COUNT(*) FROM "learning_activities" a LEFT JOIN "courses" c ON c."id" = a."courseId" {ACTIVITY_FILTER}"#
    );
    sqlx::query_scalar(&sql)
        .bind(&filter.student_id)
        .bind(filter.activity_type.map(|t| t.as_str()))
        .bind(filter.course_id.as_deref())
        .bind(filter.teacher_id.as_deref())
        .fetch_one(proxy.pool())
        .await
}

// System-wide

pub async fn system_counts(proxy: &DatabaseProxy) -> Result<SystemCounts, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT
            (SELECT COUNT(*) FROM "users") AS "totalUsers",
            (SELECT COUNT(*) FROM "users" WHERE "role" = $1) AS "totalStudents",
            (SELECT COUNT(*) FROM "users" WHERE "role" = $2) AS "totalTeachers",
            (SELECT COUNT(*) FROM "users" WHERE "role" = $3) AS "totalAdmins",
            (SELECT COUNT(*) FROM "courses") AS "totalCourses",
            (SELECT COUNT(*) FROM "courses" WHERE "isActive") AS "activeCourses",
            (SELECT COUNT(*) FROM "learning_materials") AS "totalMaterials",
            (SELECT COUNT(*) FROM "subjects") AS "totalSubjects",
            (SELECT COUNT(*) FROM "assignments") AS "totalAssignments",
            (SELECT COUNT(*) FROM "submissions") AS "totalSubmissions",
            (SELECT COUNT(*) FROM "learning_activities"
               WHERE "timestamp" >= (NOW() AT TIME ZONE 'utc')::DATE - 7) AS "weeklyActivities",
            (SELECT COUNT(*) FROM "ai_conversations") AS "totalAiConversations",
            (SELECT COUNT(*) FROM "ai_generated_content") AS "totalAiGenerations"
        "#,
    )
    .bind(Role::Student.as_str())
    .bind(Role::Teacher.as_str())
    .bind(Role::Admin.as_str())
    .fetch_one(proxy.pool())
    .await?;

    Ok(SystemCounts {
        total_users: row.try_get("totalUsers")?,
        total_students: row.try_get("totalStudents")?,
        total_teachers: row.try_get("totalTeachers")?,
        total_admins: row.try_get("totalAdmins")?,
        total_courses: row.try_get("totalCourses")?,
        active_courses: row.try_get("activeCourses")?,
        total_materials: row.try_get("totalMaterials")?,
        total_subjects: row.try_get("totalSubjects")?,
        total_assignments: row.try_get("totalAssignments")?,
        total_submissions: row.try_get("totalSubmissions")?,
        weekly_activities: row.try_get("weeklyActivities")?,
        total_ai_conversations: row.try_get("totalAiConversations")?,
        total_ai_generations: row.try_get("totalAiGenerations")?,
    })
}

pub async fn top_courses_by_enrollment(
    proxy: &DatabaseProxy,
    limit: i64,
) -> Result<Vec<CourseEnrollmentCount>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT c."id", c."title", COUNT(e."studentId") AS "studentCount"
        FROM "courses" c
        LEFT JOIN "course_enrollments" e ON e."courseId" = c."id"
        GROUP BY c."id", c."title"
        ORDER BY "studentCount" DESC, c."title"
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(proxy.pool())
    .await?;

    rows.iter()
        .map(|row| {
            Ok(CourseEnrollmentCount {
                course_id: row.try_get("id")?,
                title: row.try_get("title")?,
                student_count: row.try_get("studentCount")?,
            })
        })
        .collect()
}

pub async fn role_totals(proxy: &DatabaseProxy) -> Result<(i64, i64, i64), sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT
            (SELECT COUNT(*) FROM "users" WHERE "role" = $1) AS "students",
            (SELECT COUNT(*) FROM "users" WHERE "role" = $2) AS "teachers",
            (SELECT COUNT(*) FROM "courses") AS "courses"
        "#,
    )
    .bind(Role::Student.as_str())
    .bind(Role::Teacher.as_str())
    .fetch_one(proxy.pool())
    .await?;
    Ok((
        row.try_get("students")?,
        row.try_get("teachers")?,
        row.try_get("courses")?,
    ))
}

// Engagement

pub async fn daily_metrics(
    proxy: &DatabaseProxy,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<DailyMetric>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT "date",
               COUNT(DISTINCT "userId") FILTER (WHERE "totalTimeMinutes" > 0) AS "totalUsers",
               COALESCE(SUM("totalTimeMinutes"), 0)::BIGINT AS "totalTime",
               COALESCE(SUM("materialsViewed"), 0)::BIGINT AS "totalMaterials",
               COALESCE(SUM("aiInteractions"), 0)::BIGINT AS "totalAi",
               COALESCE(SUM("assignmentsSubmitted"), 0)::BIGINT AS "totalAssignments"
        FROM "engagement_metrics"
        WHERE "date" >= $1 AND "date" <= $2
        GROUP BY "date"
        ORDER BY "date"
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(proxy.pool())
    .await?;

    rows.iter()
        .map(|row| {
            Ok(DailyMetric {
                date: row.try_get("date")?,
                total_users: row.try_get("totalUsers")?,
                total_time: row.try_get("totalTime")?,
                total_materials: row.try_get("totalMaterials")?,
                total_ai: row.try_get("totalAi")?,
                total_assignments: row.try_get("totalAssignments")?,
            })
        })
        .collect()
}

/// Rolls a day's learning activities up into `engagement_metrics` for every student.
/// Returns the number of students written.
pub async fn update_engagement_for_date(
    proxy: &DatabaseProxy,
    date: NaiveDate,
) -> Result<u64, sqlx::Error> {
    let students: Vec<String> = sqlx::query_scalar(r#"SELECT "id" FROM "users" WHERE "role" = $1"#)
        .bind(Role::Student.as_str())
        .fetch_all(proxy.pool())
        .await?;

    let rows = sqlx::query(
        r#"
        SELECT "studentId", "activityType", COUNT(*) AS "count"
        FROM "learning_activities"
        WHERE "timestamp"::DATE = $1
        GROUP BY "studentId", "activityType"
        "#,
    )
    .bind(date)
    .fetch_all(proxy.pool())
    .await?;

    let mut per_student: HashMap<String, Vec<(ActivityType, i64)>> = HashMap::new();
    for row in &rows {
        let student_id: String = row.try_get("studentId")?;
        let kind: String = row.try_get("activityType")?;
        let count: i64 = row.try_get("count")?;
        if let Some(activity) = ActivityType::parse(&kind) {
            per_student.entry(student_id).or_default().push((activity, count));
        }
    }

    let mut tx = proxy.pool().begin().await?;
    let mut written = 0;
    for student_id in &students {
        let day = DailyEngagement::from_counts(
            per_student.remove(student_id).unwrap_or_default(),
        );
        sqlx::query(
            r#"
            INSERT INTO "engagement_metrics"
                ("id", "userId", "date", "totalTimeMinutes", "materialsViewed", "aiInteractions", "assignmentsSubmitted")
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT ("userId", "date") DO UPDATE SET
                "totalTimeMinutes" = EXCLUDED."totalTimeMinutes",
                "materialsViewed" = EXCLUDED."materialsViewed",
                "aiInteractions" = EXCLUDED."aiInteractions",
                "assignmentsSubmitted" = EXCLUDED."assignmentsSubmitted"
            "#,
        )
        .bind(new_id())
        .bind(student_id)
        .bind(date)
        .bind(day.total_time_minutes)
        .bind(day.materials_viewed)
        .bind(day.ai_interactions)
        .bind(day.assignments_submitted)
        .execute(&mut *tx)
        .await?;
        written += 1;
    }
    tx.commit().await?;

    Ok(written)
}
