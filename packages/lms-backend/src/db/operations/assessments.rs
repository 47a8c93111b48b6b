use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::Row;

use super::user::full_name;
use super::{iso, iso_opt, new_id};
use crate::db::DatabaseProxy;
use crate::models::{AssignmentStatus, SubmissionStatus};
use crate::services::assistant::ParsedFeedback;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    pub course_id: String,
    pub course_title: String,
    pub course_teacher_id: Option<String>,
    pub title: String,
    pub description: String,
    pub instructions: String,
    pub max_score: i32,
    pub due_date: String,
    pub status: AssignmentStatus,
    pub attachment_url: Option<String>,
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub is_overdue: bool,
    pub submission_count: i64,
    pub graded_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentListItem {
    #[serde(flatten)]
    pub assignment: Assignment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub assignment_id: String,
    pub assignment_title: String,
    pub course_id: String,
    pub course_title: String,
    pub student_id: String,
    pub student_name: String,
    pub content: String,
    pub file_url: Option<String>,
    pub score: Option<f64>,
    pub max_score: i32,
    pub status: SubmissionStatus,
    pub submitted_at: String,
    pub graded_at: Option<String>,
    pub is_graded: bool,
    pub is_late: bool,
    pub percentage_score: Option<f64>,
    #[serde(skip)]
    pub course_teacher_id: Option<String>,
    #[serde(skip)]
    pub assignment_description: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherFeedback {
    pub id: String,
    pub submission_id: String,
    pub teacher_id: Option<String>,
    pub teacher_name: Option<String>,
    pub feedback_text: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiFeedback {
    pub id: String,
    pub submission_id: String,
    pub feedback_text: String,
    pub strengths: String,
    pub improvements: String,
    pub suggestions: String,
    pub generated_at: String,
}

/// Which assignments a caller may list.
#[derive(Debug, Clone)]
pub enum AssignmentScope {
    Student(String),
    Teacher(String),
    All,
}

#[derive(Debug, Clone, Default)]
pub struct SubmissionFilter {
    pub teacher_id: Option<String>,
    pub student_id: Option<String>,
    pub course_ids: Option<Vec<String>>,
    pub status: Option<SubmissionStatus>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewAssignment {
    pub course_id: String,
    pub title: String,
    pub description: String,
    pub instructions: String,
    pub max_score: i32,
    pub due_date: NaiveDateTime,
    pub status: AssignmentStatus,
    pub attachment_url: Option<String>,
    pub created_by: String,
}

#[derive(Debug, Clone, Default)]
pub struct AssignmentUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub max_score: Option<i32>,
    pub due_date: Option<NaiveDateTime>,
    pub status: Option<AssignmentStatus>,
    pub attachment_url: Option<String>,
}

pub fn is_late(submitted_at: NaiveDateTime, due_date: NaiveDateTime) -> bool {
    submitted_at > due_date
}

pub fn percentage_score(score: Option<f64>, max_score: i32, status: SubmissionStatus) -> Option<f64> {
    match (score, status) {
        (Some(score), SubmissionStatus::Graded) if max_score > 0 => {
            Some(score / max_score as f64 * 100.0)
        }
        _ => None,
    }
}

const ASSIGNMENT_SELECT: &str = r#"
    SELECT a."id", a."courseId", c."title" AS "courseTitle", c."teacherId" AS "courseTeacherId",
           a."title", a."description", a."instructions", a."maxScore", a."dueDate", a."status",
           a."attachmentUrl", a."createdBy", a."createdAt", a."updatedAt",
           (SELECT COUNT(*) FROM "submissions" s WHERE s."assignmentId" = a."id") AS "submissionCount",
           (SELECT COUNT(*) FROM "submissions" s
              WHERE s."assignmentId" = a."id" AND s."status" = 'GRADED') AS "gradedCount"
    FROM "assignments" a
    JOIN "courses" c ON c."id" = a."courseId"
"#;

const SUBMISSION_SELECT: &str = r#"
    SELECT s."id", s."assignmentId", a."title" AS "assignmentTitle", a."description" AS "assignmentDescription",
           a."courseId", c."title" AS "courseTitle", c."teacherId" AS "courseTeacherId",
           s."studentId", u."username", u."firstName", u."lastName",
           s."content", s."fileUrl", s."score", a."maxScore", a."dueDate", s."status",
           s."submittedAt", s."gradedAt"
    FROM "submissions" s
    JOIN "assignments" a ON a."id" = s."assignmentId"
    JOIN "courses" c ON c."id" = a."courseId"
    JOIN "users" u ON u."id" = s."studentId"
"#;

fn map_assignment(row: &PgRow) -> Result<Assignment, sqlx::Error> {
    let status: String = row.try_get("status")?;
    let due_date: NaiveDateTime = row.try_get("dueDate")?;
    Ok(Assignment {
        id: row.try_get("id")?,
        course_id: row.try_get("courseId")?,
        course_title: row.try_get("courseTitle")?,
        course_teacher_id: row.try_get("courseTeacherId")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        instructions: row.try_get("instructions")?,
        max_score: row.try_get("maxScore")?,
        due_date: iso(due_date),
        status: AssignmentStatus::parse(&status)
            .ok_or_else(|| sqlx::Error::Decode(format!("unknown assignment status {status}").into()))?,
        attachment_url: row.try_get("attachmentUrl")?,
        created_by: row.try_get("createdBy")?,
        created_at: iso(row.try_get("createdAt")?),
        updated_at: iso(row.try_get("updatedAt")?),
        is_overdue: Utc::now().naive_utc() > due_date,
        submission_count: row.try_get("submissionCount")?,
        graded_count: row.try_get("gradedCount")?,
    })
}

fn map_submission(row: &PgRow) -> Result<Submission, sqlx::Error> {
    let status: String = row.try_get("status")?;
    let status = SubmissionStatus::parse(&status)
        .ok_or_else(|| sqlx::Error::Decode(format!("unknown submission status {status}").into()))?;
    let submitted_at: NaiveDateTime = row.try_get("submittedAt")?;
    let due_date: NaiveDateTime = row.try_get("dueDate")?;
    let score: Option<f64> = row.try_get("score")?;
    let max_score: i32 = row.try_get("maxScore")?;
    let username: String = row.try_get("username")?;
    let first: String = row.try_get("firstName")?;
    let last: String = row.try_get("lastName")?;

    Ok(Submission {
        id: row.try_get("id")?,
        assignment_id: row.try_get("assignmentId")?,
        assignment_title: row.try_get("assignmentTitle")?,
        course_id: row.try_get("courseId")?,
        course_title: row.try_get("courseTitle")?,
        student_id: row.try_get("studentId")?,
        student_name: full_name(&first, &last, &username),
        content: row.try_get("content")?,
        file_url: row.try_get("fileUrl")?,
        score,
        max_score,
        status,
        submitted_at: iso(submitted_at),
        graded_at: iso_opt(row.try_get("gradedAt")?),
        is_graded: status == SubmissionStatus::Graded,
        is_late: is_late(submitted_at, due_date),
        percentage_score: percentage_score(score, max_score, status),
        course_teacher_id: row.try_get("courseTeacherId")?,
        assignment_description: row.try_get("assignmentDescription")?,
    })
}

fn map_ai_feedback(row: &PgRow) -> Result<AiFeedback, sqlx::Error> {
    Ok(AiFeedback {
        id: row.try_get("id")?,
        submission_id: row.try_get("submissionId")?,
        feedback_text: row.try_get("feedbackText")?,
        strengths: row.try_get("strengths")?,
        improvements: row.try_get("improvements")?,
        suggestions: row.try_get("suggestions")?,
        generated_at: iso(row.try_get("generatedAt")?),
    })
}

// Assignments

pub async fn list_assignments(
    proxy: &DatabaseProxy,
    scope: &AssignmentScope,
) -> Result<Vec<AssignmentListItem>, sqlx::Error> {
    match scope {
        AssignmentScope::Student(student_id) => {
            let sql = format!(
                r#"
                SELECT * FROM ({ASSIGNMENT_SELECT}
                    WHERE a."status" = 'PUBLISHED'
                      AND EXISTS (SELECT 1 FROM "course_enrollments" e
                                  WHERE e."courseId" = a."courseId" AND e."studentId" = $1)) a
                CROSS JOIN LATERAL (
                    SELECT EXISTS (SELECT 1 FROM "submissions" s
                                   WHERE s."assignmentId" = a."id" AND s."studentId" = $1) AS "submitted"
                ) sub
                ORDER BY a."dueDate" DESC
                "#
            );
            let rows = sqlx::query(&sql)
                .bind(student_id)
                .fetch_all(proxy.pool())
                .await?;
            rows.iter()
                .map(|row| {
                    Ok(AssignmentListItem {
                        assignment: map_assignment(row)?,
                        submitted: Some(row.try_get("submitted")?),
                    })
                })
                .collect()
        }
        AssignmentScope::Teacher(teacher_id) => {
            let sql = format!(r#"{ASSIGNMENT_SELECT} WHERE c."teacherId" = $1 ORDER BY a."dueDate" DESC"#);
            let rows = sqlx::query(&sql)
                .bind(teacher_id)
                .fetch_all(proxy.pool())
                .await?;
            rows.iter()
                .map(|row| {
                    Ok(AssignmentListItem {
                        assignment: map_assignment(row)?,
                        submitted: None,
                    })
                })
                .collect()
        }
        AssignmentScope::All => {
            let sql = format!(r#"{ASSIGNMENT_SELECT} ORDER BY a."dueDate" DESC"#);
            let rows = sqlx::query(&sql).fetch_all(proxy.pool()).await?;
            rows.iter()
                .map(|row| {
                    Ok(AssignmentListItem {
                        assignment: map_assignment(row)?,
                        submitted: None,
                    })
                })
                .collect()
        }
    }
}

pub async fn list_course_assignments(
    proxy: &DatabaseProxy,
    course_id: &str,
    published_only: bool,
) -> Result<Vec<Assignment>, sqlx::Error> {
    let sql = format!(
        r#"{ASSIGNMENT_SELECT}
        WHERE a."courseId" = $1 AND (NOT $2 OR a."status" = 'PUBLISHED')
        ORDER BY a."dueDate""#
    );
    let rows = sqlx::query(&sql)
        .bind(course_id)
        .bind(published_only)
        .fetch_all(proxy.pool())
        .await?;
    rows.iter().map(map_assignment).collect()
}

/// Published assignments of the student's courses that have no submission yet, soonest due first.
pub async fn pending_assignments(
    proxy: &DatabaseProxy,
    student_id: &str,
    limit: i64,
) -> Result<(Vec<Assignment>, i64), sqlx::Error> {
    const PENDING: &str = r#"
        a."status" = 'PUBLISHED'
        AND EXISTS (SELECT 1 FROM "course_enrollments" e
                    WHERE e."courseId" = a."courseId" AND e."studentId" = $1)
        AND NOT EXISTS (SELECT 1 FROM "submissions" s
                        WHERE s."assignmentId" = a."id" AND s."studentId" = $1)
    "#;

    let sql = format!(r#"{ASSIGNMENT_SELECT} WHERE {PENDING} ORDER BY a."dueDate" LIMIT $2"#);
    let rows = sqlx::query(&sql)
        .bind(student_id)
        .bind(limit)
        .fetch_all(proxy.pool())
        .await?;
    let items = rows.iter().map(map_assignment).collect::<Result<Vec<_>, _>>()?;

    let count_sql = format!(r#"SELECT COUNT(*) FROM "assignments" a WHERE {PENDING}"#);
    let total: i64 = sqlx::query_scalar(&count_sql)
        .bind(student_id)
        .fetch_one(proxy.pool())
        .await?;

    Ok((items, total))
}

pub async fn get_assignment(
    proxy: &DatabaseProxy,
    assignment_id: &str,
) -> Result<Option<Assignment>, sqlx::Error> {
    let sql = format!(r#"{ASSIGNMENT_SELECT} WHERE a."id" = $1"#);
    let row = sqlx::query(&sql)
        .bind(assignment_id)
        .fetch_optional(proxy.pool())
        .await?;
    row.as_ref().map(map_assignment).transpose()
}

pub async fn create_assignment(
    proxy: &DatabaseProxy,
    assignment: &NewAssignment,
) -> Result<String, sqlx::Error> {
    let id = new_id();
    sqlx::query(
        r#"
        INSERT INTO "assignments"
            ("id", "courseId", "title", "description", "instructions", "maxScore", "dueDate",
             "status", "attachmentUrl", "createdBy")
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(&id)
    .bind(&assignment.course_id)
    .bind(&assignment.title)
    .bind(&assignment.description)
    .bind(&assignment.instructions)
    .bind(assignment.max_score)
    .bind(assignment.due_date)
    .bind(assignment.status.as_str())
    .bind(assignment.attachment_url.as_deref())
    .bind(&assignment.created_by)
    .execute(proxy.pool())
    .await?;
    Ok(id)
}

pub async fn update_assignment(
    proxy: &DatabaseProxy,
    assignment_id: &str,
    update: &AssignmentUpdate,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE "assignments" SET
            "title" = COALESCE($2, "title"),
            "description" = COALESCE($3, "description"),
            "instructions" = COALESCE($4, "instructions"),
            "maxScore" = COALESCE($5, "maxScore"),
            "dueDate" = COALESCE($6, "dueDate"),
            "status" = COALESCE($7, "status"),
            "attachmentUrl" = COALESCE($8, "attachmentUrl"),
            "updatedAt" = (NOW() AT TIME ZONE 'utc')
        WHERE "id" = $1
        "#,
    )
    .bind(assignment_id)
    .bind(update.title.as_deref())
    .bind(update.description.as_deref())
    .bind(update.instructions.as_deref())
    .bind(update.max_score)
    .bind(update.due_date)
    .bind(update.status.map(|s| s.as_str()))
    .bind(update.attachment_url.as_deref())
    .execute(proxy.pool())
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn highest_grade(proxy: &DatabaseProxy, assignment_id: &str) -> Result<Option<f64>, sqlx::Error> {
    sqlx::query_scalar(
        r#"SELECT MAX("score") FROM "submissions" WHERE "assignmentId" = $1 AND "status" = 'GRADED'"#,
    )
    .bind(assignment_id)
    .fetch_one(proxy.pool())
    .await
}

pub async fn delete_assignment(proxy: &DatabaseProxy, assignment_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(r#"DELETE FROM "assignments" WHERE "id" = $1"#)
        .bind(assignment_id)
        .execute(proxy.pool())
        .await?;
    Ok(result.rows_affected() > 0)
}

// Submissions

/// Inserts a submission. Returns `None` when the student already submitted.
pub async fn create_submission(
    proxy: &DatabaseProxy,
    assignment_id: &str,
    student_id: &str,
    content: &str,
    file_url: Option<&str>,
) -> Result<Option<String>, sqlx::Error> {
    let id = new_id();
    let inserted = sqlx::query(
        r#"
        INSERT INTO "submissions" ("id", "assignmentId", "studentId", "content", "fileUrl")
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT ("assignmentId", "studentId") DO NOTHING
        "#,
    )
    .bind(&id)
    .bind(assignment_id)
    .bind(student_id)
    .bind(content)
    .bind(file_url)
    .execute(proxy.pool())
    .await?
    .rows_affected();

    Ok((inserted > 0).then_some(id))
}

pub async fn get_submission(
    proxy: &DatabaseProxy,
    submission_id: &str,
) -> Result<Option<Submission>, sqlx::Error> {
    let sql = format!(r#"{SUBMISSION_SELECT} WHERE s."id" = $1"#);
    let row = sqlx::query(&sql)
        .bind(submission_id)
        .fetch_optional(proxy.pool())
        .await?;
    row.as_ref().map(map_submission).transpose()
}

pub async fn find_student_submission(
    proxy: &DatabaseProxy,
    assignment_id: &str,
    student_id: &str,
) -> Result<Option<Submission>, sqlx::Error> {
    let sql = format!(r#"{SUBMISSION_SELECT} WHERE s."assignmentId" = $1 AND s."studentId" = $2"#);
    let row = sqlx::query(&sql)
        .bind(assignment_id)
        .bind(student_id)
        .fetch_optional(proxy.pool())
        .await?;
    row.as_ref().map(map_submission).transpose()
}

pub async fn list_assignment_submissions(
    proxy: &DatabaseProxy,
    assignment_id: &str,
) -> Result<Vec<Submission>, sqlx::Error> {
    let sql = format!(r#"{SUBMISSION_SELECT} WHERE s."assignmentId" = $1 ORDER BY s."submittedAt" DESC"#);
    let rows = sqlx::query(&sql)
        .bind(assignment_id)
        .fetch_all(proxy.pool())
        .await?;
    rows.iter().map(map_submission).collect()
}

pub async fn list_submissions(
    proxy: &DatabaseProxy,
    filter: &SubmissionFilter,
) -> Result<Vec<Submission>, sqlx::Error> {
    let sql = format!(
        r#"{SUBMISSION_SELECT}
        WHERE ($1::TEXT IS NULL OR c."teacherId" = $1)
          AND ($2::TEXT IS NULL OR s."studentId" = $2)
          AND ($3::TEXT[] IS NULL OR a."courseId" = ANY($3))
          AND ($4::TEXT IS NULL OR s."status" = $4)
        ORDER BY s."submittedAt" DESC
        LIMIT $5
        "#
    );
    let rows = sqlx::query(&sql)
        .bind(filter.teacher_id.as_deref())
        .bind(filter.student_id.as_deref())
        .bind(filter.course_ids.as_deref())
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.limit)
        .fetch_all(proxy.pool())
        .await?;
    rows.iter().map(map_submission).collect()
}

pub async fn count_submissions(
    proxy: &DatabaseProxy,
    teacher_id: &str,
    status: SubmissionStatus,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM "submissions" s
        JOIN "assignments" a ON a."id" = s."assignmentId"
        JOIN "courses" c ON c."id" = a."courseId"
        WHERE c."teacherId" = $1 AND s."status" = $2
        "#,
    )
    .bind(teacher_id)
    .bind(status.as_str())
    .fetch_one(proxy.pool())
    .await
}

pub async fn course_submission_count(proxy: &DatabaseProxy, course_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM "submissions" s
        JOIN "assignments" a ON a."id" = s."assignmentId"
        WHERE a."courseId" = $1
        "#,
    )
    .bind(course_id)
    .fetch_one(proxy.pool())
    .await
}

/// Stores the grade and, when given, upserts the grader's written feedback.
pub async fn grade_submission(
    proxy: &DatabaseProxy,
    submission_id: &str,
    score: f64,
    grader_id: &str,
    feedback_text: Option<&str>,
) -> Result<(), sqlx::Error> {
    let mut tx = proxy.pool().begin().await?;
    sqlx::query(
        r#"
        UPDATE "submissions" SET "score" = $2, "status" = $3, "gradedAt" = (NOW() AT TIME ZONE 'utc')
        WHERE "id" = $1
        "#,
    )
    .bind(submission_id)
    .bind(score)
    .bind(SubmissionStatus::Graded.as_str())
    .execute(&mut *tx)
    .await?;

    if let Some(text) = feedback_text {
        sqlx::query(
            r#"
            INSERT INTO "teacher_feedback" ("id", "submissionId", "teacherId", "feedbackText")
            VALUES ($1, $2, $3, $4)
            ON CONFLICT ("submissionId", "teacherId") DO UPDATE SET
                "feedbackText" = EXCLUDED."feedbackText",
                "updatedAt" = (NOW() AT TIME ZONE 'utc')
            "#,
        )
        .bind(new_id())
        .bind(submission_id)
        .bind(grader_id)
        .bind(text)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}

pub async fn list_teacher_feedback(
    proxy: &DatabaseProxy,
    submission_id: &str,
) -> Result<Vec<TeacherFeedback>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT f."id", f."submissionId", f."teacherId", u."username", u."firstName", u."lastName",
               f."feedbackText", f."createdAt", f."updatedAt"
        FROM "teacher_feedback" f
        LEFT JOIN "users" u ON u."id" = f."teacherId"
        WHERE f."submissionId" = $1
        ORDER BY f."createdAt" DESC
        "#,
    )
    .bind(submission_id)
    .fetch_all(proxy.pool())
    .await?;

    rows.iter()
        .map(|row| {
            let username: Option<String> = row.try_get("username")?;
            let first: Option<String> = row.try_get("firstName")?;
            let last: Option<String> = row.try_get("lastName")?;
            Ok(TeacherFeedback {
                id: row.try_get("id")?,
                submission_id: row.try_get("submissionId")?,
                teacher_id: row.try_get("teacherId")?,
                teacher_name: username.map(|username| {
                    full_name(
                        first.as_deref().unwrap_or_default(),
                        last.as_deref().unwrap_or_default(),
                        &username,
                    )
                }),
                feedback_text: row.try_get("feedbackText")?,
                created_at: iso(row.try_get("createdAt")?),
                updated_at: iso(row.try_get("updatedAt")?),
            })
        })
        .collect()
}

// AI feedback

pub async fn get_ai_feedback(
    proxy: &DatabaseProxy,
    submission_id: &str,
) -> Result<Option<AiFeedback>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT "id", "submissionId", "feedbackText", "strengths", "improvements", "suggestions", "generatedAt"
        FROM "ai_feedback" WHERE "submissionId" = $1
        "#,
    )
    .bind(submission_id)
    .fetch_optional(proxy.pool())
    .await?;
    row.as_ref().map(map_ai_feedback).transpose()
}

/// Stores feedback once per submission; a concurrent writer's row wins and is returned.
pub async fn save_ai_feedback(
    proxy: &DatabaseProxy,
    submission_id: &str,
    feedback: &ParsedFeedback,
) -> Result<AiFeedback, sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO "ai_feedback" ("id", "submissionId", "feedbackText", "strengths", "improvements", "suggestions")
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT ("submissionId") DO NOTHING
        "#,
    )
    .bind(new_id())
    .bind(submission_id)
    .bind(feedback.combined_text())
    .bind(&feedback.strengths)
    .bind(&feedback.improvements)
    .bind(&feedback.suggestions)
    .execute(proxy.pool())
    .await?;

    get_ai_feedback(proxy, submission_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn late_only_after_due_date() {
        assert!(!is_late(at(1, 10), at(1, 12)));
        assert!(!is_late(at(1, 12), at(1, 12)));
        assert!(is_late(at(2, 0), at(1, 12)));
    }

    #[test]
    fn percentage_only_for_graded() {
        assert_eq!(percentage_score(Some(45.0), 50, SubmissionStatus::Graded), Some(90.0));
        assert_eq!(percentage_score(Some(45.0), 50, SubmissionStatus::Submitted), None);
        assert_eq!(percentage_score(None, 50, SubmissionStatus::Graded), None);
        assert_eq!(percentage_score(Some(5.0), 0, SubmissionStatus::Graded), None);
    }
}
