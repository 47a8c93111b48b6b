use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::Row;

use super::user::full_name;
use super::{iso, iso_opt, new_id};
use crate::db::DatabaseProxy;
use crate::models::{FeedbackStatus, FeedbackType};
use crate::services::analytics::{average, rate, round1};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemFeedback {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub feedback_type: FeedbackType,
    pub subject: String,
    pub message: String,
    pub status: FeedbackStatus,
    pub admin_response: Option<String>,
    pub created_at: String,
    pub reviewed_at: Option<String>,
    pub reviewed_by: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Survey {
    pub id: String,
    pub course_id: String,
    pub course_title: String,
    pub student_id: String,
    pub student_name: String,
    pub content_quality_rating: i16,
    pub ai_assistance_rating: i16,
    pub overall_satisfaction: i16,
    pub comments: String,
    pub would_recommend: bool,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewSurvey {
    pub content_quality_rating: i16,
    pub ai_assistance_rating: i16,
    pub overall_satisfaction: i16,
    pub comments: String,
    pub would_recommend: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SurveySummary {
    pub total_surveys: usize,
    pub avg_content_quality: f64,
    pub avg_ai_assistance: f64,
    pub avg_overall_satisfaction: f64,
    pub recommend_rate: f64,
}

impl SurveySummary {
    pub fn from_surveys(surveys: &[Survey]) -> Self {
        let avg = |pick: fn(&Survey) -> i16| {
            let values: Vec<f64> = surveys.iter().map(|s| f64::from(pick(s))).collect();
            round1(average(&values))
        };
        let recommended = surveys.iter().filter(|s| s.would_recommend).count();

        Self {
            total_surveys: surveys.len(),
            avg_content_quality: avg(|s| s.content_quality_rating),
            avg_ai_assistance: avg(|s| s.ai_assistance_rating),
            avg_overall_satisfaction: avg(|s| s.overall_satisfaction),
            recommend_rate: round1(rate(recommended as i64, surveys.len() as i64)),
        }
    }
}

const FEEDBACK_SELECT: &str = r#"
    SELECT f."id", f."userId", u."username", f."feedbackType", f."subject", f."message", f."status",
           f."adminResponse", f."createdAt", f."reviewedAt", f."reviewedBy"
    FROM "system_feedback" f
    JOIN "users" u ON u."id" = f."userId"
"#;

fn map_feedback(row: &PgRow) -> Result<SystemFeedback, sqlx::Error> {
    let kind: String = row.try_get("feedbackType")?;
    let status: String = row.try_get("status")?;
    Ok(SystemFeedback {
        id: row.try_get("id")?,
        user_id: row.try_get("userId")?,
        username: row.try_get("username")?,
        feedback_type: FeedbackType::parse(&kind)
            .ok_or_else(|| sqlx::Error::Decode(format!("unknown feedback type {kind}").into()))?,
        subject: row.try_get("subject")?,
        message: row.try_get("message")?,
        status: FeedbackStatus::parse(&status)
            .ok_or_else(|| sqlx::Error::Decode(format!("unknown feedback status {status}").into()))?,
        admin_response: row.try_get("adminResponse")?,
        created_at: iso(row.try_get("createdAt")?),
        reviewed_at: iso_opt(row.try_get("reviewedAt")?),
        reviewed_by: row.try_get("reviewedBy")?,
    })
}

fn map_survey(row: &PgRow) -> Result<Survey, sqlx::Error> {
    let username: String = row.try_get("username")?;
    let first: String = row.try_get("firstName")?;
    let last: String = row.try_get("lastName")?;
    Ok(Survey {
        id: row.try_get("id")?,
        course_id: row.try_get("courseId")?,
        course_title: row.try_get("courseTitle")?,
        student_id: row.try_get("studentId")?,
        student_name: full_name(&first, &last, &username),
        content_quality_rating: row.try_get("contentQualityRating")?,
        ai_assistance_rating: row.try_get("aiAssistanceRating")?,
        overall_satisfaction: row.try_get("overallSatisfaction")?,
        comments: row.try_get("comments")?,
        would_recommend: row.try_get("wouldRecommend")?,
        created_at: iso(row.try_get("createdAt")?),
    })
}

// System feedback

pub async fn create_feedback(
    proxy: &DatabaseProxy,
    user_id: &str,
    feedback_type: FeedbackType,
    subject: &str,
    message: &str,
) -> Result<SystemFeedback, sqlx::Error> {
    let id = new_id();
    sqlx::query(
        r#"
        INSERT INTO "system_feedback" ("id", "userId", "feedbackType", "subject", "message")
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(feedback_type.as_str())
    .bind(subject)
    .bind(message)
    .execute(proxy.pool())
    .await?;

    get_feedback(proxy, &id).await?.ok_or(sqlx::Error::RowNotFound)
}

pub async fn get_feedback(
    proxy: &DatabaseProxy,
    feedback_id: &str,
) -> Result<Option<SystemFeedback>, sqlx::Error> {
    let sql = format!(r#"{FEEDBACK_SELECT} WHERE f."id" = $1"#);
    let row = sqlx::query(&sql)
        .bind(feedback_id)
        .fetch_optional(proxy.pool())
        .await?;
    row.as_ref().map(map_feedback).transpose()
}

pub async fn list_feedback_for_user(
    proxy: &DatabaseProxy,
    user_id: &str,
) -> Result<Vec<SystemFeedback>, sqlx::Error> {
    let sql = format!(r#"{FEEDBACK_SELECT} WHERE f."userId" = $1 ORDER BY f."createdAt" DESC"#);
    let rows = sqlx::query(&sql)
        .bind(user_id)
        .fetch_all(proxy.pool())
        .await?;
    rows.iter().map(map_feedback).collect()
}

pub async fn list_feedback(
    proxy: &DatabaseProxy,
    status: Option<FeedbackStatus>,
) -> Result<Vec<SystemFeedback>, sqlx::Error> {
    let sql = format!(
        r#"{FEEDBACK_SELECT} WHERE ($1::TEXT IS NULL OR f."status" = $1) ORDER BY f."createdAt" DESC"#
    );
    let rows = sqlx::query(&sql)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(proxy.pool())
        .await?;
    rows.iter().map(map_feedback).collect()
}

/// Records the admin's review. `admin_response: None` keeps any earlier response.
pub async fn review_feedback(
    proxy: &DatabaseProxy,
    feedback_id: &str,
    status: FeedbackStatus,
    admin_response: Option<&str>,
    reviewer_id: &str,
) -> Result<Option<SystemFeedback>, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE "system_feedback" SET
            "status" = $2,
            "adminResponse" = COALESCE($3, "adminResponse"),
            "reviewedAt" = (NOW() AT TIME ZONE 'utc'),
            "reviewedBy" = $4
        WHERE "id" = $1
        "#,
    )
    .bind(feedback_id)
    .bind(status.as_str())
    .bind(admin_response)
    .bind(reviewer_id)
    .execute(proxy.pool())
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_feedback(proxy, feedback_id).await
}

// Satisfaction surveys

/// Returns `None` when the student already rated the course.
pub async fn create_survey(
    proxy: &DatabaseProxy,
    course_id: &str,
    student_id: &str,
    survey: &NewSurvey,
) -> Result<Option<String>, sqlx::Error> {
    let id = new_id();
    let inserted = sqlx::query(
        r#"
        INSERT INTO "satisfaction_surveys"
            ("id", "courseId", "studentId", "contentQualityRating", "aiAssistanceRating",
             "overallSatisfaction", "comments", "wouldRecommend")
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT ("courseId", "studentId") DO NOTHING
        "#,
    )
    .bind(&id)
    .bind(course_id)
    .bind(student_id)
    .bind(survey.content_quality_rating)
    .bind(survey.ai_assistance_rating)
    .bind(survey.overall_satisfaction)
    .bind(&survey.comments)
    .bind(survey.would_recommend)
    .execute(proxy.pool())
    .await?
    .rows_affected();

    Ok((inserted > 0).then_some(id))
}

/// All surveys, or only those of courses taught by `teacher_id`.
pub async fn list_surveys(
    proxy: &DatabaseProxy,
    teacher_id: Option<&str>,
) -> Result<Vec<Survey>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT s."id", s."courseId", c."title" AS "courseTitle", s."studentId",
               u."username", u."firstName", u."lastName",
               s."contentQualityRating", s."aiAssistanceRating", s."overallSatisfaction",
               s."comments", s."wouldRecommend", s."createdAt"
        FROM "satisfaction_surveys" s
        JOIN "courses" c ON c."id" = s."courseId"
        JOIN "users" u ON u."id" = s."studentId"
        WHERE ($1::TEXT IS NULL OR c."teacherId" = $1)
        ORDER BY s."createdAt" DESC
        "#,
    )
    .bind(teacher_id)
    .fetch_all(proxy.pool())
    .await?;
    rows.iter().map(map_survey).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn survey(quality: i16, ai: i16, overall: i16, recommend: bool) -> Survey {
        Survey {
            id: "s".into(),
            course_id: "c".into(),
            course_title: "Course".into(),
            student_id: "u".into(),
            student_name: "Student".into(),
            content_quality_rating: quality,
            ai_assistance_rating: ai,
            overall_satisfaction: overall,
            comments: String::new(),
            would_recommend: recommend,
            created_at: "2024-01-01T00:00:00.000Z".into(),
        }
    }

    #[test]
    fn summary_of_no_surveys_is_zero() {
        let summary = SurveySummary::from_surveys(&[]);
        assert_eq!(summary.total_surveys, 0);
        assert_eq!(summary.avg_overall_satisfaction, 0.0);
        assert_eq!(summary.recommend_rate, 0.0);
    }

    #[test]
    fn summary_averages_and_recommend_rate() {
        let surveys = vec![
            survey(5, 4, 5, true),
            survey(4, 3, 4, true),
            survey(3, 2, 2, false),
        ];
        let summary = SurveySummary::from_surveys(&surveys);
        assert_eq!(summary.total_surveys, 3);
        assert_eq!(summary.avg_content_quality, 4.0);
        assert_eq!(summary.avg_ai_assistance, 3.0);
        assert_eq!(summary.avg_overall_satisfaction, 3.7);
        assert_eq!(summary.recommend_rate, 66.7);
    }
}
