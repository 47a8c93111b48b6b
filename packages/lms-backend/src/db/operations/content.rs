use chrono::NaiveDate;
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Row};

use super::user::full_name;
use super::{iso, like_pattern, new_id};
use crate::db::DatabaseProxy;
use crate::models::MaterialType;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub code: String,
    pub description: String,
    pub created_by: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub title: String,
    pub subject_id: String,
    pub subject_name: String,
    pub description: String,
    pub teacher_id: Option<String>,
    pub teacher_name: Option<String>,
    pub thumbnail_url: Option<String>,
    pub is_active: bool,
    pub material_count: i64,
    pub student_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub material_type: MaterialType,
    pub content: Option<String>,
    pub file_url: Option<String>,
    pub external_link: Option<String>,
    pub order: i32,
    pub uploaded_by: Option<String>,
    pub created_at: String,
}

/// A material together with the owning course fields needed for permission checks.
#[derive(Debug, Clone)]
pub struct MaterialWithCourse {
    pub material: Material,
    pub course_title: String,
    pub course_teacher_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub student_id: String,
    pub course_id: String,
    pub course_title: String,
    pub goal_text: String,
    pub target_date: NaiveDate,
    pub is_completed: bool,
    pub completed_date: Option<NaiveDate>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct CourseFilter {
    pub teacher_id: Option<String>,
    pub enrolled_student_id: Option<String>,
    pub active_only: bool,
    pub search: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewCourse {
    pub title: String,
    pub subject_id: String,
    pub description: String,
    pub teacher_id: Option<String>,
    pub thumbnail_url: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CourseUpdate {
    pub title: Option<String>,
    pub subject_id: Option<String>,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NewMaterial {
    pub course_id: String,
    pub title: String,
    pub material_type: MaterialType,
    pub content: Option<String>,
    pub file_url: Option<String>,
    pub external_link: Option<String>,
    pub order: i32,
    pub uploaded_by: String,
}

#[derive(Debug, Clone, Default)]
pub struct MaterialUpdate {
    pub title: Option<String>,
    pub material_type: Option<MaterialType>,
    /// `Some(None)` clears the column.
    pub content: Option<Option<String>>,
    pub file_url: Option<Option<String>>,
    pub external_link: Option<Option<String>>,
    pub order: Option<i32>,
}

const COURSE_SELECT: &str = r#"
    SELECT c."id", c."title", c."subjectId", s."name" AS "subjectName", c."description",
           c."teacherId", t."firstName" AS "teacherFirstName", t."lastName" AS "teacherLastName",
           t."username" AS "teacherUsername", c."thumbnailUrl", c."isActive",
           (SELECT COUNT(*) FROM "learning_materials" m WHERE m."courseId" = c."id") AS "materialCount",
           (SELECT COUNT(*) FROM "course_enrollments" e WHERE e."courseId" = c."id") AS "studentCount",
           c."createdAt", c."updatedAt"
    FROM "courses" c
    JOIN "subjects" s ON s."id" = c."subjectId"
    LEFT JOIN "users" t ON t."id" = c."teacherId"
"#;

const MATERIAL_COLUMNS: &str = r#"m."id", m."courseId", m."title", m."materialType", m."content",
    m."fileUrl", m."externalLink", m."order", m."uploadedBy", m."createdAt""#;

fn map_subject(row: &PgRow) -> Result<Subject, sqlx::Error> {
    Ok(Subject {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        code: row.try_get("code")?,
        description: row.try_get("description")?,
        created_by: row.try_get("createdBy")?,
        created_at: iso(row.try_get("createdAt")?),
    })
}

fn map_course(row: &PgRow) -> Result<Course, sqlx::Error> {
    let teacher_username: Option<String> = row.try_get("teacherUsername")?;
    let teacher_first: Option<String> = row.try_get("teacherFirstName")?;
    let teacher_last: Option<String> = row.try_get("teacherLastName")?;
    let teacher_name = teacher_username.map(|username| {
        full_name(
            teacher_first.as_deref().unwrap_or_default(),
            teacher_last.as_deref().unwrap_or_default(),
            &username,
        )
    });

    Ok(Course {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        subject_id: row.try_get("subjectId")?,
        subject_name: row.try_get("subjectName")?,
        description: row.try_get("description")?,
        teacher_id: row.try_get("teacherId")?,
        teacher_name,
        thumbnail_url: row.try_get("thumbnailUrl")?,
        is_active: row.try_get("isActive")?,
        material_count: row.try_get("materialCount")?,
        student_count: row.try_get("studentCount")?,
        created_at: iso(row.try_get("createdAt")?),
        updated_at: iso(row.try_get("updatedAt")?),
    })
}

fn map_material(row: &PgRow) -> Result<Material, sqlx::Error> {
    let kind: String = row.try_get("materialType")?;
    Ok(Material {
        id: row.try_get("id")?,
        course_id: row.try_get("courseId")?,
        title: row.try_get("title")?,
        material_type: MaterialType::parse(&kind)
            .ok_or_else(|| sqlx::Error::Decode(format!("unknown material type {kind}").into()))?,
        content: row.try_get("content")?,
        file_url: row.try_get("fileUrl")?,
        external_link: row.try_get("externalLink")?,
        order: row.try_get("order")?,
        uploaded_by: row.try_get("uploadedBy")?,
        created_at: iso(row.try_get("createdAt")?),
    })
}

fn map_goal(row: &PgRow) -> Result<Goal, sqlx::Error> {
    Ok(Goal {
        id: row.try_get("id")?,
        student_id: row.try_get("studentId")?,
        course_id: row.try_get("courseId")?,
        course_title: row.try_get("courseTitle")?,
        goal_text: row.try_get("goalText")?,
        target_date: row.try_get("targetDate")?,
        is_completed: row.try_get("isCompleted")?,
        completed_date: row.try_get("completedDate")?,
        created_at: iso(row.try_get("createdAt")?),
    })
}

// Subjects

pub async fn list_subjects(proxy: &DatabaseProxy) -> Result<Vec<Subject>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT "id", "name", "code", "description", "createdBy", "createdAt" FROM "subjects" ORDER BY "name""#,
    )
    .fetch_all(proxy.pool())
    .await?;
    rows.iter().map(map_subject).collect()
}

pub async fn create_subject(
    proxy: &DatabaseProxy,
    name: &str,
    code: &str,
    description: &str,
    created_by: &str,
) -> Result<Subject, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO "subjects" ("id", "name", "code", "description", "createdBy")
        VALUES ($1, $2, $3, $4, $5)
        RETURNING "id", "name", "code", "description", "createdBy", "createdAt"
        "#,
    )
    .bind(new_id())
    .bind(name)
    .bind(code)
    .bind(description)
    .bind(created_by)
    .fetch_one(proxy.pool())
    .await?;
    map_subject(&row)
}

pub async fn subject_exists(proxy: &DatabaseProxy, subject_id: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(r#"SELECT EXISTS(SELECT 1 FROM "subjects" WHERE "id" = $1)"#)
        .bind(subject_id)
        .fetch_one(proxy.pool())
        .await
}

// Courses

pub async fn list_courses(
    proxy: &DatabaseProxy,
    filter: &CourseFilter,
) -> Result<Vec<Course>, sqlx::Error> {
    let sql = format!(
        r#"{COURSE_SELECT}
        WHERE ($1::TEXT IS NULL OR c."teacherId" = $1)
          AND ($2::TEXT IS NULL OR EXISTS (
                SELECT 1 FROM "course_enrollments" e
                WHERE e."courseId" = c."id" AND e."studentId" = $2))
          AND (NOT $3 OR c."isActive")
          AND ($4::TEXT IS NULL OR c."title" ILIKE $4 OR c."description" ILIKE $4)
        ORDER BY c."createdAt" DESC
        "#
    );
    let search = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(like_pattern);

    let rows = sqlx::query(&sql)
        .bind(filter.teacher_id.as_deref())
        .bind(filter.enrolled_student_id.as_deref())
        .bind(filter.active_only)
        .bind(search)
        .fetch_all(proxy.pool())
        .await?;
    rows.iter().map(map_course).collect()
}

pub async fn get_course(
    proxy: &DatabaseProxy,
    course_id: &str,
) -> Result<Option<Course>, sqlx::Error> {
    let sql = format!(r#"{COURSE_SELECT} WHERE c."id" = $1"#);
    let row = sqlx::query(&sql)
        .bind(course_id)
        .fetch_optional(proxy.pool())
        .await?;
    row.as_ref().map(map_course).transpose()
}

pub async fn create_course(proxy: &DatabaseProxy, course: &NewCourse) -> Result<String, sqlx::Error> {
    let id = new_id();
    sqlx::query(
        r#"
        INSERT INTO "courses" ("id", "title", "subjectId", "description", "teacherId", "thumbnailUrl", "isActive")
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(&id)
    .bind(&course.title)
    .bind(&course.subject_id)
    .bind(&course.description)
    .bind(course.teacher_id.as_deref())
    .bind(course.thumbnail_url.as_deref())
    .bind(course.is_active)
    .execute(proxy.pool())
    .await?;
    Ok(id)
}

pub async fn update_course(
    proxy: &DatabaseProxy,
    course_id: &str,
    update: &CourseUpdate,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE "courses" SET
            "title" = COALESCE($2, "title"),
            "subjectId" = COALESCE($3, "subjectId"),
            "description" = COALESCE($4, "description"),
            "thumbnailUrl" = COALESCE($5, "thumbnailUrl"),
            "isActive" = COALESCE($6, "isActive"),
            "updatedAt" = (NOW() AT TIME ZONE 'utc')
        WHERE "id" = $1
        "#,
    )
    .bind(course_id)
    .bind(update.title.as_deref())
    .bind(update.subject_id.as_deref())
    .bind(update.description.as_deref())
    .bind(update.thumbnail_url.as_deref())
    .bind(update.is_active)
    .execute(proxy.pool())
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn course_teacher_id(
    proxy: &DatabaseProxy,
    course_id: &str,
) -> Result<Option<Option<String>>, sqlx::Error> {
    sqlx::query_scalar(r#"SELECT "teacherId" FROM "courses" WHERE "id" = $1"#)
        .bind(course_id)
        .fetch_optional(proxy.pool())
        .await
}

// Enrollment

pub async fn is_enrolled(
    proxy: &DatabaseProxy,
    course_id: &str,
    student_id: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        r#"SELECT EXISTS(SELECT 1 FROM "course_enrollments" WHERE "courseId" = $1 AND "studentId" = $2)"#,
    )
    .bind(course_id)
    .bind(student_id)
    .fetch_one(proxy.pool())
    .await
}

pub async fn enrolled_course_ids(
    proxy: &DatabaseProxy,
    student_id: &str,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        r#"SELECT "courseId" FROM "course_enrollments" WHERE "studentId" = $1 ORDER BY "enrolledAt""#,
    )
    .bind(student_id)
    .fetch_all(proxy.pool())
    .await
}

/// Creates the enrollment and its progress record. Returns `false` if already enrolled.
pub async fn enroll_student(
    proxy: &DatabaseProxy,
    course_id: &str,
    student_id: &str,
) -> Result<bool, sqlx::Error> {
    let mut tx = proxy.pool().begin().await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO "course_enrollments" ("courseId", "studentId")
        VALUES ($1, $2)
        ON CONFLICT ("courseId", "studentId") DO NOTHING
        "#,
    )
    .bind(course_id)
    .bind(student_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if inserted == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    ensure_progress(&mut tx, student_id, course_id).await?;
    tx.commit().await?;
    Ok(true)
}

/// Inserts a progress row with the current material count if none exists.
pub(crate) async fn ensure_progress(
    conn: &mut PgConnection,
    student_id: &str,
    course_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO "student_progress" ("id", "studentId", "courseId", "totalMaterials")
        VALUES ($1, $2, $3, (SELECT COUNT(*) FROM "learning_materials" WHERE "courseId" = $3))
        ON CONFLICT ("studentId", "courseId") DO NOTHING
        "#,
    )
    .bind(new_id())
    .bind(student_id)
    .bind(course_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Recounts totals and completions for every progress row of a course.
async fn resync_course_progress(conn: &mut PgConnection, course_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE "student_progress" sp SET
            "totalMaterials" = totals."total",
            "materialsCompleted" = LEAST(totals."total", (
                SELECT COUNT(*) FROM "material_views" mv
                JOIN "learning_materials" m ON m."id" = mv."materialId"
                WHERE mv."studentId" = sp."studentId" AND m."courseId" = sp."courseId")),
            "updatedAt" = (NOW() AT TIME ZONE 'utc')
        FROM (SELECT COUNT(*)::INTEGER AS "total" FROM "learning_materials" WHERE "courseId" = $1) totals
        WHERE sp."courseId" = $1
        "#,
    )
    .bind(course_id)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        UPDATE "student_progress" SET "completionPercentage" =
            CASE WHEN "totalMaterials" > 0
                 THEN LEAST(100.0, "materialsCompleted" * 100.0 / "totalMaterials")
                 ELSE 0 END
        WHERE "courseId" = $1
        "#,
    )
    .bind(course_id)
    .execute(conn)
    .await?;
    Ok(())
}

// Materials

pub async fn list_materials(
    proxy: &DatabaseProxy,
    course_id: &str,
) -> Result<Vec<Material>, sqlx::Error> {
    let sql = format!(
        r#"SELECT {MATERIAL_COLUMNS} FROM "learning_materials" m WHERE m."courseId" = $1 ORDER BY m."order", m."createdAt""#
    );
    let rows = sqlx::query(&sql)
        .bind(course_id)
        .fetch_all(proxy.pool())
        .await?;
    rows.iter().map(map_material).collect()
}

pub async fn get_material(
    proxy: &DatabaseProxy,
    material_id: &str,
) -> Result<Option<MaterialWithCourse>, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT {MATERIAL_COLUMNS}, c."title" AS "courseTitle", c."teacherId" AS "courseTeacherId"
        FROM "learning_materials" m
        JOIN "courses" c ON c."id" = m."courseId"
        WHERE m."id" = $1
        "#
    );
    let row = sqlx::query(&sql)
        .bind(material_id)
        .fetch_optional(proxy.pool())
        .await?;

    row.map(|row| {
        Ok(MaterialWithCourse {
            material: map_material(&row)?,
            course_title: row.try_get("courseTitle")?,
            course_teacher_id: row.try_get("courseTeacherId")?,
        })
    })
    .transpose()
}

pub async fn create_material(
    proxy: &DatabaseProxy,
    material: &NewMaterial,
) -> Result<Material, sqlx::Error> {
    let mut tx = proxy.pool().begin().await?;
    let sql = format!(
        r#"
        INSERT INTO "learning_materials" AS m
            ("id", "courseId", "title", "materialType", "content", "fileUrl", "externalLink", "order", "uploadedBy")
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {MATERIAL_COLUMNS}
        "#
    );
    let row = sqlx::query(&sql)
        .bind(new_id())
        .bind(&material.course_id)
        .bind(&material.title)
        .bind(material.material_type.as_str())
        .bind(material.content.as_deref())
        .bind(material.file_url.as_deref())
        .bind(material.external_link.as_deref())
        .bind(material.order)
        .bind(&material.uploaded_by)
        .fetch_one(&mut *tx)
        .await?;
    let created = map_material(&row)?;

    resync_course_progress(&mut tx, &material.course_id).await?;
    tx.commit().await?;
    Ok(created)
}

pub async fn update_material(
    proxy: &DatabaseProxy,
    material_id: &str,
    update: &MaterialUpdate,
) -> Result<Option<Material>, sqlx::Error> {
    let sql = format!(
        r#"
        UPDATE "learning_materials" AS m SET
            "title" = COALESCE($2, m."title"),
            "materialType" = COALESCE($3, m."materialType"),
            "content" = CASE WHEN $4 THEN $5 ELSE m."content" END,
            "fileUrl" = CASE WHEN $6 THEN $7 ELSE m."fileUrl" END,
            "externalLink" = CASE WHEN $8 THEN $9 ELSE m."externalLink" END,
            "order" = COALESCE($10, m."order")
        WHERE m."id" = $1
        RETURNING {MATERIAL_COLUMNS}
        "#
    );
    let row = sqlx::query(&sql)
        .bind(material_id)
        .bind(update.title.as_deref())
        .bind(update.material_type.map(|t| t.as_str()))
        .bind(update.content.is_some())
        .bind(update.content.clone().flatten())
        .bind(update.file_url.is_some())
        .bind(update.file_url.clone().flatten())
        .bind(update.external_link.is_some())
        .bind(update.external_link.clone().flatten())
        .bind(update.order)
        .fetch_optional(proxy.pool())
        .await?;
    row.as_ref().map(map_material).transpose()
}

pub async fn delete_material(
    proxy: &DatabaseProxy,
    material_id: &str,
    course_id: &str,
) -> Result<bool, sqlx::Error> {
    let mut tx = proxy.pool().begin().await?;
    let deleted = sqlx::query(r#"DELETE FROM "learning_materials" WHERE "id" = $1"#)
        .bind(material_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    resync_course_progress(&mut tx, course_id).await?;
    tx.commit().await?;
    Ok(deleted > 0)
}

// Goals

const GOAL_SELECT: &str = r#"
    SELECT g."id", g."studentId", g."courseId", c."title" AS "courseTitle", g."goalText",
           g."targetDate", g."isCompleted", g."completedDate", g."createdAt"
    FROM "learning_goals" g
    JOIN "courses" c ON c."id" = g."courseId"
"#;

pub async fn list_goals(proxy: &DatabaseProxy, student_id: &str) -> Result<Vec<Goal>, sqlx::Error> {
    let sql = format!(r#"{GOAL_SELECT} WHERE g."studentId" = $1 ORDER BY g."targetDate", g."createdAt""#);
    let rows = sqlx::query(&sql)
        .bind(student_id)
        .fetch_all(proxy.pool())
        .await?;
    rows.iter().map(map_goal).collect()
}

pub async fn get_goal(proxy: &DatabaseProxy, goal_id: &str) -> Result<Option<Goal>, sqlx::Error> {
    let sql = format!(r#"{GOAL_SELECT} WHERE g."id" = $1"#);
    let row = sqlx::query(&sql)
        .bind(goal_id)
        .fetch_optional(proxy.pool())
        .await?;
    row.as_ref().map(map_goal).transpose()
}

pub async fn create_goal(
    proxy: &DatabaseProxy,
    student_id: &str,
    course_id: &str,
    goal_text: &str,
    target_date: NaiveDate,
) -> Result<String, sqlx::Error> {
    let id = new_id();
    sqlx::query(
        r#"
        INSERT INTO "learning_goals" ("id", "studentId", "courseId", "goalText", "targetDate")
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(&id)
    .bind(student_id)
    .bind(course_id)
    .bind(goal_text)
    .bind(target_date)
    .execute(proxy.pool())
    .await?;
    Ok(id)
}

pub async fn complete_goal(
    proxy: &DatabaseProxy,
    goal_id: &str,
    completed_on: NaiveDate,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE "learning_goals" SET "isCompleted" = TRUE, "completedDate" = $2 WHERE "id" = $1"#,
    )
    .bind(goal_id)
    .bind(completed_on)
    .execute(proxy.pool())
    .await?;
    Ok(())
}
