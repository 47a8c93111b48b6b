use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::Row;

use super::{iso, new_id};
use crate::db::DatabaseProxy;
use crate::models::Role;

const USER_COLUMNS: &str = r#""id", "seq", "email", "username", "passwordHash", "role", "firstName",
    "lastName", "phoneNumber", "dateOfBirth", "bio", "createdAt", "updatedAt""#;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub bio: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    pub student_id: String,
    pub enrollment_date: NaiveDate,
    pub grade_level: String,
    pub learning_preferences: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherProfile {
    pub employee_id: String,
    pub department: String,
    pub specialization: String,
    pub qualification: String,
    pub join_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Profile {
    Student(StudentProfile),
    Teacher(TeacherProfile),
}

#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub username: &'a str,
    pub password_hash: &'a str,
    pub role: Role,
    pub first_name: &'a str,
    pub last_name: &'a str,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub bio: Option<String>,
}

pub fn full_name(first: &str, last: &str, username: &str) -> String {
    let joined = format!("{} {}", first.trim(), last.trim());
    let joined = joined.trim();
    if joined.is_empty() {
        username.to_string()
    } else {
        joined.to_string()
    }
}

pub fn student_number(seq: i64) -> String {
    format!("STU{seq:06}")
}

pub fn employee_number(seq: i64) -> String {
    format!("EMP{seq:06}")
}

fn map_user(row: &PgRow) -> Result<User, sqlx::Error> {
    let role: String = row.try_get("role")?;
    let first_name: String = row.try_get("firstName")?;
    let last_name: String = row.try_get("lastName")?;
    let username: String = row.try_get("username")?;
    let created_at: NaiveDateTime = row.try_get("createdAt")?;
    let updated_at: NaiveDateTime = row.try_get("updatedAt")?;

    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        role: Role::parse(&role).ok_or_else(|| sqlx::Error::Decode(
            format!("unknown role {role}").into(),
        ))?,
        full_name: full_name(&first_name, &last_name, &username),
        username,
        first_name,
        last_name,
        phone_number: row.try_get("phoneNumber")?,
        date_of_birth: row.try_get("dateOfBirth")?,
        bio: row.try_get("bio")?,
        created_at: iso(created_at),
        updated_at: iso(updated_at),
    })
}

pub async fn find_user_by_id(
    proxy: &DatabaseProxy,
    user_id: &str,
) -> Result<Option<User>, sqlx::Error> {
    let sql = format!(r#"SELECT {USER_COLUMNS} FROM "users" WHERE "id" = $1"#);
    let row = sqlx::query(&sql)
        .bind(user_id)
        .fetch_optional(proxy.pool())
        .await?;
    row.as_ref().map(map_user).transpose()
}

/// Looks a user up by email or username and returns it with its password hash.
pub async fn find_user_for_login(
    proxy: &DatabaseProxy,
    login: &str,
) -> Result<Option<(User, String)>, sqlx::Error> {
    let sql = format!(
        r#"SELECT {USER_COLUMNS} FROM "users" WHERE LOWER("email") = LOWER($1) OR "username" = $1 LIMIT 1"#
    );
    let row = sqlx::query(&sql)
        .bind(login.trim())
        .fetch_optional(proxy.pool())
        .await?;

    match row {
        Some(row) => {
            let hash: String = row.try_get("passwordHash")?;
            Ok(Some((map_user(&row)?, hash)))
        }
        None => Ok(None),
    }
}

pub async fn email_or_username_taken(
    proxy: &DatabaseProxy,
    email: &str,
    username: &str,
) -> Result<bool, sqlx::Error> {
    let taken: bool = sqlx::query_scalar(
        r#"SELECT EXISTS(SELECT 1 FROM "users" WHERE LOWER("email") = LOWER($1) OR "username" = $2)"#,
    )
    .bind(email)
    .bind(username)
    .fetch_one(proxy.pool())
    .await?;
    Ok(taken)
}

/// Inserts the user and, for students and teachers, the matching profile in one transaction.
pub async fn create_user_with_profile(
    proxy: &DatabaseProxy,
    new_user: NewUser<'_>,
) -> Result<User, sqlx::Error> {
    let mut tx = proxy.pool().begin().await?;
    let user_id = new_id();

    let sql = format!(
        r#"
        INSERT INTO "users" ("id", "email", "username", "passwordHash", "role", "firstName", "lastName")
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {USER_COLUMNS}
        "#
    );
    let row = sqlx::query(&sql)
        .bind(&user_id)
        .bind(new_user.email.trim())
        .bind(new_user.username.trim())
        .bind(new_user.password_hash)
        .bind(new_user.role.as_str())
        .bind(new_user.first_name.trim())
        .bind(new_user.last_name.trim())
        .fetch_one(&mut *tx)
        .await?;
    let seq: i64 = row.try_get("seq")?;
    let user = map_user(&row)?;

    match new_user.role {
        Role::Student => {
            sqlx::query(
                r#"INSERT INTO "student_profiles" ("id", "userId", "studentId") VALUES ($1, $2, $3)"#,
            )
            .bind(new_id())
            .bind(&user_id)
            .bind(student_number(seq))
            .execute(&mut *tx)
            .await?;
        }
        Role::Teacher => {
            sqlx::query(
                r#"
                INSERT INTO "teacher_profiles" ("id", "userId", "employeeId", "department")
                VALUES ($1, $2, $3, 'General')
                "#,
            )
            .bind(new_id())
            .bind(&user_id)
            .bind(employee_number(seq))
            .execute(&mut *tx)
            .await?;
        }
        Role::Admin => {}
    }

    tx.commit().await?;
    Ok(user)
}

pub async fn get_profile(
    proxy: &DatabaseProxy,
    user_id: &str,
    role: Role,
) -> Result<Option<Profile>, sqlx::Error> {
    match role {
        Role::Student => {
            let row = sqlx::query(
                r#"
                SELECT "studentId", "enrollmentDate", "gradeLevel", "learningPreferences"
                FROM "student_profiles" WHERE "userId" = $1
                "#,
            )
            .bind(user_id)
            .fetch_optional(proxy.pool())
            .await?;
            row.map(|row| {
                Ok(Profile::Student(StudentProfile {
                    student_id: row.try_get("studentId")?,
                    enrollment_date: row.try_get("enrollmentDate")?,
                    grade_level: row.try_get("gradeLevel")?,
                    learning_preferences: row.try_get("learningPreferences")?,
                }))
            })
            .transpose()
        }
        Role::Teacher => {
            let row = sqlx::query(
                r#"
                SELECT "employeeId", "department", "specialization", "qualification", "joinDate"
                FROM "teacher_profiles" WHERE "userId" = $1
                "#,
            )
            .bind(user_id)
            .fetch_optional(proxy.pool())
            .await?;
            row.map(|row| {
                Ok(Profile::Teacher(TeacherProfile {
                    employee_id: row.try_get("employeeId")?,
                    department: row.try_get("department")?,
                    specialization: row.try_get("specialization")?,
                    qualification: row.try_get("qualification")?,
                    join_date: row.try_get("joinDate")?,
                }))
            })
            .transpose()
        }
        Role::Admin => Ok(None),
    }
}

pub async fn update_profile(
    proxy: &DatabaseProxy,
    user_id: &str,
    update: &ProfileUpdate,
) -> Result<Option<User>, sqlx::Error> {
    let sql = format!(
        r#"
        UPDATE "users" SET
            "firstName" = COALESCE($2, "firstName"),
            "lastName" = COALESCE($3, "lastName"),
            "phoneNumber" = COALESCE($4, "phoneNumber"),
            "dateOfBirth" = COALESCE($5, "dateOfBirth"),
            "bio" = COALESCE($6, "bio"),
            "updatedAt" = (NOW() AT TIME ZONE 'utc')
        WHERE "id" = $1
        RETURNING {USER_COLUMNS}
        "#
    );
    let row = sqlx::query(&sql)
        .bind(user_id)
        .bind(update.first_name.as_deref())
        .bind(update.last_name.as_deref())
        .bind(update.phone_number.as_deref())
        .bind(update.date_of_birth)
        .bind(update.bio.as_deref())
        .fetch_optional(proxy.pool())
        .await?;
    row.as_ref().map(map_user).transpose()
}

pub async fn get_password_hash(
    proxy: &DatabaseProxy,
    user_id: &str,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar(r#"SELECT "passwordHash" FROM "users" WHERE "id" = $1"#)
        .bind(user_id)
        .fetch_optional(proxy.pool())
        .await
}

/// Replaces the hash and drops every session of the user except `keep_token_hash`.
pub async fn update_password(
    proxy: &DatabaseProxy,
    user_id: &str,
    password_hash: &str,
    keep_token_hash: Option<&str>,
) -> Result<(), sqlx::Error> {
    let mut tx = proxy.pool().begin().await?;
    sqlx::query(
        r#"UPDATE "users" SET "passwordHash" = $2, "updatedAt" = (NOW() AT TIME ZONE 'utc') WHERE "id" = $1"#,
    )
    .bind(user_id)
    .bind(password_hash)
    .execute(&mut *tx)
    .await?;
    sqlx::query(r#"DELETE FROM "sessions" WHERE "userId" = $1 AND "token" IS DISTINCT FROM $2"#)
        .bind(user_id)
        .bind(keep_token_hash)
        .execute(&mut *tx)
        .await?;
    tx.commit().await
}

pub async fn list_users(
    proxy: &DatabaseProxy,
    role: Option<Role>,
) -> Result<Vec<User>, sqlx::Error> {
    let sql = format!(
        r#"SELECT {USER_COLUMNS} FROM "users" WHERE ($1::TEXT IS NULL OR "role" = $1) ORDER BY "createdAt" DESC"#
    );
    let rows = sqlx::query(&sql)
        .bind(role.map(|r| r.as_str()))
        .fetch_all(proxy.pool())
        .await?;
    rows.iter().map(map_user).collect()
}

pub async fn delete_expired_sessions(proxy: &DatabaseProxy) -> Result<u64, sqlx::Error> {
    let result =
        sqlx::query(r#"DELETE FROM "sessions" WHERE "expiresAt" < (NOW() AT TIME ZONE 'utc')"#)
            .execute(proxy.pool())
            .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_numbers_are_zero_padded() {
        assert_eq!(student_number(7), "STU000007");
        assert_eq!(employee_number(123456), "EMP123456");
    }

    #[test]
    fn full_name_falls_back_to_username() {
        assert_eq!(full_name("Ada", "Lovelace", "ada"), "Ada Lovelace");
        assert_eq!(full_name("", "  ", "ada"), "ada");
        assert_eq!(full_name("Ada", "", "ada"), "Ada");
    }
}
