use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::Row;

use super::{iso, new_id};
use crate::db::DatabaseProxy;
use crate::models::{GeneratedContentType, MessageType};
use crate::services::assistant::HistoryEntry;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub course_id: Option<String>,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
    pub message_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub message_type: MessageType,
    pub content: String,
    pub created_at: String,
}

impl Message {
    pub fn history_entry(&self) -> HistoryEntry {
        HistoryEntry {
            message_type: self.message_type,
            content: self.content.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedContent {
    pub id: String,
    pub user_id: String,
    pub course_id: Option<String>,
    pub content_type: GeneratedContentType,
    pub prompt: String,
    pub generated_content: String,
    pub created_at: String,
}

const CONVERSATION_SELECT: &str = r#"
    SELECT c."id", c."userId", c."courseId", c."title", c."createdAt", c."updatedAt",
           (SELECT COUNT(*) FROM "ai_messages" m WHERE m."conversationId" = c."id") AS "messageCount"
    FROM "ai_conversations" c
"#;

fn map_conversation(row: &PgRow) -> Result<Conversation, sqlx::Error> {
    Ok(Conversation {
        id: row.try_get("id")?,
        user_id: row.try_get("userId")?,
        course_id: row.try_get("courseId")?,
        title: row.try_get("title")?,
        created_at: iso(row.try_get("createdAt")?),
        updated_at: iso(row.try_get("updatedAt")?),
        message_count: row.try_get("messageCount")?,
    })
}

fn map_message(row: &PgRow) -> Result<Message, sqlx::Error> {
    let kind: String = row.try_get("messageType")?;
    Ok(Message {
        id: row.try_get("id")?,
        conversation_id: row.try_get("conversationId")?,
        message_type: MessageType::parse(&kind)
            .ok_or_else(|| sqlx::Error::Decode(format!("unknown message type {kind}").into()))?,
        content: row.try_get("content")?,
        created_at: iso(row.try_get("createdAt")?),
    })
}

fn map_generated(row: &PgRow) -> Result<GeneratedContent, sqlx::Error> {
    let kind: String = row.try_get("contentType")?;
    Ok(GeneratedContent {
        id: row.try_get("id")?,
        user_id: row.try_get("userId")?,
        course_id: row.try_get("courseId")?,
        content_type: GeneratedContentType::parse(&kind)
            .ok_or_else(|| sqlx::Error::Decode(format!("unknown content type {kind}").into()))?,
        prompt: row.try_get("prompt")?,
        generated_content: row.try_get("generatedContent")?,
        created_at: iso(row.try_get("createdAt")?),
    })
}

pub async fn create_conversation(
    proxy: &DatabaseProxy,
    user_id: &str,
    course_id: Option<&str>,
    title: &str,
) -> Result<String, sqlx::Error> {
    let id = new_id();
    sqlx::query(
        r#"INSERT INTO "ai_conversations" ("id", "userId", "courseId", "title") VALUES ($1, $2, $3, $4)"#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(course_id)
    .bind(title)
    .execute(proxy.pool())
    .await?;
    Ok(id)
}

pub async fn list_conversations(
    proxy: &DatabaseProxy,
    user_id: &str,
    limit: i64,
) -> Result<Vec<Conversation>, sqlx::Error> {
    let sql = format!(r#"{CONVERSATION_SELECT} WHERE c."userId" = $1 ORDER BY c."updatedAt" DESC LIMIT $2"#);
    let rows = sqlx::query(&sql)
        .bind(user_id)
        .bind(limit)
        .fetch_all(proxy.pool())
        .await?;
    rows.iter().map(map_conversation).collect()
}

/// Conversation owned by `user_id`; someone else's conversation reads as absent.
pub async fn get_own_conversation(
    proxy: &DatabaseProxy,
    conversation_id: &str,
    user_id: &str,
) -> Result<Option<Conversation>, sqlx::Error> {
    let sql = format!(r#"{CONVERSATION_SELECT} WHERE c."id" = $1 AND c."userId" = $2"#);
    let row = sqlx::query(&sql)
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(proxy.pool())
        .await?;
    row.as_ref().map(map_conversation).transpose()
}

pub async fn delete_own_conversation(
    proxy: &DatabaseProxy,
    conversation_id: &str,
    user_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(r#"DELETE FROM "ai_conversations" WHERE "id" = $1 AND "userId" = $2"#)
        .bind(conversation_id)
        .bind(user_id)
        .execute(proxy.pool())
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Appends a message and bumps the conversation's `updatedAt`.
pub async fn add_message(
    proxy: &DatabaseProxy,
    conversation_id: &str,
    message_type: MessageType,
    content: &str,
) -> Result<Message, sqlx::Error> {
    let mut tx = proxy.pool().begin().await?;
    let row = sqlx::query(
        r#"
        INSERT INTO "ai_messages" ("id", "conversationId", "messageType", "content")
        VALUES ($1, $2, $3, $4)
        RETURNING "id", "conversationId", "messageType", "content", "createdAt"
        "#,
    )
    .bind(new_id())
    .bind(conversation_id)
    .bind(message_type.as_str())
    .bind(content)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        r#"UPDATE "ai_conversations" SET "updatedAt" = (NOW() AT TIME ZONE 'utc') WHERE "id" = $1"#,
    )
    .bind(conversation_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    map_message(&row)
}

/// Messages in the order they were written.
pub async fn list_messages(
    proxy: &DatabaseProxy,
    conversation_id: &str,
) -> Result<Vec<Message>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT "id", "conversationId", "messageType", "content", "createdAt"
        FROM "ai_messages" WHERE "conversationId" = $1
        ORDER BY "seq"
        "#,
    )
    .bind(conversation_id)
    .fetch_all(proxy.pool())
    .await?;
    rows.iter().map(map_message).collect()
}

pub async fn save_generated_content(
    proxy: &DatabaseProxy,
    user_id: &str,
    course_id: Option<&str>,
    content_type: GeneratedContentType,
    prompt: &str,
    generated: &str,
) -> Result<GeneratedContent, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO "ai_generated_content" ("id", "userId", "courseId", "contentType", "prompt", "generatedContent")
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING "id", "userId", "courseId", "contentType", "prompt", "generatedContent", "createdAt"
        "#,
    )
    .bind(new_id())
    .bind(user_id)
    .bind(course_id)
    .bind(content_type.as_str())
    .bind(prompt)
    .bind(generated)
    .fetch_one(proxy.pool())
    .await?;
    map_generated(&row)
}

pub async fn list_generated_content(
    proxy: &DatabaseProxy,
    user_id: &str,
    limit: i64,
) -> Result<Vec<GeneratedContent>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT "id", "userId", "courseId", "contentType", "prompt", "generatedContent", "createdAt"
        FROM "ai_generated_content" WHERE "userId" = $1
        ORDER BY "createdAt" DESC
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(proxy.pool())
    .await?;
    rows.iter().map(map_generated).collect()
}
