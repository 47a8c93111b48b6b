use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::db::operations::analytics::log_activity_best_effort;
use crate::db::operations::assistant::{self as chat_ops, Conversation, GeneratedContent, Message};
use crate::db::operations::content;
use crate::db::DatabaseProxy;
use crate::models::{ActivityType, GeneratedContentType, MessageType};
use crate::response::{created, message, ok, AppError};
use crate::services::access::require_student;
use crate::services::assistant::{
    clamp_question_count, conversation_title, explanation_stored_prompt, normalize_level,
    practice_stored_prompt, summary_stored_prompt, truncate_chars, SUMMARY_MAX_LENGTH,
};
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: i64 = 10;
const DEFAULT_HISTORY_LIMIT: i64 = 20;
const MAX_LIST_LIMIT: i64 = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chat", post(chat))
        .route("/conversations", get(list_conversations))
        .route(
            "/conversations/:id",
            get(conversation_detail).delete(delete_conversation),
        )
        .route("/generate/summary", post(generate_summary))
        .route("/generate/explanation", post(generate_explanation))
        .route("/generate/questions", post(generate_questions))
        .route("/history", get(history))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    message: String,
    conversation_id: Option<String>,
    course_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatResponse {
    conversation_id: String,
    user_message: Message,
    ai_response: Message,
    timestamp: String,
}

#[derive(Serialize)]
struct ConversationDetail {
    conversation: Conversation,
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryRequest {
    content: String,
    max_length: Option<usize>,
    course_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExplanationRequest {
    topic: String,
    level: Option<String>,
    course_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuestionsRequest {
    topic: String,
    count: Option<i64>,
    course_id: Option<String>,
}

fn clamp_limit(limit: Option<i64>, default: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, MAX_LIST_LIMIT)
}

fn required<'a>(value: &'a str, field: &str) -> Result<&'a str, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    Ok(trimmed)
}

async fn record_interaction(proxy: &DatabaseProxy, user: &AuthUser, course_id: Option<&str>, what: &str) {
    if user.is_student() {
        log_activity_best_effort(proxy, &user.id, course_id, ActivityType::AiInteraction, what).await;
    }
}

async fn chat(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<ChatRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_student(&user)?;
    let text = required(&payload.message, "message")?;
    let proxy = state.require_db()?;

    let (conversation_id, course_id, history) = match payload.conversation_id.as_deref() {
        Some(id) => {
            let conversation = chat_ops::get_own_conversation(&proxy, id, &user.id)
                .await?
                .ok_or_else(|| AppError::not_found("Conversation not found"))?;
            let history: Vec<_> = chat_ops::list_messages(&proxy, id)
                .await?
                .iter()
                .map(Message::history_entry)
                .collect();
            (conversation.id, conversation.course_id, history)
        }
        None => {
            if let Some(course_id) = payload.course_id.as_deref() {
                if !content::is_enrolled(&proxy, course_id, &user.id).await? {
                    return Err(AppError::forbidden("You are not enrolled in this course"));
                }
            }
            let id = chat_ops::create_conversation(
                &proxy,
                &user.id,
                payload.course_id.as_deref(),
                &conversation_title(text),
            )
            .await?;
            (id, payload.course_id.clone(), Vec::new())
        }
    };

    let user_message =
        chat_ops::add_message(&proxy, &conversation_id, MessageType::User, text).await?;

    let reply = state.assistant().chat(text, &history).await.map_err(|err| {
        tracing::warn!(conversation_id = %conversation_id, error = %err, "chat reply failed");
        AppError::from(err)
    })?;

    let ai_response =
        chat_ops::add_message(&proxy, &conversation_id, MessageType::Ai, &reply).await?;
    record_interaction(
        &proxy,
        &user,
        course_id.as_deref(),
        &format!("Asked AI: {}", truncate_chars(text, 50)),
    )
    .await;

    Ok(ok(ChatResponse {
        conversation_id,
        user_message,
        ai_response,
        timestamp: crate::auth::format_naive_datetime_iso_millis(Utc::now().naive_utc()),
    }))
}

async fn list_conversations(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<LimitQuery>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;
    let limit = clamp_limit(query.limit, DEFAULT_LIST_LIMIT);
    Ok(ok(chat_ops::list_conversations(&proxy, &user.id, limit).await?))
}

async fn conversation_detail(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(conversation_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;
    let conversation = chat_ops::get_own_conversation(&proxy, &conversation_id, &user.id)
        .await?
        .ok_or_else(|| AppError::not_found("Conversation not found"))?;
    let messages = chat_ops::list_messages(&proxy, &conversation_id).await?;
    Ok(ok(ConversationDetail {
        conversation,
        messages,
    }))
}

async fn delete_conversation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(conversation_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;
    if !chat_ops::delete_own_conversation(&proxy, &conversation_id, &user.id).await? {
        return Err(AppError::not_found("Conversation not found"));
    }
    Ok(message("Conversation deleted"))
}

async fn store_generated(
    proxy: &DatabaseProxy,
    user: &AuthUser,
    course_id: Option<&str>,
    content_type: GeneratedContentType,
    prompt: &str,
    generated: &str,
) -> Result<GeneratedContent, AppError> {
    let stored =
        chat_ops::save_generated_content(proxy, &user.id, course_id, content_type, prompt, generated)
            .await?;
    record_interaction(
        proxy,
        user,
        course_id,
        &format!("Generated {}", content_type.as_str().to_ascii_lowercase()),
    )
    .await;
    Ok(stored)
}

async fn generate_summary(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<SummaryRequest>,
) -> Result<impl IntoResponse, AppError> {
    let source = required(&payload.content, "content")?;
    let max_length = payload.max_length.unwrap_or(SUMMARY_MAX_LENGTH).max(1);
    let proxy = state.require_db()?;

    let summary = state.assistant().summarize(source, max_length).await?;
    let stored = store_generated(
        &proxy,
        &user,
        payload.course_id.as_deref(),
        GeneratedContentType::Summary,
        &summary_stored_prompt(source),
        &summary,
    )
    .await?;
    Ok(created(stored))
}

async fn generate_explanation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<ExplanationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let topic = required(&payload.topic, "topic")?;
    let level = normalize_level(payload.level.as_deref())
        .ok_or_else(|| AppError::validation("level must be beginner, intermediate or advanced"))?;
    let proxy = state.require_db()?;

    let explanation = state.assistant().explain(topic, level).await?;
    let stored = store_generated(
        &proxy,
        &user,
        payload.course_id.as_deref(),
        GeneratedContentType::Explanation,
        &explanation_stored_prompt(topic, level),
        &explanation,
    )
    .await?;
    Ok(created(stored))
}

async fn generate_questions(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<QuestionsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let topic = required(&payload.topic, "topic")?;
    let count = clamp_question_count(payload.count);
    let proxy = state.require_db()?;

    let questions = state.assistant().practice_questions(topic, count).await?;
    let stored = store_generated(
        &proxy,
        &user,
        payload.course_id.as_deref(),
        GeneratedContentType::Practice,
        &practice_stored_prompt(topic, count),
        &questions,
    )
    .await?;
    Ok(created(stored))
}

async fn history(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<LimitQuery>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;
    let limit = clamp_limit(query.limit, DEFAULT_HISTORY_LIMIT);
    Ok(ok(chat_ops::list_generated_content(&proxy, &user.id, limit).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_limit_is_bounded() {
        assert_eq!(clamp_limit(None, DEFAULT_LIST_LIMIT), 10);
        assert_eq!(clamp_limit(Some(0), DEFAULT_LIST_LIMIT), 1);
        assert_eq!(clamp_limit(Some(500), DEFAULT_LIST_LIMIT), 100);
    }

    #[test]
    fn blank_fields_are_rejected() {
        assert!(required("   ", "message").is_err());
        assert_eq!(required("  hi ", "message").unwrap(), "hi");
    }
}
