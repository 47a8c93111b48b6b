use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::auth::AuthError;
use crate::services::llm_provider::LLMError;

#[derive(Debug, Serialize)]
pub struct SuccessResponse<T> {
    pub success: bool,
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

pub fn ok<T: Serialize>(data: T) -> Json<SuccessResponse<T>> {
    Json(SuccessResponse {
        success: true,
        data,
    })
}

pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<SuccessResponse<T>>) {
    (StatusCode::CREATED, ok(data))
}

pub fn message(text: impl Into<String>) -> Json<MessageResponse> {
    Json(MessageResponse {
        success: true,
        message: text.into(),
    })
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
}

#[derive(Debug, Clone)]
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
    is_operational: bool,
}

impl AppError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::CONFLICT, "CONFLICT", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::operational(
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            message,
        )
    }

    pub fn ai_service(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::BAD_GATEWAY, "AI_SERVICE_ERROR", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "INTERNAL_ERROR".to_string(),
            message: message.into(),
            is_operational: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    fn operational(
        status: StatusCode,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            is_operational: true,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = if self.is_operational {
            self.message
        } else {
            tracing::error!(code = %self.code, error = %self.message, "internal error");
            "Internal server error".to_string()
        };

        let body = ErrorResponse {
            success: false,
            error: message,
            code: self.code,
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if let Some(mapped) = db_err.code().as_deref().and_then(constraint_error) {
                return mapped;
            }
        }
        if matches!(err, sqlx::Error::RowNotFound) {
            return Self::not_found("Record not found");
        }
        Self::internal(format!("database error: {err}"))
    }
}

/// Postgres integrity violations that are the caller's fault rather than ours.
fn constraint_error(sqlstate: &str) -> Option<AppError> {
    match sqlstate {
        "23505" => Some(AppError::conflict("Record already exists")),
        "23503" => Some(AppError::bad_request("Referenced record does not exist")),
        "23514" => Some(AppError::validation("Value violates a constraint")),
        _ => None,
    }
}

impl From<LLMError> for AppError {
    fn from(err: LLMError) -> Self {
        match err {
            LLMError::Disabled => Self::service_unavailable("AI assistant is disabled"),
            LLMError::NotConfigured(_) => {
                Self::service_unavailable("AI assistant is not configured")
            }
            other => {
                tracing::warn!(error = %other, "AI provider call failed");
                Self::ai_service(format!("AI service error: {other}"))
            }
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Database(err) => err.into(),
            AuthError::MissingToken | AuthError::InvalidToken | AuthError::Expired => {
                Self::unauthorized("Invalid or expired session, please log in again")
            }
            other => Self::internal(format!("auth error: {other}")),
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: impl Into<String>,
    message: impl Into<String>,
) -> AppError {
    AppError {
        status,
        code: code.into(),
        message: message.into(),
        is_operational: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_404() {
        let err = AppError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unique_violation_maps_to_409() {
        let err = constraint_error("23505").unwrap();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "CONFLICT");
    }

    #[test]
    fn foreign_key_and_check_violations_map_to_400() {
        let fk = constraint_error("23503").unwrap();
        assert_eq!(fk.status(), StatusCode::BAD_REQUEST);
        assert_eq!(fk.code(), "BAD_REQUEST");

        let check = constraint_error("23514").unwrap();
        assert_eq!(check.status(), StatusCode::BAD_REQUEST);
        assert_eq!(check.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn other_sqlstates_are_not_mapped() {
        assert!(constraint_error("40001").is_none());
        assert!(constraint_error("").is_none());
    }

    #[test]
    fn llm_disabled_maps_to_503() {
        let err = AppError::from(LLMError::Disabled);
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn llm_empty_choice_maps_to_bad_gateway() {
        let err = AppError::from(LLMError::EmptyChoices);
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.code(), "AI_SERVICE_ERROR");
    }

    #[test]
    fn internal_errors_hide_their_message() {
        let response = AppError::internal("secret detail").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn expired_token_maps_to_401() {
        let err = AppError::from(AuthError::Expired);
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}
