mod analytics;
mod assignments;
mod assistant;
mod auth;
mod courses;
mod dashboard;
mod feedback;
mod goals;
mod health;
mod materials;
mod subjects;
mod submissions;
mod users;

use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;

use crate::middleware::auth::require_auth;
use crate::response::json_error;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(auth::session_router())
        .nest("/users", users::router())
        .nest("/dashboard", dashboard::router())
        .nest("/subjects", subjects::router())
        .nest("/courses", courses::router())
        .nest("/materials", materials::router())
        .nest("/goals", goals::router())
        .nest("/assignments", assignments::router())
        .nest("/submissions", submissions::router())
        .nest("/assistant", assistant::router())
        .nest("/analytics", analytics::router())
        .nest("/feedback", feedback::router())
        .nest("/surveys", feedback::survey_router())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    Router::new()
        .nest("/health", health::router())
        .nest("/api", api)
        .fallback(fallback_handler)
        .with_state(state)
}

async fn fallback_handler() -> Response {
    json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "Endpoint not found").into_response()
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use axum::Extension;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::auth::AuthUser;
    use crate::models::Role;

    fn signed_in(role: Role) -> Router {
        let user = AuthUser {
            id: "user-1".to_string(),
            email: "user@example.com".to_string(),
            username: "user_1".to_string(),
            role,
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            created_at: "2024-01-01T00:00:00.000Z".to_string(),
        };
        let api = Router::new()
            .nest("/assignments", assignments::router())
            .nest("/submissions", submissions::router())
            .nest("/assistant", assistant::router())
            .nest("/surveys", feedback::survey_router())
            .layer(Extension(user));
        Router::new().nest("/api", api).with_state(AppState::new(None))
    }

    fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder().method(method).uri(uri);
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn assert_forbidden(role: Role, req: Request<Body>) {
        let response = signed_in(role).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn teacher_cannot_chat_with_assistant() {
        let req = request("POST", "/api/assistant/chat", Some(json!({ "message": "hi" })));
        assert_forbidden(Role::Teacher, req).await;
    }

    #[tokio::test]
    async fn student_cannot_list_surveys() {
        assert_forbidden(Role::Student, request("GET", "/api/surveys", None)).await;
    }

    #[tokio::test]
    async fn admin_cannot_create_assignment() {
        let req = request(
            "POST",
            "/api/assignments",
            Some(json!({ "courseId": "course-1", "title": "Essay" })),
        );
        assert_forbidden(Role::Admin, req).await;
    }

    #[tokio::test]
    async fn student_cannot_list_submissions() {
        assert_forbidden(Role::Student, request("GET", "/api/submissions", None)).await;
    }

    #[tokio::test]
    async fn permitted_role_reaches_the_database_check() {
        let response = signed_in(Role::Teacher)
            .oneshot(request("GET", "/api/submissions", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
