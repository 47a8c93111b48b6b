use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

mod common;

use common::{create_test_app, get, json_body, post_json};

#[tokio::test]
async fn test_health_live() {
    let app = create_test_app().await;

    let response = app.oneshot(get("/health/live")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "alive");
}

#[tokio::test]
async fn test_health_root_without_database() {
    let app = create_test_app().await;

    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_health_info() {
    let app = create_test_app().await;

    let response = app.oneshot(get("/health/info")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["service"], "lms-backend");
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let app = create_test_app().await;

    let response = app.oneshot(get("/api/does-not-exist")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_unauthorized_without_token() {
    for uri in [
        "/api/users/me",
        "/api/dashboard",
        "/api/courses",
        "/api/assignments",
        "/api/assistant/conversations",
        "/api/analytics/progress",
        "/api/auth/verify",
    ] {
        let app = create_test_app().await;
        let response = app.oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }
}

#[tokio::test]
async fn test_protected_post_without_token() {
    let app = create_test_app().await;

    let response = app
        .oneshot(post_json("/api/assistant/chat", json!({ "message": "hi" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_token_without_database_is_unavailable() {
    let app = create_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/users/me")
                .header("authorization", "Bearer some.jwt.token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_register_rejects_invalid_email() {
    let app = create_test_app().await;

    let response = app
        .oneshot(post_json(
            "/api/auth/register",
            json!({ "email": "not-an-email", "username": "ada", "password": "Password123" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_register_rejects_admin_role() {
    let app = create_test_app().await;

    let response = app
        .oneshot(post_json(
            "/api/auth/register",
            json!({
                "email": "root@example.com",
                "username": "root_user",
                "password": "Password123",
                "role": "ADMIN"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_weak_password() {
    let app = create_test_app().await;

    let response = app
        .oneshot(post_json(
            "/api/auth/register",
            json!({ "email": "ada@example.com", "username": "ada", "password": "short" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_valid_without_database() {
    let app = create_test_app().await;

    let response = app
        .oneshot(post_json(
            "/api/auth/register",
            json!({
                "email": "ada@example.com",
                "username": "ada_l",
                "password": "Password123",
                "firstName": "Ada",
                "lastName": "Lovelace"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_login_requires_credentials() {
    let app = create_test_app().await;

    let response = app
        .oneshot(post_json(
            "/api/auth/login",
            json!({ "login": "  ", "password": "" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
