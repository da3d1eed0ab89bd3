//! Contact routes: public form submission, admin message management.

use axum::{
    extract::Path,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::db::{self, models::ContactMessage};
use crate::routes::auth::require_auth;
use crate::routes::{db_unavailable, internal_error, ErrorResponse, SuccessResponse};

const MESSAGE_COLS: &str = "id, name, email, message, read, created_at";

/// Keep form submissions within sane bounds; the public endpoint is
/// unauthenticated.
const MAX_MESSAGE_LEN: usize = 10_000;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SubmitMessageRequest {
    pub name: String,
    pub email: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitMessageResponse {
    pub message: String,
    pub id: i32,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/contact - public form submission; new messages start unread
pub async fn submit_message(Json(payload): Json<SubmitMessageRequest>) -> impl IntoResponse {
    if payload.name.trim().is_empty()
        || payload.email.trim().is_empty()
        || payload.message.trim().is_empty()
    {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Name, email and message are required")),
        )
            .into_response();
    }

    if !payload.email.contains('@') {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Invalid email format")),
        )
            .into_response();
    }

    if payload.message.len() > MAX_MESSAGE_LEN {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Message is too long")),
        )
            .into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return db_unavailable().into_response(),
    };

    match sqlx::query_as::<_, (i32,)>(
        r#"
        INSERT INTO contact_messages (name, email, message)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(payload.name.trim())
    .bind(payload.email.trim())
    .bind(&payload.message)
    .fetch_one(pool.as_ref())
    .await
    {
        Ok((id,)) => (
            StatusCode::CREATED,
            Json(SubmitMessageResponse {
                message: "Message sent successfully".to_string(),
                id,
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error saving contact message: {}", e);
            internal_error("Failed to send message", &e).into_response()
        }
    }
}

/// GET /api/contact - admin list, newest first
pub async fn list_messages(headers: HeaderMap) -> impl IntoResponse {
    if let Err(err_response) = require_auth(&headers) {
        return err_response.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return db_unavailable().into_response(),
    };

    match sqlx::query_as::<_, ContactMessage>(&format!(
        "SELECT {} FROM contact_messages ORDER BY created_at DESC",
        MESSAGE_COLS
    ))
    .fetch_all(pool.as_ref())
    .await
    {
        Ok(messages) => (StatusCode::OK, Json(messages)).into_response(),
        Err(e) => {
            tracing::error!("Database error listing contact messages: {}", e);
            internal_error("Failed to fetch messages", &e).into_response()
        }
    }
}

/// PATCH /api/contact/{id}/read - mark one message read (auth required)
pub async fn mark_message_read(headers: HeaderMap, Path(id): Path<i32>) -> impl IntoResponse {
    if let Err(err_response) = require_auth(&headers) {
        return err_response.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return db_unavailable().into_response(),
    };

    match sqlx::query_as::<_, ContactMessage>(&format!(
        "UPDATE contact_messages SET read = true WHERE id = $1 RETURNING {}",
        MESSAGE_COLS
    ))
    .bind(id)
    .fetch_optional(pool.as_ref())
    .await
    {
        Ok(Some(message)) => (StatusCode::OK, Json(message)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Message not found")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error marking message {} read: {}", id, e);
            internal_error("Failed to update message", &e).into_response()
        }
    }
}

/// DELETE /api/contact/{id} - delete one message (auth required)
pub async fn delete_message(headers: HeaderMap, Path(id): Path<i32>) -> impl IntoResponse {
    if let Err(err_response) = require_auth(&headers) {
        return err_response.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return db_unavailable().into_response(),
    };

    match sqlx::query("DELETE FROM contact_messages WHERE id = $1")
        .bind(id)
        .execute(pool.as_ref())
        .await
    {
        Ok(result) => {
            if result.rows_affected() == 0 {
                return (
                    StatusCode::NOT_FOUND,
                    Json(ErrorResponse::new("Message not found")),
                )
                    .into_response();
            }
            (StatusCode::OK, Json(SuccessResponse { success: true })).into_response()
        }
        Err(e) => {
            tracing::error!("Database error deleting message {}: {}", id, e);
            internal_error("Failed to delete message", &e).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::{delete, patch, post};
    use axum::Router;
    use tower::ServiceExt;

    fn test_router() -> Router {
        Router::new()
            .route("/api/contact", post(submit_message).get(list_messages))
            .route("/api/contact/{id}/read", patch(mark_message_read))
            .route("/api/contact/{id}", delete(delete_message))
    }

    async fn send(app: Router, req: Request<Body>) -> StatusCode {
        app.oneshot(req).await.unwrap().status()
    }

    async fn submit(body: serde_json::Value) -> StatusCode {
        let req = Request::post("/api/contact")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        send(test_router(), req).await
    }

    #[tokio::test]
    async fn test_submit_missing_fields_is_bad_request() {
        let status = submit(serde_json::json!({
            "name": "",
            "email": "a@b.c",
            "message": "hi"
        }))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_submit_invalid_email_is_bad_request() {
        let status = submit(serde_json::json!({
            "name": "A",
            "email": "not-an-email",
            "message": "hi"
        }))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_submit_oversized_message_is_bad_request() {
        let status = submit(serde_json::json!({
            "name": "A",
            "email": "a@b.c",
            "message": "x".repeat(MAX_MESSAGE_LEN + 1)
        }))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_valid_submit_without_database_is_service_unavailable() {
        let status = submit(serde_json::json!({
            "name": "A",
            "email": "a@b.c",
            "message": "hello there"
        }))
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_list_without_token_is_unauthorized() {
        let req = Request::get("/api/contact").body(Body::empty()).unwrap();
        assert_eq!(send(test_router(), req).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_mark_read_without_token_is_unauthorized() {
        let req = Request::patch("/api/contact/1/read")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(test_router(), req).await, StatusCode::UNAUTHORIZED);
    }
}
