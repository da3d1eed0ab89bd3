//! Achievement routes: publish-gated reads and admin CRUD.

use axum::{
    extract::Path,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{self, models::Achievement};
use crate::media::{self, MediaType};
use crate::routes::auth::{optional_auth, require_auth};
use crate::routes::{
    db_unavailable, double_option, internal_error, visible_to, ErrorResponse, SuccessResponse,
};

const ACHIEVEMENT_COLS: &str =
    "id, title, description, category, date, images, video_url, link, published, created_at";

const CATEGORIES: &[&str] = &["award", "participation", "certification", "social"];

fn is_valid_category(category: &str) -> bool {
    CATEGORIES.contains(&category)
}

fn sanitize_html(html: &str) -> String {
    ammonia::clean(html)
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementResponse {
    #[serde(flatten)]
    pub achievement: Achievement,
    pub image_urls: Vec<String>,
    pub video_embed_url: Option<String>,
}

impl From<Achievement> for AchievementResponse {
    fn from(achievement: Achievement) -> Self {
        Self {
            image_urls: media::resolve_media_urls(&achievement.images, MediaType::Image),
            video_embed_url: achievement
                .video_url
                .as_deref()
                .map(|u| media::resolve_media_url(u, MediaType::Video)),
            achievement,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAchievementRequest {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub images: Vec<String>,
    pub video_url: Option<String>,
    pub link: Option<String>,
    pub published: Option<bool>,
}

/// Nullable columns use a double `Option`: an absent field keeps the stored
/// value, an explicit JSON `null` clears it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAchievementRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub category: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub date: Option<Option<DateTime<Utc>>>,
    pub images: Option<Vec<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub video_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub link: Option<Option<String>>,
    pub published: Option<bool>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/achievements - list; admins also see unpublished rows
pub async fn list_achievements(headers: HeaderMap) -> impl IntoResponse {
    let is_admin = optional_auth(&headers).is_some();

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return db_unavailable().into_response(),
    };

    match sqlx::query_as::<_, Achievement>(&format!(
        "SELECT {} FROM achievements WHERE ($1 OR published = true) ORDER BY created_at DESC",
        ACHIEVEMENT_COLS
    ))
    .bind(is_admin)
    .fetch_all(pool.as_ref())
    .await
    {
        Ok(achievements) => {
            let items: Vec<AchievementResponse> = achievements
                .into_iter()
                .map(AchievementResponse::from)
                .collect();
            (StatusCode::OK, Json(items)).into_response()
        }
        Err(e) => {
            tracing::error!("Database error listing achievements: {}", e);
            internal_error("Failed to fetch achievements", &e).into_response()
        }
    }
}

/// GET /api/achievements/{id} - fetch one; unpublished rows 404 for public callers
pub async fn get_achievement(headers: HeaderMap, Path(id): Path<i32>) -> impl IntoResponse {
    let is_admin = optional_auth(&headers).is_some();

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return db_unavailable().into_response(),
    };

    match sqlx::query_as::<_, Achievement>(&format!(
        "SELECT {} FROM achievements WHERE id = $1",
        ACHIEVEMENT_COLS
    ))
    .bind(id)
    .fetch_optional(pool.as_ref())
    .await
    {
        Ok(Some(achievement)) if visible_to(is_admin, achievement.published) => {
            (StatusCode::OK, Json(AchievementResponse::from(achievement))).into_response()
        }
        Ok(_) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Achievement not found")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error fetching achievement {}: {}", id, e);
            internal_error("Failed to fetch achievement", &e).into_response()
        }
    }
}

/// POST /api/achievements - create (auth required)
pub async fn create_achievement(
    headers: HeaderMap,
    Json(payload): Json<CreateAchievementRequest>,
) -> impl IntoResponse {
    if let Err(err_response) = require_auth(&headers) {
        return err_response.into_response();
    }

    if payload.title.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Title is required")),
        )
            .into_response();
    }

    let category = payload.category.unwrap_or_else(|| "award".to_string());
    if !is_valid_category(&category) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(format!(
                "Invalid category. Valid categories: {:?}",
                CATEGORIES
            ))),
        )
            .into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return db_unavailable().into_response(),
    };

    match sqlx::query_as::<_, Achievement>(&format!(
        r#"
        INSERT INTO achievements
            (title, description, category, date, images, video_url, link, published)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {}
        "#,
        ACHIEVEMENT_COLS
    ))
    .bind(&payload.title)
    .bind(payload.description.as_deref().map(sanitize_html))
    .bind(&category)
    .bind(payload.date)
    .bind(&payload.images)
    .bind(&payload.video_url)
    .bind(&payload.link)
    .bind(payload.published.unwrap_or(false))
    .fetch_one(pool.as_ref())
    .await
    {
        Ok(achievement) => {
            (StatusCode::CREATED, Json(AchievementResponse::from(achievement))).into_response()
        }
        Err(e) => {
            tracing::error!("Database error creating achievement: {}", e);
            internal_error("Failed to create achievement", &e).into_response()
        }
    }
}

/// PUT /api/achievements/{id} - update (auth required); last write wins
pub async fn update_achievement(
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateAchievementRequest>,
) -> impl IntoResponse {
    if let Err(err_response) = require_auth(&headers) {
        return err_response.into_response();
    }

    if let Some(ref category) = payload.category {
        if !is_valid_category(category) {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(format!(
                    "Invalid category. Valid categories: {:?}",
                    CATEGORIES
                ))),
            )
                .into_response();
        }
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return db_unavailable().into_response(),
    };

    let existing = match sqlx::query_as::<_, Achievement>(&format!(
        "SELECT {} FROM achievements WHERE id = $1",
        ACHIEVEMENT_COLS
    ))
    .bind(id)
    .fetch_optional(pool.as_ref())
    .await
    {
        Ok(Some(a)) => a,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new("Achievement not found")),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!("Database error fetching achievement {}: {}", id, e);
            return internal_error("Failed to fetch achievement", &e).into_response();
        }
    };

    let title = payload.title.unwrap_or(existing.title);
    let description = match payload.description {
        Some(value) => value.as_deref().map(sanitize_html),
        None => existing.description,
    };
    let category = payload.category.unwrap_or(existing.category);
    let date = payload.date.unwrap_or(existing.date);
    let images = payload.images.unwrap_or(existing.images);
    let video_url = payload.video_url.unwrap_or(existing.video_url);
    let link = payload.link.unwrap_or(existing.link);
    let published = payload.published.unwrap_or(existing.published);

    match sqlx::query_as::<_, Achievement>(&format!(
        r#"
        UPDATE achievements
        SET title = $1, description = $2, category = $3, date = $4, images = $5,
            video_url = $6, link = $7, published = $8
        WHERE id = $9
        RETURNING {}
        "#,
        ACHIEVEMENT_COLS
    ))
    .bind(&title)
    .bind(&description)
    .bind(&category)
    .bind(date)
    .bind(&images)
    .bind(&video_url)
    .bind(&link)
    .bind(published)
    .bind(id)
    .fetch_one(pool.as_ref())
    .await
    {
        Ok(achievement) => {
            (StatusCode::OK, Json(AchievementResponse::from(achievement))).into_response()
        }
        Err(e) => {
            tracing::error!("Database error updating achievement {}: {}", id, e);
            internal_error("Failed to update achievement", &e).into_response()
        }
    }
}

/// DELETE /api/achievements/{id} - delete (auth required)
pub async fn delete_achievement(headers: HeaderMap, Path(id): Path<i32>) -> impl IntoResponse {
    if let Err(err_response) = require_auth(&headers) {
        return err_response.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return db_unavailable().into_response(),
    };

    match sqlx::query("DELETE FROM achievements WHERE id = $1")
        .bind(id)
        .execute(pool.as_ref())
        .await
    {
        Ok(result) => {
            if result.rows_affected() == 0 {
                return (
                    StatusCode::NOT_FOUND,
                    Json(ErrorResponse::new("Achievement not found")),
                )
                    .into_response();
            }
            (StatusCode::OK, Json(SuccessResponse { success: true })).into_response()
        }
        Err(e) => {
            tracing::error!("Database error deleting achievement {}: {}", id, e);
            internal_error("Failed to delete achievement", &e).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn test_router() -> Router {
        Router::new()
            .route(
                "/api/achievements",
                get(list_achievements).post(create_achievement),
            )
            .route(
                "/api/achievements/{id}",
                get(get_achievement)
                    .put(update_achievement)
                    .delete(delete_achievement),
            )
    }

    async fn send(app: Router, req: Request<Body>) -> StatusCode {
        app.oneshot(req).await.unwrap().status()
    }

    #[test]
    fn test_category_validation() {
        for valid in CATEGORIES {
            assert!(is_valid_category(valid));
        }
        assert!(!is_valid_category("trophy"));
        assert!(!is_valid_category(""));
    }

    #[tokio::test]
    async fn test_create_without_token_is_unauthorized() {
        let body = serde_json::json!({ "title": "Won something" });
        let req = Request::post("/api/achievements")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        assert_eq!(send(test_router(), req).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_list_without_database_is_service_unavailable() {
        let req = Request::get("/api/achievements").body(Body::empty()).unwrap();
        assert_eq!(
            send(test_router(), req).await,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_update_payload_distinguishes_null_from_absent() {
        let payload: UpdateAchievementRequest =
            serde_json::from_str(r#"{"link": null}"#).unwrap();
        assert_eq!(payload.link, Some(None));
        assert_eq!(payload.video_url, None);
    }

    #[test]
    fn test_response_resolves_image_references() {
        let achievement = Achievement {
            id: 1,
            title: "A".to_string(),
            description: None,
            category: "award".to_string(),
            date: None,
            images: vec![
                "drive://IMG1".to_string(),
                "local:/certs/a.png".to_string(),
            ],
            video_url: None,
            link: None,
            published: true,
            created_at: Utc::now(),
        };
        let response = AchievementResponse::from(achievement);
        assert_eq!(
            response.image_urls,
            vec![
                "https://lh3.googleusercontent.com/d/IMG1".to_string(),
                "/certs/a.png".to_string(),
            ]
        );
        assert!(response.video_embed_url.is_none());
    }
}
