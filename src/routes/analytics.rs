//! Analytics: append-only view tracking and the admin dashboard aggregate.
//!
//! Tracking endpoints are public and fire-and-forget from the browser's
//! perspective; failures are logged so operators can see pipeline breakage,
//! but nothing is retried or queued. The dashboard is computed synchronously
//! per request with no caching; cost grows with the size of the log tables,
//! which is acceptable at the traffic this site sees.

use axum::{
    extract::{ConnectInfo, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::net::SocketAddr;

use crate::db;
use crate::media::{self, MediaType};
use crate::routes::auth::require_auth;
use crate::routes::{db_unavailable, internal_error, ErrorResponse, SuccessResponse};

const CONTENT_TYPES: &[&str] = &["project", "blog", "achievement"];

fn is_valid_content_type(content_type: &str) -> bool {
    CONTENT_TYPES.contains(&content_type)
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PageViewRequest {
    pub page: String,
    pub referrer: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentViewRequest {
    pub content_type: String,
    pub content_id: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub overview: Overview,
    pub charts: Charts,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_projects: i64,
    pub total_blogs: i64,
    pub total_experiences: i64,
    pub total_achievements: i64,
    pub total_messages: i64,
    pub unread_messages: i64,
    pub total_page_views: i64,
    pub total_content_views: i64,
    pub recent_page_views: i64,
    pub recent_messages: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Charts {
    pub page_views_by_day: Vec<DailyCount>,
    pub top_pages: Vec<PageCount>,
    pub top_projects: Vec<TopContent>,
    pub top_blogs: Vec<TopContent>,
}

#[derive(Debug, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct PageCount {
    pub page: String,
    pub views: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopContent {
    pub id: i32,
    pub title: String,
    pub thumbnail: Option<String>,
    pub thumbnail_url: Option<String>,
    pub views: i64,
}

#[derive(Debug, Serialize)]
pub struct ContentViewCountResponse {
    pub views: i64,
}

// ============================================================================
// Tracking handlers
// ============================================================================

/// POST /api/analytics/page-view - public, append one page view event
pub async fn record_page_view(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(payload): Json<PageViewRequest>,
) -> impl IntoResponse {
    if payload.page.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Page is required")),
        )
            .into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            tracing::warn!("page view dropped: database pool not initialized");
            return db_unavailable().into_response();
        }
    };

    let ip_address = addr.ip().to_string();
    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    match sqlx::query(
        r#"
        INSERT INTO page_views (page, ip_address, user_agent, referrer)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(&payload.page)
    .bind(&ip_address)
    .bind(&user_agent)
    .bind(&payload.referrer)
    .execute(pool.as_ref())
    .await
    {
        Ok(_) => (StatusCode::OK, Json(SuccessResponse { success: true })).into_response(),
        Err(e) => {
            // Loud log, quiet response: callers never retry tracking writes.
            tracing::error!(page = %payload.page, error = %e, "failed to track page view");
            internal_error("Failed to track page view", &e).into_response()
        }
    }
}

/// POST /api/analytics/content-view - public, append one content view event
pub async fn record_content_view(
    Json(payload): Json<ContentViewRequest>,
) -> impl IntoResponse {
    if !is_valid_content_type(&payload.content_type) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(format!(
                "Invalid content type. Valid types: {:?}",
                CONTENT_TYPES
            ))),
        )
            .into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            tracing::warn!("content view dropped: database pool not initialized");
            return db_unavailable().into_response();
        }
    };

    match sqlx::query("INSERT INTO content_views (content_type, content_id) VALUES ($1, $2)")
        .bind(&payload.content_type)
        .bind(payload.content_id)
        .execute(pool.as_ref())
        .await
    {
        Ok(_) => (StatusCode::OK, Json(SuccessResponse { success: true })).into_response(),
        Err(e) => {
            tracing::error!(
                content_type = %payload.content_type,
                content_id = payload.content_id,
                error = %e,
                "failed to track content view"
            );
            internal_error("Failed to track content view", &e).into_response()
        }
    }
}

// ============================================================================
// Dashboard
// ============================================================================

/// GET /api/analytics/dashboard - full aggregate report (auth required)
pub async fn dashboard(headers: HeaderMap) -> impl IntoResponse {
    if let Err(err_response) = require_auth(&headers) {
        return err_response.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return db_unavailable().into_response(),
    };

    match compute_dashboard(pool.as_ref()).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => {
            tracing::error!("Database error computing dashboard: {}", e);
            internal_error("Failed to fetch analytics", &e).into_response()
        }
    }
}

/// One synchronous pass over the content and log tables. Top-N queries break
/// count ties on ascending id/page so repeated calls return stable results.
async fn compute_dashboard(pool: &PgPool) -> Result<DashboardResponse, sqlx::Error> {
    let now = Utc::now();
    let thirty_days_ago = now - Duration::days(30);
    let seven_days_ago = now - Duration::days(7);

    let (
        total_projects,
        total_blogs,
        total_experiences,
        total_achievements,
        total_messages,
        unread_messages,
        total_page_views,
        total_content_views,
        recent_page_views,
        recent_messages,
    ): (i64, i64, i64, i64, i64, i64, i64, i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM projects),
            (SELECT COUNT(*) FROM blogs),
            (SELECT COUNT(*) FROM experiences),
            (SELECT COUNT(*) FROM achievements),
            (SELECT COUNT(*) FROM contact_messages),
            (SELECT COUNT(*) FROM contact_messages WHERE read = false),
            (SELECT COUNT(*) FROM page_views),
            (SELECT COUNT(*) FROM content_views),
            (SELECT COUNT(*) FROM page_views WHERE created_at >= $1),
            (SELECT COUNT(*) FROM contact_messages WHERE created_at >= $2)
        "#,
    )
    .bind(thirty_days_ago)
    .bind(seven_days_ago)
    .fetch_one(pool)
    .await?;

    let page_views_by_day: Vec<(NaiveDate, i64)> = sqlx::query_as(
        r#"
        SELECT created_at::date AS date, COUNT(*) AS count
        FROM page_views
        WHERE created_at >= $1
        GROUP BY created_at::date
        ORDER BY date DESC
        "#,
    )
    .bind(thirty_days_ago)
    .fetch_all(pool)
    .await?;

    let top_pages: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT page, COUNT(*) AS views
        FROM page_views
        WHERE created_at >= $1
        GROUP BY page
        ORDER BY views DESC, page ASC
        LIMIT 10
        "#,
    )
    .bind(thirty_days_ago)
    .fetch_all(pool)
    .await?;

    let top_projects = top_content(pool, "project", "projects").await?;
    let top_blogs = top_content(pool, "blog", "blogs").await?;

    Ok(DashboardResponse {
        overview: Overview {
            total_projects,
            total_blogs,
            total_experiences,
            total_achievements,
            total_messages,
            unread_messages,
            total_page_views,
            total_content_views,
            recent_page_views,
            recent_messages,
        },
        charts: Charts {
            page_views_by_day: page_views_by_day
                .into_iter()
                .map(|(date, count)| DailyCount { date, count })
                .collect(),
            top_pages: top_pages
                .into_iter()
                .map(|(page, views)| PageCount { page, views })
                .collect(),
            top_projects,
            top_blogs,
        },
    })
}

/// Top 5 most-viewed rows of one content table, all-time, joined back to
/// id/title/thumbnail. Views of since-deleted content drop out of the join.
async fn top_content(
    pool: &PgPool,
    content_type: &str,
    table: &str,
) -> Result<Vec<TopContent>, sqlx::Error> {
    let rows: Vec<(i32, String, Option<String>, i64)> = sqlx::query_as(&format!(
        r#"
        SELECT c.id, c.title, c.thumbnail, COUNT(*) AS views
        FROM content_views v
        JOIN {} c ON c.id = v.content_id
        WHERE v.content_type = $1
        GROUP BY c.id, c.title, c.thumbnail
        ORDER BY views DESC, c.id ASC
        LIMIT 5
        "#,
        table
    ))
    .bind(content_type)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, title, thumbnail, views)| TopContent {
            thumbnail_url: thumbnail
                .as_deref()
                .map(|u| media::resolve_media_url(u, MediaType::Image)),
            id,
            title,
            thumbnail,
            views,
        })
        .collect())
}

/// GET /api/analytics/content/{contentType}/{contentId} - view count for one
/// content item (auth required)
pub async fn content_view_count(
    headers: HeaderMap,
    Path((content_type, content_id)): Path<(String, i32)>,
) -> impl IntoResponse {
    if let Err(err_response) = require_auth(&headers) {
        return err_response.into_response();
    }

    if !is_valid_content_type(&content_type) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(format!(
                "Invalid content type. Valid types: {:?}",
                CONTENT_TYPES
            ))),
        )
            .into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return db_unavailable().into_response(),
    };

    match sqlx::query_as::<_, (i64,)>(
        "SELECT COUNT(*) FROM content_views WHERE content_type = $1 AND content_id = $2",
    )
    .bind(&content_type)
    .bind(content_id)
    .fetch_one(pool.as_ref())
    .await
    {
        Ok((views,)) => {
            (StatusCode::OK, Json(ContentViewCountResponse { views })).into_response()
        }
        Err(e) => {
            tracing::error!("Database error counting content views: {}", e);
            internal_error("Failed to fetch content views", &e).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::Request;
    use axum::routing::{get, post};
    use axum::Router;
    use tower::ServiceExt;

    fn test_router() -> Router {
        Router::new()
            .route("/api/analytics/page-view", post(record_page_view))
            .route("/api/analytics/content-view", post(record_content_view))
            .route("/api/analytics/dashboard", get(dashboard))
            .route(
                "/api/analytics/content/{content_type}/{content_id}",
                get(content_view_count),
            )
            .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 12345))))
    }

    async fn send(app: Router, req: Request<Body>) -> StatusCode {
        app.oneshot(req).await.unwrap().status()
    }

    async fn post_json(uri: &str, body: serde_json::Value) -> StatusCode {
        let req = Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        send(test_router(), req).await
    }

    #[test]
    fn test_content_type_validation() {
        for valid in CONTENT_TYPES {
            assert!(is_valid_content_type(valid));
        }
        assert!(!is_valid_content_type("page"));
        assert!(!is_valid_content_type(""));
    }

    #[tokio::test]
    async fn test_page_view_requires_page() {
        let status = post_json(
            "/api/analytics/page-view",
            serde_json::json!({ "page": "" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_content_view_rejects_unknown_type() {
        let status = post_json(
            "/api/analytics/content-view",
            serde_json::json!({ "contentType": "banner", "contentId": 1 }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_tracking_without_database_is_service_unavailable() {
        let status = post_json(
            "/api/analytics/page-view",
            serde_json::json!({ "page": "/projects" }),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_dashboard_without_token_is_unauthorized() {
        let req = Request::get("/api/analytics/dashboard")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(test_router(), req).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_content_count_without_token_is_unauthorized() {
        let req = Request::get("/api/analytics/content/project/1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(test_router(), req).await, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_top_content_resolves_thumbnail() {
        let entry = TopContent {
            id: 1,
            title: "T".to_string(),
            thumbnail: Some("drive://X".to_string()),
            thumbnail_url: Some(media::resolve_media_url("drive://X", MediaType::Image)),
            views: 3,
        };
        assert_eq!(
            entry.thumbnail_url.as_deref(),
            Some("https://lh3.googleusercontent.com/d/X")
        );
    }
}
