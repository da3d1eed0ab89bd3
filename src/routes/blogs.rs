//! Blog routes: publish-gated reads (by id or slug) and admin CRUD.

use axum::{
    extract::Path,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::db::{self, models::Blog};
use crate::media::{self, MediaType};
use crate::routes::auth::{optional_auth, require_auth};
use crate::routes::{
    db_unavailable, double_option, internal_error, visible_to, ErrorResponse, SuccessResponse,
};

const BLOG_COLS: &str = "id, title, slug, excerpt, content, thumbnail, pdf_url, type, \
     read_time, video_url, published_at, published, created_at";

const BLOG_TYPES: &[&str] = &["article", "video", "tutorial"];

lazy_static::lazy_static! {
    /// Valid slug pattern: lowercase letters, numbers, and hyphens
    static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();
}

fn is_valid_slug(slug: &str) -> bool {
    SLUG_REGEX.is_match(slug)
}

fn sanitize_html(html: &str) -> String {
    ammonia::clean(html)
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    let msg = e.to_string();
    msg.contains("duplicate key") || msg.contains("unique constraint")
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Blog as served to clients, with resolved media URLs alongside the stored
/// reference forms.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogResponse {
    #[serde(flatten)]
    pub blog: Blog,
    pub thumbnail_url: Option<String>,
    pub pdf_preview_url: Option<String>,
    pub video_embed_url: Option<String>,
}

impl From<Blog> for BlogResponse {
    fn from(blog: Blog) -> Self {
        Self {
            thumbnail_url: blog
                .thumbnail
                .as_deref()
                .map(|u| media::resolve_media_url(u, MediaType::Image)),
            pdf_preview_url: blog
                .pdf_url
                .as_deref()
                .map(|u| media::resolve_media_url(u, MediaType::Pdf)),
            video_embed_url: blog
                .video_url
                .as_deref()
                .map(|u| media::resolve_media_url(u, MediaType::Video)),
            blog,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBlogRequest {
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub thumbnail: Option<String>,
    pub pdf_url: Option<String>,
    #[serde(rename = "type")]
    pub blog_type: Option<String>,
    pub read_time: Option<i32>,
    pub video_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub published: Option<bool>,
}

/// Nullable columns use a double `Option`: an absent field keeps the stored
/// value, an explicit JSON `null` clears it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBlogRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub excerpt: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub content: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub thumbnail: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub pdf_url: Option<Option<String>>,
    #[serde(rename = "type")]
    pub blog_type: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub read_time: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub video_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub published_at: Option<Option<DateTime<Utc>>>,
    pub published: Option<bool>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/blogs - list; admins also see unpublished rows
pub async fn list_blogs(headers: HeaderMap) -> impl IntoResponse {
    let is_admin = optional_auth(&headers).is_some();

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return db_unavailable().into_response(),
    };

    match sqlx::query_as::<_, Blog>(&format!(
        "SELECT {} FROM blogs WHERE ($1 OR published = true) ORDER BY created_at DESC",
        BLOG_COLS
    ))
    .bind(is_admin)
    .fetch_all(pool.as_ref())
    .await
    {
        Ok(blogs) => {
            let items: Vec<BlogResponse> = blogs.into_iter().map(BlogResponse::from).collect();
            (StatusCode::OK, Json(items)).into_response()
        }
        Err(e) => {
            tracing::error!("Database error listing blogs: {}", e);
            internal_error("Failed to fetch blogs", &e).into_response()
        }
    }
}

/// GET /api/blogs/{id} - fetch one by numeric id
pub async fn get_blog(headers: HeaderMap, Path(id): Path<i32>) -> impl IntoResponse {
    let is_admin = optional_auth(&headers).is_some();

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return db_unavailable().into_response(),
    };

    match sqlx::query_as::<_, Blog>(&format!("SELECT {} FROM blogs WHERE id = $1", BLOG_COLS))
        .bind(id)
        .fetch_optional(pool.as_ref())
        .await
    {
        Ok(Some(blog)) if visible_to(is_admin, blog.published) => {
            (StatusCode::OK, Json(BlogResponse::from(blog))).into_response()
        }
        Ok(_) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Blog not found")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error fetching blog {}: {}", id, e);
            internal_error("Failed to fetch blog", &e).into_response()
        }
    }
}

/// GET /api/blogs/slug/{slug} - fetch one by slug, the public routing key
pub async fn get_blog_by_slug(headers: HeaderMap, Path(slug): Path<String>) -> impl IntoResponse {
    if !is_valid_slug(&slug) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Invalid slug")),
        )
            .into_response();
    }

    let is_admin = optional_auth(&headers).is_some();

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return db_unavailable().into_response(),
    };

    match sqlx::query_as::<_, Blog>(&format!("SELECT {} FROM blogs WHERE slug = $1", BLOG_COLS))
        .bind(&slug)
        .fetch_optional(pool.as_ref())
        .await
    {
        Ok(Some(blog)) if visible_to(is_admin, blog.published) => {
            (StatusCode::OK, Json(BlogResponse::from(blog))).into_response()
        }
        Ok(_) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Blog not found")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error fetching blog '{}': {}", slug, e);
            internal_error("Failed to fetch blog", &e).into_response()
        }
    }
}

/// POST /api/blogs - create (auth required). Duplicate slugs are a 409.
pub async fn create_blog(
    headers: HeaderMap,
    Json(payload): Json<CreateBlogRequest>,
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

    if !is_valid_slug(&payload.slug) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "Slug must contain only lowercase letters, numbers, and hyphens",
            )),
        )
            .into_response();
    }

    let blog_type = payload.blog_type.unwrap_or_else(|| "article".to_string());
    if !BLOG_TYPES.contains(&blog_type.as_str()) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(format!(
                "Invalid type. Valid types: {:?}",
                BLOG_TYPES
            ))),
        )
            .into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return db_unavailable().into_response(),
    };

    let published = payload.published.unwrap_or(false);
    // First publish stamps published_at unless the admin backdated it.
    let published_at = payload
        .published_at
        .or_else(|| published.then(Utc::now));

    match sqlx::query_as::<_, Blog>(&format!(
        r#"
        INSERT INTO blogs
            (title, slug, excerpt, content, thumbnail, pdf_url, type, read_time,
             video_url, published_at, published)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {}
        "#,
        BLOG_COLS
    ))
    .bind(&payload.title)
    .bind(&payload.slug)
    .bind(payload.excerpt.as_deref().map(sanitize_html))
    .bind(payload.content.as_deref().map(sanitize_html))
    .bind(&payload.thumbnail)
    .bind(&payload.pdf_url)
    .bind(&blog_type)
    .bind(payload.read_time)
    .bind(&payload.video_url)
    .bind(published_at)
    .bind(published)
    .fetch_one(pool.as_ref())
    .await
    {
        Ok(blog) => (StatusCode::CREATED, Json(BlogResponse::from(blog))).into_response(),
        Err(e) if is_unique_violation(&e) => (
            StatusCode::CONFLICT,
            Json(ErrorResponse::new("Slug already exists")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error creating blog: {}", e);
            internal_error("Failed to create blog", &e).into_response()
        }
    }
}

/// PUT /api/blogs/{id} - update (auth required); last write wins
pub async fn update_blog(
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateBlogRequest>,
) -> impl IntoResponse {
    if let Err(err_response) = require_auth(&headers) {
        return err_response.into_response();
    }

    if let Some(ref blog_type) = payload.blog_type {
        if !BLOG_TYPES.contains(&blog_type.as_str()) {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(format!(
                    "Invalid type. Valid types: {:?}",
                    BLOG_TYPES
                ))),
            )
                .into_response();
        }
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return db_unavailable().into_response(),
    };

    let existing = match sqlx::query_as::<_, Blog>(&format!(
        "SELECT {} FROM blogs WHERE id = $1",
        BLOG_COLS
    ))
    .bind(id)
    .fetch_optional(pool.as_ref())
    .await
    {
        Ok(Some(blog)) => blog,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new("Blog not found")),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!("Database error fetching blog {}: {}", id, e);
            return internal_error("Failed to fetch blog", &e).into_response();
        }
    };

    let title = payload.title.unwrap_or(existing.title);
    let excerpt = match payload.excerpt {
        Some(value) => value.as_deref().map(sanitize_html),
        None => existing.excerpt,
    };
    let content = match payload.content {
        Some(value) => value.as_deref().map(sanitize_html),
        None => existing.content,
    };
    let thumbnail = payload.thumbnail.unwrap_or(existing.thumbnail);
    let pdf_url = payload.pdf_url.unwrap_or(existing.pdf_url);
    let blog_type = payload.blog_type.unwrap_or(existing.blog_type);
    let read_time = payload.read_time.unwrap_or(existing.read_time);
    let video_url = payload.video_url.unwrap_or(existing.video_url);
    let published = payload.published.unwrap_or(existing.published);
    // First publish stamps published_at unless the admin set or cleared it.
    let published_at = payload
        .published_at
        .unwrap_or(existing.published_at)
        .or_else(|| published.then(Utc::now));

    match sqlx::query_as::<_, Blog>(&format!(
        r#"
        UPDATE blogs
        SET title = $1, excerpt = $2, content = $3, thumbnail = $4, pdf_url = $5,
            type = $6, read_time = $7, video_url = $8, published_at = $9, published = $10
        WHERE id = $11
        RETURNING {}
        "#,
        BLOG_COLS
    ))
    .bind(&title)
    .bind(&excerpt)
    .bind(&content)
    .bind(&thumbnail)
    .bind(&pdf_url)
    .bind(&blog_type)
    .bind(read_time)
    .bind(&video_url)
    .bind(published_at)
    .bind(published)
    .bind(id)
    .fetch_one(pool.as_ref())
    .await
    {
        Ok(blog) => (StatusCode::OK, Json(BlogResponse::from(blog))).into_response(),
        Err(e) => {
            tracing::error!("Database error updating blog {}: {}", id, e);
            internal_error("Failed to update blog", &e).into_response()
        }
    }
}

/// DELETE /api/blogs/{id} - delete (auth required)
pub async fn delete_blog(headers: HeaderMap, Path(id): Path<i32>) -> impl IntoResponse {
    if let Err(err_response) = require_auth(&headers) {
        return err_response.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return db_unavailable().into_response(),
    };

    match sqlx::query("DELETE FROM blogs WHERE id = $1")
        .bind(id)
        .execute(pool.as_ref())
        .await
    {
        Ok(result) => {
            if result.rows_affected() == 0 {
                return (
                    StatusCode::NOT_FOUND,
                    Json(ErrorResponse::new("Blog not found")),
                )
                    .into_response();
            }
            (StatusCode::OK, Json(SuccessResponse { success: true })).into_response()
        }
        Err(e) => {
            tracing::error!("Database error deleting blog {}: {}", id, e);
            internal_error("Failed to delete blog", &e).into_response()
        }
    }
}
