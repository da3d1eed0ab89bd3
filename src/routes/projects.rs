//! Project routes: publish-gated reads and admin CRUD.

use axum::{
    extract::Path,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{self, models::Project};
use crate::media::{self, MediaType};
use crate::routes::auth::{optional_auth, require_auth};
use crate::routes::{
    db_unavailable, double_option, internal_error, visible_to, ErrorResponse, SuccessResponse,
};

const PROJECT_COLS: &str = "id, title, description, challenge, contribution, technologies, \
     thumbnail, hero_image, video_url, github_url, live_url, accuracy, speed, images, \
     start_date, end_date, published, created_at";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Project as served to clients: the stored row plus resolved media URLs,
/// so no rendering surface needs its own Drive-link regexes.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectResponse {
    #[serde(flatten)]
    pub project: Project,
    pub thumbnail_url: Option<String>,
    pub hero_image_url: Option<String>,
    pub video_embed_url: Option<String>,
    pub image_urls: Vec<String>,
}

impl From<Project> for ProjectResponse {
    fn from(project: Project) -> Self {
        let resolve_image = |url: &Option<String>| {
            url.as_deref()
                .map(|u| media::resolve_media_url(u, MediaType::Image))
        };
        Self {
            thumbnail_url: resolve_image(&project.thumbnail),
            hero_image_url: resolve_image(&project.hero_image),
            video_embed_url: project
                .video_url
                .as_deref()
                .map(|u| media::resolve_media_url(u, MediaType::Video)),
            image_urls: media::resolve_media_urls(&project.images, MediaType::Image),
            project,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub challenge: Option<String>,
    pub contribution: Option<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
    pub thumbnail: Option<String>,
    pub hero_image: Option<String>,
    pub video_url: Option<String>,
    pub github_url: Option<String>,
    pub live_url: Option<String>,
    pub accuracy: Option<String>,
    pub speed: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub published: Option<bool>,
}

/// Nullable columns use a double `Option`: an absent field keeps the stored
/// value, an explicit JSON `null` clears it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub challenge: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub contribution: Option<Option<String>>,
    pub technologies: Option<Vec<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub thumbnail: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub hero_image: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub video_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub github_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub live_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub accuracy: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub speed: Option<Option<String>>,
    pub images: Option<Vec<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub start_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub end_date: Option<Option<DateTime<Utc>>>,
    pub published: Option<bool>,
}

/// Rich-text fields come from the admin editor as HTML; clean them on write.
fn sanitize_html(html: &str) -> String {
    ammonia::clean(html)
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/projects - list; admins also see unpublished rows
pub async fn list_projects(headers: HeaderMap) -> impl IntoResponse {
    let is_admin = optional_auth(&headers).is_some();

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return db_unavailable().into_response(),
    };

    match sqlx::query_as::<_, Project>(&format!(
        "SELECT {} FROM projects WHERE ($1 OR published = true) ORDER BY created_at DESC",
        PROJECT_COLS
    ))
    .bind(is_admin)
    .fetch_all(pool.as_ref())
    .await
    {
        Ok(projects) => {
            let items: Vec<ProjectResponse> =
                projects.into_iter().map(ProjectResponse::from).collect();
            (StatusCode::OK, Json(items)).into_response()
        }
        Err(e) => {
            tracing::error!("Database error listing projects: {}", e);
            internal_error("Failed to fetch projects", &e).into_response()
        }
    }
}

/// GET /api/projects/{id} - fetch one; unpublished rows 404 for public callers
pub async fn get_project(headers: HeaderMap, Path(id): Path<i32>) -> impl IntoResponse {
    let is_admin = optional_auth(&headers).is_some();

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return db_unavailable().into_response(),
    };

    match sqlx::query_as::<_, Project>(&format!(
        "SELECT {} FROM projects WHERE id = $1",
        PROJECT_COLS
    ))
    .bind(id)
    .fetch_optional(pool.as_ref())
    .await
    {
        Ok(Some(project)) if visible_to(is_admin, project.published) => {
            (StatusCode::OK, Json(ProjectResponse::from(project))).into_response()
        }
        Ok(_) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Project not found")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error fetching project {}: {}", id, e);
            internal_error("Failed to fetch project", &e).into_response()
        }
    }
}

/// POST /api/projects - create (auth required)
pub async fn create_project(
    headers: HeaderMap,
    Json(payload): Json<CreateProjectRequest>,
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

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return db_unavailable().into_response(),
    };

    match sqlx::query_as::<_, Project>(&format!(
        r#"
        INSERT INTO projects
            (title, description, challenge, contribution, technologies, thumbnail,
             hero_image, video_url, github_url, live_url, accuracy, speed, images,
             start_date, end_date, published)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        RETURNING {}
        "#,
        PROJECT_COLS
    ))
    .bind(&payload.title)
    .bind(sanitize_html(&payload.description))
    .bind(payload.challenge.as_deref().map(sanitize_html))
    .bind(payload.contribution.as_deref().map(sanitize_html))
    .bind(&payload.technologies)
    .bind(&payload.thumbnail)
    .bind(&payload.hero_image)
    .bind(&payload.video_url)
    .bind(&payload.github_url)
    .bind(&payload.live_url)
    .bind(&payload.accuracy)
    .bind(&payload.speed)
    .bind(&payload.images)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(payload.published.unwrap_or(false))
    .fetch_one(pool.as_ref())
    .await
    {
        Ok(project) => {
            (StatusCode::CREATED, Json(ProjectResponse::from(project))).into_response()
        }
        Err(e) => {
            tracing::error!("Database error creating project: {}", e);
            internal_error("Failed to create project", &e).into_response()
        }
    }
}

/// PUT /api/projects/{id} - update (auth required); last write wins
pub async fn update_project(
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateProjectRequest>,
) -> impl IntoResponse {
    if let Err(err_response) = require_auth(&headers) {
        return err_response.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return db_unavailable().into_response(),
    };

    let existing = match sqlx::query_as::<_, Project>(&format!(
        "SELECT {} FROM projects WHERE id = $1",
        PROJECT_COLS
    ))
    .bind(id)
    .fetch_optional(pool.as_ref())
    .await
    {
        Ok(Some(p)) => p,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new("Project not found")),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!("Database error fetching project {}: {}", id, e);
            return internal_error("Failed to fetch project", &e).into_response();
        }
    };

    let title = payload.title.unwrap_or(existing.title);
    let description = payload
        .description
        .as_deref()
        .map(sanitize_html)
        .unwrap_or(existing.description);
    let challenge = match payload.challenge {
        Some(value) => value.as_deref().map(sanitize_html),
        None => existing.challenge,
    };
    let contribution = match payload.contribution {
        Some(value) => value.as_deref().map(sanitize_html),
        None => existing.contribution,
    };
    let technologies = payload.technologies.unwrap_or(existing.technologies);
    let thumbnail = payload.thumbnail.unwrap_or(existing.thumbnail);
    let hero_image = payload.hero_image.unwrap_or(existing.hero_image);
    let video_url = payload.video_url.unwrap_or(existing.video_url);
    let github_url = payload.github_url.unwrap_or(existing.github_url);
    let live_url = payload.live_url.unwrap_or(existing.live_url);
    let accuracy = payload.accuracy.unwrap_or(existing.accuracy);
    let speed = payload.speed.unwrap_or(existing.speed);
    let images = payload.images.unwrap_or(existing.images);
    let start_date = payload.start_date.unwrap_or(existing.start_date);
    let end_date = payload.end_date.unwrap_or(existing.end_date);
    let published = payload.published.unwrap_or(existing.published);

    match sqlx::query_as::<_, Project>(&format!(
        r#"
        UPDATE projects
        SET title = $1, description = $2, challenge = $3, contribution = $4,
            technologies = $5, thumbnail = $6, hero_image = $7, video_url = $8,
            github_url = $9, live_url = $10, accuracy = $11, speed = $12,
            images = $13, start_date = $14, end_date = $15, published = $16
        WHERE id = $17
        RETURNING {}
        "#,
        PROJECT_COLS
    ))
    .bind(&title)
    .bind(&description)
    .bind(&challenge)
    .bind(&contribution)
    .bind(&technologies)
    .bind(&thumbnail)
    .bind(&hero_image)
    .bind(&video_url)
    .bind(&github_url)
    .bind(&live_url)
    .bind(&accuracy)
    .bind(&speed)
    .bind(&images)
    .bind(start_date)
    .bind(end_date)
    .bind(published)
    .bind(id)
    .fetch_one(pool.as_ref())
    .await
    {
        Ok(project) => (StatusCode::OK, Json(ProjectResponse::from(project))).into_response(),
        Err(e) => {
            tracing::error!("Database error updating project {}: {}", id, e);
            internal_error("Failed to update project", &e).into_response()
        }
    }
}

/// DELETE /api/projects/{id} - delete (auth required). Content-view rows for
/// the project are left in place; the dashboard join simply stops matching.
pub async fn delete_project(headers: HeaderMap, Path(id): Path<i32>) -> impl IntoResponse {
    if let Err(err_response) = require_auth(&headers) {
        return err_response.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return db_unavailable().into_response(),
    };

    match sqlx::query("DELETE FROM projects WHERE id = $1")
        .bind(id)
        .execute(pool.as_ref())
        .await
    {
        Ok(result) => {
            if result.rows_affected() == 0 {
                return (
                    StatusCode::NOT_FOUND,
                    Json(ErrorResponse::new("Project not found")),
                )
                    .into_response();
            }
            (StatusCode::OK, Json(SuccessResponse { success: true })).into_response()
        }
        Err(e) => {
            tracing::error!("Database error deleting project {}: {}", id, e);
            internal_error("Failed to delete project", &e).into_response()
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
            .route("/api/projects", get(list_projects).post(create_project))
            .route(
                "/api/projects/{id}",
                get(get_project).put(update_project).delete(delete_project),
            )
    }

    async fn send(app: Router, req: Request<Body>) -> StatusCode {
        app.oneshot(req).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_list_without_database_is_service_unavailable() {
        let req = Request::get("/api/projects").body(Body::empty()).unwrap();
        assert_eq!(
            send(test_router(), req).await,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_create_without_token_is_unauthorized() {
        let body = serde_json::json!({ "title": "New project" });
        let req = Request::post("/api/projects")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        assert_eq!(send(test_router(), req).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_update_without_token_is_unauthorized() {
        let body = serde_json::json!({ "title": "Renamed" });
        let req = Request::put("/api/projects/1")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        assert_eq!(send(test_router(), req).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_delete_without_token_is_unauthorized() {
        let req = Request::delete("/api/projects/1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(test_router(), req).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_get_with_non_numeric_id_is_bad_request() {
        let req = Request::get("/api/projects/not-a-number")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(test_router(), req).await, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_update_payload_distinguishes_null_from_absent() {
        let payload: UpdateProjectRequest =
            serde_json::from_str(r#"{"thumbnail": null}"#).unwrap();
        assert_eq!(payload.thumbnail, Some(None));
        assert_eq!(payload.end_date, None);

        let payload: UpdateProjectRequest =
            serde_json::from_str(r#"{"thumbnail": "drive://X"}"#).unwrap();
        assert_eq!(payload.thumbnail, Some(Some("drive://X".to_string())));
    }

    #[test]
    fn test_response_resolves_media_references() {
        let project = Project {
            id: 1,
            title: "P".to_string(),
            description: "".to_string(),
            challenge: None,
            contribution: None,
            technologies: vec![],
            thumbnail: Some("drive://THUMB".to_string()),
            hero_image: Some("local:/hero.png".to_string()),
            video_url: Some("drive://VID".to_string()),
            github_url: None,
            live_url: None,
            accuracy: None,
            speed: None,
            images: vec!["https://example.com/a.png".to_string()],
            start_date: None,
            end_date: None,
            published: true,
            created_at: Utc::now(),
        };
        let response = ProjectResponse::from(project);
        assert_eq!(
            response.thumbnail_url.as_deref(),
            Some("https://lh3.googleusercontent.com/d/THUMB")
        );
        assert_eq!(response.hero_image_url.as_deref(), Some("/hero.png"));
        assert_eq!(
            response.video_embed_url.as_deref(),
            Some("https://drive.google.com/file/d/VID/preview")
        );
        assert_eq!(response.image_urls, vec!["https://example.com/a.png"]);
    }
}
