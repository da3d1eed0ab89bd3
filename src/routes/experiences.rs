//! Experience routes: public timeline reads, admin CRUD. Experiences have no
//! publish flag; the whole timeline is public, newest role first.

use axum::{
    extract::Path,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::db::{self, models::Experience};
use crate::routes::auth::require_auth;
use crate::routes::{
    db_unavailable, double_option, internal_error, ErrorResponse, SuccessResponse,
};

const EXPERIENCE_COLS: &str = "id, company, company_logo, position, location, start_date, \
     end_date, current, description, skills";

fn sanitize_html(html: &str) -> String {
    ammonia::clean(html)
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExperienceRequest {
    pub company: String,
    pub company_logo: Option<String>,
    pub position: String,
    pub location: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub current: Option<bool>,
    pub description: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
}

/// Nullable columns use a double `Option`: an absent field keeps the stored
/// value, an explicit JSON `null` clears it (an ended role can drop
/// `endDate` again when it becomes current).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExperienceRequest {
    pub company: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub company_logo: Option<Option<String>>,
    pub position: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub location: Option<Option<String>>,
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "double_option")]
    pub end_date: Option<Option<DateTime<Utc>>>,
    pub current: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub skills: Option<Vec<String>>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/experiences - public list, ordered by start_date descending
pub async fn list_experiences() -> impl IntoResponse {
    let pool = match db::get_pool() {
        Some(p) => p,
        None => return db_unavailable().into_response(),
    };

    match sqlx::query_as::<_, Experience>(&format!(
        "SELECT {} FROM experiences ORDER BY start_date DESC",
        EXPERIENCE_COLS
    ))
    .fetch_all(pool.as_ref())
    .await
    {
        Ok(experiences) => (StatusCode::OK, Json(experiences)).into_response(),
        Err(e) => {
            tracing::error!("Database error listing experiences: {}", e);
            internal_error("Failed to fetch experiences", &e).into_response()
        }
    }
}

/// GET /api/experiences/{id} - public fetch
pub async fn get_experience(Path(id): Path<i32>) -> impl IntoResponse {
    let pool = match db::get_pool() {
        Some(p) => p,
        None => return db_unavailable().into_response(),
    };

    match sqlx::query_as::<_, Experience>(&format!(
        "SELECT {} FROM experiences WHERE id = $1",
        EXPERIENCE_COLS
    ))
    .bind(id)
    .fetch_optional(pool.as_ref())
    .await
    {
        Ok(Some(experience)) => (StatusCode::OK, Json(experience)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Experience not found")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error fetching experience {}: {}", id, e);
            internal_error("Failed to fetch experience", &e).into_response()
        }
    }
}

/// POST /api/experiences - create (auth required)
pub async fn create_experience(
    headers: HeaderMap,
    Json(payload): Json<CreateExperienceRequest>,
) -> impl IntoResponse {
    if let Err(err_response) = require_auth(&headers) {
        return err_response.into_response();
    }

    if payload.company.trim().is_empty() || payload.position.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Company and position are required")),
        )
            .into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return db_unavailable().into_response(),
    };

    match sqlx::query_as::<_, Experience>(&format!(
        r#"
        INSERT INTO experiences
            (company, company_logo, position, location, start_date, end_date,
             current, description, skills)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {}
        "#,
        EXPERIENCE_COLS
    ))
    .bind(&payload.company)
    .bind(&payload.company_logo)
    .bind(&payload.position)
    .bind(&payload.location)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(payload.current.unwrap_or(false))
    .bind(payload.description.as_deref().map(sanitize_html))
    .bind(&payload.skills)
    .fetch_one(pool.as_ref())
    .await
    {
        Ok(experience) => (StatusCode::CREATED, Json(experience)).into_response(),
        Err(e) => {
            tracing::error!("Database error creating experience: {}", e);
            internal_error("Failed to create experience", &e).into_response()
        }
    }
}

/// PUT /api/experiences/{id} - update (auth required); last write wins
pub async fn update_experience(
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateExperienceRequest>,
) -> impl IntoResponse {
    if let Err(err_response) = require_auth(&headers) {
        return err_response.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return db_unavailable().into_response(),
    };

    let existing = match sqlx::query_as::<_, Experience>(&format!(
        "SELECT {} FROM experiences WHERE id = $1",
        EXPERIENCE_COLS
    ))
    .bind(id)
    .fetch_optional(pool.as_ref())
    .await
    {
        Ok(Some(experience)) => experience,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new("Experience not found")),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!("Database error fetching experience {}: {}", id, e);
            return internal_error("Failed to fetch experience", &e).into_response();
        }
    };

    let company = payload.company.unwrap_or(existing.company);
    let company_logo = payload.company_logo.unwrap_or(existing.company_logo);
    let position = payload.position.unwrap_or(existing.position);
    let location = payload.location.unwrap_or(existing.location);
    let start_date = payload.start_date.unwrap_or(existing.start_date);
    let end_date = payload.end_date.unwrap_or(existing.end_date);
    let current = payload.current.unwrap_or(existing.current);
    let description = match payload.description {
        Some(value) => value.as_deref().map(sanitize_html),
        None => existing.description,
    };
    let skills = payload.skills.unwrap_or(existing.skills);

    match sqlx::query_as::<_, Experience>(&format!(
        r#"
        UPDATE experiences
        SET company = $1, company_logo = $2, position = $3, location = $4,
            start_date = $5, end_date = $6, current = $7, description = $8, skills = $9
        WHERE id = $10
        RETURNING {}
        "#,
        EXPERIENCE_COLS
    ))
    .bind(&company)
    .bind(&company_logo)
    .bind(&position)
    .bind(&location)
    .bind(start_date)
    .bind(end_date)
    .bind(current)
    .bind(&description)
    .bind(&skills)
    .bind(id)
    .fetch_one(pool.as_ref())
    .await
    {
        Ok(experience) => (StatusCode::OK, Json(experience)).into_response(),
        Err(e) => {
            tracing::error!("Database error updating experience {}: {}", id, e);
            internal_error("Failed to update experience", &e).into_response()
        }
    }
}

/// DELETE /api/experiences/{id} - delete (auth required)
pub async fn delete_experience(headers: HeaderMap, Path(id): Path<i32>) -> impl IntoResponse {
    if let Err(err_response) = require_auth(&headers) {
        return err_response.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => return db_unavailable().into_response(),
    };

    match sqlx::query("DELETE FROM experiences WHERE id = $1")
        .bind(id)
        .execute(pool.as_ref())
        .await
    {
        Ok(result) => {
            if result.rows_affected() == 0 {
                return (
                    StatusCode::NOT_FOUND,
                    Json(ErrorResponse::new("Experience not found")),
                )
                    .into_response();
            }
            (StatusCode::OK, Json(SuccessResponse { success: true })).into_response()
        }
        Err(e) => {
            tracing::error!("Database error deleting experience {}: {}", id, e);
            internal_error("Failed to delete experience", &e).into_response()
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
                "/api/experiences",
                get(list_experiences).post(create_experience),
            )
            .route(
                "/api/experiences/{id}",
                get(get_experience)
                    .put(update_experience)
                    .delete(delete_experience),
            )
    }

    async fn send(app: Router, req: Request<Body>) -> StatusCode {
        app.oneshot(req).await.unwrap().status()
    }

    #[test]
    fn test_update_payload_distinguishes_null_from_absent() {
        let payload: UpdateExperienceRequest =
            serde_json::from_str(r#"{"endDate": null, "current": true}"#).unwrap();
        assert_eq!(payload.end_date, Some(None));
        assert_eq!(payload.current, Some(true));
        assert_eq!(payload.company_logo, None);
    }

    #[tokio::test]
    async fn test_list_without_database_is_service_unavailable() {
        let req = Request::get("/api/experiences").body(Body::empty()).unwrap();
        assert_eq!(
            send(test_router(), req).await,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_create_without_token_is_unauthorized() {
        let body = serde_json::json!({
            "company": "Acme",
            "position": "Engineer",
            "startDate": "2023-01-01T00:00:00Z"
        });
        let req = Request::post("/api/experiences")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        assert_eq!(send(test_router(), req).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_delete_without_token_is_unauthorized() {
        let req = Request::delete("/api/experiences/3")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(test_router(), req).await, StatusCode::UNAUTHORIZED);
    }
}
