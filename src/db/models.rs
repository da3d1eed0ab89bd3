//! Database models - structs mapping the portfolio tables (used by sqlx/serde).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Admin user
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

/// Project
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub challenge: Option<String>,
    pub contribution: Option<String>,
    pub technologies: Vec<String>,
    pub thumbnail: Option<String>,
    pub hero_image: Option<String>,
    pub video_url: Option<String>,
    pub github_url: Option<String>,
    pub live_url: Option<String>,
    pub accuracy: Option<String>,
    pub speed: Option<String>,
    pub images: Vec<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
}

/// Blog post. `slug` is the public routing key.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blog {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub thumbnail: Option<String>,
    pub pdf_url: Option<String>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub blog_type: String,
    pub read_time: Option<i32>,
    pub video_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
}

/// Work experience entry
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experience {
    pub id: i32,
    pub company: String,
    pub company_logo: Option<String>,
    pub position: String,
    pub location: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub current: bool,
    pub description: Option<String>,
    pub skills: Vec<String>,
}

/// Achievement
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub date: Option<DateTime<Utc>>,
    pub images: Vec<String>,
    pub video_url: Option<String>,
    pub link: Option<String>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
}

/// Contact form message
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactMessage {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}
