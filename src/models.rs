use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Query parameters of `GET|HEAD /media/{key}` when signing is enabled.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaQuery {
    pub exp: Option<String>,
    pub sig: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaUrlQuery {
    pub key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaUrlResponse {
    pub url: String,
}

/// One asset position reported by a playback client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPositionUpdate {
    pub asset_id: String,
    #[serde(default = "default_asset_type")]
    pub asset_type: String,
    pub position_sec: f64,
    #[serde(default)]
    pub duration_sec: Option<f64>,
    #[serde(default)]
    pub completed: Option<bool>,
    pub client_updated_at_ms: i64,
}

fn default_asset_type() -> String {
    "video".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonProgressWrite {
    pub course_slug: Option<String>,
    pub lesson_slug: Option<String>,
    #[serde(default)]
    pub time_spent_sec_delta: Option<f64>,
    #[serde(default)]
    pub media_positions: Option<Vec<MediaPositionUpdate>>,
    #[serde(default)]
    pub is_completed: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteAck {
    pub ok: bool,
    pub updated_at_ms: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonProgressQuery {
    pub course_slug: Option<String>,
    pub lesson_slug: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgressQuery {
    pub course_slug: Option<String>,
}

/// Coarse per-lesson counters from the `progress` table.
#[derive(Debug, Clone, FromRow)]
pub struct LessonCountersRow {
    pub is_completed: bool,
    pub time_spent_sec: i64,
    pub updated_at_ms: i64,
}

/// One `media_progress` row for a lesson.
#[derive(Debug, Clone, FromRow)]
pub struct MediaPositionRow {
    pub asset_id: String,
    pub asset_type: String,
    pub position_sec: i64,
    pub duration_sec: Option<i64>,
    pub completed: bool,
    pub updated_at_ms: i64,
}

/// One `media_progress` row with its lesson, for course aggregation.
#[derive(Debug, Clone, FromRow)]
pub struct CourseMediaRow {
    pub lesson_slug: String,
    pub position_sec: i64,
    pub duration_sec: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPositionOut {
    pub asset_id: String,
    pub asset_type: String,
    pub position_sec: i64,
    pub duration_sec: Option<i64>,
    pub completed: bool,
    pub updated_at_ms: i64,
}

impl From<MediaPositionRow> for MediaPositionOut {
    fn from(row: MediaPositionRow) -> Self {
        MediaPositionOut {
            asset_id: row.asset_id,
            asset_type: row.asset_type,
            position_sec: row.position_sec,
            duration_sec: row.duration_sec,
            completed: row.completed,
            updated_at_ms: row.updated_at_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonProgressResponse {
    pub course_slug: String,
    pub lesson_slug: String,
    pub is_completed: bool,
    pub time_spent_sec: i64,
    pub updated_at_ms: i64,
    pub media_positions: Vec<MediaPositionOut>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonProgressSummary {
    pub lesson_slug: String,
    pub progress_percentage: f64,
    pub completed: bool,
    pub total_duration_seconds: i64,
    pub watched_duration_seconds: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgressResponse {
    pub course_slug: String,
    pub completed_lessons: usize,
    pub progress_percentage: f64,
    pub completed: bool,
    pub total_duration_seconds: i64,
    pub watched_duration_seconds: i64,
    pub lessons: Vec<LessonProgressSummary>,
}
