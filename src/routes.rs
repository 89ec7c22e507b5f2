use std::collections::BTreeMap;

use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use tracing::{debug, error, info};

use crate::{
    auth::Identity,
    config::Config,
    database::{
        get_course_positions, get_lesson_counters, get_lesson_positions, upsert_asset_position,
        upsert_lesson_counters,
    },
    delivery::serve_media,
    error::ApiError,
    models::{
        CourseProgressQuery, CourseProgressResponse, LessonProgressQuery, LessonProgressResponse,
        LessonProgressSummary, LessonProgressWrite, MediaUrlQuery, MediaUrlResponse, WriteAck,
    },
    progress::{self, AssetProgress},
    signing::{self, MediaKey},
};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/media-url", web::get().to(get_media_url))
            .route("/progress/lesson", web::get().to(get_lesson_progress))
            .route("/progress/lesson", web::post().to(post_lesson_progress))
            .route("/progress/course", web::get().to(get_course_progress)),
    )
    .route("/health", web::get().to(health_check))
    .service(
        web::resource("/media/{key:.*}")
            .route(web::get().to(serve_media))
            .route(web::head().to(serve_media)),
    );
}

/// CSRF control for state-changing endpoints: the request `Origin` must match
/// the serving origin or one of the configured extras.
fn check_origin(req: &HttpRequest, config: &Config) -> Result<(), ApiError> {
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok());

    let conn = req.connection_info();
    let expected = format!("{}://{}", conn.scheme(), conn.host());

    match origin {
        Some(o) if o == expected || config.allowed_origins.iter().any(|a| a == o) => Ok(()),
        _ => Err(ApiError::Forbidden("Forbidden: invalid origin".to_string())),
    }
}

pub async fn get_media_url(
    identity: Identity,
    config: web::Data<Config>,
    query: web::Query<MediaUrlQuery>,
) -> Result<HttpResponse, ApiError> {
    let secret = config.media_signing_secret.as_deref().ok_or_else(|| {
        error!("MEDIA_SIGNING_SECRET is not configured");
        ApiError::Internal("Server configuration error".to_string())
    })?;

    let raw = query
        .key
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("Missing 'key' parameter".to_string()))?;

    // Path traversal is rejected here, before any signature exists for it.
    if raw.contains("..") || raw.starts_with('/') {
        return Err(ApiError::BadRequest("Invalid key format".to_string()));
    }
    let key = MediaKey::parse(raw)
        .ok_or_else(|| ApiError::BadRequest("Invalid key format".to_string()))?;

    let (exp, sig) = signing::issue(
        &key,
        secret,
        Utc::now().timestamp(),
        config.signed_url_ttl_secs,
    );

    let url = format!(
        "{}/media/{}?exp={}&sig={}",
        config.media_base_url,
        urlencoding::encode(key.as_str()),
        exp,
        sig
    );

    info!("Issued signed media URL for {} (user: {})", key, identity.user_id);

    Ok(HttpResponse::Ok().json(MediaUrlResponse { url }))
}

pub async fn post_lesson_progress(
    identity: Identity,
    req: HttpRequest,
    config: web::Data<Config>,
    pool: web::Data<sqlx::SqlitePool>,
    body: web::Json<LessonProgressWrite>,
) -> Result<HttpResponse, ApiError> {
    check_origin(&req, &config)?;

    let course_slug = body
        .course_slug
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("courseSlug & lessonSlug required".to_string()))?;
    let lesson_slug = body
        .lesson_slug
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("courseSlug & lessonSlug required".to_string()))?;

    let now_ms = Utc::now().timestamp_millis();
    let time_delta = body.time_spent_sec_delta.unwrap_or(0.0).floor().max(0.0) as i64;

    upsert_lesson_counters(
        &pool,
        &identity.user_id,
        course_slug,
        lesson_slug,
        body.is_completed.unwrap_or(false),
        time_delta,
        now_ms,
    )
    .await?;

    for position in body.media_positions.as_deref().unwrap_or_default() {
        upsert_asset_position(&pool, &identity.user_id, course_slug, lesson_slug, position)
            .await?;
    }

    debug!(
        "Progress write for {}/{} (user: {})",
        course_slug, lesson_slug, identity.user_id
    );

    Ok(HttpResponse::Ok().json(WriteAck {
        ok: true,
        updated_at_ms: now_ms,
    }))
}

pub async fn get_lesson_progress(
    identity: Identity,
    pool: web::Data<sqlx::SqlitePool>,
    query: web::Query<LessonProgressQuery>,
) -> Result<HttpResponse, ApiError> {
    let course_slug = query.course_slug.as_deref().ok_or_else(|| {
        ApiError::BadRequest("courseSlug and lessonSlug required".to_string())
    })?;
    let lesson_slug = query.lesson_slug.as_deref().ok_or_else(|| {
        ApiError::BadRequest("courseSlug and lessonSlug required".to_string())
    })?;

    let counters = get_lesson_counters(&pool, &identity.user_id, course_slug, lesson_slug).await?;
    let positions = get_lesson_positions(&pool, &identity.user_id, course_slug, lesson_slug)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    // No row yet means default values, not 404.
    let (is_completed, time_spent_sec, updated_at_ms) = match counters {
        Some(row) => (row.is_completed, row.time_spent_sec, row.updated_at_ms),
        None => (false, 0, 0),
    };

    Ok(HttpResponse::Ok().json(LessonProgressResponse {
        course_slug: course_slug.to_string(),
        lesson_slug: lesson_slug.to_string(),
        is_completed,
        time_spent_sec,
        updated_at_ms,
        media_positions: positions,
    }))
}

pub async fn get_course_progress(
    identity: Identity,
    pool: web::Data<sqlx::SqlitePool>,
    query: web::Query<CourseProgressQuery>,
) -> Result<HttpResponse, ApiError> {
    let course_slug = query
        .course_slug
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("courseSlug required".to_string()))?;

    let rows = get_course_positions(&pool, &identity.user_id, course_slug).await?;

    let mut by_lesson: BTreeMap<String, Vec<AssetProgress>> = BTreeMap::new();
    for row in rows {
        by_lesson.entry(row.lesson_slug).or_default().push(AssetProgress {
            position_seconds: row.position_sec,
            duration_seconds: row.duration_sec,
        });
    }

    let mut lessons = Vec::with_capacity(by_lesson.len());
    let mut lesson_progresses = Vec::with_capacity(by_lesson.len());
    for (lesson_slug, assets) in by_lesson {
        let lp = progress::lesson_progress(&assets);
        lessons.push(LessonProgressSummary {
            lesson_slug,
            progress_percentage: lp.progress_percentage,
            completed: lp.completed,
            total_duration_seconds: lp.total_duration_seconds,
            watched_duration_seconds: lp.watched_duration_seconds,
        });
        lesson_progresses.push(lp);
    }

    let progress_percentage = progress::course_progress_percent(&lesson_progresses);
    let completed_lessons = lesson_progresses.iter().filter(|l| l.completed).count();
    let total_duration_seconds = lesson_progresses
        .iter()
        .map(|l| l.total_duration_seconds)
        .sum();
    let watched_duration_seconds = lesson_progresses
        .iter()
        .map(|l| l.watched_duration_seconds)
        .sum();

    Ok(HttpResponse::Ok().json(CourseProgressResponse {
        course_slug: course_slug.to_string(),
        completed_lessons,
        progress_percentage,
        completed: progress::is_completed(progress_percentage),
        total_duration_seconds,
        watched_duration_seconds,
        lessons,
    }))
}

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now(),
        "service": "course-media-server"
    }))
}
