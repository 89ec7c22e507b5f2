use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::models::{CourseMediaRow, LessonCountersRow, MediaPositionRow, MediaPositionUpdate};

pub async fn init_database(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations").run(&pool).await?;

    info!("Database initialized successfully");
    Ok(pool)
}

/// Upsert the coarse per-lesson counters.
///
/// `is_completed` is last-caller-wins (no timestamp comparison) while
/// `time_spent_sec` accumulates. This is deliberately a different conflict
/// policy than the per-asset LWW merge below.
pub async fn upsert_lesson_counters(
    pool: &SqlitePool,
    user_id: &str,
    course_slug: &str,
    lesson_slug: &str,
    is_completed: bool,
    time_spent_delta_sec: i64,
    now_ms: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO progress (user_id, course_slug, lesson_slug, is_completed, time_spent_sec, updated_at_ms)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT (user_id, course_slug, lesson_slug) DO UPDATE SET
            is_completed = excluded.is_completed,
            time_spent_sec = progress.time_spent_sec + excluded.time_spent_sec,
            updated_at_ms = excluded.updated_at_ms
        "#,
    )
    .bind(user_id)
    .bind(course_slug)
    .bind(lesson_slug)
    .bind(is_completed)
    .bind(time_spent_delta_sec.max(0))
    .bind(now_ms)
    .execute(pool)
    .await?;

    Ok(())
}

/// Merge one asset position, last-write-wins by client timestamp.
///
/// The `{position, duration, completed, updated_at}` field group is replaced
/// only when the incoming timestamp is >= the stored one (ties favor the
/// incoming write); an absent incoming duration never clobbers a stored one.
/// The whole merge is a single conditional upsert so concurrent writers from
/// multiple devices cannot interleave a read-modify-write.
pub async fn upsert_asset_position(
    pool: &SqlitePool,
    user_id: &str,
    course_slug: &str,
    lesson_slug: &str,
    update: &MediaPositionUpdate,
) -> Result<(), sqlx::Error> {
    let position_sec = update.position_sec.max(0.0).floor() as i64;
    let duration_sec = update.duration_sec.map(|d| d.floor() as i64);
    let completed = update.completed.unwrap_or(false);

    sqlx::query(
        r#"
        INSERT INTO media_progress
            (user_id, course_slug, lesson_slug, asset_id, asset_type,
             position_sec, duration_sec, completed, updated_at_ms)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (user_id, course_slug, lesson_slug, asset_id) DO UPDATE SET
            asset_type = excluded.asset_type,
            position_sec = CASE
                WHEN excluded.updated_at_ms >= media_progress.updated_at_ms
                THEN excluded.position_sec
                ELSE media_progress.position_sec
            END,
            duration_sec = CASE
                WHEN excluded.updated_at_ms >= media_progress.updated_at_ms
                THEN COALESCE(excluded.duration_sec, media_progress.duration_sec)
                ELSE media_progress.duration_sec
            END,
            completed = CASE
                WHEN excluded.updated_at_ms >= media_progress.updated_at_ms
                THEN excluded.completed
                ELSE media_progress.completed
            END,
            updated_at_ms = CASE
                WHEN excluded.updated_at_ms >= media_progress.updated_at_ms
                THEN excluded.updated_at_ms
                ELSE media_progress.updated_at_ms
            END
        "#,
    )
    .bind(user_id)
    .bind(course_slug)
    .bind(lesson_slug)
    .bind(&update.asset_id)
    .bind(&update.asset_type)
    .bind(position_sec)
    .bind(duration_sec)
    .bind(completed)
    .bind(update.client_updated_at_ms)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_lesson_counters(
    pool: &SqlitePool,
    user_id: &str,
    course_slug: &str,
    lesson_slug: &str,
) -> Result<Option<LessonCountersRow>, sqlx::Error> {
    sqlx::query_as::<_, LessonCountersRow>(
        r#"
        SELECT is_completed, time_spent_sec, updated_at_ms
        FROM progress
        WHERE user_id = ? AND course_slug = ? AND lesson_slug = ?
        "#,
    )
    .bind(user_id)
    .bind(course_slug)
    .bind(lesson_slug)
    .fetch_optional(pool)
    .await
}

pub async fn get_lesson_positions(
    pool: &SqlitePool,
    user_id: &str,
    course_slug: &str,
    lesson_slug: &str,
) -> Result<Vec<MediaPositionRow>, sqlx::Error> {
    sqlx::query_as::<_, MediaPositionRow>(
        r#"
        SELECT asset_id, asset_type, position_sec, duration_sec, completed, updated_at_ms
        FROM media_progress
        WHERE user_id = ? AND course_slug = ? AND lesson_slug = ?
        ORDER BY asset_id
        "#,
    )
    .bind(user_id)
    .bind(course_slug)
    .bind(lesson_slug)
    .fetch_all(pool)
    .await
}

/// All asset rows for a course, for duration-weighted aggregation.
pub async fn get_course_positions(
    pool: &SqlitePool,
    user_id: &str,
    course_slug: &str,
) -> Result<Vec<CourseMediaRow>, sqlx::Error> {
    sqlx::query_as::<_, CourseMediaRow>(
        r#"
        SELECT lesson_slug, position_sec, duration_sec
        FROM media_progress
        WHERE user_id = ? AND course_slug = ?
        ORDER BY lesson_slug, asset_id
        "#,
    )
    .bind(user_id)
    .bind(course_slug)
    .fetch_all(pool)
    .await
}
