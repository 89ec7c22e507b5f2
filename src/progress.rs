//! Duration-weighted progress aggregation at lesson and course granularity.

/// Completion threshold for lessons and courses, in percent (strict `>`).
pub const COMPLETION_THRESHOLD: f64 = 90.0;

/// Playback state of a single asset, as read from `media_progress`.
#[derive(Debug, Clone, Copy)]
pub struct AssetProgress {
    pub position_seconds: i64,
    /// Unknown until the client has reported it.
    pub duration_seconds: Option<i64>,
}

/// Derived per-lesson progress. Recomputed on read, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonProgress {
    pub progress_percentage: f64,
    pub completed: bool,
    pub total_duration_seconds: i64,
    pub watched_duration_seconds: i64,
}

/// Summed watched/total durations of assets with a known positive duration.
/// Position is clamped to the duration so overshooting clients cannot push a
/// lesson past 100%.
pub fn lesson_durations(assets: &[AssetProgress]) -> (i64, i64) {
    let mut total = 0;
    let mut watched = 0;
    for asset in assets {
        if let Some(duration) = asset.duration_seconds {
            if duration > 0 {
                total += duration;
                watched += asset.position_seconds.min(duration);
            }
        }
    }
    (total, watched)
}

fn percent(watched: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    100.0 * watched as f64 / total as f64
}

pub fn lesson_progress(assets: &[AssetProgress]) -> LessonProgress {
    let (total, watched) = lesson_durations(assets);
    let pct = percent(watched, total);
    LessonProgress {
        progress_percentage: pct,
        completed: is_completed(pct),
        total_duration_seconds: total,
        watched_duration_seconds: watched,
    }
}

/// Course-level percentage: durations are summed across lessons first, then
/// divided. This is duration-weighted, not an average of lesson percentages.
pub fn course_progress_percent(lessons: &[LessonProgress]) -> f64 {
    let total: i64 = lessons.iter().map(|l| l.total_duration_seconds).sum();
    let watched: i64 = lessons.iter().map(|l| l.watched_duration_seconds).sum();
    percent(watched, total)
}

/// The single completion rule used at both lesson and course granularity.
pub fn is_completed(progress_percentage: f64) -> bool {
    progress_percentage > COMPLETION_THRESHOLD
}
