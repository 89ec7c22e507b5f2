use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Root directory of the media blob store.
    pub media_root: PathBuf,
    /// Base URL prepended to issued signed media URLs. Empty means relative
    /// URLs against the serving origin.
    pub media_base_url: String,
    /// When unset, media is served without signature checks.
    pub media_signing_secret: Option<String>,
    pub signed_url_ttl_secs: i64,
    /// Extra origins accepted by the CSRF check, on top of the serving
    /// origin (comma-separated, for development).
    pub allowed_origins: Vec<String>,
    /// Development-only identity used when no identity header is present.
    pub dev_user_id: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Config {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:course-media.db".to_string()),
            media_root: env::var("MEDIA_ROOT")
                .unwrap_or_else(|_| "./media".to_string())
                .into(),
            media_base_url: env::var("MEDIA_BASE_URL")
                .unwrap_or_default()
                .trim_end_matches('/')
                .to_string(),
            media_signing_secret: env::var("MEDIA_SIGNING_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
            signed_url_ttl_secs: env::var("SIGNED_URL_TTL_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()?,
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            dev_user_id: env::var("DEV_USER_ID").ok().filter(|s| !s.is_empty()),
        })
    }
}
