//! Blob store collaborator contract and a filesystem-backed implementation.
//!
//! The delivery layer talks to this trait only. The store receives the parsed
//! range spec and the client's conditional headers verbatim; it answers with
//! object metadata and, when preconditions allow, a body stream covering the
//! requested window.

use std::io::SeekFrom;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::Stream;
use tokio::io::{AsyncReadExt, AsyncSeekExt, BufReader};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::range::{self, RangeSpec};
use crate::signing::MediaKey;

pub type ObjectBody = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Standard HTTP metadata of a stored object.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    pub size: i64,
    pub etag: String,
    pub last_modified: DateTime<Utc>,
    pub content_type: String,
}

impl ObjectMeta {
    /// `Last-Modified` header value (IMF-fixdate).
    pub fn http_last_modified(&self) -> String {
        self.last_modified
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string()
    }
}

pub struct StoredObject {
    pub meta: ObjectMeta,
    pub body: ObjectBody,
}

/// Conditional request headers, passed through from the client verbatim.
#[derive(Debug, Clone, Default)]
pub struct Conditionals {
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<String>,
    pub if_match: Option<String>,
    pub if_unmodified_since: Option<String>,
}

/// Outcome of a conditional, possibly ranged object fetch.
pub enum BlobFetch {
    Found(StoredObject),
    /// Freshness preconditions hit (`if-none-match` / `if-modified-since`).
    NotModified(ObjectMeta),
    /// Match preconditions failed (`if-match` / `if-unmodified-since`).
    PreconditionFailed(ObjectMeta),
    Missing,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch an object. `spec` is the requested byte window; a store may
    /// ignore it and return the full body, the caller re-validates against
    /// the authoritative size either way.
    async fn get(
        &self,
        key: &MediaKey,
        spec: Option<&RangeSpec>,
        cond: &Conditionals,
    ) -> Result<BlobFetch, std::io::Error>;
}

/// Filesystem-backed blob store rooted at a directory.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

fn etag_matches(header: &str, etag: &str) -> bool {
    header
        .split(',')
        .map(str::trim)
        .any(|candidate| candidate == "*" || candidate == etag)
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// RFC 7232 evaluation order: match preconditions first, then freshness.
fn evaluate_conditionals(cond: &Conditionals, meta: &ObjectMeta) -> Option<BlobFetch> {
    if let Some(if_match) = &cond.if_match {
        if !etag_matches(if_match, &meta.etag) {
            return Some(BlobFetch::PreconditionFailed(meta.clone()));
        }
    } else if let Some(ius) = &cond.if_unmodified_since {
        if let Some(limit) = parse_http_date(ius) {
            if meta.last_modified > limit {
                return Some(BlobFetch::PreconditionFailed(meta.clone()));
            }
        }
    }

    if let Some(inm) = &cond.if_none_match {
        if etag_matches(inm, &meta.etag) {
            return Some(BlobFetch::NotModified(meta.clone()));
        }
    } else if let Some(ims) = &cond.if_modified_since {
        if let Some(limit) = parse_http_date(ims) {
            if meta.last_modified <= limit {
                return Some(BlobFetch::NotModified(meta.clone()));
            }
        }
    }

    None
}

fn content_type_for(key: &str) -> &'static str {
    let ext = key.rsplit('.').next().unwrap_or_default();
    match ext.to_ascii_lowercase().as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "vtt" => "text/vtt",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn get(
        &self,
        key: &MediaKey,
        spec: Option<&RangeSpec>,
        cond: &Conditionals,
    ) -> Result<BlobFetch, std::io::Error> {
        // MediaKey normalization already excludes `..` and absolute segments.
        let path = self.root.join(key.as_str());

        let fs_meta = match tokio::fs::metadata(&path).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Ok(BlobFetch::Missing),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BlobFetch::Missing),
            Err(e) => return Err(e),
        };

        let size = fs_meta.len() as i64;
        // Second precision: HTTP dates carry no sub-second part.
        let mtime_secs = fs_meta
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        let meta = ObjectMeta {
            size,
            etag: format!("\"{:x}-{:x}\"", size, mtime_secs),
            last_modified: DateTime::from_timestamp(mtime_secs, 0).unwrap_or_default(),
            content_type: content_type_for(key.as_str()).to_string(),
        };

        if let Some(short_circuit) = evaluate_conditionals(cond, &meta) {
            debug!("Conditional request short-circuited for key {}", key);
            return Ok(short_circuit);
        }

        let mut file = tokio::fs::File::open(&path).await?;

        // Honor the requested window when it is satisfiable; otherwise hand
        // back the full body and let the caller produce the 416.
        let window = spec.and_then(|s| range::resolve(fs_meta.len(), s).ok());
        let body: ObjectBody = match window {
            Some(w) => {
                file.seek(SeekFrom::Start(w.start)).await?;
                let reader = BufReader::new(file).take(w.len());
                Box::pin(ReaderStream::new(reader))
            }
            None => Box::pin(ReaderStream::new(BufReader::new(file))),
        };

        Ok(BlobFetch::Found(StoredObject { meta, body }))
    }
}
