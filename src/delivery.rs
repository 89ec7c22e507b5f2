//! Media delivery: key resolution, signature verification, range negotiation
//! and conditional pass-through, assembled into one response per request.
//!
//! GET and HEAD share this handler; actix drops the body for HEAD, so status
//! and headers cannot drift between the two methods.

use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse, HttpResponseBuilder};
use chrono::Utc;
use tracing::{debug, error};

use crate::blobstore::{BlobFetch, BlobStore, Conditionals, ObjectMeta};
use crate::config::Config;
use crate::models::MediaQuery;
use crate::range;
use crate::signing::{self, MediaKey};

const CACHE_CONTROL: &str = "private, max-age=300";

/// Strip leading slashes and the optional `media/` routing prefix, then
/// normalize to a `MediaKey`.
pub fn resolve_media_key(raw: &str) -> Option<MediaKey> {
    let trimmed = raw.trim_start_matches('/');
    let rest = trimmed.strip_prefix("media/").unwrap_or(trimmed);
    MediaKey::parse(rest)
}

fn pick<'a>(req: &'a HttpRequest, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn conditionals_from(req: &HttpRequest) -> Conditionals {
    Conditionals {
        if_none_match: pick(req, "if-none-match"),
        if_modified_since: pick(req, "if-modified-since"),
        if_match: pick(req, "if-match"),
        if_unmodified_since: pick(req, "if-unmodified-since"),
    }
}

fn apply_meta(builder: &mut HttpResponseBuilder, meta: &ObjectMeta) {
    builder
        .insert_header((header::CONTENT_TYPE, meta.content_type.clone()))
        .insert_header((header::ETAG, meta.etag.clone()))
        .insert_header((header::LAST_MODIFIED, meta.http_last_modified()))
        .insert_header((header::ACCEPT_RANGES, "bytes"))
        .insert_header((header::CACHE_CONTROL, CACHE_CONTROL));
}

/// Signature gate: all failures are 403 with distinct bodies, so a caller
/// cannot distinguish them by status.
fn verify_signature(key: &MediaKey, query: &MediaQuery, secret: &str) -> Result<(), HttpResponse> {
    let (exp_param, sig_param) = match (&query.exp, &query.sig) {
        (Some(exp), Some(sig)) => (exp, sig),
        _ => {
            return Err(HttpResponse::Forbidden().body("Missing signature parameters"));
        }
    };

    let now = Utc::now().timestamp();
    let exp = match exp_param.parse::<i64>() {
        Ok(exp) if now <= exp => exp,
        _ => return Err(HttpResponse::Forbidden().body("Link expired")),
    };

    if !signing::verify(key, exp, sig_param, secret, now) {
        return Err(HttpResponse::Forbidden().body("Invalid signature"));
    }

    Ok(())
}

pub async fn serve_media(
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<MediaQuery>,
    config: web::Data<Config>,
    store: web::Data<dyn BlobStore>,
) -> HttpResponse {
    let key = match resolve_media_key(&path.into_inner()) {
        Some(key) => key,
        None => return HttpResponse::BadRequest().body("Bad Request"),
    };

    if let Some(secret) = &config.media_signing_secret {
        if let Err(denied) = verify_signature(&key, &query, secret) {
            return denied;
        }
    }

    let spec = match range::parse(pick(&req, "range").as_deref()) {
        Ok(spec) => spec,
        // Multipart range: answer before touching the store.
        Err(range::MultipartUnsupported) => {
            return HttpResponse::RangeNotSatisfiable().body("Range Not Satisfiable");
        }
    };

    let cond = conditionals_from(&req);

    let fetched = match store.get(&key, spec.as_ref(), &cond).await {
        Ok(fetched) => fetched,
        Err(e) => {
            error!("Blob store error for key {}: {}", key, e);
            return HttpResponse::InternalServerError().body("Internal Server Error");
        }
    };

    let obj = match fetched {
        BlobFetch::Missing => return HttpResponse::NotFound().body("Not Found"),
        BlobFetch::NotModified(meta) => {
            let mut builder = HttpResponse::NotModified();
            builder
                .insert_header((header::ETAG, meta.etag.clone()))
                .insert_header((header::LAST_MODIFIED, meta.http_last_modified()))
                .insert_header((header::CACHE_CONTROL, CACHE_CONTROL));
            return builder.finish();
        }
        BlobFetch::PreconditionFailed(meta) => {
            let mut builder = HttpResponse::PreconditionFailed();
            builder
                .insert_header((header::ETAG, meta.etag))
                .insert_header((header::CACHE_CONTROL, CACHE_CONTROL));
            return builder.finish();
        }
        BlobFetch::Found(obj) => obj,
    };

    let total = obj.meta.size;
    if total <= 0 {
        error!("Bad object size for key {}: {}", key, total);
        return HttpResponse::InternalServerError().body("Bad media metadata");
    }

    // Range response: re-validate against the authoritative size, in case the
    // store ignored the requested window.
    if let Some(spec) = &spec {
        return match range::resolve(total as u64, spec) {
            Ok(resolved) => {
                debug!(
                    "Serving range {}-{}/{} for key {}",
                    resolved.start, resolved.end, total, key
                );
                let mut builder = HttpResponse::PartialContent();
                apply_meta(&mut builder, &obj.meta);
                builder
                    .insert_header((header::CONTENT_RANGE, resolved.content_range()))
                    .no_chunking(resolved.len())
                    .streaming(obj.body)
            }
            Err(range::Unsatisfiable) => {
                let mut builder = HttpResponse::RangeNotSatisfiable();
                apply_meta(&mut builder, &obj.meta);
                builder
                    .insert_header((header::CONTENT_RANGE, format!("bytes */{total}")))
                    .body("Range Not Satisfiable")
            }
        };
    }

    let mut builder = HttpResponse::Ok();
    apply_meta(&mut builder, &obj.meta);
    builder.no_chunking(total as u64).streaming(obj.body)
}
