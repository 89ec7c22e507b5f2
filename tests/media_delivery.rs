use std::path::PathBuf;
use std::sync::Arc;

use actix_web::http::{header, Method, StatusCode};
use actix_web::{test, web, App};
use chrono::Utc;

use course_media_server::blobstore::{BlobStore, FsBlobStore};
use course_media_server::config::Config;
use course_media_server::routes;
use course_media_server::signing::{self, MediaKey};

const CONTENT: &[u8] = b"0123456789";

fn test_config(media_root: PathBuf, secret: Option<&str>) -> Config {
    Config {
        port: 0,
        database_url: String::new(),
        media_root,
        media_base_url: String::new(),
        media_signing_secret: secret.map(str::to_string),
        signed_url_ttl_secs: 3600,
        allowed_origins: Vec::new(),
        dev_user_id: None,
    }
}

fn media_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("videos")).unwrap();
    std::fs::write(dir.path().join("videos/a.mp4"), CONTENT).unwrap();
    dir
}

macro_rules! media_app {
    ($config:expr) => {{
        let config = $config;
        let store: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(config.media_root.clone()));
        test::init_service(
            App::new()
                .app_data(web::Data::new(config))
                .app_data(web::Data::from(store))
                .configure(routes::configure),
        )
        .await
    }};
}

fn header_str(resp: &actix_web::dev::ServiceResponse, name: header::HeaderName) -> String {
    resp.headers()
        .get(name)
        .expect("header missing")
        .to_str()
        .unwrap()
        .to_string()
}

#[actix_web::test]
async fn full_body_request_returns_200_with_metadata_headers() {
    let dir = media_dir();
    let app = media_app!(test_config(dir.path().to_path_buf(), None));

    let req = test::TestRequest::get().uri("/media/videos/a.mp4").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header_str(&resp, header::ACCEPT_RANGES), "bytes");
    assert_eq!(
        header_str(&resp, header::CACHE_CONTROL),
        "private, max-age=300"
    );
    assert_eq!(header_str(&resp, header::CONTENT_TYPE), "video/mp4");
    assert_eq!(header_str(&resp, header::CONTENT_LENGTH), "10");
    assert!(resp.headers().contains_key(header::ETAG));
    assert!(resp.headers().contains_key(header::LAST_MODIFIED));

    let body = test::read_body(resp).await;
    assert_eq!(&body[..], CONTENT);
}

#[actix_web::test]
async fn bounded_range_returns_206() {
    let dir = media_dir();
    let app = media_app!(test_config(dir.path().to_path_buf(), None));

    let req = test::TestRequest::get()
        .uri("/media/videos/a.mp4")
        .insert_header((header::RANGE, "bytes=0-3"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header_str(&resp, header::CONTENT_RANGE), "bytes 0-3/10");
    assert_eq!(header_str(&resp, header::CONTENT_LENGTH), "4");
    assert_eq!(&test::read_body(resp).await[..], b"0123");
}

#[actix_web::test]
async fn suffix_range_returns_tail_bytes() {
    let dir = media_dir();
    let app = media_app!(test_config(dir.path().to_path_buf(), None));

    let req = test::TestRequest::get()
        .uri("/media/videos/a.mp4")
        .insert_header((header::RANGE, "bytes=-4"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header_str(&resp, header::CONTENT_RANGE), "bytes 6-9/10");
    assert_eq!(&test::read_body(resp).await[..], b"6789");
}

#[actix_web::test]
async fn open_ended_range_runs_to_end_of_object() {
    let dir = media_dir();
    let app = media_app!(test_config(dir.path().to_path_buf(), None));

    let req = test::TestRequest::get()
        .uri("/media/videos/a.mp4")
        .insert_header((header::RANGE, "bytes=5-"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header_str(&resp, header::CONTENT_RANGE), "bytes 5-9/10");
    assert_eq!(&test::read_body(resp).await[..], b"56789");
}

#[actix_web::test]
async fn out_of_bounds_range_returns_416_with_total() {
    let dir = media_dir();
    let app = media_app!(test_config(dir.path().to_path_buf(), None));

    let req = test::TestRequest::get()
        .uri("/media/videos/a.mp4")
        .insert_header((header::RANGE, "bytes=50-"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(header_str(&resp, header::CONTENT_RANGE), "bytes */10");
}

#[actix_web::test]
async fn multipart_range_returns_416_without_fetching() {
    let dir = media_dir();
    let app = media_app!(test_config(dir.path().to_path_buf(), None));

    let req = test::TestRequest::get()
        .uri("/media/videos/a.mp4")
        .insert_header((header::RANGE, "bytes=0-1,3-4"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::RANGE_NOT_SATISFIABLE);
}

#[actix_web::test]
async fn head_mirrors_get_status_and_headers() {
    let dir = media_dir();
    let app = media_app!(test_config(dir.path().to_path_buf(), None));

    let get = test::TestRequest::get()
        .uri("/media/videos/a.mp4")
        .insert_header((header::RANGE, "bytes=0-3"))
        .to_request();
    let get_resp = test::call_service(&app, get).await;
    let get_status = get_resp.status();
    let get_range = header_str(&get_resp, header::CONTENT_RANGE);

    let head = test::TestRequest::default()
        .method(Method::HEAD)
        .uri("/media/videos/a.mp4")
        .insert_header((header::RANGE, "bytes=0-3"))
        .to_request();
    let head_resp = test::call_service(&app, head).await;

    assert_eq!(head_resp.status(), get_status);
    assert_eq!(header_str(&head_resp, header::CONTENT_RANGE), get_range);
    assert!(test::read_body(head_resp).await.is_empty());
}

#[actix_web::test]
async fn missing_object_returns_404() {
    let dir = media_dir();
    let app = media_app!(test_config(dir.path().to_path_buf(), None));

    let req = test::TestRequest::get().uri("/media/videos/nope.mp4").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn traversal_key_returns_400() {
    let dir = media_dir();
    let app = media_app!(test_config(dir.path().to_path_buf(), None));

    let req = test::TestRequest::get()
        .uri("/media/%2E%2E/secrets.txt")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn signed_request_without_parameters_is_forbidden() {
    let dir = media_dir();
    let app = media_app!(test_config(dir.path().to_path_buf(), Some("s3cr3t")));

    let req = test::TestRequest::get().uri("/media/videos/a.mp4").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(&test::read_body(resp).await[..], b"Missing signature parameters");
}

#[actix_web::test]
async fn expired_signature_is_forbidden() {
    let dir = media_dir();
    let app = media_app!(test_config(dir.path().to_path_buf(), Some("s3cr3t")));

    let key = MediaKey::parse("videos/a.mp4").unwrap();
    let exp = Utc::now().timestamp() - 10;
    let sig = signing::sign(&key, exp, "s3cr3t");

    let req = test::TestRequest::get()
        .uri(&format!("/media/videos/a.mp4?exp={exp}&sig={sig}"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(&test::read_body(resp).await[..], b"Link expired");
}

#[actix_web::test]
async fn tampered_signature_is_forbidden() {
    let dir = media_dir();
    let app = media_app!(test_config(dir.path().to_path_buf(), Some("s3cr3t")));

    let key = MediaKey::parse("videos/a.mp4").unwrap();
    let exp = Utc::now().timestamp() + 3600;
    let sig = signing::sign(&key, exp, "wrong-secret");

    let req = test::TestRequest::get()
        .uri(&format!("/media/videos/a.mp4?exp={exp}&sig={sig}"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(&test::read_body(resp).await[..], b"Invalid signature");
}

#[actix_web::test]
async fn valid_signature_serves_ranged_content() {
    let dir = media_dir();
    let app = media_app!(test_config(dir.path().to_path_buf(), Some("s3cr3t")));

    let key = MediaKey::parse("videos/a.mp4").unwrap();
    let (exp, sig) = signing::issue(&key, "s3cr3t", Utc::now().timestamp(), 3600);

    let req = test::TestRequest::get()
        .uri(&format!("/media/videos/a.mp4?exp={exp}&sig={sig}"))
        .insert_header((header::RANGE, "bytes=2-5"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(&test::read_body(resp).await[..], b"2345");
}

#[actix_web::test]
async fn matching_if_none_match_returns_304() {
    let dir = media_dir();
    let app = media_app!(test_config(dir.path().to_path_buf(), None));

    let first = test::TestRequest::get().uri("/media/videos/a.mp4").to_request();
    let first_resp = test::call_service(&app, first).await;
    let etag = header_str(&first_resp, header::ETAG);

    let req = test::TestRequest::get()
        .uri("/media/videos/a.mp4")
        .insert_header((header::IF_NONE_MATCH, etag.clone()))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(header_str(&resp, header::ETAG), etag);
}

#[actix_web::test]
async fn failing_if_match_returns_412() {
    let dir = media_dir();
    let app = media_app!(test_config(dir.path().to_path_buf(), None));

    let req = test::TestRequest::get()
        .uri("/media/videos/a.mp4")
        .insert_header((header::IF_MATCH, "\"deadbeef-0\""))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::PRECONDITION_FAILED);
}
