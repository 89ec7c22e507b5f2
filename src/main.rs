use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use course_media_server::blobstore::{BlobStore, FsBlobStore};
use course_media_server::config::Config;
use course_media_server::database::init_database;
use course_media_server::routes;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting course-media-server...");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let pool = match init_database(&config.database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    if config.media_signing_secret.is_none() {
        info!("MEDIA_SIGNING_SECRET not set, serving media without signature checks");
    }

    let store: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(config.media_root.clone()));
    let port = config.port;

    let config_data = web::Data::new(config);
    let pool_data = web::Data::new(pool);
    let store_data = web::Data::from(store);

    info!("Listening on 0.0.0.0:{}", port);

    HttpServer::new(move || {
        // Media is fetched cross-origin by players holding a signed URL;
        // progress writes stay same-origin via the explicit Origin check.
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "HEAD"]);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(config_data.clone())
            .app_data(pool_data.clone())
            .app_data(store_data.clone())
            .configure(routes::configure)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
