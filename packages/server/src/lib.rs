#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the pothole map application.
//!
//! Serves the ingestion endpoints (`/api/analyze`, `/api/analyze-video`,
//! `/api/report`), the jurisdiction-partitioned registry views, status
//! and priority mutations, tracking by reference code, and
//! invitation-code administration. All persistence goes through the
//! injected [`RegistryStore`]; all model calls go through the pipeline's
//! collaborator traits.

pub mod auth;
mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use pothole_map_access::TokenVerifier;
use pothole_map_database::{db, run_migrations, PgStore, RegistryStore};
use pothole_map_detect::http::HttpDetector;
use pothole_map_geocoder::NominatimResolver;
use pothole_map_media::enhance::ContrastEnhancer;
use pothole_map_media::video::FfmpegFrameDecoder;
use pothole_map_pipeline::Pipeline;
use pothole_map_r2::{ObjectStore, R2ImageStore};

use crate::auth::DbTokenVerifier;

/// Shared application state.
pub struct AppState {
    /// Registry store.
    pub store: Arc<dyn RegistryStore>,
    /// Ingestion pipeline with its collaborators.
    pub pipeline: Arc<Pipeline>,
    /// Bearer-token verifier.
    pub verifier: Arc<dyn TokenVerifier>,
}

/// Starts the pothole map API server.
///
/// Connects to the database, runs migrations, wires the pipeline
/// collaborators (detector service, local enhancer, `ffmpeg` frame
/// decoder, Nominatim geocoder, optional R2 image store), and starts
/// the Actix-Web HTTP server.
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind
/// or encounters a runtime error.
///
/// # Panics
///
/// Panics if the database connection, migrations, or the outbound HTTP
/// client fail during startup wiring.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    log::info!("Connecting to database...");
    let db_conn = db::connect_from_env()
        .await
        .expect("Failed to connect to database");

    log::info!("Running migrations...");
    run_migrations(db_conn.as_ref())
        .await
        .expect("Failed to run migrations");

    let store: Arc<dyn RegistryStore> = Arc::new(PgStore::new(Arc::from(db_conn)));

    let client = reqwest::Client::builder()
        .user_agent("pothole-map/1.0 (https://github.com/BSteffaniak/pothole-map)")
        .build()
        .expect("Failed to build HTTP client");

    // Image uploads are best-effort: without R2 credentials the server
    // still runs, records just carry no image URL.
    let objects: Option<Arc<dyn ObjectStore>> = match R2ImageStore::from_env() {
        Ok(images) => Some(Arc::new(images)),
        Err(e) => {
            log::warn!("Object storage disabled: {e}");
            None
        }
    };

    let pipeline = Arc::new(Pipeline::new(
        Arc::clone(&store),
        Arc::new(HttpDetector::from_env(client.clone())),
        Arc::new(ContrastEnhancer),
        Arc::new(FfmpegFrameDecoder::default()),
        Arc::new(NominatimResolver::new(client)),
        objects,
    ));

    let verifier: Arc<dyn TokenVerifier> = Arc::new(DbTokenVerifier::new(Arc::clone(&store)));

    let state = web::Data::new(AppState {
        store,
        pipeline,
        verifier,
    });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            // Uploaded media bodies can be tens of megabytes.
            .app_data(web::PayloadConfig::new(100 * 1024 * 1024))
            .service(
                web::scope("/api")
                    .route("/health", web::get().to(handlers::health))
                    .route("/analyze", web::post().to(handlers::analyze))
                    .route("/analyze-video", web::post().to(handlers::analyze_video))
                    .route("/report", web::post().to(handlers::report))
                    .route("/potholes", web::get().to(handlers::potholes))
                    .route("/potholes/{id}", web::put().to(handlers::update_status))
                    .route("/update-priority", web::post().to(handlers::update_priority))
                    .route("/track/{reference}", web::get().to(handlers::track))
                    .route("/prioritize", web::post().to(handlers::prioritize))
                    .route("/stats", web::get().to(handlers::stats))
                    .route("/invitations", web::post().to(handlers::create_invitation))
                    .route("/invitations", web::get().to(handlers::list_invitations))
                    .route(
                        "/invitations/{code}",
                        web::delete().to(handlers::delete_invitation),
                    ),
            )
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
