use actix_cors::Cors;
use actix_web::{get, web, App, HttpResponse, HttpServer, Responder};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::prelude::*;
use voxquote_api::{config, database, handlers, helpers, jobs, sync};

#[get("/health")]
async fn health(db: web::Data<Arc<database::Database>>) -> impl Responder {
    // Test database connection
    match db.connection.lock() {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "status": "healthy",
            "database": "connected"
        })),
        Err(_) => HttpResponse::InternalServerError().json(serde_json::json!({
            "status": "unhealthy",
            "database": "disconnected"
        })),
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(long)]
    log_file_path: Option<String>,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if let Some(log_path) = args.log_file_path {
        let log_path = std::path::Path::new(&log_path);
        let file_appender = tracing_appender::rolling::never(
            log_path.parent().unwrap_or(std::path::Path::new(".")),
            log_path
                .file_name()
                .unwrap_or(std::ffi::OsStr::new("voxquote-api.log")),
        );
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        std::mem::forget(guard);

        tracing_subscriber::registry()
            .with(env_filter.clone())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(true)
                    .with_writer(std::io::stdout),
            )
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    // Initialize database
    let db = helpers::database::initialize_database().expect("Failed to initialize database");

    println!(
        "Database initialized at: {:?}",
        helpers::database::get_db_path().unwrap()
    );

    // Load config
    let (config, config_path) = config::ApiConfig::load().expect("Failed to load config");
    tracing::info!("Config loaded from {:?}", config_path);

    let (host, port) = if let Some(server_config) = &config.server {
        (server_config.host.clone(), server_config.port)
    } else {
        ("127.0.0.1".to_string(), 8080)
    };

    let inference = config.inference.clone().unwrap_or_default();
    let pipeline = config.pipeline.clone().unwrap_or_default();

    let api_key = inference.api_key.clone().unwrap_or_else(|| {
        tracing::warn!("No inference api_key configured; extraction calls will be rejected");
        String::new()
    });

    let feed = sync::ChangeFeed::default();

    let client = Arc::new(voxquote_agents::HttpInferenceClient::new(
        &inference.base_url,
        &api_key,
    ));

    let extraction_manager = Arc::new(jobs::extraction_manager::ExtractionManager::new(
        db.async_connection.clone(),
        client,
        feed.clone(),
        inference.model.clone(),
        inference.max_tokens,
        Duration::from_millis(pipeline.pacing_ms),
        Duration::from_secs(pipeline.retry_backoff_base_secs),
    ));

    let observer_config = sync::ObserverConfig {
        poll_interval: Duration::from_millis(pipeline.poll_interval_ms),
        max_poll_attempts: pipeline.max_poll_attempts,
        stall_timeout: Duration::from_millis(pipeline.stall_timeout_ms),
    };

    println!("Starting server on {}:{}", host, port);

    let server = HttpServer::new(move || {
        // Configure CORS
        let cors = if let Some(cors_config) = &config.cors {
            let mut cors_builder = Cors::default();
            for origin in &cors_config.allowed_origins {
                cors_builder = cors_builder.allowed_origin(origin);
            }
            cors_builder
                .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
                .allowed_headers(vec!["Authorization", "Accept", "Content-Type"])
                .max_age(3600)
        } else {
            Cors::default()
                .allow_any_origin()
                .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
                .allowed_headers(vec!["Authorization", "Accept", "Content-Type"])
                .max_age(3600)
        };

        App::new()
            .wrap(cors)
            .app_data(web::Data::new(db.clone()))
            .app_data(web::Data::new(extraction_manager.clone()))
            .app_data(web::Data::new(feed.clone()))
            .app_data(web::Data::new(observer_config.clone()))
            .service(health)
            .route("/api/intakes", web::post().to(handlers::intakes::create_intake))
            .route("/api/intakes", web::get().to(handlers::intakes::list_intakes))
            .route("/api/intakes/{id}", web::get().to(handlers::intakes::get_intake))
            .route("/api/intakes/{id}/extract", web::post().to(handlers::extraction::start_extraction))
            .route("/api/intakes/{id}/job", web::get().to(handlers::extraction::get_generation_job))
            .route("/api/intakes/{id}/watch", web::get().to(handlers::extraction::watch_intake))
            .route("/api/intakes/{id}/review", web::get().to(handlers::review::get_review))
            .route("/api/intakes/{id}/review", web::post().to(handlers::review::submit_review))
            .route("/api/intakes/{id}/draft/started", web::post().to(handlers::drafts::draft_started))
            .route("/api/intakes/{id}/draft/complete", web::post().to(handlers::drafts::draft_complete))
    })
    .bind((host.as_str(), port))?
    .run();

    server.await
}
