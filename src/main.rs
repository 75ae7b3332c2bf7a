mod api;
mod config;
mod database;
mod jobs;
mod middleware;
mod models;
mod services;
mod store;
mod utils;

use actix_cors::Cors;
use actix_web::{dev::Service, middleware::Logger, web, App, HttpServer};
use config::{Config, StorageBackend};
use dotenv::dotenv;
use std::io;
use std::sync::Arc;
use store::{JobStore, MarketStore, MemoryStore};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

fn startup_error(e: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e.to_string())
}

async fn build_stores(config: &Config) -> io::Result<(Arc<dyn MarketStore>, Arc<dyn JobStore>)> {
    match config.storage {
        StorageBackend::Mongo => {
            let db = database::MongoDB::new(&config.database_url)
                .await
                .map_err(|e| startup_error(format!("Failed to connect to MongoDB: {}", e)))?;
            db.health_check().await.map_err(startup_error)?;
            log::info!("✅ MongoDB connected successfully");
            let db = Arc::new(db);
            Ok((db.clone(), db))
        }
        StorageBackend::Memory => {
            log::warn!("⚠️ Using in-memory storage, data is lost on restart");
            let store = Arc::new(MemoryStore::new());
            Ok((store.clone(), store))
        }
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env().map_err(startup_error)?;
    utils::set_production(config.production);

    log::info!("🚀 Starting Cane Market...");
    log::info!("📊 Storage: {}", config.storage.as_str());

    let (market, job_store) = build_stores(&config).await?;

    log::info!("📅 Starting background jobs...");
    jobs::listing_expiry::start_listing_expiry_sweeper(market.clone(), config.listing_sweep_secs);
    log::info!("✅ Background jobs started");

    let host = config.host.clone();
    let port = config.port;
    let state = web::Data::new(api::AppState {
        market,
        jobs: job_store,
        config: Arc::new(config),
    });

    log::info!("🌐 Server starting on {}:{}", host, port);
    log::info!("📚 Swagger UI available at: http://{}:{}/swagger-ui/", host, port);
    log::info!("📄 OpenAPI spec at: http://{}:{}/api-docs/openapi.json", host, port);

    // Start HTTP server
    HttpServer::new(move || {
        let cors = state
            .config
            .cors_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::CONTENT_TYPE,
                actix_web::http::header::ACCEPT,
            ])
            .expose_headers(vec![actix_web::http::header::CONTENT_TYPE])
            .supports_credentials()
            .max_age(3600);

        let openapi = api::swagger::ApiDoc::openapi();

        App::new()
            .app_data(state.clone())
            .wrap(cors)
            .wrap(middleware::SecurityHeaders)
            .wrap(Logger::default())
            .wrap_fn(|req, srv| {
                api::metrics::increment_request_count();
                let fut = srv.call(req);
                async move {
                    let res = fut.await;
                    let server_error = match &res {
                        Ok(res) => res.status().is_server_error(),
                        Err(e) => e.as_response_error().status_code().is_server_error(),
                    };
                    if server_error {
                        api::metrics::increment_error_count();
                    }
                    res
                }
            })
            .service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi))
            .configure(api::configure)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
