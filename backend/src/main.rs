mod config;
mod dashboard;
mod routes;
mod tabular;
mod vision;

use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, web};
use config::{AppConfig, FirebaseConfig};
use dashboard::Dashboard;
use routes::{configure_routes, cors_policy};
use std::env;
use std::sync::Arc;
use tabular::tabular_service::TabularService;
use vision::remote_client::HfSpaceClient;
use vision::vision_service::VisionService;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = AppConfig::load().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    let tabular_service = TabularService::load(&config.ml_model.path)
        .with_max_body_bytes(config.ml_model.max_body_bytes);

    let endpoint = config
        .cnn
        .endpoint_url()
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    let remote = HfSpaceClient::new(endpoint, config.cnn.timeout()).map_err(|e| {
        std::io::Error::other(format!("Failed to build prediction client: {}", e))
    })?;
    log::info!("CNN predictions forwarded to {}", remote.endpoint());
    let vision_service = VisionService::new(
        Arc::new(remote),
        config.cnn.jpeg_quality,
        config.cnn.max_upload_bytes,
    );

    let firebase = FirebaseConfig::from_env();
    if firebase.configured_keys() < 8 {
        log::warn!(
            "Only {} of 8 Firebase settings are set; the dashboard will not receive live data",
            firebase.configured_keys()
        );
    }
    let dashboard = Dashboard::load(&config.dashboard.template, &firebase)
        .map_err(|e| std::io::Error::other(format!("Failed to render dashboard: {}", e)))?;

    let tabular_service = web::Data::new(tabular_service);
    let vision_service = web::Data::new(vision_service);
    let dashboard = web::Data::new(dashboard);
    let static_dir = config.dashboard.static_dir.clone();

    let bind_address = config.bind_address();
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(cors_policy())
            .wrap(Logger::default())
            .app_data(tabular_service.clone())
            .app_data(vision_service.clone())
            .app_data(dashboard.clone())
            .configure(|cfg| configure_routes(cfg, static_dir.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await
}
