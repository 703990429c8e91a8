mod config;
mod inference;
mod openapi;
mod routes;
mod tls;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, web};
use config::AppConfig;
use inference::config::PreprocessConfig;
use inference::model::load_classifier;
use inference::preprocess::Preprocessor;
use inference::service::InferenceService;
use routes::{UploadLimits, configure_routes};
use std::env;

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    log::error!("{}: {}", context, err);
    std::io::Error::other(format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = AppConfig::from_env().map_err(|e| startup_error("Invalid configuration", e))?;

    let preprocess_config = match &config.preprocess_config {
        Some(path) => {
            log::info!("Loading preprocessing config from {}", path.display());
            PreprocessConfig::load(path)
                .map_err(|e| startup_error("Preprocessing config failed", e))?
        }
        None => PreprocessConfig::default(),
    };

    log::info!("Loading model from {}", config.model_path.display());
    let classifier = load_classifier(&config.model_path)
        .map_err(|e| startup_error("Model loading failed", e))?;

    let service = InferenceService::new(classifier, Preprocessor::new(preprocess_config));
    let limits = UploadLimits {
        max_upload_bytes: config.max_upload_bytes,
    };

    let tls_mode = tls::select_mode(&config.tls_cert_path, &config.tls_key_path);
    let acceptor =
        tls::build_acceptor(&tls_mode).map_err(|e| startup_error("TLS setup failed", e))?;
    log::info!("TLS: {}", tls_mode);

    let bind_address = config.bind_address();
    log::info!(
        "Starting server on https://{} with {} worker(s)",
        bind_address,
        config.workers
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(web::Data::new(service.clone()))
            .app_data(web::Data::new(limits))
            .configure(configure_routes)
    })
    .workers(config.workers)
    .bind_openssl(&bind_address, acceptor)?
    .run()
    .await
}
