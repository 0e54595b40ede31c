mod classifier;
mod config;
mod content;
mod normalizer;
mod pipeline;
mod routes;
mod session;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use classifier::provisioner::ModelProvisioner;
use config::{ClassifierConfig, Settings};
use content::ContentTable;
use routes::{configure_routes, AppState, MAX_UPLOAD_BYTES};
use session::store::SessionStore;
use shared::ClassifierInfo;
use std::env;
use std::io::{Error, ErrorKind};
use std::sync::Arc;

fn startup_error(context: &str, e: impl std::fmt::Display) -> Error {
    log::error!("{}: {}", context, e);
    Error::new(ErrorKind::Other, format!("{}: {}", context, e))
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

    let settings = Settings::from_env().map_err(|e| startup_error("Invalid settings", e))?;
    log::info!("Model artifact: {} (file id {})", settings.model_path.display(), settings.file_id);

    let classifier_config = ClassifierConfig::load(&settings.classifier_config_path)
        .map_err(|e| startup_error("Classifier config could not be loaded", e))?;

    let provisioner = ModelProvisioner::new(&settings, classifier_config);
    let classifier = provisioner
        .classifier()
        .await
        .map_err(|e| startup_error("Model provisioning failed", e))?;

    let content = if settings.content_path.exists() {
        ContentTable::load(&settings.content_path, classifier.labels())
            .map_err(|e| startup_error("Reference content could not be loaded", e))?
    } else {
        log::warn!(
            "No reference content at {}; content panels will be empty",
            settings.content_path.display()
        );
        ContentTable::default()
    };

    let state = web::Data::new(AppState {
        info: ClassifierInfo {
            labels: classifier.labels().to_vec(),
            model_path: settings.model_path.display().to_string(),
            file_id: settings.file_id.clone(),
        },
        classifier,
        content: Arc::new(content),
        sessions: SessionStore::new(settings.session_ttl),
        upload_limit: MAX_UPLOAD_BYTES,
    });

    let frontend_dir = settings.frontend_dir.clone();
    let bind_address = format!("0.0.0.0:{}", settings.port);
    log::info!("Serving frontend from {}", frontend_dir.display());
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(state.clone())
            .configure(|cfg| configure_routes(cfg, frontend_dir.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await
}
