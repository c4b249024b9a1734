use actix_web::{App, HttpServer, web};
use log::info;

use mixtape::api;
use mixtape::app_state::AppState;
use mixtape::config::{AppConfig, LoggingConfig};
use mixtape::logging::{init_logging, reconfigure_logging};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // logger goes up first so config loading is logged
    let default_log_file = LoggingConfig::default().config_file;
    let log_handle = init_logging(&default_log_file);

    let config = AppConfig::load()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
    if config.logging.config_file != default_log_file {
        reconfigure_logging(log_handle.as_ref(), &config.logging.config_file);
    }

    let state = AppState::from_config(config.clone())
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    let data = web::Data::new(state);

    info!("Starting server on {}:{} with {} workers", config.server.host, config.server.port, config.server.workers);

    let cors_config = config.cors.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(api::cors(&cors_config))
            .app_data(data.clone())
            .configure(api::configure(&data))
    })
    .workers(config.server.workers)
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
