//! HTTP routes. Each route delegates to its service function.

use actix_cors::Cors;
use actix_files::Files;
use actix_multipart::Multipart;
use actix_web::{delete, get, post, web, HttpResponse, Error};
use log::{info, warn};

use crate::app_state::AppState;
use crate::catalog::SONGS_PREFIX;
use crate::config::CorsConfig;
use crate::service::{delete_service, playlist_service, shuffle_service, upload_service};

#[post("/upload")]
pub async fn upload(payload: Multipart, app_state: web::Data<AppState>) -> Result<HttpResponse, Error> {
    upload_service(payload, app_state).await
}

#[get("/playlist")]
pub async fn playlist(app_state: web::Data<AppState>) -> Result<HttpResponse, Error> {
    playlist_service(app_state).await
}

#[get("/shuffle")]
pub async fn shuffle(app_state: web::Data<AppState>) -> Result<HttpResponse, Error> {
    shuffle_service(app_state).await
}

#[delete("/song/{filename}")]
pub async fn delete_song(path: web::Path<String>, app_state: web::Data<AppState>) -> Result<HttpResponse, Error> {
    delete_service(path.into_inner(), app_state).await
}

/// Register the API routes and, when blobs live on disk, the static `/songs` mount
pub fn configure(app_state: &AppState) -> impl FnOnce(&mut web::ServiceConfig) {
    let songs_root = app_state.synchronizer.blob_store().root().map(|p| p.to_path_buf());
    move |cfg: &mut web::ServiceConfig| {
        cfg.service(upload)
            .service(playlist)
            .service(shuffle)
            .service(delete_song);
        match songs_root {
            Some(root) => {
                info!("Serving {} from {}", SONGS_PREFIX, root.display());
                cfg.service(Files::new(SONGS_PREFIX, root));
            }
            None => warn!("Blob backend has no directory; {} is not served", SONGS_PREFIX),
        }
    }
}

/// Build the CORS middleware from configuration
pub fn cors(config: &CorsConfig) -> Cors {
    let mut cors = Cors::default();
    if config.allowed_origins.iter().any(|origin| origin == "*") {
        cors = cors.allow_any_origin();
    } else {
        for origin in &config.allowed_origins {
            cors = cors.allowed_origin(origin);
        }
    }
    cors = cors
        .allowed_methods(config.allowed_methods.iter().map(String::as_str))
        .allowed_headers(config.allowed_headers.iter().map(String::as_str))
        .expose_headers(config.expose_headers.iter().map(String::as_str));
    if config.allow_credentials {
        cors = cors.supports_credentials();
    }
    cors
}
