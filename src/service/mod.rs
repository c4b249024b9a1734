//service/mod.rs
pub mod catalog_service;

use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Error};
use bytes::BytesMut;
use futures::StreamExt;
use log::{info, error, warn, debug};
use serde_json::json;

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::service::catalog_service::UploadedFile;

/// Multipart field carrying the uploaded files
pub const FILES_FIELD: &str = "files";

/// Collect every `files` part that carries a filename. Other parts are
/// drained and ignored.
async fn read_upload_form(mut payload: Multipart, max_size: u64) -> Result<Vec<UploadedFile>, ApiError> {
    let mut files = Vec::new();
    let mut total: u64 = 0;

    while let Some(field) = payload.next().await {
        let mut field = field.map_err(|e| ApiError::InvalidUpload(e.to_string()))?;

        let filename = match (field.name(), field.content_disposition().and_then(|cd| cd.get_filename())) {
            (Some(FILES_FIELD), Some(filename)) => Some(filename.to_string()),
            _ => None,
        };

        let mut bytes = BytesMut::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| ApiError::InvalidUpload(e.to_string()))?;
            total += chunk.len() as u64;
            if total > max_size {
                return Err(ApiError::InvalidUpload(format!("upload exceeds {} bytes", max_size)));
            }
            if filename.is_some() {
                bytes.extend_from_slice(&chunk);
            }
        }

        match filename {
            Some(filename) => {
                debug!("Received part {} ({} bytes)", filename, bytes.len());
                files.push(UploadedFile::new(filename, bytes.freeze()));
            }
            None => debug!("Ignoring multipart field {:?}", field.name()),
        }
    }

    Ok(files)
}

pub async fn upload_service(payload: Multipart, app_state: web::Data<AppState>) -> Result<HttpResponse, Error> {
    log_mdc::insert("route", "upload");

    let files = read_upload_form(payload, app_state.config.server.max_payload_size)
        .await
        .map_err(|e| {
            warn!("Rejected upload: {:?}", e);
            e
        })?;
    info!("Upload request with {} files", files.len());

    let report = app_state.synchronizer.ingest(files).map_err(|e| {
        error!("Upload failed while writing the catalog: {}", e);
        ApiError::Database(e)
    })?;

    if report.cataloged < report.received {
        warn!("Upload partially catalogued: {:?}", report);
    }
    Ok(HttpResponse::Ok().json(json!({ "status": "ok" })))
}

pub async fn playlist_service(app_state: web::Data<AppState>) -> Result<HttpResponse, Error> {
    log_mdc::insert("route", "playlist");

    let tracks = app_state.synchronizer.listing().map_err(|e| {
        error!("Failed to list tracks: {}", e);
        ApiError::from_listing(e)
    })?;
    Ok(HttpResponse::Ok().json(tracks))
}

pub async fn shuffle_service(app_state: web::Data<AppState>) -> Result<HttpResponse, Error> {
    log_mdc::insert("route", "shuffle");

    let tracks = app_state.synchronizer.shuffled_listing().map_err(|e| {
        error!("Failed to list tracks for shuffle: {}", e);
        ApiError::from_listing(e)
    })?;
    Ok(HttpResponse::Ok().json(tracks))
}

pub async fn delete_service(filename: String, app_state: web::Data<AppState>) -> Result<HttpResponse, Error> {
    log_mdc::insert("route", "delete");

    app_state.synchronizer.delete(&filename).map_err(|e| {
        error!("Failed to delete {} from the catalog: {}", filename, e);
        ApiError::DeleteFailed(e)
    })?;
    Ok(HttpResponse::Ok().json(json!({ "status": "deleted" })))
}
