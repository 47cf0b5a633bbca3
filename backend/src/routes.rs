use actix_cors::Cors;
use actix_files::Files;
use actix_multipart::Multipart;
use actix_web::http::StatusCode;
use actix_web::http::header::ContentType;
use actix_web::{HttpResponse, ResponseError, web};
use futures::{StreamExt, TryStreamExt};
use log::{error, info, warn};
use shared::{ErrorResponse, HealthStatus, PredictionResponse};
use std::path::PathBuf;

use crate::dashboard::Dashboard;
use crate::tabular::tabular_service::{TabularError, TabularService};
use crate::vision::vision_service::{ImageUpload, UPLOAD_FIELD, VisionError, VisionService};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Tabular(#[from] TabularError),
    #[error(transparent)]
    Vision(#[from] VisionError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Tabular(TabularError::Unavailable) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Tabular(
                TabularError::MissingInput
                | TabularError::MalformedBody(_)
                | TabularError::BodyTooLarge { .. }
                | TabularError::BodyRead(_),
            ) => StatusCode::BAD_REQUEST,
            ApiError::Tabular(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Vision(
                VisionError::MissingFile
                | VisionError::NoImageSelected
                | VisionError::UploadTooLarge { .. }
                | VisionError::MalformedUpload(_),
            ) => StatusCode::BAD_REQUEST,
            ApiError::Vision(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        match self {
            ApiError::Tabular(e) if status.is_server_error() => {
                error!("Error during ML prediction: {}", e)
            }
            ApiError::Vision(e) if status.is_server_error() => {
                error!("Error during CNN prediction: {}", e)
            }
            _ => warn!("Rejected prediction request: {}", self),
        }
        HttpResponse::build(status).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}

pub fn cors_policy() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_any_header()
        .max_age(3600)
}

pub fn configure_routes(cfg: &mut web::ServiceConfig, static_dir: PathBuf) {
    cfg.service(web::resource("/").route(web::get().to(dashboard)))
        .service(web::resource("/predict_cnn").route(web::post().to(predict_cnn)))
        .service(web::resource("/predict_ml").route(web::post().to(predict_ml)))
        .service(web::resource("/health").route(web::get().to(health)));

    if static_dir.is_dir() {
        cfg.service(Files::new("/static", static_dir));
    }
}

async fn dashboard(dashboard: web::Data<Dashboard>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(dashboard.page().to_owned())
}

async fn predict_cnn(
    service: web::Data<VisionService>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let upload = read_upload(payload, service.max_upload_bytes()).await?;
    let prediction = service.predict(upload).await?;
    Ok(HttpResponse::Ok().json(prediction))
}

async fn predict_ml(
    service: web::Data<TabularService>,
    payload: web::Payload,
) -> Result<HttpResponse, ApiError> {
    // the body is never needed without a model, so do not read it
    if !service.is_loaded() {
        return Err(TabularError::Unavailable.into());
    }
    let body = read_body(payload, service.max_body_bytes()).await?;
    let prediction = service.predict_body(&body)?;
    info!("ML prediction: {}", prediction);
    Ok(HttpResponse::Ok().json(PredictionResponse { prediction }))
}

async fn health(service: web::Data<TabularService>) -> HttpResponse {
    HttpResponse::Ok().json(HealthStatus {
        status: "ok".to_string(),
        ml_model_loaded: service.is_loaded(),
    })
}

async fn read_body(mut payload: web::Payload, max_bytes: usize) -> Result<Vec<u8>, TabularError> {
    let mut body = Vec::new();
    while let Some(chunk) = payload.next().await {
        let data = chunk.map_err(|e| TabularError::BodyRead(e.to_string()))?;
        if body.len() + data.len() > max_bytes {
            return Err(TabularError::BodyTooLarge { limit: max_bytes });
        }
        body.extend_from_slice(&data);
    }
    Ok(body)
}

/// Pulls the first `file` part that carries a filename out of the form.
/// Parts without a filename are plain form values, not uploads.
async fn read_upload(
    mut payload: Multipart,
    max_bytes: usize,
) -> Result<Option<ImageUpload>, VisionError> {
    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| VisionError::MalformedUpload(e.to_string()))?
    {
        let filename = match field.content_disposition() {
            Some(cd) if cd.get_name() == Some(UPLOAD_FIELD) => {
                cd.get_filename().map(str::to_string)
            }
            _ => None,
        };
        let Some(filename) = filename else {
            continue;
        };

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let data = chunk.map_err(|e| VisionError::MalformedUpload(e.to_string()))?;
            if bytes.len() + data.len() > max_bytes {
                return Err(VisionError::UploadTooLarge { limit: max_bytes });
            }
            bytes.extend_from_slice(&data);
        }
        return Ok(Some(ImageUpload { filename, bytes }));
    }
    Ok(None)
}
