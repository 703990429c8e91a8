use actix_multipart::{Multipart, MultipartError};
use actix_web::error::BlockingError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError, web};
use futures::{StreamExt, TryStreamExt};
use log::{error, info, warn};
use serde_json::json;
use sha2::{Digest, Sha256};
use shared::PredictionResponse;
use uuid::Uuid;

use crate::inference::model::InferenceError;
use crate::inference::service::InferenceService;
use crate::openapi;

pub const PREDICT_PATH: &str = "/algo";
pub const IMAGE_FIELD: &str = "covidxray";

#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_upload_bytes: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Missing required parameter {0}")]
    MissingField(&'static str),
    #[error("Upload exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },
    #[error("Malformed multipart payload: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Inference failed: {0}")]
    Inference(#[from] InferenceError),
    #[error("Inference worker unavailable")]
    Blocking(#[from] BlockingError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingField(_) | ApiError::Multipart(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Inference(_) | ApiError::Blocking(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = match self {
            ApiError::MissingField(field) => json!({
                "message": { *field: "Missing required parameter in uploaded files" }
            }),
            _ if status.is_server_error() => {
                error!("{}", self);
                json!({ "message": "Internal Server Error" })
            }
            _ => json!({ "message": self.to_string() }),
        };
        HttpResponse::build(status).json(body)
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource(PREDICT_PATH).route(web::post().to(handle_prediction)))
        .service(web::resource(openapi::SPEC_PATH).route(web::get().to(api_spec)));
}

async fn handle_prediction(
    service: web::Data<InferenceService>,
    limits: web::Data<UploadLimits>,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let request_id = Uuid::new_v4();
    let mut upload: Option<Vec<u8>> = None;

    while let Some(mut field) = payload.try_next().await? {
        // Only a file part counts; a plain form value with the same name does not.
        let wanted = upload.is_none()
            && field.name() == Some(IMAGE_FIELD)
            && field
                .content_disposition()
                .and_then(|cd| cd.get_filename())
                .is_some();

        let mut image_data = Vec::new();
        while let Some(chunk) = field.next().await {
            let data = chunk?;
            if !wanted {
                continue;
            }
            if image_data.len() + data.len() > limits.max_upload_bytes {
                warn!("[{}] upload rejected above {} bytes", request_id, limits.max_upload_bytes);
                return Err(ApiError::PayloadTooLarge {
                    limit: limits.max_upload_bytes,
                });
            }
            image_data.extend_from_slice(&data);
        }
        if wanted {
            upload = Some(image_data);
        }
    }

    let image = upload.ok_or(ApiError::MissingField(IMAGE_FIELD))?;

    // Hashing and inference scale with the upload size; both run on the blocking pool.
    let service = service.into_inner();
    let label = web::block(move || {
        info!(
            "[{}] received {} bytes, sha256 {}",
            request_id,
            image.len(),
            upload_digest(&image)
        );
        service.classify(&image)
    })
    .await??;
    info!("[{}] prediction: {}", request_id, label);

    Ok(HttpResponse::Created().json(PredictionResponse { prediction: label }))
}

fn upload_digest(image: &[u8]) -> String {
    hex::encode(Sha256::digest(image))
}

async fn api_spec() -> HttpResponse {
    HttpResponse::Ok().json(openapi::document())
}
