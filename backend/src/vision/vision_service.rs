use serde_json::Value;
use std::sync::Arc;

use super::encoding::{EncodingError, image_to_data_uri};
use super::remote_client::{RemoteError, RemotePredictor};

/// Multipart field the dashboard uploads images under.
pub const UPLOAD_FIELD: &str = "file";

#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("No file part in the request")]
    MissingFile,
    #[error("No image selected for uploading")]
    NoImageSelected,
    #[error("Uploaded file exceeds the {limit} byte limit")]
    UploadTooLarge { limit: usize },
    #[error("Malformed multipart payload: {0}")]
    MalformedUpload(String),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("Image processing task failed: {0}")]
    Task(String),
}

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Forwards uploaded images to the remote classifier and relays its answer.
#[derive(Clone)]
pub struct VisionService {
    remote: Arc<dyn RemotePredictor>,
    jpeg_quality: u8,
    max_upload_bytes: usize,
}

impl VisionService {
    pub fn new(remote: Arc<dyn RemotePredictor>, jpeg_quality: u8, max_upload_bytes: usize) -> Self {
        Self {
            remote,
            jpeg_quality,
            max_upload_bytes,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    pub async fn predict(&self, upload: Option<ImageUpload>) -> Result<Value, VisionError> {
        let upload = upload.ok_or(VisionError::MissingFile)?;
        if upload.filename.is_empty() {
            return Err(VisionError::NoImageSelected);
        }

        let quality = self.jpeg_quality;
        let filename = upload.filename;
        let bytes = upload.bytes;
        let data_uri = tokio::task::spawn_blocking(move || image_to_data_uri(&bytes, quality))
            .await
            .map_err(|e| VisionError::Task(e.to_string()))??;

        log::info!(
            "Forwarding {} ({} byte data URI) to remote classifier",
            filename,
            data_uri.len()
        );
        let prediction = self.remote.predict(data_uri).await?;
        Ok(prediction)
    }
}
