use futures::future::BoxFuture;
use reqwest::{Client as HttpClient, StatusCode};
use serde_json::Value;
use shared::ImagePredictionRequest;
use std::time::Duration;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Prediction service returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("Prediction service returned invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Remote image classifier taking a JPEG data URI and answering JSON.
pub trait RemotePredictor: Send + Sync {
    fn predict(&self, data_uri: String) -> BoxFuture<'_, Result<Value, RemoteError>>;
}

/// Client for the hosted CNN space.
#[derive(Clone)]
pub struct HfSpaceClient {
    http_client: HttpClient,
    endpoint: Url,
}

impl HfSpaceClient {
    pub fn new(endpoint: Url, timeout: Option<Duration>) -> Result<Self, RemoteError> {
        let mut builder = HttpClient::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http_client: builder.build()?,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn post_image(&self, data_uri: String) -> Result<Value, RemoteError> {
        let response = self
            .http_client
            .post(self.endpoint.clone())
            .json(&ImagePredictionRequest { data: data_uri })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(RemoteError::Status { status, body });
        }

        let bytes = response.bytes().await?;
        let prediction: Value = serde_json::from_slice(&bytes)?;
        Ok(prediction)
    }
}

impl RemotePredictor for HfSpaceClient {
    fn predict(&self, data_uri: String) -> BoxFuture<'_, Result<Value, RemoteError>> {
        Box::pin(self.post_image(data_uri))
    }
}
