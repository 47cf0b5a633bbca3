use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Plant condition reported by the tabular classifier.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Display, EnumString, AsRefStr,
)]
pub enum HealthLabel {
    Healthy,
    Unhealthy,
}

impl HealthLabel {
    /// Class `1` is healthy. Every other class, including ones a binary
    /// model should never emit, reads as unhealthy.
    pub fn from_class(class: i64) -> Self {
        if class == 1 {
            HealthLabel::Healthy
        } else {
            HealthLabel::Unhealthy
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PredictionResponse {
    pub prediction: HealthLabel,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

/// Body posted to the remote image classifier.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ImagePredictionRequest {
    pub data: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HealthStatus {
    pub status: String,
    pub ml_model_loaded: bool,
}
