use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_CONFIG_PATH: &str = "config/service.yaml";
pub const DEFAULT_CNN_ENDPOINT: &str = "https://akshat281204-hydroponic-cnn.hf.space/predict";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid prediction endpoint URL {url}: {source}")]
    InvalidUrl { url: String, source: url::ParseError },
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub ml_model: MlModelConfig,
    pub cnn: CnnConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MlModelConfig {
    pub path: PathBuf,
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CnnConfig {
    pub endpoint: String,
    /// Zero disables the timeout.
    pub timeout_secs: u64,
    pub jpeg_quality: u8,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DashboardConfig {
    pub template: PathBuf,
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl Default for MlModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/random_forest_final_model.json"),
            max_body_bytes: 256 * 1024,
        }
    }
}

impl Default for CnnConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_CNN_ENDPOINT.to_string(),
            timeout_secs: 30,
            jpeg_quality: 75,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            template: PathBuf::from("templates/dashboard.html"),
            static_dir: PathBuf::from("static"),
        }
    }
}

impl CnnConfig {
    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.endpoint).map_err(|source| ConfigError::InvalidUrl {
            url: self.endpoint.clone(),
            source,
        })
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl AppConfig {
    /// Reads the YAML file named by `HYDRO_CONFIG` (or the default path when
    /// it exists), then applies environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = env::var("HYDRO_CONFIG").ok().map(PathBuf::from);
        let path = explicit
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut config = if explicit.is_some() || path.exists() {
            log::info!("Loading configuration from {}", path.display());
            Self::from_file(&path)?
        } else {
            log::info!("No config file at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(config_str: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(config_str)?;
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = parse_value("PORT", &port)?;
        }
        if let Some(path) = lookup("ML_MODEL_PATH") {
            self.ml_model.path = PathBuf::from(path);
        }
        if let Some(limit) = lookup("ML_MAX_BODY_BYTES") {
            self.ml_model.max_body_bytes = parse_value("ML_MAX_BODY_BYTES", &limit)?;
        }
        if let Some(endpoint) = lookup("CNN_API_URL") {
            self.cnn.endpoint = endpoint;
        }
        if let Some(timeout) = lookup("CNN_TIMEOUT_SECS") {
            self.cnn.timeout_secs = parse_value("CNN_TIMEOUT_SECS", &timeout)?;
        }
        if let Some(limit) = lookup("CNN_MAX_UPLOAD_BYTES") {
            self.cnn.max_upload_bytes = parse_value("CNN_MAX_UPLOAD_BYTES", &limit)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cnn.endpoint_url()?;
        if !(1..=100).contains(&self.cnn.jpeg_quality) {
            return Err(ConfigError::InvalidValue {
                key: "cnn.jpeg_quality".to_string(),
                value: self.cnn.jpeg_quality.to_string(),
            });
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Client-side configuration for the Firebase realtime database, injected
/// into the dashboard page. Unset variables serialize as `null`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FirebaseConfig {
    pub api_key: Option<String>,
    pub auth_domain: Option<String>,
    #[serde(rename = "databaseURL")]
    pub database_url: Option<String>,
    pub project_id: Option<String>,
    pub storage_bucket: Option<String>,
    pub messaging_sender_id: Option<String>,
    pub app_id: Option<String>,
    pub measurement_id: Option<String>,
}

impl FirebaseConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            api_key: lookup("FIREBASE_API_KEY"),
            auth_domain: lookup("FIREBASE_AUTH_DOMAIN"),
            database_url: lookup("FIREBASE_DB_URL"),
            project_id: lookup("FIREBASE_PROJECT_ID"),
            storage_bucket: lookup("FIREBASE_BUCKET"),
            messaging_sender_id: lookup("FIREBASE_SENDER_ID"),
            app_id: lookup("FIREBASE_APP_ID"),
            measurement_id: lookup("FIREBASE_MEASUREMENT_ID"),
        }
    }

    pub fn configured_keys(&self) -> usize {
        [
            &self.api_key,
            &self.auth_domain,
            &self.database_url,
            &self.project_id,
            &self.storage_bucket,
            &self.messaging_sender_id,
            &self.app_id,
            &self.measurement_id,
        ]
        .iter()
        .filter(|value| value.as_deref().is_some_and(|v| !v.trim().is_empty()))
        .count()
    }
}
