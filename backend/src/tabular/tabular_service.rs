use serde_json::Value;
use shared::HealthLabel;
use std::path::Path;
use std::sync::Arc;

use super::classifier::{Classifier, ClassifierError, RandomForest};
use super::features::{FeatureError, SensorReading};

#[derive(Debug, thiserror::Error)]
pub enum TabularError {
    #[error("ML model is not loaded")]
    Unavailable,
    #[error("No input data provided")]
    MissingInput,
    #[error("Request body exceeds the {limit} byte limit")]
    BodyTooLarge { limit: usize },
    #[error("Failed to read request body: {0}")]
    BodyRead(String),
    #[error("Malformed JSON body: {0}")]
    MalformedBody(serde_json::Error),
    #[error("Invalid input: {0}")]
    InvalidPayload(String),
    #[error(transparent)]
    InvalidFeature(#[from] FeatureError),
    #[error(transparent)]
    Prediction(#[from] ClassifierError),
}

/// Health prediction from sensor readings. Holds the classifier loaded at
/// startup, or nothing when that load failed.
pub const DEFAULT_MAX_BODY_BYTES: usize = 256 * 1024;

#[derive(Clone)]
pub struct TabularService {
    classifier: Option<Arc<dyn Classifier>>,
    max_body_bytes: usize,
}

impl TabularService {
    pub fn new(classifier: Option<Arc<dyn Classifier>>) -> Self {
        Self {
            classifier,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    /// Load failures leave the service in degraded mode instead of
    /// aborting startup.
    pub fn load(model_path: &Path) -> Self {
        log::info!("Loading random forest model from {}", model_path.display());
        match RandomForest::from_path(model_path) {
            Ok(forest) => {
                log::info!(
                    "Random forest model loaded successfully ({} trees)",
                    forest.trees.len()
                );
                Self::new(Some(Arc::new(forest)))
            }
            Err(e) => {
                log::error!(
                    "Error loading ML model from {}: {}. /predict_ml will answer 503",
                    model_path.display(),
                    e
                );
                Self::new(None)
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.classifier.is_some()
    }

    /// Parses a raw request body and predicts. Availability is checked
    /// before the body is looked at.
    pub fn predict_body(&self, body: &[u8]) -> Result<HealthLabel, TabularError> {
        let classifier = self.classifier.as_ref().ok_or(TabularError::Unavailable)?;

        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(TabularError::MissingInput);
        }
        let payload: Value = serde_json::from_slice(body).map_err(TabularError::MalformedBody)?;
        if is_empty_payload(&payload) {
            return Err(TabularError::MissingInput);
        }
        if !payload.is_object() {
            return Err(TabularError::InvalidPayload(format!(
                "expected a JSON object, got {}",
                payload
            )));
        }
        let reading: SensorReading = serde_json::from_value(payload)
            .map_err(|e| TabularError::InvalidPayload(e.to_string()))?;

        Self::classify(classifier.as_ref(), &reading)
    }

    fn classify(
        classifier: &dyn Classifier,
        reading: &SensorReading,
    ) -> Result<HealthLabel, TabularError> {
        let features = reading.to_features()?;
        let row = features.to_row();
        let classes = classifier.predict(row.view())?;
        let class = classes.first().copied().ok_or_else(|| {
            TabularError::Prediction(ClassifierError::InvalidModel(
                "classifier returned no prediction".to_string(),
            ))
        })?;

        if class != 0 && class != 1 {
            log::warn!(
                "Classifier returned unexpected class {} for {:?}, reporting Unhealthy",
                class,
                features.to_array()
            );
        }
        Ok(HealthLabel::from_class(class))
    }
}

/// Payloads that carry nothing to predict on: `null`, `false`, `0`, `""`,
/// `[]` and `{}`.
fn is_empty_payload(payload: &Value) -> bool {
    match payload {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ndarray::ArrayView2;
    use std::sync::Mutex;

    /// Returns a fixed class and records every row it was asked about.
    pub(crate) struct FixedClassifier {
        pub class: i64,
        pub seen: Mutex<Vec<Vec<f64>>>,
    }

    impl FixedClassifier {
        pub(crate) fn new(class: i64) -> Arc<Self> {
            Arc::new(Self {
                class,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl Classifier for FixedClassifier {
        fn predict(&self, rows: ArrayView2<'_, f64>) -> Result<Vec<i64>, ClassifierError> {
            let mut seen = self.seen.lock().unwrap();
            for row in rows.rows() {
                seen.push(row.to_vec());
            }
            Ok(vec![self.class; rows.nrows()])
        }
    }

    struct FailingClassifier;

    impl Classifier for FailingClassifier {
        fn predict(&self, _rows: ArrayView2<'_, f64>) -> Result<Vec<i64>, ClassifierError> {
            Err(ClassifierError::InvalidModel("broken".to_string()))
        }
    }

    fn service_with(class: i64) -> (TabularService, Arc<FixedClassifier>) {
        let classifier = FixedClassifier::new(class);
        (TabularService::new(Some(classifier.clone())), classifier)
    }

    #[test]
    fn class_one_reads_healthy_and_zero_unhealthy() {
        let (healthy, _) = service_with(1);
        let (unhealthy, _) = service_with(0);
        let body = br#"{"ph": 6.0}"#;
        assert_eq!(healthy.predict_body(body).unwrap(), HealthLabel::Healthy);
        assert_eq!(unhealthy.predict_body(body).unwrap(), HealthLabel::Unhealthy);
    }

    #[test]
    fn unexpected_class_reads_unhealthy() {
        let (service, _) = service_with(7);
        assert_eq!(
            service.predict_body(br#"{"ph": 6.0}"#).unwrap(),
            HealthLabel::Unhealthy
        );
    }

    #[test]
    fn defaults_reach_the_classifier_in_order() {
        let (service, classifier) = service_with(1);
        service.predict_body(br#"{"unrelated": 1}"#).unwrap();
        service.predict_body(br#"{"ph": null, "tds": null}"#).unwrap();
        let seen = classifier.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        for row in seen.iter() {
            assert_eq!(row, &vec![6.2, 21.0, 2.0, 140.0]);
        }
    }

    #[test]
    fn unloaded_model_is_unavailable_for_any_input() {
        let service = TabularService::new(None);
        assert!(!service.is_loaded());
        for body in [&b""[..], b"{", br#"{"ph": 6}"#, b"{}"] {
            assert!(matches!(
                service.predict_body(body),
                Err(TabularError::Unavailable)
            ));
        }
    }

    #[test]
    fn empty_inputs_are_missing() {
        let (service, classifier) = service_with(1);
        for body in [&b""[..], b"  ", b"{}", b"null", b"[]", b"0", b"\"\"", b"false"] {
            assert!(
                matches!(service.predict_body(body), Err(TabularError::MissingInput)),
                "body {:?}",
                String::from_utf8_lossy(body)
            );
        }
        assert!(classifier.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn unparsable_body_is_malformed() {
        let (service, _) = service_with(1);
        assert!(matches!(
            service.predict_body(b"{\"ph\": "),
            Err(TabularError::MalformedBody(_))
        ));
    }

    #[test]
    fn non_object_and_non_numeric_inputs_fail_conversion() {
        let (service, _) = service_with(1);
        assert!(matches!(
            service.predict_body(b"[6.2, 21.0]"),
            Err(TabularError::InvalidPayload(_))
        ));
        assert!(matches!(
            service.predict_body(br#"{"ph": [1]}"#),
            Err(TabularError::InvalidPayload(_))
        ));
        assert!(matches!(
            service.predict_body(br#"{"ec": "high"}"#),
            Err(TabularError::InvalidFeature(_))
        ));
    }

    #[test]
    fn classifier_failure_is_a_prediction_error() {
        let service = TabularService::new(Some(Arc::new(FailingClassifier)));
        let err = service.predict_body(br#"{"ph": 6.0}"#).unwrap_err();
        assert!(matches!(err, TabularError::Prediction(_)));
        assert_eq!(err.to_string(), "Invalid model: broken");
    }

    #[test]
    fn missing_model_file_degrades_instead_of_failing() {
        let service = TabularService::load(Path::new("/nonexistent/model.json"));
        assert!(!service.is_loaded());
    }

    #[test]
    fn same_input_gives_same_label() {
        let path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../models/random_forest_final_model.json");
        let service = TabularService::load(&path);
        assert!(service.is_loaded());
        let body = br#"{"ph": 6.4, "temp": 22.5, "ec": 1.8, "tds": 900}"#;
        let first = service.predict_body(body).unwrap();
        for _ in 0..5 {
            assert_eq!(service.predict_body(body).unwrap(), first);
        }
    }
}
